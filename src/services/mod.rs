pub mod catalog;
pub mod explanation;
pub mod feedback;
pub mod recommendation;

use crate::algorithms::{self, ItemProfile, PreferenceProfile};
use crate::error::StoreResult;
use crate::models::{AttributeCategory, Movie, MovieDetails};
use crate::store::{Direction, EdgeType, GraphStore, Node, NodeKey, NodeLabel, StoreHandle};
use crate::utils::sorted_names;
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};

/// Actors shown per movie in list views.
pub const LISTED_ACTORS: usize = 3;

/// Read-only traversals shared by the services.
///
/// Every multi-valued traversal yields a possibly-empty collection; a movie
/// without seasons simply contributes nothing for that category.
pub struct GraphReader<S: GraphStore> {
    store: StoreHandle<S>,
}

impl<S: GraphStore> Clone for GraphReader<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: GraphStore> GraphReader<S> {
    pub fn new(store: StoreHandle<S>) -> Self {
        Self { store }
    }

    pub async fn movie(&self, movie_id: &str) -> StoreResult<Option<Movie>> {
        let node = self.store.find_node(&NodeKey::movie(movie_id)).await?;
        Ok(node.and_then(|n| n.into_movie()))
    }

    pub async fn user_exists(&self, user_id: &str) -> StoreResult<bool> {
        Ok(self.store.find_node(&NodeKey::user(user_id)).await?.is_some())
    }

    /// All movies, ordered by id.
    pub async fn movies(&self) -> StoreResult<Vec<Movie>> {
        let nodes = self.store.nodes_by_label(NodeLabel::Movie).await?;
        Ok(nodes.into_iter().filter_map(|n| n.into_movie()).collect())
    }

    pub async fn item_profile(&self, movie_id: &str) -> StoreResult<ItemProfile> {
        let key = NodeKey::movie(movie_id);
        let mut profile = ItemProfile::default();
        for category in AttributeCategory::ALL {
            let neighbors = self
                .store
                .match_neighbors(&key, category.catalog_edge(), Direction::Outgoing)
                .await?;
            for neighbor in neighbors {
                profile.insert(category, neighbor.edge.to.key, neighbor.edge.weight);
            }
        }
        Ok(profile)
    }

    pub async fn preferences(&self, user_id: &str) -> StoreResult<PreferenceProfile> {
        let key = NodeKey::user(user_id);
        let mut profile = PreferenceProfile::default();
        for category in AttributeCategory::ALL {
            let neighbors = self
                .store
                .match_neighbors(&key, category.preference_edge(), Direction::Outgoing)
                .await?;
            for neighbor in neighbors {
                profile.insert(category, neighbor.edge.to.key, neighbor.edge.weight);
            }
        }
        Ok(profile)
    }

    /// Movie id -> signed interaction weight for everything the user interacted with.
    pub async fn interactions(&self, user_id: &str) -> StoreResult<BTreeMap<String, f64>> {
        let neighbors = self
            .store
            .match_neighbors(&NodeKey::user(user_id), EdgeType::Interacted, Direction::Outgoing)
            .await?;
        Ok(neighbors
            .into_iter()
            .map(|n| (n.edge.to.key, n.edge.weight))
            .collect())
    }

    /// User id -> interaction weight for users who liked the movie.
    pub async fn likers(&self, movie_id: &str) -> StoreResult<BTreeMap<String, f64>> {
        let neighbors = self
            .store
            .match_neighbors(&NodeKey::movie(movie_id), EdgeType::Interacted, Direction::Incoming)
            .await?;
        Ok(neighbors
            .into_iter()
            .filter(|n| n.edge.weight > 0.0)
            .map(|n| (n.edge.from.key, n.edge.weight))
            .collect())
    }

    pub async fn positive_interactions(&self, movie_id: &str) -> StoreResult<usize> {
        Ok(self.likers(movie_id).await?.len())
    }

    /// Movie id -> positive interaction count.
    pub async fn popularity(&self, movies: &[Movie]) -> StoreResult<BTreeMap<String, usize>> {
        let counts = try_join_all(movies.iter().map(|m| self.positive_interactions(&m.id))).await?;
        Ok(movies.iter().map(|m| m.id.clone()).zip(counts).collect())
    }

    /// Names of every attribute node in a category, sorted.
    pub async fn attribute_names(&self, category: AttributeCategory) -> StoreResult<Vec<String>> {
        let nodes = self.store.nodes_by_label(NodeLabel::for_category(category)).await?;
        Ok(sorted_names(nodes.into_iter().filter_map(|node| match node {
            Node::Attribute(attribute) => Some(attribute.name),
            _ => None,
        })))
    }

    /// Other users sharing at least `min_shared` liked movies with `user_id`.
    pub async fn similar_users(
        &self,
        user_id: &str,
        liked: &BTreeSet<String>,
        min_shared: usize,
    ) -> StoreResult<BTreeMap<String, usize>> {
        let mut co_likers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for movie_id in liked {
            for other in self.likers(movie_id).await?.into_keys() {
                if other != user_id {
                    co_likers.entry(other).or_default().insert(movie_id.clone());
                }
            }
        }
        Ok(algorithms::similar_users(&co_likers, min_shared))
    }

    /// Positive interactions of each similar user.
    pub async fn likes_of(
        &self,
        users: &BTreeMap<String, usize>,
    ) -> StoreResult<BTreeMap<String, Vec<(String, f64)>>> {
        let mut likes = BTreeMap::new();
        for user in users.keys() {
            let liked: Vec<(String, f64)> = self
                .interactions(user)
                .await?
                .into_iter()
                .filter(|(_, weight)| *weight > 0.0)
                .collect();
            likes.insert(user.clone(), liked);
        }
        Ok(likes)
    }

    /// Details for list views: at most [`LISTED_ACTORS`] actors, heaviest catalog edge first.
    pub async fn movie_summary(&self, movie: Movie) -> StoreResult<MovieDetails> {
        let profile = self.item_profile(&movie.id).await?;
        let mut details = self.details_from(movie, &profile);
        details.actors = profile.top(AttributeCategory::Actor, LISTED_ACTORS);
        Ok(details)
    }

    pub async fn movie_details(&self, movie: Movie) -> StoreResult<MovieDetails> {
        let profile = self.item_profile(&movie.id).await?;
        Ok(self.details_from(movie, &profile))
    }

    fn details_from(&self, movie: Movie, profile: &ItemProfile) -> MovieDetails {
        let names = |category: AttributeCategory| {
            sorted_names(
                profile
                    .attributes(category)
                    .iter()
                    .map(|(name, _)| name.clone()),
            )
        };

        MovieDetails {
            genres: names(AttributeCategory::Genre),
            actors: names(AttributeCategory::Actor),
            directors: names(AttributeCategory::Director),
            seasons: names(AttributeCategory::Season),
            id: movie.id,
            title: movie.title,
            year: movie.year,
            description: movie.description,
            popularity: None,
        }
    }
}

/// Liked subset of an interaction map.
pub(crate) fn liked_set(interactions: &BTreeMap<String, f64>) -> BTreeSet<String> {
    interactions
        .iter()
        .filter(|(_, weight)| **weight > 0.0)
        .map(|(id, _)| id.clone())
        .collect()
}
