use super::{GraphReader, LISTED_ACTORS};
use crate::error::{RecError, RecResult};
use crate::models::*;
use crate::store::{Edge, GraphStore, Node, NodeKey, StoreHandle};
use crate::utils::{contains_ignore_case, validation::{validate_id, validate_keyword}};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::path::Path;
use tracing::info;

/// Relevance of a catalog edge when the seed gives none.
pub const DEFAULT_CATALOG_WEIGHT: f64 = crate::algorithms::BASELINE_CATALOG_WEIGHT;

const SEARCH_LIMIT: usize = 20;
const ADVANCED_SEARCH_LIMIT: usize = 50;

/// Case-insensitive substring filters, all of which must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub actor: Option<String>,
    pub director: Option<String>,
    pub season: Option<String>,
}

impl SearchCriteria {
    fn term(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    fn attribute(&self, category: AttributeCategory) -> Option<&str> {
        Self::term(match category {
            AttributeCategory::Genre => &self.genre,
            AttributeCategory::Actor => &self.actor,
            AttributeCategory::Director => &self.director,
            AttributeCategory::Season => &self.season,
        })
    }

    fn is_empty(&self) -> bool {
        Self::term(&self.title).is_none()
            && AttributeCategory::ALL.iter().all(|c| self.attribute(*c).is_none())
    }

    fn matches(&self, details: &MovieDetails) -> bool {
        if let Some(title) = Self::term(&self.title) {
            if !contains_ignore_case(&details.title, title) {
                return false;
            }
        }
        AttributeCategory::ALL.iter().all(|category| match self.attribute(*category) {
            Some(term) => details
                .names(*category)
                .iter()
                .any(|name| contains_ignore_case(name, term)),
            None => true,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeSeed {
    Name(String),
    Weighted { name: String, weight: f64 },
}

impl AttributeSeed {
    fn parts(&self) -> (&str, f64) {
        match self {
            AttributeSeed::Name(name) => (name, DEFAULT_CATALOG_WEIGHT),
            AttributeSeed::Weighted { name, weight } => (name, *weight),
        }
    }
}

impl From<&str> for AttributeSeed {
    fn from(name: &str) -> Self {
        AttributeSeed::Name(name.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSeed {
    #[serde(flatten)]
    pub movie: Movie,
    #[serde(default)]
    pub genres: Vec<AttributeSeed>,
    #[serde(default)]
    pub directors: Vec<AttributeSeed>,
    #[serde(default)]
    pub actors: Vec<AttributeSeed>,
    #[serde(default)]
    pub seasons: Vec<AttributeSeed>,
}

impl MovieSeed {
    pub fn new(movie: Movie) -> Self {
        Self {
            movie,
            genres: Vec::new(),
            directors: Vec::new(),
            actors: Vec::new(),
            seasons: Vec::new(),
        }
    }

    pub fn with(mut self, category: AttributeCategory, names: &[&str]) -> Self {
        self.attributes_mut(category)
            .extend(names.iter().map(|n| AttributeSeed::from(*n)));
        self
    }

    fn attributes(&self, category: AttributeCategory) -> &[AttributeSeed] {
        match category {
            AttributeCategory::Genre => &self.genres,
            AttributeCategory::Director => &self.directors,
            AttributeCategory::Actor => &self.actors,
            AttributeCategory::Season => &self.seasons,
        }
    }

    fn attributes_mut(&mut self, category: AttributeCategory) -> &mut Vec<AttributeSeed> {
        match category {
            AttributeCategory::Genre => &mut self.genres,
            AttributeCategory::Director => &mut self.directors,
            AttributeCategory::Actor => &mut self.actors,
            AttributeCategory::Season => &mut self.seasons,
        }
    }
}

/// Users and movies to load into an empty or existing graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub movies: Vec<MovieSeed>,
}

impl CatalogSeed {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub users: usize,
    pub movies: usize,
    pub attributes: usize,
    pub catalog_edges: usize,
}

/// Catalog ingestion and the movie lookups exposed next to recommendations.
pub struct CatalogService<S: GraphStore> {
    store: StoreHandle<S>,
    reader: GraphReader<S>,
}

impl<S: GraphStore> CatalogService<S> {
    pub fn new(store: StoreHandle<S>) -> Self {
        Self {
            reader: GraphReader::new(store.clone()),
            store,
        }
    }

    /// Merges the seed in a single transaction. Existing catalog edges take the seeded weight.
    pub async fn seed(&self, seed: CatalogSeed) -> RecResult<SeedSummary> {
        let summary = self
            .store
            .run_transaction(move |tx| {
                let mut summary = SeedSummary::default();

                for user in seed.users {
                    if tx.merge_node(Node::User(user))?.1 {
                        summary.users += 1;
                    }
                }

                for entry in seed.movies {
                    let movie_key = NodeKey::movie(&entry.movie.id);
                    if tx.merge_node(Node::Movie(entry.movie.clone()))?.1 {
                        summary.movies += 1;
                    }

                    for category in AttributeCategory::ALL {
                        for attribute in entry.attributes(category) {
                            let (name, weight) = attribute.parts();
                            let (node, created) = tx.merge_node(Node::Attribute(Attribute {
                                category,
                                name: name.to_string(),
                            }))?;
                            if created {
                                summary.attributes += 1;
                            }

                            let edge = tx.merge_edge(&movie_key, &node.key(), category.catalog_edge(), weight)?;
                            tx.set_edge(Edge { weight, ..edge })?;
                            summary.catalog_edges += 1;
                        }
                    }
                }

                Ok(summary)
            })
            .await?;

        info!(
            users = summary.users,
            movies = summary.movies,
            attributes = summary.attributes,
            catalog_edges = summary.catalog_edges,
            "Seeded catalog"
        );
        Ok(summary)
    }

    pub async fn get_movie(&self, movie_id: &str) -> RecResult<MovieDetails> {
        validate_id("movie", movie_id)?;
        let movie = self
            .reader
            .movie(movie_id)
            .await?
            .ok_or_else(|| RecError::NotFound(format!("movie {}", movie_id)))?;
        Ok(self.reader.movie_details(movie).await?)
    }

    /// Every movie ordered by title, up to `limit`.
    pub async fn all_movies(&self, limit: usize) -> RecResult<Vec<MovieDetails>> {
        let mut movies = self.reader.movies().await?;
        movies.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        self.details(movies.into_iter().take(limit)).await
    }

    /// Sorted names of every genre, actor, director or season in the catalog.
    pub async fn list_attributes(&self, category: AttributeCategory) -> RecResult<Vec<String>> {
        Ok(self.reader.attribute_names(category).await?)
    }

    /// Movies matching every given criterion, by title, at most 50.
    pub async fn advanced_search(&self, criteria: &SearchCriteria) -> RecResult<Vec<MovieDetails>> {
        if criteria.is_empty() {
            return Err(RecError::InvalidArgument(
                "at least one search criterion is required".to_string(),
            ));
        }

        let mut movies = self.reader.movies().await?;
        movies.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));

        let mut matching = Vec::new();
        for movie in movies {
            let profile = self.reader.item_profile(&movie.id).await?;
            let mut details = self.reader.details_from(movie, &profile);
            if criteria.matches(&details) {
                details.actors = profile.top(AttributeCategory::Actor, LISTED_ACTORS);
                matching.push(details);
                if matching.len() == ADVANCED_SEARCH_LIMIT {
                    break;
                }
            }
        }
        Ok(matching)
    }

    /// Most liked movies first, then newest, then by title.
    pub async fn top_movies(&self, limit: usize) -> RecResult<Vec<MovieDetails>> {
        let movies = self.reader.movies().await?;
        let counts = self.reader.popularity(&movies).await?;
        let mut ranked: Vec<(usize, Movie)> = movies
            .into_iter()
            .map(|movie| (counts.get(&movie.id).copied().unwrap_or(0), movie))
            .collect();
        ranked.sort_by(|(a_likes, a), (b_likes, b)| {
            b_likes
                .cmp(a_likes)
                .then_with(|| b.year.cmp(&a.year))
                .then_with(|| a.title.cmp(&b.title))
        });

        let mut details = Vec::new();
        for (likes, movie) in ranked.into_iter().take(limit) {
            let mut movie = self.reader.movie_summary(movie).await?;
            movie.popularity = Some(likes);
            details.push(movie);
        }
        Ok(details)
    }

    pub async fn latest_movies(&self, limit: usize) -> RecResult<Vec<MovieDetails>> {
        let mut movies = self.reader.movies().await?;
        movies.sort_by(|a, b| {
            Reverse(a.year)
                .cmp(&Reverse(b.year))
                .then_with(|| a.title.cmp(&b.title))
        });
        self.details(movies.into_iter().take(limit)).await
    }

    /// Movies appropriate for any season whose name contains `season`.
    pub async fn movies_by_season(&self, season: &str) -> RecResult<Vec<MovieDetails>> {
        let season = validate_keyword(season)?;
        let mut matching = Vec::new();
        for movie in self.reader.movies().await? {
            let details = self.reader.movie_summary(movie).await?;
            if details.seasons.iter().any(|s| contains_ignore_case(s, season)) {
                matching.push(details);
            }
        }
        matching.sort_by(|a, b| b.year.cmp(&a.year).then_with(|| a.title.cmp(&b.title)));
        matching.truncate(SEARCH_LIMIT);
        Ok(matching)
    }

    pub async fn search_movies(&self, keyword: &str) -> RecResult<Vec<MovieDetails>> {
        let keyword = validate_keyword(keyword)?;
        let mut movies: Vec<Movie> = self
            .reader
            .movies()
            .await?
            .into_iter()
            .filter(|m| contains_ignore_case(&m.title, keyword))
            .collect();
        movies.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        self.details(movies.into_iter().take(SEARCH_LIMIT)).await
    }

    async fn details(&self, movies: impl Iterator<Item = Movie>) -> RecResult<Vec<MovieDetails>> {
        let mut details = Vec::new();
        for movie in movies {
            details.push(self.reader.movie_summary(movie).await?);
        }
        Ok(details)
    }
}
