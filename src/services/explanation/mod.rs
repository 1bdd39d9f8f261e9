use super::{liked_set, GraphReader};
use crate::algorithms::{self, ItemProfile, PreferenceProfile, ScoreCard};
use crate::config::Config;
use crate::error::{RecError, RecResult};
use crate::models::*;
use crate::store::{GraphStore, StoreHandle};
use crate::utils::validation::validate_id;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Reconstructs which signals would put a movie in front of a user.
pub struct ExplanationService<S: GraphStore> {
    reader: GraphReader<S>,
    config: Arc<Config>,
}

impl<S: GraphStore> ExplanationService<S> {
    pub fn new(store: StoreHandle<S>, config: Arc<Config>) -> Self {
        Self {
            reader: GraphReader::new(store),
            config,
        }
    }

    pub async fn explain(&self, user_id: &str, movie_id: &str) -> RecResult<Explanation> {
        validate_id("user", user_id)?;
        validate_id("movie", movie_id)?;

        if !self.reader.user_exists(user_id).await? {
            return Err(RecError::NotFound(format!("user {}", user_id)));
        }
        let movie = self
            .reader
            .movie(movie_id)
            .await?
            .ok_or_else(|| RecError::NotFound(format!("movie {}", movie_id)))?;

        let preferences = self.reader.preferences(user_id).await?;
        let profile = self.reader.item_profile(movie_id).await?;
        let interactions = self.reader.interactions(user_id).await?;
        let likers = self.reader.likers(movie_id).await?;

        let settings = &self.config.recommendation;
        let similar = self
            .reader
            .similar_users(user_id, &liked_set(&interactions), settings.min_shared_likes)
            .await?;
        let similar_users_liked = likers.keys().filter(|u| similar.contains_key(*u)).count();

        let their_likes = self.reader.likes_of(&similar).await?;
        let collaborative = algorithms::collaborative_scores(
            &similar,
            &their_likes,
            &BTreeSet::new(),
            settings.collaborative_damping,
        );

        let counts = self.reader.popularity(&self.reader.movies().await?).await?;
        let popularity = algorithms::normalize_popularity(&counts);

        let card = ScoreCard {
            content: algorithms::content_score(&preferences, &profile, &settings.content_weights),
            collaborative: collaborative.get(movie_id).copied().unwrap_or(0.0),
            contextual: algorithms::season_affinity(&preferences, &profile, settings.seasonal_boost),
            popularity: popularity.get(movie_id).copied().unwrap_or(0.0),
        };

        let threshold = self.config.explanation.materiality_threshold;
        let matched = |category| matched_attributes(&preferences, &profile, category, threshold);

        let explanation = Explanation {
            movie: MovieRef {
                id: movie.id,
                title: movie.title,
            },
            matched_genres: matched(AttributeCategory::Genre),
            matched_actors: matched(AttributeCategory::Actor),
            matched_directors: matched(AttributeCategory::Director),
            matched_seasons: matched(AttributeCategory::Season),
            similar_users_liked,
            positive_interactions: likers.len(),
            is_popular: likers.len() >= self.config.explanation.popular_min_likes,
            already_interacted: interactions.contains_key(movie_id),
            breakdown: ScoreBreakdown {
                content: card.content,
                collaborative: card.collaborative,
                contextual: card.contextual,
                popularity: card.popularity,
                total: card.total(&settings.stage_weights),
            },
        };

        info!(
            user_id,
            movie_id,
            genres = explanation.matched_genres.len(),
            directors = explanation.matched_directors.len(),
            actors = explanation.matched_actors.len(),
            similar_users_liked,
            "Explained recommendation"
        );
        Ok(explanation)
    }
}

/// Item attributes whose user preference reaches `threshold`, strongest first.
fn matched_attributes(
    preferences: &PreferenceProfile,
    profile: &ItemProfile,
    category: AttributeCategory,
    threshold: f64,
) -> Vec<MatchedAttribute> {
    let mut matched: Vec<MatchedAttribute> = profile
        .attributes(category)
        .iter()
        .filter_map(|(name, _)| {
            let weight = preferences.weight(category, name)?;
            (weight >= threshold).then(|| MatchedAttribute {
                name: name.clone(),
                weight,
            })
        })
        .collect();
    matched.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.name.cmp(&b.name)));
    matched
}
