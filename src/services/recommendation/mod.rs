use super::{liked_set, GraphReader};
use crate::algorithms::{self, ItemProfile, PreferenceProfile, ScoreBoard};
use crate::config::Config;
use crate::error::{RecResult, StoreResult};
use crate::models::*;
use crate::store::{GraphStore, StoreHandle};
use crate::utils::{round_to, validation::{validate_id, validate_limit}};
use chrono::Utc;
use futures::future::try_join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

const TOP_GENRES: usize = 3;
const TOP_ACTORS: usize = 2;

/// Everything the stages need about one user, read once per request.
struct UserContext {
    preferences: PreferenceProfile,
    seen: BTreeSet<String>,
    liked: BTreeSet<String>,
}

/// Ranks unseen movies by blending content, collaborative, contextual and
/// popularity signals, then pads with unseen catalog movies in title order.
///
/// Read-only: safe to retry, and may observe a slightly stale graph while
/// feedback is being written.
pub struct RecommendationService<S: GraphStore> {
    reader: GraphReader<S>,
    config: Arc<Config>,
}

impl<S: GraphStore> RecommendationService<S> {
    pub fn new(store: StoreHandle<S>, config: Arc<Config>) -> Self {
        Self {
            reader: GraphReader::new(store),
            config,
        }
    }

    pub async fn get_recommendations(
        &self,
        request: &RecommendationRequest,
    ) -> RecResult<RecommendationResponse> {
        validate_id("user", &request.user_id)?;
        let limit = validate_limit(request.limit, self.config.recommendation.max_limit)?;
        let user_id = request.user_id.as_str();

        let user = self.user_context(user_id).await?;
        let movies = self.reader.movies().await?;
        let titles: BTreeMap<String, String> = movies
            .iter()
            .map(|m| (m.id.clone(), m.title.clone()))
            .collect();
        let candidates: Vec<&Movie> = movies
            .iter()
            .filter(|m| !user.seen.contains(&m.id))
            .collect();

        if candidates.is_empty() {
            info!(user_id, "No unseen movies left to recommend");
            return Ok(self.response(user_id, Vec::new()));
        }

        let (profiles, collaborative, popularity) = futures::try_join!(
            self.candidate_profiles(&candidates),
            self.collaborative_stage(user_id, &user),
            self.popularity_stage(&movies, &user.seen),
        )?;

        let settings = &self.config.recommendation;

        let mut board = ScoreBoard::new();
        for movie in &candidates {
            let Some(profile) = profiles.get(&movie.id) else {
                continue;
            };
            let content = algorithms::content_score(&user.preferences, profile, &settings.content_weights);
            board.add(&movie.id, Stage::Content, content);

            let contextual = match &request.season {
                Some(season) => {
                    algorithms::seasonal_score(season, &user.preferences, profile, settings.seasonal_boost)
                }
                None => algorithms::season_affinity(&user.preferences, profile, settings.seasonal_boost),
            };
            board.add(&movie.id, Stage::Contextual, contextual);
        }
        board.merge(Stage::Collaborative, &collaborative);
        board.merge(Stage::Popularity, &popularity);

        let ranked = board.rank(&settings.stage_weights, &titles);
        debug!(
            user_id,
            scored = board.len(),
            collaborative = collaborative.len(),
            popular = popularity.len(),
            "Blended recommendation stages"
        );

        let mut recommendations: Vec<ScoredItem> = Vec::with_capacity(limit);
        let mut emitted: BTreeSet<&str> = BTreeSet::new();
        let by_id: BTreeMap<&str, &Movie> = candidates.iter().map(|m| (m.id.as_str(), *m)).collect();

        for item in ranked.iter().take(limit) {
            if let Some(movie) = by_id.get(item.item_id.as_str()) {
                emitted.insert(movie.id.as_str());
                recommendations.push(scored_item(movie, &profiles, item.total, item.sources.clone()));
            }
        }

        let blended = recommendations.len();
        if recommendations.len() < limit {
            let mut fallback: Vec<&Movie> = candidates
                .iter()
                .copied()
                .filter(|m| !emitted.contains(m.id.as_str()))
                .collect();
            fallback.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));

            for movie in fallback.into_iter().take(limit - recommendations.len()) {
                recommendations.push(scored_item(movie, &profiles, 0.0, vec![Stage::Catalog]));
            }
        }

        info!(
            user_id,
            limit,
            blended,
            fallback = recommendations.len() - blended,
            "Generated recommendations"
        );
        Ok(self.response(user_id, recommendations))
    }

    async fn user_context(&self, user_id: &str) -> StoreResult<UserContext> {
        if !self.reader.user_exists(user_id).await? {
            debug!(user_id, "Unknown user, treating as cold start");
            return Ok(UserContext {
                preferences: PreferenceProfile::default(),
                seen: BTreeSet::new(),
                liked: BTreeSet::new(),
            });
        }

        let interactions = self.reader.interactions(user_id).await?;
        Ok(UserContext {
            preferences: self.reader.preferences(user_id).await?,
            liked: liked_set(&interactions),
            seen: interactions.into_keys().collect(),
        })
    }

    async fn candidate_profiles(&self, candidates: &[&Movie]) -> StoreResult<BTreeMap<String, ItemProfile>> {
        let profiles = try_join_all(candidates.iter().map(|m| self.reader.item_profile(&m.id))).await?;
        Ok(candidates
            .iter()
            .map(|m| m.id.clone())
            .zip(profiles)
            .collect())
    }

    async fn collaborative_stage(&self, user_id: &str, user: &UserContext) -> StoreResult<BTreeMap<String, f64>> {
        if user.liked.is_empty() {
            return Ok(BTreeMap::new());
        }

        let settings = &self.config.recommendation;
        let similar = self
            .reader
            .similar_users(user_id, &user.liked, settings.min_shared_likes)
            .await?;
        if similar.is_empty() {
            return Ok(BTreeMap::new());
        }

        let their_likes = self.reader.likes_of(&similar).await?;
        Ok(algorithms::collaborative_scores(
            &similar,
            &their_likes,
            &user.seen,
            settings.collaborative_damping,
        ))
    }

    /// Like counts scaled against the most liked movie in the catalog.
    async fn popularity_stage(
        &self,
        movies: &[Movie],
        seen: &BTreeSet<String>,
    ) -> StoreResult<BTreeMap<String, f64>> {
        let counts = self.reader.popularity(movies).await?;
        let mut scaled = algorithms::normalize_popularity(&counts);
        scaled.retain(|id, _| !seen.contains(id));
        Ok(scaled)
    }

    fn response(&self, user_id: &str, recommendations: Vec<ScoredItem>) -> RecommendationResponse {
        RecommendationResponse {
            user_id: user_id.to_string(),
            recommendations,
            generated_at: Utc::now(),
        }
    }
}

fn scored_item(
    movie: &Movie,
    profiles: &BTreeMap<String, ItemProfile>,
    score: f64,
    sources: Vec<Stage>,
) -> ScoredItem {
    let profile = profiles.get(&movie.id).cloned().unwrap_or_default();
    ScoredItem {
        id: movie.id.clone(),
        title: movie.title.clone(),
        year: movie.year,
        score: round_to(score, 2),
        genres: profile.top(AttributeCategory::Genre, TOP_GENRES),
        actors: profile.top(AttributeCategory::Actor, TOP_ACTORS),
        director: profile.top(AttributeCategory::Director, 1).into_iter().next(),
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecError;
    use crate::services::catalog::{CatalogSeed, CatalogService};
    use crate::services::feedback::PreferenceService;
    use crate::store::InMemoryGraphStore;
    use std::time::Duration;

    const SEED: &str = r#"{
        "users": [{"id": "u1"}, {"id": "u2"}, {"id": "u3"}],
        "movies": [
            {"id": "m1", "title": "Heat", "year": 1995, "genres": ["Crime", "Drama"], "directors": ["Michael Mann"]},
            {"id": "m2", "title": "Collateral", "year": 2004, "genres": ["Crime"], "directors": ["Michael Mann"]},
            {"id": "m3", "title": "Elf", "year": 2003, "genres": ["Comedy"], "seasons": ["Christmas"]},
            {"id": "m4", "title": "Alien", "year": 1979, "genres": ["Horror"]},
            {"id": "m5", "title": "Zodiac", "year": 2007, "genres": ["Drama"]}
        ]
    }"#;

    async fn setup() -> (PreferenceService<InMemoryGraphStore>, RecommendationService<InMemoryGraphStore>) {
        let config = Arc::new(Config::default());
        let handle = StoreHandle::new(Arc::new(InMemoryGraphStore::new()), Duration::from_secs(1));
        let seed: CatalogSeed = serde_json::from_str(SEED).unwrap();
        CatalogService::new(handle.clone()).seed(seed).await.unwrap();
        (
            PreferenceService::new(handle.clone(), config.clone()),
            RecommendationService::new(handle, config),
        )
    }

    fn ids(response: &RecommendationResponse) -> Vec<&str> {
        response.recommendations.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_cold_start_falls_back_to_title_order() {
        let (_, service) = setup().await;
        let response = service
            .get_recommendations(&RecommendationRequest::new("u1", 3))
            .await
            .unwrap();
        assert_eq!(ids(&response), vec!["m4", "m2", "m3"]);
        assert!(response
            .recommendations
            .iter()
            .all(|r| r.sources == vec![Stage::Catalog] && r.score == 0.0));
    }

    #[tokio::test]
    async fn test_content_match_outranks_unrelated() {
        let (feedback, service) = setup().await;
        feedback.record_feedback("u1", "m1", "like").await.unwrap();

        let response = service
            .get_recommendations(&RecommendationRequest::new("u1", 10))
            .await
            .unwrap();
        let ranked = ids(&response);
        assert!(!ranked.contains(&"m1"));
        assert_eq!(ranked.len(), 4);
        // Collateral shares genre and director, Zodiac only a genre
        assert_eq!(&ranked[..2], &["m2", "m5"]);
        assert_eq!(response.recommendations[0].director.as_deref(), Some("Michael Mann"));
        assert_eq!(response.recommendations[0].sources, vec![Stage::Content]);
    }

    #[tokio::test]
    async fn test_collaborative_signal_surfaces_peer_likes() {
        let (feedback, service) = setup().await;
        for user in ["u1", "u2"] {
            feedback.record_feedback(user, "m1", "like").await.unwrap();
            feedback.record_feedback(user, "m4", "like").await.unwrap();
        }
        feedback.record_feedback("u2", "m3", "like").await.unwrap();

        let response = service
            .get_recommendations(&RecommendationRequest::new("u1", 3))
            .await
            .unwrap();
        let elf = response
            .recommendations
            .iter()
            .find(|r| r.id == "m3")
            .unwrap();
        assert!(elf.sources.contains(&Stage::Collaborative));
        assert!(elf.sources.contains(&Stage::Popularity));
    }

    #[tokio::test]
    async fn test_requested_season_boosts_matching_items() {
        let (_, service) = setup().await;
        let response = service
            .get_recommendations(&RecommendationRequest::new("u1", 1).with_season("christmas"))
            .await
            .unwrap();
        assert_eq!(ids(&response), vec!["m3"]);
        assert_eq!(response.recommendations[0].sources, vec![Stage::Contextual]);
        assert_eq!(response.recommendations[0].score, 0.05);
    }

    #[tokio::test]
    async fn test_everything_seen_returns_empty() {
        let (feedback, service) = setup().await;
        for movie in ["m1", "m2", "m3", "m4", "m5"] {
            feedback.record_feedback("u3", movie, "dislike").await.unwrap();
        }
        let response = service
            .get_recommendations(&RecommendationRequest::new("u3", 5))
            .await
            .unwrap();
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_is_rejected() {
        let (_, service) = setup().await;
        let err = service
            .get_recommendations(&RecommendationRequest::new("u1", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecError::InvalidArgument(_)));
    }
}
