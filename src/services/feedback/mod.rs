use crate::config::{Config, FeedbackConfig, UserPolicy};
use crate::error::{RecResult, StoreError, StoreResult};
use crate::models::*;
use crate::store::{Direction, Edge, EdgeType, GraphStore, Node, NodeKey, StoreHandle, Transaction};
use crate::utils::{apply_delta, validation::validate_id};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Applies feedback events to the preference graph.
///
/// Each event runs as one store transaction: the interaction edge, every
/// preference edge and every drifted catalog edge commit together or not at all.
/// Failed calls are never retried here; replaying an ambiguous commit would
/// add the deltas twice.
pub struct PreferenceService<S: GraphStore> {
    store: StoreHandle<S>,
    config: Arc<Config>,
}

impl<S: GraphStore> PreferenceService<S> {
    pub fn new(store: StoreHandle<S>, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    pub async fn record_feedback(
        &self,
        user_id: &str,
        movie_id: &str,
        feedback_type: &str,
    ) -> RecResult<FeedbackResult> {
        validate_id("user", user_id)?;
        validate_id("movie", movie_id)?;
        let feedback: FeedbackType = feedback_type.parse()?;

        let settings = self.config.feedback.clone();
        let user = user_id.to_string();
        let movie = movie_id.to_string();

        let result = self
            .store
            .run_transaction(move |tx| apply_feedback(tx, &settings, &user, &movie, feedback))
            .await?;

        info!(
            user_id,
            movie_id,
            feedback = %feedback,
            genres = result.updated.genre.count,
            directors = result.updated.director.count,
            actors = result.updated.actor.count,
            seasons = result.updated.season.count,
            provisioned = result.user_provisioned,
            "Recorded feedback"
        );
        Ok(result)
    }

    pub async fn record_event(&self, event: &FeedbackEvent) -> RecResult<FeedbackResult> {
        self.record_feedback(&event.user_id, &event.movie_id, &event.feedback)
            .await
    }
}

fn apply_feedback(
    tx: &mut dyn Transaction,
    settings: &FeedbackConfig,
    user_id: &str,
    movie_id: &str,
    feedback: FeedbackType,
) -> StoreResult<FeedbackResult> {
    let movie_key = NodeKey::movie(movie_id);
    let movie = tx
        .find_node(&movie_key)
        .and_then(|node| node.into_movie())
        .ok_or_else(|| StoreError::MissingNode(movie_key.to_string()))?;

    let user_key = NodeKey::user(user_id);
    let user_provisioned = match settings.user_policy {
        UserPolicy::Strict => {
            if tx.find_node(&user_key).is_none() {
                return Err(StoreError::MissingNode(user_key.to_string()));
            }
            false
        }
        UserPolicy::AutoProvision => {
            let (_, created) = tx.merge_node(Node::User(User::new(user_id)))?;
            created
        }
    };

    let signed = feedback.signed_weight();
    let now = Utc::now();

    let interaction = tx.merge_edge(&user_key, &movie_key, EdgeType::Interacted, 0.0)?;
    tx.set_edge(Edge {
        weight: signed,
        feedback: Some(feedback),
        timestamp: Some(now),
        ..interaction
    })?;

    let mut updated = UpdatedCategories::default();
    for category in AttributeCategory::ALL {
        let delta = signed * settings.coefficients.get(category);
        let attributes = tx.match_neighbors(&movie_key, category.catalog_edge(), Direction::Outgoing);

        let summary = updated.get_mut(category);
        summary.count = attributes.len();

        for neighbor in attributes {
            let attribute_key = neighbor.edge.to.clone();

            let preference_weight = if settings.drift_policy.updates_preferences() {
                let edge = tx.merge_edge(&user_key, &attribute_key, category.preference_edge(), 0.0)?;
                let weight = edge.weight + delta;
                tx.set_edge(Edge { weight, ..edge })?;
                Some(weight)
            } else {
                None
            };

            let catalog_weight = if settings.drift_policy.updates_catalog() {
                let weight = apply_delta(neighbor.edge.weight, delta, settings.drift_floor());
                tx.set_edge(Edge {
                    weight,
                    ..neighbor.edge
                })?;
                Some(weight)
            } else {
                None
            };

            debug!(
                "{} {} -> {} {:?}/{:?}",
                category, user_id, attribute_key.key, preference_weight, catalog_weight
            );
            summary.attributes.push(AttributeUpdate {
                name: attribute_key.key,
                preference_weight,
                catalog_weight,
            });
        }
    }

    Ok(FeedbackResult {
        movie: MovieRef {
            id: movie.id,
            title: movie.title,
        },
        feedback,
        weight: signed,
        user_provisioned,
        updated,
        recorded_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriftPolicy;
    use crate::error::RecError;
    use crate::store::InMemoryGraphStore;
    use std::time::Duration;

    async fn setup(config: Config) -> (Arc<InMemoryGraphStore>, PreferenceService<InMemoryGraphStore>) {
        let store = Arc::new(InMemoryGraphStore::new());
        store
            .run_transaction(|tx| {
                tx.create_node(Node::User(User::new("u1")))?;
                tx.create_node(Node::Movie(Movie::new("m1", "Heat")))?;
                let movie = NodeKey::movie("m1");
                for (category, name) in [
                    (AttributeCategory::Genre, "Crime"),
                    (AttributeCategory::Genre, "Drama"),
                    (AttributeCategory::Director, "Michael Mann"),
                ] {
                    let (node, _) = tx.merge_node(Node::Attribute(Attribute {
                        category,
                        name: name.to_string(),
                    }))?;
                    tx.merge_edge(&movie, &node.key(), category.catalog_edge(), 0.5)?;
                }
                Ok(())
            })
            .await
            .unwrap();

        let handle = StoreHandle::new(store.clone(), Duration::from_secs(1));
        (store, PreferenceService::new(handle, Arc::new(config)))
    }

    #[tokio::test]
    async fn test_like_updates_each_attribute_once() {
        let (store, service) = setup(Config::default()).await;

        let result = service.record_feedback("u1", "m1", "like").await.unwrap();
        assert_eq!(result.movie.title, "Heat");
        assert_eq!(result.updated.genre.count, 2);
        assert_eq!(result.updated.director.count, 1);
        assert_eq!(result.updated.actor.count, 0);
        assert_eq!(result.updated.season.count, 0);

        let prefs = store.edges_of_type(EdgeType::UserGenrePreference);
        assert_eq!(prefs.len(), 2);
        assert!(prefs.iter().all(|e| (e.weight - 0.10).abs() < 1e-9));
    }

    #[tokio::test]
    async fn test_second_opinion_overwrites_interaction() {
        let (store, service) = setup(Config::default()).await;

        service.record_feedback("u1", "m1", "like").await.unwrap();
        service.record_feedback("u1", "m1", "dislike").await.unwrap();

        let interactions = store.edges_of_type(EdgeType::Interacted);
        assert_eq!(interactions.len(), 1);
        assert_eq!(interactions[0].weight, -1.0);
        assert_eq!(interactions[0].feedback, Some(FeedbackType::Dislike));

        let directors = store.edges_of_type(EdgeType::UserDirectorPreference);
        assert_eq!(directors.len(), 1);
        assert!(directors[0].weight.abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_invalid_type_leaves_graph_untouched() {
        let (store, service) = setup(Config::default()).await;
        let before = store.stats();

        let err = service.record_feedback("u1", "m1", "meh").await.unwrap_err();
        assert!(matches!(err, RecError::InvalidArgument(_)));
        assert_eq!(store.stats(), before);
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_unknown_user() {
        let (store, service) = setup(Config::default()).await;
        let before = store.stats();

        let err = service.record_feedback("ghost", "m1", "like").await.unwrap_err();
        assert!(matches!(err, RecError::NotFound(_)));
        assert_eq!(store.stats(), before);
    }

    #[tokio::test]
    async fn test_auto_provision_creates_user_once() {
        let mut config = Config::default();
        config.feedback.user_policy = UserPolicy::AutoProvision;
        let (store, service) = setup(config).await;

        let first = service.record_feedback("newbie", "m1", "like").await.unwrap();
        let second = service.record_feedback("newbie", "m1", "like").await.unwrap();
        assert!(first.user_provisioned);
        assert!(!second.user_provisioned);

        let user = store.find_node(&NodeKey::user("newbie")).await.unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn test_catalog_drift_clamps_at_floor() {
        let mut config = Config::default();
        config.feedback.drift_policy = DriftPolicy::Catalog;
        config.feedback.coefficients.genre = 0.4;
        let (store, service) = setup(config).await;

        service.record_feedback("u1", "m1", "dislike").await.unwrap();
        let result = service.record_feedback("u1", "m1", "dislike").await.unwrap();

        assert!(store.edges_of_type(EdgeType::UserGenrePreference).is_empty());
        for update in &result.updated.genre.attributes {
            assert_eq!(update.preference_weight, None);
            assert_eq!(update.catalog_weight, Some(0.0));
        }
    }

    #[tokio::test]
    async fn test_catalog_drift_may_go_negative_when_allowed() {
        let mut config = Config::default();
        config.feedback.drift_policy = DriftPolicy::Catalog;
        config.feedback.coefficients.genre = 0.4;
        config.feedback.allow_negative_drift = true;
        let (store, service) = setup(config).await;

        service.record_feedback("u1", "m1", "dislike").await.unwrap();
        service.record_feedback("u1", "m1", "dislike").await.unwrap();

        let genres = store.edges_of_type(EdgeType::HasGenre);
        assert_eq!(genres.len(), 2);
        assert!(genres.iter().all(|e| (e.weight + 0.3).abs() < 1e-9));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (store, service) = setup(Config::default()).await;
        store.set_available(false);

        let err = service.record_feedback("u1", "m1", "like").await.unwrap_err();
        assert!(matches!(err, RecError::StoreUnavailable(_)));
    }
}
