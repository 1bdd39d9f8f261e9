pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{RecError, RecResult, StoreError, StoreResult};
pub use models::*;

use anyhow::Result;
use services::catalog::{CatalogSeed, CatalogService};
use services::explanation::ExplanationService;
use services::feedback::PreferenceService;
use services::recommendation::RecommendationService;
use std::sync::Arc;
use store::{GraphStore, InMemoryGraphStore, StoreHandle};
use tracing::info;

pub struct AppState<S: GraphStore = InMemoryGraphStore> {
    pub config: Arc<Config>,
    pub store: StoreHandle<S>,
    pub preference_service: Arc<PreferenceService<S>>,
    pub recommendation_service: Arc<RecommendationService<S>>,
    pub explanation_service: Arc<ExplanationService<S>>,
    pub catalog_service: Arc<CatalogService<S>>,
}

impl<S: GraphStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            preference_service: self.preference_service.clone(),
            recommendation_service: self.recommendation_service.clone(),
            explanation_service: self.explanation_service.clone(),
            catalog_service: self.catalog_service.clone(),
        }
    }
}

impl AppState<InMemoryGraphStore> {
    /// Builds an in-memory graph and loads `store.catalog_path` when configured.
    pub async fn new(config: Config) -> Result<Self> {
        let catalog_path = config.store.catalog_path.clone();
        let state = Self::with_store(config, Arc::new(InMemoryGraphStore::new()))?;

        if let Some(path) = catalog_path {
            info!("Loading catalog from {}", path);
            let seed = CatalogSeed::from_file(&path)?;
            state.catalog_service.seed(seed).await?;
        }

        Ok(state)
    }
}

impl<S: GraphStore> AppState<S> {
    pub fn with_store(config: Config, store: Arc<S>) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let store = StoreHandle::new(store, config.store.query_timeout());

        let preference_service = Arc::new(PreferenceService::new(store.clone(), config.clone()));
        let recommendation_service =
            Arc::new(RecommendationService::new(store.clone(), config.clone()));
        let explanation_service = Arc::new(ExplanationService::new(store.clone(), config.clone()));
        let catalog_service = Arc::new(CatalogService::new(store.clone()));

        Ok(Self {
            config,
            store,
            preference_service,
            recommendation_service,
            explanation_service,
            catalog_service,
        })
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
