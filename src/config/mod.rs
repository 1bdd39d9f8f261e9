use crate::models::AttributeCategory;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub feedback: FeedbackConfig,
    pub recommendation: RecommendationConfig,
    pub explanation: ExplanationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound for a single store read or transaction.
    pub query_timeout_ms: u64,
    /// JSON catalog loaded into the in-memory store at start-up.
    pub catalog_path: Option<String>,
}

impl StoreConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// How unknown users are handled when they send feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserPolicy {
    Strict,
    AutoProvision,
}

/// Which edge family absorbs the delta of a feedback event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftPolicy {
    /// Only the user's preference edges accumulate.
    Preference,
    /// Only the item's catalog edges drift.
    Catalog,
    Both,
}

impl DriftPolicy {
    pub fn updates_preferences(self) -> bool {
        matches!(self, DriftPolicy::Preference | DriftPolicy::Both)
    }

    pub fn updates_catalog(self) -> bool {
        matches!(self, DriftPolicy::Catalog | DriftPolicy::Both)
    }
}

/// One scalar per attribute category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub genre: f64,
    pub director: f64,
    pub actor: f64,
    pub season: f64,
}

impl CategoryWeights {
    pub fn get(&self, category: AttributeCategory) -> f64 {
        match category {
            AttributeCategory::Genre => self.genre,
            AttributeCategory::Director => self.director,
            AttributeCategory::Actor => self.actor,
            AttributeCategory::Season => self.season,
        }
    }

    pub fn sum(&self) -> f64 {
        AttributeCategory::ALL.iter().map(|c| self.get(*c)).sum()
    }

    fn any_negative(&self) -> bool {
        AttributeCategory::ALL.iter().any(|c| self.get(*c) < 0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    pub user_policy: UserPolicy,
    pub drift_policy: DriftPolicy,
    /// Delta applied per category is `signed_weight * coefficient`.
    pub coefficients: CategoryWeights,
    /// Lower bound for drifted catalog edge weights.
    pub catalog_floor: f64,
    /// Lets catalog drift go below `catalog_floor`.
    pub allow_negative_drift: bool,
}

impl FeedbackConfig {
    /// Clamp applied to drifted catalog weights, if any.
    pub fn drift_floor(&self) -> Option<f64> {
        (!self.allow_negative_drift).then_some(self.catalog_floor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageWeights {
    pub content: f64,
    pub collaborative: f64,
    pub contextual: f64,
    pub popularity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    /// Multipliers applied to matching preference weights in the content stage.
    pub content_weights: CategoryWeights,
    /// Shared liked items needed before another user counts as similar.
    pub min_shared_likes: usize,
    pub collaborative_damping: f64,
    /// Base boost for items appropriate for the active season.
    pub seasonal_boost: f64,
    pub stage_weights: StageWeights,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationConfig {
    /// Preference weights at or above this value are reported as matches.
    pub materiality_threshold: f64,
    /// Positive interactions needed for an item to count as popular.
    pub popular_min_likes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: num_cpus::get(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 5_000,
            catalog_path: None,
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            user_policy: UserPolicy::Strict,
            drift_policy: DriftPolicy::Preference,
            coefficients: CategoryWeights {
                genre: 0.10,
                director: 0.10,
                actor: 0.07,
                season: 0.05,
            },
            catalog_floor: 0.0,
            allow_negative_drift: false,
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            content_weights: CategoryWeights {
                genre: 0.5,
                director: 0.3,
                actor: 0.25,
                season: 0.15,
            },
            min_shared_likes: 2,
            collaborative_damping: 0.1,
            seasonal_boost: 0.05,
            stage_weights: StageWeights {
                content: 1.0,
                collaborative: 1.0,
                contextual: 1.0,
                popularity: 0.01,
            },
        }
    }
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            materiality_threshold: 0.1,
            popular_min_likes: 3,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("CINEGRAPH").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the bound on total influence a single feedback event may have.
    pub fn validate(&self) -> anyhow::Result<()> {
        let coefficients = &self.feedback.coefficients;
        if coefficients.any_negative() {
            anyhow::bail!("feedback coefficients must be non-negative");
        }

        let families = match self.feedback.drift_policy {
            DriftPolicy::Both => 2.0,
            _ => 1.0,
        };
        let influence = coefficients.sum() * families;
        if influence > 1.0 + f64::EPSILON {
            anyhow::bail!(
                "feedback coefficients bound a single event to {:.3}, which exceeds 1.0",
                influence
            );
        }

        if self.recommendation.content_weights.any_negative() {
            anyhow::bail!("content weights must be non-negative");
        }
        if self.recommendation.max_limit == 0 {
            anyhow::bail!("recommendation.max_limit must be greater than 0");
        }
        if self.recommendation.min_shared_likes == 0 {
            anyhow::bail!("recommendation.min_shared_likes must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!((config.feedback.coefficients.sum() - 0.32).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_unbounded_coefficients() {
        let mut config = Config::default();
        config.feedback.coefficients.genre = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_both_policy_doubles_the_bound() {
        let mut config = Config::default();
        config.feedback.drift_policy = DriftPolicy::Both;
        assert!(config.validate().is_ok());

        config.feedback.coefficients.actor = 0.30;
        assert!(config.validate().is_err());
    }

    fn from_toml(raw: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_negative_drift_is_configurable_from_toml() {
        let config = from_toml(
            r#"
            [feedback]
            drift_policy = "catalog"
            allow_negative_drift = true
            "#,
        );
        assert_eq!(config.feedback.drift_policy, DriftPolicy::Catalog);
        assert_eq!(config.feedback.drift_floor(), None);

        let config = from_toml(
            r#"
            [feedback]
            catalog_floor = 0.2
            "#,
        );
        assert_eq!(config.feedback.drift_floor(), Some(0.2));
        assert_eq!(Config::default().feedback.drift_floor(), Some(0.0));
    }
}
