use crate::error::RecError;
use crate::store::EdgeType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of descriptive attributes a movie links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeCategory {
    Genre,
    Director,
    Actor,
    Season,
}

impl AttributeCategory {
    pub const ALL: [AttributeCategory; 4] = [
        AttributeCategory::Genre,
        AttributeCategory::Director,
        AttributeCategory::Actor,
        AttributeCategory::Season,
    ];

    /// Movie -> attribute edge.
    pub fn catalog_edge(self) -> EdgeType {
        match self {
            AttributeCategory::Genre => EdgeType::HasGenre,
            AttributeCategory::Director => EdgeType::DirectedBy,
            AttributeCategory::Actor => EdgeType::HasActor,
            AttributeCategory::Season => EdgeType::AppropriateForSeason,
        }
    }

    /// User -> attribute edge.
    pub fn preference_edge(self) -> EdgeType {
        match self {
            AttributeCategory::Genre => EdgeType::UserGenrePreference,
            AttributeCategory::Director => EdgeType::UserDirectorPreference,
            AttributeCategory::Actor => EdgeType::UserActorPreference,
            AttributeCategory::Season => EdgeType::UserSeasonPreference,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttributeCategory::Genre => "genre",
            AttributeCategory::Director => "director",
            AttributeCategory::Actor => "actor",
            AttributeCategory::Season => "season",
        }
    }
}

impl fmt::Display for AttributeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Like,
    Dislike,
}

impl FeedbackType {
    pub fn signed_weight(self) -> f64 {
        match self {
            FeedbackType::Like => 1.0,
            FeedbackType::Dislike => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackType::Like => "like",
            FeedbackType::Dislike => "dislike",
        }
    }
}

impl FromStr for FeedbackType {
    type Err = RecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "like" => Ok(FeedbackType::Like),
            "dislike" => Ok(FeedbackType::Dislike),
            other => Err(RecError::InvalidArgument(format!(
                "feedback type must be 'like' or 'dislike', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            email: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub description: String,
}

impl Movie {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            year: None,
            description: String::new(),
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub category: AttributeCategory,
    pub name: String,
}

/// A single like/dislike signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub user_id: String,
    pub movie_id: String,
    #[serde(rename = "type")]
    pub feedback: String,
}

impl FeedbackEvent {
    pub fn new(user_id: impl Into<String>, movie_id: impl Into<String>, feedback: FeedbackType) -> Self {
        Self {
            user_id: user_id.into(),
            movie_id: movie_id.into(),
            feedback: feedback.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeUpdate {
    pub name: String,
    /// New accumulated user preference, when preference edges are updated.
    pub preference_weight: Option<f64>,
    /// New catalog edge weight, when catalog edges drift.
    pub catalog_weight: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    pub count: usize,
    pub attributes: Vec<AttributeUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatedCategories {
    pub genre: CategoryUpdate,
    pub director: CategoryUpdate,
    pub actor: CategoryUpdate,
    pub season: CategoryUpdate,
}

impl UpdatedCategories {
    pub fn get(&self, category: AttributeCategory) -> &CategoryUpdate {
        match category {
            AttributeCategory::Genre => &self.genre,
            AttributeCategory::Director => &self.director,
            AttributeCategory::Actor => &self.actor,
            AttributeCategory::Season => &self.season,
        }
    }

    pub fn get_mut(&mut self, category: AttributeCategory) -> &mut CategoryUpdate {
        match category {
            AttributeCategory::Genre => &mut self.genre,
            AttributeCategory::Director => &mut self.director,
            AttributeCategory::Actor => &mut self.actor,
            AttributeCategory::Season => &mut self.season,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub movie: MovieRef,
    pub feedback: FeedbackType,
    pub weight: f64,
    pub user_provisioned: bool,
    pub updated: UpdatedCategories,
    pub recorded_at: DateTime<Utc>,
}

/// Ranking signal that contributed to a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Content,
    Collaborative,
    Contextual,
    Popularity,
    Catalog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    pub limit: usize,
    /// Seasonal context; without one, every season the user likes contributes.
    pub season: Option<String>,
}

impl RecommendationRequest {
    pub fn new(user_id: impl Into<String>, limit: usize) -> Self {
        Self {
            user_id: user_id.into(),
            limit,
            season: None,
        }
    }

    pub fn with_season(mut self, season: impl Into<String>) -> Self {
        self.season = Some(season.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    /// Rounded to two decimals for display.
    pub score: f64,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub director: Option<String>,
    pub sources: Vec<Stage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: String,
    pub recommendations: Vec<ScoredItem>,
    pub generated_at: DateTime<Utc>,
}

impl RecommendationResponse {
    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedAttribute {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub content: f64,
    pub collaborative: f64,
    pub contextual: f64,
    pub popularity: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub movie: MovieRef,
    pub matched_genres: Vec<MatchedAttribute>,
    pub matched_actors: Vec<MatchedAttribute>,
    pub matched_directors: Vec<MatchedAttribute>,
    pub matched_seasons: Vec<MatchedAttribute>,
    pub similar_users_liked: usize,
    pub positive_interactions: usize,
    pub is_popular: bool,
    pub already_interacted: bool,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDetails {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub description: String,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub directors: Vec<String>,
    pub seasons: Vec<String>,
    /// Positive interaction count, when the query ranks by it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<usize>,
}

impl MovieDetails {
    pub fn names(&self, category: AttributeCategory) -> &[String] {
        match category {
            AttributeCategory::Genre => &self.genres,
            AttributeCategory::Actor => &self.actors,
            AttributeCategory::Director => &self.directors,
            AttributeCategory::Season => &self.seasons,
        }
    }
}
