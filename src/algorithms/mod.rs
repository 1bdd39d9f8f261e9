//! Pure scoring logic shared by the recommendation and explanation services.
//!
//! Nothing here touches the store; inputs are plain maps gathered by the
//! services so the math stays easy to test.

pub mod collaborative;
pub mod content;

use crate::config::StageWeights;
use crate::models::{AttributeCategory, Stage};
use std::collections::BTreeMap;

pub use collaborative::{collaborative_scores, similar_users};
pub use content::{content_score, season_affinity, seasonal_score, BASELINE_CATALOG_WEIGHT};

/// A user's accumulated preference weights, keyed by category then attribute name.
#[derive(Debug, Clone, Default)]
pub struct PreferenceProfile {
    weights: BTreeMap<AttributeCategory, BTreeMap<String, f64>>,
}

impl PreferenceProfile {
    pub fn insert(&mut self, category: AttributeCategory, name: impl Into<String>, weight: f64) {
        self.weights.entry(category).or_default().insert(name.into(), weight);
    }

    pub fn weight(&self, category: AttributeCategory, name: &str) -> Option<f64> {
        self.weights.get(&category)?.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.values().all(|m| m.is_empty())
    }

    /// Positive preferences in a category, by name.
    pub fn positive(&self, category: AttributeCategory) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.weights
            .get(&category)
            .into_iter()
            .flatten()
            .filter(|(_, w)| **w > 0.0)
            .map(|(name, w)| (name.as_str(), *w))
    }
}

/// Catalog attributes of one movie with their catalog edge weights.
#[derive(Debug, Clone, Default)]
pub struct ItemProfile {
    attributes: BTreeMap<AttributeCategory, Vec<(String, f64)>>,
}

impl ItemProfile {
    pub fn insert(&mut self, category: AttributeCategory, name: impl Into<String>, weight: f64) {
        self.attributes
            .entry(category)
            .or_default()
            .push((name.into(), weight));
    }

    pub fn attributes(&self, category: AttributeCategory) -> &[(String, f64)] {
        self.attributes
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Up to `n` names, heaviest catalog edge first.
    pub fn top(&self, category: AttributeCategory, n: usize) -> Vec<String> {
        let mut attrs = self.attributes(category).to_vec();
        attrs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        attrs.into_iter().take(n).map(|(name, _)| name).collect()
    }
}

/// Per-stage raw scores for one candidate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreCard {
    pub content: f64,
    pub collaborative: f64,
    pub contextual: f64,
    pub popularity: f64,
}

impl ScoreCard {
    pub fn add(&mut self, stage: Stage, value: f64) {
        match stage {
            Stage::Content => self.content += value,
            Stage::Collaborative => self.collaborative += value,
            Stage::Contextual => self.contextual += value,
            Stage::Popularity => self.popularity += value,
            Stage::Catalog => {}
        }
    }

    /// Weighted sum of the stages driven by the user's own history.
    pub fn personal(&self, weights: &StageWeights) -> f64 {
        self.content * weights.content
            + self.collaborative * weights.collaborative
            + self.contextual * weights.contextual
    }

    pub fn total(&self, weights: &StageWeights) -> f64 {
        self.personal(weights) + self.popularity * weights.popularity
    }

    pub fn sources(&self) -> Vec<Stage> {
        [
            (Stage::Content, self.content),
            (Stage::Collaborative, self.collaborative),
            (Stage::Contextual, self.contextual),
            (Stage::Popularity, self.popularity),
        ]
        .into_iter()
        .filter(|(_, v)| *v > 0.0)
        .map(|(stage, _)| stage)
        .collect()
    }
}

/// Blended scores keyed by item id.
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    cards: BTreeMap<String, ScoreCard>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item_id: &str, stage: Stage, value: f64) {
        if value <= 0.0 {
            return;
        }
        self.cards
            .entry(item_id.to_string())
            .or_default()
            .add(stage, value);
    }

    pub fn merge(&mut self, stage: Stage, scores: &BTreeMap<String, f64>) {
        for (item_id, value) in scores {
            self.add(item_id, stage, *value);
        }
    }

    pub fn get(&self, item_id: &str) -> Option<&ScoreCard> {
        self.cards.get(item_id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Ranks items by personal score, highest first. Popularity only orders
    /// items whose personal scores are equal; remaining ties go by title, then id.
    pub fn rank(&self, weights: &StageWeights, titles: &BTreeMap<String, String>) -> Vec<RankedItem> {
        let mut ranked: Vec<RankedItem> = self
            .cards
            .iter()
            .map(|(id, card)| RankedItem {
                item_id: id.clone(),
                personal: card.personal(weights),
                popularity: card.popularity,
                total: card.total(weights),
                sources: card.sources(),
            })
            .filter(|item| item.total > 0.0)
            .collect();

        ranked.sort_by(|a, b| {
            b.personal
                .total_cmp(&a.personal)
                .then_with(|| b.popularity.total_cmp(&a.popularity))
                .then_with(|| titles.get(&a.item_id).cmp(&titles.get(&b.item_id)))
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        ranked
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedItem {
    pub item_id: String,
    pub personal: f64,
    pub popularity: f64,
    pub total: f64,
    pub sources: Vec<Stage>,
}

/// Scales positive-interaction counts into `[0, 1)` against the busiest movie.
pub fn normalize_popularity(counts: &BTreeMap<String, usize>) -> BTreeMap<String, f64> {
    let max = counts.values().copied().max().unwrap_or(0) as f64;
    counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(id, count)| (id.clone(), *count as f64 / (max + 1.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecommendationConfig;

    #[test]
    fn test_rank_breaks_ties_by_title_then_id() {
        let weights = RecommendationConfig::default().stage_weights;
        let mut board = ScoreBoard::new();
        board.add("m3", Stage::Content, 0.2);
        board.add("m1", Stage::Content, 0.2);
        board.add("m2", Stage::Content, 0.2);
        board.add("m4", Stage::Content, 0.5);

        let titles: BTreeMap<String, String> =
            [("m1", "Zodiac"), ("m2", "Alien"), ("m3", "Alien"), ("m4", "Heat")]
                .into_iter()
                .map(|(id, title)| (id.to_string(), title.to_string()))
                .collect();
        let ranked = board.rank(&weights, &titles);
        let ids: Vec<&str> = ranked.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["m4", "m2", "m3", "m1"]);
    }

    #[test]
    fn test_non_positive_contributions_are_ignored() {
        let mut board = ScoreBoard::new();
        board.add("m1", Stage::Content, 0.0);
        board.add("m2", Stage::Collaborative, -0.4);
        assert!(board.is_empty());
    }

    #[test]
    fn test_blend_sums_weighted_stages() {
        let weights = RecommendationConfig::default().stage_weights;
        let mut board = ScoreBoard::new();
        board.add("m1", Stage::Content, 0.05);
        board.add("m1", Stage::Popularity, 0.75);
        let card = board.get("m1").unwrap();
        assert!((card.personal(&weights) - 0.05).abs() < 1e-9);
        assert!((card.total(&weights) - 0.0575).abs() < 1e-9);
        assert_eq!(card.sources(), vec![Stage::Content, Stage::Popularity]);
    }

    #[test]
    fn test_popular_item_never_outranks_personal_match() {
        let weights = RecommendationConfig::default().stage_weights;
        let mut board = ScoreBoard::new();
        board.add("m1", Stage::Content, 0.0001);
        board.add("m2", Stage::Popularity, 0.99);
        board.add("m3", Stage::Popularity, 0.5);

        let titles = BTreeMap::new();
        let ranked = board.rank(&weights, &titles);
        let ids: Vec<&str> = ranked.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_normalize_popularity_stays_below_one() {
        let counts: BTreeMap<String, usize> = [("m1", 0), ("m2", 3), ("m3", 1)]
            .into_iter()
            .map(|(id, n)| (id.to_string(), n))
            .collect();
        let scaled = normalize_popularity(&counts);
        assert!(!scaled.contains_key("m1"));
        assert!((scaled["m2"] - 0.75).abs() < 1e-9);
        assert!((scaled["m3"] - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_positive_preferences_skip_negative_weights() {
        let mut profile = PreferenceProfile::default();
        profile.insert(AttributeCategory::Season, "Winter", -0.2);
        assert_eq!(profile.positive(AttributeCategory::Season).count(), 0);

        profile.insert(AttributeCategory::Season, "Summer", 0.05);
        let liked: Vec<(&str, f64)> = profile.positive(AttributeCategory::Season).collect();
        assert_eq!(liked, vec![("Summer", 0.05)]);
    }
}
