use super::{ItemProfile, PreferenceProfile};
use crate::config::CategoryWeights;
use crate::models::AttributeCategory;

/// Catalog edge weight at which a content term counts at face value.
pub const BASELINE_CATALOG_WEIGHT: f64 = 0.5;

/// Sum of `preference * category weight * relevance` over the item's
/// attributes, keeping positive terms only. Relevance is the catalog edge
/// weight relative to [`BASELINE_CATALOG_WEIGHT`], so drifted catalog edges
/// count for more or less. An item with no positive match scores 0.
pub fn content_score(
    preferences: &PreferenceProfile,
    item: &ItemProfile,
    weights: &CategoryWeights,
) -> f64 {
    AttributeCategory::ALL
        .iter()
        .map(|category| {
            let factor = weights.get(*category);
            item.attributes(*category)
                .iter()
                .filter_map(|(name, catalog)| {
                    let pref = preferences.weight(*category, name)?;
                    Some(pref * factor * catalog / BASELINE_CATALOG_WEIGHT)
                })
                .filter(|term| *term > 0.0)
                .sum::<f64>()
        })
        .sum()
}

/// Boost summed over every season of the item the user has a positive
/// preference for.
pub fn season_affinity(preferences: &PreferenceProfile, item: &ItemProfile, boost: f64) -> f64 {
    preferences
        .positive(AttributeCategory::Season)
        .map(|(season, _)| seasonal_score(season, preferences, item, boost))
        .sum()
}

/// Boost for an item appropriate for `season`, scaled up by the user's own
/// positive affinity for that season.
pub fn seasonal_score(
    season: &str,
    preferences: &PreferenceProfile,
    item: &ItemProfile,
    boost: f64,
) -> f64 {
    let matched = item
        .attributes(AttributeCategory::Season)
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(season));

    match matched {
        Some((name, _)) => {
            let affinity = preferences
                .weight(AttributeCategory::Season, name)
                .unwrap_or(0.0)
                .max(0.0);
            boost * (1.0 + affinity)
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecommendationConfig;

    fn weights() -> CategoryWeights {
        RecommendationConfig::default().content_weights
    }

    #[test]
    fn test_content_score_sums_matching_categories() {
        let mut prefs = PreferenceProfile::default();
        prefs.insert(AttributeCategory::Genre, "Drama", 0.2);
        prefs.insert(AttributeCategory::Director, "Mann", 0.1);
        prefs.insert(AttributeCategory::Actor, "Pacino", 0.07);

        let mut item = ItemProfile::default();
        item.insert(AttributeCategory::Genre, "Drama", 0.5);
        item.insert(AttributeCategory::Genre, "Crime", 0.5);
        item.insert(AttributeCategory::Director, "Mann", 0.5);
        item.insert(AttributeCategory::Actor, "Pacino", 0.5);

        let score = content_score(&prefs, &item, &weights());
        let expected = 0.2 * 0.5 + 0.1 * 0.3 + 0.07 * 0.25;
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_negative_preferences_do_not_penalise() {
        let mut prefs = PreferenceProfile::default();
        prefs.insert(AttributeCategory::Genre, "Horror", -0.3);
        prefs.insert(AttributeCategory::Genre, "Comedy", 0.1);

        let mut item = ItemProfile::default();
        item.insert(AttributeCategory::Genre, "Horror", 0.5);
        item.insert(AttributeCategory::Genre, "Comedy", 0.5);

        let score = content_score(&prefs, &item, &weights());
        assert!((score - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_item_without_matches_scores_zero() {
        let mut prefs = PreferenceProfile::default();
        prefs.insert(AttributeCategory::Genre, "Drama", 0.4);
        let item = ItemProfile::default();
        assert_eq!(content_score(&prefs, &item, &weights()), 0.0);
    }

    #[test]
    fn test_catalog_weight_scales_content_terms() {
        let mut prefs = PreferenceProfile::default();
        prefs.insert(AttributeCategory::Genre, "Drama", 0.2);

        let mut drifted = ItemProfile::default();
        drifted.insert(AttributeCategory::Genre, "Drama", 1.0);
        let mut faded = ItemProfile::default();
        faded.insert(AttributeCategory::Genre, "Drama", 0.0);

        assert!((content_score(&prefs, &drifted, &weights()) - 0.2).abs() < 1e-9);
        assert_eq!(content_score(&prefs, &faded, &weights()), 0.0);
    }

    #[test]
    fn test_season_affinity_covers_every_liked_season() {
        let mut prefs = PreferenceProfile::default();
        prefs.insert(AttributeCategory::Season, "Christmas", 0.1);
        prefs.insert(AttributeCategory::Season, "Winter", 0.2);
        prefs.insert(AttributeCategory::Season, "Summer", -0.1);

        let mut item = ItemProfile::default();
        item.insert(AttributeCategory::Season, "Christmas", 0.5);
        item.insert(AttributeCategory::Season, "Winter", 0.5);
        item.insert(AttributeCategory::Season, "Summer", 0.5);

        let expected = 0.05 * 1.1 + 0.05 * 1.2;
        assert!((season_affinity(&prefs, &item, 0.05) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_seasonal_score_is_case_insensitive() {
        let mut prefs = PreferenceProfile::default();
        prefs.insert(AttributeCategory::Season, "Christmas", 0.1);

        let mut item = ItemProfile::default();
        item.insert(AttributeCategory::Season, "Christmas", 0.5);

        let score = seasonal_score("christmas", &prefs, &item, 0.05);
        assert!((score - 0.055).abs() < 1e-9);
        assert_eq!(seasonal_score("Summer", &prefs, &item, 0.05), 0.0);
    }
}
