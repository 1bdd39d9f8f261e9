use std::collections::{BTreeMap, BTreeSet};

/// Users whose liked items overlap the target's in at least `min_shared` places.
///
/// `co_likers` maps each other user to the target's liked items they also liked.
/// Returns user id -> overlap count.
pub fn similar_users(
    co_likers: &BTreeMap<String, BTreeSet<String>>,
    min_shared: usize,
) -> BTreeMap<String, usize> {
    co_likers
        .iter()
        .filter(|(_, shared)| shared.len() >= min_shared)
        .map(|(user, shared)| (user.clone(), shared.len()))
        .collect()
}

/// Scores items liked by similar users that the target has not seen.
///
/// Each like contributes `interaction weight * overlap * damping`.
pub fn collaborative_scores(
    similar: &BTreeMap<String, usize>,
    their_likes: &BTreeMap<String, Vec<(String, f64)>>,
    seen: &BTreeSet<String>,
    damping: f64,
) -> BTreeMap<String, f64> {
    let mut scores: BTreeMap<String, f64> = BTreeMap::new();

    for (user, overlap) in similar {
        let Some(likes) = their_likes.get(user) else {
            continue;
        };
        for (item_id, weight) in likes {
            if *weight <= 0.0 || seen.contains(item_id) {
                continue;
            }
            *scores.entry(item_id.clone()).or_insert(0.0) += weight * (*overlap as f64) * damping;
        }
    }

    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_similar_users_respects_threshold() {
        let mut co_likers = BTreeMap::new();
        co_likers.insert("u2".to_string(), set(&["m1", "m2"]));
        co_likers.insert("u3".to_string(), set(&["m1"]));

        let similar = similar_users(&co_likers, 2);
        assert_eq!(similar.len(), 1);
        assert_eq!(similar.get("u2"), Some(&2));
    }

    #[test]
    fn test_collaborative_scores_skip_seen_and_disliked() {
        let mut similar = BTreeMap::new();
        similar.insert("u2".to_string(), 2);
        similar.insert("u3".to_string(), 3);

        let mut likes = BTreeMap::new();
        likes.insert(
            "u2".to_string(),
            vec![
                ("m1".to_string(), 1.0),
                ("m5".to_string(), 1.0),
                ("m6".to_string(), -1.0),
            ],
        );
        likes.insert("u3".to_string(), vec![("m5".to_string(), 1.0)]);

        let scores = collaborative_scores(&similar, &likes, &set(&["m1"]), 0.1);
        assert_eq!(scores.len(), 1);
        assert!((scores["m5"] - 0.5).abs() < 1e-9);
    }
}
