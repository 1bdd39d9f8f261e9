pub mod validation;

/// Rounds for display; comparisons should use the unrounded value.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Applies `delta` to `current`, clamping at `floor` when one is set.
pub fn apply_delta(current: f64, delta: f64, floor: Option<f64>) -> f64 {
    let next = current + delta;
    match floor {
        Some(floor) => next.max(floor),
        None => next,
    }
}

/// Sorted, de-duplicated names.
pub fn sorted_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut names: Vec<String> = names.into_iter().collect();
    names.sort();
    names.dedup();
    names
}
