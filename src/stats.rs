//! Order-statistic helpers shared by the coexpression reductions

use std::cmp::Ordering;

/// The `n`-th largest non-NaN value (0 = maximum), or NaN if there are
/// `n` or fewer non-missing values
pub fn nth_largest<I>(values: I, n: usize) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut present: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if present.len() <= n {
        return f64::NAN;
    }
    present.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    present[present.len() - 1 - n]
}

/// Upper median of `items` ordered by `key`: the element at index `len / 2`
/// after a stable sort, duplicates kept
///
/// For an odd count this is the exact middle element.
pub fn median_upper<T: Copy, F: Fn(&T) -> f64>(items: &[T], key: F) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap_or(Ordering::Equal));
    Some(sorted[sorted.len() / 2])
}
