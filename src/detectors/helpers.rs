//! Common helper functions shared by the swing and reversal scanners
//!
//! Everything here is NaN-tolerant: missing values are skipped at comparison
//! time and never become an extremum or enter an average.

use crate::{OHLCExt, OHLC};

// ============================================================
// WINDOW EXTREMA
// ============================================================

/// Maximum of the finite values in `values`, or NaN when none are finite.
#[inline]
pub fn window_max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, v| if acc.is_nan() || v > acc { v } else { acc })
}

/// Minimum of the finite values in `values`, or NaN when none are finite.
#[inline]
pub fn window_min(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, |acc, v| if acc.is_nan() || v < acc { v } else { acc })
}

/// Keep only the first flag of every run of adjacent `true` flags.
pub fn first_of_runs(flags: &[bool]) -> Vec<bool> {
    let mut prev = false;
    flags
        .iter()
        .map(|&flag| {
            let keep = flag && !prev;
            prev = flag;
            keep
        })
        .collect()
}

// ============================================================
// VOLATILITY BASELINE
// ============================================================

/// True range of the bar at `at`: max(high - low, |high - prev_close|, |low - prev_close|).
///
/// The first bar has no previous close and uses high - low. Components that
/// are NaN are ignored; the result is NaN only when every component is.
#[inline]
pub fn true_range<T: OHLC>(bars: &[T], at: usize) -> f64 {
    let bar = &bars[at];
    let mut parts = [bar.range(), f64::NAN, f64::NAN];
    if at > 0 {
        let prev_close = bars[at - 1].close();
        parts[1] = (bar.high() - prev_close).abs();
        parts[2] = (bar.low() - prev_close).abs();
    }
    window_max(&parts)
}

/// Trailing mean over `values[at + 1 - period ..= at]`, skipping NaN.
/// Near the start of the series the window shrinks to what is available.
#[inline]
pub fn trailing_mean(values: &[f64], at: usize, period: usize) -> f64 {
    let start = (at + 1).saturating_sub(period);
    let (sum, count) = values[start..=at]
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

// ============================================================
// ORDERED MERGE
// ============================================================

/// Linear merge of two streams already sorted by `key`.
///
/// On equal keys the element from `left` comes first, which is how HIGH
/// swings are ordered ahead of LOW swings confirming on the same bar.
pub fn merge_ordered<T, K, F>(left: Vec<T>, right: Vec<T>, key: F) -> Vec<T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => key(l) <= key(r),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bar;

    #[test]
    fn test_window_extrema_skip_nan() {
        let values = [3.0, f64::NAN, 7.0, 1.0];
        assert_eq!(window_max(&values), 7.0);
        assert_eq!(window_min(&values), 1.0);
        assert!(window_max(&[f64::NAN, f64::NAN]).is_nan());
        assert!(window_min(&[]).is_nan());
    }

    #[test]
    fn test_first_of_runs() {
        let flags = [true, true, false, true, false, false, true, true, true];
        let kept = first_of_runs(&flags);
        assert_eq!(kept, vec![true, false, false, true, false, false, true, false, false]);
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let bars = vec![Bar::new(10.0, 11.0, 9.0, 10.0), Bar::new(13.0, 14.0, 12.5, 13.5)];
        assert_eq!(true_range(&bars, 0), 2.0);
        // Gap up: |14 - 10| dominates the 1.5 bar range
        assert_eq!(true_range(&bars, 1), 4.0);
    }

    #[test]
    fn test_trailing_mean_shrinks_at_start() {
        let values = [2.0, 4.0, f64::NAN, 6.0];
        assert_eq!(trailing_mean(&values, 0, 3), 2.0);
        assert_eq!(trailing_mean(&values, 1, 3), 3.0);
        assert_eq!(trailing_mean(&values, 3, 3), 5.0);
        assert!(trailing_mean(&[f64::NAN], 0, 5).is_nan());
    }

    #[test]
    fn test_merge_ordered_left_wins_ties() {
        let left = vec![(1, 'h'), (4, 'h'), (6, 'h')];
        let right = vec![(1, 'l'), (2, 'l'), (6, 'l'), (9, 'l')];
        let merged = merge_ordered(left, right, |e| e.0);
        assert_eq!(
            merged,
            vec![(1, 'h'), (1, 'l'), (2, 'l'), (4, 'h'), (6, 'h'), (6, 'l'), (9, 'l')]
        );
    }
}
