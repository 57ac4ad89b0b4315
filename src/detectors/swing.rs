//! Swing extremum detection with lookahead elimination
//!
//! A bar is a swing high when its high equals the maximum high over the
//! symmetric window `[i - window, i + window]` (mirror for lows). Because that
//! window reaches `window` bars into the future, the swing is only reported at
//! `anchor_index + window`, the first bar at which it is knowable.

use std::collections::HashMap;

use tracing::debug;

use super::helpers::{first_of_runs, merge_ordered, window_max, window_min};
use crate::{
    params::{check_range, get_period, ParamMeta, ParameterizedDetector, MAX_SWING_WINDOW},
    Period, Result, OHLC,
};

// ============================================================
// TYPES
// ============================================================

/// Which extreme of the bar a swing or level refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SwingSide {
    High,
    Low,
}

impl SwingSide {
    /// True if `price` trades through `level` on this side.
    #[inline]
    pub fn breaks(self, level: f64, price: f64) -> bool {
        match self {
            SwingSide::High => price > level,
            SwingSide::Low => price < level,
        }
    }

    /// The more conservative of two levels: lower resistance, higher support.
    #[inline]
    pub fn tighter(self, a: f64, b: f64) -> f64 {
        match self {
            SwingSide::High => a.min(b),
            SwingSide::Low => a.max(b),
        }
    }
}

/// A confirmed swing point. Produced once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SwingEvent {
    /// Bar holding the extremum
    pub anchor_index: usize,
    /// Bar at which the extremum became knowable (`anchor_index + window`)
    pub confirm_index: usize,
    pub side: SwingSide,
    pub price: f64,
}

/// Per-bar swing prices, `None` where no swing sits on that bar
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct SwingMarks {
    pub high: Option<f64>,
    pub low: Option<f64>,
}

/// Output of a [`SwingDetector`] pass over one bar series
#[derive(Debug, Clone, PartialEq)]
pub struct SwingSeries {
    len: usize,
    window: usize,
    highs: Vec<SwingEvent>,
    lows: Vec<SwingEvent>,
}

impl SwingSeries {
    fn empty(len: usize, window: usize) -> Self {
        Self { len, window, highs: Vec::new(), lows: Vec::new() }
    }

    /// Number of bars the series was computed over
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Confirmed swing highs ordered by confirmation
    pub fn highs(&self) -> &[SwingEvent] {
        &self.highs
    }

    /// Confirmed swing lows ordered by confirmation
    pub fn lows(&self) -> &[SwingEvent] {
        &self.lows
    }

    /// True when the series was too short to hold any confirmable swing.
    pub fn is_insufficient(&self) -> bool {
        required_bars(self.window).map_or(true, |need| self.len < need)
    }

    /// All events in confirmation order; a HIGH and a LOW confirming on the
    /// same bar come out HIGH first.
    pub fn events(&self) -> Vec<SwingEvent> {
        merge_ordered(self.highs.clone(), self.lows.clone(), |e| e.confirm_index)
    }

    /// Swing prices placed at their confirmation bars.
    pub fn confirmed(&self) -> Vec<SwingMarks> {
        self.marks_by(|e| e.confirm_index)
    }

    /// Swing prices placed back at their anchor bars (for chart overlays only;
    /// reading these causally would leak `window` bars of future data).
    pub fn anchored(&self) -> Vec<SwingMarks> {
        self.marks_by(|e| e.anchor_index)
    }

    fn marks_by(&self, position: impl Fn(&SwingEvent) -> usize) -> Vec<SwingMarks> {
        let mut marks = vec![SwingMarks::default(); self.len];
        for e in &self.highs {
            marks[position(e)].high = Some(e.price);
        }
        for e in &self.lows {
            marks[position(e)].low = Some(e.price);
        }
        marks
    }
}

// ============================================================
// DETECTOR
// ============================================================

/// Bars needed for one full window, `None` past `usize::MAX`
fn required_bars(window: usize) -> Option<usize> {
    window.checked_mul(2)?.checked_add(1)
}

/// Symmetric-window swing detector
#[derive(Debug, Clone)]
pub struct SwingDetector {
    pub window: Period,
}

impl Default for SwingDetector {
    fn default() -> Self {
        Self { window: Period::new_const(5) }
    }
}

impl SwingDetector {
    pub fn new(window: usize) -> Result<Self> {
        let window = Period::new(window)?;
        check_range("swing_window", window.get() as f64, 1.0, MAX_SWING_WINDOW as f64)?;
        Ok(Self { window })
    }

    /// Scan the whole series. Series shorter than `2 * window + 1` yield an
    /// empty (but valid) result.
    pub fn detect<T: OHLC>(&self, bars: &[T]) -> SwingSeries {
        let n = bars.len();
        let w = self.window.get();

        if required_bars(w).map_or(true, |need| n < need) {
            debug!(bars = n, window = w, "series too short for swing confirmation");
            return SwingSeries::empty(n, w);
        }

        let highs: Vec<f64> = bars.iter().map(|b| b.high()).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low()).collect();

        let mut raw_high = vec![false; n];
        let mut raw_low = vec![false; n];

        // First and last `window` bars lack a full window and never qualify
        for i in w..n - w {
            let h = highs[i];
            if !h.is_nan() && h == window_max(&highs[i - w..=i + w]) {
                raw_high[i] = true;
            }
            let l = lows[i];
            if !l.is_nan() && l == window_min(&lows[i - w..=i + w]) {
                raw_low[i] = true;
            }
        }

        let to_events = |flags: Vec<bool>, prices: &[f64], side: SwingSide| -> Vec<SwingEvent> {
            flags
                .iter()
                .enumerate()
                .filter(|(_, &f)| f)
                .map(|(i, _)| SwingEvent {
                    anchor_index: i,
                    confirm_index: i + w,
                    side,
                    price: prices[i],
                })
                .collect()
        };

        let series = SwingSeries {
            len: n,
            window: w,
            highs: to_events(first_of_runs(&raw_high), &highs, SwingSide::High),
            lows: to_events(first_of_runs(&raw_low), &lows, SwingSide::Low),
        };

        debug!(
            highs = series.highs.len(),
            lows = series.lows.len(),
            window = w,
            "swing detection complete"
        );

        series
    }
}

static SWING_PARAMS: [ParamMeta; 1] = [ParamMeta::period(
    "swing_window",
    5.0,
    (2.0, 10.0, 1.0),
    "Bars before and after a swing bar that must not exceed it",
)];

impl ParameterizedDetector for SwingDetector {
    fn param_meta() -> &'static [ParamMeta] {
        &SWING_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Self::new(get_period(params, "swing_window", 5)?.get())
    }

    fn detector_id_str() -> &'static str {
        "SWING"
    }
}
