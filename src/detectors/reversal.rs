//! Reversal detectors: abrupt (climax) and gradual (consecutive-bar) turns
//!
//! Both scanners are pure functions of the raw bar series and run
//! independently of swing detection. Each event carries an override price
//! anchored to a historical bar, which the fusion stage may adopt as a
//! tighter structural level.

use std::collections::HashMap;

use tracing::debug;

use super::helpers::{merge_ordered, trailing_mean, true_range};
use crate::{
    params::{
        check_range, get_factor, get_period, ParamMeta, ParameterizedDetector,
        MAX_ATR_MULTIPLIER, MAX_CONSECUTIVE_COUNT, MIN_ATR_MULTIPLIER, MIN_CONSECUTIVE_COUNT,
    },
    OHLCExt, Period, Result, StructureError, OHLC,
};

// ============================================================
// TYPES
// ============================================================

/// Which turning point a reversal marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ReversalSide {
    /// Turn from up to down; the override tightens the high level
    Top,
    /// Turn from down to up; the override tightens the low level
    Bottom,
}

/// Scanner that produced a reversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ReversalKind {
    Climax,
    Consecutive,
}

/// A detected reversal. Sparse; independent of the swing event stream.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ReversalEvent {
    pub kind: ReversalKind,
    pub side: ReversalSide,
    /// Bar on which the reversal became known
    pub trigger_index: usize,
    /// Bar whose high (top) or low (bottom) supplies the override
    pub anchor_index: usize,
    pub override_price: f64,
}

// ============================================================
// DETECTOR TRAIT
// ============================================================

/// Whole-series reversal scanner
pub trait ReversalDetector: Send + Sync {
    fn kind(&self) -> ReversalKind;

    /// Minimum bars before the scanner can fire at all
    fn min_bars(&self) -> usize;

    /// Scan the full series; events come out in trigger order.
    fn scan<T: OHLC>(&self, bars: &[T]) -> Vec<ReversalEvent>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// CLIMAX (V-SHAPED) REVERSAL
// ============================================================

/// V-top / V-bottom: an outsized trend bar followed by a strong opposite bar.
///
/// A bar is a climax bar when its body exceeds `atr_multiplier` times the
/// rolling mean true range over `lookback` bars (current bar included).
#[derive(Debug, Clone)]
pub struct ClimaxDetector {
    pub atr_multiplier: f64,
    pub lookback: Period,
}

impl Default for ClimaxDetector {
    fn default() -> Self {
        Self { atr_multiplier: 2.0, lookback: Period::new_const(5) }
    }
}

/// Reversal bar body must exceed this share of the climax body
const REVERSAL_BODY_SHARE: f64 = 0.5;

impl ClimaxDetector {
    pub fn new(atr_multiplier: f64, lookback: usize) -> Result<Self> {
        let detector = Self { atr_multiplier, lookback: Period::new(lookback)? };
        detector.validate_config()?;
        Ok(detector)
    }

    /// Per-bar climax flag (body > multiplier x baseline true range).
    pub fn climax_bars<T: OHLC>(&self, bars: &[T]) -> Vec<bool> {
        let tr: Vec<f64> = (0..bars.len()).map(|i| true_range(bars, i)).collect();
        let period = self.lookback.get();
        bars.iter()
            .enumerate()
            .map(|(i, bar)| bar.body() > trailing_mean(&tr, i, period) * self.atr_multiplier)
            .collect()
    }
}

impl ReversalDetector for ClimaxDetector {
    fn kind(&self) -> ReversalKind {
        ReversalKind::Climax
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn scan<T: OHLC>(&self, bars: &[T]) -> Vec<ReversalEvent> {
        if bars.len() < self.min_bars() {
            return Vec::new();
        }

        let climax = self.climax_bars(bars);
        let mut events = Vec::new();

        for i in 1..bars.len() {
            if !climax[i - 1] {
                continue;
            }
            let prev = &bars[i - 1];
            let curr = &bars[i];
            let strong_body = curr.body() > prev.body() * REVERSAL_BODY_SHARE;

            // V-top: bullish climax, then a bear bar closing below its open
            if prev.is_bullish() && curr.is_bearish() && strong_body && curr.close() < prev.open() {
                if !prev.high().is_nan() {
                    events.push(ReversalEvent {
                        kind: ReversalKind::Climax,
                        side: ReversalSide::Top,
                        trigger_index: i,
                        anchor_index: i - 1,
                        override_price: prev.high(),
                    });
                }
            } else if prev.is_bearish()
                && curr.is_bullish()
                && strong_body
                && curr.close() > prev.open()
                && !prev.low().is_nan()
            {
                events.push(ReversalEvent {
                    kind: ReversalKind::Climax,
                    side: ReversalSide::Bottom,
                    trigger_index: i,
                    anchor_index: i - 1,
                    override_price: prev.low(),
                });
            }
        }

        debug!(events = events.len(), "climax scan complete");
        events
    }

    fn validate_config(&self) -> Result<()> {
        if !self.atr_multiplier.is_finite() {
            return Err(StructureError::InvalidValue(
                "atr_multiplier cannot be NaN or infinite",
            ));
        }
        check_range("atr_multiplier", self.atr_multiplier, MIN_ATR_MULTIPLIER, MAX_ATR_MULTIPLIER)
    }
}

static CLIMAX_PARAMS: [ParamMeta; 2] = [
    ParamMeta::factor(
        "atr_multiplier",
        2.0,
        (1.0, 4.0, 0.5),
        "Body size, in multiples of mean true range, that makes a climax bar",
    ),
    ParamMeta::period(
        "climax_lookback",
        5.0,
        (3.0, 20.0, 1.0),
        "Bars in the true-range baseline",
    ),
];

impl ParameterizedDetector for ClimaxDetector {
    fn param_meta() -> &'static [ParamMeta] {
        &CLIMAX_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self {
            atr_multiplier: get_factor(params, "atr_multiplier", 2.0)?,
            lookback: get_period(params, "climax_lookback", 5)?,
        };
        detector.validate_config()?;
        Ok(detector)
    }

    fn detector_id_str() -> &'static str {
        "CLIMAX_REVERSAL"
    }
}

// ============================================================
// CONSECUTIVE-BAR REVERSAL
// ============================================================

/// Gradual turn: `count` same-colored bars in a row.
///
/// Fires once per run, on the bar where the run length first reaches
/// `count`. A bear run marks a top at the high of the bar that opened the
/// run; a bull run marks a bottom at its low. Doji and NaN bars break runs.
#[derive(Debug, Clone)]
pub struct ConsecutiveDetector {
    pub count: Period,
}

impl Default for ConsecutiveDetector {
    fn default() -> Self {
        Self { count: Period::new_const(3) }
    }
}

impl ConsecutiveDetector {
    pub fn new(count: usize) -> Result<Self> {
        let detector = Self { count: Period::new(count)? };
        detector.validate_config()?;
        Ok(detector)
    }
}

impl ReversalDetector for ConsecutiveDetector {
    fn kind(&self) -> ReversalKind {
        ReversalKind::Consecutive
    }

    fn min_bars(&self) -> usize {
        self.count.get()
    }

    fn scan<T: OHLC>(&self, bars: &[T]) -> Vec<ReversalEvent> {
        let count = self.count.get();
        let mut events = Vec::new();
        let (mut bull_run, mut bear_run) = (0usize, 0usize);

        for (i, bar) in bars.iter().enumerate() {
            if bar.is_bullish() {
                bull_run += 1;
                bear_run = 0;
            } else if bar.is_bearish() {
                bear_run += 1;
                bull_run = 0;
            } else {
                bull_run = 0;
                bear_run = 0;
            }

            let start = (i + 1).saturating_sub(count);
            if bear_run == count && !bars[start].high().is_nan() {
                events.push(ReversalEvent {
                    kind: ReversalKind::Consecutive,
                    side: ReversalSide::Top,
                    trigger_index: i,
                    anchor_index: start,
                    override_price: bars[start].high(),
                });
            } else if bull_run == count && !bars[start].low().is_nan() {
                events.push(ReversalEvent {
                    kind: ReversalKind::Consecutive,
                    side: ReversalSide::Bottom,
                    trigger_index: i,
                    anchor_index: start,
                    override_price: bars[start].low(),
                });
            }
        }

        debug!(events = events.len(), count, "consecutive scan complete");
        events
    }

    fn validate_config(&self) -> Result<()> {
        check_range(
            "consecutive_count",
            self.count.get() as f64,
            MIN_CONSECUTIVE_COUNT as f64,
            MAX_CONSECUTIVE_COUNT as f64,
        )
    }
}

static CONSECUTIVE_PARAMS: [ParamMeta; 1] = [ParamMeta::period(
    "consecutive_count",
    3.0,
    (2.0, 6.0, 1.0),
    "Same-colored bars in a row that mark a gradual reversal",
)];

impl ParameterizedDetector for ConsecutiveDetector {
    fn param_meta() -> &'static [ParamMeta] {
        &CONSECUTIVE_PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        let detector = Self { count: get_period(params, "consecutive_count", 3)? };
        detector.validate_config()?;
        Ok(detector)
    }

    fn detector_id_str() -> &'static str {
        "CONSECUTIVE_REVERSAL"
    }
}

/// Merge climax and consecutive events into one stream ordered by trigger bar
/// (climax first on ties).
pub fn merge_reversals(
    climax: Vec<ReversalEvent>,
    consecutive: Vec<ReversalEvent>,
) -> Vec<ReversalEvent> {
    merge_ordered(climax, consecutive, |e| e.trigger_index)
}
