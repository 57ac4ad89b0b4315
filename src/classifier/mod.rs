//! Swing classification and structural level tracking
//!
//! Confirmed swings are labeled against the previous swing on the same side
//! (HH/LH/DT for highs, HL/LL/DB for lows) and then handed, in confirmation
//! order, to a [`LevelPolicy`] that maintains one active major level per side
//! and the trend bias.

pub mod policy;

pub use policy::*;

use tracing::debug;

use crate::{
    detectors::swing::{SwingEvent, SwingSeries, SwingSide},
    Ratio, Result, StructureError, OHLC,
};

// ============================================================
// LABELS
// ============================================================

/// Structural label of a confirmed swing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SwingLabel {
    #[serde(rename = "HH")]
    HigherHigh,
    #[serde(rename = "LH")]
    LowerHigh,
    #[serde(rename = "DT")]
    DoubleTop,
    #[serde(rename = "HL")]
    HigherLow,
    #[serde(rename = "LL")]
    LowerLow,
    #[serde(rename = "DB")]
    DoubleBottom,
}

impl SwingLabel {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            SwingLabel::HigherHigh => "HH",
            SwingLabel::LowerHigh => "LH",
            SwingLabel::DoubleTop => "DT",
            SwingLabel::HigherLow => "HL",
            SwingLabel::LowerLow => "LL",
            SwingLabel::DoubleBottom => "DB",
        }
    }

    #[inline]
    pub fn side(self) -> SwingSide {
        match self {
            SwingLabel::HigherHigh | SwingLabel::LowerHigh | SwingLabel::DoubleTop => {
                SwingSide::High
            }
            _ => SwingSide::Low,
        }
    }
}

impl std::fmt::Display for SwingLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of comparing a swing price with the previous same-side swing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceComparison {
    Double,
    Higher,
    Lower,
}

/// Compare `price` against `last`.
///
/// Double iff `|price - last| / last <= tolerance_pct` (inclusive). Returns
/// `None` when there is no usable reference (`last` non-positive or not finite).
pub fn compare_prices(price: f64, last: f64, tolerance_pct: f64) -> Option<PriceComparison> {
    if !last.is_finite() || last <= 0.0 {
        return None;
    }
    if (price - last).abs() / last <= tolerance_pct {
        Some(PriceComparison::Double)
    } else if price > last {
        Some(PriceComparison::Higher)
    } else {
        Some(PriceComparison::Lower)
    }
}

/// Label a swing high; the first high on record is always HH.
pub fn classify_swing_high(price: f64, last: Option<f64>, tolerance_pct: f64) -> SwingLabel {
    match last.and_then(|l| compare_prices(price, l, tolerance_pct)) {
        Some(PriceComparison::Double) => SwingLabel::DoubleTop,
        Some(PriceComparison::Lower) => SwingLabel::LowerHigh,
        Some(PriceComparison::Higher) | None => SwingLabel::HigherHigh,
    }
}

/// Label a swing low; the first low on record is always LL.
pub fn classify_swing_low(price: f64, last: Option<f64>, tolerance_pct: f64) -> SwingLabel {
    match last.and_then(|l| compare_prices(price, l, tolerance_pct)) {
        Some(PriceComparison::Double) => SwingLabel::DoubleBottom,
        Some(PriceComparison::Higher) => SwingLabel::HigherLow,
        Some(PriceComparison::Lower) | None => SwingLabel::LowerLow,
    }
}

/// A confirmed swing with its structural label
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ClassifiedSwing {
    #[serde(flatten)]
    pub event: SwingEvent,
    pub label: SwingLabel,
}

/// Remembers the last price on each side so successive swings can be labeled
#[derive(Debug, Clone, Default)]
struct SwingLabeler {
    tolerance_pct: f64,
    last_high: Option<f64>,
    last_low: Option<f64>,
}

impl SwingLabeler {
    fn new(tolerance_pct: f64) -> Self {
        Self { tolerance_pct, ..Default::default() }
    }

    fn label(&mut self, event: SwingEvent) -> ClassifiedSwing {
        let label = match event.side {
            SwingSide::High => {
                let label = classify_swing_high(event.price, self.last_high, self.tolerance_pct);
                self.last_high = Some(event.price);
                label
            }
            SwingSide::Low => {
                let label = classify_swing_low(event.price, self.last_low, self.tolerance_pct);
                self.last_low = Some(event.price);
                label
            }
        };
        ClassifiedSwing { event, label }
    }
}

// ============================================================
// TREND & PER-BAR OUTPUT
// ============================================================

/// Directional bias derived from swing structure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum TrendBias {
    Bull,
    Bear,
    #[default]
    Neutral,
}

/// Classifier output for one bar
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct LevelRow {
    /// Label of the swing confirmed on this bar (the LOW label when both sides confirm)
    pub swing_type: Option<SwingLabel>,
    pub major_high: Option<f64>,
    pub major_low: Option<f64>,
    pub trend_bias: TrendBias,
}

/// Output of a [`SwingClassifier`] pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedSeries {
    pub swings: Vec<ClassifiedSwing>,
    pub rows: Vec<LevelRow>,
}

// ============================================================
// CLASSIFIER
// ============================================================

/// Labels confirmed swings and drives the configured level policy bar by bar
#[derive(Debug, Clone)]
pub struct SwingClassifier {
    pub tolerance_pct: Ratio,
    pub policy: PolicyKind,
}

impl Default for SwingClassifier {
    fn default() -> Self {
        Self { tolerance_pct: Ratio::new_const(0.001), policy: PolicyKind::default() }
    }
}

impl SwingClassifier {
    pub fn new(tolerance_pct: f64, policy: PolicyKind) -> Result<Self> {
        let tolerance = Ratio::new(tolerance_pct)?;
        if tolerance.get() > crate::params::MAX_PRICE_TOLERANCE_PCT {
            return Err(StructureError::OutOfRange {
                field: "price_tolerance_pct",
                value: tolerance_pct,
                min: 0.0,
                max: crate::params::MAX_PRICE_TOLERANCE_PCT,
            });
        }
        Ok(Self { tolerance_pct: tolerance, policy })
    }

    /// Run one full pass. Policy state is created fresh for every call, so
    /// repeated calls on the same input give identical output.
    pub fn classify<T: OHLC>(&self, bars: &[T], swings: &SwingSeries) -> ClassifiedSeries {
        let mut policy = self.policy.instantiate();
        policy.begin(bars, swings.window());

        let mut labeler = SwingLabeler::new(self.tolerance_pct.get());
        let mut pending = swings.events().into_iter().peekable();
        let mut classified = Vec::with_capacity(swings.highs().len() + swings.lows().len());
        let mut rows = Vec::with_capacity(bars.len());

        for (i, bar) in bars.iter().enumerate() {
            let mut swing_type = None;
            while let Some(event) = pending.next_if(|e| e.confirm_index == i) {
                let swing = labeler.label(event);
                policy.on_swing(&swing);
                swing_type = Some(swing.label);
                classified.push(swing);
            }

            policy.on_bar(bar);
            let levels = policy.levels();
            rows.push(LevelRow {
                swing_type,
                major_high: levels.major_high,
                major_low: levels.major_low,
                trend_bias: levels.trend,
            });
        }

        debug!(
            policy = policy.kind().as_str(),
            swings = classified.len(),
            "classification complete"
        );

        ClassifiedSeries { swings: classified, rows }
    }
}
