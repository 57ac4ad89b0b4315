//! # swingscope - causal market-structure inference from OHLC bars
//!
//! Detects swing points without lookahead, labels them (HH/LH/HL/LL/DT/DB),
//! tracks breakout-confirmed support/resistance with a trend bias, flags
//! climax and consecutive-bar reversals, and fuses everything into one
//! adjusted level series with break-then-reestablish semantics.
//!
//! ## Quick Start
//!
//! ```rust
//! use swingscope::prelude::*;
//!
//! // Bring your own bar type
//! struct Candle { o: f64, h: f64, l: f64, c: f64 }
//!
//! impl OHLC for Candle {
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//! }
//!
//! let engine = EngineBuilder::new()
//!     .swing_window(3)
//!     .level_policy(PolicyKind::BreakoutGated)
//!     .build()
//!     .unwrap();
//!
//! let bars: Vec<Candle> = vec![];
//! let result = engine.analyze(&bars).unwrap();
//! assert!(result.rows.is_empty());
//! ```

pub mod classifier;
pub mod detectors;
pub mod fusion;
pub mod params;

pub mod prelude {
    pub use crate::{
        // Parallel
        analyze_parallel,
        // Classification
        classifier::{
            ClassifiedSeries, ClassifiedSwing, LevelPolicy, LevelRow, PolicyKind,
            SwingClassifier, SwingLabel, TrendBias,
        },
        // Detectors
        detectors::*,
        // Fusion
        fusion::{fuse, AdjustedLevel},
        // Parameters
        params::{ParamMeta, ParamType, ParameterizedDetector, StructureConfig},
        AnalysisError,
        AnalysisResult,
        // Core types
        Bar,
        Diagnostics,
        EngineBuilder,
        OHLCExt,
        Period,
        Ratio,
        Result,
        // Errors
        StructureError,
        StructureEngine,
        StructureResult,
        StructureRow,
        OHLC,
    };
}

use tracing::{debug, warn};

use classifier::{
    ClassifiedSeries, ClassifiedSwing, PolicyKind, SwingClassifier, SwingLabel, TrendBias,
};
use detectors::{
    reversal::{
        merge_reversals, ClimaxDetector, ConsecutiveDetector, ReversalDetector, ReversalEvent,
        ReversalKind,
    },
    swing::{SwingDetector, SwingSeries},
};
use fusion::AdjustedLevel;
use params::StructureConfig;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, StructureError>;

/// Errors raised while configuring or running the pipeline
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructureError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid bar at index {index}: {reason}")]
    InvalidBar { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(StructureError::InvalidValue("Ratio cannot be NaN or infinite"));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(StructureError::OutOfRange { field: "Ratio", value, min: 0.0, max: 1.0 });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

/// Bar count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(StructureError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

// ============================================================
// BAR TRAITS
// ============================================================

/// Core OHLC data trait. A bar's index is its position in the slice.
pub trait OHLC {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
}

impl<T: OHLC + ?Sized> OHLC for &T {
    fn open(&self) -> f64 {
        (**self).open()
    }

    fn high(&self) -> f64 {
        (**self).high()
    }

    fn low(&self) -> f64 {
        (**self).low()
    }

    fn close(&self) -> f64 {
        (**self).close()
    }
}

/// Extension trait with computed properties for OHLC data
pub trait OHLCExt: OHLC {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// True if any field is missing (NaN)
    #[inline]
    fn has_nan(&self) -> bool {
        self.open().is_nan()
            || self.high().is_nan()
            || self.low().is_nan()
            || self.close().is_nan()
    }

    /// Strict consistency check. NaN is a soft data-quality condition and
    /// passes; inverted or infinite bars do not.
    fn validate(&self) -> Result<()> {
        if self.high() < self.low() {
            return Err(StructureError::InvalidBar { index: 0, reason: "high < low" });
        }
        if self.open().is_infinite()
            || self.high().is_infinite()
            || self.low().is_infinite()
            || self.close().is_infinite()
        {
            return Err(StructureError::InvalidBar { index: 0, reason: "infinite value in OHLC" });
        }
        Ok(())
    }
}

impl<T: OHLC + ?Sized> OHLCExt for T {}

/// Plain OHLC bar for callers without their own type
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub const fn new(open: f64, high: f64, low: f64, close: f64) -> Self {
        Self { open, high, low, close }
    }
}

impl OHLC for Bar {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }
}

// ============================================================
// OUTPUT
// ============================================================

/// Soft conditions and per-stage counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostics {
    pub bars: usize,
    /// Bars with at least one NaN field (never swing candidates)
    pub nan_bars: usize,
    pub swing_highs: usize,
    pub swing_lows: usize,
    pub climax_events: usize,
    pub consecutive_events: usize,
    /// Series shorter than `2 * swing_window + 1`; no swing can confirm
    pub insufficient_data: bool,
}

/// Full per-bar structure output
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct StructureRow {
    pub index: usize,
    /// Swing high confirmed on this bar (anchored `swing_window` bars back)
    pub swing_high_price: Option<f64>,
    pub swing_low_price: Option<f64>,
    pub swing_type: Option<SwingLabel>,
    pub major_high: Option<f64>,
    pub major_low: Option<f64>,
    pub adjusted_major_high: Option<f64>,
    pub adjusted_major_low: Option<f64>,
    pub trend_bias: TrendBias,
}

/// Result of [`StructureEngine::analyze`]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct StructureResult {
    pub rows: Vec<StructureRow>,
    pub swings: Vec<ClassifiedSwing>,
    pub reversals: Vec<ReversalEvent>,
    pub diagnostics: Diagnostics,
}

impl StructureResult {
    /// Trend bias at the last bar, or neutral for an empty series
    pub fn final_trend(&self) -> TrendBias {
        self.rows.last().map(|r| r.trend_bias).unwrap_or_default()
    }
}

// ============================================================
// STRUCTURE ENGINE
// ============================================================

/// Engine-level switches that are not structure parameters
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub validate_data: bool,
}

/// Main structure pipeline. Holds configuration only; every call builds its
/// own state, so one engine can serve many series concurrently.
#[derive(Debug, Clone)]
pub struct StructureEngine {
    structure: StructureConfig,
    swing: SwingDetector,
    classifier: SwingClassifier,
    climax: ClimaxDetector,
    consecutive: ConsecutiveDetector,
    config: EngineConfig,
}

impl StructureEngine {
    pub fn structure_config(&self) -> &StructureConfig {
        &self.structure
    }

    // ===========================================
    // LOW-LEVEL: Stage primitives
    // ===========================================

    /// Confirmed swing highs and lows.
    #[inline]
    pub fn detect_swings<T: OHLC>(&self, bars: &[T]) -> SwingSeries {
        self.swing.detect(bars)
    }

    /// Label swings and compute raw levels under the configured policy.
    #[inline]
    pub fn classify<T: OHLC>(&self, bars: &[T], swings: &SwingSeries) -> ClassifiedSeries {
        self.classifier.classify(bars, swings)
    }

    /// Climax and consecutive reversals in one stream ordered by trigger bar.
    pub fn detect_reversals<T: OHLC>(&self, bars: &[T]) -> Vec<ReversalEvent> {
        merge_reversals(self.climax.scan(bars), self.consecutive.scan(bars))
    }

    /// Fuse raw levels with reversal overrides.
    #[inline]
    pub fn fuse<T: OHLC>(
        &self,
        bars: &[T],
        classified: &ClassifiedSeries,
        reversals: &[ReversalEvent],
    ) -> Vec<AdjustedLevel> {
        fusion::fuse(bars, &classified.rows, reversals)
    }

    // ===========================================
    // HIGH-LEVEL: Whole pipeline
    // ===========================================

    /// Run every stage over one complete series.
    pub fn analyze<T: OHLC>(&self, bars: &[T]) -> Result<StructureResult> {
        if self.config.validate_data {
            self.validate_bars(bars)?;
        }

        let swings = self.detect_swings(bars);
        let classified = self.classify(bars, &swings);
        let reversals = self.detect_reversals(bars);
        let adjusted = self.fuse(bars, &classified, &reversals);

        let diagnostics = Diagnostics {
            bars: bars.len(),
            nan_bars: bars.iter().filter(|b| b.has_nan()).count(),
            swing_highs: swings.highs().len(),
            swing_lows: swings.lows().len(),
            climax_events: reversals.iter().filter(|e| e.kind == ReversalKind::Climax).count(),
            consecutive_events: reversals
                .iter()
                .filter(|e| e.kind == ReversalKind::Consecutive)
                .count(),
            insufficient_data: swings.is_insufficient(),
        };

        if diagnostics.insufficient_data {
            warn!(
                bars = diagnostics.bars,
                window = swings.window(),
                "series shorter than 2 * swing_window + 1, no swings can confirm"
            );
        }
        if diagnostics.nan_bars > 0 {
            debug!(nan_bars = diagnostics.nan_bars, "skipped NaN bars during comparison");
        }

        let rows = swings
            .confirmed()
            .into_iter()
            .zip(&classified.rows)
            .zip(adjusted)
            .enumerate()
            .map(|(index, ((marks, level), adj))| StructureRow {
                index,
                swing_high_price: marks.high,
                swing_low_price: marks.low,
                swing_type: level.swing_type,
                major_high: level.major_high,
                major_low: level.major_low,
                adjusted_major_high: adj.adjusted_major_high,
                adjusted_major_low: adj.adjusted_major_low,
                trend_bias: level.trend_bias,
            })
            .collect();

        Ok(StructureResult { rows, swings: classified.swings, reversals, diagnostics })
    }

    // ===========================================
    // Internal helpers
    // ===========================================

    fn validate_bars<T: OHLC>(&self, bars: &[T]) -> Result<()> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                StructureError::InvalidBar { reason, .. } => {
                    StructureError::InvalidBar { index: i, reason }
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`StructureEngine`]; every value is checked in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    structure: StructureConfig,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a complete (possibly deserialized) configuration
    pub fn from_config(structure: StructureConfig) -> Self {
        Self { structure, config: EngineConfig::default() }
    }

    pub fn swing_window(mut self, window: usize) -> Self {
        self.structure.swing_window = window;
        self
    }

    pub fn price_tolerance_pct(mut self, tolerance: f64) -> Self {
        self.structure.price_tolerance_pct = tolerance;
        self
    }

    pub fn atr_multiplier(mut self, multiplier: f64) -> Self {
        self.structure.atr_multiplier = multiplier;
        self
    }

    pub fn climax_lookback(mut self, lookback: usize) -> Self {
        self.structure.climax_lookback = lookback;
        self
    }

    pub fn consecutive_count(mut self, count: usize) -> Self {
        self.structure.consecutive_count = count;
        self
    }

    pub fn level_policy(mut self, policy: PolicyKind) -> Self {
        self.structure.level_policy = policy;
        self
    }

    /// Enable/disable strict bar validation (high < low, infinite values)
    pub fn validate_data(mut self, enable: bool) -> Self {
        self.config.validate_data = enable;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<StructureEngine> {
        let s = &self.structure;
        s.validate()?;

        let engine = StructureEngine {
            swing: SwingDetector::new(s.swing_window)?,
            classifier: SwingClassifier::new(s.price_tolerance_pct, s.level_policy)?,
            climax: ClimaxDetector::new(s.atr_multiplier, s.climax_lookback)?,
            consecutive: ConsecutiveDetector::new(s.consecutive_count)?,
            structure: self.structure,
            config: self.config,
        };

        debug!(
            swing_window = engine.structure.swing_window,
            policy = engine.structure.level_policy.as_str(),
            "structure engine built"
        );
        Ok(engine)
    }
}

// ============================================================
// PARALLEL ANALYSIS
// ============================================================

use rayon::prelude::*;

/// Result of analyzing a single instrument
#[derive(Debug)]
pub struct AnalysisResult {
    pub symbol: String,
    pub result: StructureResult,
}

/// Error from analyzing a single instrument
#[derive(Debug)]
pub struct AnalysisError {
    pub symbol: String,
    pub error: StructureError,
}

/// Analyze many independent series on the rayon pool
pub fn analyze_parallel<'a, T, I>(
    engine: &StructureEngine,
    instruments: I,
) -> (Vec<AnalysisResult>, Vec<AnalysisError>)
where
    T: OHLC + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            engine
                .analyze(bars)
                .map(|result| AnalysisResult { symbol: symbol.to_string(), result })
                .map_err(|error| AnalysisError { symbol: symbol.to_string(), error })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================
