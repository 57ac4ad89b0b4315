//! Parameter metadata and pipeline configuration
//!
//! This module provides metadata about detector parameters, enabling:
//! - Grid search optimization
//! - Parameter documentation
//! - Construction from loosely-typed key/value maps (config files, UIs)
//!
//! # Example
//!
//! ```rust
//! use swingscope::params::{ParameterizedDetector, StructureConfig};
//! use swingscope::prelude::*;
//!
//! for param in ClimaxDetector::param_meta() {
//!     println!("{}: {:?} (default: {})", param.name, param.param_type, param.default);
//! }
//!
//! let config = StructureConfig::default();
//! assert!(config.validate().is_ok());
//! ```

use std::collections::HashMap;

use crate::{classifier::PolicyKind, Period, Ratio, Result, StructureError};

// ============================================================
// PARAMETER TYPES
// ============================================================

/// Type of parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
  /// Ratio value (0.0..=1.0)
  Ratio,
  /// Period value (positive integer)
  Period,
  /// Unbounded positive multiplier (e.g. ATR multiples)
  Factor,
}

/// Metadata for a single detector parameter
#[derive(Debug, Clone)]
pub struct ParamMeta {
  /// Parameter name (e.g., "swing_window")
  pub name: &'static str,
  pub param_type: ParamType,
  pub default: f64,
  /// Range for optimization: (min, max, step)
  pub range: (f64, f64, f64),
  /// Human-readable description
  pub description: &'static str,
}

impl ParamMeta {
  /// Create a new ParamMeta for a Ratio parameter
  pub const fn ratio(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Ratio, default, range, description }
  }

  /// Create a new ParamMeta for a Period parameter
  pub const fn period(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Period, default, range, description }
  }

  /// Create a new ParamMeta for a Factor parameter
  pub const fn factor(
    name: &'static str,
    default: f64,
    range: (f64, f64, f64),
    description: &'static str,
  ) -> Self {
    Self { name, param_type: ParamType::Factor, default, range, description }
  }

  /// Generate all values for grid search
  pub fn generate_grid(&self) -> Vec<f64> {
    let (min, max, step) = self.range;
    let mut values = Vec::new();
    let mut v = min;
    while v <= max + f64::EPSILON {
      values.push(v);
      v += step;
    }
    values
  }

  /// Validate a value against the grid-search range
  pub fn validate(&self, value: f64) -> Result<()> {
    let (min, max, _) = self.range;
    if value < min || value > max {
      return Err(StructureError::OutOfRange { field: self.name, value, min, max });
    }
    match self.param_type {
      ParamType::Ratio | ParamType::Factor => Ok(()),
      ParamType::Period => {
        if value < 1.0 || value.fract() != 0.0 {
          return Err(StructureError::InvalidValue("Period must be a positive integer"));
        }
        Ok(())
      },
    }
  }
}

// ============================================================
// PARAMETERIZED DETECTOR TRAIT
// ============================================================

/// Trait for detectors that support parameterization
pub trait ParameterizedDetector: Sized {
  /// Returns metadata for all configurable parameters
  fn param_meta() -> &'static [ParamMeta];

  /// Creates a detector with parameters from a HashMap
  ///
  /// Missing parameters use their default values.
  fn with_params(params: &HashMap<&str, f64>) -> Result<Self>;

  /// Returns the detector ID string
  fn detector_id_str() -> &'static str;
}

// ============================================================
// PARAMETER VALUE HELPERS
// ============================================================

/// Helper to get a Ratio from params with default fallback
pub fn get_ratio(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<Ratio> {
  let value = params.get(key).copied().unwrap_or(default);
  Ratio::new(value)
}

/// Helper to get a Period from params with default fallback
pub fn get_period(params: &HashMap<&str, f64>, key: &str, default: usize) -> Result<Period> {
  let value = params.get(key).copied().unwrap_or(default as f64);
  if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
    return Err(StructureError::InvalidConfig(format!(
      "{key} must be a whole number of bars, got {value}"
    )));
  }
  Period::new(value as usize)
}

/// Helper to get a finite multiplier from params with default fallback
pub fn get_factor(params: &HashMap<&str, f64>, key: &str, default: f64) -> Result<f64> {
  let value = params.get(key).copied().unwrap_or(default);
  if !value.is_finite() {
    return Err(StructureError::InvalidValue("Factor cannot be NaN or infinite"));
  }
  Ok(value)
}

// ============================================================
// PIPELINE CONFIGURATION
// ============================================================

/// Upper bound on the double-top/bottom tolerance
pub const MAX_PRICE_TOLERANCE_PCT: f64 = 0.1;
/// Upper bound on the swing window
pub const MAX_SWING_WINDOW: usize = 20;
/// Bounds on the climax body multiplier
pub const MIN_ATR_MULTIPLIER: f64 = 0.5;
pub const MAX_ATR_MULTIPLIER: f64 = 10.0;
/// Bounds on the consecutive-run length
pub const MIN_CONSECUTIVE_COUNT: usize = 2;
pub const MAX_CONSECUTIVE_COUNT: usize = 10;

/// Reject `value` outside `[min, max]` as [`StructureError::OutOfRange`].
pub(crate) fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
  if value < min || value > max {
    return Err(StructureError::OutOfRange { field, value, min, max });
  }
  Ok(())
}

/// Full configuration of the structure pipeline.
///
/// Deserializes with defaults for missing fields and rejects unknown ones.
/// Nothing is checked until [`StructureConfig::validate`] (called by
/// `EngineBuilder::build`).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StructureConfig {
  /// Bars before/after a swing bar ([1, 20])
  pub swing_window: usize,
  /// Relative distance under which two same-side swings form a double top/bottom ([0, 0.1])
  pub price_tolerance_pct: f64,
  /// Climax body threshold in multiples of mean true range ([0.5, 10])
  pub atr_multiplier: f64,
  /// True-range baseline length (>= 1)
  pub climax_lookback: usize,
  /// Run length for a consecutive-bar reversal ([2, 10])
  pub consecutive_count: usize,
  pub level_policy: PolicyKind,
}

impl Default for StructureConfig {
  fn default() -> Self {
    Self {
      swing_window: 5,
      price_tolerance_pct: 0.001,
      atr_multiplier: 2.0,
      climax_lookback: 5,
      consecutive_count: 3,
      level_policy: PolicyKind::BreakoutGated,
    }
  }
}

static STRUCTURE_PARAMS: [ParamMeta; 5] = [
  ParamMeta::period("swing_window", 5.0, (2.0, 10.0, 1.0), "Swing confirmation window"),
  ParamMeta::ratio(
    "price_tolerance_pct",
    0.001,
    (0.0005, 0.005, 0.0005),
    "Relative tolerance for double tops/bottoms",
  ),
  ParamMeta::factor("atr_multiplier", 2.0, (1.0, 4.0, 0.5), "Climax body threshold in ATR"),
  ParamMeta::period("climax_lookback", 5.0, (3.0, 20.0, 1.0), "True-range baseline length"),
  ParamMeta::period("consecutive_count", 3.0, (2.0, 6.0, 1.0), "Bars per consecutive reversal"),
];

impl StructureConfig {
  /// Metadata for every numeric parameter
  pub fn param_meta() -> &'static [ParamMeta] {
    &STRUCTURE_PARAMS
  }

  /// Build from a key/value map; missing keys keep their defaults and
  /// `level_policy` stays at its default.
  pub fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    let defaults = Self::default();
    let config = Self {
      swing_window: get_period(params, "swing_window", defaults.swing_window)?.get(),
      price_tolerance_pct: get_ratio(params, "price_tolerance_pct", defaults.price_tolerance_pct)?
        .get(),
      atr_multiplier: get_factor(params, "atr_multiplier", defaults.atr_multiplier)?,
      climax_lookback: get_period(params, "climax_lookback", defaults.climax_lookback)?.get(),
      consecutive_count: get_period(params, "consecutive_count", defaults.consecutive_count)?
        .get(),
      level_policy: defaults.level_policy,
    };
    config.validate()?;
    Ok(config)
  }

  /// Check every parameter against its allowed range.
  pub fn validate(&self) -> Result<()> {
    Period::new(self.swing_window)?;
    check_range("swing_window", self.swing_window as f64, 1.0, MAX_SWING_WINDOW as f64)?;
    Period::new(self.climax_lookback)?;

    let tolerance = Ratio::new(self.price_tolerance_pct)?.get();
    check_range("price_tolerance_pct", tolerance, 0.0, MAX_PRICE_TOLERANCE_PCT)?;

    if !self.atr_multiplier.is_finite() {
      return Err(StructureError::InvalidValue("atr_multiplier cannot be NaN or infinite"));
    }
    check_range("atr_multiplier", self.atr_multiplier, MIN_ATR_MULTIPLIER, MAX_ATR_MULTIPLIER)?;

    check_range(
      "consecutive_count",
      self.consecutive_count as f64,
      MIN_CONSECUTIVE_COUNT as f64,
      MAX_CONSECUTIVE_COUNT as f64,
    )
  }
}

// ============================================================
// TESTS
// ============================================================
