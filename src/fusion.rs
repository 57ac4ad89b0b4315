//! Structure fusion: classifier levels + reversal overrides
//!
//! One left-to-right fold per series. Each side carries an active level that
//! disappears the moment price trades through it and is re-established only by
//! a change in the classifier's raw level or by a tighter reversal override.

use tracing::debug;

use crate::{
    classifier::LevelRow,
    detectors::{
        reversal::{ReversalEvent, ReversalSide},
        swing::SwingSide,
    },
    OHLC,
};

/// Fused structural levels for one bar
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct AdjustedLevel {
    pub adjusted_major_high: Option<f64>,
    pub adjusted_major_low: Option<f64>,
}

/// Tightest override per side, indexed by trigger bar
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BarOverrides {
    pub top: Option<f64>,
    pub bottom: Option<f64>,
}

/// Collapse reversal events into per-bar overrides. Events on the same bar and
/// side keep the tighter price (lowest top, highest bottom); events past `len`
/// are ignored.
pub fn overrides_by_bar(len: usize, reversals: &[ReversalEvent]) -> Vec<BarOverrides> {
    let mut out = vec![BarOverrides::default(); len];
    for event in reversals {
        let Some(slot) = out.get_mut(event.trigger_index) else {
            continue;
        };
        let (side, current) = match event.side {
            ReversalSide::Top => (SwingSide::High, &mut slot.top),
            ReversalSide::Bottom => (SwingSide::Low, &mut slot.bottom),
        };
        *current = Some(match *current {
            Some(existing) => side.tighter(existing, event.override_price),
            None => event.override_price,
        });
    }
    out
}

// ============================================================
// FOLD STATE
// ============================================================

/// Per-side state: the active level and the last raw level seen
#[derive(Debug, Clone, Copy)]
struct SideState {
    side: SwingSide,
    active: Option<f64>,
    last_raw: Option<f64>,
}

impl SideState {
    fn new(side: SwingSide) -> Self {
        Self { side, active: None, last_raw: None }
    }

    fn step(
        &mut self,
        extreme: f64,
        raw: Option<f64>,
        override_price: Option<f64>,
    ) -> Option<f64> {
        // Break
        if let Some(level) = self.active {
            if self.side.breaks(level, extreme) {
                self.active = None;
            }
        }
        debug_assert!(
            self.active.map_or(true, |level| !self.side.breaks(level, extreme)),
            "active level survived a bar that trades through it"
        );

        // Re-establish on a raw level change; a raw level vanishing leaves
        // the active one alone
        if raw != self.last_raw {
            if raw.is_some() {
                self.active = raw;
            }
            self.last_raw = raw;
        }

        // Tighten
        if let Some(price) = override_price {
            self.active = Some(match self.active {
                Some(level) => self.side.tighter(level, price),
                None => price,
            });
        }

        self.active
    }
}

/// Explicit fold state: `(active_high, active_low, last_major_high, last_major_low)`
#[derive(Debug, Clone, Copy)]
pub struct FusionState {
    high: SideState,
    low: SideState,
}

impl Default for FusionState {
    fn default() -> Self {
        Self { high: SideState::new(SwingSide::High), low: SideState::new(SwingSide::Low) }
    }
}

impl FusionState {
    pub fn active_high(&self) -> Option<f64> {
        self.high.active
    }

    pub fn active_low(&self) -> Option<f64> {
        self.low.active
    }

    /// Advance by one bar and emit its adjusted levels.
    pub fn step<T: OHLC>(
        &mut self,
        bar: &T,
        raw: &LevelRow,
        overrides: BarOverrides,
    ) -> AdjustedLevel {
        AdjustedLevel {
            adjusted_major_high: self.high.step(bar.high(), raw.major_high, overrides.top),
            adjusted_major_low: self.low.step(bar.low(), raw.major_low, overrides.bottom),
        }
    }
}

/// Fuse raw classifier levels with reversal overrides over the whole series.
///
/// `levels` must hold one row per bar. Output has one entry per bar.
pub fn fuse<T: OHLC>(
    bars: &[T],
    levels: &[LevelRow],
    reversals: &[ReversalEvent],
) -> Vec<AdjustedLevel> {
    debug_assert_eq!(bars.len(), levels.len());

    let overrides = overrides_by_bar(bars.len(), reversals);
    let adjusted: Vec<AdjustedLevel> = bars
        .iter()
        .zip(levels)
        .zip(overrides)
        .scan(FusionState::default(), |state, ((bar, raw), over)| {
            Some(state.step(bar, raw, over))
        })
        .collect();

    debug!(
        bars = adjusted.len(),
        reversals = reversals.len(),
        "fusion complete"
    );

    adjusted
}
