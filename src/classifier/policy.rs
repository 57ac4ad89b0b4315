//! Level-update policies
//!
//! Three interchangeable strategies decide how confirmed swings move the
//! active major levels:
//!
//! - [`DirectOverwritePolicy`]: every swing replaces its side's level.
//! - [`BreakoutGatedPolicy`]: levels move only on continuation through the
//!   active level; the opposite level ratchets to the latest candidate.
//! - [`CloseBreakoutPolicy`]: bar-by-bar, a close through a level flips the
//!   trend and the broken level disappears until new structure forms.

use super::{ClassifiedSwing, SwingLabel, TrendBias};
use crate::{
    detectors::{
        helpers::{window_max, window_min},
        swing::SwingSide,
    },
    OHLC,
};

/// Selects the level policy; part of the pipeline configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    DirectOverwrite,
    #[default]
    BreakoutGated,
    CloseBreakout,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::DirectOverwrite => "direct_overwrite",
            PolicyKind::BreakoutGated => "breakout_gated",
            PolicyKind::CloseBreakout => "close_breakout",
        }
    }
}

/// Structural state reported after each bar
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelState {
    pub major_high: Option<f64>,
    pub major_low: Option<f64>,
    pub trend: TrendBias,
}

/// Strategy interface shared by all level policies
pub trait LevelPolicy {
    fn kind(&self) -> PolicyKind;

    /// Called once with the full series before any swing or bar.
    fn begin<T: OHLC>(&mut self, _bars: &[T], _window: usize) {}

    /// A labeled swing confirmed on the current bar.
    fn on_swing(&mut self, swing: &ClassifiedSwing);

    /// Called once per bar, after that bar's swings.
    fn on_bar<T: OHLC>(&mut self, _bar: &T) {}

    fn levels(&self) -> LevelState;
}

/// Generate the `BuiltinPolicy` enum and its static dispatch
macro_rules! define_builtin_policies {
    (
        $(
            $variant:ident($policy:ty)
        ),* $(,)?
    ) => {
        /// All builtin policies - enum dispatch, no vtable
        #[derive(Debug, Clone)]
        pub enum BuiltinPolicy {
            $($variant($policy)),*
        }

        impl PolicyKind {
            /// Fresh policy state for one run
            pub fn instantiate(self) -> BuiltinPolicy {
                match self {
                    $(PolicyKind::$variant => BuiltinPolicy::$variant(<$policy>::default())),*
                }
            }
        }

        impl LevelPolicy for BuiltinPolicy {
            #[inline]
            fn kind(&self) -> PolicyKind {
                match self {
                    $(Self::$variant(p) => p.kind()),*
                }
            }

            #[inline]
            fn begin<T: OHLC>(&mut self, bars: &[T], window: usize) {
                match self {
                    $(Self::$variant(p) => p.begin(bars, window)),*
                }
            }

            #[inline]
            fn on_swing(&mut self, swing: &ClassifiedSwing) {
                match self {
                    $(Self::$variant(p) => p.on_swing(swing)),*
                }
            }

            #[inline]
            fn on_bar<T: OHLC>(&mut self, bar: &T) {
                match self {
                    $(Self::$variant(p) => p.on_bar(bar)),*
                }
            }

            #[inline]
            fn levels(&self) -> LevelState {
                match self {
                    $(Self::$variant(p) => p.levels()),*
                }
            }
        }
    };
}

define_builtin_policies! {
    DirectOverwrite(DirectOverwritePolicy),
    BreakoutGated(BreakoutGatedPolicy),
    CloseBreakout(CloseBreakoutPolicy),
}

#[inline]
fn finite(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

// ============================================================
// DIRECT OVERWRITE
// ============================================================

/// Every confirmed swing immediately becomes its side's level.
///
/// Trend bias follows the latest label on each side: HH with HL is bull,
/// LH with LL is bear, anything else is neutral.
#[derive(Debug, Clone, Default)]
pub struct DirectOverwritePolicy {
    major_high: Option<f64>,
    major_low: Option<f64>,
    last_high_label: Option<SwingLabel>,
    last_low_label: Option<SwingLabel>,
}

impl LevelPolicy for DirectOverwritePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::DirectOverwrite
    }

    fn on_swing(&mut self, swing: &ClassifiedSwing) {
        match swing.event.side {
            SwingSide::High => {
                self.major_high = Some(swing.event.price);
                self.last_high_label = Some(swing.label);
            }
            SwingSide::Low => {
                self.major_low = Some(swing.event.price);
                self.last_low_label = Some(swing.label);
            }
        }
    }

    fn levels(&self) -> LevelState {
        let trend = match (self.last_high_label, self.last_low_label) {
            (Some(SwingLabel::HigherHigh), Some(SwingLabel::HigherLow)) => TrendBias::Bull,
            (Some(SwingLabel::LowerHigh), Some(SwingLabel::LowerLow)) => TrendBias::Bear,
            _ => TrendBias::Neutral,
        };
        LevelState { major_high: self.major_high, major_low: self.major_low, trend }
    }
}

// ============================================================
// BREAKOUT GATED
// ============================================================

/// Breakout-confirmed level updates.
///
/// Active levels start at the first valid high and low of the series and are
/// reported from the first classified swing onward. In a bull trend a higher
/// swing high extends the high and ratchets the low up to the latest swing
/// low; in a bear trend a swing high above the active high flips the trend.
/// Lows mirror this.
#[derive(Debug, Clone, Default)]
pub struct BreakoutGatedPolicy {
    active_high: Option<f64>,
    active_low: Option<f64>,
    candidate_high: Option<f64>,
    candidate_low: Option<f64>,
    trend: TrendBias,
    started: bool,
}

impl BreakoutGatedPolicy {
    fn on_high(&mut self, price: f64, label: SwingLabel) {
        self.candidate_high = Some(price);
        let breaks_out = self.active_high.map_or(false, |h| price > h);

        match self.trend {
            TrendBias::Bull => {
                if breaks_out {
                    if let Some(candidate) = self.candidate_low {
                        if self.active_low.map_or(false, |active| candidate > active) {
                            self.active_low = Some(candidate);
                        }
                    }
                    self.active_high = Some(price);
                }
            }
            TrendBias::Bear => {
                if breaks_out {
                    self.trend = TrendBias::Bull;
                    if self.candidate_low.is_some() {
                        self.active_low = self.candidate_low;
                    }
                    self.active_high = Some(price);
                }
            }
            TrendBias::Neutral => {
                self.active_high = Some(price);
                if label == SwingLabel::HigherHigh {
                    self.trend = TrendBias::Bull;
                }
            }
        }
    }

    fn on_low(&mut self, price: f64, label: SwingLabel) {
        self.candidate_low = Some(price);
        let breaks_down = self.active_low.map_or(false, |l| price < l);

        match self.trend {
            TrendBias::Bear => {
                if breaks_down {
                    if let Some(candidate) = self.candidate_high {
                        if self.active_high.map_or(false, |active| candidate < active) {
                            self.active_high = Some(candidate);
                        }
                    }
                    self.active_low = Some(price);
                }
            }
            TrendBias::Bull => {
                if breaks_down {
                    self.trend = TrendBias::Bear;
                    if self.candidate_high.is_some() {
                        self.active_high = self.candidate_high;
                    }
                    self.active_low = Some(price);
                }
            }
            TrendBias::Neutral => {
                self.active_low = Some(price);
                if label == SwingLabel::LowerLow {
                    self.trend = TrendBias::Bear;
                }
            }
        }
    }
}

impl LevelPolicy for BreakoutGatedPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::BreakoutGated
    }

    fn begin<T: OHLC>(&mut self, bars: &[T], _window: usize) {
        self.active_high = bars.iter().map(|b| b.high()).find(|h| !h.is_nan());
        self.active_low = bars.iter().map(|b| b.low()).find(|l| !l.is_nan());
    }

    fn on_swing(&mut self, swing: &ClassifiedSwing) {
        self.started = true;
        match swing.event.side {
            SwingSide::High => self.on_high(swing.event.price, swing.label),
            SwingSide::Low => self.on_low(swing.event.price, swing.label),
        }
    }

    fn levels(&self) -> LevelState {
        if !self.started {
            return LevelState::default();
        }
        LevelState { major_high: self.active_high, major_low: self.active_low, trend: self.trend }
    }
}

// ============================================================
// CLOSE BREAKOUT
// ============================================================

/// Close-confirmed breakouts evaluated on every bar.
///
/// Levels start at the extreme high/low of the first `window` bars. A close
/// above the active high turns the trend bull, promotes the last swing low to
/// support and drops the high; a close below the active low mirrors this.
/// While bull only the support is reported, while bear only the resistance.
/// The broken side reads as absent until the trend flips back; its last
/// value is not carried forward.
#[derive(Debug, Clone, Default)]
pub struct CloseBreakoutPolicy {
    active_high: Option<f64>,
    active_low: Option<f64>,
    last_swing_high: Option<f64>,
    last_swing_low: Option<f64>,
    trend: TrendBias,
}

impl LevelPolicy for CloseBreakoutPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::CloseBreakout
    }

    fn begin<T: OHLC>(&mut self, bars: &[T], window: usize) {
        let seed = if bars.len() > window { &bars[..window] } else { bars };
        let highs: Vec<f64> = seed.iter().map(|b| b.high()).collect();
        let lows: Vec<f64> = seed.iter().map(|b| b.low()).collect();
        self.active_high = finite(window_max(&highs));
        self.active_low = finite(window_min(&lows));
    }

    fn on_swing(&mut self, swing: &ClassifiedSwing) {
        let price = swing.event.price;
        match swing.event.side {
            SwingSide::High => {
                self.last_swing_high = Some(price);
                if self.trend == TrendBias::Bear {
                    self.active_high = Some(price);
                }
            }
            SwingSide::Low => {
                self.last_swing_low = Some(price);
                if self.trend == TrendBias::Bull {
                    self.active_low = Some(price);
                }
            }
        }
    }

    fn on_bar<T: OHLC>(&mut self, bar: &T) {
        let close = bar.close();
        if self.active_high.map_or(false, |h| close > h) {
            self.trend = TrendBias::Bull;
            if self.last_swing_low.is_some() {
                self.active_low = self.last_swing_low;
            }
            self.active_high = None;
        } else if self.active_low.map_or(false, |l| close < l) {
            self.trend = TrendBias::Bear;
            if self.last_swing_high.is_some() {
                self.active_high = self.last_swing_high;
            }
            self.active_low = None;
        }
    }

    fn levels(&self) -> LevelState {
        let (major_high, major_low) = match self.trend {
            TrendBias::Bull => (None, self.active_low),
            TrendBias::Bear => (self.active_high, None),
            TrendBias::Neutral => (self.active_high, self.active_low),
        };
        LevelState { major_high, major_low, trend: self.trend }
    }
}
