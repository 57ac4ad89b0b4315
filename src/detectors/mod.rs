//! Raw-series detectors
//!
//! Pure scans over the bar series, independent of each other:
//!
//! - **Swing**: symmetric-window extrema, reported at confirmation time
//! - **Reversal**: climax (V-shaped) and consecutive-bar turning points

pub mod helpers;
pub mod reversal;
pub mod swing;

// Re-export all detectors for convenience
pub use reversal::*;
pub use swing::*;
