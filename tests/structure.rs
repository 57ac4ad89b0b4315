//! Integration tests for the swingscope structure pipeline.
//!
//! These tests drive the public API end to end on small hand-built series.

use swingscope::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
    o: f64,
    h: f64,
    l: f64,
    c: f64,
}

impl TestBar {
    fn new(o: f64, h: f64, l: f64, c: f64) -> Self {
        Self { o, h, l, c }
    }
}

impl OHLC for TestBar {
    fn open(&self) -> f64 {
        self.o
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        self.c
    }
}

/// Bars with the given highs, a 1.0 range and a doji body
fn from_highs(highs: &[f64]) -> Vec<TestBar> {
    highs.iter().map(|&h| TestBar::new(h - 0.5, h, h - 1.0, h - 0.5)).collect()
}

/// Flat doji bar centered on `mid` with a 1.0 true range
fn quiet(mid: f64) -> TestBar {
    TestBar::new(mid, mid + 0.5, mid - 0.5, mid)
}

fn engine(window: usize) -> StructureEngine {
    EngineBuilder::new().swing_window(window).build().unwrap()
}

// ============================================================
// SWING DETECTION
// ============================================================

#[test]
fn test_scenario_a_peak_confirms_two_bars_late() {
    let bars = from_highs(&[5.0, 6.0, 9.0, 7.0, 5.0, 4.0, 3.0]);
    let result = engine(2).analyze(&bars).unwrap();

    assert_eq!(result.rows[4].swing_high_price, Some(9.0));
    assert!(result.rows[..4].iter().all(|r| r.swing_high_price.is_none()));

    let peak = result.swings.iter().find(|s| s.event.side == SwingSide::High).unwrap();
    assert_eq!(peak.event.anchor_index, 2);
    assert_eq!(peak.event.confirm_index, 4);
    assert_eq!(peak.label, SwingLabel::HigherHigh);
}

#[test]
fn test_anchored_marks_sit_on_extremum_bar() {
    let bars = from_highs(&[5.0, 6.0, 9.0, 7.0, 5.0, 4.0, 3.0]);
    let swings = engine(2).detect_swings(&bars);

    assert_eq!(swings.anchored()[2].high, Some(9.0));
    assert_eq!(swings.confirmed()[4].high, Some(9.0));
}

// ============================================================
// CLASSIFICATION
// ============================================================

#[test]
fn test_scenario_b_double_top() {
    let bars = from_highs(&[99.0, 100.0, 99.0, 98.0, 99.0, 100.05, 99.0, 98.0]);
    let result = EngineBuilder::new()
        .swing_window(1)
        .price_tolerance_pct(0.001)
        .build()
        .unwrap()
        .analyze(&bars)
        .unwrap();

    let highs: Vec<_> = result.swings.iter().filter(|s| s.event.side == SwingSide::High).collect();
    assert_eq!(highs.len(), 2);
    assert_eq!(highs[0].label, SwingLabel::HigherHigh);
    assert_eq!(highs[1].label, SwingLabel::DoubleTop);
    assert_eq!(result.rows[6].swing_type, Some(SwingLabel::DoubleTop));
}

#[test]
fn test_tighter_tolerance_separates_double_top() {
    let bars = from_highs(&[99.0, 100.0, 99.0, 98.0, 99.0, 100.05, 99.0, 98.0]);
    let result = EngineBuilder::new()
        .swing_window(1)
        .price_tolerance_pct(0.0001)
        .build()
        .unwrap()
        .analyze(&bars)
        .unwrap();

    assert_eq!(result.rows[6].swing_type, Some(SwingLabel::HigherHigh));
}

/// Highs fall one point per bar; every fourth bar dips 3 points lower.
fn falling_lows(n: usize) -> Vec<TestBar> {
    (0..n)
        .map(|i| {
            let h = 200.0 - i as f64;
            let dip = if i % 4 == 2 { 3.0 } else { 0.0 };
            let l = h - 2.0 - dip;
            TestBar::new(h - 0.5, h, l, l + 0.5)
        })
        .collect()
}

#[test]
fn test_scenario_e_falling_lows_never_move_high() {
    let bars = falling_lows(40);
    let result = engine(2).analyze(&bars).unwrap();

    assert_eq!(result.diagnostics.swing_highs, 0);
    assert!(result.diagnostics.swing_lows >= 5);
    assert!(result
        .swings
        .iter()
        .skip(1)
        .all(|s| s.label == SwingLabel::LowerLow));

    let first = result.swings[0].event.confirm_index;
    for row in &result.rows[first..] {
        assert_eq!(row.major_high, Some(200.0), "row {}", row.index);
        assert_eq!(row.trend_bias, TrendBias::Bear);
    }
    assert!(result.rows[..first].iter().all(|r| r.major_high.is_none()));
}

#[test]
fn test_direct_overwrite_follows_every_swing() {
    let bars = falling_lows(40);
    let result = EngineBuilder::new()
        .swing_window(2)
        .level_policy(PolicyKind::DirectOverwrite)
        .build()
        .unwrap()
        .analyze(&bars)
        .unwrap();

    for swing in &result.swings {
        let row = &result.rows[swing.event.confirm_index];
        assert_eq!(row.major_low, Some(swing.event.price));
    }
    // No swing high ever confirms, so the label pair never reads bearish
    assert!(result.rows.iter().all(|r| r.major_high.is_none()));
    assert_eq!(result.final_trend(), TrendBias::Neutral);
}

#[test]
fn test_close_breakout_drops_broken_side() {
    let mut bars = vec![quiet(100.0), quiet(100.0)];
    for i in 0..8 {
        let base = 101.0 + i as f64;
        bars.push(TestBar::new(base, base + 1.5, base - 0.5, base + 1.0));
    }
    let result = EngineBuilder::new()
        .swing_window(2)
        .level_policy(PolicyKind::CloseBreakout)
        .build()
        .unwrap()
        .analyze(&bars)
        .unwrap();

    assert_eq!(result.rows[0].major_high, Some(100.5));
    assert_eq!(result.rows[0].major_low, Some(99.5));
    assert_eq!(result.rows[0].trend_bias, TrendBias::Neutral);

    // Bar 2 closes at 102.0, above the seeded 100.5
    for row in &result.rows[2..] {
        assert_eq!(row.trend_bias, TrendBias::Bull);
        assert_eq!(row.major_high, None);
        assert_eq!(row.major_low, Some(99.5));
    }
}

// ============================================================
// REVERSALS
// ============================================================

fn v_top() -> Vec<TestBar> {
    vec![
        quiet(100.0),
        quiet(100.0),
        quiet(100.0),
        quiet(100.0),
        TestBar::new(100.0, 103.8, 99.9, 103.5),
        TestBar::new(103.4, 103.5, 99.0, 99.5),
    ]
}

#[test]
fn test_scenario_c_v_top_override() {
    let bars = v_top();
    let result = engine(5).analyze(&bars).unwrap();

    assert_eq!(result.reversals.len(), 1);
    let event = result.reversals[0];
    assert_eq!(event.kind, ReversalKind::Climax);
    assert_eq!(event.side, ReversalSide::Top);
    assert_eq!(event.trigger_index, 5);
    assert_eq!(event.anchor_index, 4);
    assert_eq!(event.override_price, 103.8);

    assert_eq!(result.diagnostics.climax_events, 1);
    assert_eq!(result.rows[5].adjusted_major_high, Some(103.8));
    assert!(result.rows[..5].iter().all(|r| r.adjusted_major_high.is_none()));
}

#[test]
fn test_higher_multiplier_suppresses_climax() {
    let bars = v_top();
    let result = EngineBuilder::new().atr_multiplier(3.0).build().unwrap().analyze(&bars).unwrap();
    assert_eq!(result.diagnostics.climax_events, 0);
}

/// Ten quiet bars, then a six-bar bearish run starting at index 10
fn bear_run() -> Vec<TestBar> {
    let mut bars: Vec<TestBar> = (0..10).map(|_| quiet(100.0)).collect();
    for k in 0..6 {
        let open = 100.0 - 0.5 * k as f64;
        bars.push(TestBar::new(open, open + 0.25, open - 0.75, open - 0.5));
    }
    bars
}

#[test]
fn test_scenario_d_consecutive_fires_once() {
    let bars = bear_run();
    let result = engine(5).analyze(&bars).unwrap();

    let consecutive: Vec<_> =
        result.reversals.iter().filter(|e| e.kind == ReversalKind::Consecutive).collect();
    assert_eq!(consecutive.len(), 1);
    assert_eq!(consecutive[0].side, ReversalSide::Top);
    assert_eq!(consecutive[0].trigger_index, 12);
    assert_eq!(consecutive[0].anchor_index, 10);
    assert_eq!(consecutive[0].override_price, bars[10].h);
    assert_eq!(result.diagnostics.consecutive_events, 1);
}

#[test]
fn test_longer_count_fires_later() {
    let bars = bear_run();
    let result =
        EngineBuilder::new().consecutive_count(5).build().unwrap().analyze(&bars).unwrap();

    let event = result.reversals.iter().find(|e| e.kind == ReversalKind::Consecutive).unwrap();
    assert_eq!(event.trigger_index, 14);
    assert_eq!(event.anchor_index, 10);
}

// ============================================================
// FUSION
// ============================================================

#[test]
fn test_adjusted_high_breaks_and_stays_absent() {
    // Swing high 110 at bar 2 confirms at 4; bar 6 trades through it
    let mut highs = vec![105.0, 107.0, 110.0, 108.0, 106.0, 107.0, 111.0];
    highs.extend([109.0, 108.5, 108.0]);
    let bars = from_highs(&highs);
    let result = engine(2).analyze(&bars).unwrap();

    assert_eq!(result.rows[4].major_high, Some(110.0));
    assert_eq!(result.rows[4].adjusted_major_high, Some(110.0));
    assert_eq!(result.rows[5].adjusted_major_high, Some(110.0));
    assert_eq!(result.rows[6].adjusted_major_high, None);
    // Raw level is unchanged, so the broken level stays gone
    assert_eq!(result.rows[7].major_high, Some(110.0));
    assert_eq!(result.rows[7].adjusted_major_high, None);
}

#[test]
fn test_adjusted_never_exceeded_while_active() {
    let bars: Vec<TestBar> = (0..300)
        .map(|i| {
            let t = i as f64;
            let mid = 100.0 + 8.0 * (t / 9.0).sin() + 3.0 * (t / 2.3).cos() + t * 0.02;
            let body = 0.6 * (t / 1.7).sin();
            TestBar::new(mid - body, mid + 1.2, mid - 1.2, mid + body)
        })
        .collect();
    let result = engine(3).analyze(&bars).unwrap();

    for t in 1..bars.len() {
        let prev = result.rows[t - 1].adjusted_major_high;
        let curr = result.rows[t].adjusted_major_high;
        if let (Some(level), Some(now)) = (prev, curr) {
            let reestablished = result.rows[t].major_high != result.rows[t - 1].major_high
                || result
                    .reversals
                    .iter()
                    .any(|e| e.trigger_index == t && e.side == ReversalSide::Top);
            if !reestablished {
                assert!(bars[t].h <= level, "bar {t} high {} above active {level}", bars[t].h);
                assert!(now <= level);
            }
        }
    }
}

// ============================================================
// CONFIGURATION
// ============================================================

#[test]
fn test_config_json_round_trip() {
    let config = StructureConfig {
        swing_window: 3,
        level_policy: PolicyKind::CloseBreakout,
        ..Default::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"level_policy\":\"close_breakout\""));

    let back: StructureConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_config_json_defaults_and_unknown_fields() {
    let partial: StructureConfig = serde_json::from_str(r#"{"swing_window": 7}"#).unwrap();
    assert_eq!(partial.swing_window, 7);
    assert_eq!(partial.consecutive_count, 3);
    assert_eq!(partial.level_policy, PolicyKind::BreakoutGated);

    assert!(serde_json::from_str::<StructureConfig>(r#"{"swing_windw": 7}"#).is_err());
}

#[test]
fn test_invalid_json_config_fails_at_build() {
    let config: StructureConfig = serde_json::from_str(r#"{"price_tolerance_pct": 0.2}"#).unwrap();
    match EngineBuilder::from_config(config).build() {
        Err(StructureError::OutOfRange { field, .. }) => assert_eq!(field, "price_tolerance_pct"),
        other => panic!("expected OutOfRange, got {other:?}"),
    }
}

#[test]
fn test_result_serializes() {
    let bars = from_highs(&[5.0, 6.0, 9.0, 7.0, 5.0, 4.0, 3.0]);
    let result = engine(2).analyze(&bars).unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["rows"][4]["swing_type"], "HH");
    assert_eq!(json["rows"][4]["swing_high_price"], 9.0);
    assert_eq!(json["swings"][0]["anchor_index"], 2);
    assert_eq!(json["diagnostics"]["bars"], 7);
}

// ============================================================
// PARALLEL
// ============================================================

#[test]
fn test_parallel_matches_sequential() {
    let engine = engine(2);
    let a = falling_lows(40);
    let b = bear_run();
    let c = v_top();

    let instruments = vec![("A", a.as_slice()), ("B", b.as_slice()), ("C", c.as_slice())];
    let (results, errors) = analyze_parallel(&engine, instruments);

    assert!(errors.is_empty());
    assert_eq!(results.len(), 3);
    for r in &results {
        let bars = match r.symbol.as_str() {
            "A" => &a,
            "B" => &b,
            _ => &c,
        };
        assert_eq!(r.result, engine.analyze(bars).unwrap());
    }
}
