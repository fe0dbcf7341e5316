//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Ratchet monotonicity: a stop only moves in the position's favor
//! 2. Exclusive position: direction and signed size always agree
//! 3. Equity conservation: final equity is capital plus realized P&L
//! 4. No look-ahead: a run over a prefix replays the full run's prefix
//! 5. Seed determinism: the same seed gives the same run

use chrono::{DateTime, Duration, Utc};
use coin_toss_bt::prelude::*;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_bars() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((-4.0..4.0_f64, 0.05..3.0_f64, 0.05..3.0_f64), 30..150).prop_map(|steps| {
        let start = DateTime::<Utc>::default();
        let mut close = 100.0_f64;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (step, up, down))| {
                let open = close;
                close = (close + step).max(5.0);
                let high = open.max(close) + up;
                let low = (open.min(close) - down).max(1.0);
                Bar::from((start + Duration::days(i as i64), open, high, low, close))
            })
            .collect()
    })
}

fn arb_policy() -> impl Strategy<Value = SizingPolicy> {
    prop_oneof![Just(SizingPolicy::FixedFractionalRisk), Just(SizingPolicy::FixedNotional)]
}

fn arb_config() -> impl Strategy<Value = BacktestConfig> {
    (
        0.001..0.2_f64,
        0.5..5.0_f64,
        1..15_usize,
        arb_policy(),
        any::<bool>(),
        any::<u64>(),
    )
        .prop_map(|(risk, multiplier, window, policy, shorts, seed)| {
            BacktestConfig::builder()
                .risk_pct(risk)
                .atr_multiplier(multiplier)
                .atr_window(window)
                .sizing_policy(policy)
                .allow_notional_shorts(shorts)
                .seed(seed)
                .build()
                .unwrap()
        })
}

fn close_to(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

// ── 1. Ratchet Monotonicity ──────────────────────────────────────────

proptest! {
    /// While the same position stays open its stop never loosens.
    #[test]
    fn trailing_stop_only_tightens(bars in arb_bars(), config in arb_config()) {
        let mut bt = Backtest::from_source(&bars, config).unwrap();
        let mut held = Vec::new();
        bt.run_with(|bt, _| {
            held.push(bt.position().map(|p| (p.entry_time(), p.side(), p.trail_stop())));
        });

        for pair in held.windows(2) {
            if let [Some((entry_a, side_a, Some(stop_a))), Some((entry_b, side_b, Some(stop_b)))] = pair {
                if entry_a == entry_b && side_a == side_b {
                    match side_a {
                        PositionSide::Long => prop_assert!(stop_b >= stop_a),
                        PositionSide::Short => prop_assert!(stop_b <= stop_a),
                    }
                }
            }
        }
    }

    /// Only the risk-managed policy carries a stop.
    #[test]
    fn stop_exists_only_under_risk_sizing(bars in arb_bars(), config in arb_config()) {
        let policy = config.sizing_policy();
        let mut bt = Backtest::from_source(&bars, config).unwrap();
        bt.run_with(|bt, _| {
            if bt.direction() != Direction::Flat {
                assert_eq!(bt.trail_stop().is_some(), policy == SizingPolicy::FixedFractionalRisk);
            }
        });
    }
}

// ── 2. Exclusive Position ────────────────────────────────────────────

proptest! {
    /// The engine is flat, long or short, never both, and the sign of the size says which.
    #[test]
    fn direction_matches_signed_size(bars in arb_bars(), config in arb_config()) {
        let mut bt = Backtest::from_source(&bars, config).unwrap();
        let mut states = Vec::new();
        bt.run_with(|bt, _| states.push((bt.direction(), bt.net_size())));

        for (direction, size) in states {
            match direction {
                Direction::Flat => prop_assert_eq!(size, 0.0),
                Direction::Long => prop_assert!(size > 0.0),
                Direction::Short => prop_assert!(size < 0.0),
            }
        }
    }
}

// ── 3. Equity Conservation ───────────────────────────────────────────

proptest! {
    /// Final equity equals initial capital plus the sum of realized P&L.
    #[test]
    fn equity_is_capital_plus_realized_pnl(bars in arb_bars(), config in arb_config()) {
        let mut bt = Backtest::from_source(&bars, config).unwrap();
        let report = bt.run();

        let realized = report.pnls().sum::<f64>();
        prop_assert!(close_to(report.final_equity, report.initial_capital + realized));
        prop_assert!(close_to(bt.realized_pnl(), realized));
        prop_assert_eq!(report.equity_curve.len(), bt.data().len());
        prop_assert_eq!(report.equity_curve.last().map(|p| p.equity), Some(report.final_equity));
    }

    /// The baseline is measured over exactly the bars the engine traded.
    #[test]
    fn baseline_uses_tradable_bars(bars in arb_bars(), config in arb_config()) {
        let mut bt = Backtest::from_source(&bars, config).unwrap();
        let report = bt.run();

        let traded = bt.data().bars();
        let first = traded.first().unwrap().close();
        let last = traded.last().unwrap().close();
        prop_assert!(close_to(report.buy_and_hold_pct, (last / first - 1.0) * 100.0));
        prop_assert_eq!(report.signal_counts.total(), traded.len());
    }
}

// ── 4. No Look-Ahead ─────────────────────────────────────────────────

proptest! {
    /// Cutting the future off does not change anything decided before the cut.
    #[test]
    fn prefix_run_replays_full_run(bars in arb_bars(), config in arb_config(), cut in 0.0..1.0_f64) {
        let series = BarSeries::new(bars).unwrap();
        let min_len = config.atr_window() + 1;
        let len = min_len + ((series.len() - min_len) as f64 * cut) as usize;
        let prefix = series.truncated(len);

        let full = Backtest::from_series(&series, config.clone()).unwrap().run();
        let partial = Backtest::from_series(&prefix, config).unwrap().run();

        let n = partial.equity_curve.len();
        prop_assert_eq!(&partial.equity_curve[..], &full.equity_curve[..n]);

        let cut_time = partial.equity_curve[n - 1].time;
        let closed_before = full
            .trades
            .iter()
            .filter(|t| t.exit_time() <= cut_time)
            .cloned()
            .collect::<Vec<_>>();
        prop_assert_eq!(partial.trades, closed_before);
    }
}

// ── 5. Seed Determinism ──────────────────────────────────────────────

proptest! {
    /// Two runs with the same seed agree trade for trade.
    #[test]
    fn same_seed_same_run(bars in arb_bars(), config in arb_config()) {
        let first = Backtest::from_source(&bars, config.clone()).unwrap().run();
        let second = Backtest::from_source(&bars, config).unwrap().run();

        prop_assert_eq!(first.trades, second.trades);
        prop_assert_eq!(first.equity_curve, second.equity_curve);
        prop_assert_eq!(first.signal_counts, second.signal_counts);
    }

    /// A seeded coin toss draws the same sequence regardless of the bars it sees.
    #[test]
    fn coin_toss_ignores_prices(seed in any::<u64>(), bars in arb_bars()) {
        let mut a = CoinToss::seeded(seed);
        let mut b = CoinToss::seeded(seed);
        let reference = bars[0];
        for bar in &bars {
            prop_assert_eq!(a.signal(bar), b.signal(&reference));
        }
    }
}
