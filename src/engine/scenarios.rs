use chrono::{DateTime, Duration, Utc};

use super::*;
use crate::signals::Signal::{Long, Short};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn series(closes: &[f64]) -> BarSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let time = DateTime::<Utc>::default() + Duration::days(i as i64);
            Bar::from((time, close, close + 1.0, close - 1.0, close))
        })
        .collect();
    BarSeries::new(bars).unwrap()
}

fn backtest(closes: &[f64], atr: &[f64], signals: &[Signal], config: BacktestConfig) -> Backtest {
    let data = MarketData::from_parts(&series(closes), atr.to_vec(), signals.to_vec()).unwrap();
    Backtest::new(data, config).unwrap()
}

fn risk_config() -> BacktestConfig {
    BacktestConfig::default()
}

fn notional_config() -> BacktestConfig {
    BacktestConfig::builder()
        .sizing_policy(SizingPolicy::FixedNotional)
        .fixed_notional(100.0)
        .build()
        .unwrap()
}

#[test]
fn simple_long_round_trip() {
    let mut bt = backtest(&[100.0, 105.0, 95.0], &[2.0; 3], &[Long, Long, Long], risk_config());
    let mut stops = Vec::new();
    let report = bt.run_with(|bt, _| stops.push(bt.trail_stop()));

    assert_eq!(stops, vec![Some(94.0), Some(99.0), None]);
    assert_eq!(report.trades.len(), 1);

    let size = 0.01 * 10_000.0 / (3.0 * 2.0);
    let trade = &report.trades[0];
    assert_eq!(trade.side(), PositionSide::Long);
    assert_eq!(trade.entry_price(), 100.0);
    assert_eq!(trade.exit_price(), 95.0);
    assert_eq!(trade.reason(), ExitReason::TrailingStop);
    assert!(approx(trade.pnl(), size * (95.0 - 100.0)));
    assert!(approx(report.final_equity, 10_000.0 + size * -5.0));
    assert!(report.final_equity < 10_000.0);
    assert_eq!(bt.direction(), Direction::Flat);
}

#[test]
fn simple_short_round_trip() {
    let mut bt = backtest(&[100.0, 95.0, 104.0], &[2.0; 3], &[Short, Short, Short], risk_config());
    let mut stops = Vec::new();
    let report = bt.run_with(|bt, _| stops.push(bt.trail_stop()));

    assert_eq!(stops, vec![Some(106.0), Some(101.0), None]);
    let size = 0.01 * 10_000.0 / 6.0;
    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.trades[0].size(), -size);
    assert!(approx(report.trades[0].pnl(), -size * (104.0 - 100.0)));
}

#[test]
fn same_side_signal_is_a_no_op() {
    let mut bt = backtest(&[100.0, 102.0, 103.0], &[2.0; 3], &[Long, Long, Long], risk_config());
    let report = bt.run();

    assert!(report.trades.is_empty());
    let position = report.open_position.unwrap();
    assert_eq!(position.entry_price(), 100.0);
    assert_eq!(position.trail_stop(), Some(97.0));
    assert_eq!(report.final_equity, 10_000.0);
}

#[test]
fn reversal_flips_without_going_flat() {
    let mut bt = backtest(&[100.0, 101.0], &[2.0; 2], &[Long, Short], risk_config());
    let mut directions = Vec::new();
    let report = bt.run_with(|bt, _| directions.push(bt.direction()));

    assert_eq!(directions, vec![Direction::Long, Direction::Short]);
    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.trades[0].reason(), ExitReason::Reversal);

    let long_size = 100.0 / 6.0;
    let equity = 10_000.0 + long_size * 1.0;
    assert!(approx(report.final_equity, equity));

    // the new short is sized from the equity after the reversal
    let short = report.open_position.unwrap();
    assert!(approx(short.size(), -(0.01 * equity / 6.0)));
    assert_eq!(short.entry_price(), 101.0);
    assert_eq!(short.trail_stop(), Some(107.0));
}

#[test]
fn zero_atr_blocks_entry() {
    let mut bt = backtest(&[100.0; 4], &[0.0; 4], &[Long, Short, Long, Short], risk_config());
    let report = bt.run();

    assert!(report.trades.is_empty());
    assert!(report.open_position.is_none());
    assert!(report.equity_curve.iter().all(|p| p.equity == 10_000.0));
}

#[test]
fn zero_atr_blocks_reversal_but_not_the_stop() {
    let mut bt = backtest(&[100.0, 101.0], &[2.0, 0.0], &[Long, Short], risk_config());
    let report = bt.run();

    // the short entry is rejected; the zero-width stop then closes the long at the close
    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.trades[0].reason(), ExitReason::TrailingStop);
    assert_eq!(report.trades[0].exit_price(), 101.0);
    assert!(report.open_position.is_none());
}

#[test]
fn equity_curve_has_one_point_per_bar() {
    let closes = [100.0, 105.0, 95.0, 97.0];
    let mut bt = backtest(&closes, &[2.0; 4], &[Long, Long, Long, Short], risk_config());
    let report = bt.run();

    assert_eq!(report.equity_curve.len(), closes.len());
    let times = report.equity_curve.iter().map(|p| p.time).collect::<Vec<_>>();
    let expected = bt.data().bars().iter().map(Bar::time).collect::<Vec<_>>();
    assert_eq!(times, expected);
    // equity only moves at the stop exit on the third bar
    assert_eq!(report.equity_curve[0].equity, 10_000.0);
    assert_eq!(report.equity_curve[1].equity, 10_000.0);
    assert!(report.equity_curve[2].equity < 10_000.0);
}

#[test]
fn notional_closes_only_on_opposing_signal() {
    let mut bt = backtest(
        &[100.0, 110.0, 120.0, 90.0],
        &[2.0; 4],
        &[Long, Long, Short, Short],
        notional_config(),
    );
    let report = bt.run();

    assert_eq!(report.trades.len(), 1);
    let trade = &report.trades[0];
    assert_eq!(trade.reason(), ExitReason::OpposingSignal);
    assert_eq!(trade.size(), 1.0);
    assert!(approx(trade.pnl(), 20.0));
    // shorts are disabled, so the last short signal leaves the engine flat
    assert!(report.open_position.is_none());
    assert!(approx(report.final_equity, 10_020.0));
}

#[test]
fn notional_has_no_stop() {
    let mut bt = backtest(&[100.0, 50.0, 10.0], &[2.0; 3], &[Long, Long, Long], notional_config());
    let report = bt.run();

    assert!(report.trades.is_empty());
    let position = report.open_position.unwrap();
    assert!(position.trail_stop().is_none());
    assert_eq!(report.final_equity, 10_000.0);
}

#[test]
fn notional_shorts_when_enabled() {
    let config = BacktestConfig::builder()
        .sizing_policy(SizingPolicy::FixedNotional)
        .allow_notional_shorts(true)
        .build()
        .unwrap();
    let mut bt = backtest(&[100.0, 80.0], &[2.0; 2], &[Short, Long], config);
    let report = bt.run();

    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.trades[0].side(), PositionSide::Short);
    assert!(approx(report.trades[0].pnl(), 20.0));
    // the opposing signal only unwinds, it does not reverse
    assert!(report.open_position.is_none());
}

#[test]
fn baseline_matches_flat_run() {
    let closes = [100.0, 90.0, 120.0, 130.0];
    let mut bt = backtest(&closes, &[0.0; 4], &[Long; 4], risk_config());
    let report = bt.run();

    assert!(report.trades.is_empty());
    assert_eq!(report.buy_and_hold_pct, (130.0 / 100.0 - 1.0) * 100.0);
    assert_eq!(report.total_return_pct(), 0.0);
    assert_eq!(report.alpha_pct(), -report.buy_and_hold_pct);
}

#[test]
fn signal_counts_are_reported() {
    let mut bt = backtest(&[100.0; 5], &[1.0; 5], &[Long, Short, Short, Long, Short], risk_config());
    let report = bt.run();
    assert_eq!(report.signal_counts, SignalCounts { long: 2, short: 3 });
}

#[test]
fn step_advances_one_bar() {
    let mut bt = backtest(&[100.0, 105.0], &[2.0; 2], &[Long, Long], risk_config());

    assert!(bt.step());
    assert_eq!(bt.index(), 1);
    assert_eq!(bt.direction(), Direction::Long);
    assert!(bt.net_size() > 0.0);

    assert!(bt.step());
    assert!(bt.is_finished());
    assert!(!bt.step());
    assert_eq!(bt.equity_curve().len(), 2);
}

#[test]
fn reset_replays_identically() {
    let closes = [100.0, 105.0, 95.0, 98.0, 92.0, 99.0];
    let signals = [Long, Short, Long, Long, Short, Long];
    let mut bt = backtest(&closes, &[2.0; 6], &signals, risk_config());

    let first = bt.run();
    bt.reset();
    assert_eq!(bt.index(), 0);
    assert_eq!(bt.balance(), 10_000.0);
    let second = bt.run();

    assert_eq!(first.trades, second.trades);
    assert_eq!(first.equity_curve, second.equity_curve);
}

#[test]
fn from_parts_checks_alignment() {
    let bars = series(&[100.0, 101.0]);
    let result = MarketData::from_parts(&bars, vec![1.0, 1.0], vec![Long]);
    assert!(matches!(result, Err(Error::SignalCountMismatch { expected: 2, got: 1 })));

    let result = MarketData::from_parts(&bars, vec![1.0], vec![Long, Long]);
    assert!(matches!(result, Err(Error::Msg(_))));

    let result = MarketData::from_parts(&bars, vec![1.0, f64::NAN], vec![Long, Long]);
    assert!(matches!(result, Err(Error::Msg(_))));
}

#[test]
fn prepare_skips_warmup_bars() {
    let closes = (0..15).map(|i| 100.0 + i as f64).collect::<Vec<_>>();
    let bars = series(&closes);
    let mut coin = CoinToss::seeded(1);
    let data = MarketData::prepare(&bars, 10, &mut coin).unwrap();

    assert_eq!(data.len(), 5);
    assert_eq!(data.warmup(), 10);
    assert_eq!(data.bars()[0].close(), 110.0);
    assert_eq!(data.signal_counts().total(), 5);
    assert_eq!(data.buy_and_hold_return_pct().unwrap(), (114.0 / 110.0 - 1.0) * 100.0);
}

#[test]
fn prepare_needs_enough_history() {
    let bars = series(&[100.0, 101.0, 102.0]);
    let mut coin = CoinToss::seeded(1);
    let result = MarketData::prepare(&bars, 3, &mut coin);
    assert!(matches!(result, Err(Error::InsufficientHistory { bars: 3, window: 3 })));
}
