//! Core backtest engine.
//!
//! This module provides the fundamental types for backtesting:
//! - `Bar` / `BarSeries`: validated OHLC input.
//! - `MarketData`: tradable bars with their ATR and signal, computed once per run.
//! - `Position` / `Trade`: the single open position and the closed-trade log.
//! - `Wallet`: realized equity.
//! - `Backtest`: the per-bar state machine.

mod bar;
mod config;
mod position;
mod wallet;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    PercentCalculus,
    baseline::buy_and_hold_return_pct,
    data::BarSource,
    errors::{Error, Result},
    indicators::average_true_range,
    signals::{CoinToss, Signal, SignalCounts, SignalGenerator},
};

pub use bar::*;
pub use config::*;
pub use position::*;
pub use wallet::*;

#[cfg(test)]
mod scenarios;

/// Bars that carry a defined ATR, each paired with its ATR and signal.
///
/// Warm-up bars (undefined ATR) are excluded here, so the engine and the
/// buy-and-hold baseline see exactly the same bars.
#[derive(Debug, Clone)]
pub struct MarketData {
    bars: Arc<[Bar]>,
    atr: Arc<[f64]>,
    signals: Arc<[Signal]>,
    warmup: usize,
}

impl MarketData {
    /// Computes the ATR over `series`, drops the warm-up bars and draws one
    /// signal per remaining bar, in bar order.
    pub fn prepare<G>(series: &BarSeries, atr_window: usize, generator: &mut G) -> Result<Self>
    where
        G: SignalGenerator + ?Sized,
    {
        let readings = average_true_range(series.as_slice(), atr_window)?;
        let (bars, atr): (Vec<Bar>, Vec<f64>) = series
            .iter()
            .zip(&readings)
            .filter_map(|(bar, reading)| reading.atr.map(|atr| (*bar, atr)))
            .unzip();

        if bars.is_empty() {
            return Err(Error::InsufficientHistory {
                bars: series.len(),
                window: atr_window,
            });
        }

        let signals = bars.iter().map(|bar| generator.signal(bar)).collect::<Arc<[Signal]>>();
        let warmup = series.len() - bars.len();
        info!("prepared {} tradable bars ({warmup} warm-up bars skipped)", bars.len());

        Ok(Self {
            bars: bars.into(),
            atr: atr.into(),
            signals,
            warmup,
        })
    }

    /// Assembles market data from precomputed ATR values and signals.
    ///
    /// Every slice must be aligned with `series`, and every ATR finite and non-negative.
    pub fn from_parts(series: &BarSeries, atr: Vec<f64>, signals: Vec<Signal>) -> Result<Self> {
        if signals.len() != series.len() {
            return Err(Error::SignalCountMismatch {
                expected: series.len(),
                got: signals.len(),
            });
        }
        if atr.len() != series.len() {
            return Err(Error::Msg(format!(
                "Expected {} ATR values, got {}",
                series.len(),
                atr.len()
            )));
        }
        if let Some(value) = atr.iter().find(|a| !a.is_finite() || **a < 0.0) {
            return Err(Error::Msg(format!("Invalid ATR value: {value}")));
        }

        Ok(Self {
            bars: Arc::from(series.as_slice()),
            atr: atr.into(),
            signals: signals.into(),
            warmup: 0,
        })
    }

    /// Returns the number of tradable bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false: market data without a tradable bar is rejected.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Returns the tradable bars.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Returns the ATR of each tradable bar.
    pub fn atr(&self) -> &[f64] {
        &self.atr
    }

    /// Returns the signal of each tradable bar.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Returns the number of warm-up bars excluded.
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// Counts long and short signals.
    pub fn signal_counts(&self) -> SignalCounts {
        self.signals.iter().collect()
    }

    /// Buy-and-hold return over the tradable bars, in percent.
    pub fn buy_and_hold_return_pct(&self) -> Result<f64> {
        buy_and_hold_return_pct(&self.bars)
    }
}

/// Realized equity after a bar.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    /// Bar timestamp.
    pub time: DateTime<Utc>,
    /// Equity once the bar has been processed.
    pub equity: f64,
}

/// Outcome of a backtest run.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct BacktestReport {
    /// Sizing policy used.
    pub policy: SizingPolicy,
    /// Starting equity.
    pub initial_capital: f64,
    /// Equity after the last bar. Excludes the P&L of a still-open position.
    pub final_equity: f64,
    /// Closed trades in order.
    pub trades: Vec<Trade>,
    /// One equity snapshot per processed bar.
    pub equity_curve: Vec<EquityPoint>,
    /// Signals drawn over the tradable bars.
    pub signal_counts: SignalCounts,
    /// Buy-and-hold return over the same bars, in percent.
    pub buy_and_hold_pct: f64,
    /// Position still open after the last bar.
    pub open_position: Option<Position>,
}

impl BacktestReport {
    /// Returns the realized P&L of every trade.
    pub fn pnls(&self) -> impl Iterator<Item = f64> + '_ {
        self.trades.iter().map(Trade::pnl)
    }

    /// Strategy return in percent.
    pub fn total_return_pct(&self) -> f64 {
        self.initial_capital.change(self.final_equity)
    }

    /// Strategy return minus buy-and-hold return, in percentage points.
    pub fn alpha_pct(&self) -> f64 {
        self.total_return_pct() - self.buy_and_hold_pct
    }
}

/// Backtest engine: replays [`MarketData`] bar by bar.
///
/// Per bar, in order:
/// 1. entry or reversal on the bar's signal,
/// 2. trailing-stop ratchet (risk-managed policy only),
/// 3. stop exit,
/// 4. equity snapshot.
///
/// ### Example
/// ```rust
/// use coin_toss_bt::prelude::*;
/// use chrono::{DateTime, Duration, Utc};
///
/// let bars = (0..40)
///     .map(|i| {
///         let close = 100.0 + (i as f64 * 0.4).sin() * 5.0;
///         let time = DateTime::<Utc>::default() + Duration::days(i);
///         Bar::from((time, close, close + 1.0, close - 1.0, close))
///     })
///     .collect::<Vec<_>>();
/// let series = BarSeries::new(bars).unwrap();
/// let config = BacktestConfig::builder().seed(42).build().unwrap();
///
/// let mut bt = Backtest::from_series(&series, config).unwrap();
/// let report = bt.run();
/// let realized = report.pnls().sum::<f64>();
/// assert!((report.final_equity - (10_000.0 + realized)).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct Backtest {
    index: usize,
    wallet: Wallet,
    config: BacktestConfig,
    data: Arc<MarketData>,
    position: Option<Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
}

impl std::ops::Deref for Backtest {
    type Target = Wallet;

    fn deref(&self) -> &Self::Target {
        &self.wallet
    }
}

impl Backtest {
    /// Creates a backtest over prepared market data.
    pub fn new(data: impl Into<Arc<MarketData>>, config: BacktestConfig) -> Result<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(Error::BarDataEmpty);
        }

        Ok(Self {
            index: 0,
            wallet: Wallet::new(config.initial_capital())?,
            equity_curve: Vec::with_capacity(data.len()),
            trades: Vec::new(),
            position: None,
            config,
            data,
        })
    }

    /// Prepares `series` with a coin toss seeded from the configuration.
    pub fn from_series(series: &BarSeries, config: BacktestConfig) -> Result<Self> {
        let mut coin = CoinToss::from_seed(config.seed());
        let data = MarketData::prepare(series, config.atr_window(), &mut coin)?;
        Self::new(data, config)
    }

    /// Loads, validates and prepares the bars of `source`.
    pub fn from_source<S: BarSource + ?Sized>(source: &S, config: BacktestConfig) -> Result<Self> {
        Self::from_series(&BarSeries::from_source(source)?, config)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Returns the market data.
    pub fn data(&self) -> &MarketData {
        &self.data
    }

    /// Returns the number of bars processed so far.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns true once every bar has been processed.
    pub fn is_finished(&self) -> bool {
        self.index >= self.data.len()
    }

    /// Returns the open position, if any.
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Returns the current exposure.
    pub fn direction(&self) -> Direction {
        self.position.as_ref().map_or(Direction::Flat, |p| p.side().into())
    }

    /// Returns the signed share count, zero when flat.
    pub fn net_size(&self) -> f64 {
        self.position.as_ref().map_or(0.0, Position::size)
    }

    /// Returns the trailing stop of the open position.
    pub fn trail_stop(&self) -> Option<f64> {
        self.position.as_ref().and_then(Position::trail_stop)
    }

    /// Returns the closed trades.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Returns the equity snapshots recorded so far.
    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Processes the next bar. Returns false when no bar is left.
    pub fn step(&mut self) -> bool {
        let Some(bar) = self.data.bars.get(self.index).copied() else {
            return false;
        };
        let atr = self.data.atr[self.index];
        let signal = self.data.signals[self.index];

        match self.config.sizing_policy() {
            SizingPolicy::FixedFractionalRisk => self.step_risk(&bar, atr, signal),
            SizingPolicy::FixedNotional => self.step_notional(&bar, signal),
        }

        self.equity_curve.push(EquityPoint {
            time: bar.time(),
            equity: self.wallet.balance(),
        });
        self.index += 1;
        true
    }

    /// Runs every remaining bar and returns the report.
    pub fn run(&mut self) -> BacktestReport {
        self.run_with(|_, _| {})
    }

    /// Runs every remaining bar, calling `func` after each one.
    ///
    /// ### Arguments
    /// * `func` - A closure that observes the engine and the bar just processed.
    pub fn run_with<F>(&mut self, mut func: F) -> BacktestReport
    where
        F: FnMut(&Self, &Bar),
    {
        while let Some(bar) = self.data.bars.get(self.index).copied() {
            self.step();
            func(self, &bar);
        }

        info!(
            "{} run over {} bars: {} trades, equity {:.2} -> {:.2}",
            self.config.sizing_policy(),
            self.index,
            self.trades.len(),
            self.wallet.initial_balance(),
            self.wallet.balance()
        );
        self.report()
    }

    /// Snapshot of the run so far.
    pub fn report(&self) -> BacktestReport {
        BacktestReport {
            policy: self.config.sizing_policy(),
            initial_capital: self.wallet.initial_balance(),
            final_equity: self.wallet.balance(),
            trades: self.trades.clone(),
            equity_curve: self.equity_curve.clone(),
            signal_counts: self.data.signal_counts(),
            buy_and_hold_pct: self.data.buy_and_hold_return_pct().unwrap_or_default(),
            open_position: self.position.clone(),
        }
    }

    /// Resets the backtest to its initial state.
    pub fn reset(&mut self) {
        self.index = 0;
        self.wallet.reset();
        self.position = None;
        self.trades = Vec::new();
        self.equity_curve = Vec::with_capacity(self.data.len());
    }

    /// Fixed-fractional risk with an ATR trailing stop.
    fn step_risk(&mut self, bar: &Bar, atr: f64, signal: Signal) {
        let side = match signal {
            Signal::Long => PositionSide::Long,
            Signal::Short => PositionSide::Short,
        };
        let net_size = self.net_size();
        let may_enter = match side {
            PositionSide::Long => net_size <= 0.0,
            PositionSide::Short => net_size >= 0.0,
        };
        if may_enter {
            self.enter_with_stop(bar, side, atr);
        }

        let price = bar.close();
        let stop_distance = self.config.atr_multiplier() * atr;
        let stopped_out = match &mut self.position {
            Some(position) => {
                position.ratchet_stop(price - position.side().sign() * stop_distance);
                position.is_stopped_out(price)
            }
            None => false,
        };
        if stopped_out {
            self.close_position(bar, ExitReason::TrailingStop);
        }
    }

    fn enter_with_stop(&mut self, bar: &Bar, side: PositionSide, atr: f64) {
        let stop_distance = self.config.atr_multiplier() * atr;
        if stop_distance <= 0.0 {
            trace!("{side:?} entry skipped at {}: zero stop distance", bar.time());
            return;
        }

        if self.position.is_some() {
            self.close_position(bar, ExitReason::Reversal);
        }

        let risk_amount = self.config.risk_pct() * self.wallet.balance();
        if risk_amount <= 0.0 {
            trace!("{side:?} entry skipped at {}: no equity left to risk", bar.time());
            return;
        }

        let price = bar.close();
        let quantity = risk_amount / stop_distance;
        let stop = price - side.sign() * stop_distance;
        debug!(
            "{} open {side:?} {quantity:.4} @ {price:.2}, stop {stop:.2}",
            bar.time()
        );
        self.position = Some(Position::open(side, quantity, price, bar.time(), Some(stop)));
    }

    /// Fixed notional, unwound only by an opposing signal.
    fn step_notional(&mut self, bar: &Bar, signal: Signal) {
        let price = bar.close();
        let quantity = self.config.fixed_notional() / price;

        let side = match (self.direction(), signal) {
            (Direction::Flat, Signal::Long) => Some(PositionSide::Long),
            (Direction::Flat, Signal::Short) if self.config.allow_notional_shorts() => Some(PositionSide::Short),
            (Direction::Long, Signal::Short) | (Direction::Short, Signal::Long) => {
                self.close_position(bar, ExitReason::OpposingSignal);
                None
            }
            _ => None,
        };

        if let Some(side) = side {
            debug!("{} open {side:?} {quantity:.4} @ {price:.2}", bar.time());
            self.position = Some(Position::open(side, quantity, price, bar.time(), None));
        }
    }

    fn close_position(&mut self, bar: &Bar, reason: ExitReason) {
        if let Some(position) = self.position.take() {
            let trade = position.close(bar.close(), bar.time(), reason);
            let equity = self.wallet.realize(trade.pnl());
            debug!(
                "{} close {:?} @ {:.2} ({reason:?}): pnl {:.2}, equity {equity:.2}",
                bar.time(),
                trade.side(),
                trade.exit_price(),
                trade.pnl()
            );
            self.trades.push(trade);
        }
    }
}
