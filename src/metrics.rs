//! Performance metrics for backtesting.
//!
//! This module provides tools to calculate:
//! - Win rate, average win and average loss
//! - Profit factor
//! - Max drawdown
//! - Total return and alpha against buy-and-hold
//!
//! It needs to enable `metrics` feature to use it.

use std::fmt;

use crate::engine::{BacktestReport, EquityPoint, SizingPolicy};

/// A collection of trading metrics calculated from a backtest report.
///
/// `Metrics` is used to compute and display key performance indicators (KPIs)
/// of a run, such as max drawdown, profit factor and win rate, next to the
/// buy-and-hold return over the same bars.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Metrics {
    policy: SizingPolicy,
    initial_balance: f64,
    balance: f64,
    pnls: Vec<f64>,
    equity: Vec<f64>,
    buy_and_hold_pct: f64,
}

impl From<&BacktestReport> for Metrics {
    fn from(value: &BacktestReport) -> Self {
        Self {
            policy: value.policy,
            initial_balance: value.initial_capital,
            balance: value.final_equity,
            pnls: value.pnls().collect(),
            equity: value.equity_curve.iter().map(|p: &EquityPoint| p.equity).collect(),
            buy_and_hold_pct: value.buy_and_hold_pct,
        }
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance from trade P&Ls and an equity history.
    pub fn new(initial_balance: f64, pnls: Vec<f64>, equity: Vec<f64>, buy_and_hold_pct: f64) -> Self {
        Self {
            policy: SizingPolicy::default(),
            balance: equity.last().copied().unwrap_or(initial_balance),
            initial_balance,
            pnls,
            equity,
            buy_and_hold_pct,
        }
    }

    /// Returns the sizing policy of the run.
    pub fn policy(&self) -> SizingPolicy {
        self.policy
    }

    /// Returns the initial balance.
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Returns the final balance.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Returns the number of closed trades.
    pub fn trades(&self) -> usize {
        self.pnls.len()
    }

    /// Computes the total return as a percentage.
    pub fn total_return(&self) -> f64 {
        (self.balance / self.initial_balance - 1.0) * 100.0
    }

    /// Returns the buy-and-hold return as a percentage.
    pub fn buy_and_hold(&self) -> f64 {
        self.buy_and_hold_pct
    }

    /// Total return minus buy-and-hold return, in percentage points.
    pub fn alpha(&self) -> f64 {
        self.total_return() - self.buy_and_hold_pct
    }

    /// Computes the maximum drawdown as a percentage.
    pub fn max_drawdown(&self) -> f64 {
        let mut max_peak = self.initial_balance;
        let mut max_drawdown = 0.0;

        for &balance in &self.equity {
            if balance > max_peak {
                max_peak = balance;
            }
            let drawdown = (max_peak - balance) / max_peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown * 100.0
    }

    /// Computes the profit factor.
    pub fn profit_factor(&self) -> f64 {
        let mut total_gains = 0.0;
        let mut total_losses = 0.0;

        for &pnl in &self.pnls {
            if pnl > 0.0 {
                total_gains += pnl;
            } else {
                total_losses += pnl.abs();
            }
        }

        if total_losses == 0.0 {
            return f64::INFINITY;
        }

        total_gains / total_losses
    }

    /// Computes the win rate as a percentage of winning trades.
    pub fn win_rate(&self) -> f64 {
        if self.pnls.is_empty() {
            return 0.0;
        }

        let winning_trades = self.pnls.iter().filter(|pnl| **pnl > 0.0).count();
        (winning_trades as f64 / self.pnls.len() as f64) * 100.0
    }

    /// Mean P&L of the winning trades, zero without one.
    pub fn average_win(&self) -> f64 {
        mean(self.pnls.iter().filter(|pnl| **pnl > 0.0))
    }

    /// Mean P&L of the losing trades (negative), zero without one.
    pub fn average_loss(&self) -> f64 {
        mean(self.pnls.iter().filter(|pnl| **pnl < 0.0))
    }
}

fn mean<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Backtest Metrics ({}) ===", self.policy)?;
        writeln!(f, "Initial Balance: {:.2}", self.initial_balance)?;
        writeln!(f, "Final Balance: {:.2}", self.balance)?;
        writeln!(f, "Total Return: {:.2}%", self.total_return())?;
        writeln!(f, "Buy & Hold: {:.2}%", self.buy_and_hold_pct)?;
        writeln!(f, "Alpha: {:+.2}%", self.alpha())?;
        #[allow(clippy::writeln_empty_string)]
        writeln!(f, "")?;
        writeln!(f, "Trades: {}", self.trades())?;
        writeln!(f, "Win Rate: {:.2}%", self.win_rate())?;
        writeln!(f, "Average Win: {:.2}", self.average_win())?;
        writeln!(f, "Average Loss: {:.2}", self.average_loss())?;
        writeln!(f, "Profit Factor: {:.2}", self.profit_factor())?;
        write!(f, "Max Drawdown: {:.2}%", self.max_drawdown())
    }
}

#[cfg(test)]
#[test]
fn max_drawdown() {
    let metrics = Metrics::new(10000.0, vec![], vec![10000.0, 12000.0, 9000.0, 11000.0], 0.0);
    assert_eq!(metrics.max_drawdown(), 25.0); // (12000 - 9000) / 12000 = 25%
}

#[cfg(test)]
#[test]
fn max_drawdown_no_history() {
    let metrics = Metrics::new(10000.0, vec![], vec![], 0.0);
    assert_eq!(metrics.max_drawdown(), 0.0);
    assert_eq!(metrics.balance(), 10000.0);
}

#[cfg(test)]
#[test]
fn profit_factor() {
    let metrics = Metrics::new(10000.0, vec![20.0, -10.0], vec![], 0.0);
    assert_eq!(metrics.profit_factor(), 2.0); // 20 / 10 = 2.0
}

#[cfg(test)]
#[test]
fn profit_factor_no_losses() {
    let metrics = Metrics::new(10000.0, vec![20.0], vec![], 0.0);
    assert_eq!(metrics.profit_factor(), f64::INFINITY);
}

#[cfg(test)]
#[test]
fn win_rate() {
    let metrics = Metrics::new(10000.0, vec![20.0, -10.0], vec![], 0.0);
    assert_eq!(metrics.win_rate(), 50.0); // 1 win out of 2 trades
}

#[cfg(test)]
#[test]
fn win_rate_no_trades() {
    let metrics = Metrics::new(10000.0, vec![], vec![], 0.0);
    assert_eq!(metrics.win_rate(), 0.0);
}

#[cfg(test)]
#[test]
fn average_win_and_loss() {
    let metrics = Metrics::new(10000.0, vec![30.0, -10.0, 10.0, -20.0], vec![], 0.0);
    assert_eq!(metrics.average_win(), 20.0);
    assert_eq!(metrics.average_loss(), -15.0);

    let metrics = Metrics::new(10000.0, vec![5.0], vec![], 0.0);
    assert_eq!(metrics.average_loss(), 0.0);
}

#[cfg(test)]
#[test]
fn return_and_alpha() {
    let metrics = Metrics::new(10000.0, vec![500.0], vec![10000.0, 10500.0], 2.0);
    assert!((metrics.total_return() - 5.0).abs() < 1e-9);
    assert!((metrics.alpha() - 3.0).abs() < 1e-9);
}

#[cfg(test)]
#[test]
fn from_report() {
    use crate::signals::SignalCounts;
    use chrono::{DateTime, Utc};

    let report = BacktestReport {
        policy: SizingPolicy::FixedNotional,
        initial_capital: 1000.0,
        final_equity: 900.0,
        trades: vec![],
        equity_curve: vec![
            EquityPoint { time: DateTime::<Utc>::default(), equity: 1000.0 },
            EquityPoint { time: DateTime::<Utc>::default(), equity: 900.0 },
        ],
        signal_counts: SignalCounts::default(),
        buy_and_hold_pct: 10.0,
        open_position: None,
    };
    let metrics = Metrics::from(&report);
    assert_eq!(metrics.policy(), SizingPolicy::FixedNotional);
    assert!((metrics.max_drawdown() - 10.0).abs() < 1e-9);
    assert!((metrics.alpha() + 20.0).abs() < 1e-9);
    assert!(metrics.to_string().contains("fixed-notional"));
}
