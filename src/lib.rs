//! # Coin-toss backtester
//!
//! A single-asset backtesting library that answers one question: does
//! **position sizing and risk management** alone produce an edge when the entry
//! signals are pure chance?
//!
//! Every tradable bar gets a random `LONG`/`SHORT` signal. The engine trades
//! those signals under one of two sizing policies and compares the result with
//! buying and holding the asset over the same bars.
//!
//! ## Core Components
//! | Component   | Description                                                                                     |
//! |-------------|-------------------------------------------------------------------------------------------------|
//! | **`Bar`** / **`BarSeries`** | Daily OHLC data, validated and stripped of zero-range bars.                     |
//! | **`average_true_range`** | Simple moving average of the True Range (ATR).                                      |
//! | **`CoinToss`** | Seedable fair coin emitting one signal per bar.                                              |
//! | **`MarketData`** | Tradable bars paired with their ATR and signal, computed once per run.                    |
//! | **`Backtest`** | The per-bar state machine: entry, reversal, trailing-stop ratchet, stop exit.              |
//! | **`BacktestReport`** | Final equity, closed trades, equity curve and buy-and-hold comparison.               |
//! | **`Metrics`** | Win rate, profit factor, max drawdown, alpha vs buy-and-hold.                                 |
//!
//! ## Sizing Policies
//! | Policy                   | Description                                                                                     |
//! |--------------------------|-------------------------------------------------------------------------------------------------|
//! | **Fixed-fractional risk** | Risks a fixed fraction of equity per trade; stop trails `k × ATR` behind the close.          |
//! | **Fixed notional**       | Buys a fixed currency amount; exits only on an opposing signal.                                 |
//!
//! ## Getting Started
//! ```rust
//! use coin_toss_bt::prelude::*;
//! use chrono::{DateTime, Duration, Utc};
//!
//! let bars = (0..100)
//!     .map(|i| {
//!         let close = 100.0 + (i as f64 * 0.3).sin() * 8.0;
//!         let time = DateTime::<Utc>::default() + Duration::days(i);
//!         Bar::from((time, close, close + 1.5, close - 1.5, close))
//!     })
//!     .collect::<Vec<_>>();
//!
//! let config = BacktestConfig::builder()
//!     .initial_capital(10_000.0)
//!     .risk_pct(0.01)
//!     .seed(7)
//!     .build()
//!     .unwrap();
//!
//! let mut backtest = Backtest::from_source(&bars, config).unwrap();
//! let report = backtest.run();
//! println!("return {:.2}% vs buy-and-hold {:.2}%", report.total_return_pct(), report.buy_and_hold_pct);
//!
//! #[cfg(feature = "metrics")]
//! {
//!     let metrics = Metrics::from(&report);
//!     println!("{}", metrics);
//! }
//! ```
//!
//! ## Integrations
//! | Crate          | Purpose                                                                                     |
//! |----------------|---------------------------------------------------------------------------------------------|
//! | [`rand`](https://crates.io/crates/rand) | Seedable coin toss.                                                                    |
//! | [`serde`](https://crates.io/crates/serde) | Serialize/deserialize reports and configuration.                                     |
//! | [`csv`](https://crates.io/crates/csv) | Load daily bars from CSV exports.                                                        |
//! | [`plotters`](https://crates.io/crates/plotters) | Visualize equity curves and trade P&L.                                         |
//!
//! ## Error Handling
//! Every fallible call returns [`errors::Result`]. Input problems (empty data,
//! unordered timestamps, `high < low`) and configuration problems (non-positive
//! capital, risk outside `(0, 1]`) are reported before any backtest state exists.
//!
//! ```rust
//! use coin_toss_bt::prelude::*;
//!
//! let err = BacktestConfig::builder().risk_pct(1.5).build().unwrap_err();
//! assert!(err.is_config());
//! ```
#![warn(missing_docs)]

/// Backtest engine: bars, positions, wallet, configuration and the per-bar state machine.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Volatility indicators.
pub mod indicators;

/// Entry signal generation.
pub mod signals;

/// Buy-and-hold comparator.
pub mod baseline;

/// Bar data sources.
pub mod data;

/// Performance metrics: drawdown, profit factor, win rate, etc.
#[cfg(feature = "metrics")]
pub mod metrics;

/// Draw equity and P&L charts to png or svg.
#[cfg(feature = "draws")]
pub mod draws;

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use super::*;
    pub use crate::baseline::*;
    pub use crate::data::*;
    pub use crate::engine::*;
    pub use crate::errors::*;
    pub use crate::indicators::*;
    pub use crate::signals::*;

    #[cfg(feature = "metrics")]
    pub use crate::metrics::*;

    #[cfg(feature = "draws")]
    pub use crate::draws::*;
}

use std::ops::{Add, Div, Mul, Sub};

/// Trait for performing percentage-based calculations.
///
/// This trait provides methods to add, subtract, and calculate percentages
/// for numeric types, enabling common financial calculations.
pub trait PercentCalculus<Rhs = Self> {
    /// Adds a percentage to the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to add (e.g., 10.0 for 10%).
    fn addpercent(self, rhs: Rhs) -> Self;

    /// Subtracts a percentage from the value.
    ///
    /// ### Arguments
    /// * `rhs` - The percentage to subtract (e.g., 10.0 for 10%).
    fn subpercent(self, rhs: Rhs) -> Self;

    /// Calculates the percentage change between two values.
    ///
    /// ### Arguments
    /// * `new` - The new value to compare with.
    ///
    /// ### Returns
    /// The percentage change from the original value to the new value.
    fn change(self, new: Self) -> Self;
}

impl PercentCalculus for f64 {
    fn addpercent(self, percent: Self) -> Self {
        self.add(self.mul(percent.div(100.0)))
    }

    fn subpercent(self, percent: Self) -> Self {
        self.sub(self.mul(percent.div(100.0)))
    }

    fn change(self, new: Self) -> Self {
        new.sub(self).div(self).mul(100.0)
    }
}

#[cfg(test)]
mod percent {
    use super::*;

    #[test]
    fn add() {
        assert_eq!(110.0, 100.0.addpercent(10.0))
    }

    #[test]
    fn sub() {
        assert_eq!(90.0, 100.0.subpercent(10.0))
    }

    #[test]
    fn change() {
        assert_eq!(10.0, 100.0.change(110.0))
    }
}
