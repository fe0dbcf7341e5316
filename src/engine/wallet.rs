#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Realized equity of a backtest.
///
/// Equity only changes when a trade closes; open positions are not marked to market.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Wallet {
    // Initial balance used for reset
    initial_balance: f64,
    // Initial balance plus every realized P&L
    balance: f64,
    // Cumulative realized P&L
    realized_pnl: f64,
}

impl Wallet {
    /// Creates a new wallet with the given initial balance.
    /// Non-positive balances are rejected.
    pub fn new(balance: f64) -> Result<Self> {
        if balance <= 0.0 || !balance.is_finite() {
            return Err(Error::NegZeroBalance(balance));
        }

        Ok(Self {
            balance,
            realized_pnl: 0.0,
            initial_balance: balance,
        })
    }

    /// Returns the initial balance.
    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    /// Returns the current equity.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Returns the cumulative realized P&L.
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Books the P&L of a closed trade.
    pub(crate) fn realize(&mut self, pnl: f64) -> f64 {
        self.balance += pnl;
        self.realized_pnl += pnl;
        self.balance
    }

    /// Resets the wallet to its initial balance.
    pub(crate) fn reset(&mut self) {
        self.realized_pnl = 0.0;
        self.balance = self.initial_balance;
    }
}

#[cfg(test)]
#[test]
fn new_wallet_valid_balance() {
    let wallet = Wallet::new(100.0).unwrap();
    assert_eq!(wallet.balance(), 100.0);
    assert_eq!(wallet.initial_balance(), 100.0);
    assert_eq!(wallet.realized_pnl(), 0.0);
}

#[cfg(test)]
#[test]
fn new_wallet_invalid_balance() {
    let result = Wallet::new(0.0);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));

    let result = Wallet::new(-10.0);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));

    let result = Wallet::new(f64::INFINITY);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));
}

#[cfg(test)]
#[test]
fn realize_profit_and_loss() {
    let mut wallet = Wallet::new(100.0).unwrap();

    assert_eq!(wallet.realize(10.0), 110.0);
    assert_eq!(wallet.realize(-25.0), 85.0);
    assert_eq!(wallet.realized_pnl(), -15.0);
    assert_eq!(wallet.balance(), wallet.initial_balance() + wallet.realized_pnl());
}

#[cfg(test)]
#[test]
fn reset_wallet() {
    let mut wallet = Wallet::new(100.0).unwrap();
    wallet.realize(42.0);

    wallet.reset();
    assert_eq!(wallet.balance(), 100.0);
    assert_eq!(wallet.realized_pnl(), 0.0);
}
