use std::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// How positions are sized and exited.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizingPolicy {
    /// `fixed_notional / price` shares, opened when flat and unwound only by an opposing signal.
    FixedNotional,
    /// `risk_pct × equity / (atr_multiplier × ATR)` shares with an ATR trailing stop.
    #[default]
    FixedFractionalRisk,
}

impl fmt::Display for SizingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedNotional => write!(f, "fixed-notional"),
            Self::FixedFractionalRisk => write!(f, "fixed-fractional"),
        }
    }
}

impl FromStr for SizingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "fixed-notional" | "notional" => Ok(Self::FixedNotional),
            "fixed-fractional" | "fixed-fractional-risk" | "risk" => Ok(Self::FixedFractionalRisk),
            other => Err(Error::Msg(format!("Unknown sizing policy: {other}"))),
        }
    }
}

/// Validated parameters of one backtest run.
///
/// Only obtainable through [`ConfigBuilder::build`] or [`Default`], so every
/// instance satisfies the range checks.
#[cfg_attr(feature = "serde", derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    initial_capital: f64,
    risk_pct: f64,
    atr_multiplier: f64,
    atr_window: usize,
    sizing_policy: SizingPolicy,
    fixed_notional: f64,
    allow_notional_shorts: bool,
    seed: Option<u64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            risk_pct: 0.01,
            atr_multiplier: 3.0,
            atr_window: 10,
            sizing_policy: SizingPolicy::FixedFractionalRisk,
            fixed_notional: 100.0,
            allow_notional_shorts: false,
            seed: None,
        }
    }
}

impl BacktestConfig {
    /// Starts a builder seeded with the default values.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Returns the starting equity.
    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Returns the fraction of equity risked per trade.
    pub fn risk_pct(&self) -> f64 {
        self.risk_pct
    }

    /// Returns the ATR multiple used as stop distance.
    pub fn atr_multiplier(&self) -> f64 {
        self.atr_multiplier
    }

    /// Returns the ATR window length.
    pub fn atr_window(&self) -> usize {
        self.atr_window
    }

    /// Returns the sizing policy.
    pub fn sizing_policy(&self) -> SizingPolicy {
        self.sizing_policy
    }

    /// Returns the fixed notional amount per trade.
    pub fn fixed_notional(&self) -> f64 {
        self.fixed_notional
    }

    /// Returns whether fixed-notional runs open shorts when flat.
    pub fn allow_notional_shorts(&self) -> bool {
        self.allow_notional_shorts
    }

    /// Returns the random seed for signal replay.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Returns a copy running under another sizing policy.
    pub fn with_policy(&self, sizing_policy: SizingPolicy) -> Self {
        Self {
            sizing_policy,
            ..self.clone()
        }
    }
}

/// Builder for [`BacktestConfig`]. Unset fields keep their defaults.
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigBuilder {
    initial_capital: Option<f64>,
    risk_pct: Option<f64>,
    atr_multiplier: Option<f64>,
    atr_window: Option<usize>,
    sizing_policy: Option<SizingPolicy>,
    fixed_notional: Option<f64>,
    allow_notional_shorts: Option<bool>,
    seed: Option<u64>,
}

impl ConfigBuilder {
    /// Sets the starting equity.
    pub fn initial_capital(mut self, value: f64) -> Self {
        self.initial_capital = Some(value);
        self
    }

    /// Sets the fraction of equity risked per trade, in (0, 1].
    pub fn risk_pct(mut self, value: f64) -> Self {
        self.risk_pct = Some(value);
        self
    }

    /// Sets the ATR multiple used as stop distance.
    pub fn atr_multiplier(mut self, value: f64) -> Self {
        self.atr_multiplier = Some(value);
        self
    }

    /// Sets the ATR window length.
    pub fn atr_window(mut self, value: usize) -> Self {
        self.atr_window = Some(value);
        self
    }

    /// Sets the sizing policy.
    pub fn sizing_policy(mut self, value: SizingPolicy) -> Self {
        self.sizing_policy = Some(value);
        self
    }

    /// Sets the notional amount used by [`SizingPolicy::FixedNotional`].
    pub fn fixed_notional(mut self, value: f64) -> Self {
        self.fixed_notional = Some(value);
        self
    }

    /// Lets fixed-notional runs open shorts when flat.
    pub fn allow_notional_shorts(mut self, value: bool) -> Self {
        self.allow_notional_shorts = Some(value);
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, value: u64) -> Self {
        self.seed = Some(value);
        self
    }

    /// Overlays every field set in `other` onto `self`.
    pub fn merge(self, other: ConfigBuilder) -> Self {
        Self {
            initial_capital: other.initial_capital.or(self.initial_capital),
            risk_pct: other.risk_pct.or(self.risk_pct),
            atr_multiplier: other.atr_multiplier.or(self.atr_multiplier),
            atr_window: other.atr_window.or(self.atr_window),
            sizing_policy: other.sizing_policy.or(self.sizing_policy),
            fixed_notional: other.fixed_notional.or(self.fixed_notional),
            allow_notional_shorts: other.allow_notional_shorts.or(self.allow_notional_shorts),
            seed: other.seed.or(self.seed),
        }
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<BacktestConfig> {
        let defaults = BacktestConfig::default();
        let config = BacktestConfig {
            initial_capital: self.initial_capital.unwrap_or(defaults.initial_capital),
            risk_pct: self.risk_pct.unwrap_or(defaults.risk_pct),
            atr_multiplier: self.atr_multiplier.unwrap_or(defaults.atr_multiplier),
            atr_window: self.atr_window.unwrap_or(defaults.atr_window),
            sizing_policy: self.sizing_policy.unwrap_or(defaults.sizing_policy),
            fixed_notional: self.fixed_notional.unwrap_or(defaults.fixed_notional),
            allow_notional_shorts: self.allow_notional_shorts.unwrap_or(defaults.allow_notional_shorts),
            seed: self.seed.or(defaults.seed),
        };

        if !(config.initial_capital.is_finite() && config.initial_capital > 0.0) {
            return Err(Error::NegZeroBalance(config.initial_capital));
        }
        if !(config.risk_pct > 0.0 && config.risk_pct <= 1.0) {
            return Err(Error::RiskPct(config.risk_pct));
        }
        if !(config.atr_multiplier.is_finite() && config.atr_multiplier > 0.0) {
            return Err(Error::NegZeroAtrMultiplier(config.atr_multiplier));
        }
        if config.atr_window < 1 {
            return Err(Error::ZeroAtrWindow);
        }
        if !(config.fixed_notional.is_finite() && config.fixed_notional > 0.0) {
            return Err(Error::NegZeroNotional(config.fixed_notional));
        }

        Ok(config)
    }
}

#[cfg(test)]
#[test]
fn defaults_are_valid() {
    let config = BacktestConfig::builder().build().unwrap();
    assert_eq!(config, BacktestConfig::default());
    assert_eq!(config.initial_capital(), 10_000.0);
    assert_eq!(config.risk_pct(), 0.01);
    assert_eq!(config.atr_multiplier(), 3.0);
    assert_eq!(config.atr_window(), 10);
    assert_eq!(config.sizing_policy(), SizingPolicy::FixedFractionalRisk);
    assert!(config.seed().is_none());
}

#[cfg(test)]
#[test]
fn rejects_out_of_range_values() {
    let build = |builder: ConfigBuilder| builder.build().unwrap_err();

    assert!(matches!(build(BacktestConfig::builder().risk_pct(0.0)), Error::RiskPct(_)));
    assert!(matches!(build(BacktestConfig::builder().risk_pct(1.5)), Error::RiskPct(_)));
    assert!(matches!(build(BacktestConfig::builder().risk_pct(f64::NAN)), Error::RiskPct(_)));
    assert!(matches!(
        build(BacktestConfig::builder().atr_multiplier(0.0)),
        Error::NegZeroAtrMultiplier(_)
    ));
    assert!(matches!(build(BacktestConfig::builder().atr_window(0)), Error::ZeroAtrWindow));
    assert!(matches!(
        build(BacktestConfig::builder().initial_capital(-1.0)),
        Error::NegZeroBalance(_)
    ));
    assert!(matches!(
        build(BacktestConfig::builder().fixed_notional(0.0)),
        Error::NegZeroNotional(_)
    ));
}

#[cfg(test)]
#[test]
fn accepts_full_risk() {
    let config = BacktestConfig::builder().risk_pct(1.0).build().unwrap();
    assert_eq!(config.risk_pct(), 1.0);
}

#[cfg(test)]
#[test]
fn merge_prefers_later_values() {
    let file = BacktestConfig::builder().risk_pct(0.02).atr_window(14);
    let flags = ConfigBuilder::default().atr_window(20).seed(7);
    let config = file.merge(flags).build().unwrap();
    assert_eq!(config.risk_pct(), 0.02);
    assert_eq!(config.atr_window(), 20);
    assert_eq!(config.seed(), Some(7));
}

#[cfg(test)]
#[test]
fn policy_from_str() {
    assert_eq!("fixed-notional".parse::<SizingPolicy>().unwrap(), SizingPolicy::FixedNotional);
    assert_eq!(
        "FIXED_FRACTIONAL_RISK".parse::<SizingPolicy>().unwrap(),
        SizingPolicy::FixedFractionalRisk
    );
    assert!("martingale".parse::<SizingPolicy>().is_err());
    assert_eq!(SizingPolicy::FixedNotional.to_string(), "fixed-notional");
}
