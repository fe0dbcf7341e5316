/// Result type used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while loading bars, validating a configuration or running a backtest.
///
/// Input and configuration errors are raised before any engine state exists;
/// a run either completes over every bar or fails with one of these.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    // input
    /// The bar source produced no usable bar.
    #[error("Bar data is empty: backtesting requires at least one non-degenerate bar")]
    BarDataEmpty,

    /// Bar timestamps must be strictly increasing.
    #[error("Bar {index} is not strictly after the previous bar")]
    NonMonotonicTimestamp {
        /// Position of the offending bar in the source.
        index: usize,
    },

    /// A bar whose high is below its low.
    #[error("Bar {index} has high {high} below low {low}")]
    HighBelowLow {
        /// Position of the offending bar in the source.
        index: usize,
        /// High price.
        high: f64,
        /// Low price.
        low: f64,
    },

    /// A price that is not finite or not positive.
    #[error("Bar {index} has an invalid price: {price}")]
    InvalidPrice {
        /// Position of the offending bar in the source.
        index: usize,
        /// The rejected price.
        price: f64,
    },

    /// Not a single bar has a defined ATR for the configured window.
    #[error("Insufficient history: {bars} bars cannot warm up an ATR window of {window}")]
    InsufficientHistory {
        /// Number of bars available.
        bars: usize,
        /// ATR window length.
        window: usize,
    },

    /// The number of signals does not match the number of tradable bars.
    #[error("Expected {expected} signals, got {got}")]
    SignalCountMismatch {
        /// Number of tradable bars.
        expected: usize,
        /// Number of supplied signals.
        got: usize,
    },

    /// A timestamp that could not be parsed.
    #[error("Invalid timestamp: {value}")]
    DateParse {
        /// The raw text.
        value: String,
    },

    // configuration
    /// The initial capital is not positive.
    #[error("Initial capital must be positive (got: {0})")]
    NegZeroBalance(f64),

    /// The risk fraction must lie in (0, 1].
    #[error("Risk fraction must be in (0, 1] (got: {0})")]
    RiskPct(f64),

    /// The ATR multiplier is not positive.
    #[error("ATR multiplier must be positive (got: {0})")]
    NegZeroAtrMultiplier(f64),

    /// The ATR window must hold at least one bar.
    #[error("ATR window length must be at least 1")]
    ZeroAtrWindow,

    /// The fixed notional amount is not positive.
    #[error("Fixed notional amount must be positive (got: {0})")]
    NegZeroNotional(f64),

    // plumbing
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV decoding error occurred.
    #[cfg(feature = "csv")]
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Chart rendering failed.
    #[cfg(feature = "draws")]
    #[error("Plotters error: {0}")]
    Plotters(String),

    /// Free-form error.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Returns true for malformed bar input.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Self::BarDataEmpty
                | Self::NonMonotonicTimestamp { .. }
                | Self::HighBelowLow { .. }
                | Self::InvalidPrice { .. }
                | Self::InsufficientHistory { .. }
                | Self::SignalCountMismatch { .. }
                | Self::DateParse { .. }
        )
    }

    /// Returns true for a rejected configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::NegZeroBalance(_)
                | Self::RiskPct(_)
                | Self::NegZeroAtrMultiplier(_)
                | Self::ZeroAtrWindow
                | Self::NegZeroNotional(_)
        )
    }
}

#[cfg(test)]
#[test]
fn taxonomy() {
    assert!(Error::BarDataEmpty.is_input());
    assert!(Error::NonMonotonicTimestamp { index: 3 }.is_input());
    assert!(!Error::BarDataEmpty.is_config());
    assert!(Error::RiskPct(0.0).is_config());
    assert!(Error::ZeroAtrWindow.is_config());
    assert!(!Error::Msg("boom".to_string()).is_input());
    assert!(!Error::Msg("boom".to_string()).is_config());
}
