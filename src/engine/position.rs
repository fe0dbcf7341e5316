use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Side of an open position.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSide {
    /// Profits when price rises.
    Long,
    /// Profits when price falls.
    Short,
}

impl PositionSide {
    /// `1.0` for long, `-1.0` for short.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

/// Engine exposure at a bar boundary.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// No open position.
    Flat,
    /// A long position is open.
    Long,
    /// A short position is open.
    Short,
}

impl From<PositionSide> for Direction {
    fn from(side: PositionSide) -> Self {
        match side {
            PositionSide::Long => Self::Long,
            PositionSide::Short => Self::Short,
        }
    }
}

/// The single open position of a backtest.
///
/// `size` is a signed share count: positive for long, negative for short.
/// The trailing stop, when present, only ever moves in the position's favor.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    side: PositionSide,
    size: f64,
    entry_price: f64,
    entry_time: DateTime<Utc>,
    trail_stop: Option<f64>,
}

impl Position {
    /// Opens a position of `quantity` shares (unsigned) at `entry_price`.
    pub(crate) fn open(
        side: PositionSide,
        quantity: f64,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        trail_stop: Option<f64>,
    ) -> Self {
        Self {
            side,
            size: side.sign() * quantity.abs(),
            entry_price,
            entry_time,
            trail_stop,
        }
    }

    /// Returns the side.
    pub fn side(&self) -> PositionSide {
        self.side
    }

    /// Returns the signed share count.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Returns the entry price.
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Returns the entry timestamp.
    pub fn entry_time(&self) -> DateTime<Utc> {
        self.entry_time
    }

    /// Returns the trailing stop, if the position is stop-managed.
    pub fn trail_stop(&self) -> Option<f64> {
        self.trail_stop
    }

    /// Profit or loss if the position were closed at `price`.
    pub fn pnl_at(&self, price: f64) -> f64 {
        self.size * (price - self.entry_price)
    }

    /// Moves the trailing stop to `candidate` when it tightens the stop.
    ///
    /// Long stops only rise, short stops only fall.
    pub fn ratchet_stop(&mut self, candidate: f64) {
        if let Some(stop) = &mut self.trail_stop {
            match self.side {
                PositionSide::Long => {
                    if candidate > *stop {
                        *stop = candidate;
                    }
                }
                PositionSide::Short => {
                    if candidate < *stop {
                        *stop = candidate;
                    }
                }
            }
        }
    }

    /// Returns true when `price` has crossed the trailing stop.
    pub fn is_stopped_out(&self, price: f64) -> bool {
        match (self.side, self.trail_stop) {
            (PositionSide::Long, Some(stop)) => price <= stop,
            (PositionSide::Short, Some(stop)) => price >= stop,
            (_, None) => false,
        }
    }

    /// Closes the position into a [`Trade`].
    pub(crate) fn close(self, exit_price: f64, exit_time: DateTime<Utc>, reason: ExitReason) -> Trade {
        Trade {
            pnl: self.pnl_at(exit_price),
            side: self.side,
            size: self.size,
            entry_price: self.entry_price,
            entry_time: self.entry_time,
            exit_price,
            exit_time,
            reason,
        }
    }
}

/// Why a position was closed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The close crossed the trailing stop.
    TrailingStop,
    /// An opposite entry flipped the position.
    Reversal,
    /// An opposing signal unwound a fixed-notional position.
    OpposingSignal,
}

/// A closed position. Immutable once recorded.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    side: PositionSide,
    size: f64,
    entry_price: f64,
    entry_time: DateTime<Utc>,
    exit_price: f64,
    exit_time: DateTime<Utc>,
    pnl: f64,
    reason: ExitReason,
}

impl Trade {
    /// Returns the side of the closed position.
    pub fn side(&self) -> PositionSide {
        self.side
    }

    /// Returns the signed share count.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Returns the entry price.
    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    /// Returns the entry timestamp.
    pub fn entry_time(&self) -> DateTime<Utc> {
        self.entry_time
    }

    /// Returns the exit price.
    pub fn exit_price(&self) -> f64 {
        self.exit_price
    }

    /// Returns the exit timestamp.
    pub fn exit_time(&self) -> DateTime<Utc> {
        self.exit_time
    }

    /// Returns the realized profit and loss.
    pub fn pnl(&self) -> f64 {
        self.pnl
    }

    /// Returns why the position was closed.
    pub fn reason(&self) -> ExitReason {
        self.reason
    }
}

#[cfg(test)]
fn long_with_stop(stop: f64) -> Position {
    Position::open(PositionSide::Long, 10.0, 100.0, DateTime::default(), Some(stop))
}

#[cfg(test)]
fn short_with_stop(stop: f64) -> Position {
    Position::open(PositionSide::Short, 10.0, 100.0, DateTime::default(), Some(stop))
}

#[cfg(test)]
#[test]
fn size_sign_follows_side() {
    let long = Position::open(PositionSide::Long, -3.0, 50.0, DateTime::default(), None);
    assert_eq!(long.size(), 3.0);
    let short = Position::open(PositionSide::Short, 3.0, 50.0, DateTime::default(), None);
    assert_eq!(short.size(), -3.0);
}

#[cfg(test)]
#[test]
fn ratchet_long_only_rises() {
    let mut position = long_with_stop(94.0);

    position.ratchet_stop(90.0);
    assert_eq!(position.trail_stop(), Some(94.0));

    position.ratchet_stop(99.0);
    assert_eq!(position.trail_stop(), Some(99.0));
}

#[cfg(test)]
#[test]
fn ratchet_short_only_falls() {
    let mut position = short_with_stop(106.0);

    position.ratchet_stop(110.0);
    assert_eq!(position.trail_stop(), Some(106.0));

    position.ratchet_stop(101.0);
    assert_eq!(position.trail_stop(), Some(101.0));
}

#[cfg(test)]
#[test]
fn ratchet_without_stop() {
    let mut position = Position::open(PositionSide::Long, 1.0, 100.0, DateTime::default(), None);
    position.ratchet_stop(150.0);
    assert!(position.trail_stop().is_none());
    assert!(!position.is_stopped_out(0.1));
}

#[cfg(test)]
#[test]
fn stop_out_is_inclusive() {
    let long = long_with_stop(99.0);
    assert!(long.is_stopped_out(99.0));
    assert!(long.is_stopped_out(95.0));
    assert!(!long.is_stopped_out(99.5));

    let short = short_with_stop(101.0);
    assert!(short.is_stopped_out(101.0));
    assert!(!short.is_stopped_out(100.5));
}

#[cfg(test)]
#[test]
fn closing_realizes_signed_pnl() {
    let long = long_with_stop(94.0).close(95.0, DateTime::default(), ExitReason::TrailingStop);
    assert_eq!(long.pnl(), -50.0);

    let short = short_with_stop(106.0).close(95.0, DateTime::default(), ExitReason::Reversal);
    assert_eq!(short.pnl(), 50.0);
    assert_eq!(short.reason(), ExitReason::Reversal);
}
