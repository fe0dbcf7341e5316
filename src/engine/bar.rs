use std::sync::Arc;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::data::BarSource;
use crate::errors::{Error, Result};

/// A daily OHLC price bar.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    time: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl From<(DateTime<Utc>, f64, f64, f64, f64)> for Bar {
    fn from((time, open, high, low, close): (DateTime<Utc>, f64, f64, f64, f64)) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }
}

impl Bar {
    /// Returns the bar timestamp.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Returns the open price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Returns the high price.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Returns the low price.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Returns the close price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Returns true when the bar has no range (`high == low`).
    pub fn is_degenerate(&self) -> bool {
        self.high == self.low
    }

    /// Returns true when the bar closed above its open.
    pub fn is_up(&self) -> bool {
        self.close > self.open
    }

    fn prices(&self) -> [f64; 4] {
        [self.open, self.high, self.low, self.close]
    }
}

/// Step-by-step construction of a [`Bar`].
///
/// ```rust
/// use coin_toss_bt::prelude::*;
/// use chrono::DateTime;
///
/// let bar = BarBuilder::builder()
///     .time(DateTime::default())
///     .open(100.0)
///     .high(110.0)
///     .low(95.0)
///     .close(105.0)
///     .build()
///     .unwrap();
/// assert_eq!(bar.close(), 105.0);
/// ```
#[derive(Debug, Default)]
pub struct BarBuilder {
    time: Option<DateTime<Utc>>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
}

impl BarBuilder {
    /// Starts an empty builder.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Sets the timestamp.
    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Sets the open price.
    pub fn open(mut self, open: f64) -> Self {
        self.open = Some(open);
        self
    }

    /// Sets the high price.
    pub fn high(mut self, high: f64) -> Self {
        self.high = Some(high);
        self
    }

    /// Sets the low price.
    pub fn low(mut self, low: f64) -> Self {
        self.low = Some(low);
        self
    }

    /// Sets the close price.
    pub fn close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    /// Builds the bar. Every field is required.
    pub fn build(self) -> Result<Bar> {
        let missing = |field: &str| Error::Msg(format!("Missing bar field: {field}"));
        Ok(Bar {
            time: self.time.ok_or_else(|| missing("time"))?,
            open: self.open.ok_or_else(|| missing("open"))?,
            high: self.high.ok_or_else(|| missing("high"))?,
            low: self.low.ok_or_else(|| missing("low"))?,
            close: self.close.ok_or_else(|| missing("close"))?,
        })
    }
}

/// A validated, time-ordered sequence of bars with degenerate bars removed.
///
/// Validation is fail-fast and happens before any backtest state exists:
/// - every price must be finite and positive,
/// - `high >= low`,
/// - timestamps must be strictly increasing.
///
/// Bars with `high == low` carry no range and are dropped.
#[derive(Debug, Clone)]
pub struct BarSeries {
    bars: Arc<[Bar]>,
    dropped: usize,
}

impl BarSeries {
    /// Validates `bars` and removes degenerate ones.
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        let mut previous: Option<DateTime<Utc>> = None;
        for (index, bar) in bars.iter().enumerate() {
            if let Some(price) = bar.prices().into_iter().find(|p| !p.is_finite() || *p <= 0.0) {
                return Err(Error::InvalidPrice { index, price });
            }
            if bar.high < bar.low {
                return Err(Error::HighBelowLow {
                    index,
                    high: bar.high,
                    low: bar.low,
                });
            }
            if previous.is_some_and(|time| bar.time <= time) {
                return Err(Error::NonMonotonicTimestamp { index });
            }
            previous = Some(bar.time);
        }

        let total = bars.len();
        let bars = bars
            .into_iter()
            .filter(|bar| {
                if bar.is_degenerate() {
                    log::trace!("dropping degenerate bar at {}", bar.time);
                }
                !bar.is_degenerate()
            })
            .collect::<Arc<[Bar]>>();
        if bars.is_empty() {
            return Err(Error::BarDataEmpty);
        }

        Ok(Self {
            dropped: total - bars.len(),
            bars,
        })
    }

    /// Loads and validates the bars of an injected source.
    pub fn from_source<S: BarSource + ?Sized>(source: &S) -> Result<Self> {
        Self::new(source.bars()?)
    }

    /// Returns the number of bars kept.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false: an empty series is rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Returns the number of degenerate bars removed.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Returns the bars as a slice.
    pub fn as_slice(&self) -> &[Bar] {
        &self.bars
    }

    /// Returns an iterator over the bars.
    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    /// Returns a series holding only the first `len` bars.
    pub fn truncated(&self, len: usize) -> Self {
        let len = len.clamp(1, self.bars.len());
        Self {
            bars: Arc::from(&self.bars[..len]),
            dropped: self.dropped,
        }
    }
}

#[cfg(test)]
fn day(n: i64) -> DateTime<Utc> {
    DateTime::<Utc>::default() + chrono::Duration::days(n)
}

#[cfg(test)]
#[test]
fn builder_requires_every_field() {
    let result = BarBuilder::builder().time(day(0)).open(1.0).high(2.0).low(0.5).build();
    assert!(matches!(result, Err(Error::Msg(_))));
}

#[cfg(test)]
#[test]
fn series_drops_degenerate_bars() {
    let bars = vec![
        Bar::from((day(0), 100.0, 101.0, 99.0, 100.5)),
        Bar::from((day(1), 100.0, 100.0, 100.0, 100.0)),
        Bar::from((day(2), 100.5, 102.0, 100.0, 101.0)),
    ];
    let series = BarSeries::new(bars).unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series.dropped(), 1);
    assert_eq!(series.as_slice()[1].time(), day(2));
}

#[cfg(test)]
#[test]
fn series_rejects_empty_input() {
    assert!(matches!(BarSeries::new(vec![]), Err(Error::BarDataEmpty)));

    let only_degenerate = vec![Bar::from((day(0), 5.0, 5.0, 5.0, 5.0))];
    assert!(matches!(BarSeries::new(only_degenerate), Err(Error::BarDataEmpty)));
}

#[cfg(test)]
#[test]
fn series_rejects_high_below_low() {
    let bars = vec![
        Bar::from((day(0), 100.0, 101.0, 99.0, 100.5)),
        Bar::from((day(1), 100.0, 98.0, 99.0, 98.5)),
    ];
    let result = BarSeries::new(bars);
    assert!(matches!(result, Err(Error::HighBelowLow { index: 1, .. })));
}

#[cfg(test)]
#[test]
fn series_rejects_unordered_timestamps() {
    let bars = vec![
        Bar::from((day(1), 100.0, 101.0, 99.0, 100.5)),
        Bar::from((day(1), 100.0, 101.0, 99.0, 100.5)),
    ];
    assert!(matches!(
        BarSeries::new(bars),
        Err(Error::NonMonotonicTimestamp { index: 1 })
    ));

    let bars = vec![
        Bar::from((day(2), 100.0, 101.0, 99.0, 100.5)),
        Bar::from((day(1), 100.0, 101.0, 99.0, 100.5)),
    ];
    assert!(matches!(
        BarSeries::new(bars),
        Err(Error::NonMonotonicTimestamp { index: 1 })
    ));
}

#[cfg(test)]
#[test]
fn series_rejects_invalid_prices() {
    let bars = vec![Bar::from((day(0), 100.0, f64::NAN, 99.0, 100.5))];
    assert!(matches!(BarSeries::new(bars), Err(Error::InvalidPrice { index: 0, .. })));

    let bars = vec![Bar::from((day(0), 100.0, 101.0, -1.0, 100.5))];
    assert!(matches!(BarSeries::new(bars), Err(Error::InvalidPrice { index: 0, .. })));
}

#[cfg(test)]
#[test]
fn truncated_keeps_prefix() {
    let bars = (0..5)
        .map(|i| Bar::from((day(i), 100.0, 101.0, 99.0, 100.0 + i as f64)))
        .collect();
    let series = BarSeries::new(bars).unwrap();
    let head = series.truncated(3);
    assert_eq!(head.len(), 3);
    assert_eq!(head.as_slice(), &series.as_slice()[..3]);
}
