//! Volatility estimation: True Range and its simple moving average (ATR).
//!
//! The first bar has no previous close, so its True Range is undefined and the
//! ATR needs `window + 1` bars before it becomes defined. The first `window`
//! readings are therefore `None`.

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::Bar;
use crate::errors::{Error, Result};

/// ATR of one bar, `None` during warm-up.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityReading {
    /// Timestamp of the bar.
    pub time: DateTime<Utc>,
    /// Average True Range, if enough history exists.
    pub atr: Option<f64>,
}

/// True Range of every bar: `max(high - low, |high - prev_close|, |low - prev_close|)`.
///
/// Undefined (`None`) for the first bar.
pub fn true_range(bars: &[Bar]) -> Vec<Option<f64>> {
    let mut prev_close: Option<f64> = None;
    bars.iter()
        .map(|bar| {
            let range = prev_close.map(|prev| {
                (bar.high() - bar.low())
                    .max((bar.high() - prev).abs())
                    .max((bar.low() - prev).abs())
            });
            prev_close = Some(bar.close());
            range
        })
        .collect()
}

/// Simple moving average of the True Range over the trailing `window` bars.
pub fn average_true_range(bars: &[Bar], window: usize) -> Result<Vec<VolatilityReading>> {
    if window == 0 {
        return Err(Error::ZeroAtrWindow);
    }

    let ranges = true_range(bars);
    let mut readings = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        // ranges[0] is undefined, so the window [i + 1 - window, i] must start at 1
        let atr = (i >= window).then(|| {
            let sum = ranges[i + 1 - window..=i].iter().flatten().sum::<f64>();
            sum / window as f64
        });
        readings.push(VolatilityReading { time: bar.time(), atr });
    }

    Ok(readings)
}

#[cfg(test)]
fn bars(rows: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Bar::from((DateTime::<Utc>::default() + chrono::Duration::days(i as i64), o, h, l, c)))
        .collect()
}

#[cfg(test)]
#[test]
fn true_range_uses_previous_close() {
    let data = bars(&[
        (10.0, 11.0, 9.0, 10.0),
        // gap up: |high - prev_close| dominates
        (14.0, 15.0, 13.5, 14.5),
        // gap down: |low - prev_close| dominates
        (10.0, 10.5, 9.0, 9.5),
        // inside bar: high - low dominates
        (9.5, 10.0, 9.0, 9.8),
    ]);
    let tr = true_range(&data);
    assert_eq!(tr, vec![None, Some(5.0), Some(5.5), Some(1.0)]);
}

#[cfg(test)]
#[test]
fn atr_is_undefined_for_first_window_bars() {
    let data = bars(&[
        (10.0, 11.0, 9.0, 10.0),
        (10.0, 11.0, 9.0, 10.0),
        (10.0, 12.0, 9.0, 11.0),
        (11.0, 12.0, 10.0, 11.0),
        (11.0, 13.0, 10.0, 12.0),
    ]);
    let readings = average_true_range(&data, 2).unwrap();
    let atr = readings.iter().map(|r| r.atr).collect::<Vec<_>>();
    // tr = [-, 2, 3, 2, 3]
    assert_eq!(atr, vec![None, None, Some(2.5), Some(2.5), Some(2.5)]);
    assert_eq!(readings[3].time, data[3].time());
}

#[cfg(test)]
#[test]
fn atr_window_of_one_is_true_range() {
    let data = bars(&[(10.0, 11.0, 9.0, 10.0), (14.0, 15.0, 13.5, 14.5)]);
    let readings = average_true_range(&data, 1).unwrap();
    assert_eq!(readings[0].atr, None);
    assert_eq!(readings[1].atr, Some(5.0));
}

#[cfg(test)]
#[test]
fn atr_rejects_zero_window() {
    let data = bars(&[(10.0, 11.0, 9.0, 10.0)]);
    assert!(matches!(average_true_range(&data, 0), Err(Error::ZeroAtrWindow)));
}

#[cfg(test)]
#[test]
fn atr_matches_ta_crate() {
    use ta::indicators::{SimpleMovingAverage, TrueRange};
    use ta::{DataItem, Next};

    let window = 10;
    let data = (0..60)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.7).sin() * 4.0 + i as f64 * 0.2;
            let open = close - (i as f64 * 1.3).cos();
            let high = open.max(close) + 0.5 + (i as f64 * 0.4).sin().abs();
            let low = open.min(close) - 0.5 - (i as f64 * 0.9).cos().abs();
            (open, high, low, close)
        })
        .collect::<Vec<_>>();
    let data = bars(&data);

    let mut tr = TrueRange::new();
    let mut sma = SimpleMovingAverage::new(window).unwrap();
    let readings = average_true_range(&data, window).unwrap();

    for (i, bar) in data.iter().enumerate() {
        let item = DataItem::builder()
            .open(bar.open())
            .high(bar.high())
            .low(bar.low())
            .close(bar.close())
            .volume(1.0)
            .build()
            .unwrap();
        let range = tr.next(&item);
        if i == 0 {
            continue;
        }
        let expected = sma.next(range);
        if i >= window {
            let atr = readings[i].atr.unwrap();
            assert!((atr - expected).abs() < 1e-9, "bar {i}: {atr} != {expected}");
        } else {
            assert!(readings[i].atr.is_none());
        }
    }
}
