//! Buy-and-hold reference over the same bars the engine trades.

use chrono::{DateTime, Utc};

use crate::engine::Bar;
use crate::errors::{Error, Result};

/// Buy-and-hold return in percent: `(last_close / first_close - 1) × 100`.
pub fn buy_and_hold_return_pct(bars: &[Bar]) -> Result<f64> {
    let first = bars.first().ok_or(Error::BarDataEmpty)?.close();
    let last = bars.last().ok_or(Error::BarDataEmpty)?.close();
    Ok((last / first - 1.0) * 100.0)
}

/// Equity of `capital` invested at the first close and held, one point per bar.
pub fn buy_and_hold_curve(bars: &[Bar], capital: f64) -> Vec<(DateTime<Utc>, f64)> {
    let Some(first) = bars.first().map(|bar| bar.close()) else {
        return Vec::new();
    };
    bars.iter()
        .map(|bar| (bar.time(), capital * (bar.close() / first)))
        .collect()
}

#[cfg(test)]
fn closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::from((DateTime::<Utc>::default() + chrono::Duration::days(i as i64), c, c + 1.0, c - 1.0, c)))
        .collect()
}

#[cfg(test)]
#[test]
fn return_over_first_and_last_close() {
    let bars = closes(&[100.0, 80.0, 150.0]);
    assert_eq!(buy_and_hold_return_pct(&bars).unwrap(), 50.0);
}

#[cfg(test)]
#[test]
fn return_rejects_empty_input() {
    assert!(matches!(buy_and_hold_return_pct(&[]), Err(Error::BarDataEmpty)));
}

#[cfg(test)]
#[test]
fn curve_scales_capital() {
    let bars = closes(&[100.0, 110.0, 90.0]);
    let curve = buy_and_hold_curve(&bars, 10_000.0);
    let values = curve.iter().map(|(_, v)| *v).collect::<Vec<_>>();
    assert_eq!(values, vec![10_000.0, 11_000.0, 9_000.0]);
    assert!(buy_and_hold_curve(&[], 1.0).is_empty());
}
