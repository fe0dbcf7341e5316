use chrono::{DateTime, Duration, Utc};
use coin_toss_bt::engine::Bar;

/// Generates deterministic daily bars.
pub fn generate_sample_bars(max: i64, seed: i32, base_price: f64) -> Vec<Bar> {
    let start = DateTime::<Utc>::default();
    let mut open = base_price;

    (0..=max)
        .map(|i| {
            // Base price with trend (+ 0.05*i)
            let base_price = base_price + 0.05 * (i as f64);

            // Price variation using simple trigonometric function with seed
            let variation = 5.0 * ((i as f64 * 0.3 + seed as f64).sin() * 0.5 + 0.5);
            // Slower swing so both sides get trends to ride
            let swing = 15.0 * (i as f64 * 0.02 + seed as f64).sin();

            let close = base_price + variation + swing;
            let high = (close + 0.3 * variation + 0.5).max(open);
            let low = (close - 0.3 * variation - 0.5).min(open);

            let bar = Bar::from((start + Duration::days(i), open, high, low, close));
            open = close;
            bar
        })
        .collect()
}

pub fn example_bars() -> Vec<Bar> {
    generate_sample_bars(2500, 42, 100.0)
}

#[allow(dead_code)]
fn main() {}
