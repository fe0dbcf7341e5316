//! # Equity chart
//!
//! Runs the risk-managed policy and saves its equity curve against
//! buy-and-hold, with the trade P&L histogram underneath.
mod utils;

use std::error::Error;

use coin_toss_bt::prelude::*;

fn main() -> Result<(), Box<dyn Error>> {
    let bars = utils::example_bars();
    let config = BacktestConfig::builder().seed(7).build()?;
    let mut bts = Backtest::from_source(&bars, config)?;
    let report = bts.run();

    println!("{}", Metrics::from(&report));

    let options = DrawOptions::default()
        .title("Coin toss vs buy & hold")
        .draw_output(DrawOutput::Svg("coin_toss.svg".into()));
    Draw::with_report(&report)
        .with_bars(bts.data().bars())
        .with_options(options)
        .plot()?;

    Ok(())
}
