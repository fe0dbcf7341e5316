//! # Coin toss with fixed-fractional risk
//!
//! Random LONG/SHORT entries, 1% of equity risked per trade and a stop that
//! trails three ATRs behind the close. Compared against buy-and-hold.
mod utils;

use std::error::Error;

use coin_toss_bt::prelude::*;

fn main() -> Result<(), Box<dyn Error>> {
    let bars = utils::example_bars();
    let config = BacktestConfig::builder()
        .initial_capital(10_000.0)
        .risk_pct(0.01)
        .atr_multiplier(3.0)
        .atr_window(10)
        .seed(42)
        .build()?;

    let mut bts = Backtest::from_source(&bars, config)?;
    let mut reversals = 0;
    let report = bts.run_with(|bt, bar| {
        let reversed = bt.trades().last().is_some_and(|t| t.reason() == ExitReason::Reversal && t.exit_time() == bar.time());
        if reversed {
            reversals += 1;
        }
    });

    println!("signals {:?}", report.signal_counts);
    println!("trades {} ({reversals} reversals)", report.trades.len());
    println!(
        "performance {:.2} ({:.2}%)",
        report.final_equity,
        report.total_return_pct()
    );
    println!("buy and hold {:.2}%", report.buy_and_hold_pct);

    #[cfg(feature = "metrics")]
    println!("\n{}", Metrics::from(&report));

    Ok(())
}
