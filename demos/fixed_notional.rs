//! # Fixed notional baseline
//!
//! Same coin flips as `coin_toss`, but every position is a fixed 100 of
//! currency, held until an opposing signal. Long-only unless shorts are enabled.
mod utils;

use std::{error::Error, sync::Arc};

use coin_toss_bt::prelude::*;

fn main() -> Result<(), Box<dyn Error>> {
    let series = BarSeries::new(utils::example_bars())?;
    let config = BacktestConfig::builder().seed(42).fixed_notional(100.0).build()?;

    // one preprocessing pass, shared by every run
    let mut coin = CoinToss::from_seed(config.seed());
    let data = Arc::new(MarketData::prepare(&series, config.atr_window(), &mut coin)?);

    let policies = [
        config.with_policy(SizingPolicy::FixedFractionalRisk),
        config.with_policy(SizingPolicy::FixedNotional),
        BacktestConfig::builder()
            .seed(42)
            .sizing_policy(SizingPolicy::FixedNotional)
            .allow_notional_shorts(true)
            .build()?,
    ];

    for config in policies {
        let shorts = config.allow_notional_shorts();
        let mut bts = Backtest::new(Arc::clone(&data), config)?;
        let report = bts.run();
        println!(
            "{:<18} shorts={shorts:<5} trades={:<5} equity={:>10.2} return={:>7.2}% alpha={:>+7.2}%",
            report.policy.to_string(),
            report.trades.len(),
            report.final_equity,
            report.total_return_pct(),
            report.alpha_pct()
        );
    }

    println!("buy and hold {:.2}%", data.buy_and_hold_return_pct()?);
    Ok(())
}
