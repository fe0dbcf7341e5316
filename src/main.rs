//! `coin-toss`: backtest random entry signals on a daily CSV export.
//!
//! Loads the bars, draws one coin flip per tradable bar and runs the
//! configured sizing policy (or both with `--compare`, on the same flips),
//! then prints the metrics next to buy-and-hold.

use std::{
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Parser;
use coin_toss_bt::prelude::*;
use log::{info, warn};

#[derive(Parser)]
#[command(
    name = "coin-toss",
    about = "Backtest random LONG/SHORT signals with ATR risk sizing against buy-and-hold"
)]
struct Cli {
    /// Daily bars in `Gmt time,Open,High,Low,Close,Volume` CSV layout.
    #[arg(long, default_value = "data/spy_daily.csv")]
    data: PathBuf,

    /// TOML file with configuration keys; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting equity.
    #[arg(long)]
    initial_capital: Option<f64>,

    /// Fraction of equity risked per trade, in (0, 1].
    #[arg(long)]
    risk_pct: Option<f64>,

    /// Stop distance in ATR multiples.
    #[arg(long)]
    atr_multiplier: Option<f64>,

    /// ATR window length in bars.
    #[arg(long)]
    atr_window: Option<usize>,

    /// Sizing policy: fixed-fractional or fixed-notional.
    #[arg(long)]
    policy: Option<SizingPolicy>,

    /// Currency amount per fixed-notional position.
    #[arg(long)]
    fixed_notional: Option<f64>,

    /// Let fixed-notional runs open shorts.
    #[arg(long, default_value_t = false)]
    allow_notional_shorts: bool,

    /// Seed for a reproducible coin toss.
    #[arg(long)]
    seed: Option<u64>,

    /// Run both sizing policies on the same signals.
    #[arg(long, default_value_t = false)]
    compare: bool,

    /// Print the last N tradable bars with their ATR and signal.
    #[arg(long, default_value_t = 0)]
    last: usize,

    /// Write the configuration and reports as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Save the equity chart (.png or .svg).
    #[arg(long)]
    plot: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> ConfigBuilder {
        let mut builder = ConfigBuilder::default();
        if let Some(value) = self.initial_capital {
            builder = builder.initial_capital(value);
        }
        if let Some(value) = self.risk_pct {
            builder = builder.risk_pct(value);
        }
        if let Some(value) = self.atr_multiplier {
            builder = builder.atr_multiplier(value);
        }
        if let Some(value) = self.atr_window {
            builder = builder.atr_window(value);
        }
        if let Some(value) = self.policy {
            builder = builder.sizing_policy(value);
        }
        if let Some(value) = self.fixed_notional {
            builder = builder.fixed_notional(value);
        }
        if self.allow_notional_shorts {
            builder = builder.allow_notional_shorts(true);
        }
        if let Some(value) = self.seed {
            builder = builder.seed(value);
        }
        builder
    }
}

fn load_config(cli: &Cli) -> Result<BacktestConfig> {
    let file = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            toml::from_str::<ConfigBuilder>(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => ConfigBuilder::default(),
    };

    file.merge(cli.overrides()).build().context("invalid configuration")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let series = BarSeries::from_source(&CsvFile::new(cli.data.clone()))
        .with_context(|| format!("loading bars from {}", cli.data.display()))?;
    if series.dropped() > 0 {
        warn!("dropped {} bars with high == low", series.dropped());
    }
    info!("loaded {} bars from {}", series.len(), cli.data.display());

    let mut coin = CoinToss::from_seed(config.seed());
    let data = Arc::new(
        MarketData::prepare(&series, config.atr_window(), &mut coin).context("preparing market data")?,
    );

    let policies = if cli.compare {
        vec![SizingPolicy::FixedFractionalRisk, SizingPolicy::FixedNotional]
    } else {
        vec![config.sizing_policy()]
    };

    let counts = data.signal_counts();
    println!("Signals: {} long / {} short over {} bars\n", counts.long, counts.short, counts.total());

    let mut reports = Vec::with_capacity(policies.len());
    for policy in policies {
        let mut backtest = Backtest::new(Arc::clone(&data), config.with_policy(policy))?;
        let report = backtest.run();
        println!("{}", Metrics::from(&report));
        if let Some(position) = &report.open_position {
            println!(
                "Open position: {:?} {:.4} @ {:.2} since {}",
                position.side(),
                position.size(),
                position.entry_price(),
                position.entry_time().date_naive()
            );
        }
        println!();
        reports.push(report);
    }

    if cli.last > 0 {
        print_last_bars(&data, cli.last);
    }

    if let Some(path) = &cli.json {
        write_json(path, &config, &reports)?;
        info!("report written to {}", path.display());
    }

    if let Some(path) = &cli.plot {
        for report in &reports {
            let path = if reports.len() > 1 {
                suffixed(path, &report.policy.to_string())
            } else {
                path.clone()
            };
            let options = DrawOptions::default()
                .title(format!("Coin toss, {}", report.policy))
                .draw_output(DrawOutput::from_path(&path)?);
            Draw::with_report(report)
                .with_bars(data.bars())
                .with_options(options)
                .plot()
                .with_context(|| format!("drawing {}", path.display()))?;
            info!("chart saved to {}", path.display());
        }
    }

    Ok(())
}

fn print_last_bars(data: &MarketData, n: usize) {
    println!("{:<12} {:>12} {:>10} {:>7}", "Date", "Close", "ATR", "Signal");
    let start = data.len().saturating_sub(n);
    for ((bar, atr), signal) in data.bars().iter().zip(data.atr()).zip(data.signals()).skip(start) {
        println!(
            "{:<12} {:>12.2} {:>10.4} {:>7}",
            bar.time().date_naive().to_string(),
            bar.close(),
            atr,
            signal
        );
    }
}

fn write_json(path: &Path, config: &BacktestConfig, reports: &[BacktestReport]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let body = serde_json::json!({ "config": config, "reports": reports });
    serde_json::to_writer_pretty(BufWriter::new(file), &body).context("writing JSON report")
}

/// `out/equity.png` -> `out/equity-fixed-notional.png`
fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("chart");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{suffix}.{ext}"),
        None => format!("{stem}-{suffix}"),
    };
    path.with_file_name(name)
}
