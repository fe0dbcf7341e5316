//! Module for visualizing backtest results: equity curve and trade P&L.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use plotters::backend::{BitMapBackend, DrawingBackend, SVGBackend};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::WHITE;

use crate::PercentCalculus;
use crate::baseline::buy_and_hold_curve;
use crate::engine::{Bar, BacktestReport};
use crate::errors::{Error, Result};

/// Aspect ratio for the generated charts.
const ASPECT_RATIO: f64 = 0.5625;
/// Size of the X-axis labels.
const X_LABEL_SIZE: i32 = 20;
/// Size of the Y-axis labels.
const Y_LABEL_SIZE: i32 = 20;
/// Number of buckets in the P&L histogram.
const PNL_BINS: usize = 20;
/// Color of the buy-and-hold curve.
const BASELINE_COLOR: RGBColor = RGBColor(128, 128, 128);

/// Output formats for the generated charts with output filename.
#[derive(Debug, Clone)]
pub enum DrawOutput {
    /// Save to the output SVG file.
    Svg(PathBuf),
    /// Save to the output PNG file.
    Png(PathBuf),
}

impl DrawOutput {
    /// Picks the format from the file extension (`.png` or `.svg`).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("svg") => Ok(Self::Svg(path.to_path_buf())),
            Some("png") => Ok(Self::Png(path.to_path_buf())),
            _ => Err(Error::Msg(format!("Unsupported chart format: {}", path.display()))),
        }
    }
}

impl Default for DrawOutput {
    fn default() -> Self {
        Self::Png(PathBuf::from("equity.png"))
    }
}

/// Configuration options for chart generation.
#[derive(Debug, Clone)]
pub struct DrawOptions {
    /// Chart title.
    title: Option<String>,
    /// Output format and path.
    output: DrawOutput,
    /// Whether to show the buy-and-hold curve.
    show_buy_and_hold: bool,
    /// Whether to show the P&L histogram.
    show_pnl: bool,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            title: None,
            output: DrawOutput::default(),
            show_buy_and_hold: true,
            show_pnl: true,
        }
    }
}

impl DrawOptions {
    /// Sets the chart title.
    pub fn title(mut self, title: impl ToString) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Sets the output format and path.
    pub fn draw_output(mut self, output: DrawOutput) -> Self {
        self.output = output;
        self
    }

    /// Enables or disables the buy-and-hold curve.
    pub fn show_buy_and_hold(mut self, show: bool) -> Self {
        self.show_buy_and_hold = show;
        self
    }

    /// Enables or disables the P&L histogram.
    pub fn show_pnl(mut self, show: bool) -> Self {
        self.show_pnl = show;
        self
    }
}

/// Chart drawing utility for backtest visualization.
pub struct Draw<'d> {
    report: &'d BacktestReport,
    /// Bars the report was computed on, for the buy-and-hold curve.
    bars: &'d [Bar],
    options: DrawOptions,
}

impl<'d> Draw<'d> {
    /// Creates a new `Draw` instance for the given report.
    pub fn with_report(report: &'d BacktestReport) -> Self {
        Self {
            report,
            bars: &[],
            options: DrawOptions::default(),
        }
    }

    /// Sets the bars used to draw the buy-and-hold curve.
    pub fn with_bars(mut self, bars: &'d [Bar]) -> Self {
        self.bars = bars;
        self
    }

    /// Sets the drawing options.
    pub fn with_options(mut self, options: DrawOptions) -> Self {
        self.options = options;
        self
    }

    /// Generates and saves the chart based on the configured options.
    pub fn plot(&self) -> Result<()> {
        if self.report.equity_curve.is_empty() {
            return Err(Error::BarDataEmpty);
        }

        let title = self.options.title.as_deref().unwrap_or("Coin-toss backtest");
        let height_factor = if self.options.show_pnl { 1.4 } else { 1.0 };
        let width = 1280.max(4 * self.report.equity_curve.len() as u32);
        let height = ((width as f64 * ASPECT_RATIO * height_factor) as u32).min(1200);

        match &self.options.output {
            DrawOutput::Svg(path) => {
                let root = SVGBackend::new(path, (width, height)).into_drawing_area();
                root.fill(&WHITE).map_err(|e| Error::Plotters(e.to_string()))?;
                self.draw_chart(&root, title)
            }
            DrawOutput::Png(path) => {
                let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
                root.fill(&WHITE).map_err(|e| Error::Plotters(e.to_string()))?;
                self.draw_chart(&root, title)
            }
        }
    }

    /// Draws the equity chart and, below it, the P&L histogram.
    fn draw_chart<DB: DrawingBackend>(&self, drawing_area: &DrawingArea<DB, Shift>, title: &str) -> Result<()> {
        let total_height = drawing_area.dim_in_pixel().1 as f64;
        if self.options.show_pnl {
            let (equity_area, pnl_area) = drawing_area.split_vertically((total_height * 0.7) as u32);
            self.draw_equity_chart(&equity_area, title)?;
            self.draw_pnl_chart(&pnl_area)?;
        } else {
            self.draw_equity_chart(drawing_area, title)?;
        }

        drawing_area.present().map_err(|e| Error::Plotters(e.to_string()))
    }

    /// Draws the strategy equity against buy-and-hold.
    fn draw_equity_chart<DB: DrawingBackend>(&self, drawing_area: &DrawingArea<DB, Shift>, title: &str) -> Result<()> {
        let curve = self
            .report
            .equity_curve
            .iter()
            .map(|p| (p.time, p.equity))
            .collect::<Vec<_>>();
        let baseline = if self.options.show_buy_and_hold {
            buy_and_hold_curve(self.bars, self.report.initial_capital)
        } else {
            Vec::new()
        };

        let first_time = curve.first().ok_or(Error::BarDataEmpty)?.0;
        let mut last_time = curve.last().ok_or(Error::BarDataEmpty)?.0;
        if last_time <= first_time {
            last_time = first_time + Duration::days(1);
        }

        let (mut min_equity, mut max_equity) = curve
            .iter()
            .chain(&baseline)
            .map(|(_, equity)| *equity)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if max_equity - min_equity < f64::EPSILON {
            min_equity -= 1.0;
            max_equity += 1.0;
        }

        let drawing_area = drawing_area.margin(10, 10, 70, 70);
        let mut chart = ChartBuilder::on(&drawing_area)
            .caption(title, ("sans-serif", 30).into_font())
            .x_label_area_size(X_LABEL_SIZE * 2)
            .y_label_area_size(Y_LABEL_SIZE * 4)
            .build_cartesian_2d(
                first_time..last_time,
                min_equity.subpercent(1.0)..max_equity.addpercent(1.0),
            )
            .map_err(|e| Error::Plotters(e.to_string()))?;

        chart
            .configure_mesh()
            .y_desc("Equity")
            .x_desc("Time")
            .x_label_style(("sans-serif", X_LABEL_SIZE))
            .y_label_style(("sans-serif", Y_LABEL_SIZE))
            .x_labels(10)
            .y_labels(8)
            .draw()
            .map_err(|e| Error::Plotters(e.to_string()))?;

        chart
            .draw_series(LineSeries::new(curve.iter().copied(), BLUE.stroke_width(2)))
            .map_err(|e| Error::Plotters(e.to_string()))?
            .label(format!("{} ({:+.2}%)", self.report.policy, self.report.total_return_pct()))
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

        if !baseline.is_empty() {
            chart
                .draw_series(LineSeries::new(baseline.iter().copied(), BASELINE_COLOR))
                .map_err(|e| Error::Plotters(e.to_string()))?
                .label(format!("buy & hold ({:+.2}%)", self.report.buy_and_hold_pct))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BASELINE_COLOR));
        }

        chart
            .draw_series(self.report.trades.iter().filter_map(|trade| {
                let equity = equity_at(&curve, trade.exit_time())?;
                let color = if trade.pnl() >= 0.0 { GREEN.filled() } else { RED.filled() };
                Some(Circle::new((trade.exit_time(), equity), 3, color))
            }))
            .map_err(|e| Error::Plotters(e.to_string()))?;

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .label_font(("sans-serif", Y_LABEL_SIZE))
            .draw()
            .map_err(|e| Error::Plotters(e.to_string()))
    }

    /// Draws the distribution of realized trade P&L.
    fn draw_pnl_chart<DB: DrawingBackend>(&self, drawing_area: &DrawingArea<DB, Shift>) -> Result<()> {
        let pnls = self.report.pnls().collect::<Vec<_>>();
        let bins = pnl_histogram(&pnls, PNL_BINS);
        let drawing_area = drawing_area.margin(10, 10, 70, 70);

        let (Some(first), Some(last)) = (bins.first(), bins.last()) else {
            let mut chart = ChartBuilder::on(&drawing_area)
                .build_cartesian_2d(0.0..1.0, 0f64..100f64)
                .map_err(|e| Error::Plotters(e.to_string()))?;
            let text = Text::new("No closed trades", (0.4, 50.0), ("sans-serif", 28).into_font());
            return chart
                .draw_series([text])
                .map(|_| ())
                .map_err(|e| Error::Plotters(e.to_string()));
        };
        let max_count = bins.iter().map(|(_, _, count)| *count).max().unwrap_or_default();

        let mut chart = ChartBuilder::on(&drawing_area)
            .caption(format!("Trade P&L ({} trades)", pnls.len()), ("sans-serif", 24).into_font())
            .x_label_area_size(X_LABEL_SIZE * 2)
            .y_label_area_size(Y_LABEL_SIZE * 4)
            .build_cartesian_2d(first.0..last.1, 0.0..(max_count as f64 * 1.1 + 1.0))
            .map_err(|e| Error::Plotters(e.to_string()))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc("P&L")
            .y_desc("Trades")
            .x_label_style(("sans-serif", X_LABEL_SIZE))
            .y_label_style(("sans-serif", Y_LABEL_SIZE))
            .y_labels(5)
            .draw()
            .map_err(|e| Error::Plotters(e.to_string()))?;

        chart
            .draw_series(bins.iter().map(|&(lower, upper, count)| {
                let color = if upper <= 0.0 {
                    RED.mix(0.5)
                } else if lower >= 0.0 {
                    GREEN.mix(0.5)
                } else {
                    BASELINE_COLOR.mix(0.5)
                };
                Rectangle::new([(lower, 0.0), (upper, count as f64)], color.filled())
            }))
            .map(|_| ())
            .map_err(|e| Error::Plotters(e.to_string()))
    }
}

fn equity_at(curve: &[(DateTime<Utc>, f64)], time: DateTime<Utc>) -> Option<f64> {
    curve.iter().find(|(t, _)| *t == time).map(|(_, equity)| *equity)
}

/// Buckets `pnls` into `bins` equal-width ranges `(lower, upper, count)`.
///
/// The last bucket is closed on both ends. Returns nothing for an empty input.
pub fn pnl_histogram(pnls: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    if pnls.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = pnls.iter().copied().fold(f64::INFINITY, f64::min);
    let max = pnls.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = if max > min { (max - min) / bins as f64 } else { 1.0 };

    let mut counts = vec![0usize; bins];
    for pnl in pnls {
        let index = (((pnl - min) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| (min + i as f64 * width, min + (i + 1) as f64 * width, count))
        .collect()
}

#[cfg(test)]
#[test]
fn histogram_buckets() {
    let bins = pnl_histogram(&[-10.0, -5.0, 0.0, 5.0, 10.0], 4);
    let counts = bins.iter().map(|(_, _, c)| *c).collect::<Vec<_>>();
    assert_eq!(counts, vec![1, 1, 1, 2]);
    assert_eq!(bins[0].0, -10.0);
    assert_eq!(bins[3].1, 10.0);
}

#[cfg(test)]
#[test]
fn histogram_of_identical_values() {
    let bins = pnl_histogram(&[3.0, 3.0], 5);
    assert_eq!(bins[0], (3.0, 4.0, 2));
    assert!(pnl_histogram(&[], 5).is_empty());
}

#[cfg(test)]
#[test]
fn output_from_extension() {
    assert!(matches!(DrawOutput::from_path("out/chart.svg"), Ok(DrawOutput::Svg(_))));
    assert!(matches!(DrawOutput::from_path("chart.PNG"), Ok(DrawOutput::Png(_))));
    assert!(matches!(DrawOutput::from_path("chart.html"), Err(Error::Msg(_))));
}
