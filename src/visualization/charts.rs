use std::fs;
use std::path::PathBuf;
use image::{ImageFormat, RgbImage};
use log::info;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Widget},
};

use crate::config::ReportConfig;
use crate::error::{AnalysisError, Result};
use crate::traffic::{Metric, MetricSeries};
use crate::utils::formatting::truncate_string;
use crate::visualization::raster::rasterize;

// Bar heights are integers; keep two decimals of the metric.
const VALUE_SCALE: f64 = 100.0;

const BAR_COLORS: [Color; 5] = [
    Color::LightRed,
    Color::Magenta,
    Color::LightMagenta,
    Color::Red,
    Color::LightYellow,
];

/// Bar chart comparing one metric across the flows of a batch.
pub struct ComparisonChart<'s> {
    series: &'s MetricSeries,
    bar_width: u16,
    bar_gap: u16,
}

impl<'s> ComparisonChart<'s> {
    pub fn new(series: &'s MetricSeries, bar_width: u16, bar_gap: u16) -> Self {
        Self {
            series,
            bar_width: bar_width.max(1),
            bar_gap,
        }
    }

    pub fn title(&self) -> String {
        format!("{} [{}]", self.series.metric.title(), self.series.metric.unit())
    }

    /// Smallest width that fits every bar between the borders.
    pub fn required_width(&self) -> u16 {
        let n = self.series.bars.len() as u16;
        let bars = n.saturating_mul(self.bar_width);
        let gaps = n.saturating_sub(1).saturating_mul(self.bar_gap);
        bars.saturating_add(gaps).saturating_add(2)
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let metric = self.series.metric;

        let bars: Vec<Bar> = self
            .series
            .bars
            .iter()
            .enumerate()
            .map(|(i, (label, value))| {
                Bar::default()
                    .label(Line::from(truncate_string(label, self.bar_width as usize)))
                    .value(scaled(*value))
                    .text_value(format_value(metric, *value))
                    .style(Style::default().fg(BAR_COLORS[i % BAR_COLORS.len()]))
            })
            .collect();

        let max = if metric.is_percentage() {
            scaled(100.0)
        } else {
            bars_max(&self.series.bars)
        };

        BarChart::default()
            .block(Block::default().title(self.title()).borders(Borders::ALL))
            .bar_width(self.bar_width)
            .bar_gap(self.bar_gap)
            .max(max.max(1))
            .value_style(Style::default().fg(Color::Black).bg(Color::White))
            .data(BarGroup::default().bars(&bars))
            .render(area, buf);
    }

    /// Renders into an off-screen buffer of at least `width` columns.
    pub fn draw(&self, width: u16, height: u16) -> Buffer {
        let area = Rect::new(0, 0, width.max(self.required_width()), height);
        let mut buf = Buffer::empty(area);
        self.render(area, &mut buf);
        buf
    }

    pub fn to_text(&self, width: u16, height: u16) -> String {
        buffer_to_text(&self.draw(width, height))
    }

    pub fn to_image(&self, width: u16, height: u16) -> RgbImage {
        rasterize(&self.draw(width, height))
    }
}

/// Writes one PNG chart per metric series into the report directory.
pub struct ChartRenderer {
    settings: ReportConfig,
}

impl ChartRenderer {
    pub fn new(settings: ReportConfig) -> Self {
        Self { settings }
    }

    pub fn artifact_path(&self, metric: Metric) -> PathBuf {
        self.settings
            .output_dir
            .join(format!("{}.png", metric.file_stem()))
    }

    pub fn render_all(&self, series: &[MetricSeries]) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.settings.output_dir)?;

        let mut written = Vec::with_capacity(series.len());
        for s in series {
            if s.bars.is_empty() {
                return Err(AnalysisError::ChartOutput(format!(
                    "no flows to plot for {}",
                    s.metric.file_stem()
                )));
            }

            let chart = ComparisonChart::new(s, self.settings.bar_width, self.settings.bar_gap);
            let image = chart.to_image(self.settings.chart_width, self.settings.chart_height);
            let path = self.artifact_path(s.metric);
            image
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|e| AnalysisError::ChartOutput(format!("{}: {}", path.display(), e)))?;

            info!("created {} comparison chart: {}", s.metric.file_stem(), path.display());
            written.push(path);
        }
        Ok(written)
    }
}

fn scaled(value: f64) -> u64 {
    (value.max(0.0) * VALUE_SCALE).round() as u64
}

fn bars_max(bars: &[(String, f64)]) -> u64 {
    bars.iter().map(|(_, v)| scaled(*v)).max().unwrap_or(0)
}

fn format_value(metric: Metric, value: f64) -> String {
    match metric {
        Metric::TcpPct | Metric::TlsPct | Metric::QuicPct => format!("{:.1}%", value),
        Metric::FlowSize => format!("{}", value.round() as u64),
        Metric::FlowVolume => format!("{:.3}", value),
        _ => format!("{:.2}", value),
    }
}

#[allow(deprecated)]
fn buffer_to_text(buf: &Buffer) -> String {
    let width = buf.area.width as usize;
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    for row in buf.content.chunks(width) {
        let line: String = row.iter().map(|cell| cell.symbol.as_str()).collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
