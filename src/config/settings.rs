use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use crate::error::ConfigError;
use crate::traffic::RuleTable;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub flows: Vec<FlowSource>,
    pub rules: RuleTable,
    pub report: ReportConfig,
}

/// One capture to analyze and the name it is reported under.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlowSource {
    pub source: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    pub chart_width: u16,
    pub chart_height: u16,
    pub bar_width: u16,
    pub bar_gap: u16,
}

impl FlowSource {
    pub fn new(source: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            label: label.into(),
        }
    }

    /// Parses the `SOURCE=LABEL` form used on the command line. The label
    /// defaults to the file stem when omitted.
    pub fn parse(arg: &str) -> Result<Self, String> {
        let (source, label) = match arg.split_once('=') {
            Some((source, label)) => (source.trim(), label.trim().to_string()),
            None => {
                let source = arg.trim();
                let stem = Path::new(source)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                (source, stem)
            }
        };

        if source.is_empty() {
            return Err(format!("missing capture path in '{}'", arg));
        }
        if label.is_empty() {
            return Err(format!("missing flow label in '{}'", arg));
        }
        Ok(Self::new(source, label))
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            chart_width: 80,
            chart_height: 24,
            bar_width: 9,
            bar_gap: 2,
        }
    }
}

impl Config {
    /// Reference capture set analyzed when no flows are configured.
    pub fn default_flows() -> Vec<FlowSource> {
        vec![
            FlowSource::new("chrome_browsing.pcapng", "Chrome"),
            FlowSource::new("edge_browsing.pcapng", "Edge"),
            FlowSource::new("spotify2_audio.pcapng", "Spotify"),
            FlowSource::new("youtube_video.pcapng", "YouTube"),
            FlowSource::new("zoom1_call.pcapng", "Zoom"),
        ]
    }

    pub fn with_default_flows() -> Self {
        Self {
            flows: Self::default_flows(),
            ..Self::default()
        }
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rules.validate()?;

        let report = &self.report;
        if report.bar_width == 0 {
            return Err(ConfigError::InvalidReport("bar_width must be at least 1".to_string()));
        }
        // borders + title row + bar + label row + value row
        if report.chart_height < 5 {
            return Err(ConfigError::InvalidReport(format!(
                "chart_height {} is too small (minimum 5)",
                report.chart_height
            )));
        }
        if report.chart_width < 3 {
            return Err(ConfigError::InvalidReport(format!(
                "chart_width {} is too small (minimum 3)",
                report.chart_width
            )));
        }
        Ok(())
    }
}
