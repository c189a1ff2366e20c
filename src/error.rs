use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Capture source '{source_id}' unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("Packet #{index} could not be decoded: {reason}")]
    PacketDecode { index: u64, reason: String },

    #[error("Invalid packet sequence: {0}")]
    InvalidInput(String),

    #[error("Chart output failed: {0}")]
    ChartOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read or write configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Rule {index} ({label}): {reason}")]
    InvalidRule { index: usize, label: String, reason: String },

    #[error("Report settings: {0}")]
    InvalidReport(String),
}

impl AnalysisError {
    /// True for failures that only remove a single flow from the batch.
    pub fn is_flow_local(&self) -> bool {
        matches!(
            self,
            AnalysisError::SourceUnavailable { .. } | AnalysisError::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
