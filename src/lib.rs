// Library exports for traffic-profiler
pub mod analysis;
pub mod batch;
pub mod capture;
pub mod config;
pub mod error;
pub mod traffic;
pub mod utils;
pub mod visualization;

pub use analysis::statistics;
pub use batch::{BatchOutcome, BatchRunner, FlowFailure};
pub use capture::pcap_reader;
pub use config::settings;
pub use error::{AnalysisError, ConfigError};
pub use traffic::{classifier, report};
pub use utils::formatting;
pub use visualization::charts;

// Error types
pub use anyhow::{Error, Result};
