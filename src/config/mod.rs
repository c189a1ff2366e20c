pub mod settings;

pub use settings::{Config, FlowSource, ReportConfig};
