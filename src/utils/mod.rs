pub mod formatting;

pub use formatting::{format_bytes, format_flow_summary, truncate_string};
