pub mod classifier;
pub mod report;

pub use classifier::{TrafficLabel, RuleTable, ThresholdRule, Bound};
pub use report::{FlowReport, FlowResult, Comparison, Metric, MetricSeries};
