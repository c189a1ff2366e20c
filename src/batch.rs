use log::{error, info, warn};
use serde::Serialize;

use crate::analysis::aggregate;
use crate::capture::{CapturedFlow, PacketSource};
use crate::config::FlowSource;
use crate::error::{AnalysisError, Result};
use crate::traffic::{FlowReport, FlowResult, RuleTable};

#[derive(Debug, Clone, Serialize)]
pub struct FlowFailure {
    pub flow_label: String,
    pub source: String,
    pub reason: String,
    /// Frames the source could not decode before the flow was excluded.
    pub dropped_packets: u64,
}

/// Everything a batch run produced: the ordered results plus the flows
/// that were skipped or excluded along the way.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub report: FlowReport,
    pub failures: Vec<FlowFailure>,
}

impl BatchOutcome {
    /// Drops across every flow that was read, including excluded ones.
    pub fn dropped_packets(&self) -> u64 {
        let kept: u64 = self.report.results().iter().map(|r| r.dropped_packets).sum();
        let excluded: u64 = self.failures.iter().map(|f| f.dropped_packets).sum();
        kept + excluded
    }
}

/// Processes capture sources one at a time, in order.
pub struct BatchRunner<S: PacketSource> {
    source: S,
    rules: RuleTable,
}

impl<S: PacketSource> BatchRunner<S> {
    pub fn new(source: S, rules: RuleTable) -> Self {
        Self { source, rules }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Ingests, aggregates and classifies a single flow.
    pub fn analyze(&mut self, flow: &FlowSource) -> Result<FlowResult> {
        let captured = self.source.read_flow(&flow.source)?;
        self.classify_captured(flow, &captured)
    }

    fn classify_captured(&self, flow: &FlowSource, captured: &CapturedFlow) -> Result<FlowResult> {
        let features = aggregate(&captured.records)?;
        let traffic_label = self.rules.classify(&features);

        Ok(FlowResult {
            flow_label: flow.label.clone(),
            features,
            traffic_label,
            dropped_packets: captured.dropped,
        })
    }

    pub fn run(&mut self, flows: &[FlowSource]) -> BatchOutcome {
        self.run_with(flows, |_| {})
    }

    /// Like `run`, calling `on_result` as soon as each flow completes.
    pub fn run_with<F>(&mut self, flows: &[FlowSource], mut on_result: F) -> BatchOutcome
    where
        F: FnMut(&FlowResult),
    {
        let mut outcome = BatchOutcome::default();

        for flow in flows {
            info!("analyzing {}...", flow.label);
            let captured = match self.source.read_flow(&flow.source) {
                Ok(captured) => captured,
                Err(e) => {
                    record_failure(&mut outcome, flow, e, 0);
                    continue;
                }
            };

            match self.classify_captured(flow, &captured) {
                Ok(result) => {
                    info!(
                        "{}: {} packets classified as {}",
                        result.flow_label, result.features.packet_count, result.traffic_label
                    );
                    on_result(&result);
                    outcome.report.push(result);
                }
                Err(e) => {
                    record_failure(&mut outcome, flow, e, captured.dropped);
                }
            }
        }

        outcome
    }
}

fn record_failure(outcome: &mut BatchOutcome, flow: &FlowSource, e: AnalysisError, dropped: u64) {
    if e.is_flow_local() {
        warn!("skipping {} ({}): {}", flow.label, flow.source, e);
    } else {
        error!("failed to analyze {} ({}): {}", flow.label, flow.source, e);
    }
    if dropped > 0 {
        warn!("{}: {} undecodable packets discarded with the flow", flow.label, dropped);
    }
    outcome.failures.push(FlowFailure {
        flow_label: flow.label.clone(),
        source: flow.source.clone(),
        reason: e.to_string(),
        dropped_packets: dropped,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::analysis::{PacketRecord, ProtocolFlags};
    use crate::capture::CapturedFlow;
    use crate::traffic::{Comparison, TrafficLabel};

    #[derive(Default)]
    struct MemorySource {
        flows: HashMap<String, (Vec<PacketRecord>, u64)>,
        opened: Vec<String>,
    }

    impl MemorySource {
        fn with_flow(mut self, name: &str, records: Vec<PacketRecord>, dropped: u64) -> Self {
            self.flows.insert(name.to_string(), (records, dropped));
            self
        }
    }

    impl PacketSource for MemorySource {
        fn read_flow(&mut self, source: &str) -> Result<CapturedFlow> {
            self.opened.push(source.to_string());
            match self.flows.get(source) {
                Some((records, dropped)) => Ok(CapturedFlow {
                    records: records.clone(),
                    dropped: *dropped,
                }),
                None => Err(AnalysisError::SourceUnavailable {
                    source_id: source.to_string(),
                    reason: "not found".to_string(),
                }),
            }
        }
    }

    // bursts of ten 1200-byte packets every 40ms: ~2.5 Mbps, jitter std ~12ms
    fn video_stream() -> Vec<PacketRecord> {
        (0..200)
            .map(|i| PacketRecord::new(1200, (i / 10) as f64 * 0.04, ProtocolFlags::empty()))
            .collect()
    }

    fn steady(size: u64, n: usize) -> Vec<PacketRecord> {
        (0..n)
            .map(|i| PacketRecord::new(size, i as f64 * 0.05, ProtocolFlags::empty()))
            .collect()
    }

    #[test]
    fn test_failures_do_not_abort_batch() {
        let source = MemorySource::default()
            .with_flow("youtube.pcap", video_stream(), 0)
            .with_flow("empty.pcap", Vec::new(), 4)
            .with_flow("chrome.pcap", steady(1000, 10), 1);
        let mut runner = BatchRunner::new(source, RuleTable::default());

        let flows = vec![
            FlowSource::new("missing.pcap", "Missing"),
            FlowSource::new("youtube.pcap", "YouTube"),
            FlowSource::new("empty.pcap", "Empty"),
            FlowSource::new("chrome.pcap", "Chrome"),
        ];
        let outcome = runner.run(&flows);

        let labels: Vec<_> = outcome.report.results().iter().map(|r| r.flow_label.as_str()).collect();
        assert_eq!(labels, vec!["YouTube", "Chrome"]);

        let failed: Vec<_> = outcome.failures.iter().map(|f| f.flow_label.as_str()).collect();
        assert_eq!(failed, vec!["Missing", "Empty"]);
        assert_eq!(runner.source().opened.len(), 4);
        assert_eq!(outcome.dropped_packets(), 5);
    }

    #[test]
    fn test_excluded_flow_keeps_drop_count() {
        // every frame failed to decode, so nothing reaches the aggregator
        let source = MemorySource::default().with_flow("garbled.pcap", Vec::new(), 7);
        let mut runner = BatchRunner::new(source, RuleTable::default());

        let outcome = runner.run(&[
            FlowSource::new("garbled.pcap", "Garbled"),
            FlowSource::new("missing.pcap", "Missing"),
        ]);

        assert_eq!(outcome.report.comparison(), Comparison::NoResults);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].dropped_packets, 7);
        assert!(outcome.failures[0].reason.contains("no packets"));
        assert_eq!(outcome.failures[1].dropped_packets, 0);
        assert_eq!(outcome.dropped_packets(), 7);

        let json = serde_json::to_value(&outcome.failures[0]).unwrap();
        assert_eq!(json["dropped_packets"], 7);
    }

    #[test]
    fn test_flows_are_classified() {
        let source = MemorySource::default()
            .with_flow("youtube.pcap", video_stream(), 0)
            .with_flow("steady.pcap", steady(1000, 33), 0);
        let mut runner = BatchRunner::new(source, RuleTable::default());

        let youtube = runner.analyze(&FlowSource::new("youtube.pcap", "YouTube")).unwrap();
        assert_eq!(youtube.traffic_label, TrafficLabel::VideoStreaming);

        // std 0 voids every rule
        let steady = runner.analyze(&FlowSource::new("steady.pcap", "Steady")).unwrap();
        assert_eq!(steady.traffic_label, TrafficLabel::Unknown);
    }

    #[test]
    fn test_callback_sees_each_success_in_order() {
        let source = MemorySource::default()
            .with_flow("a.pcap", steady(500, 5), 0)
            .with_flow("b.pcap", steady(600, 5), 0);
        let mut runner = BatchRunner::new(source, RuleTable::default());

        let mut seen = Vec::new();
        let flows = vec![
            FlowSource::new("a.pcap", "A"),
            FlowSource::new("gone.pcap", "Gone"),
            FlowSource::new("b.pcap", "B"),
        ];
        let outcome = runner.run_with(&flows, |r| seen.push(r.flow_label.clone()));

        assert_eq!(seen, vec!["A".to_string(), "B".to_string()]);
        assert!(matches!(outcome.report.comparison(), Comparison::Ready(_)));
    }

    #[test]
    fn test_single_success_suppresses_comparison() {
        let source = MemorySource::default().with_flow("a.pcap", steady(500, 5), 0);
        let mut runner = BatchRunner::new(source, RuleTable::default());

        let outcome = runner.run(&[FlowSource::new("a.pcap", "A"), FlowSource::new("b.pcap", "B")]);
        assert_eq!(outcome.report.comparison(), Comparison::Suppressed { collected: 1 });
    }
}
