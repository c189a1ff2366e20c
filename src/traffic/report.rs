use serde::Serialize;
use crate::analysis::FlowFeatures;
use crate::traffic::TrafficLabel;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowResult {
    pub flow_label: String,
    pub features: FlowFeatures,
    pub traffic_label: TrafficLabel,
    pub dropped_packets: u64,
}

/// Metrics compared across flows, one chart each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AvgPacketSize,
    AvgInterArrivalTime,
    TcpPct,
    TlsPct,
    QuicPct,
    FlowVolume,
    FlowSize,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::AvgPacketSize,
        Metric::AvgInterArrivalTime,
        Metric::TcpPct,
        Metric::TlsPct,
        Metric::QuicPct,
        Metric::FlowVolume,
        Metric::FlowSize,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Metric::AvgPacketSize => "Average packet size",
            Metric::AvgInterArrivalTime => "Average inter arrival time (ms)",
            Metric::TcpPct => "Percent TCP packet headers",
            Metric::TlsPct => "Percent TLS packet headers",
            Metric::QuicPct => "Percent QUIC packet headers",
            Metric::FlowVolume => "Flow volume",
            Metric::FlowSize => "Flow size",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Metric::AvgPacketSize => "Bytes",
            Metric::AvgInterArrivalTime => "Milliseconds",
            Metric::TcpPct | Metric::TlsPct | Metric::QuicPct => "Percentage",
            Metric::FlowVolume => "Megabytes",
            Metric::FlowSize => "Packets",
        }
    }

    /// Artifact name, without extension.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Metric::AvgPacketSize => "packet_size",
            Metric::AvgInterArrivalTime => "inter_arrival_time",
            Metric::TcpPct => "tcp_packets_header",
            Metric::TlsPct => "tls_packets_header",
            Metric::QuicPct => "quic_packets_header",
            Metric::FlowVolume => "flow_volume",
            Metric::FlowSize => "flow_size",
        }
    }

    pub fn is_percentage(&self) -> bool {
        matches!(self, Metric::TcpPct | Metric::TlsPct | Metric::QuicPct)
    }

    pub fn value_of(&self, features: &FlowFeatures) -> f64 {
        match self {
            Metric::AvgPacketSize => features.avg_packet_size,
            Metric::AvgInterArrivalTime => features.avg_inter_arrival,
            Metric::TcpPct => features.tcp_pct,
            Metric::TlsPct => features.tls_pct,
            Metric::QuicPct => features.quic_pct,
            Metric::FlowVolume => features.flow_volume_mb,
            Metric::FlowSize => features.flow_size() as f64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub metric: Metric,
    pub bars: Vec<(String, f64)>, // (flow_label, value), insertion order
}

/// What the end of a batch run shows, decided by how many flows succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    NoResults,
    Suppressed { collected: usize },
    Ready(Vec<MetricSeries>),
}

impl Comparison {
    /// Line printed in place of charts, if any.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            Comparison::NoResults => Some("no results"),
            Comparison::Suppressed { .. } => Some("no comparison results"),
            Comparison::Ready(_) => None,
        }
    }
}

/// Append-only collection of per-flow results for one batch run.
#[derive(Debug, Default, Serialize)]
pub struct FlowReport {
    results: Vec<FlowResult>,
}

impl FlowReport {
    pub const MIN_FLOWS_FOR_COMPARISON: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: FlowResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[FlowResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn comparison(&self) -> Comparison {
        if self.results.is_empty() {
            return Comparison::NoResults;
        }
        if self.results.len() < Self::MIN_FLOWS_FOR_COMPARISON {
            return Comparison::Suppressed {
                collected: self.results.len(),
            };
        }

        let series = Metric::ALL
            .iter()
            .map(|metric| MetricSeries {
                metric: *metric,
                bars: self
                    .results
                    .iter()
                    .map(|r| (r.flow_label.clone(), metric.value_of(&r.features)))
                    .collect(),
            })
            .collect();

        Comparison::Ready(series)
    }
}
