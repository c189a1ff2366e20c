use serde::{Deserialize, Serialize};
use crate::error::{AnalysisError, Result};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolMarker {
    Ip,
    Tcp,
    Tls,
    Quic,
}

impl ProtocolMarker {
    fn bit(self) -> u8 {
        match self {
            ProtocolMarker::Ip => 0b0001,
            ProtocolMarker::Tcp => 0b0010,
            ProtocolMarker::Tls => 0b0100,
            ProtocolMarker::Quic => 0b1000,
        }
    }
}

/// Set of protocol headers observed on a single packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProtocolFlags(u8);

impl ProtocolFlags {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, marker: ProtocolMarker) -> Self {
        self.insert(marker);
        self
    }

    pub fn insert(&mut self, marker: ProtocolMarker) {
        self.0 |= marker.bit();
    }

    pub fn contains(&self, marker: ProtocolMarker) -> bool {
        self.0 & marker.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketRecord {
    pub size_bytes: u64,
    pub timestamp: f64, // seconds
    pub protocol_flags: ProtocolFlags,
}

impl PacketRecord {
    pub fn new(size_bytes: u64, timestamp: f64, protocol_flags: ProtocolFlags) -> Self {
        Self {
            size_bytes,
            timestamp,
            protocol_flags,
        }
    }
}

/// Aggregate statistics of one flow. Inter-arrival values are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowFeatures {
    pub packet_count: usize,
    pub avg_packet_size: f64,
    pub std_inter_arrival: f64,
    pub avg_inter_arrival: f64,
    pub bitrate_mbps: f64,
    pub tcp_pct: f64,
    pub tls_pct: f64,
    pub quic_pct: f64,
    pub ip_count: usize,
    pub tcp_count: usize,
    pub tls_count: usize,
    pub quic_count: usize,
    pub total_bytes: u64,
    pub flow_volume_mb: f64,
}

impl FlowFeatures {
    /// Flow size as reported alongside the volume: the number of packets.
    pub fn flow_size(&self) -> usize {
        self.packet_count
    }
}

/// Reduces one flow's packet sequence to its feature vector.
pub fn aggregate(records: &[PacketRecord]) -> Result<FlowFeatures> {
    if records.is_empty() {
        return Err(AnalysisError::InvalidInput("flow contains no packets".to_string()));
    }
    validate_timestamps(records)?;

    let packet_count = records.len();
    let total_bytes: u64 = records.iter().map(|r| r.size_bytes).sum();

    let mut ip_count = 0;
    let mut tcp_count = 0;
    let mut tls_count = 0;
    let mut quic_count = 0;
    for record in records {
        let flags = &record.protocol_flags;
        if flags.contains(ProtocolMarker::Ip) {
            ip_count += 1;
        }
        if flags.contains(ProtocolMarker::Tcp) {
            tcp_count += 1;
        }
        if flags.contains(ProtocolMarker::Tls) {
            tls_count += 1;
        }
        if flags.contains(ProtocolMarker::Quic) {
            quic_count += 1;
        }
    }

    let deltas_ms = inter_arrival_ms(records);
    let (avg_inter_arrival, std_inter_arrival) = mean_and_std(&deltas_ms);

    Ok(FlowFeatures {
        packet_count,
        avg_packet_size: total_bytes as f64 / packet_count as f64,
        std_inter_arrival,
        avg_inter_arrival,
        bitrate_mbps: bitrate_mbps(records, total_bytes),
        tcp_pct: percentage(tcp_count, packet_count),
        tls_pct: percentage(tls_count, packet_count),
        quic_pct: percentage(quic_count, packet_count),
        ip_count,
        tcp_count,
        tls_count,
        quic_count,
        total_bytes,
        flow_volume_mb: total_bytes as f64 / BYTES_PER_MB,
    })
}

fn validate_timestamps(records: &[PacketRecord]) -> Result<()> {
    let mut previous = f64::NEG_INFINITY;
    for (index, record) in records.iter().enumerate() {
        let ts = record.timestamp;
        if !ts.is_finite() || ts < 0.0 {
            return Err(AnalysisError::InvalidInput(format!(
                "packet {} has an invalid timestamp ({})",
                index, ts
            )));
        }
        if ts < previous {
            return Err(AnalysisError::InvalidInput(format!(
                "packet {} arrives before its predecessor ({:.6} < {:.6})",
                index, ts, previous
            )));
        }
        previous = ts;
    }
    Ok(())
}

fn inter_arrival_ms(records: &[PacketRecord]) -> Vec<f64> {
    records
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp) * 1000.0)
        .collect()
}

/// Mean and population standard deviation; both 0 for an empty slice.
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn bitrate_mbps(records: &[PacketRecord], total_bytes: u64) -> f64 {
    let (first, last) = records.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(lo, hi), r| (lo.min(r.timestamp), hi.max(r.timestamp)),
    );
    let span = last - first;
    if span > 0.0 {
        (total_bytes as f64 * 8.0) / span / 1_000_000.0
    } else {
        0.0
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn even_flow(n: usize, size: u64, spacing: f64) -> Vec<PacketRecord> {
        (0..n)
            .map(|i| PacketRecord::new(size, 100.0 + i as f64 * spacing, ProtocolFlags::empty()))
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_evenly_spaced_flow() {
        let n = 20;
        let features = aggregate(&even_flow(n, 1000, 0.05)).unwrap();

        assert_eq!(features.packet_count, n);
        assert!(approx(features.avg_packet_size, 1000.0));
        assert!(features.std_inter_arrival.abs() < 1e-6);
        assert!((features.avg_inter_arrival - 50.0).abs() < 1e-6);

        let expected = (n as f64 * 1000.0 * 8.0) / ((n - 1) as f64 * 0.05) / 1e6;
        assert!((features.bitrate_mbps - expected).abs() < 1e-6);
    }

    #[test]
    fn test_single_packet_uses_sentinels() {
        let features = aggregate(&even_flow(1, 400, 0.0)).unwrap();

        assert_eq!(features.packet_count, 1);
        assert_eq!(features.bitrate_mbps, 0.0);
        assert_eq!(features.std_inter_arrival, 0.0);
        assert_eq!(features.avg_inter_arrival, 0.0);
        assert!(approx(features.avg_packet_size, 400.0));
    }

    #[test]
    fn test_simultaneous_arrivals_have_zero_bitrate() {
        let records = vec![
            PacketRecord::new(100, 5.0, ProtocolFlags::empty()),
            PacketRecord::new(300, 5.0, ProtocolFlags::empty()),
        ];
        let features = aggregate(&records).unwrap();

        assert_eq!(features.bitrate_mbps, 0.0);
        assert_eq!(features.std_inter_arrival, 0.0);
        assert!(!features.bitrate_mbps.is_nan());
    }

    #[test]
    fn test_population_std_in_milliseconds() {
        // deltas: 10ms, 30ms -> mean 20, population std 10
        let records = vec![
            PacketRecord::new(100, 1.000, ProtocolFlags::empty()),
            PacketRecord::new(100, 1.010, ProtocolFlags::empty()),
            PacketRecord::new(100, 1.040, ProtocolFlags::empty()),
        ];
        let features = aggregate(&records).unwrap();

        assert!((features.avg_inter_arrival - 20.0).abs() < 1e-6);
        assert!((features.std_inter_arrival - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_protocol_counts_and_percentages() {
        let tcp_tls = ProtocolFlags::empty()
            .with(ProtocolMarker::Ip)
            .with(ProtocolMarker::Tcp)
            .with(ProtocolMarker::Tls);
        let quic = ProtocolFlags::empty().with(ProtocolMarker::Ip).with(ProtocolMarker::Quic);
        let records = vec![
            PacketRecord::new(1200, 0.0, tcp_tls),
            PacketRecord::new(1200, 0.1, tcp_tls),
            PacketRecord::new(1200, 0.2, quic),
            PacketRecord::new(60, 0.3, ProtocolFlags::empty()),
        ];
        let features = aggregate(&records).unwrap();

        assert_eq!(features.ip_count, 3);
        assert_eq!(features.tcp_count, 2);
        assert_eq!(features.tls_count, 2);
        assert_eq!(features.quic_count, 1);
        assert!(approx(features.tcp_pct, 50.0));
        assert!(approx(features.tls_pct, 50.0));
        assert!(approx(features.quic_pct, 25.0));
    }

    #[test]
    fn test_percentages_stay_in_range() {
        let all = ProtocolFlags::empty()
            .with(ProtocolMarker::Ip)
            .with(ProtocolMarker::Tcp)
            .with(ProtocolMarker::Tls)
            .with(ProtocolMarker::Quic);
        for n in 1..15 {
            let records: Vec<_> = (0..n)
                .map(|i| {
                    let flags = if i % 3 == 0 { all } else { ProtocolFlags::empty() };
                    PacketRecord::new(64 + i as u64, i as f64 * 0.01, flags)
                })
                .collect();
            let features = aggregate(&records).unwrap();
            for pct in [features.tcp_pct, features.tls_pct, features.quic_pct] {
                assert!((0.0..=100.0).contains(&pct), "pct {} out of range", pct);
            }
        }
    }

    #[test]
    fn test_flow_volume_in_megabytes() {
        let records = even_flow(1024, 1024, 0.001);
        let features = aggregate(&records).unwrap();

        assert!(approx(features.flow_volume_mb, 1.0));
        assert_eq!(features.total_bytes, 1024 * 1024);
        assert_eq!(features.flow_size(), 1024);
    }

    #[test]
    fn test_total_bytes_is_exact_sum() {
        // past 2^53 bytes an f64 cannot hold every integer
        let sizes = [(1u64 << 60) + 1, 3, 77, 1514];
        let records: Vec<_> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| PacketRecord::new(*size, i as f64, ProtocolFlags::empty()))
            .collect();
        let features = aggregate(&records).unwrap();

        assert_eq!(features.total_bytes, sizes.iter().sum::<u64>());
    }

    #[test]
    fn test_empty_flow_is_invalid() {
        let result = aggregate(&[]);
        assert!(matches!(result, Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn test_malformed_timestamps_are_invalid() {
        let backwards = vec![
            PacketRecord::new(100, 2.0, ProtocolFlags::empty()),
            PacketRecord::new(100, 1.0, ProtocolFlags::empty()),
        ];
        assert!(matches!(aggregate(&backwards), Err(AnalysisError::InvalidInput(_))));

        let not_a_number = vec![PacketRecord::new(100, f64::NAN, ProtocolFlags::empty())];
        assert!(matches!(aggregate(&not_a_number), Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn test_protocol_flags_set_semantics() {
        let mut flags = ProtocolFlags::empty();
        assert!(flags.is_empty());

        flags.insert(ProtocolMarker::Tcp);
        flags.insert(ProtocolMarker::Tcp);
        assert!(flags.contains(ProtocolMarker::Tcp));
        assert!(!flags.contains(ProtocolMarker::Quic));
        assert!(!flags.is_empty());
    }
}
