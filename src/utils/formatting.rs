use std::fmt::Write;
use crate::traffic::FlowResult;

/// Format bytes in human-readable format (B, KB, MB, GB, TB)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Truncate string to specified length with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

/// Fixed-format per-flow summary printed after each analyzed capture.
pub fn format_flow_summary(result: &FlowResult) -> String {
    let f = &result.features;
    let mut out = String::new();

    // writing into a String cannot fail
    let _ = writeln!(out, "==={} summary===", result.flow_label);
    let _ = writeln!(out, "packet count: {}", f.packet_count);
    let _ = writeln!(out, "ip header: {}", f.ip_count);
    let _ = writeln!(out, "tcp header: {}", f.tcp_count);
    let _ = writeln!(out, "tls header: {}", f.tls_count);
    let _ = writeln!(out, "quic header: {}", f.quic_count);
    let _ = writeln!(out, "avg packet size: {:.3}", f.avg_packet_size);
    let _ = writeln!(out, "avg inter arrival time(ms): {:.5}", f.avg_inter_arrival);
    let _ = writeln!(out, "std inter arrival time(ms): {:.3}", f.std_inter_arrival);
    let _ = writeln!(out, "bitrate(Mbps): {:.3}", f.bitrate_mbps);
    let _ = writeln!(out, "flow volume(MB): {:.3} ({})", f.flow_volume_mb, format_bytes(f.total_bytes));
    let _ = writeln!(out, "flow size: {}", f.flow_size());
    if result.dropped_packets > 0 {
        let _ = writeln!(out, "dropped packets: {}", result.dropped_packets);
    }
    let _ = writeln!(out, "The identified traffic type is: {}", result.traffic_label);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{aggregate, PacketRecord, ProtocolFlags, ProtocolMarker};
    use crate::traffic::TrafficLabel;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("hi", 2), "hi");
        assert_eq!(truncate_string("Spotify", 3), "Spo");
    }

    #[test]
    fn test_flow_summary_layout() {
        let tcp = ProtocolFlags::empty().with(ProtocolMarker::Ip).with(ProtocolMarker::Tcp);
        let records = vec![
            PacketRecord::new(1000, 0.0, tcp),
            PacketRecord::new(1000, 0.5, tcp),
        ];
        let result = FlowResult {
            flow_label: "Edge".to_string(),
            features: aggregate(&records).unwrap(),
            traffic_label: TrafficLabel::Unknown,
            dropped_packets: 3,
        };
        let summary = format_flow_summary(&result);
        let lines: Vec<_> = summary.lines().collect();

        assert_eq!(lines[0], "===Edge summary===");
        assert_eq!(lines[1], "packet count: 2");
        assert_eq!(lines[2], "ip header: 2");
        assert_eq!(lines[3], "tcp header: 2");
        assert_eq!(lines[6], "avg packet size: 1000.000");
        assert_eq!(lines[7], "avg inter arrival time(ms): 500.00000");
        assert_eq!(lines[9], "bitrate(Mbps): 0.032");
        assert!(summary.contains("flow size: 2\n"));
        assert!(summary.contains("dropped packets: 3\n"));
        assert_eq!(*lines.last().unwrap(), "The identified traffic type is: Unknown");
    }
}
