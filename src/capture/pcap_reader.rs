use std::path::Path;
use log::{debug, info, warn};
use pcap::{Capture, Linktype};
use pnet::packet::Packet;
use pnet::packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;

use crate::analysis::{PacketRecord, ProtocolFlags, ProtocolMarker};
use crate::error::{AnalysisError, Result};

const QUIC_PORT: u16 = 443;
const SLL_HEADER_LEN: usize = 16;

/// Supplies the packet sequence of one capture source.
pub trait PacketSource {
    fn read_flow(&mut self, source: &str) -> Result<CapturedFlow>;
}

#[derive(Debug, Default)]
pub struct CapturedFlow {
    pub records: Vec<PacketRecord>,
    pub dropped: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    RawIp,
    LinuxCooked,
    Unsupported(i32),
}

impl From<Linktype> for LinkLayer {
    fn from(linktype: Linktype) -> Self {
        match linktype.0 {
            1 => LinkLayer::Ethernet,
            // DLT_RAW as mapped by libpcap, LINKTYPE_RAW, LINKTYPE_IPV4/IPV6
            12 | 14 | 101 | 228 | 229 => LinkLayer::RawIp,
            113 => LinkLayer::LinuxCooked,
            other => LinkLayer::Unsupported(other),
        }
    }
}

/// Header fields and captured bytes of one frame.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub ts_sec: i64,
    pub ts_usec: i64,
    pub wire_len: u32,
    pub data: &'a [u8],
}

impl<'a> From<&pcap::Packet<'a>> for RawFrame<'a> {
    fn from(packet: &pcap::Packet<'a>) -> Self {
        Self {
            ts_sec: packet.header.ts.tv_sec as i64,
            ts_usec: packet.header.ts.tv_usec as i64,
            wire_len: packet.header.len,
            data: packet.data,
        }
    }
}

/// Reads offline capture files (pcap and pcapng) through libpcap.
#[derive(Debug, Default)]
pub struct PcapFileSource {
    files_read: u64,
}

impl PcapFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files_read(&self) -> u64 {
        self.files_read
    }
}

impl PacketSource for PcapFileSource {
    fn read_flow(&mut self, source: &str) -> Result<CapturedFlow> {
        if !Path::new(source).exists() {
            return Err(AnalysisError::SourceUnavailable {
                source_id: source.to_string(),
                reason: "file does not exist".to_string(),
            });
        }

        let mut capture = Capture::from_file(source).map_err(|e| AnalysisError::SourceUnavailable {
            source_id: source.to_string(),
            reason: e.to_string(),
        })?;

        let link = LinkLayer::from(capture.get_datalink());
        if let LinkLayer::Unsupported(dlt) = link {
            warn!("{}: link type {} not decoded, protocol markers will be empty", source, dlt);
        }
        info!("Reading {} (link layer {:?})", source, link);

        let mut flow = CapturedFlow::default();
        let mut index = 0u64;
        loop {
            match capture.next_packet() {
                Ok(packet) => {
                    match decode_record(index, link, RawFrame::from(&packet)) {
                        Ok(record) => flow.records.push(record),
                        Err(e) => {
                            debug!("{}: {}", source, e);
                            flow.dropped += 1;
                        }
                    }
                    index += 1;
                }
                Err(pcap::Error::NoMorePackets) => break,
                Err(e) => {
                    warn!("{}: capture truncated after {} packets: {}", source, index, e);
                    flow.dropped += 1;
                    break;
                }
            }
        }

        let reordered = order_by_timestamp(&mut flow.records);
        if reordered > 0 {
            warn!("{}: {} packets out of timestamp order, re-sorted", source, reordered);
        }

        self.files_read += 1;
        info!(
            "Finished {}: {} packets kept, {} dropped",
            source,
            flow.records.len(),
            flow.dropped
        );
        Ok(flow)
    }
}

/// Stable-sorts records by timestamp, as merged multi-interface captures can
/// interleave slightly out of order. Returns how many records arrived earlier
/// than their predecessor.
pub fn order_by_timestamp(records: &mut [PacketRecord]) -> usize {
    let reordered = records
        .windows(2)
        .filter(|pair| pair[1].timestamp < pair[0].timestamp)
        .count();
    if reordered > 0 {
        records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    }
    reordered
}

/// Turns one captured frame into a packet record, or reports why it cannot.
pub fn decode_record(index: u64, link: LinkLayer, frame: RawFrame<'_>) -> Result<PacketRecord> {
    if frame.ts_sec < 0 || !(0..1_000_000).contains(&frame.ts_usec) {
        return Err(AnalysisError::PacketDecode {
            index,
            reason: format!("invalid timestamp {}.{:06}", frame.ts_sec, frame.ts_usec),
        });
    }

    let protocol_flags = decode_frame(link, frame.data)
        .map_err(|reason| AnalysisError::PacketDecode { index, reason })?;
    let timestamp = frame.ts_sec as f64 + frame.ts_usec as f64 / 1_000_000.0;

    Ok(PacketRecord::new(frame.wire_len as u64, timestamp, protocol_flags))
}

/// Detects the protocol markers carried by a frame. Only a truncated
/// link-layer header is an error; anything deeper just yields fewer markers.
pub fn decode_frame(link: LinkLayer, data: &[u8]) -> std::result::Result<ProtocolFlags, String> {
    let mut flags = ProtocolFlags::empty();

    match link {
        LinkLayer::Ethernet => {
            let ethernet = EthernetPacket::new(data)
                .ok_or_else(|| format!("truncated ethernet header ({} bytes)", data.len()))?;
            let mut ethertype = ethernet.get_ethertype();
            let mut payload = ethernet.payload();

            let vlan;
            if ethertype == EtherTypes::Vlan {
                vlan = match VlanPacket::new(payload) {
                    Some(vlan) => vlan,
                    None => return Ok(flags),
                };
                ethertype = vlan.get_ethertype();
                payload = vlan.payload();
            }
            inspect_network(ethertype, payload, &mut flags);
        }
        LinkLayer::LinuxCooked => {
            if data.len() < SLL_HEADER_LEN {
                return Err(format!("truncated cooked-capture header ({} bytes)", data.len()));
            }
            let ethertype = EtherType(u16::from_be_bytes([data[14], data[15]]));
            inspect_network(ethertype, &data[SLL_HEADER_LEN..], &mut flags);
        }
        LinkLayer::RawIp => {
            let first = data.first().ok_or_else(|| "empty raw IP frame".to_string())?;
            let ethertype = match first >> 4 {
                4 => EtherTypes::Ipv4,
                6 => EtherTypes::Ipv6,
                _ => return Ok(flags),
            };
            inspect_network(ethertype, data, &mut flags);
        }
        LinkLayer::Unsupported(_) => {}
    }

    Ok(flags)
}

fn inspect_network(ethertype: EtherType, payload: &[u8], flags: &mut ProtocolFlags) {
    if ethertype == EtherTypes::Ipv4 {
        if let Some(ipv4) = Ipv4Packet::new(payload) {
            flags.insert(ProtocolMarker::Ip);
            inspect_transport(ipv4.get_next_level_protocol(), ipv4.payload(), flags);
        }
    } else if ethertype == EtherTypes::Ipv6 {
        if let Some(ipv6) = Ipv6Packet::new(payload) {
            inspect_transport(ipv6.get_next_header(), ipv6.payload(), flags);
        }
    }
}

fn inspect_transport(protocol: IpNextHeaderProtocol, payload: &[u8], flags: &mut ProtocolFlags) {
    match protocol {
        IpNextHeaderProtocols::Tcp => {
            if let Some(tcp) = TcpPacket::new(payload) {
                flags.insert(ProtocolMarker::Tcp);
                if is_tls_record(tcp.payload()) {
                    flags.insert(ProtocolMarker::Tls);
                }
            }
        }
        IpNextHeaderProtocols::Udp => {
            if let Some(udp) = UdpPacket::new(payload) {
                let on_quic_port =
                    udp.get_source() == QUIC_PORT || udp.get_destination() == QUIC_PORT;
                if on_quic_port && is_quic_datagram(udp.payload()) {
                    flags.insert(ProtocolMarker::Quic);
                }
            }
        }
        _ => {}
    }
}

// content type 20..=23, protocol version 3.x
fn is_tls_record(payload: &[u8]) -> bool {
    payload.len() >= 5 && (20..=23).contains(&payload[0]) && payload[1] == 3 && payload[2] <= 4
}

// fixed bit is set in both long and short header forms
fn is_quic_datagram(payload: &[u8]) -> bool {
    payload.first().map_or(false, |b| b & 0x40 != 0)
}
