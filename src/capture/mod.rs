pub mod pcap_reader;

pub use pcap_reader::{PcapFileSource, PacketSource, CapturedFlow, LinkLayer, RawFrame, decode_frame, decode_record, order_by_timestamp};
