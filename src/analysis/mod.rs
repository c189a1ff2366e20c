pub mod statistics;

pub use statistics::{aggregate, FlowFeatures, PacketRecord, ProtocolFlags, ProtocolMarker};
