//! Typed views of the asynchronous and reply messages handlers care about.

use crate::bytes::{align8, array, be_u8, be_u16, be_u32, be_u64, range, tail};
use crate::error::WireError;
use crate::header::{DatapathId, HEADER_LEN, MessageType};
use crate::oxm::{OxmFields, parse_oxm_fields};

const MATCH_HEADER_LEN: usize = 4;
const PORT_LEN: usize = 64;

/// Semantic decoding of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `OFPT_FEATURES_REPLY`.
    Features(SwitchFeatures),
    /// `OFPT_PACKET_IN`.
    PacketIn(PacketIn),
    /// `OFPT_FLOW_REMOVED`.
    FlowRemoved(FlowRemoved),
    /// `OFPT_MULTIPART_REPLY`.
    MultipartReply(MultipartReply),
    /// `OFPT_PORT_STATUS`.
    PortStatus(PortStatus),
}

impl Event {
    /// Decodes `payload` according to `message_type`.
    ///
    /// Returns `Ok(None)` for message types without a typed view.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] when the payload is too short for its type.
    pub fn decode(message_type: MessageType, payload: &[u8]) -> Result<Option<Self>, WireError> {
        let event = match message_type {
            MessageType::FEATURES_REPLY => Self::Features(SwitchFeatures::decode(payload)?),
            MessageType::PACKET_IN => Self::PacketIn(PacketIn::decode(payload)?),
            MessageType::FLOW_REMOVED => Self::FlowRemoved(FlowRemoved::decode(payload)?),
            MessageType::MULTIPART_REPLY => Self::MultipartReply(MultipartReply::decode(payload)?),
            MessageType::PORT_STATUS => Self::PortStatus(PortStatus::decode(payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Switch description carried by `OFPT_FEATURES_REPLY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchFeatures {
    /// Datapath identity.
    pub datapath_id: DatapathId,
    /// Packets the switch can buffer at once.
    pub n_buffers: u32,
    /// Number of flow tables.
    pub n_tables: u8,
    /// Auxiliary connection id; zero for the main connection.
    pub auxiliary_id: u8,
    /// `ofp_capabilities` bitmap.
    pub capabilities: u32,
}

impl SwitchFeatures {
    fn decode(payload: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            datapath_id: DatapathId(be_u64(payload, 8)?),
            n_buffers: be_u32(payload, 16)?,
            n_tables: be_u8(payload, 20)?,
            auxiliary_id: be_u8(payload, 21)?,
            capabilities: be_u32(payload, 24)?,
        })
    }
}

/// A packet forwarded to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    /// Buffer id on the switch, or `OFP_NO_BUFFER`.
    pub buffer_id: u32,
    /// Full length of the original frame.
    pub total_len: u16,
    /// Why the packet was sent.
    pub reason: u8,
    /// Table that sent the packet.
    pub table_id: u8,
    /// Cookie of the matching flow entry.
    pub cookie: u64,
    /// Pipeline fields describing the packet.
    pub fields: OxmFields,
    /// Captured packet bytes.
    pub data: Vec<u8>,
}

impl PacketIn {
    fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let (fields, match_end) = decode_match(payload, 24)?;
        Ok(Self {
            buffer_id: be_u32(payload, 8)?,
            total_len: be_u16(payload, 12)?,
            reason: be_u8(payload, 14)?,
            table_id: be_u8(payload, 15)?,
            cookie: be_u64(payload, 16)?,
            fields,
            // Two bytes of padding separate the match from the frame data.
            data: tail(payload, match_end + 2)?.to_vec(),
        })
    }
}

/// Notification that a flow entry left a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRemoved {
    /// Cookie of the removed entry.
    pub cookie: u64,
    /// Entry priority.
    pub priority: u16,
    /// `ofp_flow_removed_reason`.
    pub reason: u8,
    /// Table the entry belonged to.
    pub table_id: u8,
    /// Seconds the entry was alive.
    pub duration_sec: u32,
    /// Nanoseconds beyond `duration_sec`.
    pub duration_nsec: u32,
    /// Idle timeout from the original flow mod.
    pub idle_timeout: u16,
    /// Hard timeout from the original flow mod.
    pub hard_timeout: u16,
    /// Packets matched.
    pub packet_count: u64,
    /// Bytes matched.
    pub byte_count: u64,
    /// Match of the removed entry.
    pub fields: OxmFields,
}

impl FlowRemoved {
    fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let (fields, _) = decode_match(payload, 48)?;
        Ok(Self {
            cookie: be_u64(payload, 8)?,
            priority: be_u16(payload, 16)?,
            reason: be_u8(payload, 18)?,
            table_id: be_u8(payload, 19)?,
            duration_sec: be_u32(payload, 20)?,
            duration_nsec: be_u32(payload, 24)?,
            idle_timeout: be_u16(payload, 28)?,
            hard_timeout: be_u16(payload, 30)?,
            packet_count: be_u64(payload, 32)?,
            byte_count: be_u64(payload, 40)?,
            fields,
        })
    }
}

/// Reply to a multipart (statistics/description) request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartReply {
    /// `ofp_multipart_type`.
    pub multipart_type: u16,
    /// `OFPMPF_REPLY_*` flags.
    pub flags: u16,
    /// Type-specific body.
    pub body: Vec<u8>,
}

impl MultipartReply {
    /// Flag set while more replies for the same request follow.
    pub const REPLY_MORE: u16 = 1;

    fn decode(payload: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            multipart_type: be_u16(payload, 8)?,
            flags: be_u16(payload, 10)?,
            body: tail(payload, 16)?.to_vec(),
        })
    }

    /// Whether further replies for this request are still to come.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.flags & Self::REPLY_MORE != 0
    }
}

/// A port was added, removed or modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortStatus {
    /// `ofp_port_reason`.
    pub reason: u8,
    /// Description of the affected port.
    pub port: Port,
}

impl PortStatus {
    /// The port was added.
    pub const REASON_ADD: u8 = 0;
    /// The port was removed.
    pub const REASON_DELETE: u8 = 1;
    /// Some attribute of the port changed.
    pub const REASON_MODIFY: u8 = 2;

    fn decode(payload: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            reason: be_u8(payload, HEADER_LEN)?,
            port: Port::decode(range(payload, 16, 16 + PORT_LEN)?)?,
        })
    }
}

/// `ofp_port` description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    /// Port number.
    pub port_no: u32,
    /// Hardware address.
    pub hw_addr: [u8; 6],
    /// Interface name with NUL padding removed.
    pub name: String,
    /// `ofp_port_config` bitmap.
    pub config: u32,
    /// `ofp_port_state` bitmap.
    pub state: u32,
    /// Current features.
    pub curr: u32,
    /// Features advertised by the port.
    pub advertised: u32,
    /// Features supported by the port.
    pub supported: u32,
    /// Features advertised by the peer.
    pub peer: u32,
    /// Current bitrate in kbps.
    pub curr_speed: u32,
    /// Maximum bitrate in kbps.
    pub max_speed: u32,
}

impl Port {
    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            port_no: be_u32(bytes, 0)?,
            hw_addr: array(bytes, 8)?,
            name: port_name(array(bytes, 16)?),
            config: be_u32(bytes, 32)?,
            state: be_u32(bytes, 36)?,
            curr: be_u32(bytes, 40)?,
            advertised: be_u32(bytes, 44)?,
            supported: be_u32(bytes, 48)?,
            peer: be_u32(bytes, 52)?,
            curr_speed: be_u32(bytes, 56)?,
            max_speed: be_u32(bytes, 60)?,
        })
    }
}

/// Converts a NUL-padded port name into a string.
#[must_use]
pub fn port_name(name: [u8; 16]) -> String {
    let end = name.iter().position(|byte| *byte == 0).unwrap_or(name.len());
    String::from_utf8_lossy(name.get(..end).unwrap_or_default()).into_owned()
}

/// Decodes the `ofp_match` starting at `offset` and returns the fields with
/// the offset just past its padding.
fn decode_match(payload: &[u8], offset: usize) -> Result<(OxmFields, usize), WireError> {
    let match_len = usize::from(be_u16(payload, offset + 2)?);
    if match_len < MATCH_HEADER_LEN {
        return Err(WireError::Overrun {
            structure: "ofp_match",
            declared: match_len,
            available: payload.len().saturating_sub(offset),
        });
    }
    let fields = range(payload, offset + MATCH_HEADER_LEN, offset + match_len)?;
    Ok((parse_oxm_fields(fields)?, offset + align8(match_len)))
}
