//! Outbound controller-to-switch messages.

use crate::bytes::{pad_to_8, wire_len};
use crate::error::WireError;
use crate::header::{HEADER_LEN, MessageType, finish_frame, start_frame};
use crate::oxm::OxmField;

/// Buffer id meaning "the packet is not buffered on the switch".
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Output `max_len` asking the switch to send the whole packet.
pub const OFPCML_MAX: u16 = 0xffe5;

const OFPAT_OUTPUT: u16 = 0;
const OFPAT_SET_FIELD: u16 = 25;
const OFPIT_GOTO_TABLE: u16 = 1;
const OFPIT_APPLY_ACTIONS: u16 = 4;
const OFPMT_OXM: u16 = 1;

/// Anything that can encode itself into a complete frame.
///
/// Encoders leave the transaction id at zero; the session assigns it when
/// the frame is written.
pub trait Encode {
    /// Encodes the message, header included.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::TooLarge`] when the frame would not fit the
    /// 16-bit length field.
    fn encode(&self) -> Result<Vec<u8>, WireError>;
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self) -> Result<Vec<u8>, WireError> {
        (**self).encode()
    }
}

/// Action applied to a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Forward to a port.
    Output {
        /// Output port.
        port: u32,
        /// Bytes to send to the controller; zero means [`OFPCML_MAX`].
        max_len: u16,
    },
    /// Rewrite a header field.
    SetField(OxmField),
}

impl Action {
    /// Forward to `port` with the default `max_len`.
    #[must_use]
    pub const fn output(port: u32) -> Self {
        Self::Output { port, max_len: 0 }
    }

    fn encode_into(&self, buffer: &mut Vec<u8>) {
        let start = buffer.len();
        match self {
            Self::Output { port, max_len } => {
                let max_len = if *max_len == 0 { OFPCML_MAX } else { *max_len };
                buffer.extend_from_slice(&OFPAT_OUTPUT.to_be_bytes());
                buffer.extend_from_slice(&16_u16.to_be_bytes());
                buffer.extend_from_slice(&port.to_be_bytes());
                buffer.extend_from_slice(&max_len.to_be_bytes());
                buffer.extend_from_slice(&[0; 6]);
            }
            Self::SetField(field) => {
                buffer.extend_from_slice(&OFPAT_SET_FIELD.to_be_bytes());
                buffer.extend_from_slice(&[0, 0]);
                field.encode_into(buffer);
                pad_to_8(buffer, start);
                patch_len(buffer, start);
            }
        }
    }
}

/// Flow-table instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Continue processing in another table.
    GotoTable(u8),
    /// Apply actions immediately.
    ApplyActions(Vec<Action>),
}

impl Instruction {
    fn encode_into(&self, buffer: &mut Vec<u8>) {
        let start = buffer.len();
        match self {
            Self::GotoTable(table_id) => {
                buffer.extend_from_slice(&OFPIT_GOTO_TABLE.to_be_bytes());
                buffer.extend_from_slice(&8_u16.to_be_bytes());
                buffer.extend_from_slice(&[*table_id, 0, 0, 0]);
            }
            Self::ApplyActions(actions) => {
                buffer.extend_from_slice(&OFPIT_APPLY_ACTIONS.to_be_bytes());
                buffer.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
                for action in actions {
                    action.encode_into(buffer);
                }
                patch_len(buffer, start);
            }
        }
    }
}

/// Writes the TLV length of the structure that starts at `start`.
fn patch_len(buffer: &mut [u8], start: usize) {
    let len = u16::try_from(buffer.len().saturating_sub(start)).unwrap_or(u16::MAX);
    if let Some(field) = buffer.get_mut(start + 2..start + 4) {
        field.copy_from_slice(&len.to_be_bytes());
    }
}

fn encode_match(fields: &[OxmField], buffer: &mut Vec<u8>) {
    let start = buffer.len();
    buffer.extend_from_slice(&OFPMT_OXM.to_be_bytes());
    buffer.extend_from_slice(&[0, 0]);
    for field in fields {
        field.encode_into(buffer);
    }
    // The match length excludes trailing padding.
    patch_len(buffer, start);
    pad_to_8(buffer, start);
}

/// `OFPT_FLOW_MOD`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowMod {
    /// Opaque controller-issued identifier.
    pub cookie: u64,
    /// Mask restricting cookie matches for modify/delete.
    pub cookie_mask: u64,
    /// Target table.
    pub table_id: u8,
    /// `ofp_flow_mod_command`.
    pub command: u8,
    /// Idle timeout in seconds.
    pub idle_timeout: u16,
    /// Hard timeout in seconds.
    pub hard_timeout: u16,
    /// Entry priority.
    pub priority: u16,
    /// Buffered packet to apply to; zero means [`OFP_NO_BUFFER`].
    pub buffer_id: u32,
    /// Output port filter for delete commands.
    pub out_port: u32,
    /// Output group filter for delete commands.
    pub out_group: u32,
    /// `ofp_flow_mod_flags`.
    pub flags: u16,
    /// Match fields.
    pub matches: Vec<OxmField>,
    /// Instructions for matching packets.
    pub instructions: Vec<Instruction>,
}

impl FlowMod {
    /// Add a new flow entry.
    pub const ADD: u8 = 0;
    /// Modify all matching entries.
    pub const MODIFY: u8 = 1;
    /// Delete all matching entries.
    pub const DELETE: u8 = 3;
}

impl Encode for FlowMod {
    fn encode(&self) -> Result<Vec<u8>, WireError> {
        let buffer_id = if self.buffer_id == 0 {
            OFP_NO_BUFFER
        } else {
            self.buffer_id
        };
        let mut frame = start_frame(MessageType::FLOW_MOD, HEADER_LEN + 40 + 64);
        frame.extend_from_slice(&self.cookie.to_be_bytes());
        frame.extend_from_slice(&self.cookie_mask.to_be_bytes());
        frame.push(self.table_id);
        frame.push(self.command);
        frame.extend_from_slice(&self.idle_timeout.to_be_bytes());
        frame.extend_from_slice(&self.hard_timeout.to_be_bytes());
        frame.extend_from_slice(&self.priority.to_be_bytes());
        frame.extend_from_slice(&buffer_id.to_be_bytes());
        frame.extend_from_slice(&self.out_port.to_be_bytes());
        frame.extend_from_slice(&self.out_group.to_be_bytes());
        frame.extend_from_slice(&self.flags.to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        encode_match(&self.matches, &mut frame);
        for instruction in &self.instructions {
            instruction.encode_into(&mut frame);
        }
        finish_frame(frame)
    }
}

/// `OFPT_PACKET_OUT`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketOut {
    /// Buffered packet to send, or [`OFP_NO_BUFFER`] with `data`.
    pub buffer_id: u32,
    /// Port the packet is treated as arriving on.
    pub in_port: u32,
    /// Actions applied before output.
    pub actions: Vec<Action>,
    /// Packet bytes when not buffered.
    pub data: Vec<u8>,
}

impl Encode for PacketOut {
    fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut actions = Vec::new();
        for action in &self.actions {
            action.encode_into(&mut actions);
        }
        let mut frame = start_frame(
            MessageType::PACKET_OUT,
            HEADER_LEN + 16 + actions.len() + self.data.len(),
        );
        frame.extend_from_slice(&self.buffer_id.to_be_bytes());
        frame.extend_from_slice(&self.in_port.to_be_bytes());
        frame.extend_from_slice(&wire_len(actions.len())?.to_be_bytes());
        frame.extend_from_slice(&[0; 6]);
        frame.extend_from_slice(&actions);
        frame.extend_from_slice(&self.data);
        finish_frame(frame)
    }
}

/// `OFPT_MULTIPART_REQUEST`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartRequest {
    /// `ofp_multipart_type`.
    pub multipart_type: u16,
    /// `OFPMPF_REQ_*` flags.
    pub flags: u16,
    /// Type-specific body.
    pub body: Vec<u8>,
}

impl MultipartRequest {
    /// Switch description (`OFPMP_DESC`).
    pub const DESC: u16 = 0;
    /// Individual flow statistics (`OFPMP_FLOW`).
    pub const FLOW: u16 = 1;
    /// Port statistics (`OFPMP_PORT_STATS`).
    pub const PORT_STATS: u16 = 4;
    /// Port descriptions (`OFPMP_PORT_DESC`).
    pub const PORT_DESC: u16 = 13;
}

impl Encode for MultipartRequest {
    fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut frame = start_frame(
            MessageType::MULTIPART_REQUEST,
            HEADER_LEN + 8 + self.body.len(),
        );
        frame.extend_from_slice(&self.multipart_type.to_be_bytes());
        frame.extend_from_slice(&self.flags.to_be_bytes());
        frame.extend_from_slice(&[0; 4]);
        frame.extend_from_slice(&self.body);
        finish_frame(frame)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::header::Header;

    #[rstest]
    fn output_action_defaults_max_len() {
        let mut bytes = Vec::new();
        Action::output(1).encode_into(&mut bytes);
        assert_eq!(
            bytes,
            vec![0, 0, 0, 16, 0, 0, 0, 1, 0xff, 0xe5, 0, 0, 0, 0, 0, 0]
        );
    }

    #[rstest]
    fn set_field_is_eight_byte_aligned() {
        let mut bytes = Vec::new();
        Action::SetField(OxmField::EthDst([1, 2, 3, 4, 5, 6])).encode_into(&mut bytes);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes.get(2..4), Some(&[0, 16][..]));
        assert_eq!(bytes.get(4..8), Some(&[0x80, 0x00, 0x06, 0x06][..]));
    }

    #[rstest]
    fn apply_actions_wraps_its_actions() {
        let mut bytes = Vec::new();
        Instruction::ApplyActions(vec![Action::output(2)]).encode_into(&mut bytes);
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes.get(..4), Some(&[0, 4, 0, 24][..]));
    }

    #[rstest]
    fn flow_mod_lays_out_match_and_instructions() {
        let flow_mod = FlowMod {
            priority: 10,
            matches: vec![OxmField::InPort(1)],
            instructions: vec![Instruction::GotoTable(1)],
            ..FlowMod::default()
        };
        let frame = flow_mod.encode().expect("flow mod encodes");
        let header = Header::parse(&frame).expect("header");
        assert_eq!(header.message_type, MessageType::FLOW_MOD);
        assert_eq!(header.xid, 0);
        // header + fixed body + 16-byte match + 8-byte goto-table
        assert_eq!(header.frame_len(), 8 + 40 + 16 + 8);
        assert_eq!(frame.len(), header.frame_len());
        assert_eq!(frame.get(32..36), Some(&[0xff; 4][..]), "no-buffer default");
        assert_eq!(frame.get(48..52), Some(&[0, 1, 0, 12][..]), "match header");
    }

    #[rstest]
    fn packet_out_records_actions_length() {
        let packet_out = PacketOut {
            buffer_id: OFP_NO_BUFFER,
            in_port: 3,
            actions: vec![Action::output(4)],
            data: vec![1, 2, 3],
        };
        let frame = packet_out.encode().expect("packet out encodes");
        assert_eq!(frame.len(), 8 + 16 + 16 + 3);
        assert_eq!(frame.get(16..18), Some(&[0, 16][..]));
        assert_eq!(frame.get(40..), Some(&[1, 2, 3][..]));
    }

    #[rstest]
    fn multipart_request_pads_before_body() {
        let request = MultipartRequest {
            multipart_type: MultipartRequest::PORT_DESC,
            flags: 0,
            body: Vec::new(),
        };
        assert_eq!(
            request.encode(),
            Ok(vec![0x04, 18, 0, 16, 0, 0, 0, 0, 0, 13, 0, 0, 0, 0, 0, 0])
        );
    }

    #[rstest]
    fn oversized_packet_out_is_rejected() {
        let packet_out = PacketOut {
            data: vec![0; 70_000],
            ..PacketOut::default()
        };
        assert!(matches!(
            packet_out.encode(),
            Err(WireError::TooLarge { .. })
        ));
    }
}
