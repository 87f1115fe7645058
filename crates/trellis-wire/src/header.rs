//! The fixed OpenFlow frame header and message-type tags.

use std::fmt;

use crate::bytes::{be_u8, be_u16, be_u32};
use crate::error::WireError;

/// Length of the fixed frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Protocol version spoken by the controller (OpenFlow 1.3).
pub const VERSION: u8 = 0x04;

/// Offset of the big-endian transaction id inside the header.
pub const XID_OFFSET: usize = 4;

const TYPE_OFFSET: usize = 1;

/// 8-bit message-type tag carried in every frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageType(pub u8);

impl MessageType {
    /// `OFPT_HELLO`.
    pub const HELLO: Self = Self(0);
    /// `OFPT_ERROR`.
    pub const ERROR: Self = Self(1);
    /// `OFPT_ECHO_REQUEST`.
    pub const ECHO_REQUEST: Self = Self(2);
    /// `OFPT_ECHO_REPLY`.
    pub const ECHO_REPLY: Self = Self(3);
    /// `OFPT_EXPERIMENTER`.
    pub const EXPERIMENTER: Self = Self(4);
    /// `OFPT_FEATURES_REQUEST`.
    pub const FEATURES_REQUEST: Self = Self(5);
    /// `OFPT_FEATURES_REPLY`.
    pub const FEATURES_REPLY: Self = Self(6);
    /// `OFPT_GET_CONFIG_REQUEST`.
    pub const GET_CONFIG_REQUEST: Self = Self(7);
    /// `OFPT_GET_CONFIG_REPLY`.
    pub const GET_CONFIG_REPLY: Self = Self(8);
    /// `OFPT_SET_CONFIG`.
    pub const SET_CONFIG: Self = Self(9);
    /// `OFPT_PACKET_IN`.
    pub const PACKET_IN: Self = Self(10);
    /// `OFPT_FLOW_REMOVED`.
    pub const FLOW_REMOVED: Self = Self(11);
    /// `OFPT_PORT_STATUS`.
    pub const PORT_STATUS: Self = Self(12);
    /// `OFPT_PACKET_OUT`.
    pub const PACKET_OUT: Self = Self(13);
    /// `OFPT_FLOW_MOD`.
    pub const FLOW_MOD: Self = Self(14);
    /// `OFPT_GROUP_MOD`.
    pub const GROUP_MOD: Self = Self(15);
    /// `OFPT_PORT_MOD`.
    pub const PORT_MOD: Self = Self(16);
    /// `OFPT_TABLE_MOD`.
    pub const TABLE_MOD: Self = Self(17);
    /// `OFPT_MULTIPART_REQUEST`.
    pub const MULTIPART_REQUEST: Self = Self(18);
    /// `OFPT_MULTIPART_REPLY`.
    pub const MULTIPART_REPLY: Self = Self(19);
    /// `OFPT_BARRIER_REQUEST`.
    pub const BARRIER_REQUEST: Self = Self(20);
    /// `OFPT_BARRIER_REPLY`.
    pub const BARRIER_REPLY: Self = Self(21);
    /// `OFPT_QUEUE_GET_CONFIG_REQUEST`.
    pub const QUEUE_GET_CONFIG_REQUEST: Self = Self(22);
    /// `OFPT_QUEUE_GET_CONFIG_REPLY`.
    pub const QUEUE_GET_CONFIG_REPLY: Self = Self(23);
    /// `OFPT_ROLE_REQUEST`.
    pub const ROLE_REQUEST: Self = Self(24);
    /// `OFPT_ROLE_REPLY`.
    pub const ROLE_REPLY: Self = Self(25);
    /// `OFPT_GET_ASYNC_REQUEST`.
    pub const GET_ASYNC_REQUEST: Self = Self(26);
    /// `OFPT_GET_ASYNC_REPLY`.
    pub const GET_ASYNC_REPLY: Self = Self(27);
    /// `OFPT_SET_ASYNC`.
    pub const SET_ASYNC: Self = Self(28);
    /// `OFPT_METER_MOD`.
    pub const METER_MOD: Self = Self(29);

    /// Returns the canonical lower-case name for known tags.
    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        const NAMES: [&str; 30] = [
            "hello",
            "error",
            "echo_request",
            "echo_reply",
            "experimenter",
            "features_request",
            "features_reply",
            "get_config_request",
            "get_config_reply",
            "set_config",
            "packet_in",
            "flow_removed",
            "port_status",
            "packet_out",
            "flow_mod",
            "group_mod",
            "port_mod",
            "table_mod",
            "multipart_request",
            "multipart_reply",
            "barrier_request",
            "barrier_reply",
            "queue_get_config_request",
            "queue_get_config_reply",
            "role_request",
            "role_reply",
            "get_async_request",
            "get_async_reply",
            "set_async",
            "meter_mod",
        ];
        NAMES.get(usize::from(self.0)).copied()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => formatter.write_str(name),
            None => write!(formatter, "unknown({})", self.0),
        }
    }
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// 64-bit switch identity learned from the features reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatapathId(pub u64);

impl fmt::Display for DatapathId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:016x}", self.0)
    }
}

impl From<u64> for DatapathId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Decoded fixed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Wire protocol version.
    pub version: u8,
    /// Message-type tag.
    pub message_type: MessageType,
    /// Total frame length, header included.
    pub length: u16,
    /// Transaction id.
    pub xid: u32,
}

impl Header {
    /// Parses the first [`HEADER_LEN`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] when fewer than eight bytes are
    /// supplied and [`WireError::LengthTooShort`] when the declared length
    /// cannot even cover the header.
    pub fn parse(bytes: &[u8]) -> Result<Self, WireError> {
        let header = Self {
            version: be_u8(bytes, 0)?,
            message_type: MessageType(be_u8(bytes, TYPE_OFFSET)?),
            length: be_u16(bytes, 2)?,
            xid: be_u32(bytes, XID_OFFSET)?,
        };
        if usize::from(header.length) < HEADER_LEN {
            return Err(WireError::LengthTooShort {
                declared: header.length,
            });
        }
        Ok(header)
    }

    /// Total frame length as a `usize`.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        usize::from(self.length)
    }
}

/// Overwrites the transaction id of an encoded frame.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] when the frame is shorter than a header.
pub fn stamp_xid(frame: &mut [u8], xid: u32) -> Result<(), WireError> {
    let available = frame.len();
    let field = frame
        .get_mut(XID_OFFSET..HEADER_LEN)
        .ok_or(WireError::Truncated {
            needed: HEADER_LEN,
            available,
        })?;
    field.copy_from_slice(&xid.to_be_bytes());
    Ok(())
}

/// Rewrites the message-type tag of an encoded frame in place.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] when the frame has no type byte.
pub fn set_message_type(frame: &mut [u8], message_type: MessageType) -> Result<(), WireError> {
    let available = frame.len();
    let tag = frame.get_mut(TYPE_OFFSET).ok_or(WireError::Truncated {
        needed: TYPE_OFFSET + 1,
        available,
    })?;
    *tag = message_type.0;
    Ok(())
}

/// Starts a frame with a header whose length and xid are zero.
pub(crate) fn start_frame(message_type: MessageType, capacity: usize) -> Vec<u8> {
    let mut frame = Vec::with_capacity(capacity.max(HEADER_LEN));
    frame.extend_from_slice(&[VERSION, message_type.0, 0, 0, 0, 0, 0, 0]);
    frame
}

/// Patches the length field once the body has been appended.
pub(crate) fn finish_frame(mut frame: Vec<u8>) -> Result<Vec<u8>, WireError> {
    let len = crate::bytes::wire_len(frame.len())?;
    if let Some(field) = frame.get_mut(2..4) {
        field.copy_from_slice(&len.to_be_bytes());
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(MessageType::HELLO, Some("hello"))]
    #[case(MessageType::PACKET_IN, Some("packet_in"))]
    #[case(MessageType::METER_MOD, Some("meter_mod"))]
    #[case(MessageType(30), None)]
    #[case(MessageType(u8::MAX), None)]
    fn names_cover_known_tags_only(#[case] tag: MessageType, #[case] expected: Option<&str>) {
        assert_eq!(tag.name(), expected);
    }

    #[rstest]
    fn unknown_tags_display_their_number() {
        assert_eq!(MessageType(200).to_string(), "unknown(200)");
    }
}
