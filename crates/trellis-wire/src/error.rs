//! Error types for frame decoding and peer-reported protocol errors.

use std::fmt;

use thiserror::Error;

use crate::bytes::{be_u16, tail};
use crate::header::HEADER_LEN;

/// Errors raised while decoding or encoding wire frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The input ended before a fixed-size field could be read.
    #[error("frame truncated: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes required to read the field.
        needed: usize,
        /// Bytes actually present.
        available: usize,
    },
    /// The header declared a total length smaller than the header itself.
    #[error("declared frame length {declared} is shorter than the 8-byte header")]
    LengthTooShort {
        /// Length carried in the header.
        declared: u16,
    },
    /// An encoded frame would not fit the 16-bit length field.
    #[error("encoded frame of {len} bytes exceeds the 65535-byte limit")]
    TooLarge {
        /// Length the encoder attempted to produce.
        len: usize,
    },
    /// A TLV structure declared a length that overruns its container.
    #[error("{structure} length {declared} overruns the enclosing {available} bytes")]
    Overrun {
        /// Name of the structure being decoded.
        structure: &'static str,
        /// Length declared by the structure.
        declared: usize,
        /// Bytes available in the container.
        available: usize,
    },
}

/// An `OFPT_ERROR` message reported by a switch.
///
/// The engine treats receipt of this message as fatal to the session and
/// stores it as the session's terminal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    /// `ofp_error_type` value.
    pub error_type: u16,
    /// Type-specific error code.
    pub code: u16,
    /// Leading bytes of the offending request, as echoed by the switch.
    pub data: Vec<u8>,
}

impl ProtocolError {
    /// Decodes the body of an `OFPT_ERROR` frame (header included).
    pub fn parse(payload: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            error_type: be_u16(payload, HEADER_LEN)?,
            code: be_u16(payload, HEADER_LEN + 2)?,
            data: tail(payload, HEADER_LEN + 4)?.to_vec(),
        })
    }

    /// Symbolic name of the error type when it is a standard OpenFlow 1.3 one.
    #[must_use]
    pub fn type_name(&self) -> Option<&'static str> {
        let name = match self.error_type {
            0 => "hello_failed",
            1 => "bad_request",
            2 => "bad_action",
            3 => "bad_instruction",
            4 => "bad_match",
            5 => "flow_mod_failed",
            6 => "group_mod_failed",
            7 => "port_mod_failed",
            8 => "table_mod_failed",
            9 => "queue_op_failed",
            10 => "switch_config_failed",
            11 => "role_request_failed",
            12 => "meter_mod_failed",
            13 => "table_features_failed",
            0xffff => "experimenter",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_name() {
            Some(name) => write!(
                formatter,
                "switch reported error {name} (type {}, code {})",
                self.error_type, self.code
            ),
            None => write!(
                formatter,
                "switch reported error type {}, code {}",
                self.error_type, self.code
            ),
        }
    }
}

impl std::error::Error for ProtocolError {}
