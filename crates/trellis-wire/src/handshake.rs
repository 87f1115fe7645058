//! Frames exchanged while a switch connection is being established.

use crate::bytes::{be_u64, pad_to_8, wire_len};
use crate::error::WireError;
use crate::header::{DatapathId, HEADER_LEN, MessageType, finish_frame, start_frame};

const OFPHET_VERSIONBITMAP: u16 = 1;
const ELEMENT_HEADER_LEN: usize = 4;

/// Builds an `OFPT_HELLO` advertising `versions` through a version-bitmap
/// element.
///
/// The transaction id is left at zero; the session write loop assigns it.
#[must_use]
pub fn hello(versions: &[u8]) -> Vec<u8> {
    let words = versions
        .iter()
        .map(|version| usize::from(*version >> 5) + 1)
        .max()
        .unwrap_or(1);
    let mut bitmap = vec![0_u32; words];
    for version in versions {
        if let Some(word) = bitmap.get_mut(usize::from(*version >> 5)) {
            *word |= 1 << (version & 0x1f);
        }
    }

    let element_len = ELEMENT_HEADER_LEN + words * 4;
    let mut frame = start_frame(MessageType::HELLO, HEADER_LEN + element_len + 8);
    frame.extend_from_slice(&OFPHET_VERSIONBITMAP.to_be_bytes());
    // At most eight words are possible for u8 versions, so this always fits.
    let element_len_field = wire_len(element_len).unwrap_or(u16::MAX);
    frame.extend_from_slice(&element_len_field.to_be_bytes());
    for word in bitmap {
        frame.extend_from_slice(&word.to_be_bytes());
    }
    pad_to_8(&mut frame, HEADER_LEN);
    finish_frame(frame).unwrap_or_default()
}

/// Builds the body-less `OFPT_FEATURES_REQUEST`.
#[must_use]
pub fn features_request() -> Vec<u8> {
    finish_frame(start_frame(MessageType::FEATURES_REQUEST, HEADER_LEN)).unwrap_or_default()
}

/// Extracts the datapath identity from an `OFPT_FEATURES_REPLY` frame.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] when the frame ends before the
/// `datapath_id` field.
pub fn datapath_id(payload: &[u8]) -> Result<DatapathId, WireError> {
    be_u64(payload, HEADER_LEN).map(DatapathId)
}
