//! Inbound messages handed to handler logic.

use trellis_wire::{DatapathId, Event, Header, MessageType, WireError};

/// One inbound frame together with the identity of the switch that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Switch identity; `None` until the features reply has been read.
    pub datapath_id: Option<DatapathId>,
    /// Type tag from the frame header.
    pub message_type: MessageType,
    /// The whole frame, header included.
    pub payload: Vec<u8>,
}

impl Message {
    /// Wraps a received frame.
    #[must_use]
    pub const fn new(
        datapath_id: Option<DatapathId>,
        message_type: MessageType,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            datapath_id,
            message_type,
            payload,
        }
    }

    /// Transaction id the switch put on the frame.
    #[must_use]
    pub fn xid(&self) -> Option<u32> {
        Header::parse(&self.payload).ok().map(|header| header.xid)
    }

    /// Decodes the payload into a typed event.
    ///
    /// # Errors
    ///
    /// Returns a [`WireError`] when the payload is too short for its type.
    pub fn decode(&self) -> Result<Option<Event>, WireError> {
        Event::decode(self.message_type, &self.payload)
    }
}
