//! OpenFlow 1.3 codec boundary for the Trellis controller.
//!
//! The engine in `trellisd` treats protocol messages as opaque byte frames.
//! This crate supplies the small amount of wire knowledge it needs: the fixed
//! frame header, message-type tags, the handshake frames sent on connect, and
//! the accessors that pull a datapath identity or a protocol error out of a
//! payload.
//!
//! Handler logic can additionally decode inbound frames into typed
//! [`Event`]s and build outbound messages through the [`Encode`] trait. All
//! decoding is bounds-checked; a short or malformed payload yields a
//! [`WireError`] instead of a panic.

mod bytes;
mod encode;
mod error;
mod event;
mod handshake;
mod header;
mod oxm;

pub use encode::{
    Action, Encode, FlowMod, Instruction, MultipartRequest, OFP_NO_BUFFER, OFPCML_MAX, PacketOut,
};
pub use error::{ProtocolError, WireError};
pub use event::{
    Event, FlowRemoved, MultipartReply, PacketIn, Port, PortStatus, SwitchFeatures, port_name,
};
pub use handshake::{datapath_id, features_request, hello};
pub use header::{
    DatapathId, HEADER_LEN, Header, MessageType, VERSION, XID_OFFSET, set_message_type, stamp_xid,
};
pub use oxm::{OxmField, OxmFields, parse_oxm_fields};

#[cfg(test)]
mod tests;
