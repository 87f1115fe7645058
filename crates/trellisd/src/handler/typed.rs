use tracing::{trace, warn};

use trellis_wire::{
    DatapathId, Event, FlowRemoved, MultipartReply, PacketIn, PortStatus, SwitchFeatures,
};

use super::{HANDLER_TARGET, Handler};
use crate::message::Message;
use crate::writer::Writer;

/// Per-event callbacks for switch logic. Every method defaults to a no-op.
pub trait SwitchHandler: Send + Sync + 'static {
    /// The switch described itself.
    fn features(&self, _writer: &Writer, _features: SwitchFeatures) {}

    /// A packet was sent to the controller.
    fn packet_in(&self, _writer: &Writer, _datapath_id: Option<DatapathId>, _packet: PacketIn) {
    }

    /// A flow entry expired or was deleted.
    fn flow_removed(
        &self,
        _writer: &Writer,
        _datapath_id: Option<DatapathId>,
        _removed: FlowRemoved,
    ) {
    }

    /// A statistics or description reply arrived.
    fn multipart_reply(
        &self,
        _writer: &Writer,
        _datapath_id: Option<DatapathId>,
        _reply: MultipartReply,
    ) {
    }

    /// A port was added, removed or changed.
    fn port_status(&self, _writer: &Writer, _datapath_id: Option<DatapathId>, _status: PortStatus) {
    }
}

/// Adapter decoding each message into an [`Event`] before calling the
/// matching [`SwitchHandler`] method.
///
/// Messages without a typed view are dropped, as are payloads that fail to
/// decode.
#[derive(Debug, Default)]
pub struct Typed<H> {
    inner: H,
}

impl<H> Typed<H> {
    /// Wraps `inner`.
    pub const fn new(inner: H) -> Self {
        Self { inner }
    }

    /// The wrapped handler.
    pub const fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H> Handler for Typed<H>
where
    H: SwitchHandler,
{
    fn handle(&self, writer: &Writer, message: Message) {
        let datapath_id = message.datapath_id;
        let event = match message.decode() {
            Ok(Some(event)) => event,
            Ok(None) => {
                trace!(
                    target: HANDLER_TARGET,
                    message_type = %message.message_type,
                    "dropping message without a typed view"
                );
                return;
            }
            Err(error) => {
                warn!(
                    target: HANDLER_TARGET,
                    message_type = %message.message_type,
                    datapath_id = ?datapath_id,
                    error = %error,
                    "dropping undecodable message"
                );
                return;
            }
        };
        match event {
            Event::Features(features) => self.inner.features(writer, features),
            Event::PacketIn(packet) => self.inner.packet_in(writer, datapath_id, packet),
            Event::FlowRemoved(removed) => self.inner.flow_removed(writer, datapath_id, removed),
            Event::MultipartReply(reply) => self.inner.multipart_reply(writer, datapath_id, reply),
            Event::PortStatus(status) => self.inner.port_status(writer, datapath_id, status),
        }
    }
}
