use tracing::{debug, info};

use trellis_wire::{DatapathId, FlowRemoved, MultipartReply, PacketIn, PortStatus, SwitchFeatures};

use super::{HANDLER_TARGET, SwitchHandler};
use crate::writer::Writer;

/// [`SwitchHandler`] that logs every event and sends nothing back.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwitchLogger;

impl SwitchHandler for SwitchLogger {
    fn features(&self, _writer: &Writer, features: SwitchFeatures) {
        info!(
            target: HANDLER_TARGET,
            datapath_id = %features.datapath_id,
            n_buffers = features.n_buffers,
            n_tables = features.n_tables,
            auxiliary_id = features.auxiliary_id,
            capabilities = features.capabilities,
            "switch features"
        );
    }

    fn packet_in(&self, _writer: &Writer, datapath_id: Option<DatapathId>, packet: PacketIn) {
        debug!(
            target: HANDLER_TARGET,
            datapath_id = ?datapath_id,
            in_port = ?packet.fields.in_port(),
            reason = packet.reason,
            table_id = packet.table_id,
            total_len = packet.total_len,
            "packet in"
        );
    }

    fn flow_removed(&self, _writer: &Writer, datapath_id: Option<DatapathId>, removed: FlowRemoved) {
        debug!(
            target: HANDLER_TARGET,
            datapath_id = ?datapath_id,
            cookie = removed.cookie,
            reason = removed.reason,
            packet_count = removed.packet_count,
            "flow removed"
        );
    }

    fn multipart_reply(
        &self,
        _writer: &Writer,
        datapath_id: Option<DatapathId>,
        reply: MultipartReply,
    ) {
        debug!(
            target: HANDLER_TARGET,
            datapath_id = ?datapath_id,
            multipart_type = reply.multipart_type,
            body_len = reply.body.len(),
            "multipart reply"
        );
    }

    fn port_status(&self, _writer: &Writer, datapath_id: Option<DatapathId>, status: PortStatus) {
        info!(
            target: HANDLER_TARGET,
            datapath_id = ?datapath_id,
            reason = status.reason,
            port_no = status.port.port_no,
            name = %status.port.name,
            "port status"
        );
    }
}
