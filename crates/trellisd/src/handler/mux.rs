use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use trellis_wire::DatapathId;

use super::{HANDLER_TARGET, Handler};
use crate::message::Message;
use crate::writer::Writer;

/// Fixed datapath-to-handler table with an optional fallback.
///
/// The table is populated before serving and never changes afterwards.
/// Messages whose identity has no entry, including those from switches that
/// have not identified themselves yet, go to the default handler; without one
/// they are dropped.
#[derive(Default)]
pub struct DatapathMux {
    handlers: HashMap<DatapathId, Arc<dyn Handler>>,
    default: Option<Arc<dyn Handler>>,
}

impl DatapathMux {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes messages from `datapath_id` to `handler`.
    #[must_use]
    pub fn route(mut self, datapath_id: DatapathId, handler: impl Handler) -> Self {
        self.handlers.insert(datapath_id, Arc::new(handler));
        self
    }

    /// Sets the handler for identities without a route.
    #[must_use]
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.default = Some(Arc::new(handler));
        self
    }

    fn resolve(&self, datapath_id: Option<DatapathId>) -> Option<&Arc<dyn Handler>> {
        datapath_id
            .and_then(|id| self.handlers.get(&id))
            .or(self.default.as_ref())
    }
}

impl Handler for DatapathMux {
    fn handle(&self, writer: &Writer, message: Message) {
        match self.resolve(message.datapath_id) {
            Some(handler) => handler.handle(writer, message),
            None => debug!(
                target: HANDLER_TARGET,
                datapath_id = ?message.datapath_id,
                message_type = %message.message_type,
                "no handler for switch; dropping message"
            ),
        }
    }
}

impl fmt::Debug for DatapathMux {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DatapathMux")
            .field("routes", &self.handlers.len())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}
