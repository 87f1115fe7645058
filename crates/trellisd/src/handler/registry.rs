use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use trellis_wire::DatapathId;

use super::{HANDLER_TARGET, Handler};
use crate::message::Message;
use crate::writer::Writer;

/// One handler per switch, built by `factory` on the first message from an
/// unseen datapath.
///
/// The lock covers only the lookup-or-create step, so concurrent first
/// messages from one switch build exactly one handler while dispatch itself
/// runs unlocked. Entries outlive connections: a switch that reconnects gets
/// its previous handler back. Messages sent before the switch identified
/// itself are dropped.
pub struct LazyRegistry<H, F> {
    factory: F,
    handlers: Mutex<HashMap<DatapathId, Arc<H>>>,
}

impl<H, F> LazyRegistry<H, F>
where
    H: Handler,
    F: Fn(DatapathId) -> H + Send + Sync + 'static,
{
    /// Creates an empty registry.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the handler for `datapath_id`, building it if needed.
    pub fn handler_for(&self, datapath_id: DatapathId) -> Arc<H> {
        let mut handlers = self.lock();
        let handler = handlers.entry(datapath_id).or_insert_with(|| {
            info!(
                target: HANDLER_TARGET,
                datapath_id = %datapath_id,
                "instantiating switch handler"
            );
            Arc::new((self.factory)(datapath_id))
        });
        Arc::clone(handler)
    }

    /// Handler already built for `datapath_id`, if any.
    pub fn get(&self, datapath_id: DatapathId) -> Option<Arc<H>> {
        self.lock().get(&datapath_id).map(Arc::clone)
    }

    /// Number of switches with a handler.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no handler has been built yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DatapathId, Arc<H>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H, F> Handler for LazyRegistry<H, F>
where
    H: Handler,
    F: Fn(DatapathId) -> H + Send + Sync + 'static,
{
    fn handle(&self, writer: &Writer, message: Message) {
        let Some(datapath_id) = message.datapath_id else {
            debug!(
                target: HANDLER_TARGET,
                message_type = %message.message_type,
                "dropping message from unidentified switch"
            );
            return;
        };
        let handler = self.handler_for(datapath_id);
        handler.handle(writer, message);
    }
}

impl<H, F> fmt::Debug for LazyRegistry<H, F> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .handlers
            .lock()
            .map_or_else(|poisoned| poisoned.into_inner().len(), |handlers| handlers.len());
        formatter
            .debug_struct("LazyRegistry")
            .field("handlers", &len)
            .finish_non_exhaustive()
    }
}
