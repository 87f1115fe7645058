//! Routing of inbound messages to application logic.
//!
//! Every strategy implements [`Handler`], so they compose: a
//! [`DatapathMux`] can hold [`Typed`] adapters, a [`LazyRegistry`] can build
//! closures from [`handler_fn`], and any of them can be handed to the
//! controller directly.

mod logging;
mod mux;
mod registry;
mod typed;

use std::fmt;
use std::sync::Arc;

pub use self::logging::SwitchLogger;
pub use self::mux::DatapathMux;
pub use self::registry::LazyRegistry;
pub use self::typed::{SwitchHandler, Typed};

use crate::message::Message;
use crate::writer::Writer;

const HANDLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handler");

/// Application logic invoked once per inbound message.
///
/// Implementations run on session worker threads. With more than one worker
/// per session they may be called concurrently.
pub trait Handler: Send + Sync + 'static {
    /// Handles one message; replies go through `writer`.
    fn handle(&self, writer: &Writer, message: Message);
}

impl<T> Handler for Arc<T>
where
    T: Handler + ?Sized,
{
    fn handle(&self, writer: &Writer, message: Message) {
        (**self).handle(writer, message);
    }
}

impl Handler for Box<dyn Handler> {
    fn handle(&self, writer: &Writer, message: Message) {
        (**self).handle(writer, message);
    }
}

/// [`Handler`] backed by a closure. Built with [`handler_fn`].
pub struct FnHandler<F> {
    function: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Writer, Message) + Send + Sync + 'static,
{
    fn handle(&self, writer: &Writer, message: Message) {
        (self.function)(writer, message);
    }
}

/// Wraps a closure as a [`Handler`].
pub const fn handler_fn<F>(function: F) -> FnHandler<F>
where
    F: Fn(&Writer, Message) + Send + Sync + 'static,
{
    FnHandler { function }
}
