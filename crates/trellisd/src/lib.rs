//! OpenFlow 1.3 controller engine.
//!
//! `trellisd` accepts switch connections and runs each as a [`Session`]: the
//! session greets the switch, reads frames off the socket, answers
//! keepalives itself, and hands every other message to a [`Handler`] on a
//! bounded pool of worker threads. Handlers reply through a [`Writer`],
//! which queues frames for the session's single writer thread; that thread
//! stamps transaction ids in write order, so ids on a connection are unique
//! and increasing without any coordination between workers.
//!
//! Handlers compose. [`Typed`] decodes messages for a [`SwitchHandler`],
//! [`LazyRegistry`] keeps one handler per switch built on first contact, and
//! [`DatapathMux`] routes by switch identity with a fallback.
//!
//! The [`Controller`] ties a handler to the acceptor, and
//! [`run_controller`] adds configuration, telemetry and signal handling for
//! the `trellisd` binary.

mod bootstrap;
mod buffer_pool;
mod controller;
mod handler;
mod health;
mod message;
mod process;
mod session;
pub mod telemetry;
mod transport;
mod writer;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use buffer_pool::{PooledBuffer, ReadBufferPool};
pub use controller::Controller;
pub use handler::{
    DatapathMux, FnHandler, Handler, LazyRegistry, SwitchHandler, SwitchLogger, Typed, handler_fn,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use message::Message;
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_controller,
    run_controller_with,
};
pub use session::{Session, SessionError, SessionOptions, SessionReport};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{ConnectionHandler, ListenerError, ListenerHandle, SocketListener};
pub use writer::{Writer, WriterError};

#[cfg(test)]
mod tests;
