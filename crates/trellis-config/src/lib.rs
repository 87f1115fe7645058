//! Shared configuration for the Trellis controller.
//!
//! Settings are layered by `ortho-config`: built-in defaults, then an optional
//! `trellis.toml`, then `TRELLIS_*` environment variables, then command-line
//! flags. Every field has a default so an empty environment yields a working
//! controller listening on the standard OpenFlow port.

mod defaults;
mod endpoint;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_BUFFER_POOL_CAPACITY, DEFAULT_CONCURRENCY, DEFAULT_INBOUND_CAPACITY,
    DEFAULT_OUTBOUND_CAPACITY, DEFAULT_READ_BUFFER_SIZE, DEFAULT_WRITE_TIMEOUT_MS,
    default_listen_endpoint,
};
pub use endpoint::{DEFAULT_OPENFLOW_PORT, EndpointParseError, ListenEndpoint};
pub use logging::{
    DEFAULT_LOG_FILTER, LogFormat, LogFormatParseError, default_log_filter,
    default_log_filter_string, default_log_format,
};

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "TRELLIS")]
pub struct Config {
    /// Address switch connections are accepted on.
    #[ortho_config(default = default_listen_endpoint())]
    pub listen: ListenEndpoint,
    /// Worker threads per session; values below one are treated as one.
    #[ortho_config(default = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
    /// Socket write deadline in milliseconds; zero disables it.
    #[ortho_config(default = DEFAULT_WRITE_TIMEOUT_MS)]
    pub write_timeout_ms: u64,
    /// Frames buffered between a session's reader and its workers.
    #[ortho_config(default = DEFAULT_INBOUND_CAPACITY)]
    pub inbound_capacity: usize,
    /// Frames buffered ahead of a session's writer.
    #[ortho_config(default = DEFAULT_OUTBOUND_CAPACITY)]
    pub outbound_capacity: usize,
    /// Size of each pooled read buffer.
    #[ortho_config(default = DEFAULT_READ_BUFFER_SIZE)]
    pub read_buffer_size: usize,
    /// Idle read buffers retained by the shared pool.
    #[ortho_config(default = DEFAULT_BUFFER_POOL_CAPACITY)]
    pub buffer_pool_capacity: usize,
    /// `tracing-subscriber` filter directive.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen_endpoint(),
            concurrency: DEFAULT_CONCURRENCY,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            buffer_pool_capacity: DEFAULT_BUFFER_POOL_CAPACITY,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Listen address for switch connections.
    #[must_use]
    pub const fn listen(&self) -> &ListenEndpoint {
        &self.listen
    }

    /// Worker threads per session, never less than one.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Deadline for writing one whole frame, if one is configured.
    #[must_use]
    pub const fn write_timeout(&self) -> Option<Duration> {
        match self.write_timeout_ms {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    /// Inbound queue capacity, never less than one.
    #[must_use]
    pub fn inbound_capacity(&self) -> usize {
        self.inbound_capacity.max(1)
    }

    /// Outbound queue capacity, never less than one.
    #[must_use]
    pub fn outbound_capacity(&self) -> usize {
        self.outbound_capacity.max(1)
    }

    /// Read buffer size in bytes, never smaller than a frame header.
    #[must_use]
    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size.max(defaults::MIN_READ_BUFFER_SIZE)
    }

    /// Idle buffers kept by the shared pool.
    #[must_use]
    pub const fn buffer_pool_capacity(&self) -> usize {
        self.buffer_pool_capacity
    }

    /// Filter directive for the log subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
