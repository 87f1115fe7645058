use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

/// IANA-assigned OpenFlow port, used when the address omits one.
pub const DEFAULT_OPENFLOW_PORT: u16 = 6653;

/// TCP address the controller accepts switch connections on.
///
/// Written as `tcp://host:port` in files, environment variables and flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListenEndpoint {
    host: String,
    port: u16,
}

impl ListenEndpoint {
    /// Builds an endpoint from its parts. Port zero requests an ephemeral port.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or address literal.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Resolves the endpoint to concrete socket addresses.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error when the host cannot be resolved.
    pub fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map(Iterator::collect)
    }
}

impl fmt::Display for ListenEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(formatter, "tcp://[{}]:{}", self.host, self.port)
        } else {
            write!(formatter, "tcp://{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ListenEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        if url.scheme() != "tcp" {
            return Err(EndpointParseError::UnsupportedScheme(
                url.scheme().to_owned(),
            ));
        }
        let host = match url.host() {
            Some(Host::Ipv6(addr)) => addr.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Domain(name)) if !name.is_empty() => name.to_owned(),
            _ => return Err(EndpointParseError::MissingHost(input.to_owned())),
        };
        let port = url.port().unwrap_or(DEFAULT_OPENFLOW_PORT);
        Ok(Self::tcp(host, port))
    }
}

impl TryFrom<String> for ListenEndpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ListenEndpoint> for String {
    fn from(endpoint: ListenEndpoint) -> Self {
        endpoint.to_string()
    }
}

/// Errors encountered while parsing a [`ListenEndpoint`] from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointParseError {
    /// Only `tcp://` addresses can be listened on.
    #[error("unsupported listen scheme '{0}'")]
    UnsupportedScheme(String),
    /// The address named no host.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// The text was not a URL at all.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
