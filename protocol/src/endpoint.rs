//! # Endpoint Identity
//!
//! A process in the overlay is identified by the `(host, port)` pair it
//! listens on — nothing more. No keys, no node IDs, no certificates: the
//! listening address is the identity, for seeds and peers alike. Two
//! processes on the same host are two different endpoints; the same process
//! restarted on the same port is the same endpoint as far as the directory
//! is concerned.
//!
//! On the wire an endpoint appears inside payloads as a two-element JSON
//! array `[host, port]`. On the command line and in the seed config file it
//! is written `HOST:PORT`.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A network endpoint: the listening address that doubles as a node's
/// stable identity.
///
/// `Ord` is derived so endpoints can live in sorted collections, but
/// nothing in the protocol may *rank* candidates by identity — neighbor
/// selection depends on discovery order staying uncoordinated across
/// nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, u16)", into = "(String, u16)")]
pub struct Endpoint {
    /// Host name or IP literal.
    pub host: String,
    /// TCP listening port.
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint from a host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The `(host, port)` pair in the form `ToSocketAddrs` accepts, so the
    /// transport can dial host names as well as IP literals.
    pub fn as_dial_pair(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl From<(String, u16)> for Endpoint {
    fn from((host, port): (String, u16)) -> Self {
        Self { host, port }
    }
}

impl From<Endpoint> for (String, u16) {
    fn from(e: Endpoint) -> Self {
        (e.host, e.port)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

/// Errors from parsing a `HOST:PORT` string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EndpointError {
    /// No colon separator found.
    #[error("endpoint must be HOST:PORT, got {0:?}")]
    MissingPort(String),
    /// The part after the last colon is not a valid port number.
    #[error("invalid port in endpoint {0:?}")]
    InvalidPort(String),
    /// The host part is empty.
    #[error("empty host in endpoint {0:?}")]
    EmptyHost(String),
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    /// Parses `HOST:PORT`. The split is on the *last* colon so that the
    /// port survives even if someone feeds us something exotic for a host.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointError::MissingPort(s.to_string()))?;

        if host.is_empty() {
            return Err(EndpointError::EmptyHost(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| EndpointError::InvalidPort(s.to_string()))?;

        Ok(Self::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_port() {
        let e: Endpoint = "127.0.0.1:6001".parse().unwrap();
        assert_eq!(e, Endpoint::new("127.0.0.1", 6001));
    }

    #[test]
    fn rejects_malformed_strings() {
        assert_eq!(
            "6001".parse::<Endpoint>(),
            Err(EndpointError::MissingPort("6001".into()))
        );
        assert_eq!(
            "127.0.0.1:notaport".parse::<Endpoint>(),
            Err(EndpointError::InvalidPort("127.0.0.1:notaport".into()))
        );
        assert_eq!(
            ":6001".parse::<Endpoint>(),
            Err(EndpointError::EmptyHost(":6001".into()))
        );
        // Port 70000 does not fit in u16.
        assert!("127.0.0.1:70000".parse::<Endpoint>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let e = Endpoint::new("localhost", 7042);
        let back: Endpoint = e.to_string().parse().unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn serializes_as_two_element_array() {
        let e = Endpoint::new("127.0.0.1", 7001);
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"["127.0.0.1",7001]"#);

        let back: Endpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn converts_from_socket_addr() {
        let addr: SocketAddr = "10.0.0.2:9000".parse().unwrap();
        assert_eq!(Endpoint::from(addr), Endpoint::new("10.0.0.2", 9000));
    }
}
