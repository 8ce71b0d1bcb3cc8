//! Transport layer for grpcli.
//!
//! Resolves transport credentials ([`TlsSettings`] → [`Credentials`]) and
//! dials a server ([`dial`]) from an ordered [`DialOptions`] set, producing a
//! [`Connection`] that generated client stubs call through.

mod dial;
mod error;
mod options;
mod tls;

pub use dial::dial;
pub use error::TransportError;
pub use options::{DialOption, DialOptions};
pub use tls::{Credentials, TlsCredentials, TlsSettings};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::transport::Channel;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A live client connection to one server.
///
/// Clones share the same underlying connection. [`close`](Self::close) tears
/// it down for every clone at once.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    target: Arc<str>,
    channel: Channel,
    closed: CancellationToken,
    close_once: Arc<AtomicBool>,
    metadata: MetadataMap,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The `host:port` this connection was dialed to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The channel to hand to a generated client, e.g.
    /// `GreeterClient::new(conn.channel())`.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Metadata attached to every request built with [`request`](Self::request).
    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    /// Replaces the outgoing metadata.
    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.metadata = metadata;
        self
    }

    /// Wraps `message` in a request carrying this connection's metadata.
    pub fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        *request.metadata_mut() = self.metadata.clone();
        request
    }

    /// Closes the connection.
    ///
    /// Returns `true` for the call that actually closed it and `false` if it
    /// was already closed.
    pub fn close(&self) -> bool {
        if self.close_once.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.closed.cancel();
        tracing::info!(id = %self.id, addr = &*self.target, "connection closed");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
