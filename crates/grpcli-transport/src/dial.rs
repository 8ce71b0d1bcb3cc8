//! Dialing: builds a `tonic` channel over a socket this crate controls.
//!
//! The channel is connected through a custom connector instead of tonic's
//! built-in one so that TLS can be configured with rustls directly and so
//! that closing a [`Connection`] reaches the socket itself.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tonic::transport::{Endpoint, Uri};

use crate::options::ResolvedOptions;
use crate::{Connection, ConnectionId, Credentials, DialOptions, TlsCredentials, TransportError};

/// Dials `target` (`host:port`) with the given options.
///
/// With [`DialOption::Block`](crate::DialOption::Block) this waits until the
/// connection (and TLS handshake, if any) is established; without it the
/// channel connects on first use. This function applies no deadline of its
/// own: wrap the future to bound it.
///
/// # Errors
/// `InvalidTarget` if the address cannot form an endpoint, `Dial` if the
/// connection cannot be established.
pub async fn dial(target: &str, options: DialOptions) -> Result<Connection, TransportError> {
    let options = options.resolve();
    let endpoint = endpoint(target, &options)?;

    let id = ConnectionId::next();
    let closed = CancellationToken::new();
    let connector = {
        let target: Arc<str> = Arc::from(target);
        let tls = match &options.credentials {
            Credentials::Insecure => None,
            Credentials::Tls(tls) => Some(tls.clone()),
        };
        let (connect_timeout, nodelay) = (options.connect_timeout, options.tcp_nodelay);
        let closed = closed.clone();
        tower::service_fn(move |_: Uri| {
            let target = Arc::clone(&target);
            let tls = tls.clone();
            let closed = closed.clone();
            async move {
                let stream = open_stream(&target, tls, connect_timeout, nodelay, closed).await?;
                Ok::<_, io::Error>(TokioIo::new(stream))
            }
        })
    };

    tracing::debug!(
        %id,
        addr = target,
        block = options.block,
        tls = !options.credentials.is_insecure(),
        "dialing"
    );
    let channel = if options.block {
        endpoint
            .connect_with_connector(connector)
            .await
            .map_err(|source| TransportError::Dial {
                addr: target.to_owned(),
                source,
            })?
    } else {
        endpoint.connect_with_connector_lazy(connector)
    };

    Ok(Connection {
        id,
        target: Arc::from(target),
        channel,
        closed,
        close_once: Arc::new(AtomicBool::new(false)),
        metadata: tonic::metadata::MetadataMap::new(),
    })
}

fn endpoint(target: &str, options: &ResolvedOptions) -> Result<Endpoint, TransportError> {
    let invalid = |reason: String| TransportError::InvalidTarget {
        addr: target.to_owned(),
        reason,
    };
    if target.is_empty() {
        return Err(invalid("empty address".into()));
    }

    // The scheme only shapes the HTTP/2 pseudo-headers; TLS is handled by
    // the connector.
    let mut endpoint =
        Endpoint::from_shared(format!("http://{target}")).map_err(|e| invalid(e.to_string()))?;
    if let Some(ua) = &options.user_agent {
        endpoint = endpoint
            .user_agent(ua.as_str())
            .map_err(|e| invalid(e.to_string()))?;
    }
    if let Some(timeout) = options.request_timeout {
        endpoint = endpoint.timeout(timeout);
    }
    if let Some(interval) = options.keep_alive_interval {
        endpoint = endpoint.http2_keep_alive_interval(interval);
    }
    if let Some(timeout) = options.keep_alive_timeout {
        endpoint = endpoint.keep_alive_timeout(timeout);
    }
    if let Some(size) = options.stream_window {
        endpoint = endpoint.initial_stream_window_size(size);
    }
    Ok(endpoint)
}

async fn open_stream(
    target: &str,
    tls: Option<TlsCredentials>,
    connect_timeout: Option<Duration>,
    nodelay: bool,
    closed: CancellationToken,
) -> io::Result<ConnStream> {
    // The channel reconnects on its own after a failure; a closed
    // connection must stay closed.
    if closed.is_cancelled() {
        return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
    }

    let tcp = match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, TcpStream::connect(target))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "tcp connect timed out"))??,
        None => TcpStream::connect(target).await?,
    };
    tcp.set_nodelay(nodelay)?;

    let io = match tls {
        None => Io::Plain(tcp),
        Some(tls) => {
            let stream = TlsConnector::from(Arc::clone(&tls.config))
                .connect(tls.server_name.clone(), tcp)
                .await?;
            Io::Tls(Box::new(stream))
        }
    };
    Ok(ConnStream::new(io, closed))
}

enum Io {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// The socket under a channel. Once the owning connection is closed, reads
/// report end-of-stream and writes fail, which makes the HTTP/2 client shut
/// the connection down even if channel clones are still alive.
struct ConnStream {
    io: Io,
    closed: CancellationToken,
    on_close: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl ConnStream {
    fn new(io: Io, closed: CancellationToken) -> Self {
        let on_close = Box::pin(closed.clone().cancelled_owned());
        Self {
            io,
            closed,
            on_close,
        }
    }

    fn closed_error() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "connection closed")
    }
}

impl AsyncRead for ConnStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.closed.is_cancelled() || this.on_close.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Ok(()));
        }
        match &mut this.io {
            Io::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Io::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ConnStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.closed.is_cancelled() {
            return Poll::Ready(Err(Self::closed_error()));
        }
        match &mut this.io {
            Io::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Io::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().io {
            Io::Plain(s) => Pin::new(s).poll_flush(cx),
            Io::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().io {
            Io::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Io::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_rejects_empty_target() {
        let err = endpoint("", &ResolvedOptions::default()).unwrap_err();
        assert!(matches!(err, TransportError::InvalidTarget { .. }));
    }

    #[test]
    fn test_endpoint_rejects_malformed_target() {
        let err = endpoint("not a host:port", &ResolvedOptions::default()).unwrap_err();
        assert!(err.to_string().contains("not a host:port"));
    }

    #[test]
    fn test_endpoint_uses_plain_http_uri() {
        let endpoint = endpoint("localhost:50051", &ResolvedOptions::default()).unwrap();
        let uri = endpoint.uri();
        assert_eq!(uri.scheme_str(), Some("http"));
        assert_eq!(uri.host(), Some("localhost"));
        assert_eq!(uri.port_u16(), Some(50051));
    }

    #[tokio::test]
    async fn test_closed_connector_refuses_to_reconnect() {
        let closed = CancellationToken::new();
        closed.cancel();
        let err = open_stream("127.0.0.1:1", None, None, true, closed)
            .await
            .err()
            .expect("closed connection must not reconnect");
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }
}
