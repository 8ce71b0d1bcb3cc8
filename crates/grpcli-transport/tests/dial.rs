//! Integration tests for dialing.
//!
//! These tests start a real gRPC health service on a random local port and
//! dial it over TCP, so the full connector path (socket, HTTP/2, channel)
//! is exercised.

use std::time::Duration;

use grpcli_transport::{DialOption, DialOptions, TlsSettings, TransportError, dial};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;

/// Starts a health server on a random port and returns its address.
async fn start_health_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener.local_addr().expect("should have local addr").to_string();

    let (_reporter, service) = tonic_health::server::health_reporter();
    tokio::spawn(async move {
        let _ = tonic::transport::Server::builder()
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await;
    });
    addr
}

/// An address nothing is listening on.
async fn unused_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    listener.local_addr().expect("should have local addr").to_string()
}

fn blocking() -> DialOptions {
    let mut options = DialOptions::new();
    options.push(DialOption::Block);
    options
}

async fn check(channel: tonic::transport::Channel) -> Result<i32, tonic::Status> {
    let response = HealthClient::new(channel)
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await?;
    Ok(response.into_inner().status)
}

#[tokio::test]
async fn test_blocking_dial_and_call() {
    let addr = start_health_server().await;

    let conn = dial(&addr, blocking()).await.expect("should connect");
    assert_eq!(conn.target(), addr);
    assert!(!conn.is_closed());

    let status = check(conn.channel()).await.expect("health check should succeed");
    assert_eq!(status, ServingStatus::Serving as i32);
}

#[tokio::test]
async fn test_close_tears_down_every_clone() {
    let addr = start_health_server().await;
    let conn = dial(&addr, blocking()).await.expect("should connect");

    // A channel obtained before closing must stop working afterwards.
    let leaked = conn.channel();
    check(leaked.clone()).await.expect("works while open");

    assert!(conn.close());
    let result = tokio::time::timeout(Duration::from_secs(5), check(leaked))
        .await
        .expect("call on a closed connection should fail, not hang");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_blocking_dial_to_dead_port_fails() {
    let addr = unused_addr().await;
    let err = dial(&addr, blocking()).await.unwrap_err();
    assert!(matches!(err, TransportError::Dial { .. }));

    // The message names the address and carries the cause, not just the
    // error kind.
    let message = err.to_string();
    assert!(message.starts_with(&format!("dial {addr}: ")), "got: {message}");
    assert_ne!(message, format!("dial {addr}: transport error"));
}

#[tokio::test]
async fn test_lazy_dial_defers_failure_to_first_call() {
    let addr = unused_addr().await;
    let conn = dial(&addr, DialOptions::new())
        .await
        .expect("lazy dial performs no I/O");
    assert!(check(conn.channel()).await.is_err());
}

#[tokio::test]
async fn test_options_are_applied_to_the_channel() {
    let addr = start_health_server().await;
    let options: DialOptions = [
        DialOption::Block,
        DialOption::UserAgent("grpcli-test/1.0".into()),
        DialOption::ConnectTimeout(Duration::from_secs(2)),
        DialOption::RequestTimeout(Duration::from_secs(5)),
        DialOption::Http2KeepAliveInterval(Duration::from_secs(30)),
        DialOption::KeepAliveTimeout(Duration::from_secs(10)),
    ]
    .into_iter()
    .collect();

    let conn = dial(&addr, options).await.expect("should connect");
    check(conn.channel()).await.expect("health check should succeed");
}

#[tokio::test]
async fn test_tls_dial_waits_for_handshake() {
    // Accept TCP connections but never answer the TLS ClientHello.
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener.local_addr().expect("should have local addr").to_string();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let credentials = TlsSettings {
        enabled: true,
        insecure_skip_verify: true,
        ..TlsSettings::default()
    }
    .resolve(&addr)
    .expect("credentials");
    let mut options = blocking();
    options.push(DialOption::Credentials(credentials));

    let result = tokio::time::timeout(Duration::from_millis(200), dial(&addr, options)).await;
    assert!(result.is_err(), "dial should still be waiting on the handshake");
}
