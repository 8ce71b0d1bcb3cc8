//! Unified error type for grpcli.

use std::path::PathBuf;

use grpcli_codec::CodecError;
use grpcli_transport::TransportError;

/// Boxed error returned by extension hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error that wraps the crate-specific errors.
///
/// The `#[from]` attribute on the wrapping variants auto-generates `From`
/// impls, so the `?` operator converts sub-crate errors automatically.
/// Errors raised by the caller's invocation function never pass through
/// this type; [`round_trip`](crate::round_trip) returns them untouched.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No input format with this name is registered.
    #[error("unknown request format: {0}")]
    UnknownRequestFormat(String),

    /// No output format with this name is registered.
    #[error("unknown response format: {0}")]
    UnknownResponseFormat(String),

    /// The request file could not be read.
    #[error("request file {}: {source}", path.display())]
    RequestFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A pre-dial hook rejected the call.
    #[error("{0}")]
    PreDial(#[source] BoxError),

    /// The server did not accept a connection before the dial deadline.
    #[error("timeout dialing server: {addr}")]
    Timeout { addr: String },

    /// The call's context was cancelled.
    #[error("call cancelled")]
    Cancelled,

    /// The call's context deadline passed while the invocation was running.
    #[error("call deadline exceeded")]
    DeadlineExceeded,

    /// A transport-level error (credentials, dialing).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A codec-level error (decoding the request, encoding the response).
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: ClientError = TransportError::KeyFileNotSpecified.into();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(err.to_string(), "key file not specified");
    }

    #[test]
    fn test_from_codec_error() {
        let err: ClientError = CodecError::NoInput.into();
        assert!(matches!(err, ClientError::Codec(_)));
    }

    #[test]
    fn test_timeout_names_the_address() {
        let err = ClientError::Timeout {
            addr: "db.internal:9000".into(),
        };
        assert_eq!(err.to_string(), "timeout dialing server: db.internal:9000");
    }

    #[test]
    fn test_pre_dial_error_keeps_hook_message() {
        let err = ClientError::PreDial("token expired".into());
        assert_eq!(err.to_string(), "token expired");
    }
}
