use std::path::PathBuf;

/// Errors that can occur while resolving credentials or dialing.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server address cannot be turned into a channel endpoint.
    #[error("invalid server address {addr:?}: {reason}")]
    InvalidTarget { addr: String, reason: String },

    /// The CA certificate file could not be read.
    #[error("ca cert {}: {source}", path.display())]
    CaCert {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A client certificate was given without its private key.
    #[error("key file not specified")]
    KeyFileNotSpecified,

    /// The client certificate/key pair could not be loaded.
    #[error("cert/key {}, {}: {source}", cert.display(), key.display())]
    CertKey {
        cert: PathBuf,
        key: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The name used to verify the server is not a DNS name or IP address.
    #[error("invalid TLS server name {0:?}")]
    InvalidServerName(String),

    /// Building the TLS context failed.
    #[error("tls: {0}")]
    Tls(#[from] rustls::Error),

    /// The channel could not be established.
    #[error("dial {addr}: {}", causes(.source))]
    Dial {
        addr: String,
        #[source]
        source: tonic::transport::Error,
    },
}

/// Renders an error followed by each of its sources, `: `-separated.
///
/// `tonic::transport::Error` displays only its kind ("transport error"), so
/// the cause a user can act on lives further down the chain.
fn causes(error: &dyn std::error::Error) -> String {
    let mut rendered = error.to_string();
    let mut next = error.source();
    while let Some(cause) = next {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        next = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    #[derive(Debug)]
    struct Layer(&'static str, Option<Box<Layer>>);

    impl fmt::Display for Layer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for Layer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            self.1.as_deref().map(|e| e as _)
        }
    }

    #[test]
    fn test_causes_walks_the_chain() {
        let err = Layer(
            "transport error",
            Some(Box::new(Layer("Connection refused", None))),
        );
        assert_eq!(causes(&err), "transport error: Connection refused");
    }

    #[test]
    fn test_key_file_message() {
        assert_eq!(
            TransportError::KeyFileNotSpecified.to_string(),
            "key file not specified"
        );
    }
}
