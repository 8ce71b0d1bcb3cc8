//! Error types for the codec layer.
//!
//! Each grpcli crate defines its own error enum. A `CodecError` always
//! means the problem is in turning bytes into a request or a response into
//! bytes, never in configuration or networking.

/// Boxed error used for the format-specific causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while decoding a request or encoding a response.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The request stream could not be turned into the expected type.
    ///
    /// Common causes: malformed input, missing required fields, or a
    /// stream that ended before a complete value was read.
    #[error("decode {format} request: {source}")]
    Decode {
        /// Name of the format that failed, e.g. `"json"`.
        format: &'static str,
        #[source]
        source: BoxError,
    },

    /// The response could not be serialized in the selected format.
    #[error("encode {format} response: {source}")]
    Encode {
        format: &'static str,
        #[source]
        source: BoxError,
    },

    /// A typed decode was requested from the no-op decoder.
    #[error("no request body")]
    NoInput,

    /// Writing to or flushing the output stream failed.
    #[error("codec I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn decode(format: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Decode {
            format,
            source: source.into(),
        }
    }

    pub(crate) fn encode(format: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Encode {
            format,
            source: source.into(),
        }
    }
}
