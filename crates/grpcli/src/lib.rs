//! # grpcli
//!
//! Runtime support for generated gRPC command-line clients.
//!
//! Generated code supplies only the RPC call itself. This crate resolves
//! everything around it from a [`Config`]: where the request comes from and
//! in which format, how the response is written, TLS credentials, and the
//! connection. [`round_trip`] ties it together and guarantees the
//! connection is closed afterwards.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clap::Command;
//! use grpcli::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let mut config = Config::builder().env_var_prefix("GREETER_").build();
//! let matches = config.bind_flags(Command::new("greeter")).get_matches();
//! config.apply_flags(&matches);
//!
//! round_trip(CallContext::new(), &config, |conn, mut input, mut output| async move {
//!     let request: serde_json::Value = input.decode_or_default()?;
//!     // let reply = GreeterClient::new(conn.channel()).say_hello(conn.request(request)).await?;
//!     output.encode(&request)?;
//!     Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
//! })
//! .await
//! # }
//! ```
//!
//! ## Extending
//!
//! Formats, flags and pre-dial hooks are registered on a [`ConfigBuilder`]
//! before any call runs. See [`ConfigBuilder`] for an example.

mod config;
mod context;
mod error;
mod flags;
mod logging;
mod resolve;
mod round_trip;

pub use config::{
    Config, ConfigBuilder, DEFAULT_FORMAT, DEFAULT_SERVER_ADDR, DEFAULT_TIMEOUT, FlagBinder,
    PreDialer,
};
pub use context::CallContext;
pub use error::{BoxError, ClientError};
pub use logging::init_logging;
pub use resolve::{RequestSource, Stdio};
pub use round_trip::{round_trip, round_trip_with};

pub use grpcli_codec::{CodecError, Decoder, Encoder, FormatRegistry, NoOp};
pub use grpcli_transport::{
    Connection, ConnectionId, Credentials, DialOption, DialOptions, TlsCredentials, TlsSettings,
    TransportError,
};

/// Re-exports codec and transport crates for extensions that need more
/// than the common types.
pub use grpcli_codec as codec;
pub use grpcli_transport as transport;

pub mod prelude {
    pub use crate::{
        CallContext, ClientError, Config, ConfigBuilder, Connection, Decoder, DialOption,
        DialOptions, Encoder, Stdio, round_trip, round_trip_with,
    };
}
