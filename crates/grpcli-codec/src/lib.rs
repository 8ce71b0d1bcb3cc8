//! Request decoders and response encoders for grpcli.
//!
//! This crate defines how a command-line client turns its input stream into
//! a request and a response into its output stream:
//!
//! - **Traits** ([`Decoder`], [`Encoder`]): the capability the orchestrator
//!   hands to generated client code.
//! - **Codecs** ([`JsonDecoder`], [`JsonEncoder`], [`XmlDecoder`],
//!   [`XmlEncoder`], [`NoOp`]): the built-in formats.
//! - **Registry** ([`FormatRegistry`]): format name → constructor, which
//!   extensions add to before any call is made.
//! - **Errors** ([`CodecError`]).
//!
//! # Feature Flags
//!
//! - `json` (default): JSON via `serde_json`
//! - `xml` (default): XML via `quick-xml`

mod codec;
mod error;
#[cfg(feature = "json")]
mod json;
mod registry;
#[cfg(feature = "xml")]
mod xml;

pub use codec::{Decoder, Encoder, NoOp, Visit};
pub use error::{BoxError, CodecError};
#[cfg(feature = "json")]
pub use json::{JsonDecoder, JsonEncoder};
pub use registry::{DecoderMaker, EncoderMaker, FormatRegistry};
#[cfg(feature = "xml")]
pub use xml::{XmlDecoder, XmlEncoder};
