//! The format registry: format name → decoder/encoder constructor.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::{Decoder, Encoder};

/// Builds a decoder bound to a readable stream.
pub type DecoderMaker = Arc<dyn Fn(Box<dyn Read + Send>) -> Box<dyn Decoder> + Send + Sync>;

/// Builds an encoder bound to a writable stream.
pub type EncoderMaker = Arc<dyn Fn(Box<dyn Write + Send>) -> Box<dyn Encoder> + Send + Sync>;

/// Known request (input) and response (output) formats.
///
/// Registration happens while the client is being configured. Once the
/// registry is handed to a client configuration it is only read. There is
/// no way to remove a format.
#[derive(Clone)]
pub struct FormatRegistry {
    decoders: BTreeMap<String, DecoderMaker>,
    encoders: BTreeMap<String, EncoderMaker>,
}

impl FormatRegistry {
    /// A registry with no formats at all.
    pub fn empty() -> Self {
        Self {
            decoders: BTreeMap::new(),
            encoders: BTreeMap::new(),
        }
    }

    /// Binds `format` to a decoder constructor, replacing any previous one.
    ///
    /// Returns the constructor that was replaced.
    pub fn register_decoder<F, D>(&mut self, format: impl Into<String>, make: F) -> Option<DecoderMaker>
    where
        F: Fn(Box<dyn Read + Send>) -> D + Send + Sync + 'static,
        D: Decoder + 'static,
    {
        let maker: DecoderMaker = Arc::new(move |reader| Box::new(make(reader)) as Box<dyn Decoder>);
        self.decoders.insert(format.into(), maker)
    }

    /// Binds `format` to an encoder constructor, replacing any previous one.
    pub fn register_encoder<F, E>(&mut self, format: impl Into<String>, make: F) -> Option<EncoderMaker>
    where
        F: Fn(Box<dyn Write + Send>) -> E + Send + Sync + 'static,
        E: Encoder + 'static,
    {
        let maker: EncoderMaker = Arc::new(move |writer| Box::new(make(writer)) as Box<dyn Encoder>);
        self.encoders.insert(format.into(), maker)
    }

    pub fn decoder(&self, format: &str) -> Option<&DecoderMaker> {
        self.decoders.get(format)
    }

    pub fn encoder(&self, format: &str) -> Option<&EncoderMaker> {
        self.encoders.get(format)
    }

    /// Registered input format names, sorted. Used for help text.
    pub fn decoder_formats(&self) -> Vec<&str> {
        self.decoders.keys().map(String::as_str).collect()
    }

    /// Registered output format names, sorted.
    pub fn encoder_formats(&self) -> Vec<&str> {
        self.encoders.keys().map(String::as_str).collect()
    }
}

impl Default for FormatRegistry {
    /// The built-in formats enabled by cargo features.
    ///
    /// Inputs: `json`, `xml`. Outputs: `json` (indented), `compact-json`,
    /// `xml`, `pretty-xml`.
    fn default() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::empty();

        #[cfg(feature = "json")]
        {
            use crate::{JsonDecoder, JsonEncoder};
            registry.register_decoder("json", JsonDecoder::new);
            registry.register_encoder("json", JsonEncoder::pretty);
            registry.register_encoder("compact-json", JsonEncoder::compact);
        }

        #[cfg(feature = "xml")]
        {
            use crate::{XmlDecoder, XmlEncoder};
            registry.register_decoder("xml", XmlDecoder::new);
            registry.register_encoder("xml", XmlEncoder::compact);
            registry.register_encoder("pretty-xml", XmlEncoder::pretty);
        }

        registry
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("decoders", &self.decoder_formats())
            .field("encoders", &self.encoder_formats())
            .finish()
    }
}
