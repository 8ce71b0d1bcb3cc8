//! JSON codecs (via `serde_json`).
//!
//! Behind the `json` feature flag, enabled by default.

use std::io::{Read, Write};

use crate::codec::Visit;
use crate::{CodecError, Decoder, Encoder};

const FORMAT: &str = "json";

/// Reads one JSON value from a stream.
///
/// Only the first value is consumed; anything after it is left unread.
pub struct JsonDecoder {
    reader: Box<dyn Read + Send>,
}

impl JsonDecoder {
    pub fn new(reader: Box<dyn Read + Send>) -> Self {
        Self { reader }
    }
}

impl Decoder for JsonDecoder {
    fn decode_with(&mut self, visit: &mut Visit<'_>) -> Result<(), CodecError> {
        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        let mut erased = <dyn erased_serde::Deserializer>::erase(&mut de);
        visit(&mut erased).map_err(|e| CodecError::decode(FORMAT, e))
    }
}

/// Writes JSON values to a stream, one per line in compact mode.
pub struct JsonEncoder {
    writer: Box<dyn Write + Send>,
    pretty: bool,
}

impl JsonEncoder {
    /// Single-line output.
    pub fn compact(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            pretty: false,
        }
    }

    /// Two-space indented output.
    pub fn pretty(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            pretty: true,
        }
    }
}

impl Encoder for JsonEncoder {
    fn encode_erased(&mut self, value: &dyn erased_serde::Serialize) -> Result<(), CodecError> {
        let written = if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, value)
        } else {
            serde_json::to_writer(&mut self.writer, value)
        };
        written.map_err(|e| CodecError::encode(FORMAT, e))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
