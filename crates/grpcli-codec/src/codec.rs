//! Decoder and encoder traits shared by every request/response format.
//!
//! A decoder is bound to one readable byte stream and turns it into one
//! structured request. An encoder is bound to one writable byte stream and
//! writes one structured response to it. The orchestrator does not know
//! which format is in use; it only holds `Box<dyn Decoder>` and
//! `Box<dyn Encoder>`.
//!
//! ## Why the erased methods
//!
//! Generated client code knows the concrete request and response types, but
//! the formats are chosen at runtime from a registry. Generic methods would
//! make the traits unusable as trait objects, so the trait methods work on
//! `erased-serde` values and the typed entry points ([`decode`] and
//! [`encode`]) live on `dyn Decoder` / `dyn Encoder` instead.
//!
//! [`decode`]: trait.Decoder.html#method.decode
//! [`encode`]: trait.Encoder.html#method.encode

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CodecError;

/// Callback handed a type-erased deserializer positioned at the request.
pub type Visit<'a> = dyn for<'de> FnMut(&mut dyn erased_serde::Deserializer<'de>) -> Result<(), erased_serde::Error>
    + 'a;

/// Decodes one structured request from a byte stream.
pub trait Decoder: Send {
    /// Runs `visit` against a deserializer reading from the bound stream.
    ///
    /// Implementations call `visit` at most once. The no-op decoder never
    /// calls it.
    ///
    /// # Errors
    /// Returns `CodecError::Decode` when the stream is not valid input for
    /// this format or does not match the type `visit` expects.
    fn decode_with(&mut self, visit: &mut Visit<'_>) -> Result<(), CodecError>;

    /// Whether this decoder represents "no request body".
    fn is_noop(&self) -> bool {
        false
    }
}

impl dyn Decoder + '_ {
    /// Decodes the request into `T`.
    ///
    /// # Errors
    /// `CodecError::NoInput` for the no-op decoder, otherwise whatever the
    /// format reports.
    pub fn decode<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        let mut decoded = None;
        self.decode_with(&mut |de| {
            decoded = Some(erased_serde::deserialize::<T>(de)?);
            Ok(())
        })?;
        decoded.ok_or(CodecError::NoInput)
    }

    /// Like [`decode`](Self::decode), but an absent request body yields
    /// `T::default()`.
    pub fn decode_or_default<T: DeserializeOwned + Default>(&mut self) -> Result<T, CodecError> {
        if self.is_noop() {
            return Ok(T::default());
        }
        self.decode()
    }
}

/// Encodes one structured response to a byte stream.
pub trait Encoder: Send {
    /// Writes `value` to the bound stream and flushes it.
    ///
    /// # Errors
    /// `CodecError::Encode` when the value cannot be represented in this
    /// format, `CodecError::Io` when the stream rejects the write.
    fn encode_erased(&mut self, value: &dyn erased_serde::Serialize) -> Result<(), CodecError>;

    /// Whether this encoder discards everything it is given.
    fn is_noop(&self) -> bool {
        false
    }
}

impl dyn Encoder + '_ {
    /// Encodes a typed response.
    pub fn encode<T: Serialize>(&mut self, value: &T) -> Result<(), CodecError> {
        self.encode_erased(value)
    }
}

// ---------------------------------------------------------------------------
// NoOp
// ---------------------------------------------------------------------------

/// The "format intentionally absent" codec.
///
/// As a decoder it never produces a request; as an encoder it drops every
/// response.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOp;

impl Decoder for NoOp {
    fn decode_with(&mut self, _visit: &mut Visit<'_>) -> Result<(), CodecError> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

impl Encoder for NoOp {
    fn encode_erased(&mut self, _value: &dyn erased_serde::Serialize) -> Result<(), CodecError> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_decoder_has_no_input() {
        let mut decoder: Box<dyn Decoder> = Box::new(NoOp);
        assert!(decoder.is_noop());
        let err = decoder.decode::<u32>().unwrap_err();
        assert!(matches!(err, CodecError::NoInput));
    }

    #[test]
    fn test_noop_decoder_default() {
        let mut decoder: Box<dyn Decoder> = Box::new(NoOp);
        let value: Vec<String> = decoder.decode_or_default().unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn test_noop_encoder_accepts_anything() {
        let mut encoder: Box<dyn Encoder> = Box::new(NoOp);
        assert!(encoder.is_noop());
        encoder.encode(&"ignored").unwrap();
        encoder.encode(&vec![1, 2, 3]).unwrap();
    }
}
