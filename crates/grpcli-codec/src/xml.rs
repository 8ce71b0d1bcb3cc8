//! XML codecs (via `quick-xml`'s serde support).
//!
//! Behind the `xml` feature flag, enabled by default. The root element of
//! an encoded response is named after the response type; on decode the root
//! element name is not checked.

use std::io::{BufReader, Read, Write};

use serde::Serialize;

use crate::codec::Visit;
use crate::{CodecError, Decoder, Encoder};

const FORMAT: &str = "xml";

/// Reads one XML document from a stream.
pub struct XmlDecoder {
    reader: Box<dyn Read + Send>,
}

impl XmlDecoder {
    pub fn new(reader: Box<dyn Read + Send>) -> Self {
        Self { reader }
    }
}

impl Decoder for XmlDecoder {
    fn decode_with(&mut self, visit: &mut Visit<'_>) -> Result<(), CodecError> {
        let mut de = quick_xml::de::Deserializer::from_reader(BufReader::new(&mut self.reader));
        let mut erased = <dyn erased_serde::Deserializer>::erase(&mut de);
        visit(&mut erased).map_err(|e| CodecError::decode(FORMAT, e))
    }
}

/// Writes XML documents to a stream.
pub struct XmlEncoder {
    writer: Box<dyn Write + Send>,
    pretty: bool,
}

impl XmlEncoder {
    pub fn compact(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            pretty: false,
        }
    }

    pub fn pretty(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer,
            pretty: true,
        }
    }
}

impl Encoder for XmlEncoder {
    fn encode_erased(&mut self, value: &dyn erased_serde::Serialize) -> Result<(), CodecError> {
        // quick-xml serializes into a `fmt::Write`, so render to a string
        // first and copy it to the byte stream.
        let mut rendered = String::new();
        let mut serializer = quick_xml::se::Serializer::new(&mut rendered);
        if self.pretty {
            serializer.indent(' ', 2);
        }
        Serialize::serialize(value, serializer).map_err(|e| CodecError::encode(FORMAT, e))?;
        rendered.push('\n');
        self.writer.write_all(rendered.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        item: String,
        quantity: u32,
    }

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_decode_struct() {
        let input = Cursor::new(b"<Order><item>tea</item><quantity>2</quantity></Order>".to_vec());
        let mut decoder: Box<dyn Decoder> = Box::new(XmlDecoder::new(Box::new(input)));
        let order: Order = decoder.decode().unwrap();
        assert_eq!(
            order,
            Order {
                item: "tea".into(),
                quantity: 2
            }
        );
    }

    #[test]
    fn test_decode_invalid_number() {
        let input = Cursor::new(b"<Order><item>tea</item><quantity>lots</quantity></Order>".to_vec());
        let mut decoder: Box<dyn Decoder> = Box::new(XmlDecoder::new(Box::new(input)));
        let err = decoder.decode::<Order>().unwrap_err();
        assert!(matches!(err, CodecError::Decode { format: "xml", .. }));
    }

    #[test]
    fn test_compact_encoding() {
        let sink = Sink::default();
        let mut encoder: Box<dyn Encoder> = Box::new(XmlEncoder::compact(Box::new(sink.clone())));
        encoder
            .encode(&Order {
                item: "tea".into(),
                quantity: 2,
            })
            .unwrap();
        let written = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "<Order><item>tea</item><quantity>2</quantity></Order>\n");
    }

    #[test]
    fn test_pretty_encoding_is_indented() {
        let sink = Sink::default();
        let mut encoder: Box<dyn Encoder> = Box::new(XmlEncoder::pretty(Box::new(sink.clone())));
        encoder
            .encode(&Order {
                item: "tea".into(),
                quantity: 2,
            })
            .unwrap();
        let written = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(written.starts_with("<Order>\n  <item>tea</item>"));
    }
}
