//! Binary decoding for marshal streams and `.pyc` files.
//!
//! - [`decode_pyc`]: container preamble followed by one marshal value
//! - [`decode_marshal`]: a bare marshal payload
//!
//! Both have `_with` variants taking [`DecodeOptions`] and a [`Trace`] sink.

pub mod decoder;
pub mod header;
pub mod primitives;
pub mod tag;

use tracing::debug;

pub use decoder::{decode_value, DecodeOptions};
pub use header::{decode_header, Header, InvalidationKind, InvalidationMode};
pub use primitives::Reader;
pub use tag::{LenWidth, Tag};

use crate::error::DecodeError;
use crate::model::Graph;
use crate::trace::Trace;

/// A decoded `.pyc` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Pyc<'a> {
    pub header: Header,
    /// The payload; its root is normally a code object.
    pub graph: Graph<'a>,
}

/// Decodes a bare marshal payload holding one value.
///
/// Byte and text values borrow from `input`.
pub fn decode_marshal(input: &[u8]) -> Result<Graph<'_>, DecodeError> {
    decode_marshal_with(input, DecodeOptions::default(), ())
}

/// Decodes a bare marshal payload, reporting every field read to `trace`.
pub fn decode_marshal_with<'a, T: Trace<'a>>(
    input: &'a [u8],
    options: DecodeOptions,
    mut trace: T,
) -> Result<Graph<'a>, DecodeError> {
    let mut reader = Reader::new(input);
    let graph = decode_value(&mut reader, &options, &mut trace)
        .inspect_err(|e| debug!(error = %e, "marshal decode failed"))?;
    check_eof(&reader, &options)?;
    debug!(nodes = graph.len(), consumed = reader.position(), "decoded marshal payload");
    Ok(graph)
}

/// Decodes a `.pyc` file: the 16-byte preamble, then the marshal payload.
pub fn decode_pyc(input: &[u8]) -> Result<Pyc<'_>, DecodeError> {
    decode_pyc_with(input, DecodeOptions::default(), ())
}

/// Decodes a `.pyc` file, reporting every field read to `trace`.
pub fn decode_pyc_with<'a, T: Trace<'a>>(
    input: &'a [u8],
    options: DecodeOptions,
    mut trace: T,
) -> Result<Pyc<'a>, DecodeError> {
    let mut reader = Reader::new(input);
    let header = decode_header(&mut reader, &mut trace)
        .inspect_err(|e| debug!(error = %e, "pyc header rejected"))?;
    debug!(
        magic = header.bytecode_magic(),
        mode = header.mode.kind().name(),
        "decoded pyc header"
    );
    let graph = decode_value(&mut reader, &options, &mut trace)
        .inspect_err(|e| debug!(error = %e, "marshal decode failed"))?;
    check_eof(&reader, &options)?;
    debug!(nodes = graph.len(), consumed = reader.position(), "decoded pyc payload");
    Ok(Pyc { header, graph })
}

fn check_eof(reader: &Reader<'_>, options: &DecodeOptions) -> Result<(), DecodeError> {
    if options.require_eof && !reader.is_empty() {
        return Err(DecodeError::TrailingBytes {
            count: reader.remaining_len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::HEADER_LEN;
    use crate::model::Value;
    use crate::trace::{Field, TraceEvent};

    fn pyc(payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&3413u16.to_le_bytes());
        data.extend_from_slice(b"\r\n");
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn test_decode_marshal() {
        let graph = decode_marshal(b"i\x2a\x00\x00\x00").unwrap();
        assert_eq!(graph.root_value(), &Value::Int32(42));
    }

    #[test]
    fn test_decode_pyc() {
        let data = pyc(b"N");
        let pyc = decode_pyc(&data).unwrap();
        assert_eq!(pyc.header.python_version(), Some((3, 8)));
        assert_eq!(pyc.graph.root_value(), &Value::None);
    }

    #[test]
    fn test_trailing_bytes() {
        assert!(decode_marshal(b"NN").is_ok());

        let strict = DecodeOptions::new().with_require_eof(true);
        assert_eq!(
            decode_marshal_with(b"NN", strict, ()),
            Err(DecodeError::TrailingBytes { count: 1 })
        );
        let data = pyc(b"N\x00\x00");
        assert_eq!(
            decode_pyc_with(&data, strict, ()),
            Err(DecodeError::TrailingBytes { count: 2 })
        );
    }

    #[test]
    fn test_pyc_trace_covers_header_and_payload() {
        let data = pyc(b"T");
        let mut events: Vec<TraceEvent<'_>> = Vec::new();
        decode_pyc_with(&data, DecodeOptions::default(), &mut events).unwrap();
        assert!(matches!(events[0].field, Field::Header("magic")));
        let last = events.last().unwrap();
        assert_eq!(last.field, Field::Type);
        assert_eq!(last.offset, HEADER_LEN);
    }

    #[test]
    fn test_trace_kept_up_to_failure() {
        let data = pyc(b"(\x01\x00\x00\x00Q");
        let mut events: Vec<TraceEvent<'_>> = Vec::new();
        let err = decode_pyc_with(&data, DecodeOptions::default(), &mut events).unwrap_err();
        assert_eq!(err, DecodeError::UnknownTag { tag: b'Q' });
        assert!(events.iter().any(|e| e.field == Field::Item(0)));
    }
}
