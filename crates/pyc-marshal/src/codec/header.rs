//! The `.pyc` container preamble.
//!
//! Sixteen bytes precede the marshal payload: a magic number, a flag word
//! whose low two bits select the invalidation mode, and eight mode-specific
//! bytes. The header is reported, never evaluated against a source file.

use crate::codec::primitives::Reader;
use crate::error::DecodeError;
use crate::limits::MAGIC_SUFFIX;
use crate::trace::{Field, Trace, TraceEvent, TraceValue};

/// How a cache file is checked for staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationMode {
    /// `0b00`: source mtime and size.
    Timestamp { mtime: u32, source_size: u32 },
    /// `0b01`: source hash, not checked at import.
    UncheckedHash([u8; 8]),
    /// `0b11`: source hash, checked at import.
    CheckedHash([u8; 8]),
    /// `0b10`: reserved; the eight bytes carry no defined meaning.
    Invalid([u8; 8]),
}

/// Discriminant of [`InvalidationMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum InvalidationKind {
    Timestamp,
    UncheckedHash,
    CheckedHash,
    Invalid,
}

impl InvalidationKind {
    /// Selects the mode from the low two bits of the flag word.
    pub fn from_flags(flags: u32) -> Self {
        match flags & 0b11 {
            0b00 => InvalidationKind::Timestamp,
            0b01 => InvalidationKind::UncheckedHash,
            0b11 => InvalidationKind::CheckedHash,
            _ => InvalidationKind::Invalid,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            InvalidationKind::Timestamp => "TIMESTAMP",
            InvalidationKind::UncheckedHash => "UNCHECKED_HASH",
            InvalidationKind::CheckedHash => "CHECKED_HASH",
            InvalidationKind::Invalid => "INVALID",
        }
    }
}

impl InvalidationMode {
    pub fn kind(&self) -> InvalidationKind {
        match self {
            InvalidationMode::Timestamp { .. } => InvalidationKind::Timestamp,
            InvalidationMode::UncheckedHash(_) => InvalidationKind::UncheckedHash,
            InvalidationMode::CheckedHash(_) => InvalidationKind::CheckedHash,
            InvalidationMode::Invalid(_) => InvalidationKind::Invalid,
        }
    }
}

/// Decoded container preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Full magic word, including the `\r\n` suffix.
    pub magic: u32,
    /// Full flag word; only the low two bits are defined.
    pub flags: u32,
    pub mode: InvalidationMode,
}

impl Header {
    /// The bytecode magic number (low 16 bits of the magic word).
    pub fn bytecode_magic(&self) -> u16 {
        self.magic as u16
    }

    /// Maps the bytecode magic to the runtime release that writes it.
    pub fn python_version(&self) -> Option<(u8, u8)> {
        let version = match self.bytecode_magic() {
            3390..=3399 => (3, 7),
            3400..=3419 => (3, 8),
            3420..=3429 => (3, 9),
            3430..=3449 => (3, 10),
            3450..=3499 => (3, 11),
            3500..=3549 => (3, 12),
            3550..=3599 => (3, 13),
            _ => return None,
        };
        Some(version)
    }

    /// Whether the payload's code objects use the layout this crate decodes.
    pub fn code_layout_matches(&self) -> bool {
        matches!(self.python_version(), Some((3, 8..=10)))
    }
}

/// Reads the 16-byte preamble, leaving the reader at the marshal payload.
pub fn decode_header<'a, T: Trace<'a>>(
    reader: &mut Reader<'a>,
    trace: &mut T,
) -> Result<Header, DecodeError> {
    let offset = reader.position();
    let magic = reader.read_u32("magic")?;
    trace.record(header_event(offset, 4, "magic", TraceValue::Flags(magic)));
    if (magic >> 16) as u16 != MAGIC_SUFFIX {
        return Err(DecodeError::InvalidMagic { found: magic });
    }

    let offset = reader.position();
    let flags = reader.read_u32("flags")?;
    trace.record(header_event(offset, 4, "flags", TraceValue::Flags(flags)));

    let kind = InvalidationKind::from_flags(flags);
    trace.record(header_event(reader.position(), 0, "invalidation_mode", TraceValue::Mode(kind)));

    let offset = reader.position();
    let mode = match kind {
        InvalidationKind::Timestamp => {
            let mtime = reader.read_u32("src_mtime")?;
            trace.record(header_event(offset, 4, "src_mtime", TraceValue::Int(i64::from(mtime))));
            let source_size = reader.read_u32("src_size")?;
            trace.record(header_event(
                offset + 4,
                4,
                "src_size",
                TraceValue::Int(i64::from(source_size)),
            ));
            InvalidationMode::Timestamp { mtime, source_size }
        }
        InvalidationKind::UncheckedHash | InvalidationKind::CheckedHash => {
            let raw = reader.read_bytes(8, "src_hash")?;
            trace.record(header_event(offset, 8, "src_hash", TraceValue::Bytes(raw)));
            let mut hash = [0u8; 8];
            hash.copy_from_slice(raw);
            if kind == InvalidationKind::CheckedHash {
                InvalidationMode::CheckedHash(hash)
            } else {
                InvalidationMode::UncheckedHash(hash)
            }
        }
        InvalidationKind::Invalid => {
            let raw = reader.read_bytes(8, "reserved")?;
            trace.record(header_event(offset, 8, "reserved", TraceValue::Bytes(raw)));
            let mut data = [0u8; 8];
            data.copy_from_slice(raw);
            InvalidationMode::Invalid(data)
        }
    };

    Ok(Header { magic, flags, mode })
}

fn header_event<'a>(offset: usize, len: usize, name: &'static str, value: TraceValue<'a>) -> TraceEvent<'a> {
    TraceEvent {
        depth: 0,
        offset,
        len,
        field: Field::Header(name),
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preamble(magic: u16, flags: u32, rest: [u8; 8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&magic.to_le_bytes());
        data.extend_from_slice(b"\r\n");
        data.extend_from_slice(&flags.to_le_bytes());
        data.extend_from_slice(&rest);
        data
    }

    #[test]
    fn test_timestamp_mode() {
        let mut rest = [0u8; 8];
        rest[..4].copy_from_slice(&1_600_000_000u32.to_le_bytes());
        rest[4..].copy_from_slice(&1234u32.to_le_bytes());
        let data = preamble(3413, 0, rest);

        let mut reader = Reader::new(&data);
        let header = decode_header(&mut reader, &mut ()).unwrap();
        assert_eq!(header.bytecode_magic(), 3413);
        assert_eq!(header.python_version(), Some((3, 8)));
        assert!(header.code_layout_matches());
        assert_eq!(
            header.mode,
            InvalidationMode::Timestamp { mtime: 1_600_000_000, source_size: 1234 }
        );
        assert!(reader.is_empty());
    }

    #[test]
    fn test_hash_modes() {
        let hash = [1, 2, 3, 4, 5, 6, 7, 8];
        for (flags, expected) in [
            (0b01, InvalidationMode::UncheckedHash(hash)),
            (0b11, InvalidationMode::CheckedHash(hash)),
            (0b10, InvalidationMode::Invalid(hash)),
            // Undefined upper bits are carried, not rejected.
            (0b1000_0001, InvalidationMode::UncheckedHash(hash)),
        ] {
            let data = preamble(3439, flags, hash);
            let mut reader = Reader::new(&data);
            let header = decode_header(&mut reader, &mut ()).unwrap();
            assert_eq!(header.mode, expected);
            assert_eq!(header.flags, flags);
        }
    }

    #[test]
    fn test_invalid_magic() {
        let mut data = preamble(3413, 0, [0; 8]);
        data[2] = b'X';
        let mut reader = Reader::new(&data);
        let err = decode_header(&mut reader, &mut ()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidMagic { .. }));
    }

    #[test]
    fn test_truncated_header() {
        let data = preamble(3413, 0b01, [0; 8]);
        let mut reader = Reader::new(&data[..12]);
        assert_eq!(
            decode_header(&mut reader, &mut ()),
            Err(DecodeError::Truncated { context: "src_hash" })
        );
    }

    #[test]
    fn test_newer_layout_detected() {
        let data = preamble(3495, 0, [0; 8]);
        let mut reader = Reader::new(&data);
        let header = decode_header(&mut reader, &mut ()).unwrap();
        assert_eq!(header.python_version(), Some((3, 11)));
        assert!(!header.code_layout_matches());
    }

    #[test]
    fn test_header_events() {
        let data = preamble(3425, 0b11, [0xAB; 8]);
        let mut reader = Reader::new(&data);
        let mut events: Vec<TraceEvent<'_>> = Vec::new();
        decode_header(&mut reader, &mut events).unwrap();

        let fields: Vec<_> = events.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                Field::Header("magic"),
                Field::Header("flags"),
                Field::Header("invalidation_mode"),
                Field::Header("src_hash"),
            ]
        );
        assert_eq!(events[2].value, TraceValue::Mode(InvalidationKind::CheckedHash));
        assert_eq!(events[3].offset, 8);
        assert_eq!(events[3].len, 8);
    }
}
