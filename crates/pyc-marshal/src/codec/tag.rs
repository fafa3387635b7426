//! Type tags of the marshal format.
//!
//! Each value starts with one tag byte. The low 7 bits select the kind;
//! the high bit ([`FLAG_REF`]) marks the value as referenceable.

use crate::limits::FLAG_REF;

/// Value kinds, keyed by their wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum Tag {
    Null = b'0',
    None = b'N',
    False = b'F',
    True = b'T',
    StopIteration = b'S',
    Ellipsis = b'.',
    Int = b'i',
    Int64 = b'I',
    Float = b'f',
    BinaryFloat = b'g',
    Complex = b'x',
    BinaryComplex = b'y',
    Long = b'l',
    String = b's',
    Interned = b't',
    Ref = b'r',
    Tuple = b'(',
    List = b'[',
    Dict = b'{',
    Code = b'c',
    Unicode = b'u',
    Unknown = b'?',
    Set = b'<',
    FrozenSet = b'>',
    Ascii = b'a',
    AsciiInterned = b'A',
    SmallTuple = b')',
    ShortAscii = b'z',
    ShortAsciiInterned = b'Z',
}

/// Width of a length prefix on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LenWidth {
    /// One unsigned byte.
    Short,
    /// Four bytes, signed little-endian.
    Long,
}

impl Tag {
    /// Creates a Tag from its wire representation (flag bit already stripped).
    pub fn from_u8(v: u8) -> Option<Tag> {
        let tag = match v {
            b'0' => Tag::Null,
            b'N' => Tag::None,
            b'F' => Tag::False,
            b'T' => Tag::True,
            b'S' => Tag::StopIteration,
            b'.' => Tag::Ellipsis,
            b'i' => Tag::Int,
            b'I' => Tag::Int64,
            b'f' => Tag::Float,
            b'g' => Tag::BinaryFloat,
            b'x' => Tag::Complex,
            b'y' => Tag::BinaryComplex,
            b'l' => Tag::Long,
            b's' => Tag::String,
            b't' => Tag::Interned,
            b'r' => Tag::Ref,
            b'(' => Tag::Tuple,
            b'[' => Tag::List,
            b'{' => Tag::Dict,
            b'c' => Tag::Code,
            b'u' => Tag::Unicode,
            b'?' => Tag::Unknown,
            b'<' => Tag::Set,
            b'>' => Tag::FrozenSet,
            b'a' => Tag::Ascii,
            b'A' => Tag::AsciiInterned,
            b')' => Tag::SmallTuple,
            b'z' => Tag::ShortAscii,
            b'Z' => Tag::ShortAsciiInterned,
            _ => return None,
        };
        Some(tag)
    }

    /// Returns the wire byte (without the flag bit).
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Returns the canonical `TYPE_*` name of this tag.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Null => "TYPE_NULL",
            Tag::None => "TYPE_NONE",
            Tag::False => "TYPE_FALSE",
            Tag::True => "TYPE_TRUE",
            Tag::StopIteration => "TYPE_STOPITER",
            Tag::Ellipsis => "TYPE_ELLIPSIS",
            Tag::Int => "TYPE_INT",
            Tag::Int64 => "TYPE_INT64",
            Tag::Float => "TYPE_FLOAT",
            Tag::BinaryFloat => "TYPE_BINARY_FLOAT",
            Tag::Complex => "TYPE_COMPLEX",
            Tag::BinaryComplex => "TYPE_BINARY_COMPLEX",
            Tag::Long => "TYPE_LONG",
            Tag::String => "TYPE_STRING",
            Tag::Interned => "TYPE_INTERNED",
            Tag::Ref => "TYPE_REF",
            Tag::Tuple => "TYPE_TUPLE",
            Tag::List => "TYPE_LIST",
            Tag::Dict => "TYPE_DICT",
            Tag::Code => "TYPE_CODE",
            Tag::Unicode => "TYPE_UNICODE",
            Tag::Unknown => "TYPE_UNKNOWN",
            Tag::Set => "TYPE_SET",
            Tag::FrozenSet => "TYPE_FROZENSET",
            Tag::Ascii => "TYPE_ASCII",
            Tag::AsciiInterned => "TYPE_ASCII_INTERNED",
            Tag::SmallTuple => "TYPE_SMALL_TUPLE",
            Tag::ShortAscii => "TYPE_SHORT_ASCII",
            Tag::ShortAsciiInterned => "TYPE_SHORT_ASCII_INTERNED",
        }
    }

    /// Width of the length prefix for length-prefixed tags.
    pub fn len_width(self) -> Option<LenWidth> {
        match self {
            Tag::ShortAscii | Tag::ShortAsciiInterned | Tag::SmallTuple => Some(LenWidth::Short),
            Tag::String
            | Tag::Interned
            | Tag::Unicode
            | Tag::Ascii
            | Tag::AsciiInterned
            | Tag::Tuple
            | Tag::List
            | Tag::Set
            | Tag::FrozenSet => Some(LenWidth::Long),
            _ => None,
        }
    }
}

/// Splits a raw tag byte into its kind byte and referenceable flag.
#[inline]
pub fn split_tag(byte: u8) -> (u8, bool) {
    (byte & !FLAG_REF, byte & FLAG_REF != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for byte in 0u8..0x80 {
            if let Some(tag) = Tag::from_u8(byte) {
                assert_eq!(tag.as_u8(), byte);
                assert!(tag.name().starts_with("TYPE_"));
            }
        }
    }

    #[test]
    fn test_tag_count() {
        let known = (0u8..0x80).filter(|b| Tag::from_u8(*b).is_some()).count();
        assert_eq!(known, 29);
    }

    #[test]
    fn test_split_tag() {
        assert_eq!(split_tag(b'(' | 0x80), (b'(', true));
        assert_eq!(split_tag(b'N'), (b'N', false));
    }

    #[test]
    fn test_len_width() {
        assert_eq!(Tag::SmallTuple.len_width(), Some(LenWidth::Short));
        assert_eq!(Tag::Tuple.len_width(), Some(LenWidth::Long));
        assert_eq!(Tag::ShortAsciiInterned.len_width(), Some(LenWidth::Short));
        assert_eq!(Tag::Dict.len_width(), None);
    }
}
