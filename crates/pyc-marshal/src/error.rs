//! Error types for marshal decoding.

use thiserror::Error;

/// Broad classification of decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// M001: Bad container preamble
    InvalidHeader,
    /// M002: Input ended early
    Truncated,
    /// M003: Unknown or unsupported tag
    BadTag,
    /// M004: Malformed length, number or text payload
    MalformedPayload,
    /// M005: Reference table or graph-shape violation
    BadGraph,
    /// M006: Resource limit tripped
    LimitExceeded,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "M001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidHeader => "M001",
            ErrorCode::Truncated => "M002",
            ErrorCode::BadTag => "M003",
            ErrorCode::MalformedPayload => "M004",
            ErrorCode::BadGraph => "M005",
            ErrorCode::LimitExceeded => "M006",
        }
    }
}

/// Error during marshal or container decoding.
///
/// Every variant is terminal for the decode call that produced it: no
/// partial graph is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === M001: Header ===
    #[error("[M001] invalid magic number {found:#010x}: missing \\r\\n suffix")]
    InvalidMagic { found: u32 },

    // === M002: Truncated ===
    #[error("[M002] unexpected end of input while reading {context}")]
    Truncated { context: &'static str },

    // === M003: Tags ===
    #[error("[M003] unknown type tag {tag:#04x} ({})", printable(.tag))]
    UnknownTag { tag: u8 },

    #[error("[M003] type tag {tag:?} is recognized but not supported")]
    Unsupported { tag: char },

    // === M004: Payloads ===
    #[error("[M004] {field} size out of range: {len}")]
    InvalidLength { field: &'static str, len: i64 },

    #[error("[M004] malformed {field} literal: {text:?}")]
    MalformedNumber { field: &'static str, text: String },

    #[error("[M004] invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    // === M005: Graph shape ===
    #[error("[M005] reference {index} out of bounds (table size: {size})")]
    DanglingReference { index: i32, size: usize },

    #[error("[M005] NULL object in marshal data for {context}")]
    UnexpectedNull { context: &'static str },

    #[error("[M005] unhashable {kind} used as a dict key or set element")]
    Unhashable { kind: &'static str },

    #[error("[M005] {count} trailing bytes after the root value")]
    TrailingBytes { count: usize },

    // === M006: Limits ===
    #[error("[M006] nesting deeper than {max} levels")]
    TooDeep { max: usize },
}

impl DecodeError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            DecodeError::InvalidMagic { .. } => ErrorCode::InvalidHeader,
            DecodeError::Truncated { .. } => ErrorCode::Truncated,
            DecodeError::UnknownTag { .. } | DecodeError::Unsupported { .. } => ErrorCode::BadTag,
            DecodeError::InvalidLength { .. }
            | DecodeError::MalformedNumber { .. }
            | DecodeError::InvalidUtf8 { .. } => ErrorCode::MalformedPayload,
            DecodeError::DanglingReference { .. }
            | DecodeError::UnexpectedNull { .. }
            | DecodeError::Unhashable { .. }
            | DecodeError::TrailingBytes { .. } => ErrorCode::BadGraph,
            DecodeError::TooDeep { .. } => ErrorCode::LimitExceeded,
        }
    }
}

fn printable(tag: &u8) -> char {
    if tag.is_ascii_graphic() { *tag as char } else { '?' }
}
