//! Decoder for the marshal serialization format and `.pyc` files.
//!
//! Marshal is a tagged, length-prefixed binary format whose values can refer
//! back to earlier values, including containers that contain themselves.
//! This crate decodes such streams into an arena-backed value graph and can
//! report every field it reads as a structured event.
//!
//! # Quick Start
//!
//! ```rust
//! use pyc_marshal::{decode_marshal, Value};
//!
//! // A referenceable 1-tuple whose only element is itself.
//! let bytes = [b'(' | 0x80, 1, 0, 0, 0, b'r', 0, 0, 0, 0];
//! let graph = decode_marshal(&bytes).unwrap();
//!
//! let root = graph.root();
//! assert_eq!(graph.get(root), &Value::Tuple(vec![root]));
//! ```
//!
//! # Modules
//!
//! - [`model`]: Decoded values, the graph arena and the reference table
//! - [`codec`]: Header and marshal decoding
//! - [`trace`]: Structured per-field decode events
//! - [`error`]: Error types
//! - [`limits`]: Security limits and format constants
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - Nesting depth is capped ([`DecodeOptions::max_depth`]), both while
//!   reading and while keying dict and set members through back-references
//! - Key computation is linear in the size of the graph: each node is keyed
//!   once and shared subtuples are never re-expanded
//! - Element counts are checked against the remaining input before allocation
//! - Back-references are bounds-checked against the reference table
//! - Every failure is a [`DecodeError`]; there is no partial result
//!
//! # Wire Format
//!
//! A `.pyc` file is a 16-byte preamble (magic, flags, and either a source
//! mtime/size pair or a source hash) followed by one marshal value, normally
//! a code object. Code objects use the 3.8 – 3.10 field layout.

pub mod codec;
pub mod error;
pub mod limits;
pub mod model;
pub mod trace;

// Re-export commonly used types at crate root
pub use codec::{
    decode_marshal, decode_marshal_with, decode_pyc, decode_pyc_with, decode_value, DecodeOptions,
    Header, InvalidationKind, InvalidationMode, Pyc, Reader, Tag,
};
pub use error::{DecodeError, ErrorCode};
pub use model::{Code, Graph, Handle, HashKey, KeyId, KeyTable, RefTable, Value};
pub use trace::{Field, Trace, TraceEvent, TraceFn, TraceValue};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
