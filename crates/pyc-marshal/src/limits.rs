//! Security limits and format constants.
//!
//! The decoder treats its input as untrusted; these bound the work and
//! memory a single decode may consume.

/// Default maximum nesting depth of container values.
///
/// Low enough that a debug build stays within a 2 MiB thread stack.
pub const MAX_DEPTH: usize = 1000;

/// High bit of a tag byte: the value is registered in the reference table.
pub const FLAG_REF: u8 = 0x80;

/// Size of the fixed container preamble (magic + flags + 8 mode bytes).
pub const HEADER_LEN: usize = 16;

/// Upper half of every valid magic number: `b"\r\n"` read little-endian.
pub const MAGIC_SUFFIX: u16 = 0x0A0D;

