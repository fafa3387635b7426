//! Data model for decoded marshal data.
//!
//! - [`Value`]: one decoded node, referring to children by [`Handle`]
//! - [`Graph`]: the arena owning every node of one decode
//! - [`RefTable`]: the back-reference table used while decoding
//! - [`KeyTable`]: interned value identity for dict keys and set elements

pub mod graph;
pub mod key;
pub mod refs;
pub mod value;

pub use graph::Graph;
pub use key::{HashKey, KeyId, KeyTable};
pub use refs::RefTable;
pub use value::{Code, Handle, Value};
