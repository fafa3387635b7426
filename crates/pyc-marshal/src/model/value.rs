//! Decoded value nodes.
//!
//! Values live in a [`Graph`](crate::model::Graph) arena and refer to their
//! children by [`Handle`]. Two parents holding the same handle alias the same
//! node, which is how back-references and cycles are represented.

use std::borrow::Cow;
use std::fmt;

use crate::error::DecodeError;

/// Index of a node in a [`Graph`](crate::model::Graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Handle(pub(crate) u32);

impl Handle {
    /// Converts an arena index, failing past the 32-bit handle space.
    pub(crate) fn from_index(index: usize) -> Result<Self, DecodeError> {
        u32::try_from(index).map(Handle).map_err(|_| DecodeError::InvalidLength {
            field: "graph",
            len: i64::try_from(index).unwrap_or(i64::MAX),
        })
    }

    /// Returns the arena index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One decoded node.
///
/// Byte and text payloads borrow from the input buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// The NULL terminator. Only ever a bare root, or the placeholder of a
    /// container slot that is still being populated.
    Null,
    None,
    StopIteration,
    Ellipsis,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Complex { real: f64, imag: f64 },
    Bytes(Cow<'a, [u8]>),
    Text(Cow<'a, str>),
    Tuple(Vec<Handle>),
    List(Vec<Handle>),
    /// Insertion-ordered key/value pairs with unique keys.
    Dict(Vec<(Handle, Handle)>),
    Set(Vec<Handle>),
    FrozenSet(Vec<Handle>),
    Code(Box<Code>),
}

impl<'a> Value<'a> {
    /// Returns a short name for the kind of this value.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::None => "None",
            Value::StopIteration => "StopIteration",
            Value::Ellipsis => "Ellipsis",
            Value::Bool(_) => "bool",
            Value::Int32(_) | Value::Int64(_) => "int",
            Value::Float64(_) => "float",
            Value::Complex { .. } => "complex",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Set(_) => "set",
            Value::FrozenSet(_) => "frozenset",
            Value::Code(_) => "code",
        }
    }

    /// Returns true for the container kinds.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Value::Tuple(_)
                | Value::List(_)
                | Value::Dict(_)
                | Value::Set(_)
                | Value::FrozenSet(_)
                | Value::Code(_)
        )
    }

    /// Returns the handles of all direct children, in wire order.
    pub fn children(&self) -> Vec<Handle> {
        match self {
            Value::Tuple(items) | Value::List(items) | Value::Set(items) | Value::FrozenSet(items) => {
                items.clone()
            }
            Value::Dict(entries) => entries.iter().flat_map(|(k, v)| [*k, *v]).collect(),
            Value::Code(code) => code.children().to_vec(),
            _ => Vec::new(),
        }
    }

    /// Returns the integer payload, widening 32-bit values.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the byte-string payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the elements of a tuple, list, set or frozenset.
    pub fn as_seq(&self) -> Option<&[Handle]> {
        match self {
            Value::Tuple(items) | Value::List(items) | Value::Set(items) | Value::FrozenSet(items) => {
                Some(items)
            }
            _ => None,
        }
    }
}

/// A compiled code object (3.8 – 3.10 layout).
///
/// Fields are listed in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub argcount: i32,
    pub posonlyargcount: i32,
    pub kwonlyargcount: i32,
    pub nlocals: i32,
    pub stacksize: i32,
    pub flags: u32,
    /// Bytecode (`bytes`).
    pub code: Handle,
    pub consts: Handle,
    pub names: Handle,
    pub varnames: Handle,
    pub freevars: Handle,
    pub cellvars: Handle,
    pub filename: Handle,
    /// Qualified name.
    pub name: Handle,
    pub firstlineno: i32,
    /// Line-number table (`bytes`).
    pub lnotab: Handle,
}

impl Code {
    /// Child handles in wire order.
    pub fn children(&self) -> [Handle; 9] {
        [
            self.code,
            self.consts,
            self.names,
            self.varnames,
            self.freevars,
            self.cellvars,
            self.filename,
            self.name,
            self.lnotab,
        ]
    }
}
