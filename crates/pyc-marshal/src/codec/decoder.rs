//! The marshal graph decoder.
//!
//! A recursive-descent reader: each call decodes one tagged value and its
//! descendants into the [`Graph`] arena. Values whose tag carries
//! [`FLAG_REF`](crate::limits::FLAG_REF) are registered in the [`RefTable`];
//! containers are registered *before* their children are read so that a
//! child may refer back to its (still incomplete) parent.

use std::borrow::Cow;
use std::collections::hash_map::Entry;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::codec::primitives::Reader;
use crate::codec::tag::{split_tag, LenWidth, Tag};
use crate::error::DecodeError;
use crate::limits::MAX_DEPTH;
use crate::model::{Code, Graph, Handle, KeyId, KeyTable, RefTable, Value};
use crate::trace::{Field, Trace, TraceEvent, TraceValue};

/// Options for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum nesting depth of values. Deeper input fails with
    /// [`DecodeError::TooDeep`] instead of exhausting the call stack.
    pub max_depth: usize,
    /// Reject input that continues past the root value.
    ///
    /// Only checked by the whole-buffer entry points
    /// ([`decode_marshal_with`](crate::codec::decode_marshal_with),
    /// [`decode_pyc_with`](crate::codec::decode_pyc_with)).
    pub require_eof: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            require_eof: false,
        }
    }
}

impl DecodeOptions {
    /// Creates default decoding options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the nesting limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets whether trailing bytes are an error.
    pub fn with_require_eof(mut self, require_eof: bool) -> Self {
        self.require_eof = require_eof;
        self
    }
}

/// Decodes exactly one value from the reader.
///
/// The reader is left positioned just past the value. A fresh reference
/// table is used for this call only. On failure no graph is returned; the
/// reader position is unspecified.
pub fn decode_value<'a, T: Trace<'a>>(
    reader: &mut Reader<'a>,
    options: &DecodeOptions,
    trace: T,
) -> Result<Graph<'a>, DecodeError> {
    let mut decoder = Decoder {
        reader,
        graph: Graph::new(),
        refs: RefTable::new(),
        keys: KeyTable::new(options.max_depth),
        depth: 0,
        max_depth: options.max_depth,
        trace,
    };
    let root = match decoder.read_object()? {
        Some(handle) => handle,
        None => decoder.graph.alloc(Value::Null)?,
    };
    decoder.graph.set_root(root);
    Ok(decoder.graph)
}

struct Decoder<'r, 'a, T> {
    reader: &'r mut Reader<'a>,
    graph: Graph<'a>,
    refs: RefTable,
    keys: KeyTable<'a>,
    depth: usize,
    max_depth: usize,
    trace: T,
}

impl<'a, T: Trace<'a>> Decoder<'_, 'a, T> {
    /// Reads one value. `None` is the NULL terminator.
    fn read_object(&mut self) -> Result<Option<Handle>, DecodeError> {
        if self.depth >= self.max_depth {
            return Err(DecodeError::TooDeep { max: self.max_depth });
        }
        self.depth += 1;
        let result = self.read_tagged();
        self.depth -= 1;
        result
    }

    /// Reads one value where NULL is not allowed.
    fn read_child(&mut self, context: &'static str) -> Result<Handle, DecodeError> {
        self.read_object()?
            .ok_or(DecodeError::UnexpectedNull { context })
    }

    fn read_tagged(&mut self) -> Result<Option<Handle>, DecodeError> {
        let offset = self.reader.position();
        let byte = self.reader.read_byte("type")?;
        let (code, referenceable) = split_tag(byte);
        let tag = Tag::from_u8(code).ok_or(DecodeError::UnknownTag { tag: code })?;
        self.emit(offset, 1, Field::Type, TraceValue::Tag { tag, referenceable });

        let handle = match tag {
            Tag::Null => return Ok(None),
            Tag::Ref => return self.read_ref().map(Some),
            Tag::Tuple | Tag::SmallTuple => {
                let width = tag.len_width().unwrap_or(LenWidth::Long);
                let header = self.read_sequence_header(width, "tuple", referenceable)?;
                self.read_sequence(header, "tuple", Value::Tuple)?
            }
            Tag::List => {
                let header = self.read_sequence_header(LenWidth::Long, "list", referenceable)?;
                self.read_sequence(header, "list", Value::List)?
            }
            Tag::Set => self.read_set(referenceable, Value::Set)?,
            Tag::FrozenSet => self.read_set(referenceable, Value::FrozenSet)?,
            Tag::Dict => self.read_dict(referenceable)?,
            Tag::Code => self.read_code(referenceable)?,
            _ => self.read_scalar(tag, referenceable)?,
        };
        Ok(Some(handle))
    }

    /// Reads the payload of a leaf tag.
    ///
    /// Out of line: the recursive path through [`Self::read_tagged`] must
    /// keep a small stack frame.
    #[inline(never)]
    fn read_scalar(&mut self, tag: Tag, referenceable: bool) -> Result<Handle, DecodeError> {
        let value = match tag {
            Tag::None => Value::None,
            Tag::StopIteration => Value::StopIteration,
            Tag::Ellipsis => Value::Ellipsis,
            Tag::False => Value::Bool(false),
            Tag::True => Value::Bool(true),
            Tag::Int => Value::Int32(self.read_int(Field::Value)?),
            Tag::Int64 => {
                let offset = self.reader.position();
                let value = self.reader.read_i64("int64")?;
                self.emit(offset, 8, Field::Value, TraceValue::Int(value));
                Value::Int64(value)
            }
            Tag::Float => Value::Float64(self.read_float_text(Field::Value)?),
            Tag::BinaryFloat => Value::Float64(self.read_float_bin(Field::Value)?),
            Tag::Complex => {
                let real = self.read_float_text(Field::Real)?;
                let imag = self.read_float_text(Field::Imag)?;
                Value::Complex { real, imag }
            }
            Tag::BinaryComplex => {
                let real = self.read_float_bin(Field::Real)?;
                let imag = self.read_float_bin(Field::Imag)?;
                Value::Complex { real, imag }
            }
            Tag::String => {
                let bytes = self.read_payload(LenWidth::Long, "bytes object")?;
                self.emit_payload(bytes, TraceValue::Bytes(bytes));
                Value::Bytes(Cow::Borrowed(bytes))
            }
            Tag::Interned
            | Tag::Unicode
            | Tag::Ascii
            | Tag::AsciiInterned
            | Tag::ShortAscii
            | Tag::ShortAsciiInterned => {
                let width = tag.len_width().unwrap_or(LenWidth::Long);
                let bytes = self.read_payload(width, "string")?;
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidUtf8 { field: "string" })?;
                self.emit_payload(bytes, TraceValue::Text(text));
                Value::Text(Cow::Borrowed(text))
            }
            // Long and Unknown; container tags are dispatched before this.
            other => return Err(DecodeError::Unsupported { tag: other.as_u8() as char }),
        };
        self.scalar(value, referenceable)
    }

    // =========================================================================
    // Reference table
    // =========================================================================

    /// Allocates a complete scalar, registering it if flagged.
    fn scalar(&mut self, value: Value<'a>, referenceable: bool) -> Result<Handle, DecodeError> {
        let handle = self.graph.alloc(value)?;
        if referenceable {
            self.refs.insert(handle);
        }
        Ok(handle)
    }

    /// Allocates a placeholder for a container and registers it if flagged.
    ///
    /// The slot holds `Value::Null` until [`Graph::set`] fills it in.
    fn reserve(&mut self, referenceable: bool) -> Result<Handle, DecodeError> {
        self.scalar(Value::Null, referenceable)
    }

    /// Keys a dict key or set element for deduplication.
    fn key_of(&mut self, handle: Handle) -> Result<KeyId, DecodeError> {
        self.keys.key_of(&self.graph, handle, self.depth)
    }

    fn read_ref(&mut self) -> Result<Handle, DecodeError> {
        let offset = self.reader.position();
        let index = self.reader.read_i32("reference index")?;
        let target = self.refs.get(index)?;
        self.emit(offset, 4, Field::RefIndex, TraceValue::Ref { index, target });
        Ok(target)
    }

    // =========================================================================
    // Scalars
    // =========================================================================

    fn read_int(&mut self, field: Field) -> Result<i32, DecodeError> {
        let offset = self.reader.position();
        let value = self.reader.read_i32("int")?;
        self.emit(offset, 4, field, TraceValue::Int(i64::from(value)));
        Ok(value)
    }

    fn read_float_bin(&mut self, field: Field) -> Result<f64, DecodeError> {
        let offset = self.reader.position();
        let value = self.reader.read_f64("binary float")?;
        self.emit(offset, 8, field, TraceValue::Float(value));
        Ok(value)
    }

    /// Reads a 1-byte length followed by a decimal float literal.
    fn read_float_text(&mut self, field: Field) -> Result<f64, DecodeError> {
        let offset = self.reader.position();
        let len = self.reader.read_byte("float length")? as usize;
        self.emit(offset, 1, Field::Length, TraceValue::Int(len as i64));

        let offset = self.reader.position();
        let raw = self.reader.read_bytes(len, "float literal")?;
        let malformed = || DecodeError::MalformedNumber {
            field: "float",
            text: String::from_utf8_lossy(raw).into_owned(),
        };
        let text = std::str::from_utf8(raw).map_err(|_| malformed())?;
        let value: f64 = text.parse().map_err(|_| malformed())?;
        self.emit(offset, len, field, TraceValue::FloatText { text, value });
        Ok(value)
    }

    /// Reads a length prefix. Negative 4-byte lengths are rejected before
    /// anything else is consumed.
    fn read_len(&mut self, width: LenWidth, field: &'static str) -> Result<usize, DecodeError> {
        let offset = self.reader.position();
        let (len, size) = match width {
            LenWidth::Short => (i64::from(self.reader.read_byte(field)?), 1),
            LenWidth::Long => (i64::from(self.reader.read_i32(field)?), 4),
        };
        self.emit(offset, size, Field::Length, TraceValue::Int(len));
        usize::try_from(len).map_err(|_| DecodeError::InvalidLength { field, len })
    }

    fn read_payload(&mut self, width: LenWidth, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = self.read_len(width, field)?;
        self.reader.read_bytes(len, field)
    }

    fn emit_payload(&mut self, bytes: &'a [u8], value: TraceValue<'a>) {
        let offset = self.reader.position() - bytes.len();
        self.emit(offset, bytes.len(), Field::Value, value);
    }

    // =========================================================================
    // Containers
    // =========================================================================

    /// Reads an element count and reserves the container slot.
    ///
    /// Every element takes at least one byte, so a count larger than the
    /// remaining input is rejected before anything is allocated for it.
    fn read_sequence_header(
        &mut self,
        width: LenWidth,
        field: &'static str,
        referenceable: bool,
    ) -> Result<(Handle, usize), DecodeError> {
        let len = self.read_len(width, field)?;
        if len > self.reader.remaining_len() {
            return Err(DecodeError::InvalidLength { field, len: len as i64 });
        }
        Ok((self.reserve(referenceable)?, len))
    }

    fn read_sequence(
        &mut self,
        (handle, len): (Handle, usize),
        context: &'static str,
        make: fn(Vec<Handle>) -> Value<'a>,
    ) -> Result<Handle, DecodeError> {
        let mut items = Vec::with_capacity(len);
        for i in 0..len {
            self.emit_slot(Field::Item(i));
            items.push(self.read_child(context)?);
        }
        self.graph.set(handle, make(items));
        Ok(handle)
    }

    fn read_set(
        &mut self,
        referenceable: bool,
        make: fn(Vec<Handle>) -> Value<'a>,
    ) -> Result<Handle, DecodeError> {
        let (handle, len) = self.read_sequence_header(LenWidth::Long, "set", referenceable)?;
        let mut items = Vec::with_capacity(len);
        let mut seen = FxHashSet::with_capacity_and_hasher(len, Default::default());
        for i in 0..len {
            self.emit_slot(Field::Item(i));
            let item = self.read_child("set")?;
            if seen.insert(self.key_of(item)?) {
                items.push(item);
            }
        }
        self.graph.set(handle, make(items));
        Ok(handle)
    }

    /// Reads key/value pairs until a NULL key.
    fn read_dict(&mut self, referenceable: bool) -> Result<Handle, DecodeError> {
        let handle = self.reserve(referenceable)?;
        let mut entries: Vec<(Handle, Handle)> = Vec::new();
        let mut index: FxHashMap<KeyId, usize> = FxHashMap::default();
        let mut i = 0;
        loop {
            self.emit_slot(Field::Key(i));
            let Some(key) = self.read_object()? else {
                break;
            };
            self.emit_slot(Field::DictValue(i));
            let value = self.read_child("dict")?;
            match index.entry(self.key_of(key)?) {
                Entry::Occupied(slot) => entries[*slot.get()].1 = value,
                Entry::Vacant(slot) => {
                    slot.insert(entries.len());
                    entries.push((key, value));
                }
            }
            i += 1;
        }
        self.graph.set(handle, Value::Dict(entries));
        Ok(handle)
    }

    /// Reads a code object. Field order is fixed by the wire format.
    #[inline(never)]
    fn read_code(&mut self, referenceable: bool) -> Result<Handle, DecodeError> {
        let handle = self.reserve(referenceable)?;
        let argcount = self.read_int(Field::Code("argcount"))?;
        let posonlyargcount = self.read_int(Field::Code("posonlyargcount"))?;
        let kwonlyargcount = self.read_int(Field::Code("kwonlyargcount"))?;
        let nlocals = self.read_int(Field::Code("nlocals"))?;
        let stacksize = self.read_int(Field::Code("stacksize"))?;
        let offset = self.reader.position();
        let flags = self.reader.read_u32("flags")?;
        self.emit(offset, 4, Field::Code("flags"), TraceValue::Flags(flags));

        let code = self.read_code_child("code")?;
        let consts = self.read_code_child("consts")?;
        let names = self.read_code_child("names")?;
        let varnames = self.read_code_child("varnames")?;
        let freevars = self.read_code_child("freevars")?;
        let cellvars = self.read_code_child("cellvars")?;
        let filename = self.read_code_child("filename")?;
        let name = self.read_code_child("name")?;
        let firstlineno = self.read_int(Field::Code("firstlineno"))?;
        let lnotab = self.read_code_child("lnotab")?;

        let code = Code {
            argcount,
            posonlyargcount,
            kwonlyargcount,
            nlocals,
            stacksize,
            flags,
            code,
            consts,
            names,
            varnames,
            freevars,
            cellvars,
            filename,
            name,
            firstlineno,
            lnotab,
        };
        self.graph.set(handle, Value::Code(Box::new(code)));
        Ok(handle)
    }

    fn read_code_child(&mut self, name: &'static str) -> Result<Handle, DecodeError> {
        self.emit_slot(Field::Code(name));
        self.read_child(name)
    }

    // =========================================================================
    // Trace
    // =========================================================================

    #[inline]
    fn emit(&mut self, offset: usize, len: usize, field: Field, value: TraceValue<'a>) {
        self.trace.record(TraceEvent {
            depth: self.depth.saturating_sub(1),
            offset,
            len,
            field,
            value,
        });
    }

    #[inline]
    fn emit_slot(&mut self, field: Field) {
        let offset = self.reader.position();
        self.emit(offset, 0, field, TraceValue::Slot);
    }
}
