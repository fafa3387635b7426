//! Structured decode events.
//!
//! The decoder reports every field it reads to a [`Trace`] sink: where it
//! started, how many raw bytes it covered, what slot it fills and what it
//! was interpreted as. Rendering events as text is left to the consumer.

use crate::codec::header::InvalidationKind;
use crate::codec::tag::Tag;
use crate::model::Handle;

/// The slot a traced field fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "slot", content = "arg", rename_all = "snake_case"))]
pub enum Field {
    /// Container preamble field, by name.
    Header(&'static str),
    /// A tag byte.
    Type,
    /// A scalar payload.
    Value,
    /// A length prefix.
    Length,
    /// Real part of a complex.
    Real,
    /// Imaginary part of a complex.
    Imag,
    /// Start of the n-th element of a tuple, list or set.
    Item(usize),
    /// Start of the n-th dict key.
    Key(usize),
    /// Start of the n-th dict value.
    DictValue(usize),
    /// A code object field, by name.
    Code(&'static str),
    /// The index of a back-reference.
    RefIndex,
}

/// The interpreted content of a traced field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value", rename_all = "snake_case"))]
pub enum TraceValue<'a> {
    /// Marks a slot; the following events describe its content.
    Slot,
    Tag { tag: Tag, referenceable: bool },
    Int(i64),
    Flags(u32),
    Float(f64),
    /// A decimal float literal and its parsed value.
    FloatText { text: &'a str, value: f64 },
    Bytes(&'a [u8]),
    Text(&'a str),
    Mode(InvalidationKind),
    /// A resolved back-reference.
    Ref { index: i32, target: Handle },
}

/// One field read.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TraceEvent<'a> {
    /// Nesting depth of the value the field belongs to.
    pub depth: usize,
    /// Byte offset of the field in the input.
    pub offset: usize,
    /// Raw byte count of the field (0 for slot markers).
    pub len: usize,
    pub field: Field,
    pub value: TraceValue<'a>,
}

/// Receiver of decode events.
pub trait Trace<'a> {
    fn record(&mut self, event: TraceEvent<'a>);
}

/// Discards every event.
impl<'a> Trace<'a> for () {
    #[inline]
    fn record(&mut self, _event: TraceEvent<'a>) {}
}

/// Collects events in order.
impl<'a> Trace<'a> for Vec<TraceEvent<'a>> {
    fn record(&mut self, event: TraceEvent<'a>) {
        self.push(event);
    }
}

/// Streams events to a closure.
pub struct TraceFn<F>(pub F);

impl<'a, F: FnMut(TraceEvent<'a>)> Trace<'a> for TraceFn<F> {
    fn record(&mut self, event: TraceEvent<'a>) {
        (self.0)(event)
    }
}

impl<'a, T: Trace<'a> + ?Sized> Trace<'a> for &mut T {
    fn record(&mut self, event: TraceEvent<'a>) {
        (**self).record(event)
    }
}
