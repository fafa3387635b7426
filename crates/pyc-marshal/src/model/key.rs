//! Structural hash keys for dict and set membership.
//!
//! Dict keys and set elements are deduplicated by value, with the numeric
//! tower collapsed the way mapping lookups see it: `True`, `1`, `1.0` and
//! `1+0j` are the same key.
//!
//! Keys are interned in a [`KeyTable`]. A tuple's key is the list of its
//! elements' [`KeyId`]s and each node is keyed at most once, so keying is
//! linear in the size of the graph even when subtuples are shared.

use std::borrow::Cow;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::DecodeError;
use crate::model::{Graph, Handle, Value};

/// Interned key. Two nodes have equal ids iff their keys are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u32);

/// Hashable projection of one node, with children already interned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey<'a> {
    None,
    StopIteration,
    Ellipsis,
    Int(i64),
    /// Non-integral float, by bit pattern.
    Float(u64),
    Complex(u64, u64),
    Bytes(Cow<'a, [u8]>),
    Text(Cow<'a, str>),
    Tuple(Vec<KeyId>),
    /// Distinct element ids in sorted order.
    FrozenSet(Vec<KeyId>),
    /// Compared by node identity (code objects, NaNs).
    Identity(Handle),
}

/// Interner for the keys of one graph.
///
/// Only complete nodes are memoized; a decoded node never changes once its
/// slot is filled in.
#[derive(Debug)]
pub struct KeyTable<'a> {
    ids: FxHashMap<HashKey<'a>, KeyId>,
    by_handle: FxHashMap<Handle, KeyId>,
    visiting: FxHashSet<Handle>,
    max_depth: usize,
}

impl<'a> KeyTable<'a> {
    /// Creates an empty table whose walks fail past `max_depth` levels.
    pub fn new(max_depth: usize) -> Self {
        Self {
            ids: FxHashMap::default(),
            by_handle: FxHashMap::default(),
            visiting: FxHashSet::default(),
            max_depth,
        }
    }

    /// Returns the key id of the node behind `handle`.
    ///
    /// `depth` is the nesting level the caller is already at; it counts
    /// against the same limit as the walk.
    pub fn key_of(&mut self, graph: &Graph<'a>, handle: Handle, depth: usize) -> Result<KeyId, DecodeError> {
        if let Some(&id) = self.by_handle.get(&handle) {
            return Ok(id);
        }
        let key = match graph.get(handle) {
            // A reserved slot whose container has not finished decoding.
            Value::Null => return Err(DecodeError::Unhashable { kind: "incomplete container" }),
            Value::None => HashKey::None,
            Value::StopIteration => HashKey::StopIteration,
            Value::Ellipsis => HashKey::Ellipsis,
            Value::Bool(b) => HashKey::Int(i64::from(*b)),
            Value::Int32(v) => HashKey::Int(i64::from(*v)),
            Value::Int64(v) => HashKey::Int(*v),
            Value::Float64(f) => float_key(*f).unwrap_or(HashKey::Identity(handle)),
            Value::Complex { real, imag } => {
                if real.is_nan() || imag.is_nan() {
                    HashKey::Identity(handle)
                } else if *imag == 0.0 {
                    float_key(*real).unwrap_or(HashKey::Identity(handle))
                } else {
                    HashKey::Complex(canonical_bits(*real), canonical_bits(*imag))
                }
            }
            Value::Bytes(b) => HashKey::Bytes(b.clone()),
            Value::Text(s) => HashKey::Text(s.clone()),
            Value::Tuple(items) => HashKey::Tuple(self.element_keys(graph, handle, items, depth)?),
            Value::FrozenSet(items) => {
                let mut ids = self.element_keys(graph, handle, items, depth)?;
                ids.sort_unstable();
                ids.dedup();
                HashKey::FrozenSet(ids)
            }
            Value::Code(_) => HashKey::Identity(handle),
            other @ (Value::List(_) | Value::Dict(_) | Value::Set(_)) => {
                return Err(DecodeError::Unhashable { kind: other.kind() });
            }
        };
        let id = self.intern(key);
        self.by_handle.insert(handle, id);
        Ok(id)
    }

    /// Returns the number of distinct keys interned so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing was interned.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn element_keys(
        &mut self,
        graph: &Graph<'a>,
        handle: Handle,
        items: &[Handle],
        depth: usize,
    ) -> Result<Vec<KeyId>, DecodeError> {
        if depth >= self.max_depth {
            return Err(DecodeError::TooDeep { max: self.max_depth });
        }
        if !self.visiting.insert(handle) {
            return Err(DecodeError::Unhashable { kind: "recursive tuple" });
        }
        let mut ids = Vec::with_capacity(items.len());
        let mut result = Ok(());
        for item in items {
            match self.key_of(graph, *item, depth + 1) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.visiting.remove(&handle);
        result.map(|()| ids)
    }

    fn intern(&mut self, key: HashKey<'a>) -> KeyId {
        // At most one key per node, and node counts fit in u32.
        let next = KeyId(self.ids.len() as u32);
        *self.ids.entry(key).or_insert(next)
    }
}

/// Integral floats collapse onto `Int`. Returns None for NaN.
fn float_key(f: f64) -> Option<HashKey<'static>> {
    if f.is_nan() {
        return None;
    }
    // 2^63 is exactly representable; everything below it fits in i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) {
        Some(HashKey::Int(f as i64))
    } else {
        Some(HashKey::Float(canonical_bits(f)))
    }
}

fn canonical_bits(f: f64) -> u64 {
    if f == 0.0 { 0 } else { f.to_bits() }
}
