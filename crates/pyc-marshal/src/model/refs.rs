//! The reference table.
//!
//! Referenceable values are appended in the order their tag bytes are read
//! (containers before their children, scalars once complete). A back-reference
//! names a slot by its insertion index.

use crate::error::DecodeError;
use crate::model::Handle;

/// Append-only, index-addressed table of handles.
#[derive(Debug, Clone, Default)]
pub struct RefTable {
    slots: Vec<Handle>,
}

impl RefTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle and returns its slot index.
    pub fn insert(&mut self, handle: Handle) -> usize {
        self.slots.push(handle);
        self.slots.len() - 1
    }

    /// Resolves a back-reference index.
    pub fn get(&self, index: i32) -> Result<Handle, DecodeError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.slots.get(i).copied())
            .ok_or(DecodeError::DanglingReference {
                index,
                size: self.slots.len(),
            })
    }

    /// Returns the number of registered slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
