use crate::device::AllocatorAttributes;
use crate::kernel::TensorValue;
use crate::tensor::{Tensor, TensorRef};
use std::ops::{Index, IndexMut, Range};

/// One tensor slot of the entry buffer.
///
/// An entry either holds a value in `val`, or a `reference` to a tensor owned
/// elsewhere. In the latter case `val` is only a cache of the last
/// dereferenced copy, taken under the reference's guard.
#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub val: Tensor,
    pub reference: Option<TensorRef>,
    pub has_value: bool,
    pub alloc_attr: AllocatorAttributes,
}

impl Entry {
    pub fn from_value(val: Tensor, alloc_attr: AllocatorAttributes) -> Self {
        Self {
            val,
            reference: None,
            has_value: true,
            alloc_attr,
        }
    }

    pub fn from_ref(reference: TensorRef, alloc_attr: AllocatorAttributes) -> Self {
        Self {
            val: Tensor::empty(),
            reference: Some(reference),
            has_value: true,
            alloc_attr,
        }
    }

    /// Build an entry from a kernel output
    pub fn from_output(value: TensorValue, alloc_attr: AllocatorAttributes) -> Self {
        match value {
            TensorValue::Value(t) => Self::from_value(t, alloc_attr),
            TensorValue::Ref(r) => Self::from_ref(r, alloc_attr),
        }
    }

    pub fn is_ref(&self) -> bool {
        self.reference.is_some()
    }

    /// True for a slot holding nothing: no value, no reference, and `val` is
    /// the empty tensor.
    pub fn is_empty_sentinel(&self) -> bool {
        !self.has_value && self.reference.is_none() && self.val.is_empty_sentinel()
    }

    /// The tensor this entry stands for, dereferencing under the guard
    pub fn resolve(&self) -> Option<Tensor> {
        if !self.has_value {
            return None;
        }
        match &self.reference {
            Some(r) => Some(r.snapshot()),
            None => Some(self.val.clone()),
        }
    }

    pub fn clear(&mut self) {
        *self = Entry::default();
    }
}

/// Per-run flat array of entries, one per (node, input slot).
///
/// Node `n`'s inputs live at `input_start(n) .. input_start(n) + num_inputs(n)`.
#[derive(Debug, Clone, Default)]
pub struct EntryBuffer {
    entries: Vec<Entry>,
}

impl EntryBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            entries: vec![Entry::default(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn slots(&self, range: Range<usize>) -> &[Entry] {
        &self.entries[range]
    }

    /// Reset every entry in `range` to the empty sentinel
    pub fn clear_range(&mut self, range: Range<usize>) {
        for entry in &mut self.entries[range] {
            entry.clear();
        }
    }
}

impl Index<usize> for EntryBuffer {
    type Output = Entry;

    fn index(&self, index: usize) -> &Entry {
        &self.entries[index]
    }
}

impl IndexMut<usize> for EntryBuffer {
    fn index_mut(&mut self, index: usize) -> &mut Entry {
        &mut self.entries[index]
    }
}
