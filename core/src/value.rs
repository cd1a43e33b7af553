//! Values captured while rendering.
//!
//! Components allocate state in a [`Heap`]. Heap cells carry reference identity through
//! [`ObjectId`]: two places referring to the same cell refer to the same value, which is how the
//! snapshot builder deduplicates shared state and how cyclic structures are expressed.

use core::hash::{Hash, Hasher};

use indexmap::{IndexMap, IndexSet};

use crate::handle::{HandleId, LazyHandle};

/// A value reachable from the rendered tree.
///
/// Equality is structural with two refinements: numbers compare by bit pattern, so `NaN` equals
/// itself, and map entries compare in insertion order. This keeps [`Eq`] and [`Hash`] consistent
/// for handle interning.
#[derive(Debug, Clone)]
pub enum Value {
    /// The absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A string-keyed map, in insertion order.
    Map(IndexMap<String, Value>),
    /// A reference to a heap cell.
    Object(ObjectId),
    /// A reference to an interned lazy handle.
    Handle(HandleId),
    /// A live runtime resource that cannot be reproduced on the client.
    ///
    /// The string describes the resource for diagnostics.
    Opaque(String),
}

impl Value {
    /// Creates an opaque value.
    #[must_use]
    pub fn opaque(description: impl Into<String>) -> Self {
        Self::Opaque(description.into())
    }

    /// Returns `true` if this value is [`Value::Opaque`].
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque(_))
    }

    /// Returns the nested values of a list or map, in order.
    pub fn children(&self) -> Box<dyn Iterator<Item = &Self> + '_> {
        match self {
            Self::List(items) => Box::new(items.iter()),
            Self::Map(entries) => Box::new(entries.values()),
            _ => Box::new(core::iter::empty()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) | (Self::Opaque(a), Self::Opaque(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a.len() == b.len() && a.iter().eq(b.iter()),
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Handle(a), Self::Handle(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(value) => value.hash(state),
            Self::Number(value) => value.to_bits().hash(state),
            Self::String(value) | Self::Opaque(value) => value.hash(state),
            Self::List(items) => items.hash(state),
            Self::Map(entries) => {
                state.write_usize(entries.len());
                for entry in entries {
                    entry.hash(state);
                }
            }
            Self::Object(id) => id.hash(state),
            Self::Handle(id) => id.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(value: IndexMap<String, Value>) -> Self {
        Self::Map(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Self::Object(value)
    }
}

impl From<HandleId> for Value {
    fn from(value: HandleId) -> Self {
        Self::Handle(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Identifier of a heap cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Creates a new [`ObjectId`] from the raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index backing this identifier.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Arena of heap cells and interned lazy handles for one rendered document.
#[derive(Debug, Default, Clone)]
pub struct Heap {
    objects: Vec<Value>,
    handles: IndexSet<LazyHandle>,
}

impl Heap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new cell holding `value`.
    pub fn alloc(&mut self, value: impl Into<Value>) -> ObjectId {
        let id = ObjectId::new(self.objects.len());
        self.objects.push(value.into());
        id
    }

    /// Returns the value stored in a cell.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&Value> {
        self.objects.get(id.index())
    }

    /// Replaces the value stored in a cell, returning the previous value.
    ///
    /// Returns `None` when the cell does not exist.
    pub fn set(&mut self, id: ObjectId, value: impl Into<Value>) -> Option<Value> {
        self.objects
            .get_mut(id.index())
            .map(|slot| core::mem::replace(slot, value.into()))
    }

    /// Interns a handle. Equal handles yield the same identifier.
    pub fn intern(&mut self, handle: LazyHandle) -> HandleId {
        HandleId::new(self.handles.insert_full(handle).0)
    }

    /// Returns an interned handle.
    #[must_use]
    pub fn handle(&self, id: HandleId) -> Option<&LazyHandle> {
        self.handles.get_index(id.index())
    }

    /// Returns every interned handle in interning order.
    pub fn handles(&self) -> impl Iterator<Item = (HandleId, &LazyHandle)> {
        self.handles
            .iter()
            .enumerate()
            .map(|(index, handle)| (HandleId::new(index), handle))
    }

    /// Returns the number of allocated cells.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` when no cell has been allocated.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
