//! Lazy handles: references to deferred behavior that are resolved to URLs only when emitted.

use crate::value::Value;

/// An unresolved reference to a unit of deferred behavior, such as an event listener body.
///
/// The handle carries the symbol identifier assigned by the bundler, an optional hint naming the
/// chunk the symbol was captured in, and the values the behavior closes over.
///
/// ```
/// use dew_core::{LazyHandle, Value};
///
/// let handle = LazyHandle::new("s_click")
///     .with_chunk("app.tsx")
///     .capture(Value::from(42));
/// assert_eq!(handle.symbol(), "s_click");
/// assert_eq!(handle.captures().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LazyHandle {
    symbol: String,
    chunk: Option<String>,
    captures: Vec<Value>,
}

impl LazyHandle {
    /// Creates a handle for the given symbol identifier.
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            chunk: None,
            captures: Vec::new(),
        }
    }

    /// Records the chunk the symbol was captured in.
    #[must_use]
    pub fn with_chunk(mut self, chunk: impl Into<String>) -> Self {
        self.chunk = Some(chunk.into());
        self
    }

    /// Adds a captured value.
    #[must_use]
    pub fn capture(mut self, value: impl Into<Value>) -> Self {
        self.captures.push(value.into());
        self
    }

    /// Returns the symbol identifier.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the capture-chunk hint, if one was recorded.
    #[must_use]
    pub fn chunk(&self) -> Option<&str> {
        self.chunk.as_deref()
    }

    /// Returns the captured values in capture order.
    #[must_use]
    pub fn captures(&self) -> &[Value] {
        &self.captures
    }
}

/// Identifier of a handle interned in a [`Heap`](crate::Heap).
///
/// Equal handles intern to the same identifier, so two listeners backed by the same symbol and
/// captures share one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(usize);

impl HandleId {
    /// Creates a new [`HandleId`] from the raw index.
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
