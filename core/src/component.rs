//! The component model used to fill a [`Document`].
//!
//! A [`Component`] renders itself through a [`RenderContext`], which keeps track of the element
//! currently open and records resumability metadata on it: listeners, held state and
//! subscriptions. Listener handles are resolved to URLs as soon as they are attached, so an
//! unknown symbol aborts the render instead of producing a document the browser cannot resume.
//!
//! ```
//! use dew_core::{
//!     BlankDocument, Component, DocumentFactory, LazyHandle, Manifest, RenderContext,
//!     RenderError, SymbolResolver,
//! };
//!
//! fn counter(cx: &mut RenderContext<'_>) -> Result<(), RenderError> {
//!     let count = cx.use_store(0);
//!     cx.element("button", |cx| {
//!         cx.on("click", LazyHandle::new("s_inc").capture(count))?;
//!         cx.text("+1");
//!         Ok(())
//!     })?;
//!     Ok(())
//! }
//!
//! let manifest = Manifest::from_json(
//!     r#"{"symbols":{"s_inc":{"bundle":"b"}},"bundles":{"b":{"path":"b.js"}}}"#,
//! )?;
//! let resolver = SymbolResolver::new(&manifest, "/build/", None);
//! let mut document = BlankDocument.create(&Default::default())?;
//! let body = document.body().unwrap();
//! RenderContext::new(&mut document, &resolver, body).render(&counter)?;
//! assert!(document.to_html().contains(r#"on:click="/build/b.js#s_inc""#));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use core::any::type_name;

use crate::{
    document::{Document, Listener, NodeId, Subscription},
    handle::{HandleId, LazyHandle},
    resolver::{Resolve, ResolveError},
    value::{ObjectId, Value},
};

/// Errors raised while rendering a component tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// A listener references a symbol that cannot be resolved.
    #[error(transparent)]
    UnknownSymbol(#[from] ResolveError),
    /// A component reported a failure.
    #[error("component `{component}` failed: {message}")]
    Component {
        /// Name of the failing component.
        component: String,
        /// Failure description.
        message: String,
    },
}

impl RenderError {
    /// Creates a [`RenderError::Component`].
    #[must_use]
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// A unit of UI that renders into a [`RenderContext`].
pub trait Component {
    /// Renders the component under the context's current element.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] when rendering cannot complete; the whole render call is aborted.
    fn render(&self, cx: &mut RenderContext<'_>) -> Result<(), RenderError>;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

impl<F> Component for F
where
    F: Fn(&mut RenderContext<'_>) -> Result<(), RenderError>,
{
    fn render(&self, cx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        self(cx)
    }
}

/// Cursor into a [`Document`] used by components while rendering.
pub struct RenderContext<'a> {
    document: &'a mut Document,
    resolver: &'a dyn Resolve,
    current: NodeId,
}

impl core::fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RenderContext")
            .field("current", &self.current)
            .field("nodes", &self.document.len())
            .finish_non_exhaustive()
    }
}

impl<'a> RenderContext<'a> {
    /// Creates a context rendering under `parent`.
    pub fn new(document: &'a mut Document, resolver: &'a dyn Resolve, parent: NodeId) -> Self {
        Self {
            document,
            resolver,
            current: parent,
        }
    }

    /// Renders a component under the current element.
    ///
    /// # Errors
    ///
    /// Propagates the component's [`RenderError`].
    pub fn render(&mut self, component: &(impl Component + ?Sized)) -> Result<(), RenderError> {
        tracing::trace!(component = component.name(), "rendering component");
        component.render(self)
    }

    /// Returns the document being rendered.
    #[must_use]
    pub fn document(&self) -> &Document {
        &*self.document
    }

    /// Returns the element new content is appended to.
    #[must_use]
    pub const fn current(&self) -> NodeId {
        self.current
    }

    /// Appends an element and renders `body` inside it.
    ///
    /// # Errors
    ///
    /// Propagates errors returned by `body`.
    pub fn element(
        &mut self,
        tag: &str,
        body: impl FnOnce(&mut Self) -> Result<(), RenderError>,
    ) -> Result<NodeId, RenderError> {
        let id = self.document.append_element(self.current, tag);
        let parent = core::mem::replace(&mut self.current, id);
        let result = body(self);
        self.current = parent;
        result.map(|()| id)
    }

    /// Sets an attribute on the current element.
    pub fn attr(&mut self, name: &str, value: impl Into<String>) {
        self.document.set_attribute(self.current, name, value);
    }

    /// Appends a text node to the current element.
    pub fn text(&mut self, text: impl Into<String>) -> NodeId {
        self.document.append_text(self.current, text)
    }

    /// Appends a comment node to the current element.
    pub fn comment(&mut self, text: impl Into<String>) -> NodeId {
        self.document.append_comment(self.current, text)
    }

    /// Allocates a heap cell that is only reachable through references.
    pub fn alloc(&mut self, value: impl Into<Value>) -> ObjectId {
        self.document.heap_mut().alloc(value)
    }

    /// Replaces the value of a heap cell.
    pub fn set(&mut self, id: ObjectId, value: impl Into<Value>) {
        self.document.heap_mut().set(id, value);
    }

    /// Allocates a heap cell held by the current element.
    pub fn use_store(&mut self, value: impl Into<Value>) -> ObjectId {
        let id = self.alloc(value);
        self.hold(id);
        id
    }

    /// Records a value as held by the current element.
    pub fn hold(&mut self, value: impl Into<Value>) {
        if let Some(meta) = self.document.meta_mut(self.current) {
            meta.held.push(value.into());
        }
    }

    /// Interns a lazy handle without attaching it anywhere.
    pub fn handle(&mut self, handle: LazyHandle) -> HandleId {
        self.document.heap_mut().intern(handle)
    }

    /// Attaches an event listener to the current element.
    ///
    /// The handle is resolved immediately and written to an `on:{event}` attribute.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownSymbol`] when the handle's symbol cannot be resolved.
    pub fn on(&mut self, event: &str, handle: LazyHandle) -> Result<HandleId, RenderError> {
        let url = self.resolver.resolve_handle(&handle)?;
        let id = self.handle(handle);

        let name = format!("on:{event}");
        let value = match self.document.attribute(self.current, &name) {
            Some(existing) => format!("{existing} {url}"),
            None => url,
        };
        self.document.set_attribute(self.current, &name, value);

        if let Some(meta) = self.document.meta_mut(self.current) {
            meta.listeners.push(Listener {
                event: event.to_string(),
                handle: id,
            });
        }
        Ok(id)
    }

    /// Records that `subscriber` reacts to changes of `source`.
    pub fn subscribe(&mut self, subscriber: impl Into<Value>, source: ObjectId) {
        if let Some(meta) = self.document.meta_mut(self.current) {
            meta.subscriptions.push(Subscription {
                subscriber: subscriber.into(),
                source,
            });
        }
    }
}
