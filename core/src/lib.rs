//! # dew-core
//!
//! Building blocks shared by the `dew` renderer:
//!
//! - [`Manifest`]: the build-time table mapping symbols to bundles and bundles to their imports.
//! - [`LazyHandle`]: an unresolved reference to a unit of deferred behavior.
//! - [`Heap`] and [`Value`]: the identity-carrying state captured while rendering.
//! - [`Document`]: a DOM-like arena that records listeners, held values and subscriptions per node.
//! - [`Component`] and [`RenderContext`]: the tree-rendering service that fills a document.
//! - [`SymbolResolver`]: turns symbol identifiers into deployable URLs.
//!
//! Rendering itself (phases, snapshot capture, prefetch graphs) lives in the `dew` crate.

pub mod component;
pub mod document;
pub mod handle;
pub mod manifest;
pub mod resolver;
pub mod value;

pub use component::{Component, RenderContext, RenderError};
pub use document::{
    BlankDocument, Document, DocumentError, DocumentFactory, DocumentOptions, Listener, Node,
    NodeId, NodeMeta, Subscription, is_valid_tag_name,
};
pub use handle::{HandleId, LazyHandle};
pub use manifest::{Manifest, ManifestBundle, ManifestError, ManifestSymbol, SymbolKind, SymbolMetadata};
pub use resolver::{
    DEFAULT_BASE, MappedResolver, Resolve, ResolveError, SymbolMapper, SymbolResolver,
    TableResolver,
};
pub use value::{Heap, ObjectId, Value};
