#![doc = include_str!("../README.md")]

pub mod container;
mod error;
pub mod options;
pub mod prefetch;
pub mod render;
pub mod snapshot;

pub use error::Error;
pub use options::{
    CustomPrefetch, LoaderOptions, PrefetchImplementation, PrefetchStrategy, RenderOptions,
    SymbolsToPrefetch, UnserializablePolicy,
};
pub use prefetch::{PrefetchContext, PrefetchResource, build_graph};
pub use render::{RenderPhase, RenderToDocumentResult, RenderToStringResult, Renderer, Timing};
pub use snapshot::{ListenerEntry, SnapshotState, SnapshotValue, SubscriptionEntry};

pub mod prelude {
    //! Commonly used types for rendering components.
    //!
    //! ```
    //! use dew::prelude::*;
    //!
    //! fn hello(cx: &mut RenderContext<'_>) -> Result<(), RenderError> {
    //!     cx.element("p", |cx| {
    //!         cx.text("hello");
    //!         Ok(())
    //!     })?;
    //!     Ok(())
    //! }
    //! ```
    pub use crate::{RenderOptions, Renderer, SymbolsToPrefetch};
    pub use dew_core::{
        Component, LazyHandle, Manifest, ObjectId, RenderContext, RenderError, Value,
    };
}
