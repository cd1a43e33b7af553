use dew_core::{DocumentError, RenderError};

/// Errors that abort a render call.
///
/// A failed call produces no partial result: the document under construction is discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The document factory rejected the options.
    #[error("failed to create document: {0}")]
    DocumentCreation(#[from] DocumentError),
    /// The component tree failed to render.
    #[error("failed to render component tree: {0}")]
    Render(#[from] RenderError),
    /// A captured value cannot be serialized and the policy forbids dropping it.
    #[error("cannot serialize captured value: {description}")]
    Unserializable {
        /// Diagnostic description of the value.
        description: String,
    },
}
