//! Render configuration.
//!
//! [`RenderOptions`] deserializes from camelCase configuration (JSON or TOML), with every field
//! defaulted. Behavior that cannot be expressed as data, such as the symbol mapper or a custom
//! prefetch selection, is attached in code.
//!
//! ```
//! use dew::{PrefetchImplementation, RenderOptions, SymbolsToPrefetch};
//!
//! let options: RenderOptions = serde_json::from_str(r#"{
//!     "base": "https://cdn.example/build/",
//!     "prefetchStrategy": { "implementation": "worker-fetch", "symbolsToPrefetch": "all-document" }
//! }"#)?;
//! assert!(options.snapshot);
//! assert_eq!(options.prefetch_strategy.implementation, PrefetchImplementation::WorkerFetch);
//! assert!(matches!(options.prefetch_strategy.symbols_to_prefetch, SymbolsToPrefetch::AllDocument));
//! # Ok::<(), serde_json::Error>(())
//! ```

use core::fmt;
use std::sync::Arc;

use dew_core::{DEFAULT_BASE, DocumentOptions, SymbolMapper};
use serde::{Deserialize, Serialize};

use crate::prefetch::{PrefetchContext, PrefetchResource};

/// Which symbols seed the prefetch graph.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolsToPrefetch {
    /// Every symbol in the manifest.
    All,
    /// Every symbol referenced by the rendered document.
    AllDocument,
    /// Symbols backing event listeners attached in the rendered document.
    #[default]
    EventsDocument,
    /// A caller-supplied selection replacing the built-in algorithm.
    #[serde(skip)]
    Custom(CustomPrefetch),
}

impl fmt::Debug for SymbolsToPrefetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::AllDocument => f.write_str("AllDocument"),
            Self::EventsDocument => f.write_str("EventsDocument"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

type CustomPrefetchFn = dyn Fn(&PrefetchContext<'_>) -> Vec<PrefetchResource> + Send + Sync;

/// A custom prefetch selection.
#[derive(Clone)]
pub struct CustomPrefetch(Arc<CustomPrefetchFn>);

impl CustomPrefetch {
    /// Wraps a selection function.
    pub fn new(
        f: impl Fn(&PrefetchContext<'_>) -> Vec<PrefetchResource> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    /// Runs the selection.
    #[must_use]
    pub fn call(&self, context: &PrefetchContext<'_>) -> Vec<PrefetchResource> {
        (self.0)(context)
    }
}

impl fmt::Debug for CustomPrefetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomPrefetch")
    }
}

/// How the prefetch graph is written into the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrefetchImplementation {
    /// Static `<link rel="prefetch">` tags.
    #[default]
    LinkPrefetchHtml,
    /// A script inserting `<link rel="prefetch">` tags at runtime.
    LinkPrefetch,
    /// Static `<link rel="preload">` tags.
    LinkPreloadHtml,
    /// A script inserting `<link rel="preload">` tags at runtime.
    LinkPreload,
    /// Static `<link rel="modulepreload">` tags.
    LinkModulepreloadHtml,
    /// A script inserting `<link rel="modulepreload">` tags at runtime.
    LinkModulepreload,
    /// A script fetching the bundles from a web worker.
    WorkerFetch,
    /// Compute the graph but emit nothing.
    None,
}

/// Prefetch configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrefetchStrategy {
    /// How resources are emitted.
    pub implementation: PrefetchImplementation,
    /// Which symbols are prefetched.
    pub symbols_to_prefetch: SymbolsToPrefetch,
}

/// Controls the loader bootstrap script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Whether the loader bootstrap is emitted.
    pub include: bool,
    /// Events registered in addition to those found on the document's listeners.
    pub events: Vec<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            include: true,
            events: Vec::new(),
        }
    }
}

/// What to do with captured values that cannot be serialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnserializablePolicy {
    /// Drop the value and everything referencing it, logging a warning.
    #[default]
    Drop,
    /// Fail the render call.
    Abort,
}

/// Options for one render call.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Capture a snapshot. Defaults to `true`.
    pub snapshot: bool,
    /// URL prefix of the client build. When set, also rendered as `q:base` on the container.
    pub base: Option<String>,
    /// Location of the rendered page.
    pub url: Option<String>,
    /// Developer-oriented output.
    pub debug: bool,
    /// HTML source handed to the document factory.
    pub html: Option<String>,
    /// Prefetch configuration.
    pub prefetch_strategy: PrefetchStrategy,
    /// When set, the output is a fragment wrapped in this element instead of a full document.
    pub fragment_tag_name: Option<String>,
    /// Loader bootstrap configuration.
    pub loader: LoaderOptions,
    /// Policy for unserializable captured values.
    pub unserializable: UnserializablePolicy,
    /// Overrides symbol resolution for this call.
    #[serde(skip)]
    pub symbol_mapper: Option<SymbolMapper>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            snapshot: true,
            base: None,
            url: None,
            debug: false,
            html: None,
            prefetch_strategy: PrefetchStrategy::default(),
            fragment_tag_name: None,
            loader: LoaderOptions::default(),
            unserializable: UnserializablePolicy::default(),
            symbol_mapper: None,
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("snapshot", &self.snapshot)
            .field("base", &self.base)
            .field("url", &self.url)
            .field("debug", &self.debug)
            .field("html", &self.html.as_ref().map(String::len))
            .field("prefetch_strategy", &self.prefetch_strategy)
            .field("fragment_tag_name", &self.fragment_tag_name)
            .field("loader", &self.loader)
            .field("unserializable", &self.unserializable)
            .field("symbol_mapper", &self.symbol_mapper.as_ref().map(|_| "Fn(&str)"))
            .finish()
    }
}

impl RenderOptions {
    /// Sets the symbol mapper.
    #[must_use]
    pub fn with_symbol_mapper(
        mut self,
        mapper: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.symbol_mapper = Some(Arc::new(mapper));
        self
    }

    /// Sets which symbols are prefetched.
    #[must_use]
    pub fn with_symbols_to_prefetch(mut self, symbols: SymbolsToPrefetch) -> Self {
        self.prefetch_strategy.symbols_to_prefetch = symbols;
        self
    }

    /// Sets how prefetch resources are emitted.
    #[must_use]
    pub const fn with_prefetch_implementation(
        mut self,
        implementation: PrefetchImplementation,
    ) -> Self {
        self.prefetch_strategy.implementation = implementation;
        self
    }

    /// Returns the configured base, or [`DEFAULT_BASE`].
    #[must_use]
    pub fn base(&self) -> &str {
        self.base.as_deref().unwrap_or(DEFAULT_BASE)
    }

    /// Returns the options forwarded to the document factory.
    #[must_use]
    pub fn document_options(&self) -> DocumentOptions {
        DocumentOptions {
            url: self.url.clone(),
            debug: self.debug,
            html: self.html.clone(),
        }
    }
}
