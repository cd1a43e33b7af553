//! Symbol resolution.
//!
//! Every lazy handle emitted into a document must point at a URL the browser can load. A
//! [`SymbolResolver`] turns a symbol identifier into that URL, either by looking it up in the
//! [`Manifest`] ([`TableResolver`]) or by first asking a caller-supplied [`SymbolMapper`]
//! ([`MappedResolver`]), which is the escape hatch for custom deployment layouts such as CDN
//! rewriting.
//!
//! Resolution is pure: resolvers hold no mutable state and can be shared between threads.

use std::{fmt, sync::Arc};

use crate::{handle::LazyHandle, manifest::Manifest};

/// Prefix prepended to bundle paths when no base is configured.
pub const DEFAULT_BASE: &str = "/build/";

/// Caller-supplied override: returns the URL for a symbol, or `None` to fall back to the
/// manifest.
pub type SymbolMapper = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Errors raised while resolving a symbol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Neither the mapper nor the manifest knows the symbol. This is a build/deploy mismatch.
    #[error(
        "unknown symbol `{symbol}` (captured in {})",
        .chunk.as_deref().unwrap_or("an unknown chunk")
    )]
    UnknownSymbol {
        /// The symbol identifier.
        symbol: String,
        /// The capture-chunk hint of the handle, when known.
        chunk: Option<String>,
    },
}

/// The single capability shared by all resolvers.
pub trait Resolve {
    /// Resolves a symbol identifier to a loadable URL of the form `bundle-url#symbol`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownSymbol`] when the symbol cannot be mapped.
    fn resolve(&self, symbol: &str) -> Result<String, ResolveError>;

    /// Resolves a handle, attaching its chunk hint to any error.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownSymbol`] when the handle's symbol cannot be mapped.
    fn resolve_handle(&self, handle: &LazyHandle) -> Result<String, ResolveError> {
        self.resolve(handle.symbol())
            .map_err(|ResolveError::UnknownSymbol { symbol, .. }| ResolveError::UnknownSymbol {
                symbol,
                chunk: handle.chunk().map(str::to_string),
            })
    }

    /// Resolves a symbol to the URL of the bundle that must be fetched for it.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownSymbol`] when the symbol cannot be mapped.
    fn bundle_url(&self, symbol: &str) -> Result<String, ResolveError> {
        let mut url = self.resolve(symbol)?;
        if let Some(fragment) = url.find('#') {
            url.truncate(fragment);
        }
        Ok(url)
    }
}

/// Resolves symbols through the manifest's symbol table.
#[derive(Debug, Clone)]
pub struct TableResolver<'m> {
    manifest: &'m Manifest,
    base: String,
}

impl<'m> TableResolver<'m> {
    /// Creates a table resolver emitting URLs under `base`.
    #[must_use]
    pub fn new(manifest: &'m Manifest, base: impl Into<String>) -> Self {
        Self {
            manifest,
            base: base.into(),
        }
    }

    /// Returns the URL a bundle is deployed at.
    #[must_use]
    pub fn bundle_path_url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

impl Resolve for TableResolver<'_> {
    fn resolve(&self, symbol: &str) -> Result<String, ResolveError> {
        self.manifest
            .bundle_of(symbol)
            .map(|(_, bundle)| format!("{}#{symbol}", self.bundle_path_url(&bundle.path)))
            .ok_or_else(|| ResolveError::UnknownSymbol {
                symbol: symbol.to_string(),
                chunk: None,
            })
    }
}

/// Resolves symbols through a [`SymbolMapper`], falling back to the manifest.
#[derive(Clone)]
pub struct MappedResolver<'m> {
    mapper: SymbolMapper,
    table: TableResolver<'m>,
}

impl fmt::Debug for MappedResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedResolver")
            .field("mapper", &"Fn(&str) -> Option<String>")
            .field("table", &self.table)
            .finish()
    }
}

impl<'m> MappedResolver<'m> {
    /// Creates a resolver consulting `mapper` before `table`.
    #[must_use]
    pub fn new(mapper: SymbolMapper, table: TableResolver<'m>) -> Self {
        Self { mapper, table }
    }
}

impl Resolve for MappedResolver<'_> {
    fn resolve(&self, symbol: &str) -> Result<String, ResolveError> {
        match (self.mapper)(symbol) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => self.table.resolve(symbol),
        }
    }
}

/// The resolver used for one render call, selected at construction.
#[derive(Debug, Clone)]
pub enum SymbolResolver<'m> {
    /// Manifest lookup only.
    Table(TableResolver<'m>),
    /// Mapper first, manifest second.
    Mapped(MappedResolver<'m>),
}

impl<'m> SymbolResolver<'m> {
    /// Builds the resolver for a manifest, base and optional mapper.
    ///
    /// ```
    /// use dew_core::{Manifest, Resolve, SymbolResolver};
    ///
    /// let manifest = Manifest::from_json(
    ///     r#"{"symbols":{"s_a":{"bundle":"b"}},"bundles":{"b":{"path":"b.js"}}}"#,
    /// )?;
    /// let resolver = SymbolResolver::new(&manifest, "/build/", None);
    /// assert_eq!(resolver.resolve("s_a")?, "/build/b.js#s_a");
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    #[must_use]
    pub fn new(manifest: &'m Manifest, base: &str, mapper: Option<SymbolMapper>) -> Self {
        let table = TableResolver::new(manifest, base);
        match mapper {
            Some(mapper) => Self::Mapped(MappedResolver::new(mapper, table)),
            None => Self::Table(table),
        }
    }

    /// Returns the manifest backing the table lookup.
    #[must_use]
    pub const fn manifest(&self) -> &'m Manifest {
        match self {
            Self::Table(table) | Self::Mapped(MappedResolver { table, .. }) => table.manifest,
        }
    }

    /// Returns the URL a bundle path is deployed at.
    #[must_use]
    pub fn bundle_path_url(&self, path: &str) -> String {
        match self {
            Self::Table(table) | Self::Mapped(MappedResolver { table, .. }) => {
                table.bundle_path_url(path)
            }
        }
    }
}

impl Resolve for SymbolResolver<'_> {
    fn resolve(&self, symbol: &str) -> Result<String, ResolveError> {
        match self {
            Self::Table(table) => table.resolve(symbol),
            Self::Mapped(mapped) => mapped.resolve(symbol),
        }
    }
}
