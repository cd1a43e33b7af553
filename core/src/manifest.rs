//! The build manifest consumed during rendering.
//!
//! A manifest is produced by the bundler and never mutated by the renderer. It answers two
//! questions: which bundle declares a given symbol, and which bundles a bundle imports.
//!
//! ```json
//! {
//!   "symbols": {
//!     "s_click": { "bundle": "q-app", "displayName": "App_onClick", "ctxKind": "event" }
//!   },
//!   "bundles": {
//!     "q-app": { "path": "q-app.js", "imports": ["q-core"] },
//!     "q-core": { "path": "q-core.js" }
//!   }
//! }
//! ```
//!
//! Both tables keep their declaration order, which is what makes the `all` prefetch strategy and
//! import walks deterministic.

use std::{fs, path::Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating a [`Manifest`].
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("Failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    /// The manifest is not valid JSON or does not match the expected shape.
    #[error("Invalid manifest file: {0}")]
    Parse(#[from] serde_json::Error),
    /// A symbol points at a bundle the manifest does not declare.
    #[error("symbol `{symbol}` is declared in unknown bundle `{bundle}`")]
    MissingBundle {
        /// The offending symbol.
        symbol: String,
        /// The bundle it claims to live in.
        bundle: String,
    },
    /// A bundle imports a bundle the manifest does not declare.
    #[error("bundle `{bundle}` imports unknown bundle `{import}`")]
    UnknownImport {
        /// The importing bundle.
        bundle: String,
        /// The missing import.
        import: String,
    },
}

/// What kind of code a symbol captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    /// An event listener body.
    Event,
    /// Any other lazily loaded function (tasks, computed values, components).
    Function,
}

/// Descriptive metadata the bundler records next to each symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SymbolMetadata {
    /// Human-readable name, such as `App_component_onClick`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Content hash the bundler derived the symbol identifier from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Kind of code captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx_kind: Option<SymbolKind>,
    /// Name of the capturing context, such as the event name or `component$`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx_name: Option<String>,
    /// Source file the symbol was extracted from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// A symbol entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSymbol {
    /// Identifier of the bundle declaring this symbol.
    pub bundle: String,
    /// Additional bundler metadata.
    #[serde(flatten)]
    pub metadata: SymbolMetadata,
}

/// A bundle entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestBundle {
    /// File path of the bundle, relative to the deployment base.
    pub path: String,
    /// Bundles statically imported by this bundle, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
}

/// Build-time map from symbols to bundles and from bundles to their import graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Symbol table.
    #[serde(default)]
    pub symbols: IndexMap<String, ManifestSymbol>,
    /// Bundle table.
    #[serde(default)]
    pub bundles: IndexMap<String, ManifestBundle>,
}

impl Manifest {
    /// Parses and validates a manifest from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] for malformed input and one of the validation errors when
    /// the tables are inconsistent (see [`Manifest::validate`]).
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads, parses and validates a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] when the file cannot be read, otherwise the same errors as
    /// [`Manifest::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Checks that every symbol's bundle and every bundle import is declared.
    ///
    /// Import cycles are allowed; the prefetch builder guards against them.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found, symbols before bundles.
    pub fn validate(&self) -> Result<(), ManifestError> {
        for (symbol, entry) in &self.symbols {
            if !self.bundles.contains_key(&entry.bundle) {
                return Err(ManifestError::MissingBundle {
                    symbol: symbol.clone(),
                    bundle: entry.bundle.clone(),
                });
            }
        }
        for (bundle, entry) in &self.bundles {
            if let Some(import) = entry
                .imports
                .iter()
                .find(|import| !self.bundles.contains_key(*import))
            {
                return Err(ManifestError::UnknownImport {
                    bundle: bundle.clone(),
                    import: import.clone(),
                });
            }
        }
        Ok(())
    }

    /// Looks up a symbol entry.
    #[must_use]
    pub fn symbol(&self, symbol: &str) -> Option<&ManifestSymbol> {
        self.symbols.get(symbol)
    }

    /// Looks up a bundle entry.
    #[must_use]
    pub fn bundle(&self, bundle: &str) -> Option<&ManifestBundle> {
        self.bundles.get(bundle)
    }

    /// Returns the identifier and entry of the bundle declaring `symbol`.
    #[must_use]
    pub fn bundle_of(&self, symbol: &str) -> Option<(&str, &ManifestBundle)> {
        let entry = self.symbols.get(symbol)?;
        self.bundles
            .get_key_value(&entry.bundle)
            .map(|(id, bundle)| (id.as_str(), bundle))
    }
}
