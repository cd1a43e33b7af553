//! Expansion of prefetch seeds along the manifest import graph.
//!
//! Every seed symbol becomes a root resource whose URL comes from the resolver, so mapper
//! overrides are honored. Imports are expanded recursively from the manifest. The manifest may
//! contain import cycles, so the expansion carries the set of URLs on the current root-to-leaf
//! path and omits any edge leading back into it. Siblings are deduplicated by URL, and ordering
//! follows seed order then import declaration order.

use dew_core::{Manifest, ManifestBundle, Resolve, SymbolResolver};
use indexmap::IndexSet;

use super::PrefetchResource;

/// Builds prefetch trees for a sequence of seed symbols.
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder<'a> {
    manifest: &'a Manifest,
    resolver: &'a SymbolResolver<'a>,
}

impl<'a> GraphBuilder<'a> {
    /// Creates a builder over a manifest and the resolver of the current call.
    #[must_use]
    pub const fn new(manifest: &'a Manifest, resolver: &'a SymbolResolver<'a>) -> Self {
        Self { manifest, resolver }
    }

    /// Builds one root per distinct seed URL.
    ///
    /// Seeds that cannot be resolved are skipped with a warning.
    pub fn build<'s>(&self, seeds: impl IntoIterator<Item = &'s str>) -> Vec<PrefetchResource> {
        let mut roots: Vec<PrefetchResource> = Vec::new();
        for symbol in seeds {
            let url = match self.resolver.bundle_url(symbol) {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!(%err, "skipping prefetch seed");
                    continue;
                }
            };
            if roots.iter().any(|root| root.url == url) {
                continue;
            }

            let imports = match self.manifest.bundle_of(symbol) {
                Some((_, bundle)) => {
                    let mut path = IndexSet::from([url.clone()]);
                    path.insert(self.resolver.bundle_path_url(&bundle.path));
                    self.expand(bundle, &mut path)
                }
                None => Vec::new(),
            };
            roots.push(PrefetchResource { url, imports });
        }
        roots
    }

    fn expand(&self, bundle: &ManifestBundle, path: &mut IndexSet<String>) -> Vec<PrefetchResource> {
        let mut imports: Vec<PrefetchResource> = Vec::new();
        for id in &bundle.imports {
            let Some(import) = self.manifest.bundle(id) else {
                continue;
            };
            let url = self.resolver.bundle_path_url(&import.path);
            if path.contains(&url) {
                tracing::trace!(%url, "omitting cyclic import");
                continue;
            }
            if imports.iter().any(|sibling| sibling.url == url) {
                continue;
            }

            path.insert(url.clone());
            let nested = self.expand(import, path);
            path.pop();
            imports.push(PrefetchResource {
                url,
                imports: nested,
            });
        }
        imports
    }
}
