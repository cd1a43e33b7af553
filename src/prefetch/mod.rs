//! Prefetch graph computation.
//!
//! After rendering, the renderer works out which bundles the browser should fetch ahead of user
//! interaction. Seeds are selected from the document (or the whole manifest) according to
//! [`SymbolsToPrefetch`], then expanded along the manifest's import graph by [`GraphBuilder`], and
//! finally written into the document by [`emit()`].

pub mod emit;
pub mod graph;

use std::collections::HashSet;

use dew_core::{Document, HandleId, Manifest, ObjectId, SymbolResolver, Value};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

pub use emit::emit;
pub use graph::GraphBuilder;

use crate::options::SymbolsToPrefetch;

/// A bundle to prefetch together with the bundles it imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchResource {
    /// Deployable URL of the bundle.
    pub url: String,
    /// Resources for the bundle's imports, in declaration order.
    #[serde(default)]
    pub imports: Vec<PrefetchResource>,
}

impl PrefetchResource {
    /// Creates a resource without imports.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            imports: Vec::new(),
        }
    }

    /// Sets the imports of this resource.
    #[must_use]
    pub fn with_imports(mut self, imports: Vec<Self>) -> Self {
        self.imports = imports;
        self
    }

    /// Returns every URL of `resources` once, in pre-order.
    #[must_use]
    pub fn flatten(resources: &[Self]) -> Vec<&str> {
        fn visit<'r>(resource: &'r PrefetchResource, urls: &mut IndexSet<&'r str>) {
            urls.insert(&resource.url);
            for import in &resource.imports {
                visit(import, urls);
            }
        }

        let mut urls = IndexSet::new();
        for resource in resources {
            visit(resource, &mut urls);
        }
        urls.into_iter().collect()
    }
}

/// What a custom prefetch selection can inspect.
#[derive(Debug, Clone, Copy)]
pub struct PrefetchContext<'a> {
    /// The rendered document.
    pub document: &'a Document,
    /// The manifest the document was rendered against.
    pub manifest: &'a Manifest,
}

/// Computes the prefetch graph of a rendered document.
///
/// Custom selections are returned verbatim; the built-in ones are expanded with a
/// [`GraphBuilder`].
#[must_use]
pub fn build_graph(
    document: &Document,
    manifest: &Manifest,
    resolver: &SymbolResolver<'_>,
    symbols: &SymbolsToPrefetch,
) -> Vec<PrefetchResource> {
    let seeds = match symbols {
        SymbolsToPrefetch::Custom(custom) => {
            return custom.call(&PrefetchContext { document, manifest });
        }
        SymbolsToPrefetch::EventsDocument => event_symbols(document),
        SymbolsToPrefetch::AllDocument => document_symbols(document),
        SymbolsToPrefetch::All => {
            let mut seeds: IndexSet<String> = manifest.symbols.keys().cloned().collect();
            seeds.extend(document_symbols(document));
            seeds
        }
    };
    tracing::debug!(seeds = seeds.len(), strategy = ?symbols, "computing prefetch graph");
    GraphBuilder::new(manifest, resolver).build(seeds.iter().map(String::as_str))
}

/// Symbols of the handles attached as listeners, in document order.
fn event_symbols(document: &Document) -> IndexSet<String> {
    let heap = document.heap();
    document
        .walk()
        .into_iter()
        .filter_map(|node| document.meta(node))
        .flat_map(|meta| &meta.listeners)
        .filter_map(|listener| heap.handle(listener.handle))
        .map(|handle| handle.symbol().to_string())
        .collect()
}

/// Symbols of every handle reachable from the document, in document order.
fn document_symbols(document: &Document) -> IndexSet<String> {
    let mut collector = SymbolCollector {
        document,
        objects: HashSet::new(),
        handles: HashSet::new(),
        symbols: IndexSet::new(),
    };
    for node in document.walk() {
        let Some(meta) = document.meta(node) else {
            continue;
        };
        for value in &meta.held {
            collector.value(value);
        }
        for listener in &meta.listeners {
            collector.handle(listener.handle);
        }
        for subscription in &meta.subscriptions {
            collector.value(&subscription.subscriber);
            collector.object(subscription.source);
        }
    }
    collector.symbols
}

struct SymbolCollector<'a> {
    document: &'a Document,
    objects: HashSet<ObjectId>,
    handles: HashSet<HandleId>,
    symbols: IndexSet<String>,
}

impl SymbolCollector<'_> {
    fn value(&mut self, value: &Value) {
        match value {
            Value::Object(id) => self.object(*id),
            Value::Handle(id) => self.handle(*id),
            other => {
                for child in other.children() {
                    self.value(child);
                }
            }
        }
    }

    fn object(&mut self, id: ObjectId) {
        let document = self.document;
        if self.objects.insert(id)
            && let Some(value) = document.heap().get(id)
        {
            self.value(value);
        }
    }

    fn handle(&mut self, id: HandleId) {
        let document = self.document;
        if !self.handles.insert(id) {
            return;
        }
        if let Some(handle) = document.heap().handle(id) {
            self.symbols.insert(handle.symbol().to_string());
            for capture in handle.captures() {
                self.value(capture);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CustomPrefetch;
    use dew_core::{
        BlankDocument, DocumentFactory, DocumentOptions, LazyHandle, RenderContext, RenderError,
    };
    use serde_json::json;

    // Raw JSON: `json!` would sort the keys and lose the declaration order `all` depends on.
    fn manifest() -> Manifest {
        Manifest::from_json(
            r#"{
                "symbols": {
                    "s_unused": { "bundle": "q-unused" },
                    "s_click": { "bundle": "q-click" },
                    "s_task": { "bundle": "q-task" }
                },
                "bundles": {
                    "q-unused": { "path": "q-unused.js" },
                    "q-click": { "path": "q-click.js", "imports": ["q-shared"] },
                    "q-task": { "path": "q-task.js", "imports": ["q-shared"] },
                    "q-shared": { "path": "q-shared.js" }
                }
            }"#,
        )
        .unwrap()
    }

    fn document(resolver: &SymbolResolver<'_>) -> Document {
        let mut document = BlankDocument.create(&DocumentOptions::default()).unwrap();
        let body = document.body().unwrap();
        let app = |cx: &mut RenderContext<'_>| -> Result<(), RenderError> {
            let count = cx.use_store(0);
            let task = cx.handle(LazyHandle::new("s_task").capture(count));
            cx.subscribe(task, count);
            cx.element("button", |cx| {
                cx.on("click", LazyHandle::new("s_click"))?;
                Ok(())
            })?;
            Ok(())
        };
        RenderContext::new(&mut document, resolver, body)
            .render(&app)
            .unwrap();
        document
    }

    fn urls(resources: &[PrefetchResource]) -> Vec<&str> {
        PrefetchResource::flatten(resources)
    }

    #[test]
    fn strategies_select_increasing_sets() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(&manifest, "/build/", None);
        let document = document(&resolver);

        let events = build_graph(&document, &manifest, &resolver, &SymbolsToPrefetch::EventsDocument);
        let all_document =
            build_graph(&document, &manifest, &resolver, &SymbolsToPrefetch::AllDocument);
        let all = build_graph(&document, &manifest, &resolver, &SymbolsToPrefetch::All);

        assert_eq!(urls(&events), ["/build/q-click.js", "/build/q-shared.js"]);
        assert_eq!(
            urls(&all_document),
            ["/build/q-task.js", "/build/q-shared.js", "/build/q-click.js"]
        );
        assert_eq!(
            urls(&all),
            [
                "/build/q-unused.js",
                "/build/q-click.js",
                "/build/q-shared.js",
                "/build/q-task.js"
            ]
        );

        let all_document_urls = urls(&all_document);
        let all_urls = urls(&all);
        assert!(urls(&events).iter().all(|url| all_document_urls.contains(url)));
        assert!(all_document_urls.iter().all(|url| all_urls.contains(url)));
    }

    #[test]
    fn custom_selection_is_returned_verbatim() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(&manifest, "/build/", None);
        let document = document(&resolver);

        let custom = CustomPrefetch::new(|cx: &PrefetchContext<'_>| {
            vec![PrefetchResource::new(format!(
                "/custom/{}.js",
                cx.manifest.symbols.len()
            ))]
        });
        let resources = build_graph(
            &document,
            &manifest,
            &resolver,
            &SymbolsToPrefetch::Custom(custom),
        );
        assert_eq!(resources, [PrefetchResource::new("/custom/3.js")]);
    }

    #[test]
    fn all_includes_document_symbols_missing_from_the_manifest() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(
            &manifest,
            "/build/",
            Some(std::sync::Arc::new(|symbol: &str| {
                (symbol == "s_external").then(|| "https://cdn.example/ext.js#s_external".to_string())
            })),
        );
        let mut document = BlankDocument.create(&DocumentOptions::default()).unwrap();
        let body = document.body().unwrap();
        let app = |cx: &mut RenderContext<'_>| -> Result<(), RenderError> {
            cx.on("click", LazyHandle::new("s_external"))?;
            Ok(())
        };
        RenderContext::new(&mut document, &resolver, body)
            .render(&app)
            .unwrap();

        let all = build_graph(&document, &manifest, &resolver, &SymbolsToPrefetch::All);
        assert_eq!(
            all.last(),
            Some(&PrefetchResource::new("https://cdn.example/ext.js"))
        );
    }

    #[test]
    fn flatten_deduplicates_in_pre_order() {
        let resources = [
            PrefetchResource::new("a").with_imports(vec![
                PrefetchResource::new("b").with_imports(vec![PrefetchResource::new("c")]),
            ]),
            PrefetchResource::new("c"),
        ];
        assert_eq!(PrefetchResource::flatten(&resources), ["a", "b", "c"]);
        assert_eq!(
            serde_json::to_value(&resources[1]).unwrap(),
            json!({ "url": "c", "imports": [] })
        );
    }
}
