//! The render orchestrator.
//!
//! A render call moves through fixed phases:
//!
//! 1. [`RenderPhase::DocumentCreated`]: the [`DocumentFactory`] builds an empty document.
//! 2. [`RenderPhase::Rendered`]: the component tree renders into it.
//! 3. [`RenderPhase::SnapshotCaptured`] or [`RenderPhase::SnapshotSkipped`].
//! 4. [`RenderPhase::PrefetchComputed`]: the prefetch graph is computed.
//! 5. [`RenderPhase::Finalized`]: container markup, the snapshot script, prefetch markup and the
//!    loader are written.
//!
//! Failures in the first two phases abort the call. Nothing is cached between calls, so one
//! [`Renderer`] can serve concurrent renders from many threads.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use dew_core::{
    BlankDocument, Component, Document, DocumentError, DocumentFactory, Manifest, NodeId,
    RenderContext, SymbolResolver, is_valid_tag_name,
};
use serde::{Serialize, Serializer};

use crate::{
    container,
    error::Error,
    options::RenderOptions,
    prefetch::{self, PrefetchResource},
    snapshot::{self, SnapshotState},
};

/// Phases of a render call, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderPhase {
    /// The empty document exists.
    DocumentCreated,
    /// The component tree has been rendered.
    Rendered,
    /// The snapshot has been captured.
    SnapshotCaptured,
    /// Snapshot capture was disabled.
    SnapshotSkipped,
    /// The prefetch graph has been computed.
    PrefetchComputed,
    /// Container markup has been written.
    Finalized,
}

/// Result of [`Renderer::render_to_document`].
#[derive(Debug)]
pub struct RenderToDocumentResult {
    /// The rendered document.
    pub document: Document,
    /// The container element: `<html>` for full documents, the fragment element otherwise.
    pub container: NodeId,
    /// Whether the output is a fragment.
    pub fragment: bool,
    /// The prefetch graph.
    pub prefetch_resources: Vec<PrefetchResource>,
    /// The snapshot, when capture was enabled.
    pub snapshot_state: Option<SnapshotState>,
    /// Phases the call went through.
    pub phases: Vec<RenderPhase>,
}

impl RenderToDocumentResult {
    /// Serializes the output: the whole document with a doctype, or the fragment element.
    #[must_use]
    pub fn to_html(&self) -> String {
        if self.fragment {
            self.document.outer_html(self.container)
        } else {
            self.document.to_html()
        }
    }
}

/// Wall-clock time spent in each part of [`Renderer::render_to_string`].
///
/// Serialized as milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    /// Creating the empty document.
    #[serde(serialize_with = "as_millis")]
    pub create_document: Duration,
    /// Rendering, snapshot capture, prefetch computation and finalization.
    #[serde(serialize_with = "as_millis")]
    pub render: Duration,
    /// Serializing the document.
    #[serde(serialize_with = "as_millis")]
    pub to_string: Duration,
}

#[allow(clippy::cast_precision_loss)]
fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_nanos() as f64 / 1_000_000.0)
}

/// Result of [`Renderer::render_to_string`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderToStringResult {
    /// The serialized output.
    pub html: String,
    /// The prefetch graph.
    pub prefetch_resources: Vec<PrefetchResource>,
    /// The snapshot, when capture was enabled.
    pub snapshot_state: Option<SnapshotState>,
    /// Time spent per part of the call.
    pub timing: Timing,
}

/// Renders component trees against one manifest.
#[derive(Clone)]
pub struct Renderer {
    manifest: Arc<Manifest>,
    factory: Arc<dyn DocumentFactory>,
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("symbols", &self.manifest.symbols.len())
            .field("bundles", &self.manifest.bundles.len())
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Creates a renderer producing [`BlankDocument`]s.
    #[must_use]
    pub fn new(manifest: impl Into<Arc<Manifest>>) -> Self {
        Self {
            manifest: manifest.into(),
            factory: Arc::new(BlankDocument),
        }
    }

    /// Replaces the document factory.
    #[must_use]
    pub fn with_document_factory(mut self, factory: impl DocumentFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Returns the manifest.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Renders `component` and returns the finalized document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentCreation`] or [`Error::Render`] when the first two phases fail,
    /// and [`Error::Unserializable`] under [`crate::UnserializablePolicy::Abort`].
    pub fn render_to_document(
        &self,
        component: &(impl Component + ?Sized),
        options: &RenderOptions,
    ) -> Result<RenderToDocumentResult, Error> {
        self.render(component, options).map(|(result, _, _)| result)
    }

    /// Renders `component` and serializes the result.
    ///
    /// # Errors
    ///
    /// Same as [`Renderer::render_to_document`].
    pub fn render_to_string(
        &self,
        component: &(impl Component + ?Sized),
        options: &RenderOptions,
    ) -> Result<RenderToStringResult, Error> {
        let (result, create_document, render) = self.render(component, options)?;

        let start = Instant::now();
        let html = result.to_html();
        let to_string = start.elapsed();

        Ok(RenderToStringResult {
            html,
            prefetch_resources: result.prefetch_resources,
            snapshot_state: result.snapshot_state,
            timing: Timing {
                create_document,
                render,
                to_string,
            },
        })
    }

    fn render(
        &self,
        component: &(impl Component + ?Sized),
        options: &RenderOptions,
    ) -> Result<(RenderToDocumentResult, Duration, Duration), Error> {
        let mut phases = Vec::with_capacity(5);

        let start = Instant::now();
        let mut document = {
            let _span = tracing::debug_span!("create_document").entered();
            self.factory.create(&options.document_options())?
        };
        let root = document.root().ok_or(DocumentError::MissingRoot)?;
        let parent = document.body().unwrap_or(root);
        let (container, target) = match &options.fragment_tag_name {
            Some(tag) => {
                if !is_valid_tag_name(tag) {
                    return Err(DocumentError::InvalidTagName(tag.clone()).into());
                }
                let fragment = document.append_element(parent, tag);
                (fragment, fragment)
            }
            None => (root, parent),
        };
        phases.push(RenderPhase::DocumentCreated);
        let create_document = start.elapsed();

        let start = Instant::now();
        let resolver = SymbolResolver::new(
            &self.manifest,
            options.base(),
            options.symbol_mapper.clone(),
        );

        {
            let _span = tracing::debug_span!("render", component = component.name()).entered();
            RenderContext::new(&mut document, &resolver, target).render(component)?;
        }
        phases.push(RenderPhase::Rendered);
        tracing::debug!(nodes = document.len(), "rendered component tree");

        let snapshot_state = if options.snapshot {
            let _span = tracing::debug_span!("snapshot").entered();
            let state = snapshot::capture(&mut document, &resolver, options.unserializable)?;
            phases.push(RenderPhase::SnapshotCaptured);
            Some(state)
        } else {
            tracing::debug!("snapshot disabled");
            phases.push(RenderPhase::SnapshotSkipped);
            None
        };

        let prefetch_resources = {
            let _span = tracing::debug_span!("prefetch").entered();
            prefetch::build_graph(
                &document,
                &self.manifest,
                &resolver,
                &options.prefetch_strategy.symbols_to_prefetch,
            )
        };
        phases.push(RenderPhase::PrefetchComputed);

        container::mark(&mut document, container, options.base.as_deref());
        if let Some(state) = &snapshot_state {
            container::append_snapshot(&mut document, target, state);
        }
        prefetch::emit(
            &mut document,
            target,
            &prefetch_resources,
            options.prefetch_strategy.implementation,
        );
        if options.loader.include {
            container::append_loader(&mut document, target, &options.loader.events);
        }
        phases.push(RenderPhase::Finalized);
        let render = start.elapsed();

        tracing::debug!(?phases, ?create_document, ?render, "render finished");
        Ok((
            RenderToDocumentResult {
                document,
                container,
                fragment: options.fragment_tag_name.is_some(),
                prefetch_resources,
                snapshot_state,
                phases,
            },
            create_document,
            render,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{
        CustomPrefetch, PrefetchImplementation, SymbolsToPrefetch, UnserializablePolicy,
    };
    use dew_core::{DocumentOptions, LazyHandle, RenderError, ResolveError, Value};
    use serde_json::json;
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
    };

    fn renderer() -> Renderer {
        let manifest = Manifest::from_json(
            &json!({
                "symbols": {
                    "s_click": { "bundle": "q-click" },
                    "s_task": { "bundle": "q-task" }
                },
                "bundles": {
                    "q-click": { "path": "q-click.js", "imports": ["q-core"] },
                    "q-task": { "path": "q-task.js" },
                    "q-core": { "path": "q-core.js" }
                }
            })
            .to_string(),
        )
        .unwrap();
        Renderer::new(manifest)
    }

    fn counter(cx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        let count = cx.use_store(0);
        let task = cx.handle(LazyHandle::new("s_task").capture(count));
        cx.subscribe(task, count);
        cx.element("button", |cx| {
            cx.on("click", LazyHandle::new("s_click").capture(count))?;
            cx.text("+1");
            Ok(())
        })?;
        Ok(())
    }

    #[test]
    fn renders_a_resumable_document() {
        let result = renderer()
            .render_to_string(&counter, &RenderOptions::default())
            .unwrap();

        assert!(
            result
                .html
                .starts_with(r#"<!DOCTYPE html><html q:container="paused"><head></head><body>"#)
        );
        assert!(result.html.contains(
            r#"<button on:click="/build/q-click.js#s_click" q:id="0">+1</button>"#
        ));
        assert!(result.html.contains(r#"<script type="qwik/json">"#));
        assert!(result.html.contains(r#"<link rel="prefetch" href="/build/q-click.js">"#));
        assert!(result.html.contains(r#"<link rel="prefetch" href="/build/q-core.js">"#));
        assert!(!result.html.contains("q-task.js\">"));
        assert!(result.html.ends_with(
            r#"<script q:type="loader">(window.qwikevents||(window.qwikevents=[])).push("click");</script></body></html>"#
        ));

        let state = result.snapshot_state.unwrap();
        state.validate().unwrap();
        assert_eq!(state.listeners["0"][0].event, "click");
        assert_eq!(
            result.prefetch_resources,
            [PrefetchResource::new("/build/q-click.js")
                .with_imports(vec![PrefetchResource::new("/build/q-core.js")])]
        );
    }

    #[test]
    fn records_phases_in_order() {
        let result = renderer()
            .render_to_document(&counter, &RenderOptions::default())
            .unwrap();
        assert_eq!(
            result.phases,
            [
                RenderPhase::DocumentCreated,
                RenderPhase::Rendered,
                RenderPhase::SnapshotCaptured,
                RenderPhase::PrefetchComputed,
                RenderPhase::Finalized,
            ]
        );
    }

    #[test]
    fn disabled_snapshot_does_not_touch_the_resolver() {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = |cx: &mut RenderContext<'_>| -> Result<(), RenderError> {
            let task = cx.handle(LazyHandle::new("s_task"));
            cx.hold(task);
            Ok(())
        };
        let options = |snapshot: bool| {
            let calls = calls.clone();
            RenderOptions {
                snapshot,
                ..RenderOptions::default()
            }
            .with_symbol_mapper(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            })
            .with_symbols_to_prefetch(SymbolsToPrefetch::Custom(CustomPrefetch::new(|_| {
                Vec::new()
            })))
        };

        let result = renderer().render_to_document(&app, &options(false)).unwrap();
        assert!(result.snapshot_state.is_none());
        assert!(result.phases.contains(&RenderPhase::SnapshotSkipped));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let result = renderer().render_to_document(&app, &options(true)).unwrap();
        assert!(result.snapshot_state.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mapper_overrides_reach_every_output() {
        let options = RenderOptions::default()
            .with_symbol_mapper(|symbol| {
                (symbol == "s_click").then(|| format!("https://edge.example/click.js#{symbol}"))
            })
            .with_prefetch_implementation(PrefetchImplementation::LinkModulepreloadHtml);
        let result = renderer().render_to_string(&counter, &options).unwrap();

        assert!(result.html.contains(r#"on:click="https://edge.example/click.js#s_click""#));
        assert!(
            result
                .html
                .contains(r#"<link rel="modulepreload" href="https://edge.example/click.js">"#)
        );
        let state = result.snapshot_state.unwrap();
        assert!(state.objs.iter().any(|value| matches!(
            value,
            snapshot::SnapshotValue::Handle { url, .. } if url == "https://edge.example/click.js#s_click"
        )));
    }

    #[test]
    fn renders_fragments() {
        let options = RenderOptions {
            fragment_tag_name: Some("section".into()),
            base: Some("/assets/".into()),
            ..RenderOptions::default()
        };
        let result = renderer().render_to_string(&counter, &options).unwrap();
        assert!(
            result
                .html
                .starts_with(r#"<section q:container="paused" q:base="/assets/"><button"#)
        );
        assert!(result.html.ends_with("</section>"));
        assert!(result.html.contains(r#"href="/assets/q-click.js""#));
    }

    #[test]
    fn document_creation_errors_abort() {
        let options = RenderOptions {
            url: Some("not a url".into()),
            ..RenderOptions::default()
        };
        let err = renderer().render_to_string(&counter, &options).unwrap_err();
        assert_eq!(
            err,
            Error::DocumentCreation(DocumentError::InvalidUrl("not a url".into()))
        );
    }

    #[derive(Default)]
    struct RecordingFactory {
        seen: Arc<Mutex<Vec<DocumentOptions>>>,
    }

    impl DocumentFactory for RecordingFactory {
        fn create(&self, options: &DocumentOptions) -> Result<Document, DocumentError> {
            self.seen.lock().unwrap().push(options.clone());
            let mut document = Document::new();
            let html = document.set_root("html");
            document.append_element(html, "body");
            Ok(document)
        }
    }

    #[test]
    fn document_options_reach_custom_factories() {
        let factory = RecordingFactory::default();
        let seen = factory.seen.clone();
        let options = RenderOptions {
            url: Some("https://example.com/".into()),
            html: Some("<html><body></body></html>".into()),
            ..RenderOptions::default()
        };
        let result = renderer()
            .with_document_factory(factory)
            .render_to_string(&counter, &options)
            .unwrap();
        assert!(result.html.starts_with(r#"<!DOCTYPE html><html q:container="paused"><body>"#));
        assert_eq!(*seen.lock().unwrap(), [options.document_options()]);

        let err = renderer().render_to_string(&counter, &options).unwrap_err();
        assert_eq!(err, Error::DocumentCreation(DocumentError::HtmlUnsupported));
    }

    #[test]
    fn invalid_fragment_tags_abort() {
        let options = RenderOptions {
            fragment_tag_name: Some("div><script".into()),
            ..RenderOptions::default()
        };
        let err = renderer().render_to_string(&counter, &options).unwrap_err();
        assert_eq!(
            err,
            Error::DocumentCreation(DocumentError::InvalidTagName("div><script".into()))
        );
    }

    #[test]
    fn unknown_listener_symbols_abort() {
        let app = |cx: &mut RenderContext<'_>| -> Result<(), RenderError> {
            cx.on("click", LazyHandle::new("s_gone").with_chunk("app.tsx"))?;
            Ok(())
        };
        let err = renderer()
            .render_to_string(&app, &RenderOptions::default())
            .unwrap_err();
        assert_eq!(
            err,
            Error::Render(RenderError::UnknownSymbol(ResolveError::UnknownSymbol {
                symbol: "s_gone".into(),
                chunk: Some("app.tsx".into()),
            }))
        );
    }

    #[test]
    fn abort_policy_fails_the_call() {
        let app = |cx: &mut RenderContext<'_>| -> Result<(), RenderError> {
            cx.use_store(Value::opaque("db connection"));
            Ok(())
        };
        let options = RenderOptions {
            unserializable: UnserializablePolicy::Abort,
            ..RenderOptions::default()
        };
        let err = renderer().render_to_string(&app, &options).unwrap_err();
        assert_eq!(
            err,
            Error::Unserializable {
                description: "object #0".into()
            }
        );

        let result = renderer()
            .render_to_string(&app, &RenderOptions::default())
            .unwrap();
        assert!(result.snapshot_state.unwrap().objs.is_empty());
    }

    #[test]
    fn concurrent_renders_agree() {
        let renderer = renderer();
        let options = RenderOptions::default();
        let outputs: Vec<String> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| renderer.render_to_string(&counter, &options).unwrap().html))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });
        assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[test]
    fn timing_serializes_in_milliseconds() {
        let timing = Timing {
            create_document: Duration::from_micros(1500),
            render: Duration::from_millis(2),
            to_string: Duration::ZERO,
        };
        assert_eq!(
            serde_json::to_value(timing).unwrap(),
            json!({ "createDocument": 1.5, "render": 2.0, "toString": 0.0 })
        );
    }
}
