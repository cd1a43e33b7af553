//! Writes prefetch resources into a document.

use dew_core::{Document, NodeId};

use super::PrefetchResource;
use crate::{container::escape_script_json, options::PrefetchImplementation};

/// `q:type` of the script inserting `<link>` tags at runtime.
pub const BUNDLES_SCRIPT_TYPE: &str = "prefetch-bundles";
/// `q:type` of the worker bootstrap script.
pub const WORKER_SCRIPT_TYPE: &str = "prefetch-worker";

impl PrefetchImplementation {
    /// The `rel` of the emitted links, for link-based implementations.
    #[must_use]
    pub const fn rel(self) -> Option<&'static str> {
        match self {
            Self::LinkPrefetchHtml | Self::LinkPrefetch => Some("prefetch"),
            Self::LinkPreloadHtml | Self::LinkPreload => Some("preload"),
            Self::LinkModulepreloadHtml | Self::LinkModulepreload => Some("modulepreload"),
            Self::WorkerFetch | Self::None => None,
        }
    }

    /// Whether links are written as static markup.
    #[must_use]
    pub const fn is_html(self) -> bool {
        matches!(
            self,
            Self::LinkPrefetchHtml | Self::LinkPreloadHtml | Self::LinkModulepreloadHtml
        )
    }
}

/// Appends the markup for `resources` under `target`.
///
/// Each URL is emitted once, in pre-order. Nothing is written when `resources` is empty or the
/// implementation is [`PrefetchImplementation::None`].
pub fn emit(
    document: &mut Document,
    target: NodeId,
    resources: &[PrefetchResource],
    implementation: PrefetchImplementation,
) {
    let urls = PrefetchResource::flatten(resources);
    if urls.is_empty() {
        return;
    }

    match (implementation.rel(), implementation) {
        (Some(rel), implementation) if implementation.is_html() => {
            for url in &urls {
                let link = document.append_element(target, "link");
                document.set_attribute(link, "rel", rel);
                if rel == "preload" {
                    document.set_attribute(link, "as", "script");
                }
                document.set_attribute(link, "href", *url);
            }
        }
        (Some(rel), _) => {
            let Some(array) = url_array(&urls) else {
                return;
            };
            let as_script = if rel == "preload" { "l.as=\"script\";" } else { "" };
            let script = format!(
                "(function(d,u){{u.forEach(function(h){{var l=d.createElement(\"link\");\
                 l.rel=\"{rel}\";{as_script}l.href=h;d.head.appendChild(l)}})}})(document,{array});"
            );
            append_script(document, target, BUNDLES_SCRIPT_TYPE, script);
        }
        (None, PrefetchImplementation::WorkerFetch) => {
            let Some(array) = url_array(&urls) else {
                return;
            };
            let script = format!(
                "(function(u){{var w=new Worker(URL.createObjectURL(new Blob([\
                 \"onmessage=function(e){{e.data.forEach(function(u){{fetch(u)}})}}\"],\
                 {{type:\"text/javascript\"}})));\
                 w.postMessage(u.map(function(h){{return new URL(h,location.href).href}}))}})({array});"
            );
            append_script(document, target, WORKER_SCRIPT_TYPE, script);
        }
        (None, _) => {}
    }
    tracing::debug!(urls = urls.len(), ?implementation, "emitted prefetch resources");
}

fn append_script(document: &mut Document, target: NodeId, kind: &str, source: String) {
    let script = document.append_element(target, "script");
    document.set_attribute(script, "q:type", kind);
    document.append_text(script, source);
}

/// A JS array literal of `urls`, safe to embed in a `<script>` element.
fn url_array(urls: &[&str]) -> Option<String> {
    match serde_json::to_string(urls) {
        Ok(json) => Some(escape_script_json(&json)),
        Err(err) => {
            tracing::error!(%err, "failed to serialize prefetch urls");
            None
        }
    }
}
