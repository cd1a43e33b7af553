//! Container markup: the attributes and scripts the client runtime looks for when it resumes a
//! page.

use dew_core::{Document, NodeId};
use indexmap::IndexSet;

use crate::snapshot::SnapshotState;

/// Attribute identifying the container element.
pub const CONTAINER_ATTRIBUTE: &str = "q:container";
/// Container state of a server-rendered page awaiting resumption.
pub const PAUSED: &str = "paused";
/// Attribute carrying the client build base.
pub const BASE_ATTRIBUTE: &str = "q:base";
/// `type` of the script holding the snapshot.
pub const SNAPSHOT_SCRIPT_TYPE: &str = "qwik/json";

/// Makes serialized JSON safe to embed in a `<script>` element.
///
/// `<` could close the element; U+2028 and U+2029 end lines in older JavaScript engines. All three
/// only ever occur inside string literals, where the `\u` escapes decode to the same text.
pub(crate) fn escape_script_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Marks `container` as a paused container.
pub fn mark(document: &mut Document, container: NodeId, base: Option<&str>) {
    document.set_attribute(container, CONTAINER_ATTRIBUTE, PAUSED);
    if let Some(base) = base {
        document.set_attribute(container, BASE_ATTRIBUTE, base);
    }
}

/// Appends the snapshot script under `target`.
pub fn append_snapshot(document: &mut Document, target: NodeId, state: &SnapshotState) {
    let json = match state.to_script_json(document.is_debug()) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(%err, "failed to serialize snapshot");
            return;
        }
    };
    let script = document.append_element(target, "script");
    document.set_attribute(script, "type", SNAPSHOT_SCRIPT_TYPE);
    document.append_text(script, json);
}

/// Appends the loader bootstrap under `target`.
///
/// The loader registers every event that has a listener in the document, followed by `extra`.
/// Nothing is written when there is no event to register.
pub fn append_loader(document: &mut Document, target: NodeId, extra: &[String]) {
    let mut events: IndexSet<&str> = IndexSet::new();
    for node in document.walk() {
        if let Some(meta) = document.meta(node) {
            events.extend(meta.listeners.iter().map(|listener| listener.event.as_str()));
        }
    }
    events.extend(extra.iter().map(String::as_str));
    if events.is_empty() {
        return;
    }

    let args = events
        .iter()
        .map(|event| escape_script_json(&serde_json::Value::from(*event).to_string()))
        .collect::<Vec<_>>()
        .join(",");
    let source = format!("(window.qwikevents||(window.qwikevents=[])).push({args});");

    let script = document.append_element(target, "script");
    document.set_attribute(script, "q:type", "loader");
    document.append_text(script, source);
}
