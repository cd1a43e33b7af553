//! Snapshot capture.
//!
//! The snapshot is what lets the browser resume a server-rendered page without re-running setup
//! code. It is a flat table of captured values (`objs`) plus two index maps: listeners per anchor
//! element and subscription edges between captured values.
//!
//! Capture runs in three passes over the document:
//!
//! 1. **Discover** every heap cell and handle reachable from the document, in document order.
//! 2. **Taint** whatever cannot be captured and, to a fixpoint, anything referencing it. Opaque
//!    values and non-finite numbers are unserializable and follow the [`UnserializablePolicy`].
//!    Handles whose symbol does not resolve are always dropped with a warning, whatever the
//!    policy.
//! 3. **Index** the remaining values in first-encounter order and encode them.
//!
//! Index order is the wire contract with the client, so it only depends on document order and
//! reference identity, never on value content.

use std::collections::HashMap;

use dew_core::{Document, HandleId, NodeId, ObjectId, Resolve, Value};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::{container::escape_script_json, error::Error, options::UnserializablePolicy};

/// Attribute marking elements that carry listeners.
pub const ANCHOR_ATTRIBUTE: &str = "q:id";

/// A captured value in its serialized form.
///
/// References to other captured values are written as `{"$ref": index}` and lazy handles as
/// `{"$qrl": url, "captures": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotValue {
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// A reference to another entry of [`SnapshotState::objs`].
    Ref {
        /// Index of the referenced entry.
        #[serde(rename = "$ref")]
        index: usize,
    },
    /// A resolved lazy handle.
    Handle {
        /// Deployable URL of the handle.
        #[serde(rename = "$qrl")]
        url: String,
        /// Captured values, encoded inline.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        captures: Vec<SnapshotValue>,
    },
    /// A list.
    List(Vec<SnapshotValue>),
    /// A map.
    Map(IndexMap<String, SnapshotValue>),
}

impl SnapshotValue {
    fn references(&self, out: &mut Vec<usize>) {
        match self {
            Self::Ref { index } => out.push(*index),
            Self::Handle { captures, .. } | Self::List(captures) => {
                for value in captures {
                    value.references(out);
                }
            }
            Self::Map(entries) => {
                for value in entries.values() {
                    value.references(out);
                }
            }
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => {}
        }
    }
}

/// A listener attached at an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerEntry {
    /// Event name.
    pub event: String,
    /// Index of the handle in [`SnapshotState::objs`].
    pub index: usize,
}

/// A subscription edge between two captured values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEntry {
    /// Index of the reacting value.
    pub subscriber: usize,
    /// Index of the observed value.
    pub source: usize,
}

/// Serializable state the client resumes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotState {
    /// Captured values in index order.
    pub objs: Vec<SnapshotValue>,
    /// Listeners keyed by anchor identifier.
    pub listeners: IndexMap<String, Vec<ListenerEntry>>,
    /// Subscription edges.
    pub subscriptions: Vec<SubscriptionEntry>,
}

/// An index referenced by a snapshot but absent from its value table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("snapshot references index {index} but only {len} values were captured")]
pub struct DanglingIndex {
    /// The missing index.
    pub index: usize,
    /// Number of captured values.
    pub len: usize,
}

impl SnapshotState {
    /// Checks that every index referenced by listeners, subscriptions and nested references exists.
    ///
    /// # Errors
    ///
    /// Returns the first [`DanglingIndex`] found.
    pub fn validate(&self) -> Result<(), DanglingIndex> {
        let len = self.objs.len();
        let mut indices = Vec::new();
        for value in &self.objs {
            value.references(&mut indices);
        }
        indices.extend(self.listeners.values().flatten().map(|entry| entry.index));
        indices.extend(
            self.subscriptions
                .iter()
                .flat_map(|entry| [entry.subscriber, entry.source]),
        );
        indices
            .into_iter()
            .find(|index| *index >= len)
            .map_or(Ok(()), |index| Err(DanglingIndex { index, len }))
    }

    /// Serializes the snapshot for embedding in a `<script>` element.
    ///
    /// `<` and the JavaScript line separators are escaped so the payload can never close the
    /// surrounding element.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error.
    pub fn to_script_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(escape_script_json(&json))
    }

    /// Parses a snapshot previously produced by [`SnapshotState::to_script_json`].
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Why a value is left out of the snapshot. Ordered by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Taint {
    Clean,
    Unresolved,
    Unserializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Object(ObjectId),
    Handle(HandleId),
}

/// Captures the snapshot of a rendered document.
///
/// Elements carrying at least one serializable listener receive an [`ANCHOR_ATTRIBUTE`] numbered
/// in document order.
///
/// # Errors
///
/// Returns [`Error::Unserializable`] when `policy` is [`UnserializablePolicy::Abort`] and a
/// captured value cannot be serialized. Under [`UnserializablePolicy::Drop`] capture never fails.
/// Resolver failures never fail capture.
pub fn capture(
    document: &mut Document,
    resolver: &dyn Resolve,
    policy: UnserializablePolicy,
) -> Result<SnapshotState, Error> {
    let nodes = document.walk();
    let (state, anchors) = {
        let mut builder = SnapshotBuilder::new(document, resolver, policy);
        builder.discover(&nodes);
        builder.taint();
        builder.build(&nodes)?
    };
    for (node, anchor) in anchors {
        document.set_attribute(node, ANCHOR_ATTRIBUTE, anchor);
    }
    tracing::debug!(
        objs = state.objs.len(),
        anchors = state.listeners.len(),
        subscriptions = state.subscriptions.len(),
        "captured snapshot"
    );
    Ok(state)
}

struct SnapshotBuilder<'a> {
    document: &'a Document,
    resolver: &'a dyn Resolve,
    policy: UnserializablePolicy,
    reachable: IndexSet<Slot>,
    urls: HashMap<HandleId, String>,
    tainted: Vec<Taint>,
    index: HashMap<Slot, usize>,
    objs: Vec<SnapshotValue>,
}

impl<'a> SnapshotBuilder<'a> {
    fn new(document: &'a Document, resolver: &'a dyn Resolve, policy: UnserializablePolicy) -> Self {
        Self {
            document,
            resolver,
            policy,
            reachable: IndexSet::new(),
            urls: HashMap::new(),
            tainted: Vec::new(),
            index: HashMap::new(),
            objs: Vec::new(),
        }
    }

    fn discover(&mut self, nodes: &[NodeId]) {
        let document = self.document;
        for &node in nodes {
            let Some(meta) = document.meta(node) else {
                continue;
            };
            for value in &meta.held {
                self.discover_value(value);
            }
            for listener in &meta.listeners {
                self.discover_slot(Slot::Handle(listener.handle));
            }
            for subscription in &meta.subscriptions {
                self.discover_value(&subscription.subscriber);
                self.discover_slot(Slot::Object(subscription.source));
            }
        }
    }

    fn discover_value(&mut self, value: &Value) {
        match value {
            Value::Object(id) => self.discover_slot(Slot::Object(*id)),
            Value::Handle(id) => self.discover_slot(Slot::Handle(*id)),
            other => {
                for child in other.children() {
                    self.discover_value(child);
                }
            }
        }
    }

    fn discover_slot(&mut self, slot: Slot) {
        if !self.reachable.insert(slot) {
            return;
        }
        let heap = self.document.heap();
        match slot {
            Slot::Object(id) => {
                if let Some(value) = heap.get(id) {
                    self.discover_value(value);
                }
            }
            Slot::Handle(id) => {
                if let Some(handle) = heap.handle(id) {
                    for capture in handle.captures() {
                        self.discover_value(capture);
                    }
                }
            }
        }
    }

    fn taint(&mut self) {
        let heap = self.document.heap();
        let slots: Vec<Slot> = self.reachable.iter().copied().collect();
        let mut edges = Vec::with_capacity(slots.len());
        self.tainted = vec![Taint::Clean; slots.len()];

        for (position, slot) in slots.iter().enumerate() {
            let mut refs = Vec::new();
            let direct = match *slot {
                Slot::Object(id) => heap
                    .get(id)
                    .map_or(Taint::Unserializable, |value| inline_taint(value, &mut refs)),
                Slot::Handle(id) => match heap.handle(id) {
                    Some(handle) => match self.resolver.resolve_handle(handle) {
                        Ok(url) => {
                            self.urls.insert(id, url);
                            handle
                                .captures()
                                .iter()
                                .map(|capture| inline_taint(capture, &mut refs))
                                .fold(Taint::Clean, Taint::max)
                        }
                        Err(err) => {
                            tracing::warn!(%err, "dropping handle from snapshot");
                            Taint::Unresolved
                        }
                    },
                    None => Taint::Unserializable,
                },
            };
            self.tainted[position] = direct;
            edges.push(
                refs.into_iter()
                    .filter_map(|target| self.reachable.get_index_of(&target))
                    .collect::<Vec<_>>(),
            );
        }

        let mut changed = true;
        while changed {
            changed = false;
            for (position, targets) in edges.iter().enumerate() {
                let inherited = targets
                    .iter()
                    .map(|target| self.tainted[*target])
                    .fold(self.tainted[position], Taint::max);
                if inherited != self.tainted[position] {
                    self.tainted[position] = inherited;
                    changed = true;
                }
            }
        }
    }

    fn slot_taint(&self, slot: Slot) -> Taint {
        self.reachable
            .get_index_of(&slot)
            .map_or(Taint::Unserializable, |position| self.tainted[position])
    }

    fn value_taint(&self, value: &Value) -> Taint {
        match value {
            Value::Opaque(_) => Taint::Unserializable,
            Value::Number(number) if !number.is_finite() => Taint::Unserializable,
            Value::Object(id) => self.slot_taint(Slot::Object(*id)),
            Value::Handle(id) => self.slot_taint(Slot::Handle(*id)),
            other => other
                .children()
                .map(|child| self.value_taint(child))
                .fold(Taint::Clean, Taint::max),
        }
    }

    /// Returns whether `value` can be indexed. Unresolved handles were already reported during
    /// tainting; unserializable values go through the policy.
    fn admit(&self, what: &str, value: &Value) -> Result<bool, Error> {
        match self.value_taint(value) {
            Taint::Clean => Ok(true),
            Taint::Unresolved => {
                tracing::debug!(value = %describe(value), "dropping {what} bound to an unresolved symbol");
                Ok(false)
            }
            Taint::Unserializable => {
                let description = describe(value);
                match self.policy {
                    UnserializablePolicy::Abort => Err(Error::Unserializable { description }),
                    UnserializablePolicy::Drop => {
                        tracing::warn!(value = %description, "dropping unserializable {what} from snapshot");
                        Ok(false)
                    }
                }
            }
        }
    }

    fn build(mut self, nodes: &[NodeId]) -> Result<(SnapshotState, Vec<(NodeId, String)>), Error> {
        let mut listeners = IndexMap::new();
        let mut subscriptions = Vec::new();
        let mut anchors = Vec::new();
        let document = self.document;

        for &node in nodes {
            let Some(meta) = document.meta(node) else {
                continue;
            };

            for value in &meta.held {
                if self.admit("held value", value)? {
                    self.root(value);
                }
            }

            let mut entries = Vec::new();
            for listener in &meta.listeners {
                let handle = Value::Handle(listener.handle);
                if !self.admit("listener", &handle)? {
                    continue;
                }
                entries.push(ListenerEntry {
                    event: listener.event.clone(),
                    index: self.root(&handle),
                });
            }
            if !entries.is_empty() {
                let anchor = anchors.len().to_string();
                anchors.push((node, anchor.clone()));
                listeners.insert(anchor, entries);
            }

            for subscription in &meta.subscriptions {
                let source = Value::Object(subscription.source);
                if !self.admit("subscription", &subscription.subscriber)?
                    || !self.admit("subscription", &source)?
                {
                    continue;
                }
                subscriptions.push(SubscriptionEntry {
                    subscriber: self.root(&subscription.subscriber),
                    source: self.root(&source),
                });
            }
        }

        let state = SnapshotState {
            objs: self.objs,
            listeners,
            subscriptions,
        };
        Ok((state, anchors))
    }

    /// Indexes a root value. Cells and handles keep their identity; inline values get a fresh
    /// entry per occurrence.
    fn root(&mut self, value: &Value) -> usize {
        match value {
            Value::Object(id) => self.visit(Slot::Object(*id)),
            Value::Handle(id) => self.visit(Slot::Handle(*id)),
            inline => {
                let index = self.objs.len();
                self.objs.push(SnapshotValue::Null);
                self.visit_children(inline);
                self.objs[index] = self.encode(inline);
                index
            }
        }
    }

    fn visit(&mut self, slot: Slot) -> usize {
        if let Some(index) = self.index.get(&slot) {
            return *index;
        }
        let index = self.objs.len();
        self.index.insert(slot, index);
        self.objs.push(SnapshotValue::Null);

        let heap = self.document.heap();
        let encoded = match slot {
            Slot::Object(id) => match heap.get(id) {
                Some(value) => {
                    self.visit_children(value);
                    self.encode(value)
                }
                None => SnapshotValue::Null,
            },
            Slot::Handle(id) => {
                let captures = heap.handle(id).map(|handle| handle.captures()).unwrap_or_default();
                for capture in captures {
                    self.visit_children(capture);
                }
                SnapshotValue::Handle {
                    url: self.urls.get(&id).cloned().unwrap_or_default(),
                    captures: captures.iter().map(|capture| self.encode(capture)).collect(),
                }
            }
        };
        self.objs[index] = encoded;
        index
    }

    fn visit_children(&mut self, value: &Value) {
        match value {
            Value::Object(id) => {
                self.visit(Slot::Object(*id));
            }
            Value::Handle(id) => {
                self.visit(Slot::Handle(*id));
            }
            other => {
                for child in other.children() {
                    self.visit_children(child);
                }
            }
        }
    }

    fn encode(&self, value: &Value) -> SnapshotValue {
        match value {
            Value::Null | Value::Opaque(_) => SnapshotValue::Null,
            Value::Bool(value) => SnapshotValue::Bool(*value),
            Value::Number(value) => SnapshotValue::Number(*value),
            Value::String(value) => SnapshotValue::String(value.clone()),
            Value::List(items) => SnapshotValue::List(items.iter().map(|item| self.encode(item)).collect()),
            Value::Map(entries) => SnapshotValue::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), self.encode(value)))
                    .collect(),
            ),
            Value::Object(id) => self.reference(Slot::Object(*id)),
            Value::Handle(id) => self.reference(Slot::Handle(*id)),
        }
    }

    fn reference(&self, slot: Slot) -> SnapshotValue {
        self.index
            .get(&slot)
            .map_or(SnapshotValue::Null, |index| SnapshotValue::Ref { index: *index })
    }
}

/// Collects references held inline by `value` and reports whether it is unserializable on its own.
fn inline_taint(value: &Value, refs: &mut Vec<Slot>) -> Taint {
    match value {
        Value::Opaque(_) => Taint::Unserializable,
        Value::Number(number) if !number.is_finite() => Taint::Unserializable,
        Value::Object(id) => {
            refs.push(Slot::Object(*id));
            Taint::Clean
        }
        Value::Handle(id) => {
            refs.push(Slot::Handle(*id));
            Taint::Clean
        }
        other => other
            .children()
            .map(|child| inline_taint(child, refs))
            .fold(Taint::Clean, Taint::max),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Opaque(description) => description.clone(),
        Value::Object(id) => format!("object #{}", id.index()),
        Value::Handle(id) => format!("handle #{}", id.index()),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dew_core::{
        BlankDocument, DocumentFactory, DocumentOptions, LazyHandle, Manifest, RenderContext,
        RenderError, SymbolResolver,
    };
    use serde_json::json;

    fn manifest() -> Manifest {
        Manifest::from_json(
            &json!({
                "symbols": {
                    "s_click": { "bundle": "q-app" },
                    "s_task": { "bundle": "q-app" }
                },
                "bundles": { "q-app": { "path": "q-app.js" } }
            })
            .to_string(),
        )
        .unwrap()
    }

    fn render(
        resolver: &SymbolResolver<'_>,
        app: impl Fn(&mut RenderContext<'_>) -> Result<(), RenderError>,
    ) -> Document {
        let mut document = BlankDocument.create(&DocumentOptions::default()).unwrap();
        let body = document.body().unwrap();
        RenderContext::new(&mut document, resolver, body)
            .render(&app)
            .unwrap();
        document
    }

    #[test]
    fn shared_state_is_captured_once() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(&manifest, "/build/", None);
        let mut document = render(&resolver, |cx| {
            cx.element("button", |cx| {
                let count = cx.use_store(0);
                cx.hold(count);
                cx.on("click", LazyHandle::new("s_click").capture(count))?;
                Ok(())
            })?;
            Ok(())
        });

        let state = capture(&mut document, &resolver, UnserializablePolicy::Drop).unwrap();
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({
                "objs": [0.0, { "$qrl": "/build/q-app.js#s_click", "captures": [{ "$ref": 0 }] }],
                "listeners": { "0": [{ "event": "click", "index": 1 }] },
                "subscriptions": []
            })
        );
        assert!(document.to_html().contains(r#"q:id="0""#));
    }

    #[test]
    fn repeated_handles_share_an_index_and_anchors_follow_document_order() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(&manifest, "/build/", None);
        let mut document = render(&resolver, |cx| {
            for label in ["a", "b"] {
                cx.element("button", |cx| {
                    cx.on("click", LazyHandle::new("s_click"))?;
                    cx.text(label);
                    Ok(())
                })?;
            }
            Ok(())
        });

        let state = capture(&mut document, &resolver, UnserializablePolicy::Drop).unwrap();
        assert_eq!(state.objs.len(), 1);
        assert_eq!(state.listeners.keys().collect::<Vec<_>>(), ["0", "1"]);
        assert!(state.listeners.values().flatten().all(|entry| entry.index == 0));

        let html = document.to_html();
        let first = html.find(r#"q:id="0""#).unwrap();
        let second = html.find(r#"q:id="1""#).unwrap();
        assert!(first < second);
    }

    #[test]
    fn cyclic_cells_terminate() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(&manifest, "/build/", None);
        let mut document = render(&resolver, |cx| {
            let a = cx.alloc(Value::Null);
            let b = cx.alloc(vec![Value::Object(a)]);
            cx.set(a, vec![Value::Object(b)]);
            cx.hold(a);
            Ok(())
        });

        let state = capture(&mut document, &resolver, UnserializablePolicy::Drop).unwrap();
        assert_eq!(
            state.objs,
            [
                SnapshotValue::List(vec![SnapshotValue::Ref { index: 1 }]),
                SnapshotValue::List(vec![SnapshotValue::Ref { index: 0 }]),
            ]
        );
        state.validate().unwrap();
    }

    #[test]
    fn unserializable_values_are_dropped_with_their_dependents() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(&manifest, "/build/", None);
        let app = |cx: &mut RenderContext<'_>| -> Result<(), RenderError> {
            cx.element("button", |cx| {
                let socket = cx.alloc(Value::opaque("websocket"));
                cx.on("click", LazyHandle::new("s_click").capture(socket))?;
                Ok(())
            })?;
            cx.element("button", |cx| {
                let count = cx.use_store(1);
                let task = cx.handle(LazyHandle::new("s_missing"));
                cx.subscribe(task, count);
                cx.on("click", LazyHandle::new("s_click"))?;
                Ok(())
            })?;
            Ok(())
        };

        let mut document = render(&resolver, app);
        let state = capture(&mut document, &resolver, UnserializablePolicy::Drop).unwrap();
        assert_eq!(state.objs.len(), 2);
        assert_eq!(state.listeners.len(), 1);
        assert!(state.subscriptions.is_empty());
        assert_eq!(document.to_html().matches("q:id=").count(), 1);

        let mut document = render(&resolver, app);
        let err = capture(&mut document, &resolver, UnserializablePolicy::Abort).unwrap_err();
        assert!(matches!(err, Error::Unserializable { .. }));
    }

    #[test]
    fn unresolved_handles_are_dropped_under_every_policy() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(&manifest, "/build/", None);
        let app = |cx: &mut RenderContext<'_>| -> Result<(), RenderError> {
            let task = cx.handle(LazyHandle::new("s_not_in_manifest"));
            cx.hold(task);
            cx.hold(vec![Value::Handle(task)]);
            cx.element("button", |cx| {
                cx.on("click", LazyHandle::new("s_click"))?;
                Ok(())
            })?;
            Ok(())
        };

        for policy in [UnserializablePolicy::Drop, UnserializablePolicy::Abort] {
            let mut document = render(&resolver, app);
            let state = capture(&mut document, &resolver, policy).unwrap();
            assert_eq!(
                state.objs,
                [SnapshotValue::Handle {
                    url: "/build/q-app.js#s_click".into(),
                    captures: Vec::new()
                }]
            );
            assert_eq!(state.listeners.len(), 1);
        }
    }

    #[test]
    fn non_finite_numbers_are_unserializable() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(&manifest, "/build/", None);
        let app = |cx: &mut RenderContext<'_>| -> Result<(), RenderError> {
            for _ in 0..2 {
                cx.element("button", |cx| {
                    cx.on("click", LazyHandle::new("s_click").capture(f64::NAN))?;
                    Ok(())
                })?;
            }
            cx.element("button", |cx| {
                cx.on("click", LazyHandle::new("s_click").capture(1))?;
                Ok(())
            })?;
            Ok(())
        };

        let mut document = render(&resolver, app);
        assert_eq!(document.heap().handles().count(), 2);
        let state = capture(&mut document, &resolver, UnserializablePolicy::Drop).unwrap();
        assert_eq!(state.objs.len(), 1);
        assert_eq!(state.listeners.len(), 1);
        let json = state.to_script_json(false).unwrap();
        assert_eq!(SnapshotState::from_json(&json).unwrap(), state);

        let mut document = render(&resolver, app);
        let err = capture(&mut document, &resolver, UnserializablePolicy::Abort).unwrap_err();
        assert_eq!(
            err,
            Error::Unserializable {
                description: "handle #0".into()
            }
        );
    }

    #[test]
    fn subscriptions_reference_captured_indices() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(&manifest, "/build/", None);
        let mut document = render(&resolver, |cx| {
            let count = cx.use_store(0);
            let task = cx.handle(LazyHandle::new("s_task").capture(count));
            cx.subscribe(task, count);
            Ok(())
        });

        let state = capture(&mut document, &resolver, UnserializablePolicy::Drop).unwrap();
        assert_eq!(
            state.subscriptions,
            [SubscriptionEntry {
                subscriber: 1,
                source: 0
            }]
        );
        state.validate().unwrap();
    }

    #[test]
    fn mapper_urls_are_used_for_handles() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(
            &manifest,
            "/build/",
            Some(std::sync::Arc::new(|symbol: &str| {
                Some(format!("https://cdn.example/app.js#{symbol}"))
            })),
        );
        let mut document = render(&resolver, |cx| {
            cx.on("click", LazyHandle::new("s_click"))?;
            Ok(())
        });

        let state = capture(&mut document, &resolver, UnserializablePolicy::Drop).unwrap();
        assert_eq!(
            state.objs,
            [SnapshotValue::Handle {
                url: "https://cdn.example/app.js#s_click".into(),
                captures: Vec::new()
            }]
        );
    }

    #[test]
    fn capture_is_deterministic() {
        let manifest = manifest();
        let resolver = SymbolResolver::new(&manifest, "/build/", None);
        let app = |cx: &mut RenderContext<'_>| -> Result<(), RenderError> {
            let shared = cx.alloc(vec![Value::from("x"), Value::from(2)]);
            for _ in 0..3 {
                cx.element("div", |cx| {
                    cx.hold(shared);
                    cx.hold(vec![Value::Object(shared), Value::Bool(true)]);
                    cx.on("click", LazyHandle::new("s_click").capture(shared))?;
                    Ok(())
                })?;
            }
            Ok(())
        };

        let first = capture(&mut render(&resolver, app), &resolver, UnserializablePolicy::Drop)
            .unwrap()
            .to_script_json(false)
            .unwrap();
        let second = capture(&mut render(&resolver, app), &resolver, UnserializablePolicy::Drop)
            .unwrap()
            .to_script_json(false)
            .unwrap();
        assert_eq!(first, second);
        SnapshotState::from_json(&first).unwrap().validate().unwrap();
    }

    #[test]
    fn validate_reports_dangling_indices() {
        let state = SnapshotState {
            objs: vec![SnapshotValue::List(vec![SnapshotValue::Ref { index: 3 }])],
            ..SnapshotState::default()
        };
        assert_eq!(state.validate(), Err(DanglingIndex { index: 3, len: 1 }));
    }

    #[test]
    fn script_json_cannot_close_the_script_element() {
        let state = SnapshotState {
            objs: vec![SnapshotValue::String("</script><script>alert(1)".into())],
            ..SnapshotState::default()
        };
        let json = state.to_script_json(false).unwrap();
        assert!(!json.contains('<'));
        assert_eq!(SnapshotState::from_json(&json).unwrap(), state);
    }
}
