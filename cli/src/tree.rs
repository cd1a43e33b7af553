//! Declarative component trees loaded from JSON.
//!
//! ```json
//! {
//!   "tag": "div",
//!   "state": { "count": 0 },
//!   "watch": [{ "symbol": "s_log", "on": ["count"] }],
//!   "children": [
//!     { "tag": "button", "on": { "click": { "symbol": "s_inc", "captures": ["count"] } },
//!       "children": ["+1"] }
//!   ]
//! }
//! ```
//!
//! `state` entries become heap cells held by the element and are visible by name to the
//! element's descendants. `captures` and `watch.on` refer to those names.

use std::{fs, path::Path};

use color_eyre::eyre::{Context, Result};
use dew_core::{Component, LazyHandle, ObjectId, RenderContext, RenderError, Value};
use indexmap::IndexMap;
use serde::Deserialize;

/// A node of a declarative tree: text or an element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// A text node.
    Text(String),
    /// An element.
    Element(TreeElement),
}

/// An element of a declarative tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreeElement {
    pub tag: String,
    #[serde(default)]
    pub attributes: IndexMap<String, String>,
    #[serde(default)]
    pub state: IndexMap<String, serde_json::Value>,
    #[serde(default)]
    pub on: IndexMap<String, HandleSpec>,
    #[serde(default)]
    pub watch: Vec<WatchSpec>,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

/// A lazy handle written as data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HandleSpec {
    pub symbol: String,
    #[serde(default)]
    pub chunk: Option<String>,
    /// Names of state cells captured by the handle.
    #[serde(default)]
    pub captures: Vec<String>,
}

/// A task re-run when any of the named state cells change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchSpec {
    pub symbol: String,
    #[serde(default)]
    pub on: Vec<String>,
}

impl TreeNode {
    /// Reads a tree from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    fn render_in(&self, cx: &mut RenderContext<'_>, scope: &Scope) -> Result<(), RenderError> {
        match self {
            Self::Text(text) => {
                cx.text(text.as_str());
                Ok(())
            }
            Self::Element(element) => element.render_in(cx, scope),
        }
    }
}

impl Component for TreeNode {
    fn render(&self, cx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        self.render_in(cx, &Scope::default())
    }

    fn name(&self) -> &str {
        match self {
            Self::Text(_) => "text",
            Self::Element(element) => &element.tag,
        }
    }
}

type Scope = IndexMap<String, ObjectId>;

impl TreeElement {
    fn render_in(&self, cx: &mut RenderContext<'_>, scope: &Scope) -> Result<(), RenderError> {
        cx.element(&self.tag, |cx| {
            for (name, value) in &self.attributes {
                cx.attr(name, value.as_str());
            }

            let mut scope = scope.clone();
            for (name, value) in &self.state {
                let id = cx.use_store(json_to_value(value));
                scope.insert(name.clone(), id);
            }

            for watch in &self.watch {
                let sources = watch
                    .on
                    .iter()
                    .map(|name| lookup(&scope, &self.tag, name))
                    .collect::<Result<Vec<_>, _>>()?;
                let task = sources
                    .iter()
                    .fold(LazyHandle::new(watch.symbol.as_str()), |handle, source| {
                        handle.capture(*source)
                    });
                let task = cx.handle(task);
                for source in sources {
                    cx.subscribe(task, source);
                }
            }

            for (event, spec) in &self.on {
                let mut handle = LazyHandle::new(spec.symbol.as_str());
                if let Some(chunk) = &spec.chunk {
                    handle = handle.with_chunk(chunk.as_str());
                }
                for name in &spec.captures {
                    handle = handle.capture(lookup(&scope, &self.tag, name)?);
                }
                cx.on(event, handle)?;
            }

            for child in &self.children {
                child.render_in(cx, &scope)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

fn lookup(scope: &Scope, tag: &str, name: &str) -> Result<ObjectId, RenderError> {
    scope
        .get(name)
        .copied()
        .ok_or_else(|| RenderError::component(tag, format!("unknown state `{name}`")))
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(value) => Value::Bool(*value),
        serde_json::Value::Number(number) => number.as_f64().map_or(Value::Null, Value::Number),
        serde_json::Value::String(value) => Value::String(value.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(entries) => Value::Map(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), json_to_value(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dew::{RenderOptions, Renderer};
    use dew_core::Manifest;
    use serde_json::json;

    fn renderer() -> Renderer {
        Renderer::new(
            Manifest::from_json(
                &json!({
                    "symbols": {
                        "s_inc": { "bundle": "q-counter" },
                        "s_log": { "bundle": "q-log" }
                    },
                    "bundles": {
                        "q-counter": { "path": "q-counter.js" },
                        "q-log": { "path": "q-log.js" }
                    }
                })
                .to_string(),
            )
            .unwrap(),
        )
    }

    fn tree(value: serde_json::Value) -> TreeNode {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn renders_state_listeners_and_watches() {
        let app = tree(json!({
            "tag": "div",
            "attributes": { "class": "counter" },
            "state": { "count": 0, "meta": { "label": "clicks" } },
            "watch": [{ "symbol": "s_log", "on": ["count"] }],
            "children": [
                { "tag": "button",
                  "on": { "click": { "symbol": "s_inc", "captures": ["count"] } },
                  "children": ["+1"] }
            ]
        }));

        let result = renderer()
            .render_to_string(&app, &RenderOptions::default())
            .unwrap();
        assert!(result.html.contains(r#"<div class="counter">"#));
        assert!(result.html.contains(
            r#"<button on:click="/build/q-counter.js#s_inc" q:id="0">+1</button>"#
        ));

        let state = result.snapshot_state.unwrap();
        assert_eq!(state.subscriptions.len(), 1);
        assert_eq!(state.listeners["0"].len(), 1);
        state.validate().unwrap();
    }

    #[test]
    fn unknown_state_names_fail_the_render() {
        let app = tree(json!({
            "tag": "button",
            "on": { "click": { "symbol": "s_inc", "captures": ["missing"] } }
        }));
        let err = renderer()
            .render_to_string(&app, &RenderOptions::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to render component tree: component `button` failed: unknown state `missing`"
        );
    }

    #[test]
    fn state_is_scoped_to_descendants() {
        let app = tree(json!({
            "tag": "main",
            "children": [
                { "tag": "section", "state": { "open": false } },
                { "tag": "button", "on": { "click": { "symbol": "s_inc", "captures": ["open"] } } }
            ]
        }));
        assert!(
            renderer()
                .render_to_string(&app, &RenderOptions::default())
                .is_err()
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(serde_json::from_value::<TreeNode>(json!({ "tag": "p", "onclick": "x" })).is_err());
        assert_eq!(tree(json!("hi")), TreeNode::Text("hi".into()));
    }
}
