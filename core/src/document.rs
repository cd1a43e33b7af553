//! DOM-like document arena.
//!
//! Components render into a [`Document`]: a flat arena of [`Node`]s addressed by [`NodeId`].
//! Besides markup, every node carries [`NodeMeta`], the resumability metadata recorded while
//! rendering: listeners attached to the element, values held by the component that owns it, and
//! subscriptions between captured values. The document also owns the [`Heap`] those values live
//! in.
//!
//! Traversal is always in document order (pre-order, children in insertion order), which is the
//! order the snapshot and prefetch builders depend on.

use core::fmt::Write as _;

use indexmap::IndexMap;

use crate::{
    handle::HandleId,
    value::{Heap, ObjectId, Value},
};

/// Identifier for a node stored inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates a new [`NodeId`] from the raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index backing this identifier.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A node of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// An element with its attributes in insertion order.
    Element {
        /// Lower-case tag name.
        tag: String,
        /// Attributes.
        attributes: IndexMap<String, String>,
    },
    /// A text node.
    Text(String),
    /// A comment node.
    Comment(String),
}

impl Node {
    /// Returns the tag name if this node is an element.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

/// An event listener attached to an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    /// Event name, such as `click`.
    pub event: String,
    /// The interned handle implementing the listener.
    pub handle: HandleId,
}

/// A subscription edge: `subscriber` reacts to changes of `source`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// The reacting value, usually a handle to a task or computed value.
    pub subscriber: Value,
    /// The observed heap cell.
    pub source: ObjectId,
}

/// Resumability metadata recorded on a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeMeta {
    /// Listeners, in attachment order.
    pub listeners: Vec<Listener>,
    /// Values held by the component rendered at this node.
    pub held: Vec<Value>,
    /// Subscriptions recorded while rendering this node.
    pub subscriptions: Vec<Subscription>,
}

impl NodeMeta {
    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty() && self.held.is_empty() && self.subscriptions.is_empty()
    }
}

#[derive(Debug, Clone)]
struct NodeEntry {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    node: Node,
    meta: NodeMeta,
}

impl NodeEntry {
    fn new(node: Node, parent: Option<NodeId>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            node,
            meta: NodeMeta::default(),
        }
    }
}

/// Options used when creating a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentOptions {
    /// Location of the rendered page. Must be an absolute URL when set.
    pub url: Option<String>,
    /// Enables developer-oriented output.
    pub debug: bool,
    /// HTML source the factory builds the document from, for factories that parse templates.
    pub html: Option<String>,
}

/// Errors raised while creating a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// The document location is not an absolute URL.
    #[error("document url `{0}` is not an absolute URL")]
    InvalidUrl(String),
    /// The factory produced a document without a root element.
    #[error("document has no root element")]
    MissingRoot,
    /// The factory cannot build a document from HTML source.
    #[error("document factory does not accept html source")]
    HtmlUnsupported,
    /// An element name that cannot be written as markup.
    #[error("`{0}` is not a valid tag name")]
    InvalidTagName(String),
}

/// Returns `true` when `tag` can be written as an element name: an ASCII letter followed by ASCII
/// alphanumerics or `-`.
#[must_use]
pub fn is_valid_tag_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Creates the empty documents components are rendered into.
pub trait DocumentFactory: Send + Sync {
    /// Creates a document for one render call.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] when the options cannot be honored.
    fn create(&self, options: &DocumentOptions) -> Result<Document, DocumentError>;
}

/// Factory producing `<html><head></head><body></body></html>`.
///
/// HTML source is rejected with [`DocumentError::HtmlUnsupported`]; template-based documents need
/// a factory that parses markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankDocument;

impl DocumentFactory for BlankDocument {
    fn create(&self, options: &DocumentOptions) -> Result<Document, DocumentError> {
        if let Some(url) = &options.url
            && !is_absolute_url(url)
        {
            return Err(DocumentError::InvalidUrl(url.clone()));
        }
        if options.html.is_some() {
            return Err(DocumentError::HtmlUnsupported);
        }

        let mut document = Document::new();
        let html = document.set_root("html");
        document.append_element(html, "head");
        document.append_element(html, "body");
        document.url.clone_from(&options.url);
        document.debug = options.debug;
        Ok(document)
    }
}

fn is_absolute_url(url: &str) -> bool {
    let Some((scheme, rest)) = url.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
}

/// Arena storing the rendered nodes, their metadata and the captured heap.
#[derive(Debug, Default, Clone)]
pub struct Document {
    nodes: Vec<NodeEntry>,
    root: Option<NodeId>,
    heap: Heap,
    url: Option<String>,
    debug: bool,
}

impl Document {
    /// Creates an empty document without a root element.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            heap: Heap::new(),
            url: None,
            debug: false,
        }
    }

    /// Replaces the root element, clearing every existing node.
    pub fn set_root(&mut self, tag: &str) -> NodeId {
        self.nodes.clear();
        let id = self.push_entry(NodeEntry::new(element(tag), None));
        self.root = Some(id);
        id
    }

    /// Returns the root element, if one exists.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Returns the page location the document was created for.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Returns `true` when the document was created in debug mode.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Appends a new element under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if the parent node does not exist.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.append(parent, element(tag))
    }

    /// Appends a text node under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if the parent node does not exist.
    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.append(parent, Node::Text(text.into()))
    }

    /// Appends a comment node under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if the parent node does not exist.
    pub fn append_comment(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        self.append(parent, Node::Comment(text.into()))
    }

    fn append(&mut self, parent: NodeId, node: Node) -> NodeId {
        let parent_index = parent.index();
        assert!(
            parent_index < self.nodes.len(),
            "parent must exist before inserting children"
        );

        let id = self.push_entry(NodeEntry::new(node, Some(parent)));
        self.nodes[parent_index].children.push(id);
        id
    }

    fn push_entry(&mut self, entry: NodeEntry) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(entry);
        id
    }

    /// Returns a node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).map(|entry| &entry.node)
    }

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.index()).and_then(|entry| entry.parent)
    }

    /// Returns the child identifiers for the provided node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.index())
            .map_or(&[], |entry| entry.children.as_slice())
    }

    /// Sets an attribute on an element. Returns `false` if `id` is not an element.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) -> bool {
        match self.nodes.get_mut(id.index()).map(|entry| &mut entry.node) {
            Some(Node::Element { attributes, .. }) => {
                attributes.insert(name.to_string(), value.into());
                true
            }
            _ => false,
        }
    }

    /// Reads an attribute of an element.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.node(id)? {
            Node::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            _ => None,
        }
    }

    /// Returns the metadata recorded on a node.
    #[must_use]
    pub fn meta(&self, id: NodeId) -> Option<&NodeMeta> {
        self.nodes.get(id.index()).map(|entry| &entry.meta)
    }

    /// Returns the metadata recorded on a node mutably.
    pub fn meta_mut(&mut self, id: NodeId) -> Option<&mut NodeMeta> {
        self.nodes.get_mut(id.index()).map(|entry| &mut entry.meta)
    }

    /// Returns the heap holding captured values.
    #[must_use]
    pub const fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Returns the heap holding captured values mutably.
    pub const fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Returns `id` and all of its descendants in document order.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if current.index() >= self.nodes.len() {
                continue;
            }
            order.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        order
    }

    /// Returns every node in document order.
    #[must_use]
    pub fn walk(&self) -> Vec<NodeId> {
        self.root.map_or_else(Vec::new, |root| self.descendants(root))
    }

    /// Returns the first element with the given tag, in document order.
    #[must_use]
    pub fn find_element(&self, tag: &str) -> Option<NodeId> {
        self.walk()
            .into_iter()
            .find(|id| self.node(*id).and_then(Node::tag) == Some(tag))
    }

    /// Returns the `<head>` element, if present.
    #[must_use]
    pub fn head(&self) -> Option<NodeId> {
        self.find_element("head")
    }

    /// Returns the `<body>` element, if present.
    #[must_use]
    pub fn body(&self) -> Option<NodeId> {
        self.find_element("body")
    }

    /// Returns the total number of nodes stored in this document.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when the document has no nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Serializes the whole document, prefixed with a doctype.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>");
        if let Some(root) = self.root {
            self.write_node(root, &mut out);
        }
        out
    }

    /// Serializes one node and its subtree.
    #[must_use]
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(entry) = self.nodes.get(id.index()) else {
            return;
        };
        match &entry.node {
            Node::Text(text) => {
                let raw = entry
                    .parent
                    .and_then(|parent| self.node(parent))
                    .and_then(Node::tag)
                    .is_some_and(is_raw_text_element);
                if raw {
                    out.push_str(text);
                } else {
                    escape_into(text, false, out);
                }
            }
            Node::Comment(text) => {
                let _ = write!(out, "<!--{text}-->");
            }
            Node::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        escape_into(value, true, out);
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                for child in &entry.children {
                    self.write_node(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

fn element(tag: &str) -> Node {
    Node::Element {
        tag: tag.to_ascii_lowercase(),
        attributes: IndexMap::new(),
    }
}

fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "source" | "track" | "wbr"
    )
}

fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
