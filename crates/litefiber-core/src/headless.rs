//! # Headless host
//!
//! An in-memory node tree implementing [`HostOps`]. Every operation the
//! engine performs is appended to an operation log, which makes it the host of
//! choice for tests and for running components without a real surface.
//!
//! `remove_child` frees the removed node together with its subtree, so handles
//! to removed nodes go stale. Nodes created but never attached (by a build that
//! was aborted or superseded) stay in the arena until the host is dropped.
//!
//! ```rust
//! use litefiber_core::*;
//!
//! let mut host = HeadlessHost::new();
//! let root = host.create_container();
//! let engine = Engine::new(host);
//! engine
//!     .render(create_element("p", Attributes::new(), ["hi"]), root)
//!     .unwrap();
//! engine.run_until_idle().unwrap();
//! assert_eq!(engine.with_host(|h| h.to_markup(root)), "<p>hi</p>");
//! ```

use std::collections::BTreeMap;
use std::fmt::Write;

use slotmap::{SlotMap, new_key_type};

use crate::element::{AttrValue, EventHandler, TEXT_VALUE};
use crate::error::HostError;
use crate::host::HostOps;

new_key_type! {
    pub struct NodeId;
}

#[derive(Clone, Debug, PartialEq)]
pub enum HostOp {
    CreateNode { node: NodeId, tag: String },
    CreateText { node: NodeId },
    SetAttribute { node: NodeId, name: String, value: String },
    RemoveAttribute { node: NodeId, name: String },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
    AppendChild { parent: NodeId, child: NodeId },
    RemoveChild { parent: NodeId, child: NodeId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    Element(String),
    Text,
}

#[derive(Debug)]
struct HostNode {
    kind: NodeKind,
    attributes: BTreeMap<String, AttrValue>,
    listeners: Vec<(String, EventHandler)>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl HostNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
            listeners: Vec::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct HeadlessHost {
    nodes: SlotMap<NodeId, HostNode>,
    log: Vec<HostOp>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A root container to render into. Not recorded in the log.
    pub fn create_container(&mut self) -> NodeId {
        self.nodes.insert(HostNode::new(NodeKind::Container))
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.log
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.log)
    }

    /// Live nodes, containers included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.nodes.get(node).map(|n| &n.kind)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&AttrValue> {
        self.nodes.get(node).and_then(|n| n.attributes.get(name))
    }

    /// Value of a text node.
    pub fn text(&self, node: NodeId) -> Option<String> {
        match self.kind(node)? {
            NodeKind::Text => Some(
                self.attribute(node, TEXT_VALUE)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }

    /// Concatenated text of a subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        match self.text(node) {
            Some(text) => text,
            None => self
                .children(node)
                .iter()
                .map(|c| self.text_content(*c))
                .collect(),
        }
    }

    pub fn listeners(&self, node: NodeId, event: &str) -> Vec<EventHandler> {
        self.nodes
            .get(node)
            .map(|n| {
                n.listeners
                    .iter()
                    .filter(|(e, _)| e == event)
                    .map(|(_, h)| h.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Calls every `event` listener on `node`; returns how many ran.
    pub fn dispatch(&self, node: NodeId, event: &str) -> usize {
        let handlers = self.listeners(node, event);
        for handler in &handlers {
            handler.call();
        }
        handlers.len()
    }

    /// First element below `root` (pre-order, `root` included) with this tag.
    pub fn find(&self, root: NodeId, tag: &str) -> Option<NodeId> {
        if matches!(self.kind(root), Some(NodeKind::Element(t)) if t == tag) {
            return Some(root);
        }
        self.children(root).iter().find_map(|c| self.find(*c, tag))
    }

    /// Serialises a subtree. Containers render only their children; event
    /// listeners are omitted.
    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Container => {
                for child in &node.children {
                    self.write_markup(*child, out);
                }
            }
            NodeKind::Text => {
                if let Some(value) = node.attributes.get(TEXT_VALUE) {
                    out.push_str(&escape(&value.to_string()));
                }
            }
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &node.attributes {
                    let _ = write!(out, " {name}=\"{}\"", escape(&value.to_string()));
                }
                out.push('>');
                for child in &node.children {
                    self.write_markup(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes.get(child).and_then(|n| n.parent)
            && let Some(p) = self.nodes.get_mut(parent)
        {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(id) {
            for child in node.children {
                self.free_subtree(child);
            }
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn validate_tag(tag: &str) -> Result<(), HostError> {
    if tag.is_empty() {
        return Err(HostError::new(tag, "empty tag"));
    }
    if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(HostError::new(tag, "tags may only contain ASCII letters, digits and '-'"));
    }
    Ok(())
}

impl HostOps for HeadlessHost {
    type Node = NodeId;

    fn create_node(&mut self, kind: &str) -> Result<NodeId, HostError> {
        validate_tag(kind)?;
        let node = self.nodes.insert(HostNode::new(NodeKind::Element(kind.to_string())));
        self.log.push(HostOp::CreateNode {
            node,
            tag: kind.to_string(),
        });
        Ok(node)
    }

    fn create_text_node(&mut self) -> Result<NodeId, HostError> {
        let node = self.nodes.insert(HostNode::new(NodeKind::Text));
        self.log.push(HostOp::CreateText { node });
        Ok(node)
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &AttrValue) {
        if let Some(n) = self.nodes.get_mut(*node) {
            n.attributes.insert(name.to_string(), value.clone());
        }
        self.log.push(HostOp::SetAttribute {
            node: *node,
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) {
        if let Some(n) = self.nodes.get_mut(*node) {
            n.attributes.remove(name);
        }
        self.log.push(HostOp::RemoveAttribute {
            node: *node,
            name: name.to_string(),
        });
    }

    fn add_event_listener(&mut self, node: &NodeId, event: &str, handler: &EventHandler) {
        if let Some(n) = self.nodes.get_mut(*node)
            && !n.listeners.iter().any(|(e, h)| e == event && h.ptr_eq(handler))
        {
            n.listeners.push((event.to_string(), handler.clone()));
        }
        self.log.push(HostOp::AddListener {
            node: *node,
            event: event.to_string(),
        });
    }

    fn remove_event_listener(&mut self, node: &NodeId, event: &str, handler: &EventHandler) {
        if let Some(n) = self.nodes.get_mut(*node)
            && let Some(pos) = n
                .listeners
                .iter()
                .position(|(e, h)| e == event && h.ptr_eq(handler))
        {
            n.listeners.remove(pos);
        }
        self.log.push(HostOp::RemoveListener {
            node: *node,
            event: event.to_string(),
        });
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
        self.detach(*child);
        if let Some(p) = self.nodes.get_mut(*parent) {
            p.children.push(*child);
        }
        if let Some(c) = self.nodes.get_mut(*child) {
            c.parent = Some(*parent);
        }
        self.log.push(HostOp::AppendChild {
            parent: *parent,
            child: *child,
        });
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) {
        if self.parent(*child) == Some(*parent) {
            self.detach(*child);
            self.free_subtree(*child);
        } else {
            log::warn!("remove_child: {child:?} is not a child of {parent:?}");
        }
        self.log.push(HostOp::RemoveChild {
            parent: *parent,
            child: *child,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_rejects_invalid_tags() {
        let mut host = HeadlessHost::new();
        assert!(host.create_node("").is_err());
        assert!(host.create_node("no spaces").is_err());
        assert!(host.create_node("my-widget").is_ok());
    }

    #[test]
    fn test_append_moves_node() {
        let mut host = HeadlessHost::new();
        let a = host.create_container();
        let b = host.create_container();
        let child = host.create_node("span").unwrap();
        host.append_child(&a, &child);
        host.append_child(&b, &child);
        assert!(host.children(a).is_empty());
        assert_eq!(host.children(b), &[child]);
        assert_eq!(host.parent(child), Some(b));
    }

    #[test]
    fn test_listeners_and_dispatch() {
        let mut host = HeadlessHost::new();
        let button = host.create_node("button").unwrap();
        let hits = Rc::new(Cell::new(0));
        let handler = EventHandler::new({
            let hits = hits.clone();
            move || hits.set(hits.get() + 1)
        });

        host.add_event_listener(&button, "click", &handler);
        host.add_event_listener(&button, "click", &handler);
        assert_eq!(host.dispatch(button, "click"), 1);
        assert_eq!(hits.get(), 1);

        host.remove_event_listener(&button, "click", &handler);
        assert_eq!(host.dispatch(button, "click"), 0);
    }

    #[test]
    fn test_remove_child_frees_subtree() {
        let mut host = HeadlessHost::new();
        let root = host.create_container();
        let list = host.create_node("ul").unwrap();
        let item = host.create_node("li").unwrap();
        let text = host.create_text_node().unwrap();
        host.append_child(&root, &list);
        host.append_child(&list, &item);
        host.append_child(&item, &text);
        assert_eq!(host.node_count(), 4);

        host.remove_child(&root, &list);
        assert_eq!(host.node_count(), 1);
        assert!(!host.contains(list));
        assert!(!host.contains(item));
        assert!(!host.contains(text));
        assert!(host.children(root).is_empty());
    }

    #[test]
    fn test_remove_child_of_other_parent_keeps_node() {
        let mut host = HeadlessHost::new();
        let a = host.create_container();
        let b = host.create_container();
        let child = host.create_node("span").unwrap();
        host.append_child(&a, &child);
        host.remove_child(&b, &child);
        assert!(host.contains(child));
        assert_eq!(host.parent(child), Some(a));
    }

    #[test]
    fn test_markup() {
        let mut host = HeadlessHost::new();
        let root = host.create_container();
        let p = host.create_node("p").unwrap();
        let text = host.create_text_node().unwrap();
        host.set_attribute(&p, "class", &AttrValue::from("x"));
        host.set_attribute(&text, TEXT_VALUE, &AttrValue::from("a < b"));
        host.append_child(&root, &p);
        host.append_child(&p, &text);
        assert_eq!(host.to_markup(root), "<p class=\"x\">a &lt; b</p>");
        assert_eq!(host.text_content(root), "a < b");
        assert_eq!(host.find(root, "p"), Some(p));
    }
}
