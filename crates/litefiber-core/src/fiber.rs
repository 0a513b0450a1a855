//! # Fibers
//!
//! A fiber is the unit of work and the durable record of one rendered node.
//! Each generation lives in its own [`FiberTree`] arena: `parent`, `child`
//! and `sibling` are keys into that same arena, while `alternate` is a key
//! into the *previous* (committed) generation and is only ever used for diff
//! lookups. The two arenas never own each other's fibers.

use std::ops::{Index, IndexMut};
use std::rc::Rc;

use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

use crate::element::{Attributes, ComponentRef, Element, ElementKind};
use crate::state::StateSlot;

new_key_type! {
    pub struct FiberKey;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Effect {
    #[default]
    None,
    Placement,
    Update,
    Deletion,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FiberKind {
    /// Owns the host container; its single child is the rendered element.
    Root,
    Host(String),
    Text,
    Component(ComponentRef),
}

impl FiberKind {
    /// Same logical node: equal host tag, both text, or the same component.
    pub fn matches(&self, kind: &ElementKind) -> bool {
        match (self, kind) {
            (FiberKind::Host(a), ElementKind::Host(b)) => a == b,
            (FiberKind::Text, ElementKind::Text) => true,
            (FiberKind::Component(a), ElementKind::Component(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, FiberKind::Component(_))
    }

    pub fn label(&self) -> String {
        match self {
            FiberKind::Root => "#root".to_string(),
            FiberKind::Host(tag) => tag.clone(),
            FiberKind::Text => "#text".to_string(),
            FiberKind::Component(c) => c.name().to_string(),
        }
    }
}

impl From<&ElementKind> for FiberKind {
    fn from(kind: &ElementKind) -> Self {
        match kind {
            ElementKind::Host(tag) => FiberKind::Host(tag.clone()),
            ElementKind::Text => FiberKind::Text,
            ElementKind::Component(c) => FiberKind::Component(c.clone()),
        }
    }
}

pub struct Fiber<N> {
    pub kind: FiberKind,
    pub attributes: Rc<Attributes>,
    /// Element children still to be reconciled. Function components produce
    /// theirs by rendering instead.
    pub(crate) children: Rc<[Element]>,
    pub parent: Option<FiberKey>,
    pub child: Option<FiberKey>,
    pub sibling: Option<FiberKey>,
    pub node: Option<N>,
    pub alternate: Option<FiberKey>,
    pub effect: Effect,
    pub state: SmallVec<[StateSlot; 2]>,
}

impl<N> Fiber<N> {
    pub(crate) fn root(container: N, children: Rc<[Element]>, alternate: Option<FiberKey>) -> Self {
        Fiber {
            kind: FiberKind::Root,
            attributes: Rc::new(Attributes::new()),
            children,
            parent: None,
            child: None,
            sibling: None,
            node: Some(container),
            alternate,
            effect: Effect::None,
            state: SmallVec::new(),
        }
    }

    pub(crate) fn from_element(element: &Element, parent: FiberKey) -> Self {
        Fiber {
            kind: FiberKind::from(element.kind()),
            attributes: element.shared_attributes(),
            children: element.shared_children(),
            parent: Some(parent),
            child: None,
            sibling: None,
            node: None,
            alternate: None,
            effect: Effect::None,
            state: SmallVec::new(),
        }
    }
}

pub struct FiberTree<N> {
    fibers: SlotMap<FiberKey, Fiber<N>>,
    root: FiberKey,
}

impl<N> FiberTree<N> {
    pub fn new(root: Fiber<N>) -> Self {
        let mut fibers = SlotMap::with_key();
        let root = fibers.insert(root);
        Self { fibers, root }
    }

    pub fn root(&self) -> FiberKey {
        self.root
    }

    pub fn get(&self, key: FiberKey) -> Option<&Fiber<N>> {
        self.fibers.get(key)
    }

    pub fn get_mut(&mut self, key: FiberKey) -> Option<&mut Fiber<N>> {
        self.fibers.get_mut(key)
    }

    pub(crate) fn insert(&mut self, fiber: Fiber<N>) -> FiberKey {
        self.fibers.insert(fiber)
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Direct children in sibling order.
    pub fn children(&self, key: FiberKey) -> impl Iterator<Item = FiberKey> + '_ {
        std::iter::successors(self.get(key).and_then(|f| f.child), move |k| {
            self.get(*k).and_then(|f| f.sibling)
        })
    }

    /// Pre-order successor: the child if any, otherwise the sibling of the
    /// nearest ancestor (or self) that has one. `None` once the walk is back
    /// at the root.
    pub fn next_unit(&self, key: FiberKey) -> Option<FiberKey> {
        let fiber = self.get(key)?;
        if let Some(child) = fiber.child {
            return Some(child);
        }
        let mut cursor = Some(key);
        while let Some(k) = cursor {
            let fiber = self.get(k)?;
            if let Some(sibling) = fiber.sibling {
                return Some(sibling);
            }
            cursor = fiber.parent;
        }
        None
    }

    /// Host node of the nearest ancestor that owns one.
    pub fn host_parent(&self, key: FiberKey) -> Option<&N> {
        let mut cursor = self.get(key)?.parent;
        while let Some(k) = cursor {
            let fiber = self.get(k)?;
            if let Some(node) = &fiber.node {
                return Some(node);
            }
            cursor = fiber.parent;
        }
        None
    }
}

impl<N: Clone> FiberTree<N> {
    pub fn snapshot(&self, key: FiberKey) -> Option<FiberSnapshot<N>> {
        let fiber = self.get(key)?;
        Some(FiberSnapshot {
            kind: fiber.kind.label(),
            effect: fiber.effect,
            node: fiber.node.clone(),
            state_slots: fiber.state.len(),
            children: self
                .children(key)
                .filter_map(|child| self.snapshot(child))
                .collect(),
        })
    }
}

impl<N> Index<FiberKey> for FiberTree<N> {
    type Output = Fiber<N>;

    fn index(&self, key: FiberKey) -> &Fiber<N> {
        &self.fibers[key]
    }
}

impl<N> IndexMut<FiberKey> for FiberTree<N> {
    fn index_mut(&mut self, key: FiberKey) -> &mut Fiber<N> {
        &mut self.fibers[key]
    }
}

/// Owned, inspectable copy of a fiber subtree.
#[derive(Clone, Debug, PartialEq)]
pub struct FiberSnapshot<N> {
    pub kind: String,
    pub effect: Effect,
    pub node: Option<N>,
    pub state_slots: usize,
    pub children: Vec<FiberSnapshot<N>>,
}

impl<N> FiberSnapshot<N> {
    /// First fiber in pre-order whose kind label equals `kind`.
    pub fn find(&self, kind: &str) -> Option<&FiberSnapshot<N>> {
        if self.kind == kind {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(kind))
    }

    /// `(kind, effect)` pairs in pre-order.
    pub fn effects(&self) -> Vec<(String, Effect)> {
        let mut out = vec![(self.kind.clone(), self.effect)];
        for child in &self.children {
            out.extend(child.effects());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(tree: &mut FiberTree<u32>, parent: FiberKey, tag: &str) -> FiberKey {
        let el = Element::new(tag, Attributes::new());
        tree.insert(Fiber::from_element(&el, parent))
    }

    #[test]
    fn test_preorder_walk() {
        let mut tree = FiberTree::new(Fiber::root(0u32, Rc::from([]), None));
        let root = tree.root();
        let a = leaf(&mut tree, root, "a");
        let b = leaf(&mut tree, a, "b");
        let c = leaf(&mut tree, root, "c");
        tree[root].child = Some(a);
        tree[a].child = Some(b);
        tree[a].sibling = Some(c);

        let mut order = vec![];
        let mut cursor = Some(root);
        while let Some(k) = cursor {
            order.push(tree[k].kind.label());
            cursor = tree.next_unit(k);
        }
        assert_eq!(order, ["#root", "a", "b", "c"]);
        assert_eq!(tree.children(root).collect::<Vec<_>>(), vec![a, c]);
    }

    #[test]
    fn test_host_parent_skips_nodeless_fibers() {
        let mut tree = FiberTree::new(Fiber::root(7u32, Rc::from([]), None));
        let root = tree.root();
        let a = leaf(&mut tree, root, "a");
        let b = leaf(&mut tree, a, "b");
        tree[root].child = Some(a);
        tree[a].child = Some(b);

        assert_eq!(tree.host_parent(b), Some(&7));
        tree[a].node = Some(3);
        assert_eq!(tree.host_parent(b), Some(&3));
        assert_eq!(tree.host_parent(root), None);
    }
}
