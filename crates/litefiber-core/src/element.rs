//! # Elements
//!
//! An [`Element`] is an immutable description of what should exist: a kind,
//! a set of attributes and an ordered list of children. A fresh element tree
//! is produced on every render pass; the engine diffs it against the fibers
//! of the previous generation.
//!
//! Text content is an element of kind [`ElementKind::Text`] whose
//! [`TEXT_VALUE`] attribute carries the string.
//!
//! ```rust
//! use litefiber_core::*;
//!
//! let heading = create_element(
//!     "h1",
//!     Attributes::new().with("class", "title"),
//!     ["hello"],
//! );
//! assert_eq!(heading.children().len(), 1);
//! assert_eq!(heading.children()[0].kind(), &ElementKind::Text);
//! ```

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::state::RenderContext;

/// Attribute carrying the string of a text element.
pub const TEXT_VALUE: &str = "nodeValue";

/// Reserved attribute name for a node's child list; never written to a host node.
pub const CHILDREN: &str = "children";

/// Attribute names starting with this marker are event listeners.
pub const EVENT_PREFIX: &str = "on";

pub type Callback = Rc<dyn Fn()>;

/// Event listener value. Two handlers are equal only if they are the same
/// allocation, so re-creating a closure on every render counts as a change.
#[derive(Clone)]
pub struct EventHandler(Callback);

impl EventHandler {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self) {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &EventHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler(<callback>)")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handler(EventHandler),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            AttrValue::Handler(h) => Some(h),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(x) => write!(f, "{x}"),
            AttrValue::Bool(b) => write!(f, "{b}"),
            AttrValue::Handler(_) => f.write_str("<handler>"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<&String> for AttrValue {
    fn from(v: &String) -> Self {
        AttrValue::Str(v.clone())
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v.into())
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Int(v.into())
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<EventHandler> for AttrValue {
    fn from(v: EventHandler) -> Self {
        AttrValue::Handler(v)
    }
}

/// Ordered attribute map. Iteration order is by name, which keeps host
/// mutation sequences deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attributes(BTreeMap<String, AttrValue>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Adds a listener under `on{event}`.
    pub fn on(self, event: &str, f: impl Fn() + 'static) -> Self {
        self.on_handler(event, EventHandler::new(f))
    }

    pub fn on_handler(self, event: &str, handler: EventHandler) -> Self {
        self.with(format!("{EVENT_PREFIX}{event}"), handler)
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttrValue::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<AttrValue>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

pub fn is_event(name: &str) -> bool {
    name.starts_with(EVENT_PREFIX)
}

pub fn is_property(name: &str) -> bool {
    name != CHILDREN && !is_event(name)
}

/// `onClick` -> `click`
pub fn event_name(name: &str) -> String {
    name[EVENT_PREFIX.len()..].to_lowercase()
}

type RenderFn = dyn Fn(&mut RenderContext<'_>, &Attributes) -> Element;

/// A function component. Identity is the Rust type of the render function,
/// so every use of the same `fn` item (or closure definition site) is the same kind.
#[derive(Clone)]
pub struct ComponentRef {
    id: TypeId,
    name: &'static str,
    render: Rc<RenderFn>,
}

impl ComponentRef {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&mut RenderContext<'_>, &Attributes) -> Element + 'static,
    {
        let full = std::any::type_name::<F>();
        Self {
            id: TypeId::of::<F>(),
            name: full.rsplit("::").next().unwrap_or(full),
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, cx: &mut RenderContext<'_>, attributes: &Attributes) -> Element {
        (self.render)(cx, attributes)
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentRef").field(&self.name).finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementKind {
    Host(String),
    Text,
    Component(ComponentRef),
}

impl From<&str> for ElementKind {
    fn from(tag: &str) -> Self {
        ElementKind::Host(tag.to_string())
    }
}

impl From<String> for ElementKind {
    fn from(tag: String) -> Self {
        ElementKind::Host(tag)
    }
}

impl From<ComponentRef> for ElementKind {
    fn from(c: ComponentRef) -> Self {
        ElementKind::Component(c)
    }
}

/// Immutable element description. Cloning is cheap: attributes and children
/// are shared.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    kind: ElementKind,
    attributes: Rc<Attributes>,
    children: Rc<[Element]>,
}

impl Element {
    pub fn new(kind: impl Into<ElementKind>, attributes: Attributes) -> Self {
        Element {
            kind: kind.into(),
            attributes: Rc::new(attributes),
            children: Rc::from([]),
        }
    }

    pub fn text(value: impl Into<AttrValue>) -> Self {
        Element::new(ElementKind::Text, Attributes::new().with(TEXT_VALUE, value))
    }

    pub fn component<F>(render: F, attributes: Attributes) -> Self
    where
        F: Fn(&mut RenderContext<'_>, &Attributes) -> Element + 'static,
    {
        Element::new(ComponentRef::new(render), attributes)
    }

    pub fn with_children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Element>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub(crate) fn shared_attributes(&self) -> Rc<Attributes> {
        self.attributes.clone()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub(crate) fn shared_children(&self) -> Rc<[Element]> {
        self.children.clone()
    }
}

/// Builds an element; any child that is not already an [`Element`] is
/// wrapped into a text element.
pub fn create_element<K, I, C>(kind: K, attributes: Attributes, children: I) -> Element
where
    K: Into<ElementKind>,
    I: IntoIterator<Item = C>,
    C: Into<Element>,
{
    Element::new(kind, attributes).with_children(children)
}

macro_rules! text_child {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Element {
                fn from(v: $t) -> Self {
                    Element::text(v)
                }
            }
        )*
    };
}

text_child!(&str, String, &String, i64, i32, u32, usize, f64, bool);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_element_children_become_text() {
        let el = create_element("p", Attributes::new(), [Element::from("a"), Element::from(7)]);
        let kids = el.children();
        assert_eq!(kids.len(), 2);
        assert!(kids.iter().all(|c| c.kind() == &ElementKind::Text));
        assert_eq!(kids[0].attributes().get(TEXT_VALUE), Some(&AttrValue::from("a")));
        assert_eq!(kids[1].attributes().get(TEXT_VALUE), Some(&AttrValue::Int(7)));
        assert!(kids[0].children().is_empty());
    }

    #[test]
    fn test_event_names() {
        assert!(is_event("onClick"));
        assert!(!is_property("onClick"));
        assert!(!is_property(CHILDREN));
        assert!(is_property("id"));
        assert_eq!(event_name("onClick"), "click");
        assert_eq!(event_name("onmouseover"), "mouseover");
    }

    #[test]
    fn test_component_identity_is_per_function() {
        fn one(_: &mut RenderContext<'_>, _: &Attributes) -> Element {
            Element::text("one")
        }
        fn two(_: &mut RenderContext<'_>, _: &Attributes) -> Element {
            Element::text("two")
        }

        assert_eq!(ComponentRef::new(one), ComponentRef::new(one));
        assert_ne!(ComponentRef::new(one), ComponentRef::new(two));
        assert_eq!(ComponentRef::new(one).name(), "one");
    }

    #[test]
    fn test_handlers_compare_by_identity() {
        let h = EventHandler::new(|| {});
        assert_eq!(AttrValue::Handler(h.clone()), AttrValue::Handler(h));
        assert_ne!(
            AttrValue::Handler(EventHandler::new(|| {})),
            AttrValue::Handler(EventHandler::new(|| {}))
        );
    }
}
