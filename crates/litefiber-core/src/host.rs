//! Host node operations consumed by the engine.
//!
//! The host is the arbiter of validity: node creation may fail (unknown kind,
//! exhausted resources) and the error aborts the running build. Creation only
//! happens during the build phase, on nodes that are not attached yet. The
//! mutation operations are used by the commit pass, which must run to
//! completion, so they are infallible.

use std::fmt::Debug;

use crate::element::{AttrValue, EventHandler};
use crate::error::HostError;

pub trait HostOps {
    /// Handle to a host node. Cloning must yield the same node.
    type Node: Clone + Debug;

    fn create_node(&mut self, kind: &str) -> Result<Self::Node, HostError>;
    fn create_text_node(&mut self) -> Result<Self::Node, HostError>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &AttrValue);
    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    fn add_event_listener(&mut self, node: &Self::Node, event: &str, handler: &EventHandler);
    fn remove_event_listener(&mut self, node: &Self::Node, event: &str, handler: &EventHandler);

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);
    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node);
}
