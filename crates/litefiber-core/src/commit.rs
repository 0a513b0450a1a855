//! # Commit
//!
//! Applies a finished work-in-progress generation to the host in one
//! uninterrupted pass: pending deletions first, then every fiber of the new
//! tree in pre-order. Afterwards the new tree becomes the committed one and the
//! previous generation is dropped.

use crate::element::{AttrValue, Attributes, event_name, is_event, is_property};
use crate::fiber::{Effect, FiberKey, FiberTree};
use crate::host::HostOps;
use crate::scheduler::{CommitStats, EngineContext, Phase};

impl<H: HostOps> EngineContext<H> {
    pub(crate) fn commit_root(&mut self) -> CommitStats {
        self.phase = Phase::CommitPending;
        let mut stats = CommitStats {
            units: self.units,
            state_mismatches: self.state_mismatches,
            ..CommitStats::default()
        };
        let Some(mut wip) = self.wip.take() else {
            self.phase = Phase::Idle;
            return stats;
        };

        for key in std::mem::take(&mut self.deletions) {
            if let Some(current) = self.current.as_ref() {
                commit_deletion(&mut self.host, current, key);
                stats.deletions += 1;
            }
        }

        let root = wip.root();
        let mut cursor = wip[root].child;
        while let Some(key) = cursor {
            let fiber = &wip[key];
            match fiber.effect {
                Effect::Placement => {
                    if let (Some(node), Some(parent)) = (&fiber.node, wip.host_parent(key)) {
                        self.host.append_child(parent, node);
                    }
                    stats.placements += 1;
                }
                Effect::Update => {
                    if let Some(node) = &fiber.node {
                        let previous = fiber
                            .alternate
                            .zip(self.current.as_ref())
                            .and_then(|(alternate, current)| current.get(alternate))
                            .map(|f| f.attributes.clone())
                            .unwrap_or_default();
                        apply_attributes(&mut self.host, node, &previous, &fiber.attributes);
                    }
                    stats.updates += 1;
                }
                Effect::None | Effect::Deletion => {}
            }

            let fiber = &mut wip[key];
            fiber.effect = Effect::None;
            fiber.alternate = None;
            cursor = wip.next_unit(key);
        }
        wip[root].alternate = None;

        self.current = Some(wip);
        self.units = 0;
        self.state_mismatches = 0;
        self.phase = Phase::Idle;
        log::debug!(
            "committed: {} placed, {} updated, {} deleted ({} units)",
            stats.placements,
            stats.updates,
            stats.deletions,
            stats.units
        );

        if std::mem::take(&mut self.update_after_commit) {
            self.schedule_update();
        }
        stats
    }
}

/// Removes the host subtree of a fiber from the committed tree.
fn commit_deletion<H: HostOps>(host: &mut H, tree: &FiberTree<H::Node>, key: FiberKey) {
    let Some(parent) = tree.host_parent(key) else {
        log::warn!("deleted fiber has no host ancestor");
        return;
    };
    remove_host_subtree(host, tree, key, parent);
}

fn remove_host_subtree<H: HostOps>(
    host: &mut H,
    tree: &FiberTree<H::Node>,
    key: FiberKey,
    parent: &H::Node,
) {
    match tree.get(key).and_then(|f| f.node.as_ref()) {
        Some(node) => host.remove_child(parent, node),
        // function components own no node; their rendered children do
        None => {
            for child in tree.children(key) {
                remove_host_subtree(host, tree, child, parent);
            }
        }
    }
}

/// Applies the attribute and listener delta between `prev` and `next`.
pub(crate) fn apply_attributes<H: HostOps>(
    host: &mut H,
    node: &H::Node,
    prev: &Attributes,
    next: &Attributes,
) {
    // old or changed listeners
    for (name, value) in prev.iter().filter(|(name, _)| is_event(name)) {
        if next.get(name) != Some(value)
            && let AttrValue::Handler(handler) = value
        {
            host.remove_event_listener(node, &event_name(name), handler);
        }
    }

    for (name, value) in next.iter().filter(|(name, _)| is_event(name)) {
        if prev.get(name) == Some(value) {
            continue;
        }
        match value {
            AttrValue::Handler(handler) => {
                host.add_event_listener(node, &event_name(name), handler)
            }
            other => log::warn!("`{name}` is an event attribute but holds {other:?}; skipping"),
        }
    }

    for (name, _) in prev.iter().filter(|(name, _)| is_property(name)) {
        if !next.contains(name) {
            host.remove_attribute(node, name);
        }
    }

    for (name, value) in next.iter().filter(|(name, _)| is_property(name)) {
        if prev.get(name) != Some(value) {
            host.set_attribute(node, name, value);
        }
    }
}
