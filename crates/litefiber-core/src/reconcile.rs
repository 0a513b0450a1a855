//! # Reconciliation
//!
//! Matching is positional and type-keyed. The new element at index `i` and
//! the old fiber at sibling position `i` are the same logical node iff both
//! exist and their kinds are equal. There is no key attribute and no
//! lookahead: inserting or removing an element near the front of a list
//! shifts every following position, and each shifted position whose kind no
//! longer lines up becomes a deletion of the old fiber plus a placement of a
//! new one. Positions whose kinds happen to align are updated in place, even
//! if they now describe different content.
//!
//! Work is `O(max(new, old))` per sibling group.

use crate::element::Element;
use crate::fiber::{Effect, Fiber, FiberKey, FiberTree};

/// Builds the new child chain of `parent` in `wip` from `elements`, matching
/// against the children of `parent`'s alternate in `current`.
///
/// Old fibers without a match are marked [`Effect::Deletion`] in `current`
/// and pushed onto `deletions`; they are never linked into `wip`.
pub(crate) fn reconcile_children<N: Clone>(
    wip: &mut FiberTree<N>,
    mut current: Option<&mut FiberTree<N>>,
    parent: FiberKey,
    elements: &[Element],
    deletions: &mut Vec<FiberKey>,
) {
    let mut old = match (wip[parent].alternate, current.as_deref()) {
        (Some(alternate), Some(current)) => current.get(alternate).and_then(|f| f.child),
        _ => None,
    };
    let mut previous: Option<FiberKey> = None;
    let mut index = 0;

    wip[parent].child = None;

    while index < elements.len() || old.is_some() {
        let element = elements.get(index);
        let old_fiber = match (old, current.as_deref()) {
            (Some(key), Some(current)) => current.get(key).map(|f| (key, f)),
            _ => None,
        };
        let next_old = old_fiber.and_then(|(_, f)| f.sibling);

        let (fresh, stale) = match (element, old_fiber) {
            (Some(element), Some((old_key, old_fiber)))
                if old_fiber.kind.matches(element.kind()) =>
            {
                let mut fiber = Fiber::from_element(element, parent);
                fiber.node = old_fiber.node.clone();
                fiber.alternate = Some(old_key);
                fiber.effect = Effect::Update;
                (Some(fiber), None)
            }
            (Some(element), old_fiber) => {
                let mut fiber = Fiber::from_element(element, parent);
                fiber.effect = Effect::Placement;
                (Some(fiber), old_fiber.map(|(key, _)| key))
            }
            (None, old_fiber) => (None, old_fiber.map(|(key, _)| key)),
        };

        if let Some(stale) = stale {
            if let Some(fiber) = current.as_deref_mut().and_then(|c| c.get_mut(stale)) {
                fiber.effect = Effect::Deletion;
            }
            deletions.push(stale);
        }

        if let Some(fiber) = fresh {
            let key = wip.insert(fiber);
            match previous {
                Some(prev) => wip[prev].sibling = Some(key),
                None => wip[parent].child = Some(key),
            }
            previous = Some(key);
        }

        old = next_old;
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::element::{Attributes, create_element};

    fn tree_of(elements: &[Element], alternate: Option<FiberKey>) -> FiberTree<u32> {
        FiberTree::new(Fiber::root(0, Rc::from(elements), alternate))
    }

    fn li(tag: &str) -> Element {
        Element::new(tag, Attributes::new())
    }

    /// Reconciles `elements` under a fresh root and stamps host nodes 1.. on
    /// the resulting fibers so a later pass can check handle reuse.
    fn committed(elements: &[Element]) -> FiberTree<u32> {
        let mut tree = tree_of(elements, None);
        let root = tree.root();
        let mut deletions = vec![];
        reconcile_children(&mut tree, None, root, elements, &mut deletions);
        let kids: Vec<_> = tree.children(root).collect();
        for (i, k) in kids.into_iter().enumerate() {
            tree[k].node = Some(i as u32 + 1);
            tree[k].effect = Effect::None;
        }
        tree
    }

    #[test]
    fn test_first_pass_places_everything() {
        let elements = [li("a"), li("b")];
        let mut tree = tree_of(&elements, None);
        let root = tree.root();
        let mut deletions = vec![];
        reconcile_children(&mut tree, None, root, &elements, &mut deletions);

        let effects: Vec<_> = tree.children(root).map(|k| tree[k].effect).collect();
        assert_eq!(effects, [Effect::Placement, Effect::Placement]);
        assert!(deletions.is_empty());
    }

    #[test]
    fn test_positional_diff_of_removed_middle_child() {
        let mut old = committed(&[li("a"), li("b"), li("c")]);
        let old_kids: Vec<_> = old.children(old.root()).collect();

        let elements = [li("a"), li("c")];
        let mut wip = tree_of(&elements, Some(old.root()));
        let root = wip.root();
        let mut deletions = vec![];
        reconcile_children(&mut wip, Some(&mut old), root, &elements, &mut deletions);

        let kids: Vec<_> = wip.children(root).collect();
        assert_eq!(kids.len(), 2);
        assert_eq!(wip[kids[0]].effect, Effect::Update);
        assert_eq!(wip[kids[0]].node, Some(1));
        assert_eq!(wip[kids[0]].alternate, Some(old_kids[0]));
        assert_eq!(wip[kids[1]].effect, Effect::Placement);
        assert_eq!(wip[kids[1]].node, None);
        assert_eq!(wip[kids[1]].alternate, None);

        assert_eq!(deletions, vec![old_kids[1], old_kids[2]]);
        assert_eq!(old[old_kids[1]].effect, Effect::Deletion);
        assert_eq!(old[old_kids[2]].effect, Effect::Deletion);
        assert_eq!(old[old_kids[0]].effect, Effect::None);
    }

    #[test]
    fn test_type_change_is_delete_plus_place() {
        let mut old = committed(&[li("a")]);
        let elements = [li("b")];
        let mut wip = tree_of(&elements, Some(old.root()));
        let root = wip.root();
        let mut deletions = vec![];
        reconcile_children(&mut wip, Some(&mut old), root, &elements, &mut deletions);

        let kids: Vec<_> = wip.children(root).collect();
        assert_eq!(kids.len(), 1);
        assert_eq!(wip[kids[0]].effect, Effect::Placement);
        assert_eq!(deletions.len(), 1);
    }

    #[test]
    fn test_shrinking_by_many_links_cleanly() {
        let mut old = committed(&[li("a"), li("b"), li("c"), li("d")]);
        let elements = [li("a")];
        let mut wip = tree_of(&elements, Some(old.root()));
        let root = wip.root();
        let mut deletions = vec![];
        reconcile_children(&mut wip, Some(&mut old), root, &elements, &mut deletions);

        assert_eq!(wip.children(root).count(), 1);
        assert_eq!(deletions.len(), 3);
    }

    #[test]
    fn test_children_carry_new_attributes() {
        let mut old = committed(&[li("a")]);
        let elements = [create_element("a", Attributes::new().with("href", "/x"), ["go"])];
        let mut wip = tree_of(&elements, Some(old.root()));
        let root = wip.root();
        let mut deletions = vec![];
        reconcile_children(&mut wip, Some(&mut old), root, &elements, &mut deletions);

        let kid = wip[root].child.expect("child");
        assert_eq!(wip[kid].attributes.get_str("href"), Some("/x"));
        assert_eq!(wip[kid].children.len(), 1);
        assert_eq!(wip[kid].parent, Some(root));
    }
}
