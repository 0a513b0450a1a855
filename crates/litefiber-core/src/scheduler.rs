//! # Work scheduler
//!
//! A resumable, depth-first walk over the work-in-progress fiber tree. The
//! only resumption state is `next_unit`: each slice processes fibers until the
//! walk is done or the deadline says to yield. A finished walk is committed
//! synchronously in the same slice, so yields only ever happen while building.
//!
//! Installing a new root (a `render` call or a state update) replaces
//! `next_unit` and the pending deletion list, which silently abandons any
//! unfinished build. Abandoned builds never touched attached host nodes.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::deadline::Deadline;
use crate::element::{Attributes, ComponentRef, Element};
use crate::error::{FiberError, HostError, panic_message};
use crate::fiber::{Effect, Fiber, FiberKey, FiberKind, FiberTree};
use crate::host::HostOps;
use crate::reconcile::reconcile_children;
use crate::runtime::EngineConfig;
use crate::state::{RenderContext, Reschedule};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Building,
    CommitPending,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Fibers processed by the build that produced this commit, across all slices.
    pub units: usize,
    pub placements: usize,
    pub updates: usize,
    pub deletions: usize,
    /// Component renders whose number of state calls differed from their
    /// previous render.
    pub state_mismatches: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceOutcome {
    /// Nothing was scheduled.
    Idle,
    /// The deadline ran out; the build resumes on the next slice.
    Yielded { units: usize },
    Committed(CommitStats),
}

pub(crate) struct EngineContext<H: HostOps> {
    pub(crate) host: H,
    pub(crate) config: EngineConfig,
    pub(crate) phase: Phase,
    pub(crate) current: Option<FiberTree<H::Node>>,
    pub(crate) wip: Option<FiberTree<H::Node>>,
    pub(crate) next_unit: Option<FiberKey>,
    pub(crate) deletions: Vec<FiberKey>,
    pub(crate) units: usize,
    pub(crate) state_mismatches: usize,
    /// A state update arrived while the first build was still running.
    pub(crate) update_after_commit: bool,
    pub(crate) scheduler: Rc<dyn Reschedule>,
}

impl<H: HostOps> EngineContext<H> {
    pub(crate) fn new(host: H, config: EngineConfig, scheduler: Rc<dyn Reschedule>) -> Self {
        Self {
            host,
            config,
            phase: Phase::Idle,
            current: None,
            wip: None,
            next_unit: None,
            deletions: Vec::new(),
            units: 0,
            state_mismatches: 0,
            update_after_commit: false,
            scheduler,
        }
    }

    pub(crate) fn schedule_render(&mut self, element: Element, container: H::Node) {
        self.install_root(container, Rc::from([element]));
    }

    /// Re-renders the committed tree from its root. Before the first commit
    /// the re-render is postponed until the running build commits; with no
    /// build at all there is nothing to re-render and the update is dropped.
    pub(crate) fn schedule_update(&mut self) -> bool {
        let Some(current) = &self.current else {
            if self.wip.is_some() {
                log::debug!("state update during the first build; re-rendering after commit");
                self.update_after_commit = true;
                return true;
            }
            log::warn!("state update with nothing rendered; ignoring");
            return false;
        };
        let root = &current[current.root()];
        let Some(container) = root.node.clone() else {
            return false;
        };
        let children = root.children.clone();
        self.install_root(container, children);
        true
    }

    fn install_root(&mut self, container: H::Node, children: Rc<[Element]>) {
        if self.wip.is_some() {
            log::debug!("superseding unfinished build after {} units", self.units);
        }
        self.clear_deletion_marks();
        self.update_after_commit = false;
        self.state_mismatches = 0;

        let alternate = self.current.as_ref().map(FiberTree::root);
        let tree = FiberTree::new(Fiber::root(container, children, alternate));
        self.next_unit = Some(tree.root());
        self.wip = Some(tree);
        self.units = 0;
        self.phase = Phase::Building;
        log::debug!("root installed (first render: {})", alternate.is_none());
    }

    /// Deletion marks live on the committed tree; undo them when the build
    /// that set them is dropped.
    fn clear_deletion_marks(&mut self) {
        let deletions = std::mem::take(&mut self.deletions);
        if let Some(current) = self.current.as_mut() {
            for key in deletions {
                if let Some(fiber) = current.get_mut(key)
                    && fiber.effect == Effect::Deletion
                {
                    fiber.effect = Effect::None;
                }
            }
        }
    }

    pub(crate) fn work_loop(
        &mut self,
        deadline: &dyn Deadline,
    ) -> Result<SliceOutcome, FiberError> {
        let Some(mut unit) = self.next_unit else {
            return Ok(SliceOutcome::Idle);
        };

        let mut processed = 0;
        loop {
            let next = match self.perform_unit_of_work(unit) {
                Ok(next) => next,
                Err(err) => {
                    self.abort(&err);
                    return Err(err);
                }
            };
            processed += 1;
            self.units += 1;
            self.next_unit = next;

            match next {
                Some(_) if deadline.time_remaining() < self.config.yield_threshold => {
                    log::trace!("yielding after {processed} units");
                    return Ok(SliceOutcome::Yielded { units: processed });
                }
                Some(next) => unit = next,
                None => break,
            }
        }

        Ok(SliceOutcome::Committed(self.commit_root()))
    }

    fn perform_unit_of_work(&mut self, key: FiberKey) -> Result<Option<FiberKey>, FiberError> {
        let EngineContext {
            host,
            current,
            wip,
            deletions,
            state_mismatches,
            scheduler,
            ..
        } = self;
        let Some(wip) = wip.as_mut() else {
            return Ok(None);
        };
        log::trace!("unit: {}", wip[key].kind.label());

        let children = match &wip[key].kind {
            FiberKind::Component(component) => {
                let component = component.clone();
                let (children, mismatch) =
                    render_component(wip, current.as_ref(), key, &component, scheduler)?;
                if mismatch {
                    *state_mismatches += 1;
                }
                children
            }
            _ => {
                if wip[key].node.is_none() {
                    let node = create_host_node(host, &wip[key])?;
                    wip[key].node = Some(node);
                }
                wip[key].children.clone()
            }
        };

        reconcile_children(wip, current.as_mut(), key, &children, deletions);
        Ok(wip.next_unit(key))
    }

    fn abort(&mut self, err: &FiberError) {
        log::error!("build aborted after {} units: {err}", self.units);
        self.clear_deletion_marks();
        self.wip = None;
        self.next_unit = None;
        self.units = 0;
        self.state_mismatches = 0;
        self.update_after_commit = false;
        self.phase = Phase::Idle;
    }
}

/// Renders a component fiber. The flag is set when its state-call count
/// differs from the previous render.
fn render_component<N>(
    wip: &mut FiberTree<N>,
    current: Option<&FiberTree<N>>,
    key: FiberKey,
    component: &ComponentRef,
    scheduler: &Rc<dyn Reschedule>,
) -> Result<(Rc<[Element]>, bool), FiberError> {
    let fiber = &wip[key];
    let previous = fiber
        .alternate
        .zip(current)
        .and_then(|(alternate, current)| current.get(alternate));
    let previous_slots = previous.map(|f| f.state.as_slice()).unwrap_or_default();
    let attributes: Rc<Attributes> = fiber.attributes.clone();

    let mut cx = RenderContext::new(component.name(), previous_slots, scheduler.clone());
    let rendered = catch_unwind(AssertUnwindSafe(|| component.render(&mut cx, &attributes)))
        .map_err(|payload| FiberError::ComponentPanicked {
            component: component.name().to_string(),
            message: panic_message(payload.as_ref()),
        })?;

    let mismatch = previous.is_some() && cx.state_calls() != previous_slots.len();
    if mismatch {
        log::warn!(
            "`{}` made {} state calls, its previous render made {}",
            component.name(),
            cx.state_calls(),
            previous_slots.len()
        );
    }

    wip[key].state = cx.into_slots();
    Ok((Rc::from([rendered]), mismatch))
}

fn create_host_node<H: HostOps>(
    host: &mut H,
    fiber: &Fiber<H::Node>,
) -> Result<H::Node, FiberError> {
    let node = match &fiber.kind {
        FiberKind::Text => host.create_text_node()?,
        FiberKind::Host(tag) => host.create_node(tag)?,
        FiberKind::Root | FiberKind::Component(_) => {
            return Err(HostError::new(fiber.kind.label(), "fiber kind owns no host node").into());
        }
    };
    crate::commit::apply_attributes(host, &node, &Attributes::new(), &fiber.attributes);
    Ok(node)
}
