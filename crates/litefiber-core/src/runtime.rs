use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::deadline::{Deadline, Unbounded};
use crate::element::Element;
use crate::error::FiberError;
use crate::fiber::{Effect, FiberSnapshot};
use crate::host::HostOps;
use crate::scheduler::{CommitStats, EngineContext, Phase, SliceOutcome};
use crate::state::Reschedule;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Yield once the deadline reports less time than this.
    pub yield_threshold: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            yield_threshold: Duration::from_millis(1),
        }
    }
}

/// Cheap-to-clone handle to one rendering engine: a single committed tree,
/// at most one work-in-progress tree, and the host they render into.
///
/// The engine is single-threaded. Entry points borrow it for their duration;
/// calling one from inside another (e.g. `render` from a component) returns
/// [`FiberError::Reentrant`]. State updaters are the exception: an update
/// requested while a slice is running is deferred and installed as soon as
/// that slice returns.
pub struct Engine<H: HostOps + 'static> {
    inner: Rc<RefCell<EngineContext<H>>>,
    deferred: Rc<Cell<bool>>,
}

impl<H: HostOps + 'static> Engine<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, EngineConfig::default())
    }

    pub fn with_config(host: H, config: EngineConfig) -> Self {
        let deferred = Rc::new(Cell::new(false));
        let inner = Rc::new_cyclic(|weak: &Weak<RefCell<EngineContext<H>>>| {
            let hook: Rc<dyn Reschedule> = Rc::new(RerenderHook {
                ctx: weak.clone(),
                deferred: deferred.clone(),
            });
            RefCell::new(EngineContext::new(host, config, hook))
        });
        Self { inner, deferred }
    }

    /// Installs `element` as the new root inside `container`, superseding any
    /// unfinished build. Work happens in subsequent [`work_slice`](Self::work_slice) calls.
    pub fn render(&self, element: Element, container: H::Node) -> Result<(), FiberError> {
        let mut ctx = self.inner.try_borrow_mut().map_err(|_| FiberError::Reentrant)?;
        // a fresh root re-renders everything, pending state included
        self.deferred.set(false);
        ctx.schedule_render(element, container);
        Ok(())
    }

    /// Runs one time slice. A build that finishes inside the slice is
    /// committed before returning.
    ///
    /// On error the build is discarded and the committed tree is untouched.
    pub fn work_slice(&self, deadline: &dyn Deadline) -> Result<SliceOutcome, FiberError> {
        let outcome = {
            let mut ctx = self.inner.try_borrow_mut().map_err(|_| FiberError::Reentrant)?;
            ctx.work_loop(deadline)
        };
        self.flush_deferred();
        outcome
    }

    /// Runs unbounded slices until nothing is scheduled. Returns the stats of
    /// the last commit, if any happened.
    pub fn run_until_idle(&self) -> Result<Option<CommitStats>, FiberError> {
        let mut last = None;
        loop {
            match self.work_slice(&Unbounded)? {
                SliceOutcome::Idle => return Ok(last),
                SliceOutcome::Yielded { .. } => {}
                SliceOutcome::Committed(stats) => last = Some(stats),
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.borrow().phase
    }

    pub fn is_idle(&self) -> bool {
        let ctx = self.inner.borrow();
        ctx.phase == Phase::Idle && ctx.next_unit.is_none() && !self.deferred.get()
    }

    pub fn config(&self) -> EngineConfig {
        self.inner.borrow().config
    }

    /// Gives `f` the host. Event handlers may be dispatched from here; any
    /// state update they request is installed once `f` returns.
    ///
    /// Panics if called while the engine is running a slice.
    pub fn with_host<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        let out = f(&mut self.inner.borrow_mut().host);
        self.flush_deferred();
        out
    }

    pub fn current_snapshot(&self) -> Option<FiberSnapshot<H::Node>> {
        let ctx = self.inner.borrow();
        let tree = ctx.current.as_ref()?;
        tree.snapshot(tree.root())
    }

    pub fn work_in_progress_snapshot(&self) -> Option<FiberSnapshot<H::Node>> {
        let ctx = self.inner.borrow();
        let tree = ctx.wip.as_ref()?;
        tree.snapshot(tree.root())
    }

    /// Committed fibers the running build will delete.
    pub fn pending_deletions(&self) -> Vec<FiberSnapshot<H::Node>> {
        let ctx = self.inner.borrow();
        let Some(tree) = ctx.current.as_ref() else {
            return Vec::new();
        };
        ctx.deletions
            .iter()
            .filter(|key| tree.get(**key).is_some_and(|f| f.effect == Effect::Deletion))
            .filter_map(|key| tree.snapshot(*key))
            .collect()
    }

    fn flush_deferred(&self) {
        if !self.deferred.get() {
            return;
        }
        if let Ok(mut ctx) = self.inner.try_borrow_mut() {
            self.deferred.set(false);
            ctx.schedule_update();
        }
    }
}

impl<H: HostOps + 'static> Clone for Engine<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            deferred: self.deferred.clone(),
        }
    }
}

struct RerenderHook<H: HostOps> {
    ctx: Weak<RefCell<EngineContext<H>>>,
    deferred: Rc<Cell<bool>>,
}

impl<H: HostOps> Reschedule for RerenderHook<H> {
    fn request_rerender(&self) {
        let Some(ctx) = self.ctx.upgrade() else {
            log::debug!("state update after the engine was dropped");
            return;
        };
        if let Ok(mut guard) = ctx.try_borrow_mut() {
            guard.schedule_update();
        } else {
            log::debug!("engine busy; deferring re-render");
            self.deferred.set(true);
        }
    }
}
