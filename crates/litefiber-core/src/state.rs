//! # Component state
//!
//! Function components get a [`RenderContext`] for the duration of their
//! render call. `use_state` is order-based: the Nth call in a render binds to
//! the Nth slot carried over from the fiber's previous generation. Components
//! must call it unconditionally and in the same order on every render; the
//! store has no identity beyond position.
//!
//! An [`Updater`] queues a function on the slot it came from and asks the
//! engine to re-render from the committed root. Queued functions are folded
//! over the slot value, in enqueue order, the next time the component renders.
//!
//! An updater is bound to the slot of the render that produced it. Updaters
//! from a build that never commits (superseded or aborted) write to slots no
//! later render reads, so their updates are lost. Only updaters reachable from
//! committed output, such as attached event handlers, drive re-renders. The
//! one exception is the first build: an update made before anything has
//! committed re-renders right after that build commits.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use smallvec::SmallVec;

type Action = Rc<dyn Fn(&dyn Any) -> Option<Rc<dyn Any>>>;

/// Hook back into the engine that owns the rendering fiber.
pub(crate) trait Reschedule {
    fn request_rerender(&self);
}

#[derive(Clone)]
pub struct StateSlot {
    value: Rc<dyn Any>,
    queue: Rc<RefCell<Vec<Action>>>,
}

impl StateSlot {
    pub fn new<T: 'static>(value: T) -> Self {
        Self {
            value: Rc::new(value),
            queue: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn enqueue<T: 'static>(&self, f: impl Fn(&T) -> T + 'static) {
        let action: Action = Rc::new(move |prev: &dyn Any| {
            prev.downcast_ref::<T>()
                .map(|v| Rc::new(f(v)) as Rc<dyn Any>)
        });
        self.queue.borrow_mut().push(action);
    }

    /// Stored value with every queued update applied. The queue is read, not
    /// drained: a superseded build must see the same updates when it restarts.
    /// `None` if the slot holds a different type.
    pub fn resolve<T: Clone + 'static>(&self) -> Option<T> {
        let mut value = self.value.clone();
        for action in self.queue.borrow().iter() {
            match action(value.as_ref()) {
                Some(next) => value = next,
                None => return None,
            }
        }
        value.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for StateSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSlot")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Explicit render context handed to a function component.
pub struct RenderContext<'a> {
    component: &'static str,
    previous: &'a [StateSlot],
    slots: SmallVec<[StateSlot; 2]>,
    scheduler: Rc<dyn Reschedule>,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(
        component: &'static str,
        previous: &'a [StateSlot],
        scheduler: Rc<dyn Reschedule>,
    ) -> Self {
        Self {
            component,
            previous,
            slots: SmallVec::new(),
            scheduler,
        }
    }

    pub fn use_state<T: Clone + 'static>(&mut self, initial: T) -> (T, Updater<T>) {
        self.use_state_with(|| initial)
    }

    /// Like [`use_state`](Self::use_state) but only builds the initial value
    /// when the slot is new.
    pub fn use_state_with<T: Clone + 'static>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> (T, Updater<T>) {
        let index = self.slots.len();
        let value = match self.previous.get(index) {
            Some(slot) => slot.resolve::<T>().unwrap_or_else(|| {
                log::warn!(
                    "use_state: slot {} of `{}` changed type; re-initialising. \
                     State calls must happen in the same order on every render.",
                    index,
                    self.component
                );
                init()
            }),
            None => init(),
        };

        let slot = StateSlot::new(value.clone());
        let updater = Updater {
            slot: slot.clone(),
            scheduler: self.scheduler.clone(),
            _marker: PhantomData,
        };
        self.slots.push(slot);
        (value, updater)
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Number of state calls made so far in this render.
    pub fn state_calls(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn into_slots(self) -> SmallVec<[StateSlot; 2]> {
        self.slots
    }
}

pub struct Updater<T> {
    slot: StateSlot,
    scheduler: Rc<dyn Reschedule>,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T: Clone + 'static> Updater<T> {
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.slot.enqueue(f);
        self.scheduler.request_rerender();
    }

    pub fn set(&self, value: T) {
        self.update(move |_| value.clone())
    }
}

impl<T> Clone for Updater<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            scheduler: self.scheduler.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Updater<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater").field("slot", &self.slot).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct CountingScheduler(Cell<usize>);

    impl Reschedule for CountingScheduler {
        fn request_rerender(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_fold_applies_updates_in_enqueue_order() {
        let slot = StateSlot::new(3i32);
        slot.enqueue(|v: &i32| v + 1);
        slot.enqueue(|v: &i32| v * 10);
        assert_eq!(slot.resolve::<i32>(), Some(40));
        // reading does not drain
        assert_eq!(slot.pending(), 2);
        assert_eq!(slot.resolve::<i32>(), Some(40));
    }

    #[test]
    fn test_resolve_wrong_type() {
        let slot = StateSlot::new("text".to_string());
        assert_eq!(slot.resolve::<i32>(), None);
    }

    #[test]
    fn test_slots_bind_by_position() {
        let sched = Rc::new(CountingScheduler::default());
        let previous = vec![StateSlot::new(1i32), StateSlot::new("b".to_string())];
        previous[0].enqueue(|v: &i32| v + 1);

        let mut cx = RenderContext::new("test", &previous, sched.clone());
        let (a, set_a) = cx.use_state(100i32);
        let (b, _) = cx.use_state(String::new());
        let (c, _) = cx.use_state(false);
        assert_eq!((a, b.as_str(), c), (2, "b", false));
        assert_eq!(cx.state_calls(), 3);

        let slots = cx.into_slots();
        assert!(slots.iter().all(|s| s.pending() == 0));

        set_a.set(9);
        assert_eq!(sched.0.get(), 1);
        assert_eq!(slots[0].pending(), 1);
        assert_eq!(slots[0].resolve::<i32>(), Some(9));
    }

    #[test]
    fn test_type_change_reinitialises() {
        let sched: Rc<dyn Reschedule> = Rc::new(CountingScheduler::default());
        let previous = vec![StateSlot::new(5u8)];
        let mut cx = RenderContext::new("test", &previous, sched);
        let (v, _) = cx.use_state_with(|| "fresh".to_string());
        assert_eq!(v, "fresh");
    }
}
