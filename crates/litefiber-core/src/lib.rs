//! # Elements, Fibers, and Commits
//!
//! Litefiber keeps a host surface in sync with a declarative element tree,
//! re-rendering only what changed and never blocking the host for long.
//! There are four main pieces:
//!
//! - `Element`: immutable description of what should exist.
//! - `Fiber`: mutable record of one rendered node, one per generation.
//! - `Engine`: builds a new generation in time slices, then commits it.
//! - `RenderContext::use_state`: order-based component state.
//!
//! ## Rendering
//!
//! ```rust
//! use litefiber_core::*;
//!
//! fn counter(cx: &mut RenderContext<'_>, _props: &Attributes) -> Element {
//!     let (count, set_count) = cx.use_state(1);
//!     create_element(
//!         "h1",
//!         Attributes::new().on("click", move || set_count.update(|c| c + 1)),
//!         [format!("count: {count}")],
//!     )
//! }
//!
//! let mut host = HeadlessHost::new();
//! let root = host.create_container();
//! let engine = Engine::new(host);
//! engine.render(Element::component(counter, Attributes::new()), root).unwrap();
//! engine.run_until_idle().unwrap();
//! assert_eq!(engine.with_host(|h| h.to_markup(root)), "<h1>count: 1</h1>");
//!
//! engine.with_host(|h| {
//!     let h1 = h.find(root, "h1").unwrap();
//!     h.dispatch(h1, "click");
//! });
//! engine.run_until_idle().unwrap();
//! assert_eq!(engine.with_host(|h| h.to_markup(root)), "<h1>count: 2</h1>");
//! ```
//!
//! ## Build and commit
//!
//! `render` (or a state update) installs a new work-in-progress root that
//! points back at the committed one. `work_slice` walks the new tree depth
//! first, reconciling each fiber's children against the previous generation
//! and tagging them `Placement`, `Update` or `Deletion`. The walk yields
//! whenever the granted `Deadline` runs low and resumes where it stopped.
//! Once nothing is left, every effect is applied to the host in one pass and
//! the new tree becomes the committed one.
//!
//! - Host nodes are reused whenever a position keeps its kind.
//! - Matching is positional; see [`reconcile`] for what that implies.
//! - Nothing attached to the host changes until commit, so an aborted build
//!   (a host error or a panicking component) leaves the last commit visible.

pub mod commit;
pub mod deadline;
pub mod element;
pub mod error;
pub mod fiber;
pub mod headless;
pub mod host;
pub mod reconcile;
pub mod runtime;
pub mod scheduler;
pub mod state;

pub use deadline::*;
pub use element::*;
pub use error::*;
pub use fiber::{Effect, Fiber, FiberKey, FiberKind, FiberSnapshot, FiberTree};
pub use headless::{HeadlessHost, HostOp, NodeId, NodeKind};
pub use host::*;
pub use runtime::*;
pub use scheduler::{CommitStats, Phase, SliceOutcome};
pub use state::{RenderContext, StateSlot, Updater};
