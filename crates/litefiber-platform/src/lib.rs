//! Host loops that drive an [`Engine`] in time slices.
//!
//! The engine never runs by itself: something has to keep granting it slices.
//! [`run_idle_loop`] plays the role of a host's idle callback, while
//! [`drive_until_idle`] flushes all pending work at once (tests, one-shot
//! renders, server-side markup).
//!
//! `run_idle_loop` blocks the calling thread. On wasm32 it never sleeps while
//! idle, so browser hosts should call `Engine::work_slice` from their own idle
//! callback instead.

use std::time::Duration;

use litefiber_core::{CommitStats, Engine, FiberError, HostOps, InstantDeadline, SliceOutcome};
use web_time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopConfig {
    /// Time granted to the engine per slice.
    pub slice: Duration,
    /// Pause between checks while nothing is scheduled.
    pub idle_sleep: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            slice: Duration::from_millis(8),
            idle_sleep: Duration::from_millis(4),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub slices: usize,
    pub commits: usize,
    /// Builds dropped because of a host error or a panicking component.
    pub aborted: usize,
    pub last_commit: Option<CommitStats>,
}

/// Grants the engine one slice at a time for as long as `keep_running` says
/// so. `keep_running` is checked before every iteration and is the natural
/// place to feed input into the host.
///
/// Errors never stop the loop: the engine has already dropped the failed build
/// and kept its last commit, so the error is logged and counted.
pub fn run_idle_loop<H, F>(
    engine: &Engine<H>,
    config: &LoopConfig,
    mut keep_running: F,
) -> LoopStats
where
    H: HostOps + 'static,
    F: FnMut(&Engine<H>, &LoopStats) -> bool,
{
    let mut stats = LoopStats::default();
    while keep_running(engine, &stats) {
        if engine.is_idle() {
            idle_pause(config.idle_sleep);
            continue;
        }

        let t0 = Instant::now();
        let outcome = engine.work_slice(&InstantDeadline::after(config.slice));
        stats.slices += 1;
        match outcome {
            Ok(SliceOutcome::Committed(commit)) => {
                stats.commits += 1;
                stats.last_commit = Some(commit);
                log::debug!(
                    "commit #{} in {:.2} ms",
                    stats.commits,
                    t0.elapsed().as_secs_f32() * 1000.0
                );
            }
            Ok(SliceOutcome::Yielded { units }) => {
                log::trace!("yielded after {units} units");
            }
            Ok(SliceOutcome::Idle) => {}
            Err(err) => {
                stats.aborted += 1;
                log::error!("render failed: {err}");
            }
        }
    }
    log::info!(
        "idle loop stopped: {} slices, {} commits, {} aborted",
        stats.slices,
        stats.commits,
        stats.aborted
    );
    stats
}

#[cfg(not(target_arch = "wasm32"))]
fn idle_pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

// std::thread::sleep panics on wasm32
#[cfg(target_arch = "wasm32")]
fn idle_pause(_: Duration) {}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveReport {
    pub slices: usize,
    pub commits: usize,
    pub last_commit: Option<CommitStats>,
    pub elapsed: Duration,
}

/// Runs `slice`-sized slices until nothing is scheduled. Stops at the first
/// failed build.
pub fn drive_until_idle<H: HostOps + 'static>(
    engine: &Engine<H>,
    slice: Duration,
) -> Result<DriveReport, FiberError> {
    let t0 = Instant::now();
    let mut report = DriveReport::default();
    loop {
        match engine.work_slice(&InstantDeadline::after(slice))? {
            SliceOutcome::Idle => break,
            SliceOutcome::Yielded { .. } => report.slices += 1,
            SliceOutcome::Committed(commit) => {
                report.slices += 1;
                report.commits += 1;
                report.last_commit = Some(commit);
            }
        }
    }
    report.elapsed = t0.elapsed();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use litefiber_core::*;

    fn counter(cx: &mut RenderContext<'_>, _: &Attributes) -> Element {
        let (count, set_count) = cx.use_state(1);
        create_element(
            "h1",
            Attributes::new().on("click", move || set_count.update(|c| c + 1)),
            [format!("count: {count}")],
        )
    }

    fn setup() -> (Engine<HeadlessHost>, NodeId) {
        let mut host = HeadlessHost::new();
        let root = host.create_container();
        (Engine::new(host), root)
    }

    const FAST: LoopConfig = LoopConfig {
        slice: Duration::from_millis(8),
        idle_sleep: Duration::ZERO,
    };

    #[test]
    fn test_drive_until_idle_commits() {
        let (engine, root) = setup();
        let list = create_element(
            "ul",
            Attributes::new(),
            [Element::new("li", Attributes::new())],
        );
        engine.render(list, root).unwrap();
        let report = drive_until_idle(&engine, Duration::from_millis(8)).unwrap();
        assert_eq!(report.commits, 1);
        assert_eq!(report.last_commit.map(|c| c.placements), Some(2));
        assert_eq!(engine.with_host(|h| h.to_markup(root)), "<ul><li></li></ul>");

        let report = drive_until_idle(&engine, Duration::from_millis(8)).unwrap();
        assert_eq!(
            report,
            DriveReport {
                elapsed: report.elapsed,
                ..DriveReport::default()
            }
        );
    }

    #[test]
    fn test_drive_until_idle_reports_failed_build() {
        let (engine, root) = setup();
        engine
            .render(Element::new("bad tag", Attributes::new()), root)
            .unwrap();
        let err = drive_until_idle(&engine, Duration::from_millis(8)).unwrap_err();
        assert!(matches!(err, FiberError::Host(_)));
        assert!(engine.is_idle());
    }

    #[test]
    fn test_idle_loop_feeds_input_between_slices() {
        let (engine, root) = setup();
        engine
            .render(Element::component(counter, Attributes::new()), root)
            .unwrap();

        let mut clicks = 0;
        let stats = run_idle_loop(&engine, &FAST, |engine, stats| {
            if stats.commits > clicks && clicks < 2 {
                clicks += 1;
                engine.with_host(|h| {
                    let h1 = h.find(root, "h1").expect("h1");
                    h.dispatch(h1, "click");
                });
            }
            stats.commits < 3
        });

        assert_eq!(stats.commits, 3);
        assert_eq!(stats.aborted, 0);
        assert_eq!(stats.last_commit.map(|c| c.updates), Some(3));
        assert_eq!(engine.with_host(|h| h.to_markup(root)), "<h1>count: 3</h1>");
    }

    #[test]
    fn test_idle_loop_survives_failed_build() {
        let (engine, root) = setup();
        engine
            .render(Element::new("p", Attributes::new()), root)
            .unwrap();
        engine.run_until_idle().unwrap();

        engine
            .render(Element::new("not ok", Attributes::new()), root)
            .unwrap();
        let stats = run_idle_loop(&engine, &FAST, |_, stats| stats.slices < 1);
        assert_eq!(stats.aborted, 1);
        assert_eq!(stats.commits, 0);
        assert_eq!(engine.with_host(|h| h.to_markup(root)), "<p></p>");

        engine
            .render(Element::new("em", Attributes::new()), root)
            .unwrap();
        let stats = run_idle_loop(&engine, &FAST, |_, stats| stats.commits < 1);
        assert_eq!(stats.commits, 1);
        assert_eq!(engine.with_host(|h| h.to_markup(root)), "<em></em>");
    }
}
