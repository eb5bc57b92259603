use crate::detector::{ChangeDetector, CycleReport};
use crate::error::CycleError;
use crate::notifier::Notifier;
use crate::seen_store::SeenStore;
use crate::source::ListingSource;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// One unit of scheduled work.
pub trait CheckCycle {
    fn run_cycle(&mut self) -> CycleReport;
}

impl<S, N, St> CheckCycle for ChangeDetector<S, N, St>
where
    S: ListingSource,
    N: Notifier,
    St: SeenStore,
{
    fn run_cycle(&mut self) -> CycleReport {
        ChangeDetector::run_cycle(self)
    }
}

/// Shared stop flag. Cloning hands out another handle to the same flag.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        let mut stopped = lock.lock().unwrap_or_else(|p| p.into_inner());
        *stopped = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Sleep for up to `timeout`. Returns true if shutdown was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let deadline = Instant::now().checked_add(timeout);
        let mut stopped = lock.lock().unwrap_or_else(|p| p.into_inner());

        while !*stopped {
            stopped = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    match cvar.wait_timeout(stopped, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(p) => p.into_inner().0,
                    }
                }
                // Too far out to represent: wait for the trigger alone.
                None => cvar.wait(stopped).unwrap_or_else(|p| p.into_inner()),
            };
        }
        *stopped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: usize,
    pub aborted: usize,
}

/// Runs a cycle, sleeps, repeats until shut down.
///
/// Cycles never overlap. A cycle that panics is logged and followed by the
/// longer cooldown instead of the normal interval.
pub struct Scheduler {
    interval: Duration,
    cooldown: Duration,
    shutdown: Shutdown,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(interval: Duration, cooldown: Duration, shutdown: Shutdown) -> Self {
        Self {
            interval,
            cooldown,
            shutdown,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn run<C: CheckCycle>(&mut self, cycle: &mut C) -> SchedulerStats {
        info!(
            "Starting continuous monitoring (checking every {} minutes)",
            self.interval.as_secs() / 60
        );
        let mut stats = SchedulerStats::default();

        while !self.shutdown.is_triggered() {
            let delay = match self.run_once(cycle) {
                Ok(report) => {
                    log_report(&report);
                    self.interval
                }
                Err(err) => {
                    error!("Error in monitoring loop: {}", err);
                    stats.aborted += 1;
                    self.cooldown
                }
            };
            stats.cycles += 1;

            info!("Sleeping for {} seconds...", delay.as_secs());
            if self.shutdown.wait(delay) {
                break;
            }
        }

        info!("Monitoring stopped");
        stats
    }

    /// Run exactly one cycle, converting a panic into `CycleError::Unknown`.
    pub fn run_once<C: CheckCycle>(&mut self, cycle: &mut C) -> Result<CycleReport, CycleError> {
        self.state = SchedulerState::Running;
        let result = panic::catch_unwind(AssertUnwindSafe(|| cycle.run_cycle()));
        self.state = SchedulerState::Idle;

        result.map_err(|payload| CycleError::Unknown(panic_message(payload.as_ref())))
    }
}

fn log_report(report: &CycleReport) {
    if report.skipped {
        warn!("Cycle skipped; seen set unchanged at {}", report.seen_after);
        return;
    }
    info!(
        fetched = report.fetched,
        new = report.new_listings.len(),
        seen = report.seen_after,
        errors = report.errors.len(),
        "Cycle finished"
    );
    for err in &report.errors {
        warn!(kind = err.kind(), "{}", err);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct Scripted {
        runs: usize,
        panic_on: Vec<usize>,
        stop_after: usize,
        shutdown: Shutdown,
        started: Vec<Instant>,
    }

    impl CheckCycle for Scripted {
        fn run_cycle(&mut self) -> CycleReport {
            self.runs += 1;
            self.started.push(Instant::now());
            if self.runs >= self.stop_after {
                self.shutdown.trigger();
            }
            if self.panic_on.contains(&self.runs) {
                panic!("source exploded");
            }
            CycleReport::default()
        }
    }

    #[test]
    fn wait_returns_early_on_trigger() {
        let shutdown = Shutdown::new();
        let remote = shutdown.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.trigger();
        });

        let started = Instant::now();
        assert!(shutdown.wait(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(10));
        handle.join().unwrap();
    }

    #[test]
    fn unrepresentable_timeout_waits_for_trigger() {
        let shutdown = Shutdown::new();
        let remote = shutdown.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.trigger();
        });

        assert!(shutdown.wait(Duration::MAX));
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out_without_trigger() {
        assert!(!Shutdown::new().wait(Duration::from_millis(5)));
    }

    #[test]
    fn in_flight_cycle_finishes_before_exit() {
        let shutdown = Shutdown::new();
        let mut cycle = Scripted {
            runs: 0,
            panic_on: vec![],
            stop_after: 3,
            shutdown: shutdown.clone(),
            started: vec![],
        };

        let mut scheduler =
            Scheduler::new(Duration::from_millis(1), Duration::from_millis(1), shutdown);
        let stats = scheduler.run(&mut cycle);

        assert_eq!(cycle.runs, 3);
        assert_eq!(stats, SchedulerStats { cycles: 3, aborted: 0 });
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn panicking_cycle_uses_cooldown() {
        let shutdown = Shutdown::new();
        let mut cycle = Scripted {
            runs: 0,
            panic_on: vec![1],
            stop_after: 3,
            shutdown: shutdown.clone(),
            started: vec![],
        };

        let mut scheduler =
            Scheduler::new(Duration::from_millis(1), Duration::from_millis(200), shutdown);
        let stats = scheduler.run(&mut cycle);

        assert_eq!(stats, SchedulerStats { cycles: 3, aborted: 1 });
        let after_panic = cycle.started[1] - cycle.started[0];
        assert!(after_panic >= Duration::from_millis(200));
    }

    #[test]
    fn run_once_reports_panic_as_unknown() {
        let mut cycle = Scripted {
            runs: 0,
            panic_on: vec![1],
            stop_after: usize::MAX,
            shutdown: Shutdown::new(),
            started: vec![],
        };
        let mut scheduler = Scheduler::new(Duration::ZERO, Duration::ZERO, Shutdown::new());

        match scheduler.run_once(&mut cycle) {
            Err(CycleError::Unknown(msg)) => assert_eq!(msg, "source exploded"),
            other => panic!("unexpected result: {:?}", other.map(|r| r.fetched)),
        }
    }

    #[test]
    fn already_stopped_scheduler_runs_nothing() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut cycle = Scripted {
            runs: 0,
            panic_on: vec![],
            stop_after: usize::MAX,
            shutdown: shutdown.clone(),
            started: vec![],
        };

        let stats = Scheduler::new(Duration::ZERO, Duration::ZERO, shutdown).run(&mut cycle);
        assert_eq!(stats.cycles, 0);
        assert_eq!(cycle.runs, 0);
    }
}
