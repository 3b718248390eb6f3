//! Runs the pipeline once or on a fixed interval.
//!
//! Runs never overlap: a run still executing when the interval elapses defers
//! the next trigger, and manual triggers received meanwhile coalesce into one.
//! A failed or panicking run is logged and the scheduler waits for the next
//! trigger.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use shortforge_core::{RunReport, RunStatus};
use tokio::sync::{Mutex, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::runner::JobRunner;

/// Something the scheduler can run.
#[async_trait]
pub trait RunnableJob: Send + Sync + 'static {
    async fn run(&self, cancel: &CancellationToken) -> RunReport;
}

#[async_trait]
impl RunnableJob for JobRunner {
    async fn run(&self, cancel: &CancellationToken) -> RunReport {
        JobRunner::run(self, cancel).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// A single run.
    Once,
    /// Run immediately, then every period.
    Interval(Duration),
}

/// Tally of the runs executed by one [`Scheduler::run`] call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerSummary {
    pub runs: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub cancelled: u32,
    pub panicked: u32,
    pub last_report: Option<RunReport>,
}

/// Control handle for a running scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    trigger: Arc<Notify>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    /// Request a run as soon as no run is executing.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Stop scheduling; an in-flight run is cancelled between stages.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub struct Scheduler<J: RunnableJob> {
    job: Arc<J>,
    mode: ScheduleMode,
    max_runs: Option<u32>,
    trigger: Arc<Notify>,
    run_lock: Arc<Mutex<()>>,
    cancel: CancellationToken,
}

impl<J: RunnableJob> Scheduler<J> {
    pub fn new(job: Arc<J>, mode: ScheduleMode) -> Self {
        Self {
            job,
            mode,
            max_runs: None,
            trigger: Arc::new(Notify::new()),
            run_lock: Arc::new(Mutex::new(())),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop after `max_runs` interval runs.
    pub fn with_max_runs(mut self, max_runs: Option<u32>) -> Self {
        self.max_runs = max_runs;
        self
    }

    /// Builder: attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            trigger: Arc::clone(&self.trigger),
            cancel: self.cancel.clone(),
        }
    }

    /// Drive runs until the mode is satisfied, `max_runs` is reached, or the
    /// scheduler is shut down.
    pub async fn run(&self) -> SchedulerSummary {
        let mut summary = SchedulerSummary::default();

        match self.mode {
            ScheduleMode::Once => {
                if !self.cancel.is_cancelled() {
                    self.execute(&mut summary).await;
                }
            }
            ScheduleMode::Interval(period) => {
                tracing::info!(
                    interval_secs = period.as_secs(),
                    max_runs = ?self.max_runs,
                    "scheduler started"
                );

                let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        biased;

                        _ = self.cancel.cancelled() => {
                            tracing::info!("scheduler shutting down");
                            break;
                        }
                        _ = ticker.tick() => {}
                        _ = self.trigger.notified() => {
                            tracing::debug!("manual trigger");
                        }
                    }

                    self.execute(&mut summary).await;

                    if self.max_runs.is_some_and(|max| summary.runs >= max) {
                        tracing::info!(runs = summary.runs, "reached max runs");
                        break;
                    }
                }
            }
        }

        tracing::info!(
            runs = summary.runs,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            panicked = summary.panicked,
            "scheduler finished"
        );
        summary
    }

    /// Execute one run in its own task so a panic stays contained.
    async fn execute(&self, summary: &mut SchedulerSummary) {
        let _guard = self.run_lock.lock().await;
        let job = Arc::clone(&self.job);
        let cancel = self.cancel.child_token();

        let handle = tokio::spawn(async move { job.run(&cancel).await });
        summary.runs += 1;

        match handle.await {
            Ok(report) => {
                match report.status {
                    Some(RunStatus::Succeeded { .. }) => summary.succeeded += 1,
                    Some(RunStatus::Cancelled { .. }) => summary.cancelled += 1,
                    _ => summary.failed += 1,
                }
                summary.last_report = Some(report);
            }
            Err(e) if e.is_panic() => {
                summary.panicked += 1;
                tracing::error!(run = summary.runs, "run panicked; waiting for next trigger");
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!(run = summary.runs, error = %e, "run task aborted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortforge_core::{PublishReceipt, RunId};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn succeeded() -> RunReport {
        let mut report = RunReport::new(RunId::new());
        report.finish(RunStatus::Succeeded {
            receipt: PublishReceipt {
                id: "x".into(),
                url: None,
            },
        });
        report
    }

    struct TimedJob {
        duration: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
        starts: std::sync::Mutex<Vec<Instant>>,
    }

    impl TimedJob {
        fn new(duration: Duration) -> Arc<Self> {
            Arc::new(Self {
                duration,
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                starts: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RunnableJob for TimedJob {
        async fn run(&self, _cancel: &CancellationToken) -> RunReport {
            self.starts.lock().unwrap().push(Instant::now());
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.duration).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            succeeded()
        }
    }

    struct PanicsFirst {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RunnableJob for PanicsFirst {
        async fn run(&self, _cancel: &CancellationToken) -> RunReport {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("provider bug");
            }
            succeeded()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn once_runs_exactly_once() {
        let job = TimedJob::new(Duration::from_secs(1));
        let summary = Scheduler::new(job.clone(), ScheduleMode::Once).run().await;
        assert_eq!(summary.runs, 1);
        assert_eq!(summary.succeeded, 1);
        assert!(summary.last_report.unwrap().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn interval_runs_on_schedule() {
        let job = TimedJob::new(Duration::from_secs(1));
        let scheduler = Scheduler::new(job.clone(), ScheduleMode::Interval(Duration::from_secs(10)))
            .with_max_runs(Some(3));

        let summary = scheduler.run().await;
        assert_eq!(summary.runs, 3);

        let starts = job.starts.lock().unwrap().clone();
        assert_eq!(starts[1] - starts[0], Duration::from_secs(10));
        assert_eq!(starts[2] - starts[1], Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_runs_never_overlap() {
        let job = TimedJob::new(Duration::from_secs(25));
        let scheduler = Scheduler::new(job.clone(), ScheduleMode::Interval(Duration::from_secs(10)))
            .with_max_runs(Some(3));

        let started = Instant::now();
        let summary = scheduler.run().await;

        assert_eq!(summary.runs, 3);
        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
        // Missed ticks are deferred, not queued: runs start back to back.
        let starts = job.starts.lock().unwrap().clone();
        assert_eq!(starts[1] - starts[0], Duration::from_secs(25));
        assert_eq!(starts[2] - starts[1], Duration::from_secs(25));
        assert!(started.elapsed() < Duration::from_secs(76));
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_run_does_not_stop_scheduler() {
        let job = Arc::new(PanicsFirst {
            calls: AtomicUsize::new(0),
        });
        let scheduler = Scheduler::new(job, ScheduleMode::Interval(Duration::from_secs(5)))
            .with_max_runs(Some(2));

        let summary = scheduler.run().await;
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.panicked, 1);
        assert_eq!(summary.succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_start_runs_nothing() {
        let job = TimedJob::new(Duration::from_secs(1));
        let scheduler = Scheduler::new(job, ScheduleMode::Interval(Duration::from_secs(5)));
        scheduler.handle().shutdown();

        let summary = scheduler.run().await;
        assert_eq!(summary.runs, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_interval_loop() {
        let job = TimedJob::new(Duration::from_secs(1));
        let scheduler = Scheduler::new(job, ScheduleMode::Interval(Duration::from_secs(10)));
        let handle = scheduler.handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            handle.shutdown();
        });

        let summary = scheduler.run().await;
        // Runs at 0s, 10s and 20s.
        assert_eq!(summary.runs, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_triggers_coalesce() {
        let job = TimedJob::new(Duration::from_secs(1));
        let scheduler = Scheduler::new(job.clone(), ScheduleMode::Interval(Duration::from_secs(3600)))
            .with_max_runs(Some(3));
        let handle = scheduler.handle();
        handle.trigger();
        handle.trigger();
        handle.trigger();

        scheduler.run().await;

        let starts = job.starts.lock().unwrap().clone();
        // First tick, then a single coalesced manual trigger, then the next tick.
        assert_eq!(starts[1] - starts[0], Duration::from_secs(1));
        assert_eq!(starts[2] - starts[0], Duration::from_secs(3600));
    }
}
