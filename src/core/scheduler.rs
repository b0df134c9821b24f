//! Frame-driven scheduling for mutations that must wait on the engine
//!
//! The engine gives no push notification for every readiness condition we
//! care about ("style loaded", "source registered"), so those waits are poll
//! tasks re-run once per animation frame. Tasks are keyed by the resource
//! they mutate: scheduling a second task under the same key cancels the
//! first, which keeps two loops from writing the same resource.

use crate::{core::config::SchedulerConfig, traits::MapEngine, MapError, Result};
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::task::Poll;

/// Poll body; returns `Ready` once its mutation has been applied
pub type PollTask = Box<dyn FnMut(&mut dyn MapEngine) -> Result<Poll<()>> + Send>;

/// Work queued for the next idle flush
pub type DeferredTask = Box<dyn FnOnce(&mut dyn MapEngine) + Send>;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct PendingTask {
    key: String,
    poll: PollTask,
    token: CancelToken,
    frames: u32,
    bounded: bool,
}

/// Outcome of one scheduler pass
#[derive(Debug, Default)]
pub struct TickReport {
    /// Keys whose task reached `Ready` during this pass
    pub completed: Vec<String>,
    /// Keys dropped because they exceeded the frame budget
    pub timed_out: Vec<String>,
    /// Keys whose task returned an error
    pub failed: Vec<(String, MapError)>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.timed_out.is_empty() && self.failed.is_empty()
    }

    /// The first task that ran out of frames, as an error
    pub fn timeout(&self) -> Option<MapError> {
        self.timed_out
            .first()
            .map(|key| MapError::ReadyTimeout(key.clone()))
    }

    fn merge(&mut self, other: TickReport) {
        self.completed.extend(other.completed);
        self.timed_out.extend(other.timed_out);
        self.failed.extend(other.failed);
    }
}

/// Keyed poll tasks plus an idle queue
pub struct FrameScheduler {
    config: SchedulerConfig,
    tasks: Vec<PendingTask>,
    deferred: VecDeque<DeferredTask>,
}

impl FrameScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            tasks: Vec::new(),
            deferred: VecDeque::new(),
        }
    }

    /// Runs `poll` now and, if not ready, once per frame until it is
    ///
    /// Any task already registered under `key` is cancelled first. The task
    /// gives up after `max_poll_frames` frames.
    pub fn schedule_until(
        &mut self,
        engine: &mut dyn MapEngine,
        key: impl Into<String>,
        poll: PollTask,
    ) -> (CancelToken, TickReport) {
        self.schedule(engine, key.into(), poll, true)
    }

    /// Like [`schedule_until`](Self::schedule_until) without the frame budget
    ///
    /// Used by animation loops, which end themselves or get cancelled.
    pub fn schedule_animation(
        &mut self,
        engine: &mut dyn MapEngine,
        key: impl Into<String>,
        poll: PollTask,
    ) -> (CancelToken, TickReport) {
        self.schedule(engine, key.into(), poll, false)
    }

    fn schedule(
        &mut self,
        engine: &mut dyn MapEngine,
        key: String,
        poll: PollTask,
        bounded: bool,
    ) -> (CancelToken, TickReport) {
        self.cancel(&key);
        let token = CancelToken::new();
        let mut task = PendingTask {
            key,
            poll,
            token: token.clone(),
            frames: 0,
            bounded,
        };
        let mut report = TickReport::default();
        if !Self::run_task(&mut task, engine, &mut report) {
            self.tasks.push(task);
        }
        (token, report)
    }

    /// Cancels the task registered under `key`, if any
    pub fn cancel(&mut self, key: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| {
            if task.key == key {
                task.token.cancel();
                false
            } else {
                true
            }
        });
        before != self.tasks.len()
    }

    /// Cancels every task whose key starts with `prefix`
    pub fn cancel_prefix(&mut self, prefix: &str) {
        self.tasks.retain(|task| {
            if task.key.starts_with(prefix) {
                task.token.cancel();
                false
            } else {
                true
            }
        });
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.tasks.iter().any(|task| task.key == key)
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Queues work for the next [`flush_deferred`](Self::flush_deferred)
    pub fn defer(&mut self, task: DeferredTask) {
        self.deferred.push_back(task);
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Runs every queued idle task, including ones queued while flushing
    pub fn flush_deferred(&mut self, engine: &mut dyn MapEngine) {
        while let Some(task) = self.deferred.pop_front() {
            task(engine);
        }
    }

    /// One animation frame: every live task is polled once
    pub fn tick(&mut self, engine: &mut dyn MapEngine) -> TickReport {
        let mut report = TickReport::default();
        let mut remaining = Vec::with_capacity(self.tasks.len());
        for mut task in std::mem::take(&mut self.tasks) {
            if task.token.is_cancelled() {
                continue;
            }
            task.frames += 1;
            if task.bounded && task.frames > self.config.max_poll_frames {
                log::warn!(
                    "giving up on `{}` after {} frames",
                    task.key,
                    self.config.max_poll_frames
                );
                report.timed_out.push(task.key);
                continue;
            }
            if !Self::run_task(&mut task, engine, &mut report) {
                remaining.push(task);
            }
        }
        // Tasks scheduled from inside a poll land in self.tasks meanwhile
        remaining.append(&mut self.tasks);
        self.tasks = remaining;
        report
    }

    /// Ticks until nothing is pending or `frames` frames have elapsed
    pub fn run_frames(&mut self, engine: &mut dyn MapEngine, frames: u32) -> TickReport {
        let mut report = TickReport::default();
        for _ in 0..frames {
            if self.tasks.is_empty() {
                break;
            }
            report.merge(self.tick(engine));
        }
        report
    }

    /// Returns true when the task is finished (ready, failed or cancelled)
    fn run_task(
        task: &mut PendingTask,
        engine: &mut dyn MapEngine,
        report: &mut TickReport,
    ) -> bool {
        if task.token.is_cancelled() {
            return true;
        }
        match (task.poll)(engine) {
            Ok(Poll::Ready(())) => {
                log::trace!("`{}` ready", task.key);
                report.completed.push(task.key.clone());
                true
            }
            Ok(Poll::Pending) => false,
            Err(err) => {
                log::warn!("`{}` failed: {}", task.key, err);
                report.failed.push((task.key.clone(), err));
                true
            }
        }
    }

    /// Drops every task and queued idle work
    pub fn clear(&mut self) {
        for task in self.tasks.drain(..) {
            task.token.cancel();
        }
        self.deferred.clear();
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
