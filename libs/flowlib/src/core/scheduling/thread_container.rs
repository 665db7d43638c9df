// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Thread container: runs the periodic tasks below it on one loop thread
//! with a fixed cycle time.
//!
//! The schedule is rebuilt at the start of a cycle whenever a structural
//! change below the container was announced on the event bus.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::schedule::{Schedule, ScheduleBuilder, ScheduleReport};
use crate::core::buffers::ThreadContext;
use crate::core::graph::ElementId;
use crate::core::pubsub::{topics, Event, EventBus, EventListener, ExecutionEvent};
use crate::core::runtime::RuntimeInner;
use crate::core::{FlowError, Result};

/// Cycle counters of a thread container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub cycles: u64,
    /// Cycles that took longer than the cycle time.
    pub overruns: u64,
    pub last_cycle_duration: Duration,
}

#[derive(Default)]
struct CycleCounters {
    cycles: AtomicU64,
    overruns: AtomicU64,
    last_cycle_ns: AtomicU64,
}

impl CycleCounters {
    fn record(&self, duration: Duration, overrun: bool) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if overrun {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
        self.last_cycle_ns
            .store(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ContainerStats {
        ContainerStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            last_cycle_duration: Duration::from_nanos(self.last_cycle_ns.load(Ordering::Relaxed)),
        }
    }
}

/// Raises the reschedule flag on structural changes below the container.
struct RescheduleOnChange {
    container: ElementId,
    reschedule: Arc<AtomicBool>,
}

impl EventListener for RescheduleOnChange {
    fn on_event(&mut self, event: &Event) -> Result<()> {
        if let Event::Structure(change) = event {
            if change.affects(self.container) {
                self.reschedule.store(true, Ordering::Release);
            }
        }
        Ok(())
    }
}

struct RunningLoop {
    shutdown_tx: crossbeam_channel::Sender<()>,
    handle: JoinHandle<()>,
    thread: ThreadId,
}

pub struct ThreadContainer {
    id: ElementId,
    name: String,
    cycle_time_ns: AtomicU64,
    warn_on_overrun: bool,
    runtime: Weak<RuntimeInner>,
    reschedule: Arc<AtomicBool>,
    schedule: Mutex<Arc<Schedule>>,
    counters: CycleCounters,
    running: Mutex<Option<RunningLoop>>,
    _structure_listener: Arc<Mutex<RescheduleOnChange>>,
}

impl ThreadContainer {
    pub(crate) fn new(
        id: ElementId,
        name: &str,
        cycle_time: Duration,
        warn_on_overrun: bool,
        runtime: Weak<RuntimeInner>,
        bus: &EventBus,
    ) -> Self {
        let reschedule = Arc::new(AtomicBool::new(true));
        let listener = Arc::new(Mutex::new(RescheduleOnChange {
            container: id,
            reschedule: Arc::clone(&reschedule),
        }));
        bus.subscribe(topics::STRUCTURE, listener.clone());

        Self {
            id,
            name: name.to_string(),
            cycle_time_ns: AtomicU64::new(cycle_time.as_nanos() as u64),
            warn_on_overrun,
            runtime,
            reschedule,
            schedule: Mutex::new(Arc::new(Schedule::default())),
            counters: CycleCounters::default(),
            running: Mutex::new(None),
            _structure_listener: listener,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cycle_time(&self) -> Duration {
        Duration::from_nanos(self.cycle_time_ns.load(Ordering::Relaxed))
    }

    /// Takes effect with the next cycle.
    pub fn set_cycle_time(&self, cycle_time: Duration) {
        self.cycle_time_ns
            .store(cycle_time.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    pub fn stats(&self) -> ContainerStats {
        self.counters.snapshot()
    }

    /// Force a schedule rebuild at the start of the next cycle.
    pub fn request_reschedule(&self) {
        self.reschedule.store(true, Ordering::Release);
    }

    pub fn needs_reschedule(&self) -> bool {
        self.reschedule.load(Ordering::Acquire)
    }

    /// The schedule the last cycle executed.
    pub fn schedule(&self) -> Arc<Schedule> {
        Arc::clone(&self.schedule.lock())
    }

    pub fn schedule_report(&self) -> ScheduleReport {
        self.schedule().report()
    }

    /// Start the loop thread. Does nothing when already running.
    pub fn start_execution(self: &Arc<Self>) -> Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            tracing::debug!("[{}] Already running", self.name);
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let container = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || container.run_loop(shutdown_rx))?;
        let thread = handle.thread().id();
        *running = Some(RunningLoop {
            shutdown_tx,
            handle,
            thread,
        });
        drop(running);

        self.announce(ExecutionEvent::Started {
            container: self.id,
            name: self.name.clone(),
        });
        Ok(())
    }

    /// Stop the loop thread and wait until it has terminated.
    ///
    /// Fails when called from the loop thread itself.
    pub fn pause_execution(&self) -> Result<()> {
        let running = {
            let mut guard = self.running.lock();
            match guard.as_ref() {
                None => return Ok(()),
                Some(state) if state.thread == std::thread::current().id() => {
                    return Err(FlowError::Scheduler(format!(
                        "thread container '{}' cannot pause itself",
                        self.name
                    )));
                }
                Some(_) => {}
            }
            guard.take()
        };
        let Some(running) = running else {
            return Ok(());
        };

        // The receiver may already be gone if the loop exited on its own
        let _ = running.shutdown_tx.send(());
        running.handle.join().map_err(|_| {
            FlowError::Scheduler(format!("thread container '{}' panicked", self.name))
        })?;

        self.announce(ExecutionEvent::Paused {
            container: self.id,
            name: self.name.clone(),
        });
        Ok(())
    }

    /// Run one cycle on the calling thread: rebuild the schedule if needed,
    /// then execute every task once, in order.
    ///
    /// Fails while the container runs its own loop thread.
    pub fn execute_cycle(&self, ctx: &mut ThreadContext) -> Result<()> {
        if self.is_running() {
            return Err(FlowError::Scheduler(format!(
                "thread container '{}' is running its own loop",
                self.name
            )));
        }
        self.run_cycle(ctx);
        Ok(())
    }

    fn run_cycle(&self, ctx: &mut ThreadContext) {
        self.reschedule_if_needed();
        let schedule = self.schedule();
        for task in schedule.tasks() {
            task.execute(ctx);
        }
    }

    fn reschedule_if_needed(&self) {
        if !self.reschedule.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };

        let rebuilt = {
            let tree = runtime.tree.lock();
            ScheduleBuilder::new(&tree, self.id).build()
        };
        match rebuilt {
            Ok(schedule) => {
                for task in schedule.broken_cycles() {
                    let task = schedule
                        .tasks()
                        .iter()
                        .find(|t| t.id() == *task)
                        .map(|t| t.name().to_string())
                        .unwrap_or_else(|| task.to_string());
                    runtime.bus.publish(
                        topics::EXECUTION,
                        &Event::Execution(ExecutionEvent::CycleBroken {
                            container: self.id,
                            task,
                        }),
                    );
                }
                *self.schedule.lock() = Arc::new(schedule);
            }
            Err(e) => {
                tracing::warn!("[{}] Failed to rebuild schedule: {}", self.name, e);
            }
        }
    }

    fn run_loop(&self, shutdown_rx: crossbeam_channel::Receiver<()>) {
        tracing::info!(
            "[{}] Thread started with cycle time {:?}",
            self.name,
            self.cycle_time()
        );
        let mut ctx = ThreadContext::new(self.name.clone());

        loop {
            if self.runtime.strong_count() == 0 {
                tracing::debug!("[{}] Runtime dropped, leaving loop", self.name);
                break;
            }

            let started = Instant::now();
            self.run_cycle(&mut ctx);
            let elapsed = started.elapsed();

            let cycle_time = self.cycle_time();
            let overrun = elapsed > cycle_time;
            self.counters.record(elapsed, overrun);
            let wait = if overrun {
                if self.warn_on_overrun {
                    tracing::warn!(
                        "[{}] Cycle took {:?}, exceeding cycle time {:?}",
                        self.name,
                        elapsed,
                        cycle_time
                    );
                }
                Duration::ZERO
            } else {
                cycle_time - elapsed
            };

            match shutdown_rx.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::info!(
            "[{}] Thread stopped after {} cycles",
            self.name,
            self.counters.snapshot().cycles
        );
    }

    /// Stop the loop thread without reporting errors. Joins unless called
    /// from the loop thread itself, which then exits after its cycle.
    pub(crate) fn shutdown(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        let _ = running.shutdown_tx.send(());
        if running.thread == std::thread::current().id() {
            tracing::debug!("[{}] Shutdown requested from loop thread", self.name);
            return;
        }
        if running.handle.join().is_err() {
            tracing::warn!("[{}] Loop thread panicked", self.name);
        }
    }

    fn announce(&self, event: ExecutionEvent) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.bus.publish(topics::EXECUTION, &Event::Execution(event));
        }
    }
}

impl std::fmt::Debug for ThreadContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContainer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("cycle_time", &self.cycle_time())
            .field("running", &self.is_running())
            .finish()
    }
}
