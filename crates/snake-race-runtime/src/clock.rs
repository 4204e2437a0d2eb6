//! Game clock — the single authority on whether the simulation may tick.
//!
//! The clock owns one driver task that wakes every `period` (first firing
//! immediately). On each firing it re-reads the run-state and, only if
//! RUNNING, counts a tick, runs the optional tick action and publishes
//! [`ClockSignal::Tick`] to every subscriber. Firings that land while
//! paused are dropped, never queued.
//!
//! ```text
//! STOPPED --start--> RUNNING <--pause/resume--> PAUSED
//!    |                  |                          |
//!    +------------------+-----------stop-----------+--> HALTED (terminal)
//! ```

use serde::Serialize;
use snake_race_core::prelude::*;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

/// Callback run on every admitted tick, on the driver task.
pub type TickAction = Arc<dyn Fn(Tick) + Send + Sync>;

/// Run-state of a [`GameClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum RunState {
    /// Created, never started.
    Stopped = 0,
    Running = 1,
    Paused = 2,
    /// Stopped for good; the driver is gone.
    Halted = 3,
}

impl RunState {
    fn from_u8(raw: u8) -> RunState {
        match raw {
            0 => RunState::Stopped,
            1 => RunState::Running,
            2 => RunState::Paused,
            _ => RunState::Halted,
        }
    }
}

/// What the clock last published to its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSignal {
    /// Nothing admitted yet.
    Idle,
    /// The given tick was admitted.
    Tick(Tick),
    /// The clock was stopped; no more ticks will follow.
    Halted,
}

struct ClockInner {
    state: AtomicU8,
    period: Duration,
    ticks: AtomicU64,
    signal: watch::Sender<ClockSignal>,
    action: Option<TickAction>,
}

impl ClockInner {
    fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move between RUNNING and PAUSED. Refuses to leave STOPPED or HALTED.
    fn transition(&self, to: RunState) -> Option<RunState> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match RunState::from_u8(raw) {
                    RunState::Running | RunState::Paused => Some(to as u8),
                    RunState::Stopped | RunState::Halted => None,
                }
            })
            .ok()
            .map(RunState::from_u8)
    }

    async fn drive(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match self.state() {
                RunState::Running => {
                    let tick = self.ticks.fetch_add(1, Ordering::AcqRel) + 1;
                    if let Some(action) = &self.action {
                        action(tick);
                    }
                    self.signal.send_replace(ClockSignal::Tick(tick));
                }
                RunState::Halted => break,
                RunState::Paused | RunState::Stopped => trace!("tick skipped while paused"),
            }
        }
    }
}

/// Cheap, cloneable read side of a clock, handed to workers and renderers.
#[derive(Clone)]
pub struct ClockHandle {
    inner: Arc<ClockInner>,
}

impl ClockHandle {
    pub fn is_running(&self) -> bool {
        self.inner.state() == RunState::Running
    }

    pub fn state(&self) -> RunState {
        self.inner.state()
    }

    /// Number of ticks admitted so far.
    pub fn ticks(&self) -> Tick {
        self.inner.ticks.load(Ordering::Acquire)
    }

    /// Receiver that wakes on every admitted tick and once on halt.
    pub fn subscribe(&self) -> watch::Receiver<ClockSignal> {
        self.inner.signal.subscribe()
    }
}

impl std::fmt::Debug for ClockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockHandle")
            .field("state", &self.state())
            .field("ticks", &self.ticks())
            .finish()
    }
}

/// Periodic tick driver with a start / pause / resume / stop lifecycle.
///
/// `start` takes effect once; `stop` is terminal and also runs on drop.
pub struct GameClock {
    inner: Arc<ClockInner>,
    runtime: Handle,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl GameClock {
    /// Create a clock with no tick action; subscribers still see each tick.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(period: Duration) -> Result<Self> {
        Self::build(period, None)
    }

    /// Create a clock that runs `action` on every admitted tick.
    pub fn with_action<F>(period: Duration, action: F) -> Result<Self>
    where
        F: Fn(Tick) + Send + Sync + 'static,
    {
        Self::build(period, Some(Arc::new(action)))
    }

    fn build(period: Duration, action: Option<TickAction>) -> Result<Self> {
        if period.is_zero() {
            return Err(SimError::InvalidPeriod);
        }
        let runtime = Handle::try_current().map_err(|e| SimError::NoRuntime(e.to_string()))?;
        let (signal, _) = watch::channel(ClockSignal::Idle);
        Ok(Self {
            inner: Arc::new(ClockInner {
                state: AtomicU8::new(RunState::Stopped as u8),
                period,
                ticks: AtomicU64::new(0),
                signal,
                action,
            }),
            runtime,
            driver: Mutex::new(None),
        })
    }

    pub fn handle(&self) -> ClockHandle {
        ClockHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    pub fn state(&self) -> RunState {
        self.inner.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    pub fn ticks(&self) -> Tick {
        self.inner.ticks.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<ClockSignal> {
        self.inner.signal.subscribe()
    }

    /// Start ticking. Only the first call on a fresh clock has any effect;
    /// returns whether this call was it.
    pub fn start(&self) -> bool {
        if self
            .inner
            .state
            .compare_exchange(
                RunState::Stopped as u8,
                RunState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            debug!("clock start ignored in state {:?}", self.state());
            return false;
        }

        let task = self.runtime.spawn(Arc::clone(&self.inner).drive());
        let mut driver = self.lock_driver();
        if self.state() == RunState::Halted {
            // stop() raced us between the CAS and here.
            task.abort();
        } else {
            *driver = Some(task);
        }
        info!("clock started with period {:?}", self.inner.period);
        true
    }

    pub fn pause(&self) {
        if let Some(prev) = self.inner.transition(RunState::Paused) {
            debug!("clock paused (was {:?})", prev);
        }
    }

    pub fn resume(&self) {
        if let Some(prev) = self.inner.transition(RunState::Running) {
            debug!("clock resumed (was {:?})", prev);
        }
    }

    /// Halt the driver permanently. Safe to call any number of times.
    pub fn stop(&self) {
        let prev = RunState::from_u8(
            self.inner
                .state
                .swap(RunState::Halted as u8, Ordering::AcqRel),
        );
        if let Some(task) = self.lock_driver().take() {
            task.abort();
        }
        if prev != RunState::Halted {
            self.inner.signal.send_replace(ClockSignal::Halted);
            info!("clock halted after {} ticks", self.ticks());
        }
    }

    fn lock_driver(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.driver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for GameClock {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for GameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClock")
            .field("period", &self.inner.period)
            .field("state", &self.state())
            .field("ticks", &self.ticks())
            .finish()
    }
}
