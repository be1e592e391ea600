//! Button debouncing.
//!
//! A mechanical switch chatters for a few milliseconds around every transition.
//! [`DebounceState`] turns that chatter into at most one confirmed edge per bounce
//! window:
//!
//! - `Idle`: a raw level change that matches the edge filter moves to `Pending` and arms
//!   the bounce timer. Any other change only moves the baseline.
//! - `Pending`: raw level changes are dropped. When the timer fires the line is re-sampled,
//!   the edge is confirmed if it still holds against the pre-candidate level, and the
//!   machine returns to `Idle`.
//!
//! [`DebounceEngine`] wires the state machine to an [`InputLine`] and a one-shot tokio timer.

use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::EdgeFilter;
use crate::error::AppError;
use crate::gpio::{EdgeEvent, InputLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebouncePhase {
    Idle,
    /// A candidate edge away from `from` is waiting for the bounce window to elapse.
    Pending { from: bool },
}

#[derive(Debug, Clone)]
pub struct DebounceState {
    last_level: bool,
    phase: DebouncePhase,
    filter: EdgeFilter,
}

impl DebounceState {
    pub fn new(initial_level: bool, filter: EdgeFilter) -> Self {
        Self {
            last_level: initial_level,
            phase: DebouncePhase::Idle,
            filter,
        }
    }

    pub fn last_level(&self) -> bool {
        self.last_level
    }

    pub fn phase(&self) -> DebouncePhase {
        self.phase
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, DebouncePhase::Pending { .. })
    }

    /// Feeds a raw level change. Returns `true` when a confirmation became pending,
    /// in which case the caller must arm the bounce timer.
    pub fn on_raw_level(&mut self, level: bool) -> bool {
        match self.phase {
            DebouncePhase::Pending { .. } => false,
            DebouncePhase::Idle => {
                if self.filter.matches(self.last_level, level) {
                    self.phase = DebouncePhase::Pending {
                        from: self.last_level,
                    };
                    true
                } else {
                    // transitions the filter ignores still move the baseline,
                    // otherwise a release would mask the next press
                    self.last_level = level;
                    false
                }
            }
        }
    }

    /// Feeds the level sampled when the bounce timer fired. Returns `true` if the
    /// pending edge is confirmed. The sample always becomes the new baseline.
    pub fn on_timer(&mut self, level: bool) -> bool {
        let DebouncePhase::Pending { from } = self.phase else {
            return false;
        };
        self.phase = DebouncePhase::Idle;
        self.last_level = level;
        self.filter.matches(from, level)
    }

    /// Abandons a pending confirmation without touching the baseline.
    pub fn cancel(&mut self) {
        self.phase = DebouncePhase::Idle;
    }
}

pub type ConfirmedEdgeHandler = Arc<dyn Fn() + Send + Sync>;

/// Monitors one input line and calls a handler once per confirmed edge.
///
/// The handler runs on the timer task that confirmed the edge. Stopping (or dropping)
/// the engine cancels a pending timer and detaches the line's interrupt handler.
pub struct DebounceEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    line: Arc<dyn InputLine>,
    bounce_window: Duration,
    on_confirmed_edge: ConfirmedEdgeHandler,
    runtime: Handle,
    slot: Mutex<Slot>,
}

struct Slot {
    state: DebounceState,
    timer: Option<JoinHandle<()>>,
    stopped: bool,
}

impl DebounceEngine {
    /// Samples the line, registers for its interrupts and returns immediately.
    /// Must be called from within a tokio runtime, which will run the bounce timers.
    pub fn start<F>(
        line: Arc<dyn InputLine>,
        filter: EdgeFilter,
        bounce_window: Duration,
        on_confirmed_edge: F,
    ) -> Result<Self, AppError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| AppError::Config(format!("debounce timer requires a tokio runtime: {e}")))?;
        let initial = line.read()?;

        let inner = Arc::new(EngineInner {
            line: line.clone(),
            bounce_window,
            on_confirmed_edge: Arc::new(on_confirmed_edge),
            runtime,
            slot: Mutex::new(Slot {
                state: DebounceState::new(initial, filter),
                timer: None,
                stopped: false,
            }),
        });

        let weak = Arc::downgrade(&inner);
        line.watch(Arc::new(move |event: EdgeEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_raw_edge(event);
            }
        }))
        .map_err(|e| AppError::Config(format!("edge detection registration: {e}")))?;

        debug!(
            "debounce engine started: filter {filter:?}, window {bounce_window:?}, initial level {initial}"
        );
        Ok(Self { inner })
    }

    /// Idempotent.
    pub fn stop(&self) {
        let timer = {
            let mut slot = self.inner.slot.lock();
            if slot.stopped {
                return;
            }
            slot.stopped = true;
            slot.state.cancel();
            slot.timer.take()
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        // outside the slot lock: unwatching may wait for an in-flight interrupt handler
        self.inner.line.unwatch();
        debug!("debounce engine stopped");
    }

    pub fn last_observed_level(&self) -> bool {
        self.inner.slot.lock().state.last_level()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.slot.lock().state.is_pending()
    }
}

impl Drop for DebounceEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

impl EngineInner {
    fn on_raw_edge(self: &Arc<Self>, event: EdgeEvent) {
        let mut slot = self.slot.lock();
        if slot.stopped {
            return;
        }
        if !slot.state.on_raw_level(event.level) {
            debug!(
                "line {} raw level {} ignored ({:?})",
                event.line,
                event.level,
                slot.state.phase()
            );
            return;
        }

        debug!(
            "line {} candidate edge to {}, confirming in {:?}",
            event.line, event.level, self.bounce_window
        );
        let weak: Weak<Self> = Arc::downgrade(self);
        let window = self.bounce_window;
        slot.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(inner) = weak.upgrade() {
                inner.confirm();
            }
        }));
    }

    fn confirm(&self) {
        let confirmed = {
            let mut slot = self.slot.lock();
            if slot.stopped || !slot.state.is_pending() {
                return;
            }
            slot.timer = None;
            match self.line.read() {
                Ok(level) => {
                    let confirmed = slot.state.on_timer(level);
                    debug!("bounce window elapsed, level {level}, confirmed {confirmed}");
                    confirmed
                }
                Err(e) => {
                    warn!("dropping candidate edge, line read failed: {e}");
                    slot.state.cancel();
                    false
                }
            }
        };

        if confirmed {
            (self.on_confirmed_edge)();
        }
    }
}
