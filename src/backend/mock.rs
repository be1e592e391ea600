use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::config::{InputPinConfig, OutputPinConfig};
use crate::error::AppError;
use crate::gpio::{EdgeEvent, EventHandler, GpioBackend, InputLine, OutputLine};

/// In-memory GPIO lines. Tests drive the physical side through [`MockLine`].
#[derive(Default)]
pub struct MockGpioBackend {
    lines: RwLock<HashMap<(String, u32), Arc<MockLine>>>, // keyed by chip and offset
    denied: RwLock<HashSet<(String, u32)>>,
}

impl MockGpioBackend {
    /// Returns the simulated line `offset` of `chip`, creating it (low, unclaimed) if needed.
    pub fn line(&self, chip: &str, offset: u32) -> Arc<MockLine> {
        let key = (chip.to_string(), offset);
        if let Some(line) = self.lines.read().get(&key) {
            return line.clone();
        }
        self.lines
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(MockLine::new(offset)))
            .clone()
    }

    /// Future requests for line `offset` of `chip` fail as if the process lacked access to it.
    pub fn deny(&self, chip: &str, offset: u32) {
        self.denied.write().insert((chip.to_string(), offset));
    }

    fn claim(&self, chip: &str, offset: u32) -> Result<Arc<MockClaim>, AppError> {
        if self.denied.read().contains(&(chip.to_string(), offset)) {
            return Err(AppError::PermissionDenied(format!("{chip} line {offset}")));
        }
        let line = self.line(chip, offset);
        if line.claimed.swap(true, Ordering::AcqRel) {
            return Err(AppError::LineBusy(format!("{chip} line {offset} already requested")));
        }
        Ok(Arc::new(MockClaim { line }))
    }
}

impl GpioBackend for MockGpioBackend {
    fn request_output(&self, pin: &OutputPinConfig) -> Result<Arc<dyn OutputLine>, AppError> {
        let claim: Arc<dyn OutputLine> = self.claim(&pin.chip, pin.line)?;
        Ok(claim)
    }

    fn request_input(&self, pin: &InputPinConfig) -> Result<Arc<dyn InputLine>, AppError> {
        let claim: Arc<dyn InputLine> = self.claim(&pin.chip, pin.line)?;
        Ok(claim)
    }
}

pub struct MockLine {
    offset: u32,
    level: Mutex<bool>,
    handler: Mutex<Option<EventHandler>>,
    claimed: AtomicBool,
    reject_watch: AtomicBool,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    write_delay: Mutex<Duration>,
    written: Mutex<Vec<bool>>,
    reads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLine {
    fn new(offset: u32) -> Self {
        Self {
            offset,
            level: Mutex::new(false),
            handler: Mutex::new(None),
            claimed: AtomicBool::new(false),
            reject_watch: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            write_delay: Mutex::new(Duration::ZERO),
            written: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Physically drives the line. A change of level raises an interrupt if the line is watched.
    pub fn set_level(&self, level: bool) {
        let changed = {
            let mut current = self.level.lock();
            let changed = *current != level;
            *current = level;
            changed
        };
        if changed {
            self.dispatch(level);
        }
    }

    /// Raises an interrupt for the current level without changing it, like a double-fired edge.
    pub fn raise_spurious_interrupt(&self) {
        let level = *self.level.lock();
        self.dispatch(level);
    }

    pub fn level(&self) -> bool {
        *self.level.lock()
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    pub fn is_watched(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Makes the next `watch` calls fail, as with a line that cannot raise interrupts.
    pub fn set_reject_watch(&self, reject: bool) {
        self.reject_watch.store(reject, Ordering::Release);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Makes reads through a claim fail. Physical level changes still raise interrupts.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Release);
    }

    /// Every write sleeps for `delay` while counted as in flight.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    /// Values successfully written, oldest first.
    pub fn written(&self) -> Vec<bool> {
        self.written.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.written.lock().len()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Acquire)
    }

    /// Highest number of writes that were ever executing at the same time.
    pub fn max_concurrent_writes(&self) -> usize {
        self.max_in_flight.load(Ordering::Acquire)
    }

    fn dispatch(&self, level: bool) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(EdgeEvent {
                line: self.offset,
                level,
            });
        }
    }

    fn write(&self, on: bool) -> Result<(), AppError> {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(now, Ordering::AcqRel);

        let delay = *self.write_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let result = if self.fail_writes.load(Ordering::Acquire) {
            Err(AppError::Gpio(format!("set value: line {} write failed", self.offset)))
        } else {
            *self.level.lock() = on;
            self.written.lock().push(on);
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        result
    }
}

/// An outstanding request on a [`MockLine`]; dropping it releases the line.
struct MockClaim {
    line: Arc<MockLine>,
}

impl OutputLine for MockClaim {
    fn write(&self, on: bool) -> Result<(), AppError> {
        self.line.write(on)
    }
}

impl InputLine for MockClaim {
    fn read(&self) -> Result<bool, AppError> {
        self.line.reads.fetch_add(1, Ordering::AcqRel);
        if self.line.fail_reads.load(Ordering::Acquire) {
            return Err(AppError::Gpio(format!(
                "get value: line {} read failed",
                self.line.offset
            )));
        }
        Ok(self.line.level())
    }

    fn watch(&self, handler: EventHandler) -> Result<(), AppError> {
        if self.line.reject_watch.load(Ordering::Acquire) {
            return Err(AppError::Config(format!(
                "edge detection unsupported on line {}",
                self.line.offset
            )));
        }
        *self.line.handler.lock() = Some(handler);
        Ok(())
    }

    fn unwatch(&self) {
        self.line.handler.lock().take();
    }
}

impl Drop for MockClaim {
    fn drop(&mut self) {
        self.line.handler.lock().take();
        self.line.claimed.store(false, Ordering::Release);
    }
}
