use log::{error, info};
use parking_lot::Mutex;

use crate::error::AppError;
use crate::output::OutputDriver;

/// Sole owner of the SSR. Every operation runs under one lock, so a toggle's
/// read-modify-write never interleaves with an HTTP `set_state`.
pub struct Coordinator {
    driver: Mutex<OutputDriver>,
}

impl Coordinator {
    pub fn new(driver: OutputDriver) -> Self {
        Self {
            driver: Mutex::new(driver),
        }
    }

    /// Inverts the relay and returns the new state.
    pub fn toggle(&self) -> Result<bool, AppError> {
        let mut driver = self.driver.lock();
        let next = !driver.get();
        driver.set(next).inspect_err(|e| {
            error!("toggle to {} failed: {e}", on_off(next));
        })?;
        info!("relay toggled {}", on_off(next));
        Ok(next)
    }

    /// Writes `on` even when it is already the current state.
    pub fn set_state(&self, on: bool) -> Result<(), AppError> {
        let mut driver = self.driver.lock();
        driver.set(on).inspect_err(|e| {
            error!("switching relay {} failed: {e}", on_off(on));
        })?;
        info!("relay switched {}", on_off(on));
        Ok(())
    }

    pub fn get_state(&self) -> bool {
        self.driver.lock().get()
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}
