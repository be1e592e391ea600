use std::sync::Arc;

use log::debug;

use crate::error::AppError;
use crate::gpio::OutputLine;

/// The SSR output line plus a mirror of the last level written to it.
///
/// The mirror is what [`OutputDriver::get`] reports; the hardware is never read back.
pub struct OutputDriver {
    line: Arc<dyn OutputLine>,
    level: bool,
}

impl OutputDriver {
    /// Takes ownership of the line and forces it to the safe OFF level.
    pub fn configure(line: Arc<dyn OutputLine>) -> Result<Self, AppError> {
        line.write(false)?;
        debug!("ssr line configured, forced off");
        Ok(Self { line, level: false })
    }

    /// Writes the level. On failure the mirror keeps the previous value.
    pub fn set(&mut self, on: bool) -> Result<(), AppError> {
        self.line.write(on)?;
        self.level = on;
        Ok(())
    }

    pub fn get(&self) -> bool {
        self.level
    }
}
