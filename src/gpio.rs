use std::sync::Arc;

use crate::config::{InputPinConfig, OutputPinConfig};
use crate::error::AppError;

/// A raw level change reported by an input line. No debouncing has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub line: u32,
    pub level: bool,
}

pub type EventHandler = Arc<dyn Fn(EdgeEvent) + Send + Sync>;

pub trait OutputLine: Send + Sync {
    fn write(&self, on: bool) -> Result<(), AppError>;
}

pub trait InputLine: Send + Sync {
    fn read(&self) -> Result<bool, AppError>;
    /// Starts delivering raw level changes to `handler`. Replaces any previous handler.
    fn watch(&self, handler: EventHandler) -> Result<(), AppError>;
    /// Stops delivery. Safe to call when not watching.
    fn unwatch(&self);
}

/// Hands out exclusive line requests. A line stays claimed until the returned handle is dropped.
pub trait GpioBackend: Send + Sync {
    fn request_output(&self, pin: &OutputPinConfig) -> Result<Arc<dyn OutputLine>, AppError>;
    fn request_input(&self, pin: &InputPinConfig) -> Result<Arc<dyn InputLine>, AppError>;
}
