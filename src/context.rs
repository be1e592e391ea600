use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::coordinator::Coordinator;
use crate::debounce::DebounceEngine;
use crate::error::AppError;
use crate::gpio::GpioBackend;
use crate::output::OutputDriver;

/// Everything that holds hardware: the coordinator (SSR line) and the
/// debounce engine (button line). Torn down by [`AppContext::shutdown`] or on drop.
pub struct AppContext {
    coordinator: Arc<Coordinator>,
    engine: Option<DebounceEngine>,
}

impl AppContext {
    /// Claims both lines and starts button monitoring. The SSR is forced off
    /// before the button can reach it. Must be called inside a tokio runtime.
    pub fn start(config: &AppConfig, backend: &dyn GpioBackend) -> Result<Self, AppError> {
        let ssr = backend.request_output(&config.ssr)?;
        let coordinator = Arc::new(Coordinator::new(OutputDriver::configure(ssr)?));
        info!(
            "ssr on {} line {} configured off",
            config.ssr.chip, config.ssr.line
        );

        let button = backend.request_input(&config.button)?;
        let toggle_target = Arc::downgrade(&coordinator);
        let engine = DebounceEngine::start(
            button,
            config.button.edge,
            config.button.bounce_window(),
            move || {
                debug!("button callback");
                let Some(coordinator) = toggle_target.upgrade() else {
                    return;
                };
                if let Err(e) = coordinator.toggle() {
                    error!("button toggle failed: {e}");
                }
            },
        )?;
        info!(
            "button on {} line {} monitored ({:?}, {} ms bounce window)",
            config.button.chip, config.button.line, config.button.edge, config.button.bounce_ms
        );

        Ok(Self {
            coordinator,
            engine: Some(engine),
        })
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        self.coordinator.clone()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_some()
    }

    /// Stops the button, switches the SSR off and releases the button line.
    /// The SSR line is released once the last coordinator handle is dropped. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(engine) = self.engine.take() else {
            return;
        };
        engine.stop();
        drop(engine);

        if let Err(e) = self.coordinator.set_state(false) {
            warn!("could not switch ssr off during shutdown: {e}");
        }
        info!("hardware released");
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
