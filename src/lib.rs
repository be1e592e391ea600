mod backend;
mod config;
mod context;
mod coordinator;
mod debounce;
mod error;
mod gpio;
mod output;
mod routes;

pub use config::{AppConfig, Bias, EdgeFilter, HttpConfig, InputPinConfig, OutputPinConfig};
pub use context::AppContext;
pub use coordinator::Coordinator;
pub use debounce::{ConfirmedEdgeHandler, DebounceEngine, DebouncePhase, DebounceState};
pub use error::AppError;
pub use gpio::{EdgeEvent, EventHandler, GpioBackend, InputLine, OutputLine};
pub use output::OutputDriver;
pub use routes::AppState;

#[cfg(feature = "hardware-gpio")]
pub use backend::LibgpiodBackend;
pub use backend::{MockGpioBackend, MockLine};
