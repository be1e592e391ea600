use log::{debug, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, yield_now};
use std::time::Duration;

use libgpiod::{chip::Chip, line, line::EventClock, request};
use parking_lot::{FairMutex, Mutex};

use crate::config::{Bias, InputPinConfig, OutputPinConfig};
use crate::error::AppError;
use crate::gpio::{EdgeEvent, EventHandler, GpioBackend, InputLine, OutputLine};

const LIBGPIOD_BACKEND_EVENT_BUFFER_CAPACITY: usize = 64;
const LIBGPIOD_BACKEND_EVENT_WAIT_TIMEOUT_MS: Duration = Duration::from_millis(10);

/// Lines on Linux GPIO character devices.
#[derive(Default)]
pub struct LibgpiodBackend;

impl LibgpiodBackend {
    pub fn new() -> Self {
        Self
    }

    fn output_settings() -> Result<line::Settings, AppError> {
        let mut ls =
            line::Settings::new().map_err(|e| AppError::Gpio(format!("libgpiod settings: {e}")))?;
        ls.set_direction(line::Direction::Output)
            .map_err(|e| AppError::Gpio(format!("set direction: {e}")))?;
        ls.set_drive(line::Drive::PushPull)
            .map_err(|e| AppError::Gpio(format!("set drive: {e}")))?;
        ls.set_output_value(line::Value::InActive)
            .map_err(|e| AppError::Gpio(format!("set output value: {e}")))?;
        Ok(ls)
    }

    fn input_settings(bias: Bias) -> Result<line::Settings, AppError> {
        let mut ls =
            line::Settings::new().map_err(|e| AppError::Gpio(format!("libgpiod settings: {e}")))?;
        ls.set_direction(line::Direction::Input)
            .map_err(|e| AppError::Gpio(format!("set direction: {e}")))?;
        let bias = match bias {
            Bias::Floating => None,
            Bias::PullUp => Some(line::Bias::PullUp),
            Bias::PullDown => Some(line::Bias::PullDown),
        };
        ls.set_bias(bias)
            .map_err(|e| AppError::Gpio(format!("set bias: {e}")))?;
        // every transition is reported; edge filtering happens in the debouncer
        ls.set_edge_detection(Some(line::Edge::Both))
            .map_err(|e| AppError::Gpio(format!("set edge detection: {e}")))?;
        ls.set_event_clock(EventClock::Realtime)
            .map_err(|e| AppError::Gpio(format!("set event clock: {e}")))?;
        Ok(ls)
    }

    fn make_line_config(offset: u32, settings: line::Settings) -> Result<line::Config, AppError> {
        let mut cfg =
            line::Config::new().map_err(|e| AppError::Gpio(format!("line config: {e}")))?;
        cfg.add_line_settings(&[offset], settings)
            .map_err(|e| AppError::Gpio(format!("line config add settings: {e}")))?;
        Ok(cfg)
    }
}

impl GpioBackend for LibgpiodBackend {
    fn request_output(&self, pin: &OutputPinConfig) -> Result<Arc<dyn OutputLine>, AppError> {
        let line_cfg = Self::make_line_config(pin.line, Self::output_settings()?)?;
        let handle = GpiodHandle::new(&pin.chip, &line_cfg)?;
        debug!("requested output line {} on {}", pin.line, pin.chip);

        Ok(Arc::new(GpiodOutput {
            offset: pin.line,
            gpiod_handle: Mutex::new(handle),
        }))
    }

    fn request_input(&self, pin: &InputPinConfig) -> Result<Arc<dyn InputLine>, AppError> {
        let line_cfg = Self::make_line_config(pin.line, Self::input_settings(pin.bias)?)?;
        let handle = GpiodHandle::new(&pin.chip, &line_cfg)?;
        debug!("requested input line {} on {}", pin.line, pin.chip);

        Ok(Arc::new(GpiodInput {
            offset: pin.line,
            listener: Mutex::new(None),
            gpiod_handle: Arc::new(FairMutex::new(handle)),
        }))
    }
}

struct GpiodHandle {
    request: request::Request,
}

impl GpiodHandle {
    fn new(chip: &str, line_cfg: &line::Config) -> Result<Self, AppError> {
        let chip = Self::open_chip(chip)?;
        let request = Self::request_lines(&chip, line_cfg)?;
        Ok(Self { request })
    }

    fn open_chip(path: &str) -> Result<Chip, AppError> {
        let p = PathBuf::from(path);
        Chip::open(&p).map_err(|e| request_error(&format!("open chip {path}"), e))
    }

    fn request_lines(chip: &Chip, line_cfg: &line::Config) -> Result<request::Request, AppError> {
        let mut req_cfg =
            request::Config::new().map_err(|e| AppError::Gpio(format!("request config: {e}")))?;
        req_cfg
            .set_consumer(env!("CARGO_PKG_NAME"))
            .map_err(|e| AppError::Gpio(format!("request consumer: {e}")))?;
        chip.request_lines(Some(&req_cfg), line_cfg)
            .map_err(|e| request_error("request lines", e))
    }
}

/// Keeps the errno of a failed kernel call so busy and permission failures stay distinguishable.
fn request_error(context: &str, err: libgpiod::Error) -> AppError {
    match &err {
        libgpiod::Error::OperationFailed(_, errno) => {
            AppError::from_os_error(context, &std::io::Error::from_raw_os_error(errno.0))
        }
        _ => AppError::Gpio(format!("{context}: {err}")),
    }
}

fn to_value(on: bool) -> line::Value {
    if on {
        line::Value::Active
    } else {
        line::Value::InActive
    }
}

struct GpiodOutput {
    offset: u32,
    gpiod_handle: Mutex<GpiodHandle>,
}

impl OutputLine for GpiodOutput {
    fn write(&self, on: bool) -> Result<(), AppError> {
        self.gpiod_handle
            .lock()
            .request
            .set_value(self.offset, to_value(on))
            .map_err(|e| AppError::Gpio(format!("set value: {e}")))?;
        Ok(())
    }
}

struct GpiodInput {
    offset: u32,
    listener: Mutex<Option<EdgeListener>>, // dropped before the request
    gpiod_handle: Arc<FairMutex<GpiodHandle>>,
}

impl InputLine for GpiodInput {
    fn read(&self) -> Result<bool, AppError> {
        let value = self
            .gpiod_handle
            .lock()
            .request
            .value(self.offset)
            .map_err(|e| AppError::Gpio(format!("get value: {e}")))?;
        Ok(matches!(value, line::Value::Active))
    }

    fn watch(&self, handler: EventHandler) -> Result<(), AppError> {
        let mut listener = self.listener.lock();
        // stop the old thread before a new one competes for events
        listener.take();
        *listener = Some(EdgeListener::new(
            self.offset,
            self.gpiod_handle.clone(),
            handler,
        )?);
        Ok(())
    }

    fn unwatch(&self) {
        self.listener.lock().take();
    }
}

struct EdgeListener {
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EdgeListener {
    fn new(
        offset: u32,
        gpiod_handle: Arc<FairMutex<GpiodHandle>>,
        handler: EventHandler,
    ) -> Result<Self, AppError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancel.clone();
        let mut buffer = request::Buffer::new(LIBGPIOD_BACKEND_EVENT_BUFFER_CAPACITY)
            .map_err(|e| AppError::Gpio(format!("event buffer: {e}")))?;

        let handle = std::thread::Builder::new()
            .name(format!("edge-listener-{offset}"))
            .spawn(move || {
                while !cancel_flag.load(Ordering::Relaxed) {
                    let mut levels = Vec::new();
                    {
                        let hdl = gpiod_handle.lock();
                        let req = &hdl.request;

                        let has_event =
                            match req.wait_edge_events(Some(LIBGPIOD_BACKEND_EVENT_WAIT_TIMEOUT_MS)) {
                                Ok(v) => v,
                                Err(e) => {
                                    warn!("wait edge events error for line {offset}: {e}");
                                    drop(hdl);
                                    yield_now();
                                    continue;
                                }
                            };
                        if !has_event {
                            continue;
                        }

                        let events = match req.read_edge_events(&mut buffer) {
                            Ok(evts) => evts,
                            Err(e) => {
                                warn!("read edge events error for line {offset}: {e}");
                                drop(hdl);
                                yield_now();
                                continue;
                            }
                        };
                        for evt in events {
                            let Ok(evt) = evt else { continue };
                            let level = match evt.event_type() {
                                Ok(line::EdgeKind::Rising) => true,
                                Ok(line::EdgeKind::Falling) => false,
                                Err(_) => continue,
                            };
                            levels.push(level);
                        }
                    }

                    // the handler may read the line, so the request lock is released first
                    for level in levels {
                        handler(EdgeEvent {
                            line: offset,
                            level,
                        });
                    }
                }
            })
            .map_err(|e| AppError::Gpio(format!("spawn edge listener: {e}")))?;

        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }
}

impl Drop for EdgeListener {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take()
            && handle.thread().id() != std::thread::current().id()
        {
            let _ = handle.join();
        }
    }
}
