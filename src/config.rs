use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const DEFAULT_CHIP: &str = "/dev/gpiochip0";
const DEFAULT_HOST: &str = "0.0.0.0:8001";
const DEFAULT_PATH: &str = "/hevo";
const DEFAULT_SSR_LINE: u32 = 17;
const DEFAULT_BUTTON_LINE: u32 = 27;
const DEFAULT_BOUNCE_MS: u64 = 250;
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub unix_socket: Option<String>,
    pub host: Option<String>,
    pub path: String,
    pub shutdown_timeout: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            unix_socket: None,
            host: Some(DEFAULT_HOST.to_string()),
            path: DEFAULT_PATH.to_string(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

/// Input bias applied to the button line.
#[derive(Debug, Hash, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Bias {
    Floating,
    PullUp,
    #[default]
    PullDown,
}

/// Which logical transitions of the button line count as a press.
#[derive(Debug, Hash, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeFilter {
    #[default]
    Rising,
    Falling,
    Both,
}

impl EdgeFilter {
    /// Whether a transition `from -> to` satisfies this filter.
    pub fn matches(self, from: bool, to: bool) -> bool {
        match self {
            EdgeFilter::Rising => !from && to,
            EdgeFilter::Falling => from && !to,
            EdgeFilter::Both => from != to,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OutputPinConfig {
    pub chip: String,
    pub line: u32,
}

impl Default for OutputPinConfig {
    fn default() -> Self {
        Self {
            chip: DEFAULT_CHIP.to_string(),
            line: DEFAULT_SSR_LINE,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct InputPinConfig {
    pub chip: String,
    pub line: u32,
    pub bias: Bias,
    pub edge: EdgeFilter,
    pub bounce_ms: u64,
}

impl InputPinConfig {
    pub fn bounce_window(&self) -> Duration {
        Duration::from_millis(self.bounce_ms)
    }
}

impl Default for InputPinConfig {
    fn default() -> Self {
        Self {
            chip: DEFAULT_CHIP.to_string(),
            line: DEFAULT_BUTTON_LINE,
            bias: Bias::default(),
            edge: EdgeFilter::default(),
            bounce_ms: DEFAULT_BOUNCE_MS,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub ssr: OutputPinConfig,
    pub button: InputPinConfig,
    pub log_file: Option<String>,
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, AppError> {
        let config: Self = serde_json::from_str(contents)
            .map_err(|e| AppError::Config(format!("Invalid config json: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.button.bounce_ms == 0 {
            return Err(AppError::Config(
                "button.bounce_ms must be greater than zero".into(),
            ));
        }
        if self.ssr.chip == self.button.chip && self.ssr.line == self.button.line {
            return Err(AppError::Config(format!(
                "ssr and button both use line {} of {}",
                self.ssr.line, self.ssr.chip
            )));
        }
        if self.http.host.is_none() && self.http.unix_socket.is_none() {
            return Err(AppError::Config(
                "either 'http.host' or 'http.unix_socket' must be specified".into(),
            ));
        }
        Ok(())
    }
}
