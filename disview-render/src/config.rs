//! Application settings
//!
//! Settings are read from a JSON file. Every field has a default, so a
//! partial file (or no file at all) is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::renderer::RendererOptions;
use crate::types::{Priority, Rgba, Size};
use crate::view::ViewOptions;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "disview.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: String,
    pub render: RenderSettings,
    pub view: ViewSettings,
    pub document: DocumentSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub default_priority: Priority,
    pub worker_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub line_height: u32,
    pub char_width: u32,
    pub background: Rgba,
    /// Width of the listing map dock in pixels
    pub map_width: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Number of items in the generated listing
    pub lines: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "debug".to_string(),
            render: RenderSettings::default(),
            view: ViewSettings::default(),
            document: DocumentSettings::default(),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            default_priority: Priority::Normal,
            worker_name: "disview-render".to_string(),
        }
    }
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            line_height: 18,
            char_width: 8,
            background: Rgba::rgb(30, 30, 30),
            map_width: 48,
        }
    }
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self { lines: 4096 }
    }
}

impl Settings {
    /// Load and validate settings from `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        log::debug!("Loading configuration from {}", path.display());
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.view.line_height == 0 {
            return Err(ConfigError::Invalid("view.line_height must be positive".into()));
        }
        if self.view.char_width == 0 {
            return Err(ConfigError::Invalid("view.char_width must be positive".into()));
        }
        if self.document.lines == 0 {
            return Err(ConfigError::Invalid("document.lines must be positive".into()));
        }
        if self.render.worker_name.trim().is_empty() {
            return Err(ConfigError::Invalid("render.worker_name must not be empty".into()));
        }
        self.log_level_filter()?;
        Ok(())
    }

    pub fn log_level_filter(&self) -> Result<log::LevelFilter, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.log_level)))
    }

    /// Options for a view whose worker is named after `suffix`
    pub fn view_options(&self, suffix: &str) -> ViewOptions {
        ViewOptions {
            renderer: RendererOptions {
                worker_name: format!("{}-{}", self.render.worker_name, suffix),
            },
            priority: self.render.default_priority,
            overscan: Size::default(),
        }
    }
}
