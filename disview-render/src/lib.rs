//! Rendering core for the disview listing front-end
//!
//! This crate holds the parts of the front-end that do not depend on a GUI
//! toolkit: the asynchronous renderer and its cached consumer view, cursor
//! navigation, address input validation, the view event bus and settings.

use thiserror::Error;

pub mod address;
pub mod config;
pub mod cursor;
pub mod events;
pub mod renderer;
pub mod types;
pub mod view;

pub use address::{format_address, is_valid_hex_address, parse_hex_address, AddressError};
pub use config::{ConfigError, Settings};
pub use cursor::{Cursor, CursorCommand, CursorPosition, LineMetrics, LineViewport};
pub use events::{EventBus, SubscriptionId, Topic, ViewEvent};
pub use renderer::{
    AsyncRenderer, CancelToken, CompletionReceiver, RenderCompleted, RenderContext, RenderStats, RenderStatus,
    RendererOptions, WakeState,
};
pub use types::*;
pub use view::{ContentSource, PaintPlan, RenderConsumerView, RenderState, ViewOptions, Viewport};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to start render worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Renderer was aborted")]
    Aborted,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to load font: {0}")]
    Font(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(RenderError::Aborted.to_string(), "Renderer was aborted");

        let spawn = RenderError::Spawn(std::io::Error::new(std::io::ErrorKind::Other, "no threads"));
        assert_eq!(spawn.to_string(), "Failed to start render worker: no threads");

        let config: RenderError = ConfigError::Invalid("bad".into()).into();
        assert_eq!(config.to_string(), "Invalid configuration: bad");

        let font = RenderError::Font("no glyphs".into());
        assert_eq!(font.to_string(), "Failed to load font: no glyphs");
    }
}
