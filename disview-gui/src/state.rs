/// Application state management
///
/// UI-only state shared by the panels: input fields, panel visibility,
/// status line, the message log and the error banner.
use disview_render::RenderState;

/// Most lines kept in the message log
const MESSAGE_LIMIT: usize = 200;

#[derive(Debug)]
pub struct AppState {
    /// Text of the goto-address field
    pub goto_input: String,
    pub show_listing_map: bool,
    pub show_messages: bool,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub map_state: RenderState,
    pub text_state: RenderState,
    pub status: String,
    pub messages: Vec<String>,
    /// Text waiting to be handed to the clipboard this frame
    pub clipboard: Option<String>,
    pub error_message: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            goto_input: String::new(),
            show_listing_map: true,
            show_messages: false,
            can_go_back: false,
            can_go_forward: false,
            map_state: RenderState::Idle,
            text_state: RenderState::Idle,
            status: "Ready".to_string(),
            messages: Vec::new(),
            clipboard: None,
            error_message: String::new(),
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, message: String) {
        log::info!("{}", message);
        self.messages.push(message);
        if self.messages.len() > MESSAGE_LIMIT {
            let excess = self.messages.len() - MESSAGE_LIMIT;
            self.messages.drain(..excess);
        }
    }

    pub fn set_error(&mut self, error: String) {
        log::error!("GUI Error: {}", error);
        self.error_message = error;
    }

    pub fn clear_error(&mut self) {
        self.error_message.clear();
    }

    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_log_is_bounded() {
        let mut state = AppState::new();
        for i in 0..(MESSAGE_LIMIT + 5) {
            state.add_message(format!("message {}", i));
        }

        assert_eq!(state.messages.len(), MESSAGE_LIMIT);
        assert_eq!(state.messages[0], "message 5");
    }

    #[test]
    fn test_error_banner() {
        let mut state = AppState::new();
        assert!(!state.has_error());

        state.set_error("bad address".to_string());
        assert!(state.has_error());

        state.clear_error();
        assert!(!state.has_error());
    }
}
