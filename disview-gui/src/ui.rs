/// UI components for the listing front-end
///
/// Each function draws one panel and reports user actions by queueing a
/// [`ViewCommand`]; none of them mutate the document or the views.
use eframe::egui;
use std::sync::mpsc::Sender;

use disview_render::{
    format_address, parse_hex_address, CursorPosition, PaintPlan, RenderState, RenderStats,
};

use crate::commands::ViewCommand;
use crate::listing_map::line_at_row;
use crate::state::AppState;

/// Render the menu bar entries
pub fn render_menu(ui: &mut egui::Ui, state: &mut AppState, command_sender: &Sender<ViewCommand>) {
    ui.menu_button("File", |ui| {
        if ui.button("Exit").clicked() {
            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
        }
    });

    ui.menu_button("Navigate", |ui| {
        if ui.add_enabled(state.can_go_back, egui::Button::new("Back")).clicked() {
            let _ = command_sender.send(ViewCommand::GoBack);
            ui.close();
        }
        if ui
            .add_enabled(state.can_go_forward, egui::Button::new("Forward"))
            .clicked()
        {
            let _ = command_sender.send(ViewCommand::GoForward);
            ui.close();
        }
    });

    ui.menu_button("Document", |ui| {
        if ui.button("Define next unexplored block").clicked() {
            let _ = command_sender.send(ViewCommand::ExploreNext);
            ui.close();
        }
    });

    ui.menu_button("Edit", |ui| {
        if ui.button("Copy").clicked() {
            let _ = command_sender.send(ViewCommand::Copy);
            ui.close();
        }
        if ui.button("Follow operand").clicked() {
            let _ = command_sender.send(ViewCommand::FollowUnderCursor);
            ui.close();
        }
    });

    ui.menu_button("View", |ui| {
        let mut show = state.show_listing_map;
        if ui.checkbox(&mut show, "Listing map").changed() {
            let _ = command_sender.send(ViewCommand::ToggleListingMap);
        }
        let mut show = state.show_messages;
        if ui.checkbox(&mut show, "Messages").changed() {
            let _ = command_sender.send(ViewCommand::ToggleMessages);
        }
    });
}

/// Render the toolbar: history buttons and the goto-address field
pub fn render_toolbar(ui: &mut egui::Ui, state: &mut AppState, command_sender: &Sender<ViewCommand>) {
    ui.horizontal(|ui| {
        if ui.add_enabled(state.can_go_back, egui::Button::new("⬅")).clicked() {
            let _ = command_sender.send(ViewCommand::GoBack);
        }
        if ui.add_enabled(state.can_go_forward, egui::Button::new("➡")).clicked() {
            let _ = command_sender.send(ViewCommand::GoForward);
        }

        ui.separator();

        ui.label("Address:");
        let field = ui.add(
            egui::TextEdit::singleline(&mut state.goto_input)
                .desired_width(160.0)
                .hint_text("0x401000"),
        );
        let address = parse_hex_address(&state.goto_input).ok();
        let submitted = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

        let go = ui.add_enabled(address.is_some(), egui::Button::new("Go")).clicked();
        if let Some(address) = address.filter(|_| go || submitted) {
            let _ = command_sender.send(ViewCommand::GotoAddress(address));
        }

        ui.separator();

        if ui.button("Define data").clicked() {
            let _ = command_sender.send(ViewCommand::ExploreNext);
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.label(format!("Map {}", state_label(state.map_state)));
            ui.separator();
            ui.label(format!("Listing {}", state_label(state.text_state)));
        });
    });
}

fn state_label(state: RenderState) -> &'static str {
    match state {
        RenderState::Idle => "ready",
        RenderState::RenderPending => "queued",
        RenderState::Rendering => "rendering",
    }
}

/// Render the error banner if there is an error to show
pub fn render_error_banner(ctx: &egui::Context, state: &mut AppState) {
    if !state.has_error() {
        return;
    }
    egui::TopBottomPanel::top("error_panel").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.colored_label(egui::Color32::RED, &state.error_message);
            if ui.button("✕").clicked() {
                state.clear_error();
            }
        });
    });
}

/// Render the status bar
pub fn render_status_bar(
    ui: &mut egui::Ui,
    state: &AppState,
    position: CursorPosition,
    address: Option<u64>,
    text_stats: RenderStats,
    map_stats: RenderStats,
) {
    ui.horizontal(|ui| {
        ui.label(&state.status);
        ui.separator();
        ui.monospace(format!("Ln {}, Col {}", position.line + 1, position.column + 1));
        if let Some(address) = address {
            ui.separator();
            ui.monospace(format_address(address, 8));
        }
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.label(format!(
                "map renders {} ({} coalesced)",
                map_stats.rendered, map_stats.coalesced
            ));
            ui.separator();
            ui.label(format!(
                "listing renders {} ({} coalesced)",
                text_stats.rendered, text_stats.coalesced
            ));
        });
    });
}

/// Render the message log, newest at the bottom
pub fn render_messages(ui: &mut egui::Ui, state: &AppState) {
    ui.horizontal(|ui| {
        ui.heading("Messages");
        ui.label(format!("({})", state.messages.len()));
    });
    ui.separator();

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .stick_to_bottom(true)
        .show(ui, |ui| {
            for message in &state.messages {
                ui.monospace(message);
            }
        });
}

/// Blit the visible part of a cached view image into `rect`
pub fn paint_cached(
    painter: &egui::Painter,
    rect: egui::Rect,
    texture: Option<&egui::TextureHandle>,
    plan: Option<PaintPlan<'_>>,
) {
    let (Some(texture), Some(plan)) = (texture, plan) else {
        return;
    };
    let image = plan.image.size();
    let (width, height) = (image.width.max(1) as f32, image.height.max(1) as f32);
    let uv = egui::Rect::from_min_max(
        egui::pos2(plan.source.origin.x as f32 / width, plan.source.origin.y as f32 / height),
        egui::pos2(plan.source.right() as f32 / width, plan.source.bottom() as f32 / height),
    );
    let target = egui::Rect::from_min_size(
        rect.min + egui::vec2(plan.target.x as f32, plan.target.y as f32),
        egui::vec2(plan.source.size.width as f32, plan.source.size.height as f32),
    );
    painter.image(texture.id(), target, uv, egui::Color32::WHITE);
}

/// Draw the cached listing map and turn clicks into jumps
pub fn render_listing_map(
    ui: &mut egui::Ui,
    texture: Option<&egui::TextureHandle>,
    plan: Option<PaintPlan<'_>>,
    line_count: usize,
    command_sender: &Sender<ViewCommand>,
) {
    let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click());
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 0.0, ui.visuals().extreme_bg_color);
    paint_cached(&painter, rect, texture, plan);

    if response.clicked() {
        if let Some(pointer) = response.interact_pointer_pos() {
            let line = line_at_row(pointer.y - rect.top(), line_count, rect.height().max(0.0) as u32);
            let _ = command_sender.send(ViewCommand::GotoLine(line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn run_frame(mut draw: impl FnMut(&mut egui::Ui)) {
        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| draw(ui));
        });
    }

    #[test]
    fn test_menu_bar_draws_without_commands() {
        let (sender, receiver) = mpsc::channel();
        let mut state = AppState::new();

        run_frame(|ui| {
            egui::MenuBar::new().ui(ui, |ui| render_menu(ui, &mut state, &sender));
        });

        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_message_panel_draws_log() {
        let mut state = AppState::new();
        state.add_message("Explored lines 10..=20".to_string());
        state.add_message("Nothing left to explore".to_string());

        run_frame(|ui| render_messages(ui, &state));

        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(state_label(RenderState::Idle), "ready");
        assert_eq!(state_label(RenderState::RenderPending), "queued");
        assert_eq!(state_label(RenderState::Rendering), "rendering");
    }
}
