//! Listing text view
//!
//! Blits the listing image rendered by the text view's worker and turns
//! keyboard, mouse and wheel input into [`ViewCommand`]s.

use eframe::egui;
use std::sync::mpsc::Sender;

use disview_render::{CursorCommand, CursorPosition, LineViewport, PaintPlan, Rgba};

use crate::commands::ViewCommand;
use crate::text_render::{TextMetrics, ADDRESS_COLUMNS};
use crate::ui;

pub fn to_color32(color: Rgba) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(color.r, color.g, color.b, color.a)
}

/// Cursor command bound to a key, if any
pub fn key_command(key: egui::Key, modifiers: egui::Modifiers) -> Option<CursorCommand> {
    let select = modifiers.shift;
    let command = match key {
        egui::Key::ArrowUp => CursorCommand::Up { select },
        egui::Key::ArrowDown => CursorCommand::Down { select },
        egui::Key::ArrowLeft => CursorCommand::Left { select },
        egui::Key::ArrowRight => CursorCommand::Right { select },
        egui::Key::PageUp => CursorCommand::PageUp { select },
        egui::Key::PageDown => CursorCommand::PageDown { select },
        egui::Key::Home if modifiers.command => CursorCommand::DocumentStart { select },
        egui::Key::End if modifiers.command => CursorCommand::DocumentEnd { select },
        egui::Key::Home => CursorCommand::LineStart { select },
        egui::Key::End => CursorCommand::LineEnd { select },
        _ => return None,
    };
    Some(command)
}

/// View command for a non-cursor input event, if any
pub fn event_command(event: &egui::Event) -> Option<ViewCommand> {
    match event {
        egui::Event::Copy => Some(ViewCommand::Copy),
        egui::Event::Key {
            key: egui::Key::Enter,
            pressed: true,
            ..
        } => Some(ViewCommand::FollowUnderCursor),
        egui::Event::Key {
            key,
            pressed: true,
            modifiers,
            ..
        } => key_command(*key, *modifiers).map(ViewCommand::Cursor),
        _ => None,
    }
}

/// Lines to scroll for a wheel movement of `delta_y` points
pub fn wheel_lines(delta_y: f32, line_height: f32) -> i64 {
    if line_height <= 0.0 {
        return 0;
    }
    -(delta_y / line_height).round() as i64
}

/// Listing position under a point given relative to the view's top left
pub fn position_at(x: f32, y: f32, viewport: &LineViewport, metrics: &TextMetrics) -> CursorPosition {
    let line = viewport.line_at(y);
    let column = ((x / metrics.char_width as f32).max(0.0) as usize).saturating_sub(ADDRESS_COLUMNS);
    CursorPosition::new(line, column)
}

/// Draw the cached listing and queue commands for this frame's input
pub fn show(
    ui: &mut egui::Ui,
    texture: Option<&egui::TextureHandle>,
    plan: Option<PaintPlan<'_>>,
    viewport: &LineViewport,
    metrics: &TextMetrics,
    command_sender: &Sender<ViewCommand>,
) -> egui::Response {
    let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());

    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 0.0, to_color32(metrics.background));
    ui::paint_cached(&painter, rect, texture, plan);

    handle_pointer(ui, &response, rect, viewport, metrics, command_sender);
    handle_keyboard(ui, &response, command_sender);

    response.context_menu(|ui| context_menu(ui, command_sender));
    response
}

fn context_menu(ui: &mut egui::Ui, command_sender: &Sender<ViewCommand>) {
    if ui.button("Copy").clicked() {
        let _ = command_sender.send(ViewCommand::Copy);
        ui.close();
    }
    if ui.button("Follow").clicked() {
        let _ = command_sender.send(ViewCommand::FollowUnderCursor);
        ui.close();
    }
    ui.separator();
    if ui.button("Back").clicked() {
        let _ = command_sender.send(ViewCommand::GoBack);
        ui.close();
    }
}

fn handle_pointer(
    ui: &egui::Ui,
    response: &egui::Response,
    rect: egui::Rect,
    viewport: &LineViewport,
    metrics: &TextMetrics,
    command_sender: &Sender<ViewCommand>,
) {
    if response.hovered() {
        let lines = wheel_lines(ui.input(|i| i.raw_scroll_delta.y), metrics.line_height as f32);
        if lines != 0 {
            let _ = command_sender.send(ViewCommand::Scroll(lines));
        }
    }

    // A right click moves the caret so the context menu acts on that word
    if !(response.clicked() || response.dragged() || response.secondary_clicked()) {
        return;
    }
    response.request_focus();

    let Some(pointer) = response.interact_pointer_pos() else {
        return;
    };
    let position = position_at(pointer.x - rect.left(), pointer.y - rect.top(), viewport, metrics);
    let select = if response.drag_started() || response.secondary_clicked() {
        false
    } else {
        response.dragged() || ui.input(|i| i.modifiers.shift)
    };

    let _ = command_sender.send(ViewCommand::Cursor(CursorCommand::Place { position, select }));
    if response.double_clicked() {
        let _ = command_sender.send(ViewCommand::FollowUnderCursor);
    }
}

fn handle_keyboard(ui: &egui::Ui, response: &egui::Response, command_sender: &Sender<ViewCommand>) {
    if response.has_focus() {
        ui.memory_mut(|m| {
            m.set_focus_lock_filter(
                response.id,
                egui::EventFilter {
                    tab: false,
                    horizontal_arrows: true,
                    vertical_arrows: true,
                    escape: false,
                },
            )
        });
    } else if ui.ctx().wants_keyboard_input() {
        // Another widget (the goto field) owns the keyboard
        return;
    }

    let commands: Vec<ViewCommand> = ui.input(|i| i.events.iter().filter_map(event_command).collect());
    for command in commands {
        let _ = command_sender.send(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disview_render::Settings;

    #[test]
    fn test_key_bindings() {
        let none = egui::Modifiers::NONE;
        assert_eq!(
            key_command(egui::Key::ArrowDown, none),
            Some(CursorCommand::Down { select: false })
        );
        assert_eq!(
            key_command(egui::Key::ArrowUp, egui::Modifiers::SHIFT),
            Some(CursorCommand::Up { select: true })
        );
        assert_eq!(
            key_command(egui::Key::Home, none),
            Some(CursorCommand::LineStart { select: false })
        );
        assert_eq!(
            key_command(egui::Key::End, egui::Modifiers::COMMAND),
            Some(CursorCommand::DocumentEnd { select: false })
        );
        assert_eq!(key_command(egui::Key::A, none), None);
    }

    #[test]
    fn test_copy_and_follow_events() {
        let enter = egui::Event::Key {
            key: egui::Key::Enter,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers: egui::Modifiers::NONE,
        };
        let down = egui::Event::Key {
            key: egui::Key::ArrowDown,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers: egui::Modifiers::SHIFT,
        };

        assert_eq!(event_command(&egui::Event::Copy), Some(ViewCommand::Copy));
        assert_eq!(event_command(&enter), Some(ViewCommand::FollowUnderCursor));
        assert_eq!(
            event_command(&down),
            Some(ViewCommand::Cursor(CursorCommand::Down { select: true }))
        );
        assert_eq!(event_command(&egui::Event::Cut), None);
    }

    #[test]
    fn test_position_skips_address_gutter() {
        let metrics = TextMetrics::from_settings(&Settings::default());
        let mut viewport = LineViewport::new(metrics.line_height);
        viewport.set_height(18 * 10);
        viewport.scroll_to_line(5, 100);

        assert_eq!(position_at(3.0, 40.0, &viewport, &metrics), CursorPosition::new(7, 0));
        assert_eq!(
            position_at(metrics.text_left() as f32 + 8.0 * 4.5, 0.0, &viewport, &metrics),
            CursorPosition::new(5, 4)
        );
    }

    #[test]
    fn test_wheel_lines() {
        assert_eq!(wheel_lines(-54.0, 18.0), 3);
        assert_eq!(wheel_lines(36.0, 18.0), -2);
        assert_eq!(wheel_lines(4.0, 18.0), 0);
        assert_eq!(wheel_lines(10.0, 0.0), 0);
    }

    #[test]
    fn test_color_conversion() {
        assert_eq!(to_color32(Rgba::rgb(1, 2, 3)), egui::Color32::from_rgb(1, 2, 3));
    }
}
