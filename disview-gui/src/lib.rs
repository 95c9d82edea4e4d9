use eframe::egui;

use disview_render::Settings;

pub mod app;
pub mod commands;
pub mod document;
pub mod listing_map;
pub mod state;
pub mod text_render;
pub mod text_view;
pub mod ui;

pub use app::DisviewApp;
pub use commands::ViewCommand;
pub use document::{ItemKind, ListingDocument, ListingItem};

pub fn run_gui(settings: Settings) -> i32 {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_title("Disview - Listing Viewer"),
        ..Default::default()
    };

    match eframe::run_native(
        "Disview",
        options,
        Box::new(move |_cc| Ok(Box::new(DisviewApp::new(settings)?))),
    ) {
        Ok(_) => 0,
        Err(e) => {
            log::error!("Error running GUI: {}", e);
            1
        }
    }
}
