/// Main application logic and coordination
///
/// This module contains the DisviewApp struct. It owns the listing document,
/// the cursor and the two render consumer views (listing text and listing
/// map), applies queued commands and keeps both views in step through the
/// event bus.
use eframe::egui;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use disview_render::{
    format_address, Cursor, CursorCommand, CursorPosition, EventBus, LineViewport, Point, RenderError, RenderState,
    RenderedImage, Settings, Size, SubscriptionId, Topic, ViewEvent,
};

use crate::commands::ViewCommand;
use crate::document::ListingDocument;
use crate::listing_map::{create_listing_map, ListingMapSource, ListingMapView, MapPalette};
use crate::state::AppState;
use crate::text_render::{create_listing_text, ListingTextSource, ListingTextView, TextMetrics};
use crate::text_view;
use crate::ui;

/// Address of the first listing item
pub const BASE_ADDRESS: u64 = 0x401000;

/// Unexplored items converted per explore step
pub const EXPLORE_BATCH: usize = 256;

/// Id used for this app's listing view in published events
const LISTING_VIEW: u64 = 1;

/// Frame interval while a view has work in flight
const RENDER_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Main application struct that coordinates all components
pub struct DisviewApp {
    settings: Settings,
    document: ListingDocument,
    cursor: Cursor,
    viewport: LineViewport,

    /// Listing text, rendered off the UI thread like the map
    listing_text: ListingTextView,
    text_texture: Option<egui::TextureHandle>,
    text_metrics: TextMetrics,
    text_dirty: Arc<AtomicBool>,

    /// Listing map and the texture holding its last image
    listing_map: ListingMapView,
    map_texture: Option<egui::TextureHandle>,
    map_palette: MapPalette,
    /// Set by bus callbacks, consumed once per frame
    map_dirty: Arc<AtomicBool>,
    /// Visible lines the map was last rendered for
    map_visible: (usize, usize),

    bus: EventBus,
    subscriptions: Vec<SubscriptionId>,
    history: Arc<Mutex<(bool, bool)>>,

    command_sender: Sender<ViewCommand>,
    command_receiver: Receiver<ViewCommand>,

    state: AppState,
}

impl DisviewApp {
    /// Create the app and start the listing map worker
    pub fn new(settings: Settings) -> Result<Self, RenderError> {
        let bus = EventBus::new();
        let document = ListingDocument::sample(settings.document.lines, BASE_ADDRESS, bus.clone());
        let listing_text = create_listing_text(&settings)?;
        let listing_map = create_listing_map(&settings)?;
        let (command_sender, command_receiver) = mpsc::channel();

        let map_dirty = Arc::new(AtomicBool::new(true));
        let text_dirty = Arc::new(AtomicBool::new(false));
        let history = Arc::new(Mutex::new((false, false)));
        let mut subscriptions = Vec::new();

        for topic in [Topic::DocumentChanged, Topic::CursorMoved] {
            let map = map_dirty.clone();
            let text = text_dirty.clone();
            subscriptions.push(bus.subscribe(topic, move |_| {
                map.store(true, Ordering::Release);
                text.store(true, Ordering::Release);
            }));
        }

        let stack = history.clone();
        subscriptions.push(bus.subscribe(Topic::SurfaceStackChanged, move |event| {
            if let ViewEvent::SurfaceStackChanged {
                can_go_back,
                can_go_forward,
                ..
            } = event
            {
                *stack.lock().unwrap_or_else(PoisonError::into_inner) = (*can_go_back, *can_go_forward);
            }
        }));

        info!(
            "Listing with {} items at {}",
            document.len(),
            format_address(BASE_ADDRESS, 8)
        );

        Ok(Self {
            viewport: LineViewport::new(settings.view.line_height),
            map_palette: MapPalette::with_background(settings.view.background),
            text_metrics: TextMetrics::from_settings(&settings),
            settings,
            document,
            cursor: Cursor::new(),
            listing_text,
            text_texture: None,
            text_dirty,
            listing_map,
            map_texture: None,
            map_dirty,
            map_visible: (0, 0),
            bus,
            subscriptions,
            history,
            command_sender,
            command_receiver,
            state: AppState::new(),
        })
    }

    pub fn command_sender(&self) -> Sender<ViewCommand> {
        self.command_sender.clone()
    }

    pub fn document(&self) -> &ListingDocument {
        &self.document
    }

    pub fn cursor_position(&self) -> CursorPosition {
        self.cursor.position()
    }

    pub fn viewport(&self) -> &LineViewport {
        &self.viewport
    }

    pub fn listing_text(&self) -> &ListingTextView {
        &self.listing_text
    }

    pub fn listing_map(&self) -> &ListingMapView {
        &self.listing_map
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Set the height of the text view in pixels
    pub fn set_view_height(&mut self, height: u32) {
        self.viewport.set_height(height);
    }

    /// Apply every queued command
    pub fn process_commands(&mut self) {
        while let Ok(command) = self.command_receiver.try_recv() {
            self.apply_command(command);
        }
    }

    pub fn apply_command(&mut self, command: ViewCommand) {
        debug!("Applying {:?}", command);
        match command {
            ViewCommand::Cursor(command) => self.move_cursor(command),
            ViewCommand::GotoAddress(address) => match self.document.find_address(address) {
                Some(line) => {
                    self.move_cursor(CursorCommand::Goto(line));
                    self.state.status = format!("Jumped to {}", format_address(address, 8));
                }
                None => self
                    .state
                    .set_error(format!("Address {} is outside the listing", format_address(address, 8))),
            },
            ViewCommand::GotoLine(line) => self.move_cursor(CursorCommand::Goto(line)),
            ViewCommand::GoBack => {
                if self.cursor.go_back() {
                    self.cursor_moved();
                }
            }
            ViewCommand::GoForward => {
                if self.cursor.go_forward() {
                    self.cursor_moved();
                }
            }
            ViewCommand::Scroll(lines) => {
                self.viewport.scroll_lines(lines, self.document.len());
            }
            ViewCommand::Copy => self.copy_selection(),
            ViewCommand::FollowUnderCursor => self.follow_operand(),
            ViewCommand::ExploreNext => match self.document.explore_next(EXPLORE_BATCH) {
                Some(range) => self
                    .state
                    .add_message(format!("Explored lines {}..={}", range.start(), range.end())),
                None => self.state.add_message("Nothing left to explore".to_string()),
            },
            ViewCommand::ToggleListingMap => {
                self.state.show_listing_map = !self.state.show_listing_map;
                self.map_dirty.store(true, Ordering::Release);
            }
            ViewCommand::ToggleMessages => self.state.show_messages = !self.state.show_messages,
        }
    }

    fn copy_selection(&mut self) {
        let position = self.cursor.position();
        let text = match self.cursor.selection() {
            Some((start, end)) => self.document.selection_text(start, end),
            None => self.document.line_text(position.line).to_string(),
        };
        self.state.status = format!("Copied {} characters", text.chars().count());
        self.state.clipboard = Some(text);
    }

    fn follow_operand(&mut self) {
        let Some(address) = self.document.operand_address(self.cursor.position()) else {
            self.state.add_message("No address under the cursor".to_string());
            return;
        };
        match self.document.line_of_address(address) {
            Some(line) => {
                self.move_cursor(CursorCommand::Goto(line));
                self.state.status = format!("Followed {}", format_address(address, 8));
            }
            None => self
                .state
                .add_message(format!("No item starts at {}", format_address(address, 8))),
        }
    }

    fn move_cursor(&mut self, command: CursorCommand) {
        let page = self.viewport.visible_lines();
        if self.cursor.apply(command, &self.document, page) {
            self.cursor_moved();
        }
    }

    fn cursor_moved(&mut self) {
        let position = self.cursor.position();
        self.viewport.ensure_visible(position.line, self.document.len());

        self.bus.publish(&ViewEvent::CursorMoved {
            view: LISTING_VIEW,
            position,
        });
        self.bus.publish(&ViewEvent::SurfaceStackChanged {
            view: LISTING_VIEW,
            can_go_back: self.cursor.can_go_back(),
            can_go_forward: self.cursor.can_go_forward(),
        });
    }

    /// Bring the map up to date for a dock of `size` pixels.
    ///
    /// Schedules at most one render per call; nothing is scheduled when the
    /// size, the document, the cursor and the visible lines are unchanged.
    pub fn refresh_listing_map(&mut self, size: Size) {
        let visible = (self.viewport.first_visible_line(), self.viewport.last_visible_line());
        if visible != self.map_visible {
            self.map_visible = visible;
            self.map_dirty.store(true, Ordering::Release);
        }

        let source = ListingMapSource {
            document: &self.document,
            first_visible: visible.0,
            last_visible: visible.1,
            cursor_line: self.cursor.position().line,
            palette: self.map_palette,
            size,
        };

        // The strip is stretched to the dock, so any resize needs a new image
        let result = if size != self.listing_map.viewport().size {
            self.map_dirty.store(false, Ordering::Release);
            match self.listing_map.resize(size, &source) {
                Ok(true) => Ok(()),
                Ok(false) => self.listing_map.invalidate(&source).map(|_| ()),
                Err(e) => Err(e),
            }
        } else if self.map_dirty.swap(false, Ordering::AcqRel) {
            self.listing_map.invalidate(&source).map(|_| ())
        } else {
            return;
        };

        if let Err(e) = result {
            self.state.set_error(format!("Listing map: {}", e));
        }
    }

    /// Bring the text view up to date for an area of `size` pixels.
    ///
    /// Scrolling inside the cached band only moves the blit. A render is
    /// scheduled when the cursor or document changed, the view grew, or the
    /// visible lines left the cached band.
    pub fn refresh_listing_text(&mut self, size: Size) {
        let source = ListingTextSource {
            document: &self.document,
            cursor: &self.cursor,
            metrics: self.text_metrics,
            width: size.width,
        };

        let mut result = Ok(());
        if size != self.listing_text.viewport().size {
            result = self.listing_text.resize(size, &source).map(|_| ());
        }

        let top = self.viewport.first_visible_line() as i64 * self.text_metrics.line_height as i64;
        self.listing_text.scroll_to(Point::new(0, top));

        let dirty = self.text_dirty.swap(false, Ordering::AcqRel);
        if result.is_ok() && (dirty || self.listing_text.is_stale()) {
            result = self.listing_text.invalidate(&source).map(|_| ());
        }

        if let Err(e) = result {
            self.state.set_error(format!("Listing view: {}", e));
        }
    }

    /// Receive finished text renders. Returns `true` if the image changed.
    pub fn pump_listing_text(&mut self) -> bool {
        let changed = self.listing_text.pump();
        self.state.text_state = self.listing_text.state();
        changed
    }

    /// Receive finished map renders. Returns `true` if the image changed.
    pub fn pump_listing_map(&mut self) -> bool {
        let changed = self.listing_map.pump();
        self.state.map_state = self.listing_map.state();
        changed
    }

    fn show_listing_text(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        self.viewport.set_height(available.y.max(0.0) as u32);
        self.refresh_listing_text(Size::new(available.x.max(0.0) as u32, available.y.max(0.0) as u32));
        text_view::show(
            ui,
            self.text_texture.as_ref(),
            self.listing_text.paint(),
            &self.viewport,
            &self.text_metrics,
            &self.command_sender,
        );
    }

    fn show_listing_map(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        self.refresh_listing_map(Size::new(available.x.max(0.0) as u32, available.y.max(0.0) as u32));
        ui::render_listing_map(
            ui,
            self.map_texture.as_ref(),
            self.listing_map.paint(),
            self.document.len(),
            &self.command_sender,
        );
    }
}

impl eframe::App for DisviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_commands();
        if let Some(text) = self.state.clipboard.take() {
            ctx.copy_text(text);
        }

        if self.pump_listing_text() {
            upload_texture(ctx, &mut self.text_texture, "listing-text", self.listing_text.cached_image());
        }
        if self.pump_listing_map() {
            upload_texture(ctx, &mut self.map_texture, "listing-map", self.listing_map.cached_image());
        }
        let (can_go_back, can_go_forward) = *self.history.lock().unwrap_or_else(PoisonError::into_inner);
        self.state.can_go_back = can_go_back;
        self.state.can_go_forward = can_go_forward;

        ui::render_error_banner(ctx, &mut self.state);

        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui::render_menu(ui, &mut self.state, &self.command_sender);
            });
        });

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui::render_toolbar(ui, &mut self.state, &self.command_sender);
        });

        let position = self.cursor.position();
        let address = self.document.item(position.line).map(|item| item.address);
        let text_stats = self.listing_text.stats();
        let map_stats = self.listing_map.stats();
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui::render_status_bar(ui, &self.state, position, address, text_stats, map_stats);
        });

        if self.state.show_messages {
            egui::TopBottomPanel::bottom("messages")
                .resizable(true)
                .default_height(140.0)
                .show(ctx, |ui| ui::render_messages(ui, &self.state));
        }

        if self.state.show_listing_map {
            egui::SidePanel::right("listing_map")
                .exact_width(self.settings.view.map_width as f32)
                .resizable(false)
                .show(ctx, |ui| self.show_listing_map(ui));
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.show_listing_text(ui));

        let visible = (self.viewport.first_visible_line(), self.viewport.last_visible_line());
        let map_stale = visible != self.map_visible || self.map_dirty.load(Ordering::Acquire);
        let text_stale = self.text_dirty.load(Ordering::Acquire) || self.listing_text.is_stale();
        if text_stale || (self.state.show_listing_map && map_stale) {
            ctx.request_repaint();
        } else if self.state.text_state != RenderState::Idle || self.state.map_state != RenderState::Idle {
            ctx.request_repaint_after(RENDER_POLL_INTERVAL);
        }
    }
}

impl Drop for DisviewApp {
    fn drop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
        self.listing_text.close();
        self.listing_map.close();
        debug!("DisviewApp closed");
    }
}

/// Copy a view's cached image into its texture, creating it on first use
fn upload_texture(
    ctx: &egui::Context,
    texture: &mut Option<egui::TextureHandle>,
    name: &str,
    image: Option<&RenderedImage>,
) {
    let Some(image) = image.filter(|image| !image.is_empty()) else {
        return;
    };

    let size = [image.width() as usize, image.height() as usize];
    let pixels = egui::ColorImage::from_rgba_unmultiplied(size, &image.to_rgba_bytes());
    match texture {
        Some(texture) => texture.set(pixels, egui::TextureOptions::NEAREST),
        None => *texture = Some(ctx.load_texture(name, pixels, egui::TextureOptions::NEAREST)),
    }
}
