//! Listing map
//!
//! A narrow strip that shows the whole listing at once, one colour per
//! item kind, with the visible range and the cursor marked. The strip is
//! drawn off the UI thread by a [`RenderConsumerView`] and only re-rendered
//! when the document, the visible range or the cursor line changes.

use disview_render::{
    ContentSource, RenderConsumerView, RenderContext, RenderedImage, Rgba, Settings, Size, Viewport,
};

use crate::document::{ItemKind, ListingDocument};

/// Rows drawn between two cancellation checks
const CANCEL_CHECK_ROWS: u32 = 64;

/// Colours used by the map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapPalette {
    pub background: Rgba,
    pub segment: Rgba,
    pub function: Rgba,
    pub code: Rgba,
    pub data: Rgba,
    pub text: Rgba,
    pub unexplored: Rgba,
    pub visible_range: Rgba,
    pub cursor: Rgba,
}

impl MapPalette {
    pub fn with_background(background: Rgba) -> Self {
        Self {
            background,
            ..Self::default()
        }
    }

    pub fn color(&self, kind: ItemKind) -> Rgba {
        match kind {
            ItemKind::Segment => self.segment,
            ItemKind::Function => self.function,
            ItemKind::Code => self.code,
            ItemKind::Data => self.data,
            ItemKind::Text => self.text,
            ItemKind::Unexplored => self.unexplored,
        }
    }
}

impl Default for MapPalette {
    fn default() -> Self {
        Self {
            background: Rgba::rgb(30, 30, 30),
            segment: Rgba::rgb(200, 200, 200),
            function: Rgba::rgb(255, 170, 60),
            code: Rgba::rgb(70, 130, 220),
            data: Rgba::rgb(170, 110, 200),
            text: Rgba::rgb(90, 190, 110),
            unexplored: Rgba::rgb(80, 80, 80),
            visible_range: Rgba::WHITE,
            cursor: Rgba::rgb(255, 60, 60),
        }
    }
}

/// Everything the map render needs, copied off the document
#[derive(Debug, Clone, PartialEq)]
pub struct MapSnapshot {
    pub kinds: Vec<ItemKind>,
    pub first_visible: usize,
    pub last_visible: usize,
    pub cursor_line: usize,
    pub palette: MapPalette,
}

/// Content source pairing the document with the text view's state
pub struct ListingMapSource<'a> {
    pub document: &'a ListingDocument,
    pub first_visible: usize,
    pub last_visible: usize,
    pub cursor_line: usize,
    pub palette: MapPalette,
    /// Size of the map dock; the map never scrolls
    pub size: Size,
}

impl ContentSource for ListingMapSource<'_> {
    type Snapshot = MapSnapshot;

    fn extent(&self) -> Size {
        self.size
    }

    fn snapshot(&self, _viewport: &Viewport) -> MapSnapshot {
        MapSnapshot {
            kinds: self.document.kinds(),
            first_visible: self.first_visible,
            last_visible: self.last_visible,
            cursor_line: self.cursor_line,
            palette: self.palette,
        }
    }
}

/// Pixel row that item `line` maps to on a strip `height` pixels tall
pub fn row_of_line(line: usize, line_count: usize, height: u32) -> u32 {
    if line_count == 0 {
        return 0;
    }
    ((line as u64 * height as u64) / line_count as u64).min(height.saturating_sub(1) as u64) as u32
}

/// Draw the map for `snapshot` into `image`.
///
/// Runs on the render worker. Returns early, leaving a partial image, if
/// the render is cancelled.
pub fn render_listing_map(ctx: &RenderContext, snapshot: &MapSnapshot, image: &mut RenderedImage) {
    let palette = &snapshot.palette;
    let (width, height) = (image.width(), image.height());
    let count = snapshot.kinds.len();

    image.fill(palette.background);
    if count == 0 {
        return;
    }

    for y in 0..height {
        if y % CANCEL_CHECK_ROWS == 0 && ctx.cancel.is_cancelled() {
            log::trace!("Listing map render {} cancelled at row {}", ctx.sequence, y);
            return;
        }
        let line = (y as u64 * count as u64 / height as u64) as usize;
        image.fill_rect(0, y, width, 1, palette.color(snapshot.kinds[line.min(count - 1)]));
    }

    // Visible range as a frame
    let top = row_of_line(snapshot.first_visible, count, height);
    let bottom = row_of_line(snapshot.last_visible + 1, count, height).max(top + 1);
    image.fill_rect(0, top, width, 1, palette.visible_range);
    image.fill_rect(0, bottom, width, 1, palette.visible_range);
    image.fill_rect(0, top, 2, bottom - top + 1, palette.visible_range);
    image.fill_rect(width.saturating_sub(2), top, 2, bottom - top + 1, palette.visible_range);

    let cursor = row_of_line(snapshot.cursor_line, count, height);
    image.fill_rect(0, cursor, width, 2, palette.cursor);
}

/// Line under a click at `y` pixels from the top of the map
pub fn line_at_row(y: f32, line_count: usize, height: u32) -> usize {
    if line_count == 0 || height == 0 {
        return 0;
    }
    let y = y.clamp(0.0, height as f32 - 1.0) as u64;
    ((y * line_count as u64) / height as u64) as usize
}

pub type ListingMapView = RenderConsumerView<MapSnapshot>;

/// Create the map view with its worker
pub fn create_listing_map(settings: &Settings) -> disview_render::Result<ListingMapView> {
    RenderConsumerView::new(settings.view_options("map"), render_listing_map)
}
