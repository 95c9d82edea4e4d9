//! Listing text rendering
//!
//! The text view is a [`RenderConsumerView`]: the visible lines, plus an
//! overscan band above and below, are drawn into an image on the render
//! worker and the UI thread only blits the cached texture. Glyphs are
//! rasterized once with fontdue from the bundled monospace font.

use disview_render::{
    format_address, ContentSource, Cursor, CursorPosition, Priority, RenderConsumerView, RenderContext, RenderError,
    RenderedImage, Rgba, Settings, Size, Viewport,
};

use crate::document::{ItemKind, ListingDocument};

/// Columns taken by the address gutter, gap included
pub const ADDRESS_COLUMNS: usize = 10;

/// Lines rendered beyond each edge of the viewport
pub const OVERSCAN_LINES: u32 = 32;

/// Lines drawn between two cancellation checks
const CANCEL_CHECK_LINES: usize = 16;

const ADDRESS_COLOR: Rgba = Rgba::rgb(130, 130, 130);
const CURSOR_LINE_COLOR: Rgba = Rgba::rgb(45, 45, 55);
const SELECTION_COLOR: Rgba = Rgba::rgb(50, 80, 120);
const CARET_COLOR: Rgba = Rgba::WHITE;

/// Cell metrics of the listing grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMetrics {
    pub line_height: u32,
    pub char_width: u32,
    pub background: Rgba,
}

impl TextMetrics {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            line_height: settings.view.line_height.max(1),
            char_width: settings.view.char_width.max(1),
            background: settings.view.background,
        }
    }

    /// Left edge of the text column, in pixels
    pub fn text_left(&self) -> u32 {
        ADDRESS_COLUMNS as u32 * self.char_width
    }
}

pub fn kind_color(kind: ItemKind) -> Rgba {
    match kind {
        ItemKind::Segment => Rgba::rgb(220, 220, 220),
        ItemKind::Function => Rgba::rgb(255, 190, 90),
        ItemKind::Code => Rgba::rgb(150, 190, 255),
        ItemKind::Data => Rgba::rgb(200, 150, 230),
        ItemKind::Text => Rgba::rgb(120, 210, 140),
        ItemKind::Unexplored => Rgba::rgb(110, 110, 110),
    }
}

struct Glyph {
    xmin: i32,
    ymin: i32,
    width: usize,
    height: usize,
    coverage: Vec<u8>,
}

/// Printable ASCII rasterized for one cell size
pub struct GlyphSet {
    glyphs: Vec<Glyph>,
    /// Distance from the top of a line to the baseline
    baseline: i64,
    char_width: u32,
}

impl GlyphSet {
    const FIRST: char = ' ';
    const LAST: char = '~';

    /// Rasterize `font` so one glyph fills a `char_width` wide cell
    pub fn new(font: &[u8], char_width: u32, line_height: u32) -> Result<Self, RenderError> {
        let font = fontdue::Font::from_bytes(font, fontdue::FontSettings::default())
            .map_err(|e| RenderError::Font(e.to_string()))?;

        let unit = font.metrics('M', 1.0).advance_width;
        if unit <= 0.0 {
            return Err(RenderError::Font("font has no advance for 'M'".to_string()));
        }
        let px = (char_width as f32 / unit).min(line_height as f32);

        let baseline = match font.horizontal_line_metrics(px) {
            Some(line) => ((line_height as f32 - (line.ascent - line.descent)) / 2.0 + line.ascent).round(),
            None => (px * 0.8).round(),
        } as i64;

        let glyphs = (Self::FIRST..=Self::LAST)
            .map(|c| {
                let (metrics, coverage) = font.rasterize(c, px);
                Glyph {
                    xmin: metrics.xmin,
                    ymin: metrics.ymin,
                    width: metrics.width,
                    height: metrics.height,
                    coverage,
                }
            })
            .collect();

        log::debug!("Rasterized listing glyphs at {:.1}px, baseline {}", px, baseline);
        Ok(Self {
            glyphs,
            baseline,
            char_width,
        })
    }

    fn glyph(&self, c: char) -> &Glyph {
        let c = if (Self::FIRST..=Self::LAST).contains(&c) { c } else { '?' };
        &self.glyphs[c as usize - Self::FIRST as usize]
    }

    /// Draw `text` on the grid with its first cell at `x`, line top at `top`
    fn draw(&self, image: &mut RenderedImage, x: i64, top: i64, text: &str, color: Rgba) {
        let baseline = top + self.baseline;
        for (column, c) in text.chars().enumerate() {
            let glyph = self.glyph(c);
            let left = x + column as i64 * self.char_width as i64 + glyph.xmin as i64;
            let upper = baseline - (glyph.height as i64 + glyph.ymin as i64);

            for (row, coverage) in glyph.coverage.chunks(glyph.width.max(1)).enumerate() {
                let y = upper + row as i64;
                if y < 0 {
                    continue;
                }
                for (dx, alpha) in coverage.iter().enumerate() {
                    let px = left + dx as i64;
                    if *alpha > 0 && px >= 0 {
                        image.blend_pixel(px as u32, y as u32, color, *alpha);
                    }
                }
            }
        }
    }
}

/// One listing line copied off the document
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub line: usize,
    pub address: u64,
    pub kind: ItemKind,
    pub text: String,
}

/// Everything a text render needs
#[derive(Debug, Clone, PartialEq)]
pub struct TextSnapshot {
    pub lines: Vec<TextLine>,
    /// Content y of the image's first row
    pub top: i64,
    pub cursor: CursorPosition,
    pub selection: Option<(CursorPosition, CursorPosition)>,
    pub metrics: TextMetrics,
}

/// Content source pairing the document with the cursor
pub struct ListingTextSource<'a> {
    pub document: &'a ListingDocument,
    pub cursor: &'a Cursor,
    pub metrics: TextMetrics,
    /// Width of the text view; the listing never scrolls sideways
    pub width: u32,
}

impl ContentSource for ListingTextSource<'_> {
    type Snapshot = TextSnapshot;

    /// One spare line so a partially visible last row can be scrolled in
    fn extent(&self) -> Size {
        let lines = self.document.len() as u64 + 1;
        let height = (lines * self.metrics.line_height as u64).min(u32::MAX as u64) as u32;
        Size::new(self.width, height)
    }

    fn snapshot(&self, viewport: &Viewport) -> TextSnapshot {
        let line_height = self.metrics.line_height as i64;
        let first = (viewport.offset.y.max(0) / line_height) as usize;
        let bottom = viewport.offset.y + viewport.size.height as i64;
        let end = ((bottom + line_height - 1) / line_height).max(0) as usize;

        let lines = (first..end.min(self.document.len()))
            .filter_map(|line| {
                self.document.item(line).map(|item| TextLine {
                    line,
                    address: item.address,
                    kind: item.kind,
                    text: item.text.clone(),
                })
            })
            .collect();

        TextSnapshot {
            lines,
            top: viewport.offset.y,
            cursor: self.cursor.position(),
            selection: self.cursor.selection(),
            metrics: self.metrics,
        }
    }
}

/// Vertical span of `line` inside an image whose first row is content `top`
fn line_rows(line: usize, snapshot: &TextSnapshot, height: u32) -> Option<(u32, u32)> {
    let line_height = snapshot.metrics.line_height as i64;
    let top = line as i64 * line_height - snapshot.top;
    let bottom = (top + line_height).min(height as i64);
    let top = top.max(0);
    (top < bottom).then_some((top as u32, (bottom - top) as u32))
}

/// Draw the lines of `snapshot` into `image`.
///
/// Runs on the render worker and stops early once cancelled.
pub fn render_listing_text(ctx: &RenderContext, snapshot: &TextSnapshot, glyphs: &GlyphSet, image: &mut RenderedImage) {
    let metrics = &snapshot.metrics;
    let (width, height) = (image.width(), image.height());
    let text_left = metrics.text_left();
    image.fill(metrics.background);

    for (index, line) in snapshot.lines.iter().enumerate() {
        if index % CANCEL_CHECK_LINES == 0 && ctx.cancel.is_cancelled() {
            log::trace!("Listing text render {} cancelled at line {}", ctx.sequence, line.line);
            return;
        }
        let Some((row, rows)) = line_rows(line.line, snapshot, height) else {
            continue;
        };

        if line.line == snapshot.cursor.line {
            image.fill_rect(0, row, width, rows, CURSOR_LINE_COLOR);
        }

        if let Some((start, end)) = snapshot.selection {
            if (start.line..=end.line).contains(&line.line) {
                let from = if line.line == start.line { start.column } else { 0 };
                let to = if line.line == end.line {
                    end.column
                } else {
                    line.text.chars().count() + 1
                };
                image.fill_rect(
                    text_left + from as u32 * metrics.char_width,
                    row,
                    to.saturating_sub(from) as u32 * metrics.char_width,
                    rows,
                    SELECTION_COLOR,
                );
            }
        }

        let top = line.line as i64 * metrics.line_height as i64 - snapshot.top;
        glyphs.draw(image, 0, top, &format_address(line.address, 8), ADDRESS_COLOR);
        glyphs.draw(image, text_left as i64, top, &line.text, kind_color(line.kind));
    }

    let cursor = snapshot.cursor;
    if let Some((row, rows)) = snapshot
        .lines
        .iter()
        .any(|line| line.line == cursor.line)
        .then(|| line_rows(cursor.line, snapshot, height))
        .flatten()
    {
        image.fill_rect(text_left + cursor.column as u32 * metrics.char_width, row, 2, rows, CARET_COLOR);
    }
}

pub type ListingTextView = RenderConsumerView<TextSnapshot>;

/// Create the text view with its worker and glyphs
pub fn create_listing_text(settings: &Settings) -> disview_render::Result<ListingTextView> {
    let metrics = TextMetrics::from_settings(settings);
    let glyphs = GlyphSet::new(epaint_default_fonts::HACK_REGULAR, metrics.char_width, metrics.line_height)?;

    let mut options = settings.view_options("text");
    options.priority = Priority::High;
    options.overscan = Size::new(0, OVERSCAN_LINES * metrics.line_height);

    RenderConsumerView::new(options, move |ctx: &RenderContext, snapshot: &TextSnapshot, image: &mut RenderedImage| {
        render_listing_text(ctx, snapshot, &glyphs, image)
    })
}
