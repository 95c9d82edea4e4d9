//! Cached render consumer
//!
//! A scrollable viewport that keeps the most recently delivered image and
//! repaints from it. Scrolling and shrinking only move the blit rectangle;
//! a new render is requested when the content changes or the viewport grows
//! past what the cache covers.

use std::collections::BTreeMap;

use crate::renderer::{
    AsyncRenderer, CompletionReceiver, RenderContext, RenderStatus, RenderStats, RendererOptions, WakeState,
};
use crate::types::{Point, Priority, Rect, RenderedImage, Size};
use crate::Result;

/// Content that can be rendered by a [`RenderConsumerView`]
pub trait ContentSource {
    /// Owned copy of whatever the render operation needs
    type Snapshot: Send + Sync + 'static;

    /// Total size of the content in pixels
    fn extent(&self) -> Size;

    /// Capture the content visible through `viewport`
    fn snapshot(&self, viewport: &Viewport) -> Self::Snapshot;
}

/// Visible window onto the content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    /// Top-left corner in content coordinates
    pub offset: Point,
    pub size: Size,
}

impl Viewport {
    pub fn new(offset: Point, size: Size) -> Self {
        Self { offset, size }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.offset, self.size)
    }
}

/// Render cycle of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    RenderPending,
    Rendering,
}

/// How to put the cached image on screen for the current viewport
#[derive(Debug)]
pub struct PaintPlan<'a> {
    pub image: &'a RenderedImage,
    /// Region of `image` to copy
    pub source: Rect,
    /// Where the region lands, in viewport coordinates
    pub target: Point,
    /// Part of the viewport is not covered by the cache
    pub uncovered: bool,
}

#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub renderer: RendererOptions,
    pub priority: Priority,
    /// Extra pixels rendered on each side of the viewport, clamped to the
    /// content extent, so short scrolls stay inside the cache
    pub overscan: Size,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            renderer: RendererOptions::default(),
            priority: Priority::Normal,
            overscan: Size::default(),
        }
    }
}

struct CachedImage {
    image: RenderedImage,
    origin: Point,
    sequence: u64,
}

/// Scrollable view backed by an [`AsyncRenderer`]
pub struct RenderConsumerView<S> {
    renderer: AsyncRenderer<S>,
    completions: CompletionReceiver,
    viewport: Viewport,
    extent: Size,
    priority: Priority,
    overscan: Size,
    /// Region each outstanding request covers, by sequence
    requested: BTreeMap<u64, Rect>,
    /// Offset of the newest delivered request, reused by predicate re-renders
    last_origin: Option<(u64, Point)>,
    cache: Option<CachedImage>,
    closed: bool,
}

impl<S> RenderConsumerView<S>
where
    S: Send + Sync + 'static,
{
    /// Create a view whose content is drawn by `render`
    pub fn new<F>(options: ViewOptions, render: F) -> Result<Self>
    where
        F: Fn(&RenderContext, &S, &mut RenderedImage) + Send + Sync + 'static,
    {
        let (priority, overscan) = (options.priority, options.overscan);
        let spawned = AsyncRenderer::spawn(options.renderer, render)?;
        Ok(Self::from_renderer(spawned, priority, overscan))
    }

    /// Create a view whose worker also wakes when `predicate` holds.
    ///
    /// A predicate wake re-renders the last requested snapshot at the
    /// offset it was requested for. Call [`RenderConsumerView::wake`] after
    /// arming the predicate's trigger.
    pub fn with_wake_predicate<F, P>(options: ViewOptions, render: F, predicate: P) -> Result<Self>
    where
        F: Fn(&RenderContext, &S, &mut RenderedImage) + Send + Sync + 'static,
        P: Fn(&WakeState) -> bool + Send + Sync + 'static,
    {
        let (priority, overscan) = (options.priority, options.overscan);
        let spawned = AsyncRenderer::spawn_with_predicate(options.renderer, render, predicate)?;
        Ok(Self::from_renderer(spawned, priority, overscan))
    }

    fn from_renderer(
        (renderer, completions): (AsyncRenderer<S>, CompletionReceiver),
        priority: Priority,
        overscan: Size,
    ) -> Self {
        Self {
            renderer,
            completions,
            viewport: Viewport::default(),
            extent: Size::default(),
            priority,
            overscan,
            requested: BTreeMap::new(),
            last_origin: None,
            cache: None,
            closed: false,
        }
    }

    /// Ask for a fresh render of `source` at the current viewport.
    ///
    /// Returns immediately. Calls made while a render is pending or running
    /// collapse into one more render.
    pub fn invalidate<D>(&mut self, source: &D) -> Result<u64>
    where
        D: ContentSource<Snapshot = S>,
    {
        self.invalidate_with_priority(source, self.priority)
    }

    pub fn invalidate_with_priority<D>(&mut self, source: &D, priority: Priority) -> Result<u64>
    where
        D: ContentSource<Snapshot = S>,
    {
        self.extent = source.extent();
        self.viewport.offset = self.clamp_offset(self.viewport.offset);

        let region = self.render_region();
        let snapshot = source.snapshot(&Viewport::new(region.origin, region.size));
        let sequence = self.renderer.schedule(priority, region.size, snapshot)?;
        self.requested.insert(sequence, region);

        log::trace!("invalidate: request #{} at {:?} ({})", sequence, region.origin, region.size);
        Ok(sequence)
    }

    /// Change the viewport size.
    ///
    /// Returns `true` when the cache could not cover the new size and a
    /// render was requested.
    pub fn resize<D>(&mut self, size: Size, source: &D) -> Result<bool>
    where
        D: ContentSource<Snapshot = S>,
    {
        if size == self.viewport.size {
            return Ok(false);
        }
        self.viewport.size = size;

        let covered = self
            .cache
            .as_ref()
            .is_some_and(|cached| cached.image.size().contains(size));

        if covered {
            self.viewport.offset = self.clamp_offset(self.viewport.offset);
            return Ok(false);
        }

        self.invalidate(source)?;
        Ok(true)
    }
}

impl<S> RenderConsumerView<S> {
    /// Move the viewport to `offset`. Never renders.
    pub fn scroll_to(&mut self, offset: Point) -> bool {
        let offset = self.clamp_offset(offset);
        if offset == self.viewport.offset {
            return false;
        }
        self.viewport.offset = offset;
        true
    }

    pub fn scroll_by(&mut self, dx: i64, dy: i64) -> bool {
        let offset = Point::new(
            self.viewport.offset.x.saturating_add(dx),
            self.viewport.offset.y.saturating_add(dy),
        );
        self.scroll_to(offset)
    }

    /// Receive finished renders. Returns `true` if the cache changed.
    pub fn pump(&mut self) -> bool {
        let Some(completed) = self.completions.drain().pop() else {
            return false;
        };

        let origin = match self.requested.get(&completed.sequence) {
            Some(region) => region.origin,
            None => match self.last_origin {
                Some((sequence, origin)) if sequence == completed.sequence => origin,
                _ => self.viewport.offset,
            },
        };

        // Coalesced requests never complete, forget them too
        self.requested = self.requested.split_off(&(completed.sequence + 1));
        self.last_origin = Some((completed.sequence, origin));

        log::trace!("render #{} delivered ({})", completed.sequence, completed.image.size());
        self.cache = Some(CachedImage {
            image: completed.image,
            origin,
            sequence: completed.sequence,
        });
        true
    }

    /// Let the worker re-evaluate its wake predicate
    pub fn wake(&self) {
        self.renderer.wake();
    }

    /// Blit instructions for the current viewport, `None` if nothing of the
    /// cache is visible.
    pub fn paint(&self) -> Option<PaintPlan<'_>> {
        let cached = self.cache.as_ref()?;
        if cached.image.is_empty() {
            return None;
        }

        let cache_rect = Rect::new(cached.origin, cached.image.size());
        let view_rect = self.viewport.rect();
        let visible = cache_rect.intersect(&view_rect)?;

        Some(PaintPlan {
            image: &cached.image,
            source: Rect::new(
                Point::new(visible.origin.x - cached.origin.x, visible.origin.y - cached.origin.y),
                visible.size,
            ),
            target: Point::new(visible.origin.x - view_rect.origin.x, visible.origin.y - view_rect.origin.y),
            uncovered: !cache_rect.contains_rect(&view_rect),
        })
    }

    /// Part of the viewport is neither cached nor covered by the newest
    /// outstanding request
    pub fn is_stale(&self) -> bool {
        if self.viewport.size.is_empty() {
            return false;
        }
        let view = self.viewport.rect();
        let cached = self
            .cache
            .as_ref()
            .is_some_and(|cached| Rect::new(cached.origin, cached.image.size()).contains_rect(&view));
        let requested = self
            .requested
            .values()
            .next_back()
            .is_some_and(|region| region.contains_rect(&view));
        !(cached || requested)
    }

    pub fn state(&self) -> RenderState {
        match self.renderer.status() {
            RenderStatus::Idle => RenderState::Idle,
            RenderStatus::Pending => RenderState::RenderPending,
            RenderStatus::Rendering => RenderState::Rendering,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn extent(&self) -> Size {
        self.extent
    }

    pub fn cached_image(&self) -> Option<&RenderedImage> {
        self.cache.as_ref().map(|cached| &cached.image)
    }

    /// Content offset the cached image was rendered at
    pub fn cached_origin(&self) -> Option<Point> {
        self.cache.as_ref().map(|cached| cached.origin)
    }

    /// Sequence number of the render currently in the cache
    pub fn cached_sequence(&self) -> Option<u64> {
        self.cache.as_ref().map(|cached| cached.sequence)
    }

    pub fn stats(&self) -> RenderStats {
        self.renderer.stats()
    }

    /// Stop the worker, then drop the cache
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.renderer.abort();
        self.requested.clear();
        self.last_origin = None;
        self.cache = None;
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Viewport grown by the overscan, never past the extent except where
    /// the viewport itself already is
    fn render_region(&self) -> Rect {
        let view = self.viewport.rect();
        if view.size.is_empty() {
            return view;
        }
        let (grow_x, grow_y) = (self.overscan.width as i64, self.overscan.height as i64);

        let left = (view.origin.x - grow_x).max(0).min(view.origin.x);
        let top = (view.origin.y - grow_y).max(0).min(view.origin.y);
        let right = (view.right() + grow_x).min(self.extent.width as i64).max(view.right());
        let bottom = (view.bottom() + grow_y).min(self.extent.height as i64).max(view.bottom());

        Rect::new(
            Point::new(left, top),
            Size::new((right - left) as u32, (bottom - top) as u32),
        )
    }

    fn clamp_offset(&self, offset: Point) -> Point {
        let max_x = self.extent.width.saturating_sub(self.viewport.size.width) as i64;
        let max_y = self.extent.height.saturating_sub(self.viewport.size.height) as i64;
        Point::new(offset.x.clamp(0, max_x), offset.y.clamp(0, max_y))
    }
}

impl<S> Drop for RenderConsumerView<S> {
    fn drop(&mut self) {
        self.close();
    }
}
