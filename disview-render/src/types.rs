//! Geometry and pixel types shared by the renderer and its consumers
//!
//! This module defines the plain data structures that cross the thread
//! boundary: sizes, rectangles, colours and the owned pixel buffer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel dimensions of a viewport or image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// True when `other` fits inside `self` in both dimensions
    pub fn contains(&self, other: Size) -> bool {
        other.width <= self.width && other.height <= self.height
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Signed position in content space
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Axis aligned rectangle in content space
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn right(&self) -> i64 {
        self.origin.x + self.size.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.origin.y + self.size.height as i64
    }

    /// Overlapping area of two rectangles, `None` if they do not touch
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let left = self.origin.x.max(other.origin.x);
        let top = self.origin.y.max(other.origin.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return None;
        }

        Some(Rect::new(
            Point::new(left, top),
            Size::new((right - left) as u32, (bottom - top) as u32),
        ))
    }

    /// True when `other` lies completely inside `self`
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.origin.x >= self.origin.x
            && other.origin.y >= self.origin.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// 8-bit RGBA colour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }
}

/// Thread priority hint attached to a render request.
///
/// The levels mirror the usual toolkit thread priorities. They travel with
/// the request into the render context and the completion; they never
/// reorder requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Idle,
    Lowest,
    Low,
    Normal,
    High,
    Highest,
    TimeCritical,
    #[default]
    Inherit,
}

/// Owned RGBA pixel buffer produced by a render
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedImage {
    size: Size,
    pixels: Vec<Rgba>,
}

impl RenderedImage {
    /// Create a transparent image of the given size
    pub fn new(size: Size) -> Self {
        Self::filled(size, Rgba::TRANSPARENT)
    }

    pub fn filled(size: Size, color: Rgba) -> Self {
        Self {
            size,
            pixels: vec![color; size.area()],
        }
    }

    /// Zero sized image, delivered for degenerate viewports
    pub fn empty() -> Self {
        Self {
            size: Size::default(),
            pixels: Vec::new(),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        self.pixels.get(self.index(x, y)).copied()
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if x < self.size.width && y < self.size.height {
            let index = self.index(x, y);
            self.pixels[index] = color;
        }
    }

    /// Mix `color` over the pixel at `x`, `y` by `coverage` (0 keeps the
    /// pixel, 255 replaces it). The result is opaque.
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Rgba, coverage: u8) {
        let Some(under) = self.pixel(x, y) else {
            return;
        };
        let mix = |top: u8, bottom: u8| {
            let (top, bottom, alpha) = (top as u32, bottom as u32, coverage as u32);
            ((top * alpha + bottom * (255 - alpha) + 127) / 255) as u8
        };
        self.set_pixel(
            x,
            y,
            Rgba::rgb(mix(color.r, under.r), mix(color.g, under.g), mix(color.b, under.b)),
        );
    }

    pub fn fill(&mut self, color: Rgba) {
        self.pixels.fill(color);
    }

    /// Fill a rectangle given in image coordinates, clipped to the image
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Rgba) {
        let right = x.saturating_add(width).min(self.size.width);
        let bottom = y.saturating_add(height).min(self.size.height);

        for row in y.min(bottom)..bottom {
            let start = self.index(x.min(right), row);
            let end = self.index(right, row);
            self.pixels[start..end].fill(color);
        }
    }

    /// Row-major `[r, g, b, a, ...]` bytes, the layout GPU uploads expect
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| [p.r, p.g, p.b, p.a])
            .collect()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.size.width as usize + x as usize
    }
}

impl fmt::Debug for RenderedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedImage")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(Point::new(0, 0), Size::new(100, 100));
        let b = Rect::new(Point::new(50, 60), Size::new(100, 100));

        let overlap = a.intersect(&b).unwrap();
        assert_eq!(overlap.origin, Point::new(50, 60));
        assert_eq!(overlap.size, Size::new(50, 40));

        let far = Rect::new(Point::new(200, 200), Size::new(10, 10));
        assert!(a.intersect(&far).is_none());
    }

    #[test]
    fn test_fill_rect_is_clipped() {
        let mut image = RenderedImage::new(Size::new(4, 4));
        image.fill_rect(2, 2, 10, 10, Rgba::WHITE);

        assert_eq!(image.pixel(3, 3), Some(Rgba::WHITE));
        assert_eq!(image.pixel(1, 1), Some(Rgba::TRANSPARENT));
        assert_eq!(image.pixel(4, 4), None);
    }

    #[test]
    fn test_blend_pixel_mixes_by_coverage() {
        let mut image = RenderedImage::filled(Size::new(2, 1), Rgba::BLACK);
        image.blend_pixel(0, 0, Rgba::rgb(255, 100, 0), 255);
        image.blend_pixel(1, 0, Rgba::rgb(255, 100, 0), 128);
        image.blend_pixel(5, 0, Rgba::WHITE, 255);

        assert_eq!(image.pixel(0, 0), Some(Rgba::rgb(255, 100, 0)));
        assert_eq!(image.pixel(1, 0), Some(Rgba::rgb(128, 50, 0)));
    }

    #[test]
    fn test_rgba_bytes_layout() {
        let mut image = RenderedImage::new(Size::new(2, 1));
        image.set_pixel(1, 0, Rgba::new(1, 2, 3, 4));

        assert_eq!(image.to_rgba_bytes(), vec![0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_priority_serde_names() {
        let json = serde_json::to_string(&Priority::TimeCritical).unwrap();
        assert_eq!(json, "\"time_critical\"");
        assert_eq!(Priority::default(), Priority::Inherit);
    }
}
