//! Cursor, selection and line viewport for listing views
//!
//! Navigation is purely logical state, updated synchronously on the owning
//! thread. It never touches the render cache; callers invalidate when
//! [`LineViewport::ensure_visible`] reports that the visible lines changed.

use std::collections::VecDeque;

/// Most entries kept in the back/forward history
pub const HISTORY_LIMIT: usize = 256;

/// Line/column position inside a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CursorPosition {
    pub line: usize,
    pub column: usize,
}

impl CursorPosition {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Navigation commands produced by keyboard and mouse handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorCommand {
    Up { select: bool },
    Down { select: bool },
    Left { select: bool },
    Right { select: bool },
    PageUp { select: bool },
    PageDown { select: bool },
    LineStart { select: bool },
    LineEnd { select: bool },
    DocumentStart { select: bool },
    DocumentEnd { select: bool },
    /// Jump to a line, recorded in the history
    Goto(usize),
    /// Place the cursor at an exact position (mouse press or drag)
    Place { position: CursorPosition, select: bool },
}

/// Shape of the listing the cursor moves through
pub trait LineMetrics {
    fn line_count(&self) -> usize;
    fn line_length(&self, line: usize) -> usize;
}

impl LineMetrics for [String] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line_length(&self, line: usize) -> usize {
        self.get(line).map_or(0, |l| l.chars().count())
    }
}

impl LineMetrics for Vec<String> {
    fn line_count(&self) -> usize {
        self.as_slice().line_count()
    }

    fn line_length(&self, line: usize) -> usize {
        self.as_slice().line_length(line)
    }
}

/// Cursor with selection anchor and navigation history
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    position: CursorPosition,
    anchor: Option<CursorPosition>,
    back: VecDeque<CursorPosition>,
    forward: Vec<CursorPosition>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> CursorPosition {
        self.position
    }

    /// Selection as an ordered `(start, end)` pair
    pub fn selection(&self) -> Option<(CursorPosition, CursorPosition)> {
        let anchor = self.anchor?;
        if anchor == self.position {
            return None;
        }
        Some((anchor.min(self.position), anchor.max(self.position)))
    }

    pub fn has_selection(&self) -> bool {
        self.selection().is_some()
    }

    pub fn clear_selection(&mut self) {
        self.anchor = None;
    }

    /// Apply a command. Returns `true` if the position or selection changed.
    pub fn apply<M>(&mut self, command: CursorCommand, metrics: &M, page_lines: usize) -> bool
    where
        M: LineMetrics + ?Sized,
    {
        let before = (self.position, self.selection());
        let last_line = metrics.line_count().saturating_sub(1);
        let page = page_lines.max(1);
        let pos = self.position;

        let (target, select) = match command {
            CursorCommand::Up { select } => (CursorPosition::new(pos.line.saturating_sub(1), pos.column), select),
            CursorCommand::Down { select } => (CursorPosition::new((pos.line + 1).min(last_line), pos.column), select),
            CursorCommand::Left { select } => (CursorPosition::new(pos.line, pos.column.saturating_sub(1)), select),
            CursorCommand::Right { select } => (CursorPosition::new(pos.line, pos.column + 1), select),
            CursorCommand::PageUp { select } => (CursorPosition::new(pos.line.saturating_sub(page), pos.column), select),
            CursorCommand::PageDown { select } => {
                (CursorPosition::new((pos.line + page).min(last_line), pos.column), select)
            }
            CursorCommand::LineStart { select } => (CursorPosition::new(pos.line, 0), select),
            CursorCommand::LineEnd { select } => (CursorPosition::new(pos.line, metrics.line_length(pos.line)), select),
            CursorCommand::DocumentStart { select } => (CursorPosition::default(), select),
            CursorCommand::DocumentEnd { select } => {
                (CursorPosition::new(last_line, metrics.line_length(last_line)), select)
            }
            CursorCommand::Goto(line) => {
                let line = line.min(last_line);
                if line != pos.line {
                    self.push_history(pos);
                }
                (CursorPosition::new(line, 0), false)
            }
            CursorCommand::Place { position, select } => (position, select),
        };

        self.move_to(Self::clamp(target, metrics), select);
        before != (self.position, self.selection())
    }

    pub fn can_go_back(&self) -> bool {
        !self.back.is_empty()
    }

    pub fn can_go_forward(&self) -> bool {
        !self.forward.is_empty()
    }

    /// Return to the position before the last jump
    pub fn go_back(&mut self) -> bool {
        let Some(previous) = self.back.pop_back() else {
            return false;
        };
        self.forward.push(self.position);
        self.move_to(previous, false);
        true
    }

    pub fn go_forward(&mut self) -> bool {
        let Some(next) = self.forward.pop() else {
            return false;
        };
        self.back.push_back(self.position);
        self.move_to(next, false);
        true
    }

    fn push_history(&mut self, position: CursorPosition) {
        if self.back.back() != Some(&position) {
            self.back.push_back(position);
        }
        if self.back.len() > HISTORY_LIMIT {
            self.back.pop_front();
        }
        self.forward.clear();
    }

    fn move_to(&mut self, target: CursorPosition, select: bool) {
        if select {
            self.anchor.get_or_insert(self.position);
        } else {
            self.anchor = None;
        }
        self.position = target;
    }

    fn clamp<M>(position: CursorPosition, metrics: &M) -> CursorPosition
    where
        M: LineMetrics + ?Sized,
    {
        let line = position.line.min(metrics.line_count().saturating_sub(1));
        let column = position.column.min(metrics.line_length(line));
        CursorPosition::new(line, column)
    }
}

/// Which listing lines are on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineViewport {
    first_visible_line: usize,
    line_height: u32,
    height: u32,
}

impl LineViewport {
    pub fn new(line_height: u32) -> Self {
        Self {
            first_visible_line: 0,
            line_height: line_height.max(1),
            height: 0,
        }
    }

    pub fn set_height(&mut self, height: u32) {
        self.height = height;
    }

    pub fn line_height(&self) -> u32 {
        self.line_height
    }

    /// Number of whole lines that fit, at least one
    pub fn visible_lines(&self) -> usize {
        ((self.height / self.line_height) as usize).max(1)
    }

    pub fn first_visible_line(&self) -> usize {
        self.first_visible_line
    }

    pub fn last_visible_line(&self) -> usize {
        self.first_visible_line + self.visible_lines() - 1
    }

    pub fn is_line_visible(&self, line: usize) -> bool {
        (self.first_visible_line..=self.last_visible_line()).contains(&line)
    }

    /// Line under a y coordinate relative to the top of the viewport
    pub fn line_at(&self, y: f32) -> usize {
        self.first_visible_line + (y.max(0.0) as u32 / self.line_height) as usize
    }

    /// Scroll so that `first` is the top line, clamped to `line_count`.
    /// Returns `true` if the visible lines changed.
    pub fn scroll_to_line(&mut self, first: usize, line_count: usize) -> bool {
        let max_first = line_count.saturating_sub(self.visible_lines());
        let first = first.min(max_first);
        if first == self.first_visible_line {
            return false;
        }
        self.first_visible_line = first;
        true
    }

    pub fn scroll_lines(&mut self, delta: i64, line_count: usize) -> bool {
        let first = (self.first_visible_line as i64).saturating_add(delta).max(0);
        let first = usize::try_from(first).unwrap_or(usize::MAX);
        self.scroll_to_line(first, line_count)
    }

    /// Bring `line` on screen with minimal scrolling.
    /// Returns `true` if the visible lines changed.
    pub fn ensure_visible(&mut self, line: usize, line_count: usize) -> bool {
        if self.is_line_visible(line) {
            return false;
        }
        let first = if line < self.first_visible_line {
            line
        } else {
            line + 1 - self.visible_lines()
        };
        self.scroll_to_line(first, line_count)
    }
}
