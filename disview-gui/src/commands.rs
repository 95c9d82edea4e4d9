/// Commands sent from UI components to the application
///
/// Panels never touch the document or the views directly; they queue one of
/// these and the app applies it at the start of the next frame.
use disview_render::CursorCommand;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// Move the listing cursor
    Cursor(CursorCommand),
    /// Jump to the first item at or after an address
    GotoAddress(u64),
    /// Jump to a line picked on the listing map
    GotoLine(usize),
    GoBack,
    GoForward,
    /// Scroll the listing by whole lines
    Scroll(i64),
    /// Put the selection, or the cursor line, on the clipboard
    Copy,
    /// Jump to the address named by the operand under the cursor
    FollowUnderCursor,
    /// Turn the next batch of unexplored bytes into data
    ExploreNext,
    ToggleListingMap,
    ToggleMessages,
}
