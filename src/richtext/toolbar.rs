// Floating format toolbar
// Shown above a non-collapsed selection; applies inline formatting to it.

use super::geometry::{Rect, ScreenPoint, Visibility};
use super::selection::SelectionState;
use super::structured_document::{EditResult, InlineFormat};
use super::structured_editor::StructuredEditor;
use crate::config::EditorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCommand {
    Bold,
    Italic,
    Heading,
    Quote,
    UnorderedList,
    OrderedList,
}

impl FormatCommand {
    pub fn label(&self) -> &'static str {
        match self {
            FormatCommand::Bold => "bold",
            FormatCommand::Italic => "italic",
            FormatCommand::Heading => "heading",
            FormatCommand::Quote => "quote",
            FormatCommand::UnorderedList => "unordered_list",
            FormatCommand::OrderedList => "ordered_list",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        FloatingToolbar::COMMANDS
            .into_iter()
            .find(|command| command.label() == label)
    }

    fn to_inline_format(self, heading_level: u8) -> InlineFormat {
        match self {
            FormatCommand::Bold => InlineFormat::Bold,
            FormatCommand::Italic => InlineFormat::Italic,
            FormatCommand::Heading => InlineFormat::Heading {
                level: heading_level,
            },
            FormatCommand::Quote => InlineFormat::Quote,
            FormatCommand::UnorderedList => InlineFormat::List { ordered: false },
            FormatCommand::OrderedList => InlineFormat::List { ordered: true },
        }
    }
}

#[derive(Debug, Clone)]
pub struct FloatingToolbar {
    visibility: Visibility,
    width: i32,
    height: i32,
    gap: i32,
    heading_level: u8,
}

impl FloatingToolbar {
    pub const COMMANDS: [FormatCommand; 6] = [
        FormatCommand::Bold,
        FormatCommand::Italic,
        FormatCommand::Heading,
        FormatCommand::Quote,
        FormatCommand::UnorderedList,
        FormatCommand::OrderedList,
    ];

    pub fn new(config: &EditorConfig) -> Self {
        FloatingToolbar {
            visibility: Visibility::hidden(),
            width: config.toolbar_width,
            height: config.toolbar_height,
            gap: config.toolbar_gap,
            heading_level: config.heading_level(),
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_visible(&self) -> bool {
        self.visibility.visible
    }

    pub fn hide(&mut self) {
        self.visibility = Visibility::hidden();
    }

    /// Show the toolbar for a range selection, hide it otherwise.
    ///
    /// `bounds` is the selection's bounding rectangle; without one the toolbar
    /// is visible but unpositioned.
    pub fn sync(&mut self, state: &SelectionState, bounds: Option<Rect>) {
        self.visibility = if state.has_range_selection {
            Visibility::shown_at(bounds.map(|rect| self.position_above(rect)))
        } else {
            Visibility::hidden()
        };
    }

    /// Centred horizontally over `rect`, `gap` pixels above it
    fn position_above(&self, rect: Rect) -> ScreenPoint {
        ScreenPoint::new(
            rect.center_x() - self.width / 2,
            rect.y - self.height - self.gap,
        )
    }

    /// Apply a command to the current selection, then collapse the selection to
    /// its end and hide
    pub fn apply(&mut self, editor: &mut StructuredEditor, command: FormatCommand) -> EditResult {
        let range = editor.selection_range();
        editor.apply_format(command.to_inline_format(self.heading_level))?;
        if let Some(range) = range {
            let (_, end) = range.ordered();
            editor.set_cursor(end);
        }
        tracing::debug!(command = command.label(), "toolbar command applied");
        self.hide();
        Ok(())
    }
}
