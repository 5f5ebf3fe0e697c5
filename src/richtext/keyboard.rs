// Keyboard command dispatcher
// Maps key events to editing operations, overriding the default behaviour for
// headings and quotes on Enter/Backspace and handling the formatting shortcuts.

use super::structured_document::{BlockKind, EditResult};
use super::structured_editor::StructuredEditor;

/// Keys the editor reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Home,
    End,
}

/// Modifier state at the time of the key press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub alt: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Cmd on macOS
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        KeyEvent {
            key,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.modifiers.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.modifiers.meta = true;
        self
    }
}

/// How a key event was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The editor replaced the default behaviour
    Overridden,
    /// The default editing behaviour was applied
    Default,
    /// Nothing happened
    Ignored,
}

/// Dispatch a key event to the editor.
///
/// Failures (a stale caret racing an update) are logged and reported as
/// [`KeyOutcome::Ignored`].
pub fn dispatch(editor: &mut StructuredEditor, event: KeyEvent) -> KeyOutcome {
    let (outcome, result) = route(editor, event);
    tracing::trace!(?event, ?outcome, "key dispatched");
    match result {
        Ok(()) => outcome,
        Err(err) => {
            tracing::debug!(?event, %err, "key handler did not apply");
            KeyOutcome::Ignored
        }
    }
}

fn route(editor: &mut StructuredEditor, event: KeyEvent) -> (KeyOutcome, EditResult) {
    let mods = event.modifiers;

    if mods.command() {
        return match event.key {
            Key::Char('b' | 'B') => (KeyOutcome::Overridden, editor.toggle_bold()),
            Key::Char('i' | 'I') => (KeyOutcome::Overridden, editor.toggle_italic()),
            Key::Char('a' | 'A') => {
                editor.select_all();
                (KeyOutcome::Default, Ok(()))
            }
            _ => (KeyOutcome::Ignored, Ok(())),
        };
    }

    match event.key {
        Key::Enter if mods.shift => (KeyOutcome::Default, editor.insert_line_break()),
        Key::Enter => {
            if current_kind_splits_out(editor) {
                (KeyOutcome::Overridden, editor.insert_paragraph_after())
            } else {
                (KeyOutcome::Default, editor.insert_newline())
            }
        }
        Key::Backspace => {
            if backspace_converts(editor) {
                (KeyOutcome::Overridden, editor.convert_to_paragraph())
            } else {
                (KeyOutcome::Default, editor.delete_backward())
            }
        }
        Key::Delete => (KeyOutcome::Default, editor.delete_forward()),
        Key::ArrowLeft if mods.shift => {
            editor.move_cursor_left_extend();
            (KeyOutcome::Default, Ok(()))
        }
        Key::ArrowRight if mods.shift => {
            editor.move_cursor_right_extend();
            (KeyOutcome::Default, Ok(()))
        }
        Key::ArrowLeft => {
            editor.move_cursor_left();
            (KeyOutcome::Default, Ok(()))
        }
        Key::ArrowRight => {
            editor.move_cursor_right();
            (KeyOutcome::Default, Ok(()))
        }
        Key::ArrowUp => {
            editor.move_cursor_up();
            (KeyOutcome::Default, Ok(()))
        }
        Key::ArrowDown => {
            editor.move_cursor_down();
            (KeyOutcome::Default, Ok(()))
        }
        Key::Home => {
            editor.move_cursor_to_line_start();
            (KeyOutcome::Default, Ok(()))
        }
        Key::End => {
            editor.move_cursor_to_line_end();
            (KeyOutcome::Default, Ok(()))
        }
        Key::Char(ch) if !ch.is_control() => {
            let mut buf = [0u8; 4];
            (KeyOutcome::Default, editor.insert_text(ch.encode_utf8(&mut buf)))
        }
        Key::Char(_) => (KeyOutcome::Ignored, Ok(())),
    }
}

fn current_kind(editor: &StructuredEditor) -> Option<BlockKind> {
    editor.current_block_type().map(|block_type| block_type.kind())
}

/// Enter in a heading or quote starts a fresh paragraph after it
fn current_kind_splits_out(editor: &StructuredEditor) -> bool {
    matches!(
        current_kind(editor),
        Some(BlockKind::Heading | BlockKind::Quote)
    )
}

/// Backspace at the start of a non-empty heading or quote turns it into a paragraph
fn backspace_converts(editor: &StructuredEditor) -> bool {
    if editor.has_range_selection() || editor.cursor().offset != 0 {
        return false;
    }
    let Some(block) = editor.document().block(editor.cursor().block_index) else {
        return false;
    };
    matches!(block.kind(), BlockKind::Heading | BlockKind::Quote) && !block.is_empty()
}
