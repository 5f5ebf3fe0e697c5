// Editor session
// One editable surface: owns the document, the derived selection state and the
// two floating surfaces, and reports content changes to its host.

use std::time::Instant;

use super::geometry::Rect;
use super::html_converter::{document_to_html, html_to_document};
use super::insert_menu::{BlockInsertMenu, InsertKind};
use super::keyboard::{self, KeyEvent, KeyOutcome};
use super::selection::{
    EditorEvent, HostCaret, SelectionScheduler, SelectionState, compute_selection_state,
    resolve_caret,
};
use super::structured_document::{DocumentRange, EditResult, StructuredDocument};
use super::structured_editor::StructuredEditor;
use super::toolbar::{FloatingToolbar, FormatCommand};
use crate::config::EditorConfig;
use crate::content::{ContentLoader, ContentProvider};

/// The embedding environment of an editor session
pub trait EditorHost {
    /// Called with the serialized content whenever it changed
    fn on_change(&mut self, content: &str);

    /// Bounding rectangle of a selected range, if the host can measure it
    fn selection_bounds(&self, _range: DocumentRange) -> Option<Rect> {
        None
    }

    /// Bounding rectangle of the block at `index`
    fn block_bounds(&self, _index: usize) -> Option<Rect> {
        None
    }

    /// Ask the user for an image; the answer comes back through
    /// [`EditorSession::complete_image_pick`]
    fn request_image(&mut self) {}
}

pub struct EditorSession<H: EditorHost> {
    editor: StructuredEditor,
    host: H,
    selection: SelectionState,
    scheduler: SelectionScheduler,
    toolbar: FloatingToolbar,
    insert_menu: BlockInsertMenu,
    /// Last rendered content; `on_change` fires only when this changes
    content: String,
}

impl<H: EditorHost> EditorSession<H> {
    /// Open a session on `initial_content`. Malformed content starts out as an
    /// empty paragraph.
    pub fn new(initial_content: &str, host: H, config: EditorConfig) -> Self {
        let editor = StructuredEditor::with_document(html_to_document(initial_content));
        let content = document_to_html(editor.document());
        let mut session = EditorSession {
            editor,
            host,
            selection: SelectionState::default(),
            scheduler: SelectionScheduler::new(config.selection_debounce()),
            toolbar: FloatingToolbar::new(&config),
            insert_menu: BlockInsertMenu::new(&config),
            content,
        };
        session.recompute_selection();
        session
    }

    /// Current serialized content
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn document(&self) -> &StructuredDocument {
        self.editor.document()
    }

    pub fn editor(&self) -> &StructuredEditor {
        &self.editor
    }

    pub fn selection_state(&self) -> &SelectionState {
        &self.selection
    }

    pub fn toolbar(&self) -> &FloatingToolbar {
        &self.toolbar
    }

    pub fn insert_menu(&self) -> &BlockInsertMenu {
        &self.insert_menu
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Move the caret to a host-reported position. The derived state follows on
    /// the next [`EditorSession::notify`].
    pub fn set_caret(&mut self, caret: HostCaret) {
        let pos = resolve_caret(self.editor.document(), &caret);
        self.editor.set_cursor(pos);
    }

    /// Select between two host-reported positions
    pub fn set_selection(&mut self, anchor: HostCaret, focus: HostCaret) {
        let doc = self.editor.document();
        let anchor = resolve_caret(doc, &anchor);
        let focus = resolve_caret(doc, &focus);
        self.editor.set_selection(anchor, focus);
    }

    pub fn handle_key(&mut self, event: KeyEvent, now: Instant) -> KeyOutcome {
        let outcome = keyboard::dispatch(&mut self.editor, event);
        if outcome != KeyOutcome::Ignored {
            self.commit();
        }
        self.notify(EditorEvent::KeyUp, now);
        outcome
    }

    /// Report a host event; the selection state is recomputed once the
    /// debounce delay has passed
    pub fn notify(&mut self, event: EditorEvent, now: Instant) {
        tracing::trace!(?event, "selection recompute scheduled");
        self.scheduler.schedule(now);
        self.tick(now);
    }

    /// Drive the debounce timer. Returns whether the selection was recomputed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.scheduler.take_due(now) {
            self.recompute_selection();
            return true;
        }
        false
    }

    /// Recompute the selection state and re-sync both floating surfaces
    pub fn recompute_selection(&mut self) {
        self.scheduler.cancel();
        self.selection = compute_selection_state(&self.editor);

        let selection_bounds = self
            .selection
            .range
            .and_then(|range| self.host.selection_bounds(range));
        self.toolbar.sync(&self.selection, selection_bounds);

        if self.toolbar.is_visible() {
            self.insert_menu.hide();
        } else {
            let block_bounds = self
                .selection
                .active_block
                .and_then(|block| self.host.block_bounds(block.index));
            self.insert_menu.sync(&self.selection, block_bounds);
        }
    }

    /// Apply a toolbar command to the current selection
    pub fn apply_format(&mut self, command: FormatCommand) -> EditResult {
        let result = self.toolbar.apply(&mut self.editor, command);
        if let Err(err) = &result {
            tracing::debug!(%err, command = command.label(), "format command failed");
        }
        self.commit();
        self.recompute_selection();
        result
    }

    /// Choose an item of the insertion menu. Images are requested from the host
    /// first. Only possible while the menu is shown.
    pub fn insert_block(&mut self, kind: InsertKind) -> EditResult {
        if kind == InsertKind::Image {
            if let Err(err) = self.insert_menu.begin_image_pick() {
                tracing::debug!(%err, "image insertion refused");
                return Err(err);
            }
            self.host.request_image();
            return Ok(());
        }
        let result = self.insert_menu.insert(&mut self.editor, kind, None);
        if let Err(err) = &result {
            tracing::debug!(%err, kind = kind.label(), "block insertion failed");
        }
        self.commit();
        self.recompute_selection();
        result.map(|_| ())
    }

    /// Deliver the host's answer to an image request; `None` means cancelled
    pub fn complete_image_pick(&mut self, source: Option<String>) -> EditResult {
        let inserted = self.insert_menu.complete_image_pick(&mut self.editor, source)?;
        if inserted.is_some() {
            self.commit();
            self.recompute_selection();
        }
        Ok(())
    }

    /// Replace the content from outside. The host is not notified of its own content.
    pub fn set_content(&mut self, content: &str) {
        self.editor.set_document(html_to_document(content));
        self.content = document_to_html(self.editor.document());
        self.recompute_selection();
    }

    /// Render and report the content if it changed. Returns whether it did.
    fn commit(&mut self) -> bool {
        let rendered = document_to_html(self.editor.document());
        if rendered == self.content {
            return false;
        }
        self.content = rendered;
        self.host.on_change(&self.content);
        true
    }
}

impl<H: EditorHost> ContentProvider for EditorSession<H> {
    fn get_content(&self) -> String {
        self.content.clone()
    }
}

impl<H: EditorHost> ContentLoader for EditorSession<H> {
    fn set_content_from_html(&mut self, html: &str) {
        self.set_content(html);
    }
}
