// Block insertion menu
// Offered next to an empty block while the caret sits at its start. Inserting
// replaces that block; if the block went away while the menu was shown the first
// block of the document is used instead. A hidden menu inserts nothing.

use super::geometry::{Rect, ScreenPoint, Visibility};
use super::invariants;
use super::selection::SelectionState;
use super::structured_document::*;
use super::structured_editor::StructuredEditor;
use crate::config::EditorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertKind {
    Heading,
    Image,
    Quote,
    UnorderedList,
    OrderedList,
    Divider,
}

impl InsertKind {
    pub fn label(&self) -> &'static str {
        match self {
            InsertKind::Heading => "heading",
            InsertKind::Image => "image",
            InsertKind::Quote => "quote",
            InsertKind::UnorderedList => "unordered_list",
            InsertKind::OrderedList => "ordered_list",
            InsertKind::Divider => "divider",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        BlockInsertMenu::ITEMS
            .into_iter()
            .find(|kind| kind.label() == label)
    }

    /// Image and divider blocks hold no text
    pub fn is_atomic(&self) -> bool {
        matches!(self, InsertKind::Image | InsertKind::Divider)
    }
}

#[derive(Debug, Clone)]
pub struct BlockInsertMenu {
    visibility: Visibility,
    anchor: Option<BlockRef>,
    /// Set between `begin_image_pick` and `complete_image_pick`
    image_pick: Option<Option<BlockRef>>,
    gutter: i32,
    heading_level: u8,
}

impl BlockInsertMenu {
    pub const ITEMS: [InsertKind; 6] = [
        InsertKind::Heading,
        InsertKind::Image,
        InsertKind::Quote,
        InsertKind::UnorderedList,
        InsertKind::OrderedList,
        InsertKind::Divider,
    ];

    pub fn new(config: &EditorConfig) -> Self {
        BlockInsertMenu {
            visibility: Visibility::hidden(),
            anchor: None,
            image_pick: None,
            gutter: config.insert_menu_gutter,
            heading_level: config.heading_level(),
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_visible(&self) -> bool {
        self.visibility.visible
    }

    /// The block the menu was last shown for
    pub fn anchor(&self) -> Option<BlockRef> {
        self.anchor
    }

    pub fn is_picking_image(&self) -> bool {
        self.image_pick.is_some()
    }

    pub fn hide(&mut self) {
        self.anchor = None;
        self.visibility = Visibility::hidden();
    }

    /// Show the menu beside an empty block with the caret at its start.
    ///
    /// `bounds` is the active block's rectangle; the menu sits `gutter` pixels
    /// to its left.
    pub fn sync(&mut self, state: &SelectionState, bounds: Option<Rect>) {
        if state.is_empty_block_at_start && !state.has_range_selection {
            self.anchor = state.active_block;
            self.visibility = Visibility::shown_at(
                bounds.map(|rect| ScreenPoint::new(rect.x - self.gutter, rect.y)),
            );
        } else {
            self.hide();
        }
    }

    /// Insert a block of `kind` at the menu's anchor.
    ///
    /// `data` is the image source; it is required for [`InsertKind::Image`] and
    /// ignored otherwise. Returns a reference to the inserted block. Fails with
    /// [`EditError::MenuHidden`] unless the menu is shown.
    pub fn insert(
        &mut self,
        editor: &mut StructuredEditor,
        kind: InsertKind,
        data: Option<String>,
    ) -> EditResult<BlockRef> {
        if !self.is_visible() {
            return Err(EditError::MenuHidden);
        }
        let anchor = self.anchor;
        let inserted = self.insert_at(editor, kind, data, anchor)?;
        self.hide();
        Ok(inserted)
    }

    /// Remember where the picked image should go. The host is then asked for a file.
    pub fn begin_image_pick(&mut self) -> EditResult {
        if !self.is_visible() {
            return Err(EditError::MenuHidden);
        }
        self.image_pick = Some(self.anchor);
        Ok(())
    }

    /// Finish an image pick. `None` (cancelled) leaves the menu and the document
    /// as they were.
    pub fn complete_image_pick(
        &mut self,
        editor: &mut StructuredEditor,
        source: Option<String>,
    ) -> EditResult<Option<BlockRef>> {
        let Some(anchor) = self.image_pick.take() else {
            tracing::debug!("image pick completed without being started");
            return Ok(None);
        };
        let Some(source) = source else {
            return Ok(None);
        };
        let inserted = self.insert_at(editor, InsertKind::Image, Some(source), anchor)?;
        self.hide();
        Ok(Some(inserted))
    }

    fn new_block(&self, kind: InsertKind, data: Option<String>) -> EditResult<Block> {
        Ok(match kind {
            InsertKind::Heading => Block::heading(self.heading_level),
            InsertKind::Image => match data {
                Some(source) if !source.trim().is_empty() => Block::image(source),
                _ => return Err(EditError::MissingImageSource),
            },
            InsertKind::Quote => Block::quote(),
            InsertKind::UnorderedList => Block::list_item(false),
            InsertKind::OrderedList => Block::list_item(true),
            InsertKind::Divider => Block::divider(),
        })
    }

    fn insert_at(
        &self,
        editor: &mut StructuredEditor,
        kind: InsertKind,
        data: Option<String>,
        anchor: Option<BlockRef>,
    ) -> EditResult<BlockRef> {
        let block = self.new_block(kind, data)?;
        let doc = editor.document_mut();

        let resolved = anchor.and_then(|target| {
            doc.resolve(target)
                .and_then(|index| doc.block_ref(index))
        });
        let target = match resolved {
            Some(target) => target,
            None => {
                tracing::debug!(?anchor, "insertion anchor is stale, using the first block");
                if doc.is_empty() {
                    doc.add_block(Block::paragraph());
                }
                doc.block_ref(0).ok_or(EditError::InvalidBlockIndex)?
            }
        };

        // Only an empty block is replaced; anything with content stays put
        let replace = doc.block(target.index).is_some_and(Block::is_empty);
        let inserted = if replace {
            doc.replace_block(target, block)?
        } else {
            doc.insert_block_after(target, block)?
        };

        let caret = if kind.is_atomic() {
            let next = inserted.index + 1;
            let next_has_text = doc
                .block(next)
                .is_some_and(|block| block.block_type.is_text_bearing());
            if !invariants::ensure_trailing_paragraph(doc, inserted.index) && !next_has_text {
                doc.insert_block(next, Block::paragraph());
            }
            DocumentPosition::new(next, 0)
        } else {
            doc.end_of_block(inserted.index)
        };
        editor.finish_edit();
        editor.set_cursor(caret);

        tracing::debug!(kind = kind.label(), index = inserted.index, "block inserted");
        Ok(inserted)
    }
}
