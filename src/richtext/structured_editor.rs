// Structured Editor
// Caret-level editing operations on a StructuredDocument.
// Every mutation ends by restoring the structural invariants.

use super::invariants;
use super::structured_document::*;

/// The structured editor with cursor state
#[derive(Debug, Clone)]
pub struct StructuredEditor {
    document: StructuredDocument,
    cursor: DocumentPosition,
    selection: Option<(DocumentPosition, DocumentPosition)>, // (anchor, focus)
}

impl StructuredEditor {
    /// Create a new editor holding a single empty paragraph
    pub fn new() -> Self {
        Self::with_document(StructuredDocument::new())
    }

    /// Create an editor with an existing document
    pub fn with_document(mut document: StructuredDocument) -> Self {
        invariants::enforce(&mut document);
        StructuredEditor {
            document,
            cursor: DocumentPosition::start(),
            selection: None,
        }
    }

    /// Get the document
    pub fn document(&self) -> &StructuredDocument {
        &self.document
    }

    /// Get mutable document. Call [`StructuredEditor::finish_edit`] afterwards.
    pub fn document_mut(&mut self) -> &mut StructuredDocument {
        &mut self.document
    }

    /// Replace the whole document, resetting the caret
    pub fn set_document(&mut self, document: StructuredDocument) {
        *self = Self::with_document(document);
    }

    /// Get cursor position
    pub fn cursor(&self) -> DocumentPosition {
        self.cursor
    }

    /// Set cursor position (will be clamped to valid range)
    pub fn set_cursor(&mut self, pos: DocumentPosition) {
        self.cursor = self.document.clamp_position(pos);
        self.selection = None; // Clear selection when moving cursor
    }

    /// Get selection (anchor, focus)
    pub fn selection(&self) -> Option<(DocumentPosition, DocumentPosition)> {
        self.selection
    }

    /// Set selection range; the cursor follows the focus end
    pub fn set_selection(&mut self, anchor: DocumentPosition, focus: DocumentPosition) {
        let anchor = self.document.clamp_position(anchor);
        let focus = self.document.clamp_position(focus);
        self.selection = Some((anchor, focus));
        self.cursor = focus;
    }

    /// Clear selection
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// The selected range, if it is not collapsed
    pub fn selection_range(&self) -> Option<DocumentRange> {
        self.selection
            .map(|(anchor, focus)| DocumentRange::new(anchor, focus))
            .filter(|range| !range.is_collapsed())
    }

    pub fn has_range_selection(&self) -> bool {
        self.selection_range().is_some()
    }

    /// Select all content in the document
    pub fn select_all(&mut self) {
        let last_idx = self.document.block_count().saturating_sub(1);
        let end = self.document.end_of_block(last_idx);
        self.selection = Some((DocumentPosition::start(), end));
        self.cursor = end;
    }

    /// Start or extend selection from current cursor position to a new position
    /// This is used for shift+movement
    pub fn extend_selection_to(&mut self, end: DocumentPosition) {
        let end = self.document.clamp_position(end);

        if let Some((anchor, _)) = self.selection {
            self.selection = Some((anchor, end));
        } else {
            self.selection = Some((self.cursor, end));
        }

        self.cursor = end;
    }

    /// Type of the block holding the cursor
    pub fn current_block_type(&self) -> Option<&BlockType> {
        self.document
            .block(self.cursor.block_index)
            .map(|block| &block.block_type)
    }

    /// Restore invariants and re-clamp the caret after direct document edits
    pub fn finish_edit(&mut self) {
        invariants::enforce(&mut self.document);
        self.cursor = self.document.clamp_position(self.cursor);
        if let Some((anchor, focus)) = self.selection {
            self.selection = Some((
                self.document.clamp_position(anchor),
                self.document.clamp_position(focus),
            ));
        }
    }

    /// Insert text at cursor position, replacing the selection
    pub fn insert_text(&mut self, text: &str) -> EditResult {
        if text.is_empty() {
            return Ok(());
        }
        self.delete_selection()?;
        let block_index = self.checked_block_index()?;

        if !self.document.blocks()[block_index].block_type.is_text_bearing() {
            // Typing on an image or divider continues in a new paragraph after it
            self.document.insert_block(
                block_index + 1,
                Block::paragraph().with_plain_text(text),
            );
            self.cursor = DocumentPosition::new(block_index + 1, text.len());
        } else {
            let offset = self.cursor.offset;
            self.document.blocks_mut()[block_index].insert_plain_text(offset, text);
            self.cursor.offset = offset + text.len();
        }

        self.finish_edit();
        Ok(())
    }

    /// Insert a line break inside the current block (Shift+Enter)
    pub fn insert_line_break(&mut self) -> EditResult {
        self.delete_selection()?;
        let block_index = self.checked_block_index()?;
        let block = &mut self.document.blocks_mut()[block_index];
        if !block.block_type.is_text_bearing() {
            return Err(EditError::NotTextBlock);
        }
        let offset = self.cursor.offset;
        block.insert_line_break(offset);
        self.cursor.offset = offset + 1;
        self.finish_edit();
        Ok(())
    }

    /// Insert a newline at cursor (splits the block or continues a list)
    pub fn insert_newline(&mut self) -> EditResult {
        self.delete_selection()?;
        let block_index = self.checked_block_index()?;
        let offset = self.cursor.offset;

        let (block_type, is_empty) = {
            let block = &self.document.blocks()[block_index];
            (block.block_type.clone(), block.is_empty())
        };

        match block_type {
            BlockType::ListItem { ordered } => {
                if is_empty {
                    // An empty item ends the list
                    self.document.blocks_mut()[block_index].block_type = BlockType::Paragraph;
                    self.cursor = DocumentPosition::new(block_index, 0);
                } else {
                    let right = self.document.blocks_mut()[block_index].split_content_at(offset);
                    let item = Block::list_item(ordered).with_content(right);
                    self.document.insert_block(block_index + 1, item);
                    self.cursor = DocumentPosition::new(block_index + 1, 0);
                }
            }
            BlockType::Image { .. } | BlockType::Divider => {
                self.document.insert_block(block_index + 1, Block::paragraph());
                self.cursor = DocumentPosition::new(block_index + 1, 0);
            }
            _ => {
                let right = self.document.blocks_mut()[block_index].split_content_at(offset);
                self.document
                    .insert_block(block_index + 1, Block::paragraph().with_content(right));
                self.cursor = DocumentPosition::new(block_index + 1, 0);
            }
        }

        self.finish_edit();
        Ok(())
    }

    /// Insert an empty paragraph after the current block and move the caret into it
    pub fn insert_paragraph_after(&mut self) -> EditResult {
        self.selection = None;
        let block_index = self.checked_block_index()?;
        self.document.insert_block(block_index + 1, Block::paragraph());
        self.cursor = DocumentPosition::new(block_index + 1, 0);
        self.finish_edit();
        Ok(())
    }

    /// Turn the current block into a paragraph carrying the same content
    pub fn convert_to_paragraph(&mut self) -> EditResult {
        let block_index = self.checked_block_index()?;
        let block = &mut self.document.blocks_mut()[block_index];
        if !block.block_type.is_text_bearing() {
            return Err(EditError::NotTextBlock);
        }
        block.block_type = BlockType::Paragraph;
        self.cursor = DocumentPosition::new(block_index, 0);
        self.selection = None;
        self.finish_edit();
        Ok(())
    }

    /// Delete character before cursor (backspace)
    pub fn delete_backward(&mut self) -> EditResult {
        if self.has_range_selection() {
            return self.delete_selection();
        }
        self.selection = None;
        let block_index = self.checked_block_index()?;
        let offset = self.cursor.offset;

        if !self.document.blocks()[block_index].block_type.is_text_bearing() {
            self.remove_atomic_block(block_index);
        } else if offset == 0 {
            if block_index == 0 {
                return Ok(()); // At start of document, nothing to delete
            }
            let prev_index = block_index - 1;
            let prev_is_text = self.document.blocks()[prev_index]
                .block_type
                .is_text_bearing();

            if !prev_is_text {
                // Backspace right after an image or divider removes it
                self.document.remove_block(prev_index);
                self.cursor = DocumentPosition::new(prev_index, 0);
            } else if self.document.blocks()[block_index].is_empty() {
                self.document.remove_block(block_index);
                self.cursor = self.document.end_of_block(prev_index);
            } else {
                let current = self
                    .document
                    .remove_block(block_index)
                    .ok_or(EditError::InvalidBlockIndex)?;
                let prev = &mut self.document.blocks_mut()[prev_index];
                let prev_len = prev.text_len();
                if prev.is_placeholder() {
                    prev.content.clear();
                }
                prev.content.extend(current.content);
                prev.normalize();
                self.cursor = DocumentPosition::new(prev_index, prev_len);
            }
        } else {
            let prev = self.document.previous_grapheme_position(self.cursor);
            self.document.blocks_mut()[block_index].delete_text_range(prev.offset, offset);
            self.cursor = prev;
        }

        self.finish_edit();
        Ok(())
    }

    /// Delete character at cursor (delete key)
    pub fn delete_forward(&mut self) -> EditResult {
        if self.has_range_selection() {
            return self.delete_selection();
        }
        self.selection = None;
        let block_index = self.checked_block_index()?;
        let offset = self.cursor.offset;
        let block = &self.document.blocks()[block_index];

        if !block.block_type.is_text_bearing() {
            self.remove_atomic_block(block_index);
        } else if offset >= block.text_len() {
            let next_index = block_index + 1;
            let Some(next) = self.document.block(next_index) else {
                return Ok(()); // At end of document, nothing to delete
            };
            if !next.block_type.is_text_bearing() || next.is_empty() {
                self.document.remove_block(next_index);
            } else {
                let next = self
                    .document
                    .remove_block(next_index)
                    .ok_or(EditError::InvalidBlockIndex)?;
                let current = &mut self.document.blocks_mut()[block_index];
                if current.is_placeholder() {
                    current.content.clear();
                }
                current.content.extend(next.content);
                current.normalize();
            }
        } else {
            let next = self.document.next_grapheme_position(self.cursor);
            self.document.blocks_mut()[block_index].delete_text_range(offset, next.offset);
        }

        self.finish_edit();
        Ok(())
    }

    /// Delete the current selection
    pub fn delete_selection(&mut self) -> EditResult {
        let Some(range) = self.selection_range() else {
            self.selection = None;
            return Ok(());
        };
        let (start, end) = range.ordered();
        self.document.delete_range(start, end);
        self.cursor = start;
        self.selection = None;
        self.finish_edit();
        Ok(())
    }

    /// Apply an inline format to the current selection; no selection is a no-op
    pub fn apply_format(&mut self, format: InlineFormat) -> EditResult {
        let Some(range) = self.selection_range() else {
            return Ok(());
        };
        self.document.apply_inline_format(range, format)?;
        self.finish_edit();
        Ok(())
    }

    /// Toggle bold style on the current selection
    pub fn toggle_bold(&mut self) -> EditResult {
        self.apply_format(InlineFormat::Bold)
    }

    /// Toggle italic style on the current selection
    pub fn toggle_italic(&mut self) -> EditResult {
        self.apply_format(InlineFormat::Italic)
    }

    /// Move cursor left by one grapheme
    pub fn move_cursor_left(&mut self) {
        self.cursor = self.position_left_of(self.cursor);
        self.selection = None;
    }

    /// Move cursor right by one grapheme
    pub fn move_cursor_right(&mut self) {
        self.cursor = self.position_right_of(self.cursor);
        self.selection = None;
    }

    /// Extend selection one grapheme to the left
    pub fn move_cursor_left_extend(&mut self) {
        let target = self.position_left_of(self.cursor);
        self.extend_selection_to(target);
    }

    /// Extend selection one grapheme to the right
    pub fn move_cursor_right_extend(&mut self) {
        let target = self.position_right_of(self.cursor);
        self.extend_selection_to(target);
    }

    /// Move cursor up (to previous block)
    pub fn move_cursor_up(&mut self) {
        if self.cursor.block_index > 0 {
            let pos = DocumentPosition::new(self.cursor.block_index - 1, self.cursor.offset);
            self.cursor = self.document.clamp_position(pos);
        }
        self.selection = None;
    }

    /// Move cursor down (to next block)
    pub fn move_cursor_down(&mut self) {
        if self.cursor.block_index + 1 < self.document.block_count() {
            let pos = DocumentPosition::new(self.cursor.block_index + 1, self.cursor.offset);
            self.cursor = self.document.clamp_position(pos);
        }
        self.selection = None;
    }

    /// Move cursor to start of current block
    pub fn move_cursor_to_line_start(&mut self) {
        self.cursor.offset = 0;
        self.selection = None;
    }

    /// Move cursor to end of current block
    pub fn move_cursor_to_line_end(&mut self) {
        self.cursor = self.document.end_of_block(self.cursor.block_index);
        self.selection = None;
    }

    fn position_left_of(&self, pos: DocumentPosition) -> DocumentPosition {
        let pos = self.document.clamp_position(pos);
        if pos.offset > 0 {
            self.document.previous_grapheme_position(pos)
        } else if pos.block_index > 0 {
            self.document.end_of_block(pos.block_index - 1)
        } else {
            pos
        }
    }

    fn position_right_of(&self, pos: DocumentPosition) -> DocumentPosition {
        let pos = self.document.clamp_position(pos);
        let len = self
            .document
            .block(pos.block_index)
            .map_or(0, Block::text_len);
        if pos.offset < len {
            self.document.next_grapheme_position(pos)
        } else if pos.block_index + 1 < self.document.block_count() {
            DocumentPosition::new(pos.block_index + 1, 0)
        } else {
            pos
        }
    }

    fn remove_atomic_block(&mut self, block_index: usize) {
        self.document.remove_block(block_index);
        self.cursor = if block_index > 0 {
            self.document.end_of_block(block_index - 1)
        } else {
            DocumentPosition::start()
        };
    }

    /// Clamp a stale cursor back into the document and return its block index
    fn checked_block_index(&mut self) -> EditResult<usize> {
        if self.document.is_empty() {
            invariants::enforce(&mut self.document);
        }
        self.cursor = self.document.clamp_position(self.cursor);
        if self.cursor.block_index >= self.document.block_count() {
            return Err(EditError::InvalidBlockIndex);
        }
        Ok(self.cursor.block_index)
    }
}

impl Default for StructuredEditor {
    fn default() -> Self {
        Self::new()
    }
}
