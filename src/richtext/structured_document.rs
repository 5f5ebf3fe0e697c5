// Structured Document Model
// The editor's content tree, completely independent of the markup it is stored as.
// HTML is only used as a storage/serialization format at the host boundary.

use std::cmp::min;
use std::fmt;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

/// Unique identifier for document elements
pub type ElementId = usize;

/// Result of an editing operation
pub type EditResult<T = ()> = Result<T, EditError>;

/// Errors that can occur during editing.
///
/// None of these are fatal: UI entry points log them and fall back to a safe default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("block reference no longer matches the document")]
    StaleReference,
    #[error("block index out of range")]
    InvalidBlockIndex,
    #[error("position is not valid for this block")]
    InvalidPosition,
    #[error("block does not hold text")]
    NotTextBlock,
    #[error("image insertion needs a source")]
    MissingImageSource,
    #[error("insertion menu is not shown")]
    MenuHidden,
}

/// Text styling (semantic, not syntactic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
}

impl TextStyle {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn bold() -> Self {
        TextStyle {
            bold: true,
            ..Default::default()
        }
    }

    pub fn italic() -> Self {
        TextStyle {
            italic: true,
            ..Default::default()
        }
    }
}

/// A run of styled text (a contiguous piece of text with uniform styling)
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub style: TextStyle,
}

impl TextRun {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        TextRun {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, TextStyle::plain())
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Split this text run at the given byte offset (snapped back to a char boundary)
    /// Returns (left_run, right_run)
    pub fn split_at(&self, offset: usize) -> (TextRun, TextRun) {
        let offset = char_boundary_at_or_before(&self.text, offset);
        let (left, right) = self.text.split_at(offset);
        (
            TextRun::new(left, self.style),
            TextRun::new(right, self.style),
        )
    }
}

/// Block-level wrapper that can be nested inside a text block.
///
/// The floating toolbar wraps the selected text only, never the whole block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedKind {
    Heading { level: u8 },
    Quote,
}

/// Inline content (can appear within a block)
#[derive(Debug, Clone, PartialEq)]
pub enum InlineContent {
    Text(TextRun),
    Nested {
        kind: NestedKind,
        content: Vec<InlineContent>,
    },
    LineBreak,
}

impl InlineContent {
    /// Get the plain text length of this inline content
    pub fn text_len(&self) -> usize {
        match self {
            InlineContent::Text(run) => run.len(),
            InlineContent::Nested { content, .. } => content.iter().map(|c| c.text_len()).sum(),
            InlineContent::LineBreak => 1,
        }
    }

    /// Flatten to plain text
    pub fn to_plain_text(&self) -> String {
        match self {
            InlineContent::Text(run) => run.text.clone(),
            InlineContent::Nested { content, .. } => {
                content.iter().map(|c| c.to_plain_text()).collect()
            }
            InlineContent::LineBreak => "\n".to_string(),
        }
    }
}

/// Block-level content types
#[derive(Debug, Clone, PartialEq)]
pub enum BlockType {
    Paragraph,
    Heading {
        level: u8,
    }, // 1-6
    BlockQuote,
    ListItem {
        ordered: bool,
    },
    Image {
        source: String,
    },
    Divider,
}

/// The kind of a block, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Paragraph,
    Heading,
    Quote,
    UnorderedList,
    OrderedList,
    Image,
    Divider,
}

impl BlockType {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockType::Paragraph => BlockKind::Paragraph,
            BlockType::Heading { .. } => BlockKind::Heading,
            BlockType::BlockQuote => BlockKind::Quote,
            BlockType::ListItem { ordered: false } => BlockKind::UnorderedList,
            BlockType::ListItem { ordered: true } => BlockKind::OrderedList,
            BlockType::Image { .. } => BlockKind::Image,
            BlockType::Divider => BlockKind::Divider,
        }
    }

    /// Whether blocks of this type hold inline content
    pub fn is_text_bearing(&self) -> bool {
        !matches!(self, BlockType::Image { .. } | BlockType::Divider)
    }
}

/// A block of content
#[derive(Debug, Clone)]
pub struct Block {
    pub id: ElementId,
    pub block_type: BlockType,
    pub content: Vec<InlineContent>,
}

// Element ids are identity, not content.
impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.block_type == other.block_type && self.content == other.content
    }
}

impl Block {
    /// Create a block; text-bearing blocks start out as the empty placeholder
    pub fn new(block_type: BlockType) -> Self {
        let content = if block_type.is_text_bearing() {
            vec![InlineContent::LineBreak]
        } else {
            Vec::new()
        };
        Block {
            id: 0,
            block_type,
            content,
        }
    }

    pub fn paragraph() -> Self {
        Self::new(BlockType::Paragraph)
    }

    pub fn heading(level: u8) -> Self {
        Self::new(BlockType::Heading {
            level: level.clamp(1, 6),
        })
    }

    pub fn quote() -> Self {
        Self::new(BlockType::BlockQuote)
    }

    pub fn list_item(ordered: bool) -> Self {
        Self::new(BlockType::ListItem { ordered })
    }

    pub fn image(source: impl Into<String>) -> Self {
        Self::new(BlockType::Image {
            source: source.into(),
        })
    }

    pub fn divider() -> Self {
        Self::new(BlockType::Divider)
    }

    pub fn kind(&self) -> BlockKind {
        self.block_type.kind()
    }

    pub fn with_text(mut self, text: impl Into<String>, style: TextStyle) -> Self {
        if self.is_placeholder() {
            self.content.clear();
        }
        self.content
            .push(InlineContent::Text(TextRun::new(text, style)));
        self.normalize();
        self
    }

    pub fn with_plain_text(self, text: impl Into<String>) -> Self {
        self.with_text(text, TextStyle::plain())
    }

    pub fn with_content(mut self, content: Vec<InlineContent>) -> Self {
        self.content = content;
        self.normalize();
        self
    }

    /// Whether the content is exactly the single line-break placeholder
    pub fn is_placeholder(&self) -> bool {
        matches!(self.content.as_slice(), [InlineContent::LineBreak])
    }

    /// Get the total text length of this block; the placeholder has no length
    pub fn text_len(&self) -> usize {
        if self.is_placeholder() {
            return 0;
        }
        self.content.iter().map(|c| c.text_len()).sum()
    }

    /// Get plain text content
    pub fn to_plain_text(&self) -> String {
        if self.is_placeholder() {
            return String::new();
        }
        self.content.iter().map(|c| c.to_plain_text()).collect()
    }

    /// Check if this block has no visible text.
    ///
    /// Both the trimmed text and the markup are checked: a block holding two line
    /// breaks has no visible text but is not empty.
    pub fn is_empty(&self) -> bool {
        if !self.block_type.is_text_bearing() {
            return false;
        }
        self.to_plain_text().trim().is_empty()
            && (self.content.is_empty() || self.is_placeholder())
    }

    /// Restore canonical inline content. Returns whether anything changed.
    pub fn normalize(&mut self) -> bool {
        if !self.block_type.is_text_bearing() {
            let changed = !self.content.is_empty();
            self.content.clear();
            return changed;
        }
        let mut normalized = normalize_inline(&self.content, false);
        if normalized.is_empty() {
            normalized.push(InlineContent::LineBreak);
        }
        if normalized == self.content {
            return false;
        }
        self.content = normalized;
        true
    }

    /// Delete text in [start..end) within this block's flattened content
    pub fn delete_text_range(&mut self, start: usize, end: usize) {
        let len = self.text_len();
        let start = min(start, len);
        let end = min(end, len);
        if start >= end {
            return;
        }
        let (left, rest) = split_inline(&self.content, start);
        let (_deleted, right) = split_inline(&rest, end - start);
        self.content = left;
        self.content.extend(right);
        self.normalize();
    }

    /// Split this block's content at a flattened text offset, returning the right part.
    /// The left part remains in self (possibly empty until the next normalization).
    pub fn split_content_at(&mut self, offset: usize) -> Vec<InlineContent> {
        if self.is_placeholder() {
            self.content.clear();
            return Vec::new();
        }
        let offset = min(offset, self.text_len());
        let (left, right) = split_inline(&self.content, offset);
        self.content = left;
        right
    }

    /// Insert plain text at a flattened text offset
    pub fn insert_plain_text(&mut self, offset: usize, text: &str) {
        self.insert_inline(offset, InlineContent::Text(TextRun::plain(text)));
    }

    /// Insert a visible line break at a flattened text offset.
    ///
    /// In an empty block the break goes in front of the placeholder so that the
    /// block gains a second, visible line.
    pub fn insert_line_break(&mut self, offset: usize) {
        if self.is_placeholder() {
            self.content.insert(0, InlineContent::LineBreak);
            return;
        }
        self.insert_inline(offset, InlineContent::LineBreak);
    }

    fn insert_inline(&mut self, offset: usize, inline: InlineContent) {
        let right = self.split_content_at(offset);
        self.content.push(inline);
        self.content.extend(right);
        self.normalize();
    }
}

/// Split inline content at a flattened offset, descending into nested wrappers.
pub(crate) fn split_inline(
    content: &[InlineContent],
    offset: usize,
) -> (Vec<InlineContent>, Vec<InlineContent>) {
    let mut left: Vec<InlineContent> = Vec::new();
    let mut right: Vec<InlineContent> = Vec::new();
    let mut pos = 0usize;
    let mut done = false;

    for item in content {
        if done {
            right.push(item.clone());
            continue;
        }
        let len = item.text_len();
        if pos + len <= offset {
            left.push(item.clone());
            pos += len;
            done = pos == offset && offset > 0;
            continue;
        }
        // offset falls within this item (or at its very start)
        let local = offset - pos;
        match item {
            InlineContent::Text(run) => {
                let (l, r) = run.split_at(local);
                if !l.is_empty() {
                    left.push(InlineContent::Text(l));
                }
                if !r.is_empty() {
                    right.push(InlineContent::Text(r));
                }
            }
            InlineContent::Nested {
                kind,
                content: inner,
            } => {
                let (l_inner, r_inner) = split_inline(inner, local);
                if !l_inner.is_empty() {
                    left.push(InlineContent::Nested {
                        kind: *kind,
                        content: l_inner,
                    });
                }
                if !r_inner.is_empty() {
                    right.push(InlineContent::Nested {
                        kind: *kind,
                        content: r_inner,
                    });
                }
            }
            InlineContent::LineBreak => {
                // local is 0 here; the break belongs to the right side
                right.push(item.clone());
            }
        }
        done = true;
    }

    (left, right)
}

/// Canonical inline content: no empty runs, equal-style neighbours merged,
/// empty wrappers dropped, wrappers never nested inside wrappers.
pub(crate) fn normalize_inline(
    content: &[InlineContent],
    inside_nested: bool,
) -> Vec<InlineContent> {
    let mut out: Vec<InlineContent> = Vec::new();
    for item in content {
        match item {
            InlineContent::Text(run) => {
                if run.is_empty() {
                    continue;
                }
                if let Some(InlineContent::Text(prev)) = out.last_mut()
                    && prev.style == run.style
                {
                    prev.text.push_str(&run.text);
                    continue;
                }
                out.push(item.clone());
            }
            InlineContent::Nested {
                kind,
                content: inner,
            } => {
                if inside_nested {
                    for child in normalize_inline(inner, true) {
                        push_merged(&mut out, child);
                    }
                    continue;
                }
                let inner = normalize_inline(inner, true);
                if inner.is_empty() {
                    continue;
                }
                out.push(InlineContent::Nested {
                    kind: *kind,
                    content: inner,
                });
            }
            InlineContent::LineBreak => out.push(InlineContent::LineBreak),
        }
    }
    out
}

fn push_merged(out: &mut Vec<InlineContent>, item: InlineContent) {
    if let InlineContent::Text(run) = &item
        && let Some(InlineContent::Text(prev)) = out.last_mut()
        && prev.style == run.style
    {
        prev.text.push_str(&run.text);
        return;
    }
    out.push(item);
}

/// Apply a style change to every text run, recursing into nested wrappers
pub(crate) fn map_style_on_runs<F>(items: Vec<InlineContent>, apply: &mut F) -> Vec<InlineContent>
where
    F: FnMut(&mut TextStyle),
{
    items
        .into_iter()
        .map(|item| match item {
            InlineContent::Text(mut run) => {
                apply(&mut run.style);
                InlineContent::Text(run)
            }
            InlineContent::Nested { kind, content } => InlineContent::Nested {
                kind,
                content: map_style_on_runs(content, apply),
            },
            other => other,
        })
        .collect()
}

fn collect_runs<'a>(items: &'a [InlineContent], out: &mut Vec<&'a TextRun>) {
    for item in items {
        match item {
            InlineContent::Text(run) => out.push(run),
            InlineContent::Nested { content, .. } => collect_runs(content, out),
            InlineContent::LineBreak => {}
        }
    }
}

/// Strip nested wrappers, keeping their children in place
fn unwrap_nested(items: Vec<InlineContent>) -> Vec<InlineContent> {
    let mut out = Vec::new();
    for item in items {
        match item {
            InlineContent::Nested { content, .. } => out.extend(unwrap_nested(content)),
            other => out.push(other),
        }
    }
    out
}

fn char_boundary_at_or_before(text: &str, offset: usize) -> usize {
    let mut offset = min(offset, text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

fn grapheme_boundaries(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.grapheme_indices(true)
        .map(|(idx, _)| idx)
        .chain(std::iter::once(text.len()))
}

fn grapheme_offset_at_or_before(text: &str, offset: usize) -> usize {
    let max_offset = offset.min(text.len());
    let mut result = 0usize;
    for boundary in grapheme_boundaries(text) {
        if boundary > max_offset {
            break;
        }
        result = boundary;
    }
    result
}

fn grapheme_offset_before(text: &str, offset: usize) -> usize {
    let max_offset = offset.min(text.len());
    let mut previous = 0usize;
    for boundary in grapheme_boundaries(text) {
        if boundary >= max_offset {
            break;
        }
        previous = boundary;
    }
    previous
}

fn grapheme_offset_after(text: &str, offset: usize) -> usize {
    let max_offset = offset.min(text.len());
    grapheme_boundaries(text)
        .find(|&boundary| boundary > max_offset)
        .unwrap_or(text.len())
}

/// Position within a document
/// This represents a logical cursor position in the structured content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DocumentPosition {
    pub block_index: usize,
    pub offset: usize, // Byte offset within the block's flattened text
}

impl DocumentPosition {
    pub fn new(block_index: usize, offset: usize) -> Self {
        DocumentPosition {
            block_index,
            offset,
        }
    }

    pub fn start() -> Self {
        DocumentPosition::new(0, 0)
    }
}

/// A span between two positions, in either direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentRange {
    pub start: DocumentPosition,
    pub end: DocumentPosition,
}

impl DocumentRange {
    pub fn new(start: DocumentPosition, end: DocumentPosition) -> Self {
        DocumentRange { start, end }
    }

    /// A range inside a single block
    pub fn in_block(block_index: usize, start: usize, end: usize) -> Self {
        Self::new(
            DocumentPosition::new(block_index, start),
            DocumentPosition::new(block_index, end),
        )
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Endpoints in document order
    pub fn ordered(&self) -> (DocumentPosition, DocumentPosition) {
        if self.end < self.start {
            (self.end, self.start)
        } else {
            (self.start, self.end)
        }
    }
}

/// Weak, positional reference to a block.
///
/// The index is tried first; if the block there has a different id the
/// reference is looked up by id, and fails when the block is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub index: usize,
    pub id: ElementId,
}

/// Inline formatting commands understood by the content model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineFormat {
    Bold,
    Italic,
    Heading { level: u8 },
    Quote,
    List { ordered: bool },
}

/// The structured document
#[derive(Debug, Clone)]
pub struct StructuredDocument {
    blocks: Vec<Block>,
    next_id: ElementId,
}

impl PartialEq for StructuredDocument {
    fn eq(&self, other: &Self) -> bool {
        self.blocks == other.blocks
    }
}

impl StructuredDocument {
    pub fn new() -> Self {
        StructuredDocument {
            blocks: Vec::new(),
            next_id: 1,
        }
    }

    /// Build a document from blocks, assigning ids
    pub fn from_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        let mut doc = Self::new();
        for block in blocks {
            doc.add_block(block);
        }
        doc
    }

    /// Create a simple document with one paragraph
    pub fn with_paragraph(text: impl Into<String>) -> Self {
        Self::from_blocks([Block::paragraph().with_plain_text(text)])
    }

    /// Get a unique element ID
    fn next_id(&mut self) -> ElementId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn assign_id(&mut self, block: &mut Block) {
        if block.id == 0 || self.find_block_index(block.id).is_some() {
            block.id = self.next_id();
        }
    }

    /// Get blocks
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Get mutable blocks
    pub fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Add a block
    pub fn add_block(&mut self, mut block: Block) {
        self.assign_id(&mut block);
        self.blocks.push(block);
    }

    /// Insert a block at a specific position
    pub fn insert_block(&mut self, index: usize, mut block: Block) {
        self.assign_id(&mut block);
        let index = index.min(self.blocks.len());
        self.blocks.insert(index, block);
    }

    /// Remove a block
    pub fn remove_block(&mut self, index: usize) -> Option<Block> {
        if index < self.blocks.len() {
            Some(self.blocks.remove(index))
        } else {
            None
        }
    }

    /// Get block count
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Check if document is empty
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Find block by ID
    pub fn find_block(&self, id: ElementId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    /// Find block index by ID
    pub fn find_block_index(&self, id: ElementId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    /// Take a weak reference to the block at `index`
    pub fn block_ref(&self, index: usize) -> Option<BlockRef> {
        self.blocks
            .get(index)
            .map(|block| BlockRef { index, id: block.id })
    }

    /// Resolve a weak reference to a current index
    pub fn resolve(&self, target: BlockRef) -> Option<usize> {
        match self.blocks.get(target.index) {
            Some(block) if block.id == target.id => Some(target.index),
            _ => self.find_block_index(target.id),
        }
    }

    /// Replace the referenced block in place, keeping its index
    pub fn replace_block(&mut self, target: BlockRef, mut block: Block) -> EditResult<BlockRef> {
        let index = self.resolve(target).ok_or(EditError::StaleReference)?;
        block.id = self.next_id();
        block.normalize();
        self.blocks[index] = block;
        Ok(BlockRef {
            index,
            id: self.blocks[index].id,
        })
    }

    /// Insert a block directly after the referenced one
    pub fn insert_block_after(&mut self, target: BlockRef, mut block: Block) -> EditResult<BlockRef> {
        let index = self.resolve(target).ok_or(EditError::StaleReference)? + 1;
        block.normalize();
        self.insert_block(index, block);
        Ok(BlockRef {
            index,
            id: self.blocks[index].id,
        })
    }

    /// Validate and clamp a position to document bounds and grapheme boundaries
    pub fn clamp_position(&self, pos: DocumentPosition) -> DocumentPosition {
        if self.blocks.is_empty() {
            return DocumentPosition::start();
        }

        let block_index = pos.block_index.min(self.blocks.len() - 1);
        let text = self.blocks[block_index].to_plain_text();
        let offset = grapheme_offset_at_or_before(&text, pos.offset);

        DocumentPosition::new(block_index, offset)
    }

    /// Get the previous grapheme position within the same block
    pub fn previous_grapheme_position(&self, pos: DocumentPosition) -> DocumentPosition {
        let pos = self.clamp_position(pos);
        let offset = self
            .blocks
            .get(pos.block_index)
            .map(|block| grapheme_offset_before(&block.to_plain_text(), pos.offset))
            .unwrap_or(0);
        DocumentPosition::new(pos.block_index, offset)
    }

    /// Get the next grapheme position within the same block
    pub fn next_grapheme_position(&self, pos: DocumentPosition) -> DocumentPosition {
        let pos = self.clamp_position(pos);
        let offset = self
            .blocks
            .get(pos.block_index)
            .map(|block| grapheme_offset_after(&block.to_plain_text(), pos.offset))
            .unwrap_or(0);
        DocumentPosition::new(pos.block_index, offset)
    }

    /// Position at the end of a block
    pub fn end_of_block(&self, block_index: usize) -> DocumentPosition {
        let len = self.blocks.get(block_index).map_or(0, Block::text_len);
        DocumentPosition::new(block_index, len)
    }

    /// Convert to plain text
    pub fn to_plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.to_plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Delete content in [start..end) across blocks.
    ///
    /// Blocks strictly inside the range are removed. The tail of the end block is
    /// merged into the start block; an image or divider at the start of the range
    /// is removed, one at the end is kept.
    pub fn delete_range(&mut self, start: DocumentPosition, end: DocumentPosition) {
        if self.blocks.is_empty() {
            return;
        }
        let (a, b) = DocumentRange::new(self.clamp_position(start), self.clamp_position(end))
            .ordered();

        if a.block_index == b.block_index {
            self.blocks[a.block_index].delete_text_range(a.offset, b.offset);
            return;
        }

        let start_is_text = self.blocks[a.block_index].block_type.is_text_bearing();
        if start_is_text {
            let block = &mut self.blocks[a.block_index];
            let len = block.text_len();
            block.delete_text_range(a.offset, len);
        }

        // Drop everything strictly between the two endpoints
        self.blocks.drain(a.block_index + 1..b.block_index);
        let end_index = a.block_index + 1;

        if self.blocks[end_index].block_type.is_text_bearing() {
            let tail = self.blocks[end_index].split_content_at(b.offset);
            if start_is_text {
                self.blocks.remove(end_index);
                let block = &mut self.blocks[a.block_index];
                if block.is_placeholder() {
                    block.content.clear();
                }
                block.content.extend(tail);
                block.normalize();
            } else {
                let block = &mut self.blocks[end_index];
                block.content = tail;
                block.normalize();
            }
        }

        if !start_is_text {
            self.blocks.remove(a.block_index);
        }
    }

    /// Per-block pieces of a range: (block_index, start_offset, end_offset)
    fn range_segments(&self, start: DocumentPosition, end: DocumentPosition) -> Vec<(usize, usize, usize)> {
        (start.block_index..=end.block_index)
            .filter_map(|index| {
                let block = &self.blocks[index];
                if !block.block_type.is_text_bearing() {
                    return None;
                }
                let len = block.text_len();
                let from = if index == start.block_index {
                    start.offset.min(len)
                } else {
                    0
                };
                let to = if index == end.block_index {
                    end.offset.min(len)
                } else {
                    len
                };
                (from < to).then_some((index, from, to))
            })
            .collect()
    }

    /// Apply an inline format to a range; a collapsed range is a no-op
    pub fn apply_inline_format(&mut self, range: DocumentRange, format: InlineFormat) -> EditResult {
        if range.is_collapsed() {
            return Ok(());
        }
        let (start, end) = range.ordered();
        if end.block_index >= self.blocks.len() {
            return Err(EditError::InvalidBlockIndex);
        }

        match format {
            InlineFormat::Bold => {
                self.toggle_style_in_range(start, end, |style| style.bold, |style, on| {
                    style.bold = on;
                });
            }
            InlineFormat::Italic => {
                self.toggle_style_in_range(start, end, |style| style.italic, |style, on| {
                    style.italic = on;
                });
            }
            InlineFormat::Heading { level } => self.wrap_range(
                start,
                end,
                NestedKind::Heading {
                    level: level.clamp(1, 6),
                },
            ),
            InlineFormat::Quote => self.wrap_range(start, end, NestedKind::Quote),
            InlineFormat::List { ordered } => self.toggle_list_in_range(start, end, ordered),
        }
        Ok(())
    }

    /// Set a style flag over the range, or clear it if every selected run already has it
    fn toggle_style_in_range<G, S>(
        &mut self,
        start: DocumentPosition,
        end: DocumentPosition,
        get: G,
        mut set: S,
    ) where
        G: Fn(&TextStyle) -> bool,
        S: FnMut(&mut TextStyle, bool),
    {
        let segments = self.range_segments(start, end);

        let mut selected_runs: Vec<TextRun> = Vec::new();
        for &(index, from, to) in &segments {
            let (_, rest) = split_inline(&self.blocks[index].content, from);
            let (selected, _) = split_inline(&rest, to - from);
            let mut runs = Vec::new();
            collect_runs(&selected, &mut runs);
            selected_runs.extend(runs.into_iter().cloned());
        }
        let turn_on = selected_runs.is_empty() || !selected_runs.iter().all(|run| get(&run.style));

        for (index, from, to) in segments {
            let block = &mut self.blocks[index];
            let (before, rest) = split_inline(&block.content, from);
            let (selected, after) = split_inline(&rest, to - from);
            let styled = map_style_on_runs(selected, &mut |style| set(style, turn_on));
            block.content = before;
            block.content.extend(styled);
            block.content.extend(after);
            block.normalize();
        }
    }

    /// Wrap the selected text of each touched block in a nested wrapper
    fn wrap_range(&mut self, start: DocumentPosition, end: DocumentPosition, kind: NestedKind) {
        for (index, from, to) in self.range_segments(start, end) {
            let block = &mut self.blocks[index];
            let (before, rest) = split_inline(&block.content, from);
            let (selected, after) = split_inline(&rest, to - from);
            block.content = before;
            block.content.push(InlineContent::Nested {
                kind,
                content: unwrap_nested(selected),
            });
            block.content.extend(after);
            block.normalize();
        }
    }

    /// Turn every text block in the range into a list item of the given kind,
    /// or back into paragraphs when they all already are
    fn toggle_list_in_range(&mut self, start: DocumentPosition, end: DocumentPosition, ordered: bool) {
        let target = BlockType::ListItem { ordered };
        let touched: Vec<usize> = (start.block_index..=end.block_index)
            .filter(|&index| self.blocks[index].block_type.is_text_bearing())
            .collect();
        let all_listed = touched
            .iter()
            .all(|&index| self.blocks[index].block_type == target);

        for index in touched {
            self.blocks[index].block_type = if all_listed {
                BlockType::Paragraph
            } else {
                target.clone()
            };
        }
    }
}

impl Default for StructuredDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StructuredDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "StructuredDocument ({} blocks):", self.blocks.len())?;
        for (i, block) in self.blocks.iter().enumerate() {
            write!(f, "  [{}] ", i)?;
            match &block.block_type {
                BlockType::Paragraph => write!(f, "Paragraph")?,
                BlockType::Heading { level } => write!(f, "Heading(h{})", level)?,
                BlockType::BlockQuote => write!(f, "BlockQuote")?,
                BlockType::ListItem { ordered } => write!(
                    f,
                    "ListItem({})",
                    if *ordered { "ordered" } else { "unordered" }
                )?,
                BlockType::Image { source } => write!(f, "Image({})", source)?,
                BlockType::Divider => write!(f, "Divider")?,
            }
            writeln!(f, ": {:?}", block.to_plain_text())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_run() {
        let run = TextRun::plain("hello world");
        assert_eq!(run.len(), 11);

        let (left, right) = run.split_at(5);
        assert_eq!(left.text, "hello");
        assert_eq!(right.text, " world");
    }

    #[test]
    fn test_split_at_snaps_to_char_boundary() {
        let run = TextRun::plain("héllo");
        let (left, right) = run.split_at(2);
        assert_eq!(left.text, "h");
        assert_eq!(right.text, "éllo");
    }

    #[test]
    fn test_block_text_len() {
        let block = Block::paragraph()
            .with_plain_text("hello")
            .with_text(" world", TextStyle::bold());

        assert_eq!(block.text_len(), 11);
        assert_eq!(block.to_plain_text(), "hello world");
    }

    #[test]
    fn test_new_text_block_is_placeholder() {
        let block = Block::heading(2);
        assert!(block.is_placeholder());
        assert!(block.is_empty());
        assert_eq!(block.text_len(), 0);
        assert!(Block::image("a.png").content.is_empty());
        assert!(!Block::divider().is_empty());
    }

    #[test]
    fn test_two_breaks_are_not_empty() {
        let block =
            Block::paragraph().with_content(vec![InlineContent::LineBreak, InlineContent::LineBreak]);
        assert!(block.to_plain_text().trim().is_empty());
        assert!(!block.is_empty());
    }

    #[test]
    fn test_normalize_merges_runs() {
        let mut block = Block::paragraph();
        block.content = vec![
            InlineContent::Text(TextRun::plain("hel")),
            InlineContent::Text(TextRun::plain("")),
            InlineContent::Text(TextRun::plain("lo")),
            InlineContent::Nested {
                kind: NestedKind::Quote,
                content: vec![],
            },
        ];
        assert!(block.normalize());
        assert_eq!(block.content, vec![InlineContent::Text(TextRun::plain("hello"))]);
        assert!(!block.normalize());
    }

    #[test]
    fn test_normalize_flattens_nested_wrappers() {
        let inner = InlineContent::Nested {
            kind: NestedKind::Quote,
            content: vec![InlineContent::Text(TextRun::plain("b"))],
        };
        let mut block = Block::paragraph();
        block.content = vec![InlineContent::Nested {
            kind: NestedKind::Heading { level: 2 },
            content: vec![InlineContent::Text(TextRun::plain("a")), inner],
        }];
        block.normalize();
        assert_eq!(
            block.content,
            vec![InlineContent::Nested {
                kind: NestedKind::Heading { level: 2 },
                content: vec![InlineContent::Text(TextRun::plain("ab"))],
            }]
        );
    }

    #[test]
    fn test_document_creation() {
        let mut doc = StructuredDocument::new();
        doc.add_block(Block::paragraph().with_plain_text("First paragraph"));
        doc.add_block(Block::heading(1).with_plain_text("A heading"));

        assert_eq!(doc.block_count(), 2);
        assert_ne!(doc.blocks()[0].id, doc.blocks()[1].id);
    }

    #[test]
    fn test_position_clamping() {
        let doc = StructuredDocument::with_paragraph("hello");

        let pos = DocumentPosition::new(0, 100);
        let clamped = doc.clamp_position(pos);
        assert_eq!(clamped.offset, 5); // Length of "hello"
    }

    #[test]
    fn test_position_clamping_to_grapheme() {
        let doc = StructuredDocument::with_paragraph("e\u{301}x");
        let clamped = doc.clamp_position(DocumentPosition::new(0, 2));
        assert_eq!(clamped.offset, 0);
        let next = doc.next_grapheme_position(DocumentPosition::start());
        assert_eq!(next.offset, 3);
    }

    #[test]
    fn test_replace_block_keeps_index() {
        let mut doc = StructuredDocument::from_blocks([
            Block::paragraph().with_plain_text("one"),
            Block::paragraph(),
            Block::paragraph().with_plain_text("three"),
        ]);
        let target = doc.block_ref(1).unwrap();
        let replaced = doc.replace_block(target, Block::quote()).unwrap();
        assert_eq!(replaced.index, 1);
        assert_eq!(doc.blocks()[1].kind(), BlockKind::Quote);
        assert_eq!(doc.block_count(), 3);
    }

    #[test]
    fn test_stale_reference_is_a_no_op() {
        let mut doc = StructuredDocument::with_paragraph("text");
        let target = doc.block_ref(0).unwrap();
        doc.remove_block(0);
        doc.add_block(Block::paragraph().with_plain_text("other"));
        let before = doc.clone();

        assert_eq!(
            doc.replace_block(target, Block::divider()),
            Err(EditError::StaleReference)
        );
        assert_eq!(
            doc.insert_block_after(target, Block::divider()),
            Err(EditError::StaleReference)
        );
        assert_eq!(doc, before);
    }

    #[test]
    fn test_block_ref_follows_moved_block() {
        let mut doc = StructuredDocument::from_blocks([
            Block::paragraph().with_plain_text("a"),
            Block::paragraph().with_plain_text("b"),
        ]);
        let target = doc.block_ref(1).unwrap();
        doc.insert_block(0, Block::divider());
        assert_eq!(doc.resolve(target), Some(2));
    }

    #[test]
    fn test_delete_range_within_block() {
        let mut doc = StructuredDocument::with_paragraph("Hello world");
        doc.delete_range(DocumentPosition::new(0, 5), DocumentPosition::new(0, 11));
        assert_eq!(doc.blocks()[0].to_plain_text(), "Hello");
    }

    #[test]
    fn test_delete_range_across_blocks_merges() {
        let mut doc = StructuredDocument::from_blocks([
            Block::paragraph().with_plain_text("First para"),
            Block::paragraph().with_plain_text("Second"),
            Block::paragraph().with_plain_text("Third para"),
        ]);

        // Delete from after "Fir" in block 0 to after "Th" in block 2
        doc.delete_range(DocumentPosition::new(0, 3), DocumentPosition::new(2, 2));

        assert_eq!(doc.block_count(), 1);
        assert_eq!(doc.blocks()[0].to_plain_text(), "Firird para");
    }

    #[test]
    fn test_delete_range_removes_leading_image() {
        let mut doc = StructuredDocument::from_blocks([
            Block::image("x.png"),
            Block::paragraph().with_plain_text("caption"),
        ]);
        doc.delete_range(DocumentPosition::new(0, 0), DocumentPosition::new(1, 3));
        assert_eq!(doc.block_count(), 1);
        assert_eq!(doc.blocks()[0].to_plain_text(), "tion");
    }

    #[test]
    fn test_bold_wraps_selection() {
        let mut doc = StructuredDocument::with_paragraph("hello world");
        doc.apply_inline_format(DocumentRange::in_block(0, 6, 11), InlineFormat::Bold)
            .unwrap();
        assert_eq!(
            doc.blocks()[0].content,
            vec![
                InlineContent::Text(TextRun::plain("hello ")),
                InlineContent::Text(TextRun::new("world", TextStyle::bold())),
            ]
        );
    }

    #[test]
    fn test_bold_twice_restores_plain_run() {
        let mut doc = StructuredDocument::with_paragraph("hello world");
        let range = DocumentRange::in_block(0, 6, 11);
        doc.apply_inline_format(range, InlineFormat::Bold).unwrap();
        doc.apply_inline_format(range, InlineFormat::Bold).unwrap();
        assert_eq!(
            doc.blocks()[0].content,
            vec![InlineContent::Text(TextRun::plain("hello world"))]
        );
    }

    #[test]
    fn test_collapsed_range_is_a_no_op() {
        let mut doc = StructuredDocument::with_paragraph("hello");
        let before = doc.clone();
        doc.apply_inline_format(DocumentRange::in_block(0, 2, 2), InlineFormat::Italic)
            .unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn test_heading_wraps_only_selected_text() {
        let mut doc = StructuredDocument::with_paragraph("intro title rest");
        doc.apply_inline_format(
            DocumentRange::in_block(0, 6, 11),
            InlineFormat::Heading { level: 2 },
        )
        .unwrap();
        let block = &doc.blocks()[0];
        assert_eq!(block.block_type, BlockType::Paragraph);
        assert_eq!(
            block.content,
            vec![
                InlineContent::Text(TextRun::plain("intro ")),
                InlineContent::Nested {
                    kind: NestedKind::Heading { level: 2 },
                    content: vec![InlineContent::Text(TextRun::plain("title"))],
                },
                InlineContent::Text(TextRun::plain(" rest")),
            ]
        );
        assert_eq!(block.to_plain_text(), "intro title rest");
    }

    #[test]
    fn test_list_toggle_across_blocks() {
        let mut doc = StructuredDocument::from_blocks([
            Block::paragraph().with_plain_text("one"),
            Block::heading(2).with_plain_text("two"),
        ]);
        let range = DocumentRange::new(DocumentPosition::new(0, 1), DocumentPosition::new(1, 1));
        doc.apply_inline_format(range, InlineFormat::List { ordered: true })
            .unwrap();
        assert!(
            doc.blocks()
                .iter()
                .all(|b| b.block_type == BlockType::ListItem { ordered: true })
        );
        doc.apply_inline_format(range, InlineFormat::List { ordered: true })
            .unwrap();
        assert!(doc.blocks().iter().all(|b| b.block_type == BlockType::Paragraph));
    }

    #[test]
    fn test_format_out_of_range_block() {
        let mut doc = StructuredDocument::with_paragraph("x");
        let range = DocumentRange::new(DocumentPosition::new(0, 0), DocumentPosition::new(4, 1));
        assert_eq!(
            doc.apply_inline_format(range, InlineFormat::Bold),
            Err(EditError::InvalidBlockIndex)
        );
    }
}
