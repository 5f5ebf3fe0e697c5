// Selection / cursor tracking
// Translates host caret reports into document positions and derives the
// selection state the toolbar and the insertion menu are driven by.

use std::time::{Duration, Instant};

use super::structured_document::*;
use super::structured_editor::StructuredEditor;

/// The node the host reports the caret in.
///
/// `Inline` paths index into the block's inline content, descending through
/// nested wrappers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaretContainer {
    /// The editable surface itself, outside any block
    Root,
    Block(usize),
    Inline { block: usize, path: Vec<usize> },
}

impl CaretContainer {
    /// The enclosing container, `None` at the root
    pub fn parent(&self) -> Option<CaretContainer> {
        match self {
            CaretContainer::Root => None,
            CaretContainer::Block(_) => Some(CaretContainer::Root),
            CaretContainer::Inline { block, path } if path.len() <= 1 => {
                Some(CaretContainer::Block(*block))
            }
            CaretContainer::Inline { block, path } => Some(CaretContainer::Inline {
                block: *block,
                path: path[..path.len() - 1].to_vec(),
            }),
        }
    }
}

/// Raw caret as reported by the host: a container plus an offset local to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCaret {
    pub container: CaretContainer,
    pub offset: usize,
}

impl HostCaret {
    pub fn new(container: CaretContainer, offset: usize) -> Self {
        HostCaret { container, offset }
    }

    /// Caret at a flattened offset of a block
    pub fn in_block(block: usize, offset: usize) -> Self {
        Self::new(CaretContainer::Block(block), offset)
    }

    /// Caret inside an inline node
    pub fn in_inline(block: usize, path: Vec<usize>, offset: usize) -> Self {
        Self::new(CaretContainer::Inline { block, path }, offset)
    }

    /// Caret on the editable surface itself
    pub fn at_root(offset: usize) -> Self {
        Self::new(CaretContainer::Root, offset)
    }
}

/// Host events after which the selection state is recomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorEvent {
    Input,
    KeyUp,
    Click,
    Focus,
    SelectionChange,
}

/// Derived, ephemeral view of the caret and selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub active_block: Option<BlockRef>,
    pub caret: DocumentPosition,
    pub range: Option<DocumentRange>,
    pub has_range_selection: bool,
    pub is_empty_block_at_start: bool,
}

impl Default for SelectionState {
    fn default() -> Self {
        SelectionState {
            active_block: None,
            caret: DocumentPosition::start(),
            range: None,
            has_range_selection: false,
            is_empty_block_at_start: false,
        }
    }
}

/// Resolve a host caret to a document position.
///
/// Walks up from the reported container until a text block is reached. Reaching
/// the root, an image or divider, or a container that no longer exists points at
/// the first block.
pub fn resolve_caret(doc: &StructuredDocument, caret: &HostCaret) -> DocumentPosition {
    let mut node = caret.container.clone();
    let mut offset = caret.offset;

    loop {
        match &node {
            CaretContainer::Block(index)
                if doc
                    .block(*index)
                    .is_some_and(|block| block.block_type.is_text_bearing()) =>
            {
                return doc.clamp_position(DocumentPosition::new(*index, offset));
            }
            CaretContainer::Inline { block, path } => {
                let Some(in_parent) = offset_in_parent(doc, *block, path, offset) else {
                    tracing::debug!(?caret, "caret path is stale, using the first block");
                    return DocumentPosition::start();
                };
                offset = in_parent;
            }
            CaretContainer::Block(_) | CaretContainer::Root => {
                if node != CaretContainer::Root {
                    tracing::debug!(?caret, "caret is not in a text block, using the first block");
                }
                return DocumentPosition::start();
            }
        }
        let Some(parent) = node.parent() else {
            return DocumentPosition::start();
        };
        node = parent;
    }
}

/// Offset of `local` inside the node at `path`, measured from the start of its parent
fn offset_in_parent(
    doc: &StructuredDocument,
    block: usize,
    path: &[usize],
    local: usize,
) -> Option<usize> {
    let (&child, parent_path) = path.split_last()?;
    let siblings = children_at(&doc.block(block)?.content, parent_path)?;
    let node = siblings.get(child)?;
    let before: usize = siblings[..child].iter().map(InlineContent::text_len).sum();
    Some(before + local.min(node.text_len()))
}

fn children_at<'a>(content: &'a [InlineContent], path: &[usize]) -> Option<&'a [InlineContent]> {
    match path.split_first() {
        None => Some(content),
        Some((&index, rest)) => match content.get(index)? {
            InlineContent::Nested { content, .. } => children_at(content, rest),
            _ => None,
        },
    }
}

/// Compute the selection state from the editor's caret and selection
pub fn compute_selection_state(editor: &StructuredEditor) -> SelectionState {
    let doc = editor.document();
    let caret = doc.clamp_position(editor.cursor());
    let range = editor.selection_range();
    let has_range_selection = range.is_some();
    let active_block = doc.block_ref(caret.block_index).or_else(|| doc.block_ref(0));
    let is_empty_block_at_start = !has_range_selection
        && caret.offset == 0
        && active_block
            .and_then(|target| doc.block(target.index))
            .is_some_and(Block::is_empty);

    SelectionState {
        active_block,
        caret,
        range,
        has_range_selection,
        is_empty_block_at_start,
    }
}

/// Debounces selection recomputation behind a fixed delay.
///
/// Every trigger restarts the delay; the recomputation becomes due once the
/// delay has passed without further triggers.
#[derive(Debug, Clone)]
pub struct SelectionScheduler {
    delay: Duration,
    due_at: Option<Instant>,
}

impl SelectionScheduler {
    pub fn new(delay: Duration) -> Self {
        SelectionScheduler {
            delay,
            due_at: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&mut self, now: Instant) {
        self.due_at = Some(now + self.delay);
    }

    pub fn is_pending(&self) -> bool {
        self.due_at.is_some()
    }

    /// Returns true once when the scheduled recomputation is due
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.due_at {
            Some(due) if now >= due => {
                self.due_at = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> StructuredDocument {
        StructuredDocument::from_blocks([
            Block::paragraph().with_content(vec![
                InlineContent::Text(TextRun::plain("intro ")),
                InlineContent::Nested {
                    kind: NestedKind::Quote,
                    content: vec![
                        InlineContent::Text(TextRun::plain("said ")),
                        InlineContent::Text(TextRun::new("this", TextStyle::bold())),
                    ],
                },
            ]),
            Block::paragraph(),
        ])
    }

    #[test]
    fn test_resolve_block_caret() {
        let doc = sample_doc();
        let pos = resolve_caret(&doc, &HostCaret::in_block(0, 3));
        assert_eq!(pos, DocumentPosition::new(0, 3));
    }

    #[test]
    fn test_resolve_walks_up_through_nested_inline() {
        let doc = sample_doc();
        // "this" is child 1 of the nested quote, which is child 1 of the block
        let pos = resolve_caret(&doc, &HostCaret::in_inline(0, vec![1, 1], 2));
        assert_eq!(pos, DocumentPosition::new(0, 6 + 5 + 2));
    }

    #[test]
    fn test_resolve_root_points_at_first_block() {
        let doc = sample_doc();
        assert_eq!(
            resolve_caret(&doc, &HostCaret::at_root(1)),
            DocumentPosition::start()
        );
    }

    #[test]
    fn test_resolve_stale_containers_fall_back() {
        let doc = sample_doc();
        assert_eq!(
            resolve_caret(&doc, &HostCaret::in_block(9, 2)),
            DocumentPosition::start()
        );
        assert_eq!(
            resolve_caret(&doc, &HostCaret::in_inline(0, vec![7], 0)),
            DocumentPosition::start()
        );
    }

    #[test]
    fn test_resolve_skips_blocks_without_text() {
        let doc = StructuredDocument::from_blocks([
            Block::paragraph().with_plain_text("caption"),
            Block::image("x.png"),
            Block::divider(),
            Block::paragraph(),
        ]);
        assert_eq!(
            resolve_caret(&doc, &HostCaret::in_block(1, 0)),
            DocumentPosition::start()
        );
        assert_eq!(
            resolve_caret(&doc, &HostCaret::in_block(2, 0)),
            DocumentPosition::start()
        );
        assert_eq!(
            resolve_caret(&doc, &HostCaret::in_block(3, 0)),
            DocumentPosition::new(3, 0)
        );
    }

    #[test]
    fn test_parent_chain_reaches_root() {
        let mut node = CaretContainer::Inline {
            block: 2,
            path: vec![0, 1],
        };
        let mut depth = 0;
        while let Some(parent) = node.parent() {
            node = parent;
            depth += 1;
        }
        assert_eq!(node, CaretContainer::Root);
        assert_eq!(depth, 3);
    }

    #[test]
    fn test_empty_block_at_start() {
        let mut editor = StructuredEditor::with_document(sample_doc());
        editor.set_cursor(DocumentPosition::new(1, 0));
        let state = compute_selection_state(&editor);
        assert!(state.is_empty_block_at_start);
        assert_eq!(state.active_block.map(|b| b.index), Some(1));

        editor.insert_text("x").unwrap();
        let state = compute_selection_state(&editor);
        assert!(!state.is_empty_block_at_start);
    }

    #[test]
    fn test_range_selection_state() {
        let mut editor = StructuredEditor::with_document(sample_doc());
        editor.set_selection(DocumentPosition::new(0, 0), DocumentPosition::new(0, 5));
        let state = compute_selection_state(&editor);
        assert!(state.has_range_selection);
        assert!(!state.is_empty_block_at_start);

        editor.move_cursor_right();
        assert!(!compute_selection_state(&editor).has_range_selection);
    }

    #[test]
    fn test_scheduler_debounces() {
        let start = Instant::now();
        let mut scheduler = SelectionScheduler::new(Duration::from_millis(30));
        scheduler.schedule(start);
        assert!(!scheduler.take_due(start + Duration::from_millis(10)));
        scheduler.schedule(start + Duration::from_millis(20));
        assert!(!scheduler.take_due(start + Duration::from_millis(40)));
        assert!(scheduler.take_due(start + Duration::from_millis(50)));
        assert!(!scheduler.take_due(start + Duration::from_millis(60)));
    }

    #[test]
    fn test_zero_delay_is_due_immediately() {
        let now = Instant::now();
        let mut scheduler = SelectionScheduler::new(Duration::ZERO);
        scheduler.schedule(now);
        assert!(scheduler.take_due(now));
    }
}
