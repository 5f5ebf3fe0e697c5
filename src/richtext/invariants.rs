// Structural invariants
// Run after every mutation so the document always offers a caret position:
// at least one block, no loose text at the top level, canonical inline content,
// and a text block after a terminal image or divider.

use super::structured_document::*;

/// A top-level node as it comes out of the parser, before wrapping
#[derive(Debug, Clone, PartialEq)]
pub enum TopLevelNode {
    Block(Block),
    Loose(InlineContent),
}

/// Restore document invariants. Returns whether anything changed.
///
/// Running it a second time in a row never changes anything.
pub fn enforce(doc: &mut StructuredDocument) -> bool {
    let mut changed = false;
    for block in doc.blocks_mut().iter_mut() {
        changed |= block.normalize();
    }

    if doc.is_empty() {
        tracing::debug!("document lost its last block, adding an empty paragraph");
        doc.add_block(Block::paragraph());
        changed = true;
    }

    changed
}

/// Wrap each run of loose text/line-break nodes into a paragraph, in place.
///
/// A run made only of line breaks becomes an empty placeholder paragraph.
pub fn wrap_loose_nodes(nodes: Vec<TopLevelNode>) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut loose: Vec<InlineContent> = Vec::new();

    fn flush(loose: &mut Vec<InlineContent>, blocks: &mut Vec<Block>) {
        if loose.is_empty() {
            return;
        }
        let mut block = Block::paragraph();
        let visible = loose.iter().any(|item| !matches!(item, InlineContent::LineBreak));
        block.content = if visible {
            std::mem::take(loose)
        } else {
            loose.clear();
            vec![InlineContent::LineBreak]
        };
        block.normalize();
        blocks.push(block);
    }

    for node in nodes {
        match node {
            TopLevelNode::Block(block) => {
                flush(&mut loose, &mut blocks);
                blocks.push(block);
            }
            TopLevelNode::Loose(inline) => loose.push(inline),
        }
    }
    flush(&mut loose, &mut blocks);

    blocks
}

/// Build a document from parsed top-level nodes and enforce its invariants
pub fn document_from_nodes(nodes: Vec<TopLevelNode>) -> StructuredDocument {
    let mut doc = StructuredDocument::from_blocks(wrap_loose_nodes(nodes));
    enforce(&mut doc);
    doc
}

/// After inserting an image or divider at `index`: if it is the last block,
/// append an empty paragraph. Returns whether a paragraph was appended.
pub fn ensure_trailing_paragraph(doc: &mut StructuredDocument, index: usize) -> bool {
    let is_last = index + 1 == doc.block_count();
    let needs_text_after = doc
        .block(index)
        .is_some_and(|block| !block.block_type.is_text_bearing());
    if is_last && needs_text_after {
        doc.add_block(Block::paragraph());
        return true;
    }
    false
}
