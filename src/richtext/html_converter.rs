// HTML Converter
// Converts between StructuredDocument and the HTML content string the host stores.
// HTML is used purely as a storage/serialization format

use super::html_parser::{HtmlNode, ParseError, escape_attribute, escape_text, parse_html};
use super::invariants::{TopLevelNode, document_from_nodes};
use super::structured_document::*;

/// Elements that start a block when they appear at the top level
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "ul", "ol", "li", "img", "hr",
];

/// Convert HTML to a StructuredDocument, rejecting malformed input
pub fn parse_document(html: &str) -> Result<StructuredDocument, ParseError> {
    let nodes = parse_html(html)?;
    let mut top_level = Vec::new();
    nodes_to_top_level(&nodes, &mut top_level)?;
    Ok(document_from_nodes(drop_separator_whitespace(top_level)))
}

/// Convert HTML to a StructuredDocument.
///
/// Malformed input yields a document with a single empty paragraph.
pub fn html_to_document(html: &str) -> StructuredDocument {
    match parse_document(html) {
        Ok(doc) => doc,
        Err(err) => {
            tracing::warn!(%err, "content could not be parsed, starting from an empty paragraph");
            document_from_nodes(Vec::new())
        }
    }
}

/// Convert a StructuredDocument to HTML
pub fn document_to_html(doc: &StructuredDocument) -> String {
    let mut output = String::new();
    let mut open_list: Option<bool> = None;

    for block in doc.blocks() {
        let list = match block.block_type {
            BlockType::ListItem { ordered } => Some(ordered),
            _ => None,
        };
        if open_list.is_some() && open_list != list {
            close_list(&mut output, open_list);
            open_list = None;
        }

        match &block.block_type {
            BlockType::Paragraph => text_block(&mut output, "p", &block.content),
            BlockType::Heading { level } => {
                text_block(&mut output, &format!("h{}", level), &block.content)
            }
            BlockType::BlockQuote => text_block(&mut output, "blockquote", &block.content),
            BlockType::ListItem { ordered } => {
                if open_list.is_none() {
                    output.push_str(if *ordered { "<ol>" } else { "<ul>" });
                    open_list = Some(*ordered);
                }
                output.push_str("<li>");
                output.push_str(&inline_content_to_html(&block.content));
                output.push_str("</li>");
            }
            BlockType::Image { source } => {
                output.push_str(&format!("<img src=\"{}\">\n", escape_attribute(source)));
            }
            BlockType::Divider => output.push_str("<hr>\n"),
        }
    }
    close_list(&mut output, open_list);

    output
}

fn text_block(output: &mut String, tag: &str, content: &[InlineContent]) {
    output.push_str(&format!("<{}>", tag));
    output.push_str(&inline_content_to_html(content));
    output.push_str(&format!("</{}>\n", tag));
}

fn close_list(output: &mut String, open_list: Option<bool>) {
    match open_list {
        Some(true) => output.push_str("</ol>\n"),
        Some(false) => output.push_str("</ul>\n"),
        None => {}
    }
}

/// Convert inline content to HTML
fn inline_content_to_html(content: &[InlineContent]) -> String {
    let mut output = String::new();

    for item in content {
        match item {
            InlineContent::Text(run) => {
                let mut styled = escape_text(&run.text);
                if run.style.italic {
                    styled = format!("<em>{}</em>", styled);
                }
                if run.style.bold {
                    styled = format!("<strong>{}</strong>", styled);
                }
                output.push_str(&styled);
            }
            InlineContent::Nested { kind, content } => {
                let tag = match kind {
                    NestedKind::Heading { level } => format!("h{}", level),
                    NestedKind::Quote => "blockquote".to_string(),
                };
                output.push_str(&format!(
                    "<{tag}>{}</{tag}>",
                    inline_content_to_html(content)
                ));
            }
            InlineContent::LineBreak => output.push_str("<br>"),
        }
    }

    output
}

fn heading_level(name: &str) -> Option<u8> {
    let level = name.strip_prefix('h')?.parse::<u8>().ok()?;
    (1..=6).contains(&level).then_some(level)
}

fn is_block_element(node: &HtmlNode) -> bool {
    node.name().is_some_and(|name| BLOCK_ELEMENTS.contains(&name))
}

/// Walk top-level markup, producing blocks and loose inline nodes
fn nodes_to_top_level(nodes: &[HtmlNode], out: &mut Vec<TopLevelNode>) -> Result<(), ParseError> {
    for node in nodes {
        let Some(name) = node.name() else {
            if let HtmlNode::Text(text) = node {
                out.push(TopLevelNode::Loose(InlineContent::Text(TextRun::plain(
                    text.clone(),
                ))));
            }
            continue;
        };

        match name {
            "p" => out.push(text_block_from(BlockType::Paragraph, node)),
            "div" if node.children().iter().any(is_block_element) => {
                nodes_to_top_level(node.children(), out)?
            }
            "div" => out.push(text_block_from(BlockType::Paragraph, node)),
            "blockquote" => out.push(text_block_from(BlockType::BlockQuote, node)),
            "ul" | "ol" => list_to_blocks(node, name == "ol", out),
            "li" => out.push(text_block_from(BlockType::ListItem { ordered: false }, node)),
            "img" => out.push(TopLevelNode::Block(image_from(node)?)),
            "hr" => out.push(TopLevelNode::Block(Block::divider())),
            _ => {
                if let Some(level) = heading_level(name) {
                    out.push(text_block_from(BlockType::Heading { level }, node));
                } else if node.children().iter().any(is_block_element) {
                    // Unknown wrappers holding blocks are transparent at the top level
                    nodes_to_top_level(node.children(), out)?;
                } else {
                    for inline in inline_from_element(node, TextStyle::plain()) {
                        out.push(TopLevelNode::Loose(inline));
                    }
                }
            }
        }
    }
    Ok(())
}

fn image_from(node: &HtmlNode) -> Result<Block, ParseError> {
    match node.attr("src") {
        Some(source) if !source.trim().is_empty() => Ok(Block::image(source)),
        _ => Err(ParseError::MissingImageSource),
    }
}

fn text_block_from(block_type: BlockType, node: &HtmlNode) -> TopLevelNode {
    let content = inline_children(node.children(), TextStyle::plain());
    TopLevelNode::Block(Block::new(block_type).with_content(content))
}

fn list_to_blocks(list: &HtmlNode, ordered: bool, out: &mut Vec<TopLevelNode>) {
    let mut stray: Vec<InlineContent> = Vec::new();
    let flush = |stray: &mut Vec<InlineContent>, out: &mut Vec<TopLevelNode>| {
        let visible = stray
            .iter()
            .any(|item| !item.to_plain_text().trim().is_empty());
        if visible {
            let content = std::mem::take(stray);
            out.push(TopLevelNode::Block(
                Block::list_item(ordered).with_content(content),
            ));
        }
        stray.clear();
    };

    for child in list.children() {
        if child.name() == Some("li") {
            flush(&mut stray, out);
            out.push(text_block_from(BlockType::ListItem { ordered }, child));
        } else {
            stray.extend(inline_from_node(child, TextStyle::plain()));
        }
    }
    flush(&mut stray, out);
}

fn inline_children(children: &[HtmlNode], style: TextStyle) -> Vec<InlineContent> {
    children
        .iter()
        .flat_map(|child| inline_from_node(child, style))
        .collect()
}

fn inline_from_node(node: &HtmlNode, style: TextStyle) -> Vec<InlineContent> {
    match node {
        HtmlNode::Text(text) => vec![InlineContent::Text(TextRun::new(text.clone(), style))],
        HtmlNode::Element { .. } => inline_from_element(node, style),
    }
}

fn inline_from_element(node: &HtmlNode, style: TextStyle) -> Vec<InlineContent> {
    let name = node.name().unwrap_or_default();
    match name {
        "br" => vec![InlineContent::LineBreak],
        "strong" | "b" => inline_children(
            node.children(),
            TextStyle {
                bold: true,
                ..style
            },
        ),
        "em" | "i" => inline_children(
            node.children(),
            TextStyle {
                italic: true,
                ..style
            },
        ),
        "blockquote" => vec![InlineContent::Nested {
            kind: NestedKind::Quote,
            content: inline_children(node.children(), style),
        }],
        "img" | "hr" => {
            tracing::debug!(element = name, "dropping block element inside inline content");
            Vec::new()
        }
        _ => match heading_level(name) {
            Some(level) => vec![InlineContent::Nested {
                kind: NestedKind::Heading { level },
                content: inline_children(node.children(), style),
            }],
            None => inline_children(node.children(), style),
        },
    }
}

/// Whitespace-only text between blocks is layout, not content
fn drop_separator_whitespace(nodes: Vec<TopLevelNode>) -> Vec<TopLevelNode> {
    let is_loose = |node: Option<&TopLevelNode>| matches!(node, Some(TopLevelNode::Loose(_)));
    let keep: Vec<bool> = (0..nodes.len())
        .map(|i| match &nodes[i] {
            TopLevelNode::Loose(InlineContent::Text(run)) if run.text.trim().is_empty() => {
                i > 0 && is_loose(nodes.get(i - 1)) && is_loose(nodes.get(i + 1))
            }
            _ => true,
        })
        .collect();
    nodes
        .into_iter()
        .zip(keep)
        .filter_map(|(node, keep)| keep.then_some(node))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(doc: &StructuredDocument) -> StructuredDocument {
        parse_document(&document_to_html(doc)).unwrap()
    }

    #[test]
    fn test_html_to_document_paragraph() {
        let doc = html_to_document("<p>Hello <strong>world</strong></p>");
        assert_eq!(
            doc,
            StructuredDocument::from_blocks([Block::paragraph().with_content(vec![
                InlineContent::Text(TextRun::plain("Hello ")),
                InlineContent::Text(TextRun::new("world", TextStyle::bold())),
            ])])
        );
    }

    #[test]
    fn test_document_to_html_blocks() {
        let doc = StructuredDocument::from_blocks([
            Block::heading(1).with_plain_text("Title"),
            Block::paragraph(),
            Block::image("x.png"),
            Block::divider(),
            Block::quote().with_plain_text("a < b"),
        ]);
        assert_eq!(
            document_to_html(&doc),
            "<h1>Title</h1>\n<p><br></p>\n<img src=\"x.png\">\n<hr>\n<blockquote>a &lt; b</blockquote>\n"
        );
    }

    #[test]
    fn test_document_to_html_list_grouping() {
        let doc = StructuredDocument::from_blocks([
            Block::list_item(false).with_plain_text("a"),
            Block::list_item(false).with_plain_text("b"),
            Block::list_item(true).with_plain_text("c"),
            Block::paragraph().with_plain_text("d"),
        ]);
        assert_eq!(
            document_to_html(&doc),
            "<ul><li>a</li><li>b</li></ul>\n<ol><li>c</li></ol>\n<p>d</p>\n"
        );
        assert_eq!(round_trip(&doc), doc);
    }

    #[test]
    fn test_bold_italic_order() {
        let doc = StructuredDocument::from_blocks([Block::paragraph().with_text(
            "both",
            TextStyle {
                bold: true,
                italic: true,
            },
        )]);
        let html = document_to_html(&doc);
        assert_eq!(html, "<p><strong><em>both</em></strong></p>\n");
        assert_eq!(html_to_document("<p><i><b>both</b></i></p>"), doc);
    }

    #[test]
    fn test_round_trip_nested_and_breaks() {
        let doc = StructuredDocument::from_blocks([
            Block::paragraph().with_content(vec![
                InlineContent::Text(TextRun::plain("intro ")),
                InlineContent::Nested {
                    kind: NestedKind::Heading { level: 3 },
                    content: vec![InlineContent::Text(TextRun::new("big", TextStyle::italic()))],
                },
                InlineContent::LineBreak,
                InlineContent::Text(TextRun::plain("a & b")),
            ]),
            Block::quote(),
            Block::heading(6).with_plain_text("  spaced  "),
        ]);
        assert_eq!(round_trip(&doc), doc);
    }

    #[test]
    fn test_loose_text_is_wrapped() {
        let doc = html_to_document("<h2>Title</h2>stray <b>text</b>");
        assert_eq!(doc.block_count(), 2);
        assert_eq!(doc.blocks()[1].block_type, BlockType::Paragraph);
        assert_eq!(doc.blocks()[1].to_plain_text(), "stray text");
    }

    #[test]
    fn test_separator_whitespace_dropped() {
        let doc = html_to_document("<p>a</p>\n  \n<p>b</p>\n");
        assert_eq!(doc.block_count(), 2);
    }

    #[test]
    fn test_div_and_unknown_wrappers() {
        let doc = html_to_document("<div>plain</div><section><p>a</p><p>b</p></section>");
        assert_eq!(doc.block_count(), 3);
        assert!(doc.blocks().iter().all(|b| b.block_type == BlockType::Paragraph));

        let doc = html_to_document("<p><span>in</span>line</p>");
        assert_eq!(doc, StructuredDocument::with_paragraph("inline"));
    }

    #[test]
    fn test_empty_input_gives_paragraph() {
        let doc = html_to_document("");
        assert_eq!(doc.block_count(), 1);
        assert!(doc.blocks()[0].is_placeholder());
    }

    #[test]
    fn test_malformed_input_falls_back() {
        assert!(parse_document("<p>unclosed").is_err());
        assert_eq!(
            parse_document("<img alt=\"x\">"),
            Err(ParseError::MissingImageSource)
        );
        let doc = html_to_document("<p><em>oops</p>");
        assert_eq!(doc, StructuredDocument::from_blocks([Block::paragraph()]));
    }

    #[test]
    fn test_image_source_is_escaped() {
        let doc = StructuredDocument::from_blocks([Block::image("a\"b&c.png"), Block::paragraph()]);
        let html = document_to_html(&doc);
        assert!(html.starts_with("<img src=\"a&quot;b&amp;c.png\">"));
        assert_eq!(round_trip(&doc), doc);
    }
}
