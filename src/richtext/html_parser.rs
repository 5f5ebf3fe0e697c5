// HTML Parser - turns the stored content string into a small element tree.
// Only the subset the editor writes needs to be understood; unknown tags are
// kept in the tree and treated as transparent by the converter.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute pattern is valid")
});

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6}|[A-Za-z]+);").expect("entity pattern is valid")
});

/// Elements that never have children or a closing tag
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "wbr"];

/// Errors for content that does not form a well-nested tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unterminated tag starting at byte {0}")]
    UnterminatedTag(usize),
    #[error("unexpected closing tag </{0}>")]
    UnexpectedClose(String),
    #[error("element <{0}> is never closed")]
    UnclosedElement(String),
    #[error("image without a src attribute")]
    MissingImageSource,
}

/// A node of the parsed tree
#[derive(Debug, Clone, PartialEq)]
pub enum HtmlNode {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        children: Vec<HtmlNode>,
    },
    Text(String),
}

impl HtmlNode {
    pub fn element(name: &str) -> Self {
        HtmlNode::Element {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element name, lowercase; `None` for text
    pub fn name(&self) -> Option<&str> {
        match self {
            HtmlNode::Element { name, .. } => Some(name),
            HtmlNode::Text(_) => None,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            HtmlNode::Element { attrs, .. } => attrs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str()),
            HtmlNode::Text(_) => None,
        }
    }

    pub fn children(&self) -> &[HtmlNode] {
        match self {
            HtmlNode::Element { children, .. } => children,
            HtmlNode::Text(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Text(String),
}

/// Parse markup into a list of top-level nodes
pub fn parse_html(input: &str) -> Result<Vec<HtmlNode>, ParseError> {
    let tokens = tokenize(input)?;

    // Open elements; the bottom entry collects the top-level nodes
    let mut stack: Vec<HtmlNode> = vec![HtmlNode::element("#root")];

    for token in tokens {
        match token {
            Token::Text(text) => push_child(&mut stack, HtmlNode::Text(text)),
            Token::Open {
                name,
                attrs,
                self_closing,
            } => {
                let node = HtmlNode::Element {
                    name: name.clone(),
                    attrs,
                    children: Vec::new(),
                };
                if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
                    push_child(&mut stack, node);
                } else {
                    stack.push(node);
                }
            }
            Token::Close(name) => {
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    // </br> and friends carry no structure
                    continue;
                }
                if stack.len() < 2 {
                    return Err(ParseError::UnexpectedClose(name));
                }
                let open_name = stack
                    .last()
                    .and_then(HtmlNode::name)
                    .unwrap_or_default()
                    .to_string();
                if open_name != name {
                    return Err(ParseError::UnclosedElement(open_name));
                }
                if let Some(done) = stack.pop() {
                    push_child(&mut stack, done);
                }
            }
        }
    }

    if stack.len() > 1 {
        let name = stack
            .last()
            .and_then(HtmlNode::name)
            .unwrap_or_default()
            .to_string();
        return Err(ParseError::UnclosedElement(name));
    }

    Ok(match stack.pop() {
        Some(HtmlNode::Element { children, .. }) => children,
        _ => Vec::new(),
    })
}

fn push_child(stack: &mut [HtmlNode], node: HtmlNode) {
    if let Some(HtmlNode::Element { children, .. }) = stack.last_mut() {
        children.push(node);
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut pos = 0usize;

    while pos < input.len() {
        let rest = &input[pos..];
        let Some(lt) = rest.find('<') else {
            tokens.push(Token::Text(decode_entities(rest)));
            break;
        };
        if lt > 0 {
            tokens.push(Token::Text(decode_entities(&rest[..lt])));
        }
        let tag_start = pos + lt;
        let tag = &input[tag_start..];

        if tag.starts_with("<!--") {
            let end = tag
                .find("-->")
                .ok_or(ParseError::UnterminatedTag(tag_start))?;
            pos = tag_start + end + 3;
            continue;
        }

        let end = find_tag_end(tag).ok_or(ParseError::UnterminatedTag(tag_start))?;
        let body = &tag[1..end];
        pos = tag_start + end + 1;

        if body.starts_with('!') || body.starts_with('?') {
            // doctype / processing instruction
            continue;
        }
        if let Some(name) = body.strip_prefix('/') {
            tokens.push(Token::Close(name.trim().to_ascii_lowercase()));
            continue;
        }

        let self_closing = body.trim_end().ends_with('/');
        let body = body.trim_end().trim_end_matches('/');
        let name_end = body
            .find(|c: char| c.is_whitespace())
            .unwrap_or(body.len());
        let name = body[..name_end].to_ascii_lowercase();
        if name.is_empty() {
            return Err(ParseError::UnterminatedTag(tag_start));
        }
        tokens.push(Token::Open {
            name,
            attrs: parse_attributes(&body[name_end..]),
            self_closing,
        });
    }

    Ok(tokens)
}

/// Index of the `>` closing a tag, skipping over quoted attribute values
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in tag.char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '>') => return Some(idx),
            (None, '<') => return None,
            _ => {}
        }
    }
    None
}

fn parse_attributes(source: &str) -> Vec<(String, String)> {
    ATTRIBUTE_RE
        .captures_iter(source)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

/// Decode character references; unknown names are left untouched
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Escape text for element content
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escape text for a double-quoted attribute value
pub fn escape_attribute(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements() {
        let nodes = parse_html("<p>Hello <strong>world</strong></p>").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name(), Some("p"));
        assert_eq!(nodes[0].children().len(), 2);
        assert_eq!(nodes[0].children()[1].name(), Some("strong"));
    }

    #[test]
    fn test_void_elements_and_attributes() {
        let nodes = parse_html(r#"<img src="a&amp;b.png" alt='x'><hr/><p>x<br></p>"#).unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].attr("src"), Some("a&b.png"));
        assert_eq!(nodes[0].attr("alt"), Some("x"));
        assert_eq!(nodes[1].name(), Some("hr"));
        assert_eq!(nodes[2].children()[1].name(), Some("br"));
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let nodes = parse_html(r#"<img src="a>b.png">"#).unwrap();
        assert_eq!(nodes[0].attr("src"), Some("a>b.png"));
    }

    #[test]
    fn test_tag_names_are_case_insensitive() {
        let nodes = parse_html("<P>x</p>").unwrap();
        assert_eq!(nodes[0].name(), Some("p"));
    }

    #[test]
    fn test_comments_and_doctype_are_skipped() {
        let nodes = parse_html("<!DOCTYPE html><!-- note --><p>x</p>").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_malformed_input() {
        assert_eq!(
            parse_html("<p>open"),
            Err(ParseError::UnclosedElement("p".to_string()))
        );
        assert_eq!(
            parse_html("</p>"),
            Err(ParseError::UnexpectedClose("p".to_string()))
        );
        assert_eq!(
            parse_html("<p><em>x</p></em>"),
            Err(ParseError::UnclosedElement("em".to_string()))
        );
        assert_eq!(parse_html("<p"), Err(ParseError::UnterminatedTag(0)));
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("a &lt;b&gt; &amp; &#65;&#x42; &unknown;"), "a <b> & AB &unknown;");
        assert_eq!(escape_text("<a & b>"), "&lt;a &amp; b&gt;");
        assert_eq!(escape_attribute(r#"say "hi""#), "say &quot;hi&quot;");
    }
}
