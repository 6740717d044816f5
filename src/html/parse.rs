//! Conversion from the `tl` parser into the owned tree.

use std::fmt::Write;

use super::{Document, Element, HtmlError, NodeData, NodeId};
use crate::utils::html::{RAW_TEXT_ELEMENTS, is_raw_text_element, unescape};

/// Delimits the index of a stashed raw-text body inside the parser input.
const STASH_MARK: char = '\u{E000}';

impl Document {
    /// Parse a full HTML document.
    pub fn parse(source: &str) -> Result<Self, HtmlError> {
        // `tl` tokenizes script and style bodies as markup, so they are
        // swapped for placeholders and restored after conversion.
        let (stashed, bodies) = stash_raw_text(source);
        let dom = tl::parse(&stashed, tl::ParserOptions::default())
            .map_err(|e| HtmlError::Parse(format!("{e:?}")))?;
        let parser = dom.parser();

        let mut doc = Self {
            doctype: leading_doctype(source),
            ..Self::default()
        };
        for handle in dom.children() {
            if let Some(id) = doc.convert(*handle, parser, &bodies) {
                doc.roots.push(id);
            }
        }

        if doc.nodes.iter().all(|n| !matches!(n.data, NodeData::Element(_))) {
            return Err(HtmlError::NoElements);
        }
        Ok(doc)
    }

    fn convert(
        &mut self,
        handle: tl::NodeHandle,
        parser: &tl::Parser,
        bodies: &[String],
    ) -> Option<NodeId> {
        let node = handle.get(parser)?;

        match node {
            tl::Node::Tag(tag) => {
                let name = tag.name().as_utf8_str().to_ascii_lowercase();
                // The doctype is captured separately from the source.
                if name.starts_with('!') {
                    return None;
                }

                let attrs = tag
                    .attributes()
                    .iter()
                    .map(|(key, value)| {
                        let value = value.map(|v| unescape(&v).into_owned());
                        (key.into_owned(), value)
                    })
                    .collect();

                let raw = is_raw_text_element(&name);
                let id = self.push(NodeData::Element(Element { name, attrs }));
                let children: Vec<_> = if raw {
                    let placeholder = tag.inner_text(parser);
                    restore_raw_text(&placeholder, bodies)
                        .map(|body| self.push(NodeData::Text(body)))
                        .into_iter()
                        .collect()
                } else {
                    tag.children()
                        .top()
                        .iter()
                        .filter_map(|child| self.convert(*child, parser, bodies))
                        .collect()
                };
                self.nodes[id.0].children = children;
                Some(id)
            }
            tl::Node::Raw(bytes) => {
                let text = bytes.as_utf8_str();
                if is_doctype(&text) {
                    return None;
                }
                Some(self.push(NodeData::Text(text.into_owned())))
            }
            tl::Node::Comment(bytes) => {
                let text = bytes.as_utf8_str();
                if is_doctype(&text) {
                    return None;
                }
                Some(self.push(NodeData::Comment(text.into_owned())))
            }
        }
    }
}

/// Replace every script/style body with `STASH_MARK <index> STASH_MARK`.
///
/// Returns the rewritten source and the original bodies by index. Comments
/// are copied through untouched.
fn stash_raw_text(source: &str) -> (String, Vec<String>) {
    let lower = source.to_ascii_lowercase();
    let mut out = String::with_capacity(source.len());
    let mut bodies = Vec::new();
    let mut copied = 0;
    let mut cursor = 0;

    while let Some(offset) = lower[cursor..].find('<') {
        let open = cursor + offset;
        let rest = &lower[open..];
        if rest.starts_with("<!--") {
            cursor = rest.find("-->").map_or(lower.len(), |end| open + end + 3);
            continue;
        }
        let Some(name) = RAW_TEXT_ELEMENTS.iter().find(|name| opens_element(rest, name)) else {
            cursor = open + 1;
            continue;
        };
        let Some(head_end) = tag_end(&lower, open) else {
            break;
        };
        if lower.as_bytes()[head_end - 2] == b'/' {
            cursor = head_end;
            continue;
        }
        let close_tag = format!("</{name}");
        let Some(close) = lower[head_end..].find(&close_tag).map(|i| head_end + i) else {
            break;
        };

        out.push_str(&source[copied..head_end]);
        if close > head_end {
            let _ = write!(out, "{STASH_MARK}{}{STASH_MARK}", bodies.len());
            bodies.push(source[head_end..close].to_owned());
        }
        copied = close;
        cursor = close + close_tag.len();
    }

    out.push_str(&source[copied..]);
    (out, bodies)
}

/// `rest` starts with `<name` followed by whitespace, `>` or `/`.
fn opens_element(rest: &str, name: &str) -> bool {
    rest[1..].starts_with(name)
        && rest[1 + name.len()..]
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_whitespace() || b == b'>' || b == b'/')
}

/// Index just past the `>` closing the tag opened at `open`, honouring quotes.
fn tag_end(lower: &str, open: usize) -> Option<usize> {
    let mut quote = None;
    for (i, b) in lower.bytes().enumerate().skip(open) {
        match (quote, b) {
            (Some(q), _) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"' | b'\'') => quote = Some(b),
            (None, b'>') => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// Body for a placeholder produced by [`stash_raw_text`].
fn restore_raw_text(placeholder: &str, bodies: &[String]) -> Option<String> {
    let index: usize = placeholder.trim_matches(STASH_MARK).parse().ok()?;
    bodies.get(index).cloned()
}

fn is_doctype(text: &str) -> bool {
    text.trim_start()
        .get(..9)
        .is_some_and(|head| head.eq_ignore_ascii_case("<!doctype"))
}

/// `<!DOCTYPE ...>` at the start of the source, verbatim.
fn leading_doctype(source: &str) -> Option<String> {
    let trimmed = source.trim_start_matches('\u{feff}').trim_start();
    if !is_doctype(trimmed) {
        return None;
    }
    let end = trimmed.find('>')?;
    Some(trimmed[..=end].to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doctype_captured_once() {
        let doc = Document::parse("<!DOCTYPE html>\n<html><body></body></html>").unwrap();
        assert_eq!(doc.doctype.as_deref(), Some("<!DOCTYPE html>"));
        assert!(
            doc.elements()
                .iter()
                .all(|&id| !doc.element(id).unwrap().name.starts_with('!'))
        );
    }

    #[test]
    fn test_attribute_entities_decoded() {
        let doc = Document::parse("<a href=\"x.json?a=1&amp;b=2\">t</a>").unwrap();
        let a = doc.elements()[0];
        assert_eq!(doc.attr(a, "href"), Some("x.json?a=1&b=2"));
    }

    #[test]
    fn test_boolean_attribute() {
        let doc = Document::parse("<script defer src=\"a.js\"></script>").unwrap();
        let script = doc.element(doc.elements()[0]).unwrap();
        assert!(script.attrs.iter().any(|(k, v)| k == "defer" && v.is_none()));
    }

    #[test]
    fn test_script_body_kept_as_single_text_node() {
        let doc = Document::parse(
            "<head><script type=\"module\">if (a<b && c>d) { w(\"<div>x</div>\"); }</script></head><body><p>t</p></body>",
        )
        .unwrap();
        let names: Vec<_> = doc
            .elements()
            .into_iter()
            .filter_map(|id| doc.element(id).map(|e| e.name.clone()))
            .collect();
        assert_eq!(names, ["head", "script", "body", "p"]);

        let script = doc.elements()[1];
        assert_eq!(doc.attr(script, "type"), Some("module"));
        let body = doc.children(script);
        assert_eq!(body.len(), 1);
        assert_eq!(
            doc.data(body[0]),
            &NodeData::Text("if (a<b && c>d) { w(\"<div>x</div>\"); }".into())
        );
    }

    #[test]
    fn test_stash_skips_comments_and_self_closing() {
        let (out, bodies) =
            stash_raw_text("<!-- <script>x</script> --><script src=\"a.js\"/><STYLE>p>a{}</STYLE>");
        assert_eq!(bodies, ["p>a{}"]);
        assert!(out.starts_with("<!-- <script>x</script> --><script src=\"a.js\"/><STYLE>"));
        assert!(out.ends_with("</STYLE>"));
    }

    #[test]
    fn test_unterminated_script_left_to_parser() {
        let (out, bodies) = stash_raw_text("<p>x</p><script>let a = 1;");
        assert!(bodies.is_empty());
        assert_eq!(out, "<p>x</p><script>let a = 1;");
    }

    #[test]
    fn test_text_only_rejected() {
        assert!(matches!(
            Document::parse("just text"),
            Err(HtmlError::NoElements)
        ));
    }
}
