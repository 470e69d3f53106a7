//! XML markup for document trees.
//!
//! One element per node, the node kind as an attribute, leaf text as element
//! text. [`from_xml`] reads back anything [`to_xml`] writes.

use std::borrow::Cow;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::domain::error::MarkupError;
use crate::domain::tree::{NodeKind, TreeNode};

/// Stand-in for characters XML 1.0 cannot carry.
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Default name of the attribute carrying the node kind.
pub const DEFAULT_KIND_ATTRIBUTE: &str = "type";

/// Markup layout options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupOptions {
    pub kind_attribute: String,
    /// Pretty-print with two-space indentation
    pub indent: bool,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self {
            kind_attribute: DEFAULT_KIND_ATTRIBUTE.to_string(),
            indent: true,
        }
    }
}

enum Step<'a> {
    Enter(&'a TreeNode),
    Exit(&'a str),
}

/// Serialize a tree as an XML document.
pub fn to_xml(tree: &TreeNode, options: &MarkupOptions) -> Result<String, MarkupError> {
    let mut writer = if options.indent {
        Writer::new_with_indent(Vec::new(), b' ', 2)
    } else {
        Writer::new(Vec::new())
    };

    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut steps = vec![Step::Enter(tree)];
    while let Some(step) = steps.pop() {
        match step {
            Step::Exit(label) => write(&mut writer, Event::End(BytesEnd::new(label)))?,
            Step::Enter(node) => {
                let mut start = BytesStart::new(node.label.as_str());
                if let Some(kind) = node.kind {
                    start.push_attribute((options.kind_attribute.as_str(), kind.as_str()));
                }

                if node.children.is_empty() {
                    if node.text.is_empty() {
                        write(&mut writer, Event::Empty(start))?;
                    } else {
                        write(&mut writer, Event::Start(start))?;
                        let text = xml_text(&node.text);
                        write(&mut writer, Event::Text(BytesText::new(&text)))?;
                        write(&mut writer, Event::End(BytesEnd::new(node.label.as_str())))?;
                    }
                    continue;
                }

                write(&mut writer, Event::Start(start))?;
                steps.push(Step::Exit(node.label.as_str()));
                steps.extend(node.children.iter().rev().map(Step::Enter));
            }
        }
    }

    let mut out = String::from_utf8(writer.into_inner())
        .map_err(|e| MarkupError::Syntax(e.to_string()))?;
    out.push('\n');
    Ok(out)
}

/// Leaf text with characters outside the XML 1.0 `Char` production replaced.
fn xml_text(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(
            text.chars()
                .map(|c| if is_xml_char(c) { c } else { REPLACEMENT_CHAR })
                .collect(),
        )
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), MarkupError> {
    writer
        .write_event(event)
        .map_err(|e| MarkupError::Syntax(e.to_string()))
}

/// Parse markup written by [`to_xml`] back into a tree.
///
/// Whitespace between child elements is dropped; leaf text is kept verbatim.
pub fn from_xml(xml: &str, options: &MarkupOptions) -> Result<TreeNode, MarkupError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<TreeNode> = Vec::new();
    let mut root: Option<TreeNode> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| MarkupError::Syntax(format!("at {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(ref e) => {
                let node = open_node(e, &options.kind_attribute)?;
                stack.push(node);
            }
            Event::Empty(ref e) => {
                let node = open_node(e, &options.kind_attribute)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(ref e) => {
                if let Some(top) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| MarkupError::Syntax(err.to_string()))?;
                    top.text.push_str(&text);
                }
            }
            Event::CData(ref e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::End(_) => {
                let Some(mut node) = stack.pop() else {
                    return Err(MarkupError::Syntax("unbalanced end tag".to_string()));
                };
                if node.kind.is_some() || !node.children.is_empty() {
                    node.text.clear();
                }
                attach(&mut stack, &mut root, node)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(MarkupError::Syntax("unclosed element at end of input".to_string()));
    }
    root.ok_or(MarkupError::NoRoot)
}

fn open_node(start: &BytesStart<'_>, kind_attribute: &str) -> Result<TreeNode, MarkupError> {
    let label = String::from_utf8(start.name().as_ref().to_vec())
        .map_err(|e| MarkupError::Syntax(e.to_string()))?;
    let mut node = TreeNode::new(label);

    let attr = start
        .try_get_attribute(kind_attribute)
        .map_err(|e| MarkupError::Syntax(e.to_string()))?;
    if let Some(attr) = attr {
        let value = attr
            .unescape_value()
            .map_err(|e| MarkupError::Syntax(e.to_string()))?;
        node.kind = Some(
            NodeKind::parse(&value).ok_or_else(|| MarkupError::UnknownKind(value.to_string()))?,
        );
    }
    Ok(node)
}

fn attach(
    stack: &mut [TreeNode],
    root: &mut Option<TreeNode>,
    node: TreeNode,
) -> Result<(), MarkupError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(MarkupError::MultipleRoots),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tree::build;
    use serde_json::json;

    #[test]
    fn given_empty_list_when_writing_then_root_is_self_closing() {
        let xml = to_xml(&build(&json!([])), &MarkupOptions::default()).unwrap();
        assert!(xml.contains(r#"<root type="list"/>"#), "{xml}");
    }

    #[test]
    fn given_leaf_text_when_writing_pretty_then_text_is_inline() {
        let xml = to_xml(&build(&json!({"name": "Ana"})), &MarkupOptions::default()).unwrap();
        assert!(xml.contains("<name>Ana</name>"), "{xml}");
    }

    #[test]
    fn given_special_characters_when_writing_then_escaped() {
        let xml = to_xml(&build(&json!({"q": "a < b & c"})), &MarkupOptions::default()).unwrap();
        assert!(xml.contains("a &lt; b &amp; c"), "{xml}");
    }

    #[test]
    fn given_two_roots_when_reading_then_fails() {
        let err = from_xml("<a/><b/>", &MarkupOptions::default()).unwrap_err();
        assert!(matches!(err, MarkupError::MultipleRoots));
    }

    #[test]
    fn given_no_elements_when_reading_then_fails() {
        let err = from_xml("<?xml version=\"1.0\"?>\n", &MarkupOptions::default()).unwrap_err();
        assert!(matches!(err, MarkupError::NoRoot));
    }

    #[test]
    fn given_unknown_kind_when_reading_then_fails() {
        let err = from_xml(r#"<root type="set"/>"#, &MarkupOptions::default()).unwrap_err();
        assert!(matches!(err, MarkupError::UnknownKind(k) if k == "set"));
    }
}
