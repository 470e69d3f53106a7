//! Rendering of result trees into report pages

use quick_xml::escape::escape;

use crate::domain::{NodeKind, TreeNode};

/// Turns a result tree into a presentable document.
pub trait Stylesheet: Send + Sync {
    /// File extension of rendered documents, without dot.
    fn extension(&self) -> &'static str;

    fn render(&self, title: &str, tree: &TreeNode) -> String;
}

/// Plain HTML tables and lists, no external assets.
#[derive(Debug, Clone, Default)]
pub struct HtmlStylesheet;

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse;margin:.2em 0}\
th,td{border:1px solid #ccc;padding:.2em .5em;text-align:left;vertical-align:top}\
th{background:#f4f4f4}ol{margin:.2em 0;padding-left:1.5em}";

enum Step<'a> {
    Node(&'a TreeNode),
    Raw(String),
}

impl HtmlStylesheet {
    fn render_body(out: &mut String, tree: &TreeNode) {
        let mut stack = vec![Step::Node(tree)];

        while let Some(step) = stack.pop() {
            let node = match step {
                Step::Raw(s) => {
                    out.push_str(&s);
                    continue;
                }
                Step::Node(node) => node,
            };

            match node.kind {
                None => out.push_str(&escape(node.text.as_str())),
                Some(NodeKind::Object) => {
                    out.push_str("<table>");
                    stack.push(Step::Raw("</table>".to_string()));
                    for child in node.children.iter().rev() {
                        stack.push(Step::Raw("</td></tr>".to_string()));
                        stack.push(Step::Node(child));
                        stack.push(Step::Raw(format!(
                            "<tr><th>{}</th><td>",
                            escape(child.label.as_str())
                        )));
                    }
                }
                Some(NodeKind::List) => {
                    out.push_str("<ol>");
                    stack.push(Step::Raw("</ol>".to_string()));
                    for child in node.children.iter().rev() {
                        stack.push(Step::Raw("</li>".to_string()));
                        stack.push(Step::Node(child));
                        stack.push(Step::Raw("<li>".to_string()));
                    }
                }
            }
        }
    }
}

/// Number of top-level records in a result tree.
pub fn record_count(tree: &TreeNode) -> usize {
    match tree.kind {
        Some(NodeKind::List) => tree.children.len(),
        Some(NodeKind::Object) => 1,
        None if tree.text.is_empty() => 0,
        None => 1,
    }
}

impl Stylesheet for HtmlStylesheet {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, title: &str, tree: &TreeNode) -> String {
        let title = escape(title);
        let count = record_count(tree);
        let mut out = String::new();

        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        out.push_str(&format!("<title>{title}</title>\n<style>{STYLE}</style>\n"));
        out.push_str("</head>\n<body>\n");
        out.push_str(&format!("<h1>{title}</h1>\n"));
        out.push_str(&format!(
            "<p class=\"count\">{count} record{}</p>\n",
            if count == 1 { "" } else { "s" }
        ));
        Self::render_body(&mut out, tree);
        out.push_str("\n</body>\n</html>\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::build;
    use serde_json::json;

    #[test]
    fn given_list_of_objects_when_rendering_then_tables_inside_ordered_list() {
        let tree = build(&json!([{"a": 1}, {"a": 2}]));
        let html = HtmlStylesheet.render("q", &tree);

        assert!(html.contains("<p class=\"count\">2 records</p>"));
        assert!(html.contains("<ol><li><table><tr><th>a</th><td>1</td></tr></table></li>"));
    }

    #[test]
    fn given_null_field_when_rendering_then_empty_cell() {
        let tree = build(&json!({"x": null}));
        let html = HtmlStylesheet.render("q", &tree);
        assert!(html.contains("<tr><th>x</th><td></td></tr>"));
    }

    #[test]
    fn given_markup_in_text_when_rendering_then_escaped() {
        let tree = build(&json!({"x": "<b>&"}));
        let html = HtmlStylesheet.render("a<b", &tree);
        assert!(html.contains("&lt;b&gt;&amp;"));
        assert!(html.contains("<h1>a&lt;b</h1>"));
    }

    #[test]
    fn given_empty_result_when_rendering_then_zero_records() {
        let tree = build(&json!([]));
        let html = HtmlStylesheet.render("q", &tree);
        assert!(html.contains("0 records"));
        assert!(html.contains("<ol></ol>"));
    }
}
