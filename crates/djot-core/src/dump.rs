//! Document serializers: AST JSON, an indented AST listing, and the flat
//! "matches" listing of node kinds and source ranges.

use serde::Serialize;
use serde_json::Value;

use crate::ast::{Block, BlockKind, Document, Inline, InlineKind};
use crate::attr::Attributes;
use crate::error::Result;
use crate::span::Span;

/// Serialize the document as compact JSON.
///
/// Spans are included only when `sourcepos` is set.
pub fn to_ast_json(doc: &Document, sourcepos: bool) -> Result<String> {
    let mut value = serde_json::to_value(doc)?;
    if !sourcepos {
        strip_spans(&mut value);
    }
    Ok(serde_json::to_string(&value)?)
}

fn strip_spans(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("span");
            for child in map.values_mut() {
                strip_spans(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_spans),
        _ => {}
    }
}

/// Render the document as an indented tree, one node per line.
///
/// ```text
/// doc
///   paragraph
///     text "hello"
/// ```
pub fn to_ast_pretty(doc: &Document, sourcepos: bool) -> String {
    let mut out = Pretty {
        out: String::with_capacity(256),
        sourcepos,
    };
    out.line(0, "doc", &[], &Attributes::new(), doc.span);
    for block in &doc.blocks {
        out.block(1, block);
    }
    for footnote in &doc.footnotes {
        let fields = [
            ("label", quote(&footnote.label)),
            ("number", footnote.number.to_string()),
        ];
        out.line(1, "footnote", &fields, &footnote.attrs, footnote.span);
        for block in &footnote.blocks {
            out.block(2, block);
        }
    }
    out.out
}

struct Pretty {
    out: String,
    sourcepos: bool,
}

impl Pretty {
    fn line(&mut self, depth: usize, name: &str, fields: &[(&str, String)], attrs: &Attributes, span: Span) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
        self.out.push_str(name);
        for (key, value) in fields {
            self.out.push(' ');
            if !key.is_empty() {
                self.out.push_str(key);
                self.out.push('=');
            }
            self.out.push_str(value);
        }
        if let Some(id) = &attrs.id {
            self.out.push_str(" id=");
            self.out.push_str(&quote(id));
        }
        if !attrs.classes.is_empty() {
            self.out.push_str(" class=");
            self.out.push_str(&quote(&attrs.classes.join(" ")));
        }
        for (key, value) in &attrs.pairs {
            self.out.push(' ');
            self.out.push_str(key);
            self.out.push('=');
            self.out.push_str(&quote(value));
        }
        if self.sourcepos {
            self.out.push_str(&format!(" ({}-{})", span.start, span.end));
        }
        self.out.push('\n');
    }

    fn block(&mut self, depth: usize, block: &Block) {
        let tag = block.tag();
        let fields = match &block.kind {
            BlockKind::Heading { level, .. } => vec![("level", level.to_string())],
            BlockKind::List {
                style,
                tight,
                start,
                ..
            } => vec![
                ("style", quote(&style.to_string())),
                ("tight", tight.to_string()),
                ("start", start.to_string()),
            ],
            BlockKind::ListItem {
                checked: Some(checked),
                ..
            } => vec![("checked", checked.to_string())],
            BlockKind::CodeBlock { lang, text } => {
                let mut fields = Vec::with_capacity(2);
                if let Some(lang) = lang {
                    fields.push(("lang", quote(lang)));
                }
                fields.push(("", quote(text)));
                fields
            }
            BlockKind::RawBlock { format, text } => vec![("format", quote(format)), ("", quote(text))],
            BlockKind::Row { head: true, .. } => vec![("head", "true".to_string())],
            BlockKind::Cell { head, align, .. } => {
                let mut fields = Vec::with_capacity(2);
                if *head {
                    fields.push(("head", "true".to_string()));
                }
                if let Some(align) = align_name(*align) {
                    fields.push(("align", align.to_string()));
                }
                fields
            }
            _ => Vec::new(),
        };
        self.line(depth, tag.name(), &fields, &block.attrs, block.span);
        if let Some(children) = block.children() {
            for child in children {
                self.block(depth + 1, child);
            }
        }
        if let Some(inlines) = block.inlines() {
            for inline in inlines {
                self.inline(depth + 1, inline);
            }
        }
    }

    fn inline(&mut self, depth: usize, inline: &Inline) {
        let fields = match &inline.kind {
            InlineKind::Text { text } | InlineKind::Verbatim { text } => vec![("", quote(text))],
            InlineKind::Link {
                destination,
                title,
                reference,
                ..
            }
            | InlineKind::Image {
                destination,
                title,
                reference,
                ..
            } => {
                let mut fields = Vec::with_capacity(3);
                if let Some(destination) = destination {
                    fields.push(("destination", quote(destination)));
                }
                if let Some(title) = title {
                    fields.push(("title", quote(title)));
                }
                if let Some(reference) = reference {
                    fields.push(("reference", quote(reference)));
                }
                fields
            }
            InlineKind::RawInline { format, text } => vec![("format", quote(format)), ("", quote(text))],
            InlineKind::Math { display, text } => {
                vec![("display", display.to_string()), ("", quote(text))]
            }
            InlineKind::Autolink { url, email } => {
                vec![("email", email.to_string()), ("", quote(url))]
            }
            InlineKind::Symbol { name } => vec![("name", quote(name))],
            InlineKind::FootnoteReference { label, number } => {
                vec![("label", quote(label)), ("number", number.to_string())]
            }
            _ => Vec::new(),
        };
        self.line(depth, inline.tag().name(), &fields, &inline.attrs, inline.span);
        if let Some(children) = inline.children() {
            for child in children {
                self.inline(depth + 1, child);
            }
        }
    }
}

fn align_name(align: crate::ast::Align) -> Option<&'static str> {
    use crate::ast::Align;
    match align {
        Align::Default => None,
        Align::Left => Some("left"),
        Align::Center => Some("center"),
        Align::Right => Some("right"),
    }
}

/// Quote a payload string with JSON escaping.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:04x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// One entry of the matches listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Node kind name.
    pub kind: &'static str,
    /// Start byte offset.
    pub start: u32,
    /// End byte offset.
    pub end: u32,
}

/// Collect every node in document (enter) order with its source range.
pub fn matches(doc: &Document) -> Vec<Match> {
    let mut out = Vec::with_capacity(64);
    out.push(Match {
        kind: "doc",
        start: doc.span.start,
        end: doc.span.end,
    });
    collect_blocks(&doc.blocks, &mut out);
    for footnote in &doc.footnotes {
        out.push(Match {
            kind: "footnote",
            start: footnote.span.start,
            end: footnote.span.end,
        });
        collect_blocks(&footnote.blocks, &mut out);
    }
    out
}

fn collect_blocks(blocks: &[Block], out: &mut Vec<Match>) {
    for block in blocks {
        out.push(Match {
            kind: block.tag().name(),
            start: block.span.start,
            end: block.span.end,
        });
        if let Some(children) = block.children() {
            collect_blocks(children, out);
        }
        if let Some(inlines) = block.inlines() {
            collect_inlines(inlines, out);
        }
    }
}

fn collect_inlines(inlines: &[Inline], out: &mut Vec<Match>) {
    for inline in inlines {
        out.push(Match {
            kind: inline.tag().name(),
            start: inline.span.start,
            end: inline.span.end,
        });
        if let Some(children) = inline.children() {
            collect_inlines(children, out);
        }
    }
}

/// Serialize the matches listing as compact JSON.
pub fn to_matches_json(doc: &Document) -> Result<String> {
    Ok(serde_json::to_string(&matches(doc))?)
}

/// Render the matches listing as `kind start-end` lines.
pub fn to_matches_pretty(doc: &Document) -> String {
    let mut out = String::with_capacity(256);
    for m in matches(doc) {
        out.push_str(m.kind);
        out.push(' ');
        out.push_str(&m.start.to_string());
        out.push('-');
        out.push_str(&m.end.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn ast_json_omits_spans_by_default() {
        let doc = parse("hi\n");
        let json = to_ast_json(&doc, false).unwrap();
        assert_eq!(
            json,
            r#"{"blocks":[{"tag":"paragraph","children":[{"tag":"text","text":"hi"}]}]}"#
        );
        assert!(to_ast_json(&doc, true).unwrap().contains(r#""span":{"start":0,"end":2}"#));
    }

    #[test]
    fn pretty_tree() {
        let doc = parse("# A\n\n- _b_\n");
        assert_eq!(
            to_ast_pretty(&doc, false),
            "doc\n  section id=\"A\"\n    heading level=1\n      text \"A\"\n    list style=\"-\" tight=true start=1\n      list_item\n        paragraph\n          emphasis\n            text \"b\"\n"
        );
    }

    #[test]
    fn pretty_tree_with_sourcepos() {
        let doc = parse("x\n");
        assert_eq!(
            to_ast_pretty(&doc, true),
            "doc (0-2)\n  paragraph (0-1)\n    text \"x\" (0-1)\n"
        );
    }

    #[test]
    fn matches_in_enter_order() {
        let doc = parse("a *b*\n");
        assert_eq!(
            to_matches_pretty(&doc),
            "doc 0-6\nparagraph 0-5\ntext 0-2\nstrong 2-5\ntext 3-4\n"
        );
        assert_eq!(
            to_matches_json(&parse("")).unwrap(),
            r#"[{"kind":"doc","start":0,"end":0}]"#
        );
    }

    #[test]
    fn quoting_escapes_control_characters() {
        assert_eq!(quote("a\"b\n\u{1}"), "\"a\\\"b\\n\\u{0001}\"");
    }
}
