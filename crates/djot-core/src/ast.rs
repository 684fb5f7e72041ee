//! Abstract Syntax Tree types for djot documents.
//!
//! The tree is produced by the assembler once block structure and inline
//! content have both been resolved. It is designed to be:
//!
//! - **Owned**: the [`Document`] owns every node; filters replace subtrees by value
//! - **Span-tracked**: every node includes source location information
//! - **Closed**: node kinds are sum types, so every consumer matches exhaustively

use std::fmt;

use serde::{Serialize, Serializer};

use crate::attr::Attributes;
use crate::span::Span;

/// A parsed djot document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Top-level blocks in document order.
    pub blocks: Vec<Block>,
    /// Referenced footnotes in order of first reference.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub footnotes: Vec<Footnote>,
    /// Source span covering the entire document.
    pub span: Span,
}

/// A footnote definition, removed from the visible block tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Footnote {
    /// Label used by `[^label]` references.
    pub label: String,
    /// Number assigned in order of first reference, starting at 1.
    pub number: usize,
    /// Footnote body.
    pub blocks: Vec<Block>,
    /// Attributes attached to the definition.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attrs: Attributes,
    /// Source span of the definition.
    pub span: Span,
}

impl Document {
    /// Find a footnote definition by label.
    pub fn footnote(&self, label: &str) -> Option<&Footnote> {
        self.footnotes.iter().find(|f| f.label == label)
    }
}

/// A block-level node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    /// Node kind and payload.
    #[serde(flatten)]
    pub kind: BlockKind,
    /// Attributes attached to the block.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attrs: Attributes,
    /// Source span.
    pub span: Span,
}

/// Block node kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum BlockKind {
    /// Text paragraph.
    Paragraph { children: Vec<Inline> },
    /// Heading (levels 1-6).
    Heading { level: u8, children: Vec<Inline> },
    /// List of items sharing one marker style.
    List {
        style: ListStyle,
        tight: bool,
        start: u64,
        children: Vec<Block>,
    },
    /// List item; `checked` is set for task items.
    ListItem {
        #[serde(skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
        children: Vec<Block>,
    },
    /// Term of a definition list item.
    Term { children: Vec<Inline> },
    /// Body of a definition list item.
    Definition { children: Vec<Block> },
    /// Block quotation.
    BlockQuote { children: Vec<Block> },
    /// Fenced code block.
    CodeBlock {
        #[serde(skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        text: String,
    },
    /// Raw block passed through for a single output format.
    RawBlock { format: String, text: String },
    /// Horizontal rule.
    ThematicBreak,
    /// Table: an optional caption followed by rows.
    Table { children: Vec<Block> },
    /// Table caption.
    Caption { children: Vec<Inline> },
    /// Table row.
    Row { head: bool, children: Vec<Block> },
    /// Table cell.
    Cell {
        head: bool,
        align: Align,
        children: Vec<Inline>,
    },
    /// Generic container (`:::`).
    Div { children: Vec<Block> },
    /// Heading-delimited section.
    Section { children: Vec<Block> },
}

/// Fieldless block tags used to key filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    Paragraph,
    Heading,
    List,
    ListItem,
    Term,
    Definition,
    BlockQuote,
    CodeBlock,
    RawBlock,
    ThematicBreak,
    Table,
    Caption,
    Row,
    Cell,
    Div,
    Section,
}

impl BlockTag {
    /// Snake-case name used by the serializers.
    pub fn name(self) -> &'static str {
        match self {
            BlockTag::Paragraph => "paragraph",
            BlockTag::Heading => "heading",
            BlockTag::List => "list",
            BlockTag::ListItem => "list_item",
            BlockTag::Term => "term",
            BlockTag::Definition => "definition",
            BlockTag::BlockQuote => "block_quote",
            BlockTag::CodeBlock => "code_block",
            BlockTag::RawBlock => "raw_block",
            BlockTag::ThematicBreak => "thematic_break",
            BlockTag::Table => "table",
            BlockTag::Caption => "caption",
            BlockTag::Row => "row",
            BlockTag::Cell => "cell",
            BlockTag::Div => "div",
            BlockTag::Section => "section",
        }
    }
}

impl Block {
    /// Create a block with no attributes.
    pub fn new(kind: BlockKind, span: Span) -> Self {
        Self {
            kind,
            attrs: Attributes::new(),
            span,
        }
    }

    /// The block's tag.
    pub fn tag(&self) -> BlockTag {
        match &self.kind {
            BlockKind::Paragraph { .. } => BlockTag::Paragraph,
            BlockKind::Heading { .. } => BlockTag::Heading,
            BlockKind::List { .. } => BlockTag::List,
            BlockKind::ListItem { .. } => BlockTag::ListItem,
            BlockKind::Term { .. } => BlockTag::Term,
            BlockKind::Definition { .. } => BlockTag::Definition,
            BlockKind::BlockQuote { .. } => BlockTag::BlockQuote,
            BlockKind::CodeBlock { .. } => BlockTag::CodeBlock,
            BlockKind::RawBlock { .. } => BlockTag::RawBlock,
            BlockKind::ThematicBreak => BlockTag::ThematicBreak,
            BlockKind::Table { .. } => BlockTag::Table,
            BlockKind::Caption { .. } => BlockTag::Caption,
            BlockKind::Row { .. } => BlockTag::Row,
            BlockKind::Cell { .. } => BlockTag::Cell,
            BlockKind::Div { .. } => BlockTag::Div,
            BlockKind::Section { .. } => BlockTag::Section,
        }
    }

    /// Child blocks, for container kinds.
    pub fn children(&self) -> Option<&[Block]> {
        match &self.kind {
            BlockKind::List { children, .. }
            | BlockKind::ListItem { children, .. }
            | BlockKind::Definition { children }
            | BlockKind::BlockQuote { children }
            | BlockKind::Table { children }
            | BlockKind::Row { children, .. }
            | BlockKind::Div { children }
            | BlockKind::Section { children } => Some(children),
            _ => None,
        }
    }

    /// Mutable child blocks, for container kinds.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Block>> {
        match &mut self.kind {
            BlockKind::List { children, .. }
            | BlockKind::ListItem { children, .. }
            | BlockKind::Definition { children }
            | BlockKind::BlockQuote { children }
            | BlockKind::Table { children }
            | BlockKind::Row { children, .. }
            | BlockKind::Div { children }
            | BlockKind::Section { children } => Some(children),
            _ => None,
        }
    }

    /// Inline content, for leaf kinds.
    pub fn inlines(&self) -> Option<&[Inline]> {
        match &self.kind {
            BlockKind::Paragraph { children }
            | BlockKind::Heading { children, .. }
            | BlockKind::Term { children }
            | BlockKind::Caption { children }
            | BlockKind::Cell { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Mutable inline content, for leaf kinds.
    pub fn inlines_mut(&mut self) -> Option<&mut Vec<Inline>> {
        match &mut self.kind {
            BlockKind::Paragraph { children }
            | BlockKind::Heading { children, .. }
            | BlockKind::Term { children }
            | BlockKind::Caption { children }
            | BlockKind::Cell { children, .. } => Some(children),
            _ => None,
        }
    }
}

/// List marker style. Items continue a list only when their style matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListStyle {
    /// `-`, `*` or `+` bullet.
    Bullet(char),
    /// Bullet followed by a `[ ]` / `[x]` checkbox.
    Task(char),
    /// Numbered or lettered marker.
    Ordered(Numbering, Delim),
    /// `:` definition list marker.
    Definition,
}

/// Numbering scheme of an ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Numbering {
    Decimal,
    LowerAlpha,
    UpperAlpha,
    LowerRoman,
    UpperRoman,
}

/// Delimiter around an ordered list number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delim {
    /// `1.`
    Period,
    /// `1)`
    Paren,
    /// `(1)`
    Enclosed,
}

impl ListStyle {
    /// Whether the list renders as `<ol>`.
    pub fn is_ordered(&self) -> bool {
        matches!(self, ListStyle::Ordered(..))
    }
}

impl fmt::Display for ListStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListStyle::Bullet(c) => write!(f, "{}", c),
            ListStyle::Task(c) => write!(f, "{} [ ]", c),
            ListStyle::Definition => f.write_str(":"),
            ListStyle::Ordered(numbering, delim) => {
                let n = match numbering {
                    Numbering::Decimal => "1",
                    Numbering::LowerAlpha => "a",
                    Numbering::UpperAlpha => "A",
                    Numbering::LowerRoman => "i",
                    Numbering::UpperRoman => "I",
                };
                match delim {
                    Delim::Period => write!(f, "{}.", n),
                    Delim::Paren => write!(f, "{})", n),
                    Delim::Enclosed => write!(f, "({})", n),
                }
            }
        }
    }
}

impl Serialize for ListStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Table cell alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Default,
    Left,
    Center,
    Right,
}

/// An inline node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inline {
    /// Node kind and payload.
    #[serde(flatten)]
    pub kind: InlineKind,
    /// Attributes attached to the node.
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub attrs: Attributes,
    /// Source span.
    pub span: Span,
}

/// Inline node kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum InlineKind {
    /// Literal text.
    Text { text: String },
    /// Line break in the source rendered as a newline.
    SoftBreak,
    /// Backslash-newline hard line break.
    HardBreak,
    /// Escaped space.
    NonBreakingSpace,
    /// `_emphasis_`
    Emphasis { children: Vec<Inline> },
    /// `*strong*`
    Strong { children: Vec<Inline> },
    /// `{=highlight=}`
    Highlight { children: Vec<Inline> },
    /// `{+insert+}`
    Insert { children: Vec<Inline> },
    /// `{-delete-}`
    Delete { children: Vec<Inline> },
    /// `^superscript^`
    Superscript { children: Vec<Inline> },
    /// `~subscript~`
    Subscript { children: Vec<Inline> },
    /// `[text]{attrs}` or a word with attributes.
    Span { children: Vec<Inline> },
    /// Hyperlink. `destination` is `None` for an unresolved reference.
    Link {
        destination: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
        children: Vec<Inline>,
    },
    /// Image; children hold the alt text content.
    Image {
        destination: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
        children: Vec<Inline>,
    },
    /// Backtick verbatim text.
    Verbatim { text: String },
    /// Raw inline content for one output format.
    RawInline { format: String, text: String },
    /// `$` or `$$` math.
    Math { display: bool, text: String },
    /// `<url>` or `<email>`.
    Autolink { url: String, email: bool },
    /// `:name:` symbol.
    Symbol { name: String },
    /// `[^label]` footnote reference.
    FootnoteReference { label: String, number: usize },
}

/// Fieldless inline tags used to key filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlineTag {
    Text,
    SoftBreak,
    HardBreak,
    NonBreakingSpace,
    Emphasis,
    Strong,
    Highlight,
    Insert,
    Delete,
    Superscript,
    Subscript,
    Span,
    Link,
    Image,
    Verbatim,
    RawInline,
    Math,
    Autolink,
    Symbol,
    FootnoteReference,
}

impl InlineTag {
    /// Snake-case name used by the serializers.
    pub fn name(self) -> &'static str {
        match self {
            InlineTag::Text => "text",
            InlineTag::SoftBreak => "soft_break",
            InlineTag::HardBreak => "hard_break",
            InlineTag::NonBreakingSpace => "non_breaking_space",
            InlineTag::Emphasis => "emphasis",
            InlineTag::Strong => "strong",
            InlineTag::Highlight => "highlight",
            InlineTag::Insert => "insert",
            InlineTag::Delete => "delete",
            InlineTag::Superscript => "superscript",
            InlineTag::Subscript => "subscript",
            InlineTag::Span => "span",
            InlineTag::Link => "link",
            InlineTag::Image => "image",
            InlineTag::Verbatim => "verbatim",
            InlineTag::RawInline => "raw_inline",
            InlineTag::Math => "math",
            InlineTag::Autolink => "autolink",
            InlineTag::Symbol => "symbol",
            InlineTag::FootnoteReference => "footnote_reference",
        }
    }
}

impl Inline {
    /// Create an inline node with no attributes.
    pub fn new(kind: InlineKind, span: Span) -> Self {
        Self {
            kind,
            attrs: Attributes::new(),
            span,
        }
    }

    /// Create a text node.
    pub fn text(text: impl Into<String>, span: Span) -> Self {
        Self::new(InlineKind::Text { text: text.into() }, span)
    }

    /// The node's tag.
    pub fn tag(&self) -> InlineTag {
        match &self.kind {
            InlineKind::Text { .. } => InlineTag::Text,
            InlineKind::SoftBreak => InlineTag::SoftBreak,
            InlineKind::HardBreak => InlineTag::HardBreak,
            InlineKind::NonBreakingSpace => InlineTag::NonBreakingSpace,
            InlineKind::Emphasis { .. } => InlineTag::Emphasis,
            InlineKind::Strong { .. } => InlineTag::Strong,
            InlineKind::Highlight { .. } => InlineTag::Highlight,
            InlineKind::Insert { .. } => InlineTag::Insert,
            InlineKind::Delete { .. } => InlineTag::Delete,
            InlineKind::Superscript { .. } => InlineTag::Superscript,
            InlineKind::Subscript { .. } => InlineTag::Subscript,
            InlineKind::Span { .. } => InlineTag::Span,
            InlineKind::Link { .. } => InlineTag::Link,
            InlineKind::Image { .. } => InlineTag::Image,
            InlineKind::Verbatim { .. } => InlineTag::Verbatim,
            InlineKind::RawInline { .. } => InlineTag::RawInline,
            InlineKind::Math { .. } => InlineTag::Math,
            InlineKind::Autolink { .. } => InlineTag::Autolink,
            InlineKind::Symbol { .. } => InlineTag::Symbol,
            InlineKind::FootnoteReference { .. } => InlineTag::FootnoteReference,
        }
    }

    /// Child nodes, for container kinds.
    pub fn children(&self) -> Option<&[Inline]> {
        match &self.kind {
            InlineKind::Emphasis { children }
            | InlineKind::Strong { children }
            | InlineKind::Highlight { children }
            | InlineKind::Insert { children }
            | InlineKind::Delete { children }
            | InlineKind::Superscript { children }
            | InlineKind::Subscript { children }
            | InlineKind::Span { children }
            | InlineKind::Link { children, .. }
            | InlineKind::Image { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Mutable child nodes, for container kinds.
    pub fn children_mut(&mut self) -> Option<&mut Vec<Inline>> {
        match &mut self.kind {
            InlineKind::Emphasis { children }
            | InlineKind::Strong { children }
            | InlineKind::Highlight { children }
            | InlineKind::Insert { children }
            | InlineKind::Delete { children }
            | InlineKind::Superscript { children }
            | InlineKind::Subscript { children }
            | InlineKind::Span { children }
            | InlineKind::Link { children, .. }
            | InlineKind::Image { children, .. } => Some(children),
            _ => None,
        }
    }
}

/// Flatten inline content to plain text (image alt text, heading ids).
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    push_plain_text(inlines, &mut out);
    out
}

fn push_plain_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match &inline.kind {
            InlineKind::Text { text }
            | InlineKind::Verbatim { text }
            | InlineKind::Math { text, .. } => out.push_str(text),
            InlineKind::Autolink { url, .. } => out.push_str(url),
            InlineKind::SoftBreak | InlineKind::HardBreak => out.push('\n'),
            InlineKind::NonBreakingSpace => out.push('\u{a0}'),
            InlineKind::Symbol { name } => {
                out.push(':');
                out.push_str(name);
                out.push(':');
            }
            InlineKind::RawInline { .. } | InlineKind::FootnoteReference { .. } => {}
            _ => {
                if let Some(children) = inline.children() {
                    push_plain_text(children, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_style_names() {
        assert_eq!(ListStyle::Bullet('*').to_string(), "*");
        assert_eq!(ListStyle::Task('-').to_string(), "- [ ]");
        assert_eq!(
            ListStyle::Ordered(Numbering::UpperRoman, Delim::Enclosed).to_string(),
            "(I)"
        );
        assert_eq!(
            ListStyle::Ordered(Numbering::LowerAlpha, Delim::Paren).to_string(),
            "a)"
        );
    }

    #[test]
    fn plain_text_flattens_nested_markup() {
        let inner = Inline::new(
            InlineKind::Emphasis {
                children: vec![Inline::text("b", Span::new(1, 2))],
            },
            Span::new(0, 3),
        );
        let nodes = vec![
            Inline::text("a ", Span::new(0, 2)),
            inner,
            Inline::new(InlineKind::SoftBreak, Span::new(3, 4)),
            Inline::new(
                InlineKind::Verbatim {
                    text: "c".to_string(),
                },
                Span::new(4, 7),
            ),
        ];
        assert_eq!(plain_text(&nodes), "a b\nc");
    }

    #[test]
    fn tags_match_kinds() {
        let block = Block::new(BlockKind::ThematicBreak, Span::new(0, 3));
        assert_eq!(block.tag(), BlockTag::ThematicBreak);
        assert!(block.children().is_none());
        assert_eq!(BlockTag::ListItem.name(), "list_item");
        assert_eq!(InlineTag::FootnoteReference.name(), "footnote_reference");
    }
}
