//! HTML renderer.
//!
//! Rendering is a pure function of the tree. Every block and inline kind is
//! matched exhaustively, so there is no fallback path that could silently
//! drop content.

use crate::ast::{
    plain_text, Align, Block, BlockKind, Document, Footnote, Inline, InlineKind, ListStyle,
    Numbering,
};
use crate::attr::Attributes;

/// Output format of the renderer.
///
/// The format name doubles as the raw-format selector: `{=html}` content is
/// emitted verbatim only when rendering HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Html,
}

impl Format {
    /// Raw-format name matched against `{=format}` blocks and inlines.
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Format::Html => "html",
        }
    }
}

/// Renderer configuration.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    format: Format,
}

impl RenderOptions {
    /// Create options with the default (HTML) format.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the output format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// The selected output format.
    pub fn format(&self) -> Format {
        self.format
    }
}

/// Render a document in the given format.
pub fn render(doc: &Document, format: Format) -> String {
    render_with(doc, &RenderOptions::new().with_format(format))
}

/// Render a document with explicit options.
pub fn render_with(doc: &Document, options: &RenderOptions) -> String {
    match options.format {
        Format::Html => {
            let mut writer = HtmlWriter::new(options.format);
            writer.document(doc);
            writer.out
        }
    }
}

const BACKLINK: &str = "\u{21a9}\u{fe0e}";

struct HtmlWriter {
    out: String,
    format: Format,
}

impl HtmlWriter {
    fn new(format: Format) -> Self {
        Self {
            out: String::with_capacity(1024),
            format,
        }
    }

    fn document(&mut self, doc: &Document) {
        self.blocks(&doc.blocks, false);
        if !doc.footnotes.is_empty() {
            self.out.push_str("<section role=\"doc-endnotes\">\n<hr>\n<ol>\n");
            for footnote in &doc.footnotes {
                self.footnote(footnote);
            }
            self.out.push_str("</ol>\n</section>\n");
        }
    }

    fn footnote(&mut self, footnote: &Footnote) {
        let number = footnote.number.to_string();
        let mut attrs = footnote.attrs.clone();
        attrs.set_id(format!("fn{}", number));
        self.open("li", &attrs, &[]);
        self.out.push('\n');

        let backlink = format!(
            "<a href=\"#fnref{}\" role=\"doc-backlink\">{}</a>",
            number, BACKLINK
        );
        match footnote.blocks.split_last() {
            Some((last, rest)) if matches!(last.kind, BlockKind::Paragraph { .. }) => {
                self.blocks(rest, false);
                self.open("p", &last.attrs, &[]);
                if let Some(children) = last.inlines() {
                    self.inlines(children);
                }
                self.out.push_str(&backlink);
                self.out.push_str("</p>\n");
            }
            _ => {
                self.blocks(&footnote.blocks, false);
                self.out.push_str("<p>");
                self.out.push_str(&backlink);
                self.out.push_str("</p>\n");
            }
        }
        self.out.push_str("</li>\n");
    }

    fn blocks(&mut self, blocks: &[Block], tight: bool) {
        for block in blocks {
            self.block(block, tight);
        }
    }

    fn block(&mut self, block: &Block, tight: bool) {
        let attrs = &block.attrs;
        match &block.kind {
            BlockKind::Paragraph { children } => {
                if tight && attrs.is_empty() {
                    self.inlines(children);
                    self.out.push('\n');
                } else {
                    self.open("p", attrs, &[]);
                    self.inlines(children);
                    self.out.push_str("</p>\n");
                }
            }
            BlockKind::Heading { level, children } => {
                let tag = format!("h{}", level);
                self.open(&tag, attrs, &[]);
                self.inlines(children);
                self.close(&tag);
                self.out.push('\n');
            }
            BlockKind::Section { children } => self.container("section", attrs, children),
            BlockKind::Div { children } => self.container("div", attrs, children),
            BlockKind::BlockQuote { children } => self.container("blockquote", attrs, children),
            BlockKind::ThematicBreak => {
                self.open("hr", attrs, &[]);
                self.out.push('\n');
            }
            BlockKind::CodeBlock { lang, text } => {
                self.open("pre", attrs, &[]);
                match lang {
                    Some(lang) => {
                        self.out.push_str("<code class=\"language-");
                        escape_into(&mut self.out, lang);
                        self.out.push_str("\">");
                    }
                    None => self.out.push_str("<code>"),
                }
                escape_into(&mut self.out, text);
                self.out.push_str("</code></pre>\n");
            }
            BlockKind::RawBlock { format, text } => {
                if format == self.format.name() {
                    self.out.push_str(text);
                }
            }
            BlockKind::List {
                style,
                tight,
                start,
                children,
            } => self.list(attrs, *style, *tight, *start, children),
            BlockKind::ListItem { checked, children } => {
                self.open("li", attrs, &[]);
                self.out.push('\n');
                if let Some(checked) = checked {
                    self.out.push_str("<input disabled=\"\" type=\"checkbox\"");
                    if *checked {
                        self.out.push_str(" checked=\"\"");
                    }
                    self.out.push_str("/>\n");
                }
                self.blocks(children, tight);
                self.out.push_str("</li>\n");
            }
            BlockKind::Term { children } => {
                self.open("dt", attrs, &[]);
                self.inlines(children);
                self.out.push_str("</dt>\n");
            }
            BlockKind::Definition { children } => {
                self.open("dd", attrs, &[]);
                self.out.push('\n');
                self.blocks(children, tight);
                self.out.push_str("</dd>\n");
            }
            BlockKind::Table { children } => self.container("table", attrs, children),
            BlockKind::Caption { children } => {
                self.open("caption", attrs, &[]);
                self.inlines(children);
                self.out.push_str("</caption>\n");
            }
            BlockKind::Row { children, .. } => self.container("tr", attrs, children),
            BlockKind::Cell {
                head,
                align,
                children,
            } => {
                let tag = if *head { "th" } else { "td" };
                let style = match align {
                    Align::Default => None,
                    Align::Left => Some("text-align: left;"),
                    Align::Center => Some("text-align: center;"),
                    Align::Right => Some("text-align: right;"),
                };
                match style {
                    Some(style) => self.open(tag, attrs, &[("style", style)]),
                    None => self.open(tag, attrs, &[]),
                }
                self.inlines(children);
                self.close(tag);
                self.out.push('\n');
            }
        }
    }

    fn container(&mut self, tag: &str, attrs: &Attributes, children: &[Block]) {
        self.open(tag, attrs, &[]);
        self.out.push('\n');
        self.blocks(children, false);
        self.close(tag);
        self.out.push('\n');
    }

    fn list(&mut self, attrs: &Attributes, style: ListStyle, tight: bool, start: u64, items: &[Block]) {
        let tag = match style {
            ListStyle::Ordered(..) => "ol",
            ListStyle::Definition => "dl",
            ListStyle::Bullet(_) | ListStyle::Task(_) => "ul",
        };
        let start = start.to_string();
        let mut extra: Vec<(&str, &str)> = Vec::new();
        if let ListStyle::Ordered(numbering, _) = style {
            if start != "1" {
                extra.push(("start", start.as_str()));
            }
            match numbering {
                Numbering::Decimal => {}
                Numbering::LowerAlpha => extra.push(("type", "a")),
                Numbering::UpperAlpha => extra.push(("type", "A")),
                Numbering::LowerRoman => extra.push(("type", "i")),
                Numbering::UpperRoman => extra.push(("type", "I")),
            }
        }
        if matches!(style, ListStyle::Task(_)) {
            let mut attrs = attrs.clone();
            attrs.classes.insert(0, "task-list".to_string());
            self.open(tag, &attrs, &extra);
        } else {
            self.open(tag, attrs, &extra);
        }
        self.out.push('\n');
        for item in items {
            match (&item.kind, style) {
                // Definition list items are transparent: term and definition
                // render as `<dt>` and `<dd>` directly.
                (BlockKind::ListItem { children, .. }, ListStyle::Definition) => {
                    self.blocks(children, tight)
                }
                _ => self.block(item, tight),
            }
        }
        self.close(tag);
        self.out.push('\n');
    }

    fn inlines(&mut self, inlines: &[Inline]) {
        for inline in inlines {
            self.inline(inline);
        }
    }

    fn inline(&mut self, inline: &Inline) {
        let attrs = &inline.attrs;
        match &inline.kind {
            InlineKind::Text { text } => {
                if attrs.is_empty() {
                    escape_into(&mut self.out, text);
                } else {
                    self.open("span", attrs, &[]);
                    escape_into(&mut self.out, text);
                    self.close("span");
                }
            }
            InlineKind::SoftBreak => self.out.push('\n'),
            InlineKind::HardBreak => self.out.push_str("<br>\n"),
            InlineKind::NonBreakingSpace => self.out.push_str("&nbsp;"),
            InlineKind::Emphasis { children } => self.wrap("em", attrs, children),
            InlineKind::Strong { children } => self.wrap("strong", attrs, children),
            InlineKind::Highlight { children } => self.wrap("mark", attrs, children),
            InlineKind::Insert { children } => self.wrap("ins", attrs, children),
            InlineKind::Delete { children } => self.wrap("del", attrs, children),
            InlineKind::Superscript { children } => self.wrap("sup", attrs, children),
            InlineKind::Subscript { children } => self.wrap("sub", attrs, children),
            InlineKind::Span { children } => self.wrap("span", attrs, children),
            InlineKind::Link {
                destination,
                title,
                children,
                ..
            } => {
                let mut extra = Vec::with_capacity(2);
                if let Some(destination) = destination {
                    extra.push(("href", destination.as_str()));
                }
                if let Some(title) = title {
                    extra.push(("title", title.as_str()));
                }
                self.open("a", attrs, &extra);
                self.inlines(children);
                self.close("a");
            }
            InlineKind::Image {
                destination,
                title,
                children,
                ..
            } => {
                let alt = plain_text(children);
                let mut extra = vec![("alt", alt.as_str())];
                if let Some(destination) = destination {
                    extra.push(("src", destination.as_str()));
                }
                if let Some(title) = title {
                    extra.push(("title", title.as_str()));
                }
                self.open("img", attrs, &extra);
            }
            InlineKind::Verbatim { text } => {
                self.open("code", attrs, &[]);
                escape_into(&mut self.out, text);
                self.close("code");
            }
            InlineKind::RawInline { format, text } => {
                if format == self.format.name() {
                    self.out.push_str(text);
                }
            }
            InlineKind::Math { display, text } => {
                let mut classes = attrs.clone();
                let (class, open, close) = if *display {
                    ("display", "\\[", "\\]")
                } else {
                    ("inline", "\\(", "\\)")
                };
                classes.classes.insert(0, class.to_string());
                classes.classes.insert(0, "math".to_string());
                self.open("span", &classes, &[]);
                self.out.push_str(open);
                escape_into(&mut self.out, text);
                self.out.push_str(close);
                self.close("span");
            }
            InlineKind::Autolink { url, email } => {
                let href = if *email {
                    format!("mailto:{}", url)
                } else {
                    url.clone()
                };
                self.open("a", attrs, &[("href", href.as_str())]);
                escape_into(&mut self.out, url);
                self.close("a");
            }
            InlineKind::Symbol { name } => {
                self.out.push(':');
                escape_into(&mut self.out, name);
                self.out.push(':');
            }
            InlineKind::FootnoteReference { number, .. } => {
                let n = number.to_string();
                let id = format!("fnref{}", n);
                let href = format!("#fn{}", n);
                self.open(
                    "a",
                    attrs,
                    &[
                        ("id", id.as_str()),
                        ("href", href.as_str()),
                        ("role", "doc-noteref"),
                    ],
                );
                self.out.push_str("<sup>");
                self.out.push_str(&n);
                self.out.push_str("</sup></a>");
            }
        }
    }

    fn wrap(&mut self, tag: &str, attrs: &Attributes, children: &[Inline]) {
        self.open(tag, attrs, &[]);
        self.inlines(children);
        self.close(tag);
    }

    /// Write an opening tag. Built-in attributes come first, then the node's
    /// id, classes and key/value pairs.
    fn open(&mut self, tag: &str, attrs: &Attributes, extra: &[(&str, &str)]) {
        self.out.push('<');
        self.out.push_str(tag);
        for (key, value) in extra {
            if *key == "id" && attrs.id.is_some() {
                continue;
            }
            push_attr(&mut self.out, key, value);
        }
        if let Some(id) = &attrs.id {
            push_attr(&mut self.out, "id", id);
        }
        if !attrs.classes.is_empty() {
            push_attr(&mut self.out, "class", &attrs.classes.join(" "));
        }
        for (key, value) in &attrs.pairs {
            push_attr(&mut self.out, key, value);
        }
        self.out.push('>');
    }

    #[inline]
    fn close(&mut self, tag: &str) {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    escape_into(out, value);
    out.push('"');
}

/// Escape `&`, `<`, `>` and `"`.
pub fn escape_into(out: &mut String, text: &str) {
    let mut last = 0;
    for (i, b) in text.bytes().enumerate() {
        let entity = match b {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&quot;",
            _ => continue,
        };
        out.push_str(&text[last..i]);
        out.push_str(entity);
        last = i + 1;
    }
    out.push_str(&text[last..]);
}
