//! Block structure parser.
//!
//! Lines are matched against a stack of open containers (quotes, list
//! items, footnotes, divs) from the outside in. Containers that fail their
//! continuation test are closed together with everything nested inside them,
//! unless the line is lazy paragraph text. Leaf blocks keep their text
//! unparsed; inline resolution happens later, once the [`References`] table
//! built here is complete.

use std::collections::HashMap;
use std::mem;

use log::trace;

use crate::ast::{Align, ListStyle};
use crate::attr::Attributes;
use crate::lexer::{
    caption, classify, closes_div, closes_fence, indentation, is_blank, is_table_row, Fence,
    Lexer, Line, ListMarker, Start,
};
use crate::span::Span;

/// Unparsed inline text of a leaf block.
///
/// Lines are joined with `\n`. Each line records where it starts in the
/// source so that inline spans can be mapped back to source offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Leaf {
    /// Joined text of the leaf's lines.
    pub text: String,
    /// `(text offset, source offset)` of each line start.
    segments: Vec<(u32, u32)>,
}

impl Leaf {
    /// Create a single-line leaf whose text starts at source `offset`.
    pub fn new(text: &str, offset: u32) -> Self {
        let mut leaf = Self::default();
        leaf.push_line(text, offset);
        leaf
    }

    /// Append a line that starts at source `offset`.
    pub fn push_line(&mut self, line: &str, offset: u32) {
        if !self.segments.is_empty() {
            self.text.push('\n');
        }
        self.segments.push((self.text.len() as u32, offset));
        self.text.push_str(line);
    }

    /// Check if the leaf holds no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Map an offset in [`Leaf::text`] back to a source offset.
    pub fn source_offset(&self, pos: usize) -> u32 {
        let pos = pos as u32;
        let idx = self.segments.partition_point(|&(text, _)| text <= pos);
        match idx.checked_sub(1).and_then(|i| self.segments.get(i)) {
            Some(&(text, src)) => src + (pos - text),
            None => pos,
        }
    }

    /// Map a text range to a source span.
    pub fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.source_offset(start), self.source_offset(end))
    }
}

/// A block node whose leaves still carry unparsed text.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node kind and payload.
    pub kind: NodeKind,
    /// Block attributes.
    pub attrs: Attributes,
    /// Source span.
    pub span: Span,
}

/// Kinds of unresolved block nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Paragraph(Leaf),
    Heading { level: u8, text: Leaf },
    List {
        style: ListStyle,
        tight: bool,
        start: u64,
        items: Vec<Node>,
    },
    ListItem {
        checked: Option<bool>,
        children: Vec<Node>,
    },
    Term(Leaf),
    Definition(Vec<Node>),
    BlockQuote(Vec<Node>),
    CodeBlock { lang: Option<String>, text: String },
    RawBlock { format: String, text: String },
    ThematicBreak,
    /// Optional caption followed by rows.
    Table(Vec<Node>),
    Caption(Leaf),
    Row { head: bool, cells: Vec<Node> },
    Cell { head: bool, align: Align, text: Leaf },
    Div(Vec<Node>),
}

impl Node {
    fn new(kind: NodeKind, attrs: Attributes, span: Span) -> Self {
        Self { kind, attrs, span }
    }
}

/// A link reference definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Link destination with line breaks elided.
    pub destination: String,
    /// Optional quoted title.
    pub title: Option<String>,
    /// Attributes attached to the definition.
    pub attrs: Attributes,
}

/// A footnote definition collected during block parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct FootnoteDef {
    pub label: String,
    pub children: Vec<Node>,
    pub attrs: Attributes,
    pub span: Span,
}

/// Reference table: link definitions and footnote definitions.
///
/// Labels are compared exactly. The first definition of a label wins.
#[derive(Debug, Clone, Default)]
pub struct References {
    links: HashMap<String, Reference>,
    footnotes: Vec<FootnoteDef>,
}

impl References {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a link definition. Labels spanning a line break never match.
    pub fn get(&self, label: &str) -> Option<&Reference> {
        if self.links.is_empty() || label.contains('\n') {
            return None;
        }
        self.links.get(label)
    }

    /// Register a link definition. Returns `false` if the label was taken.
    pub fn insert(&mut self, label: impl Into<String>, reference: Reference) -> bool {
        let label = label.into();
        if self.links.contains_key(&label) {
            return false;
        }
        trace!("reference [{}] -> {}", label, reference.destination);
        self.links.insert(label, reference);
        true
    }

    /// Register a footnote definition. Returns `false` if the label was taken.
    pub fn insert_footnote(&mut self, def: FootnoteDef) -> bool {
        if self.footnotes.iter().any(|f| f.label == def.label) {
            return false;
        }
        trace!("footnote [^{}]", def.label);
        self.footnotes.push(def);
        true
    }

    /// Number of link definitions.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Check if there are no link definitions.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Remove all footnote definitions, in definition order.
    pub fn take_footnotes(&mut self) -> Vec<FootnoteDef> {
        mem::take(&mut self.footnotes)
    }
}

/// Parse `input` into unresolved blocks and the reference table.
pub fn parse_blocks(input: &str) -> (Vec<Node>, References) {
    let mut parser = BlockParser::new(input);
    for line in Lexer::new(input) {
        parser.feed(line);
    }
    parser.finish()
}

/// Remaining text of a line after container prefixes.
#[derive(Debug, Clone, Copy)]
struct Rest<'a> {
    text: &'a str,
    offset: u32,
    col: usize,
}

impl<'a> Rest<'a> {
    fn new(line: Line<'a>) -> Self {
        Self {
            text: line.text,
            offset: line.span.start,
            col: 0,
        }
    }

    #[inline]
    fn advance(self, n: usize) -> Self {
        let n = n.min(self.text.len());
        Self {
            text: self.text.get(n..).unwrap_or(""),
            offset: self.offset + n as u32,
            col: self.col + n,
        }
    }

    #[inline]
    fn skip_indent(self) -> Self {
        let (cols, bytes) = indentation(self.text);
        Self {
            text: &self.text[bytes..],
            offset: self.offset + bytes as u32,
            col: self.col + cols,
        }
    }

    #[inline]
    fn indent_col(self) -> usize {
        self.col + indentation(self.text).0
    }
}

#[derive(Debug)]
enum FrameKind<'a> {
    Document,
    Quote,
    Item { marker: ListMarker, col: usize },
    Footnote { label: &'a str, col: usize },
    Div { len: usize },
}

impl FrameKind<'_> {
    /// Continuation test. Returns the rest of the line on success.
    fn continues<'a>(&self, rest: Rest<'a>, blank: bool) -> Option<Rest<'a>> {
        match self {
            FrameKind::Document | FrameKind::Div { .. } => Some(rest),
            FrameKind::Quote => {
                let r = rest.skip_indent();
                let bytes = r.text.as_bytes();
                match (bytes.first(), bytes.get(1)) {
                    (Some(b'>'), None) => Some(r.advance(1)),
                    (Some(b'>'), Some(b' ' | b'\t')) => Some(r.advance(2)),
                    _ => None,
                }
            }
            FrameKind::Item { col, .. } | FrameKind::Footnote { col, .. } => {
                if blank || rest.indent_col() > *col {
                    Some(rest)
                } else {
                    None
                }
            }
        }
    }
}

/// Child of an open container. List items are grouped into lists when
/// their container closes.
#[derive(Debug)]
enum Child {
    Block(Node),
    Item(Item),
}

#[derive(Debug)]
struct Item {
    marker: ListMarker,
    children: Vec<Node>,
    attrs: Attributes,
    span: Span,
    trailing_blank: bool,
    loose: bool,
}

#[derive(Debug)]
struct Frame<'a> {
    kind: FrameKind<'a>,
    children: Vec<Child>,
    attrs: Attributes,
    start: u32,
    end: u32,
    /// A blank line was seen since the last child started.
    blank: bool,
    /// Number of children started.
    started: usize,
    /// Blank-line gaps between children.
    gaps: usize,
    /// Whether the gap after the first child was blank.
    first_gap: bool,
}

impl<'a> Frame<'a> {
    fn new(kind: FrameKind<'a>, attrs: Attributes, start: u32) -> Self {
        Self {
            kind,
            children: Vec::new(),
            attrs,
            start,
            end: start,
            blank: false,
            started: 0,
            gaps: 0,
            first_gap: false,
        }
    }
}

#[derive(Debug)]
enum LeafState<'a> {
    Paragraph(Leaf),
    Heading { level: u8, text: Leaf },
    Caption(Leaf),
    Code { fence: Fence<'a>, col: usize, text: String },
    Table { rows: Vec<Node>, aligns: Vec<Align> },
    Reference { label: &'a str, col: usize, pieces: Vec<&'a str> },
}

#[derive(Debug)]
struct OpenLeaf<'a> {
    state: LeafState<'a>,
    attrs: Attributes,
    start: u32,
    end: u32,
}

struct BlockParser<'a> {
    stack: Vec<Frame<'a>>,
    leaf: Option<OpenLeaf<'a>>,
    pending: Attributes,
    refs: References,
}

impl<'a> BlockParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut root = Frame::new(FrameKind::Document, Attributes::new(), 0);
        root.end = input.len() as u32;
        Self {
            stack: vec![root],
            leaf: None,
            pending: Attributes::new(),
            refs: References::new(),
        }
    }

    fn finish(mut self) -> (Vec<Node>, References) {
        self.close_leaf();
        while self.stack.len() > 1 {
            self.close_frame();
        }
        let children = self
            .stack
            .pop()
            .map(|root| root.children)
            .unwrap_or_default();
        (group_lists(children), self.refs)
    }

    fn feed(&mut self, line: Line<'a>) {
        let blank = is_blank(line.text);
        let mut rest = Rest::new(line);

        let mut matched = 1;
        while matched < self.stack.len() {
            match self.stack[matched].kind.continues(rest, blank) {
                Some(next) => {
                    rest = next;
                    matched += 1;
                }
                None => break,
            }
        }

        if matched < self.stack.len() {
            if !blank && self.lazy_continuation(rest) {
                for frame in &mut self.stack {
                    frame.end = line.span.end;
                }
                return;
            }
            self.close_leaf();
            while self.stack.len() > matched {
                self.close_frame();
            }
        }

        if !blank {
            for frame in &mut self.stack[1..] {
                frame.end = line.span.end;
            }
        }

        if self.continue_leaf(rest, blank, line.span.end) {
            return;
        }

        if blank {
            if let Some(frame) = self.stack.last_mut() {
                frame.blank = true;
            }
            return;
        }

        self.open_blocks(rest, line.span.end);
    }

    /// Lazy paragraph text: extends the open paragraph even though some
    /// containers did not match, provided the line starts no new block.
    fn lazy_continuation(&mut self, rest: Rest<'a>) -> bool {
        let Some(OpenLeaf {
            state: LeafState::Paragraph(text),
            end,
            ..
        }) = &mut self.leaf
        else {
            return false;
        };
        let r = rest.skip_indent();
        if classify(r.text).is_some() {
            return false;
        }
        push_trimmed(text, r);
        *end = r.offset + r.text.len() as u32;
        true
    }

    /// Offer the line to the open leaf. Returns `true` if it was consumed.
    fn continue_leaf(&mut self, rest: Rest<'a>, blank: bool, line_end: u32) -> bool {
        let closing_div = match self.stack.last() {
            Some(Frame {
                kind: FrameKind::Div { len },
                ..
            }) => self.stack.len() > 1 && closes_div(rest.text, *len),
            _ => false,
        };
        let Some(leaf) = &mut self.leaf else {
            return false;
        };
        if closing_div && !matches!(leaf.state, LeafState::Code { .. }) {
            self.close_leaf();
            return false;
        }

        match &mut leaf.state {
            LeafState::Code { fence, col, text } => {
                leaf.end = line_end;
                if closes_fence(rest.text, fence.ch, fence.len) {
                    self.close_leaf();
                } else {
                    let strip = col.saturating_sub(rest.col);
                    text.push_str(strip_columns(rest.text, strip));
                    text.push('\n');
                }
                true
            }
            LeafState::Paragraph(text) | LeafState::Caption(text) => {
                if blank {
                    self.close_leaf();
                    return false;
                }
                push_trimmed(text, rest.skip_indent());
                leaf.end = line_end;
                true
            }
            LeafState::Heading { level, text } => {
                if blank {
                    self.close_leaf();
                    return false;
                }
                let r = rest.skip_indent();
                let marker = *level as usize;
                let bytes = r.text.as_bytes();
                let r = if bytes.len() >= marker
                    && bytes[..marker].iter().all(|&b| b == b'#')
                    && matches!(bytes.get(marker), None | Some(b' ' | b'\t'))
                {
                    r.advance(marker).skip_indent()
                } else {
                    r
                };
                push_trimmed(text, r);
                leaf.end = line_end;
                true
            }
            LeafState::Table { rows, aligns } => {
                let r = rest.skip_indent();
                if !blank && is_table_row(r.text) {
                    push_row(rows, aligns, r);
                    leaf.end = line_end;
                    return true;
                }
                self.close_leaf();
                false
            }
            LeafState::Reference { col, pieces, .. } => {
                if !blank && rest.indent_col() > *col {
                    pieces.push(rest.text.trim());
                    leaf.end = line_end;
                    return true;
                }
                self.close_leaf();
                false
            }
        }
    }

    fn open_blocks(&mut self, mut rest: Rest<'a>, line_end: u32) {
        loop {
            let r = rest.skip_indent();
            if r.text.is_empty() {
                return;
            }

            if let Some(Frame {
                kind: FrameKind::Div { len },
                ..
            }) = self.stack.last()
            {
                if self.stack.len() > 1 && closes_div(r.text, *len) {
                    self.close_frame();
                    return;
                }
            }

            match classify(r.text) {
                Some(Start::Quote { len }) => {
                    self.open_frame(FrameKind::Quote, r.offset, line_end);
                    rest = r.advance(len);
                }
                Some(Start::ListItem(marker)) => {
                    self.open_frame(FrameKind::Item { marker, col: r.col }, r.offset, line_end);
                    rest = r.advance(marker.len);
                }
                Some(Start::Footnote { label, len }) => {
                    self.open_frame(FrameKind::Footnote { label, col: r.col }, r.offset, line_end);
                    rest = r.advance(len);
                }
                Some(Start::Div { len, class }) => {
                    self.open_frame(FrameKind::Div { len }, r.offset, line_end);
                    if let (Some(class), Some(frame)) = (class, self.stack.last_mut()) {
                        frame.attrs.add_class(class);
                    }
                    return;
                }
                Some(Start::Fence(fence)) => {
                    let state = LeafState::Code {
                        fence,
                        col: r.col,
                        text: String::new(),
                    };
                    self.open_leaf(state, r.offset, line_end);
                    return;
                }
                Some(Start::Heading { level, len }) => {
                    let mut text = Leaf::default();
                    push_trimmed(&mut text, r.advance(len));
                    self.open_leaf(LeafState::Heading { level, text }, r.offset, line_end);
                    return;
                }
                Some(Start::Reference { label, len }) => {
                    let value = r.advance(len).text.trim();
                    let state = LeafState::Reference {
                        label,
                        col: r.col,
                        pieces: vec![value],
                    };
                    let attrs = mem::take(&mut self.pending);
                    self.leaf = Some(OpenLeaf {
                        state,
                        attrs,
                        start: r.offset,
                        end: line_end,
                    });
                    return;
                }
                Some(Start::ThematicBreak) => {
                    self.start_child();
                    let attrs = mem::take(&mut self.pending);
                    let node = Node::new(NodeKind::ThematicBreak, attrs, Span::new(r.offset, line_end));
                    self.push_child(Child::Block(node));
                    return;
                }
                Some(Start::TableRow) => {
                    let mut rows = Vec::with_capacity(4);
                    let mut aligns = Vec::new();
                    push_row(&mut rows, &mut aligns, r);
                    self.open_leaf(LeafState::Table { rows, aligns }, r.offset, line_end);
                    return;
                }
                Some(Start::Attributes(attrs)) => {
                    self.pending.merge(attrs);
                    return;
                }
                None => {
                    if let Some(skip) = caption(r.text).filter(|_| self.last_table_open()) {
                        let mut text = Leaf::default();
                        push_trimmed(&mut text, r.advance(skip));
                        let attrs = mem::take(&mut self.pending);
                        self.leaf = Some(OpenLeaf {
                            state: LeafState::Caption(text),
                            attrs,
                            start: r.offset,
                            end: line_end,
                        });
                        return;
                    }
                    let mut text = Leaf::default();
                    push_trimmed(&mut text, r);
                    self.open_leaf(LeafState::Paragraph(text), r.offset, line_end);
                    return;
                }
            }
        }
    }

    /// Whether the current container's last child is a table without caption.
    fn last_table_open(&self) -> bool {
        let Some(frame) = self.stack.last() else {
            return false;
        };
        matches!(
            frame.children.last(),
            Some(Child::Block(Node { kind: NodeKind::Table(rows), .. }))
                if !matches!(rows.first(), Some(Node { kind: NodeKind::Caption(_), .. }))
        )
    }

    /// Record that a new child starts in the current container.
    fn start_child(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            if frame.blank && frame.started > 0 {
                frame.gaps += 1;
                if frame.started == 1 {
                    frame.first_gap = true;
                }
            }
            frame.blank = false;
            frame.started += 1;
        }
    }

    fn push_child(&mut self, child: Child) {
        if let Some(frame) = self.stack.last_mut() {
            frame.children.push(child);
        }
    }

    fn open_frame(&mut self, kind: FrameKind<'a>, start: u32, end: u32) {
        trace!("open {:?} at {}", kind, start);
        if !matches!(kind, FrameKind::Footnote { .. }) {
            self.start_child();
        }
        let attrs = mem::take(&mut self.pending);
        let mut frame = Frame::new(kind, attrs, start);
        frame.end = end;
        self.stack.push(frame);
    }

    fn open_leaf(&mut self, state: LeafState<'a>, start: u32, end: u32) {
        self.start_child();
        let attrs = mem::take(&mut self.pending);
        self.leaf = Some(OpenLeaf {
            state,
            attrs,
            start,
            end,
        });
    }

    fn close_leaf(&mut self) {
        let Some(leaf) = self.leaf.take() else {
            return;
        };
        let span = Span::new(leaf.start, leaf.end);
        let attrs = leaf.attrs;
        let kind = match leaf.state {
            LeafState::Paragraph(text) => NodeKind::Paragraph(text),
            LeafState::Heading { level, text } => NodeKind::Heading { level, text },
            LeafState::Code { fence, text, .. } => match fence.info.strip_prefix('=') {
                Some(format) => NodeKind::RawBlock {
                    format: format.trim().to_string(),
                    text,
                },
                None => NodeKind::CodeBlock {
                    lang: fence.info.split_whitespace().next().map(str::to_string),
                    text,
                },
            },
            LeafState::Table { rows, .. } => NodeKind::Table(rows),
            LeafState::Caption(text) => {
                let node = Node::new(NodeKind::Caption(text), attrs, span);
                if let Some(Frame { children, .. }) = self.stack.last_mut() {
                    if let Some(Child::Block(table)) = children.last_mut() {
                        if let NodeKind::Table(rows) = &mut table.kind {
                            table.span = table.span.merge(span);
                            rows.insert(0, node);
                        }
                    }
                }
                return;
            }
            LeafState::Reference { label, pieces, .. } => {
                self.refs.insert(label, parse_reference(&pieces, attrs));
                return;
            }
        };
        self.push_child(Child::Block(Node::new(kind, attrs, span)));
    }

    fn close_frame(&mut self) {
        self.close_leaf();
        if self.stack.len() <= 1 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        self.pending = Attributes::new();
        trace!("close {:?} at {}", frame.kind, frame.end);

        let span = Span::new(frame.start, frame.end);
        if frame.blank {
            if let Some(parent) = self.stack.last_mut() {
                parent.blank = true;
            }
        }

        let children = group_lists(frame.children);
        let child = match frame.kind {
            FrameKind::Document => return,
            FrameKind::Quote => {
                Child::Block(Node::new(NodeKind::BlockQuote(children), frame.attrs, span))
            }
            FrameKind::Div { .. } => Child::Block(Node::new(NodeKind::Div(children), frame.attrs, span)),
            FrameKind::Item { marker, .. } => {
                let allowed = if marker.style == ListStyle::Definition {
                    usize::from(frame.first_gap)
                } else {
                    0
                };
                Child::Item(Item {
                    marker,
                    children,
                    attrs: frame.attrs,
                    span,
                    trailing_blank: frame.blank,
                    loose: frame.gaps > allowed,
                })
            }
            FrameKind::Footnote { label, .. } => {
                self.refs.insert_footnote(FootnoteDef {
                    label: label.to_string(),
                    children,
                    attrs: frame.attrs,
                    span,
                });
                return;
            }
        };
        self.push_child(child);
    }
}

fn push_trimmed(leaf: &mut Leaf, rest: Rest<'_>) {
    let text = rest.text.trim_end();
    let lead = text.len() - text.trim_start().len();
    leaf.push_line(&text[lead..], rest.offset + lead as u32);
}

/// Skip up to `cols` leading spaces.
fn strip_columns(text: &str, cols: usize) -> &str {
    let n = text
        .bytes()
        .take(cols)
        .take_while(|&b| b == b' ' || b == b'\t')
        .count();
    &text[n..]
}

/// Split a reference value into destination and optional title.
fn parse_reference(pieces: &[&str], attrs: Attributes) -> Reference {
    let mut pieces: Vec<&str> = pieces.iter().copied().filter(|p| !p.is_empty()).collect();
    let mut title = None;

    if let Some(last) = pieces.last().copied() {
        let open = last
            .strip_suffix('"')
            .and_then(|body| body.rfind('"'));
        match open {
            Some(0) if pieces.len() > 1 => {
                title = Some(last[1..last.len() - 1].to_string());
                pieces.pop();
            }
            Some(idx) if idx > 0 && last[..idx].ends_with(char::is_whitespace) => {
                title = Some(last[idx + 1..last.len() - 1].to_string());
                if let Some(slot) = pieces.last_mut() {
                    *slot = last[..idx].trim_end();
                }
            }
            _ => {}
        }
    }

    Reference {
        destination: pieces.concat(),
        title,
        attrs,
    }
}

/// Split a table row into cell ranges, honoring escapes and verbatim spans.
fn split_cells(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut cells = Vec::with_capacity(4);
    let mut cell_start = 1;
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => {
                let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
                i += run;
                let mut j = i;
                while j < bytes.len() {
                    if bytes[j] == b'`' {
                        let close = bytes[j..].iter().take_while(|&&b| b == b'`').count();
                        if close == run {
                            i = j + close;
                            break;
                        }
                        j += close;
                    } else {
                        j += 1;
                    }
                }
            }
            b'|' => {
                cells.push((cell_start, i));
                cell_start = i + 1;
                i += 1;
            }
            _ => i += 1,
        }
    }
    if cell_start < bytes.len() {
        cells.push((cell_start, bytes.len()));
    }
    cells
}

fn separator_align(cell: &str) -> Option<Align> {
    let cell = cell.trim();
    let left = cell.starts_with(':');
    let right = cell.len() > 1 && cell.ends_with(':');
    let dashes = &cell[usize::from(left)..cell.len() - usize::from(right)];
    if dashes.is_empty() || !dashes.bytes().all(|b| b == b'-') {
        return None;
    }
    Some(match (left, right) {
        (true, true) => Align::Center,
        (true, false) => Align::Left,
        (false, true) => Align::Right,
        (false, false) => Align::Default,
    })
}

fn push_row(rows: &mut Vec<Node>, aligns: &mut Vec<Align>, rest: Rest<'_>) {
    let text = rest.text.trim_end();
    let span = Span::new(rest.offset, rest.offset + text.len() as u32);
    let ranges = split_cells(text);

    let separator: Option<Vec<Align>> = ranges
        .iter()
        .map(|&(s, e)| separator_align(&text[s..e]))
        .collect();
    if let Some(new_aligns) = separator.filter(|a| !a.is_empty()) {
        if let Some(Node {
            kind: NodeKind::Row { head, cells },
            ..
        }) = rows.last_mut()
        {
            if !*head {
                *head = true;
                for (i, cell) in cells.iter_mut().enumerate() {
                    if let NodeKind::Cell { head, align, .. } = &mut cell.kind {
                        *head = true;
                        *align = new_aligns.get(i).copied().unwrap_or_default();
                    }
                }
            }
        }
        *aligns = new_aligns;
        return;
    }

    let cells = ranges
        .iter()
        .enumerate()
        .map(|(i, &(s, e))| {
            let raw = &text[s..e];
            let lead = raw.len() - raw.trim_start().len();
            let content = raw.trim();
            let offset = rest.offset + (s + lead) as u32;
            Node::new(
                NodeKind::Cell {
                    head: false,
                    align: aligns.get(i).copied().unwrap_or_default(),
                    text: Leaf::new(content, offset),
                },
                Attributes::new(),
                Span::new(rest.offset + s as u32, rest.offset + e as u32),
            )
        })
        .collect();
    rows.push(Node::new(
        NodeKind::Row { head: false, cells },
        Attributes::new(),
        span,
    ));
}

/// Accumulates consecutive list items that share a marker style.
struct ListGroup {
    /// Styles (with start numbers) still consistent with every item.
    candidates: Vec<(ListStyle, u64)>,
    items: Vec<Item>,
}

impl ListGroup {
    fn new(item: Item, styles: Vec<(ListStyle, u64)>) -> Self {
        Self {
            candidates: styles,
            items: vec![item],
        }
    }

    fn accepts(&self, styles: &[(ListStyle, u64)]) -> bool {
        self.candidates
            .iter()
            .any(|(s, _)| styles.iter().any(|(t, _)| t == s))
    }

    fn push(&mut self, item: Item, styles: &[(ListStyle, u64)]) {
        self.candidates
            .retain(|(s, _)| styles.iter().any(|(t, _)| t == s));
        self.items.push(item);
    }

    fn finish(self) -> Option<Node> {
        let (style, start) = *self.candidates.first()?;
        let count = self.items.len();
        let tight = self
            .items
            .iter()
            .enumerate()
            .all(|(i, item)| !item.loose && (i + 1 == count || !item.trailing_blank));

        let mut span = self.items.first()?.span;
        let mut attrs = Attributes::new();
        let mut items = Vec::with_capacity(count);
        for (i, mut item) in self.items.into_iter().enumerate() {
            span = span.merge(item.span);
            if i == 0 {
                attrs = mem::take(&mut item.attrs);
            }
            let children = if style == ListStyle::Definition {
                definition_children(item.children, item.span)
            } else {
                item.children
            };
            items.push(Node::new(
                NodeKind::ListItem {
                    checked: item.marker.checked,
                    children,
                },
                item.attrs,
                item.span,
            ));
        }

        trace!("list {} with {} items (tight: {})", style, count, tight);
        Some(Node::new(
            NodeKind::List {
                style,
                tight,
                start,
                items,
            },
            attrs,
            span,
        ))
    }
}

fn item_styles(marker: &ListMarker) -> Vec<(ListStyle, u64)> {
    let mut styles = vec![(marker.style, marker.start)];
    styles.extend(marker.alt);
    styles
}

/// Split a definition list item into term and definition.
fn definition_children(children: Vec<Node>, span: Span) -> Vec<Node> {
    let mut iter = children.into_iter();
    let mut out = Vec::with_capacity(2);
    let rest: Vec<Node> = match iter.next() {
        Some(Node {
            kind: NodeKind::Paragraph(text),
            attrs,
            span,
        }) => {
            out.push(Node::new(NodeKind::Term(text), attrs, span));
            iter.collect()
        }
        Some(first) => {
            out.push(Node::new(NodeKind::Term(Leaf::default()), Attributes::new(), Span::empty(span.start)));
            std::iter::once(first).chain(iter).collect()
        }
        None => Vec::new(),
    };
    if !rest.is_empty() {
        let def_span = rest
            .iter()
            .map(|n| n.span)
            .reduce(Span::merge)
            .unwrap_or(span);
        out.push(Node::new(NodeKind::Definition(rest), Attributes::new(), def_span));
    }
    out
}

fn group_lists(children: Vec<Child>) -> Vec<Node> {
    let mut out = Vec::with_capacity(children.len());
    let mut group: Option<ListGroup> = None;

    for child in children {
        match child {
            Child::Block(node) => {
                out.extend(group.take().and_then(ListGroup::finish));
                out.push(node);
            }
            Child::Item(item) => {
                let styles = item_styles(&item.marker);
                match &mut group {
                    Some(g) if g.accepts(&styles) => g.push(item, &styles),
                    _ => {
                        out.extend(group.take().and_then(ListGroup::finish));
                        group = Some(ListGroup::new(item, styles));
                    }
                }
            }
        }
    }
    out.extend(group.and_then(ListGroup::finish));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Delim, Numbering};

    fn blocks(input: &str) -> Vec<Node> {
        parse_blocks(input).0
    }

    fn leaf_text(node: &Node) -> &str {
        match &node.kind {
            NodeKind::Paragraph(t) | NodeKind::Heading { text: t, .. } => &t.text,
            other => panic!("not a text leaf: {:?}", other),
        }
    }

    #[test]
    fn leaf_offsets_map_across_lines() {
        let mut leaf = Leaf::new("ab", 10);
        leaf.push_line("cd", 20);
        assert_eq!(leaf.text, "ab\ncd");
        assert_eq!(leaf.source_offset(1), 11);
        assert_eq!(leaf.source_offset(3), 20);
        assert_eq!(leaf.span(0, 5), Span::new(10, 22));
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let nodes = blocks("one\ntwo\n\nthree");
        assert_eq!(nodes.len(), 2);
        assert_eq!(leaf_text(&nodes[0]), "one\ntwo");
        assert_eq!(nodes[0].span, Span::new(0, 7));
        assert_eq!(leaf_text(&nodes[1]), "three");
    }

    #[test]
    fn paragraphs_are_not_interrupted() {
        let nodes = blocks("text\n- not a list\n# not a heading");
        assert_eq!(nodes.len(), 1);
        assert_eq!(leaf_text(&nodes[0]), "text\n- not a list\n# not a heading");
    }

    #[test]
    fn multi_line_heading_strips_markers() {
        let nodes = blocks("## A\n## B\nC");
        let NodeKind::Heading { level, text } = &nodes[0].kind else {
            panic!("expected heading");
        };
        assert_eq!(*level, 2);
        assert_eq!(text.text, "A\nB\nC");
    }

    #[test]
    fn block_quote_with_lazy_line() {
        let nodes = blocks("> a\nb\n\nc");
        assert_eq!(nodes.len(), 2);
        let NodeKind::BlockQuote(children) = &nodes[0].kind else {
            panic!("expected quote");
        };
        assert_eq!(leaf_text(&children[0]), "a\nb");
    }

    #[test]
    fn tight_and_loose_lists() {
        let nodes = blocks("- a\n- b\n\n1. x\n\n2. y");
        assert_eq!(nodes.len(), 2);
        let NodeKind::List { tight, items, .. } = &nodes[0].kind else {
            panic!("expected list");
        };
        assert!(*tight);
        assert_eq!(items.len(), 2);
        let NodeKind::List { tight, style, .. } = &nodes[1].kind else {
            panic!("expected list");
        };
        assert!(!*tight);
        assert_eq!(*style, ListStyle::Ordered(Numbering::Decimal, Delim::Period));
    }

    #[test]
    fn different_bullets_start_new_lists() {
        let nodes = blocks("- a\n+ b");
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn nested_list_needs_blank_line() {
        let nodes = blocks("- a\n\n  - b\n- c");
        let NodeKind::List { items, tight, .. } = &nodes[0].kind else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
        assert!(!*tight);
        let NodeKind::ListItem { children, .. } = &items[0].kind else {
            panic!("expected item");
        };
        assert!(matches!(children[1].kind, NodeKind::List { .. }));
    }

    #[test]
    fn alpha_list_absorbs_ambiguous_letter() {
        let nodes = blocks("h. x\ni. y");
        assert_eq!(nodes.len(), 1);
        let NodeKind::List { style, start, .. } = &nodes[0].kind else {
            panic!("expected list");
        };
        assert_eq!(*style, ListStyle::Ordered(Numbering::LowerAlpha, Delim::Period));
        assert_eq!(*start, 8);
    }

    #[test]
    fn code_fence_keeps_content_verbatim() {
        let nodes = blocks("``` rust\nfn x() {}\n\n  # not heading\n```\nafter");
        let NodeKind::CodeBlock { lang, text } = &nodes[0].kind else {
            panic!("expected code");
        };
        assert_eq!(lang.as_deref(), Some("rust"));
        assert_eq!(text, "fn x() {}\n\n  # not heading\n");
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn raw_fence_records_format() {
        let nodes = blocks("``` =html\n<b>\n```");
        assert_eq!(
            nodes[0].kind,
            NodeKind::RawBlock {
                format: "html".to_string(),
                text: "<b>\n".to_string()
            }
        );
    }

    #[test]
    fn div_with_class_and_nested_fence() {
        let nodes = blocks("::: note\n```\n:::\n```\n:::\nout");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].attrs.classes, vec!["note"]);
        let NodeKind::Div(children) = &nodes[0].kind else {
            panic!("expected div");
        };
        assert!(matches!(children[0].kind, NodeKind::CodeBlock { .. }));
    }

    #[test]
    fn references_join_lines_and_first_wins() {
        let (nodes, refs) = parse_blocks("[a]: url\n  andurl\n[a]: other\n\n[t]: /x \"T\"");
        assert!(nodes.is_empty());
        let a = refs.get("a").unwrap();
        assert_eq!(a.destination, "urlandurl");
        let t = refs.get("t").unwrap();
        assert_eq!(t.destination, "/x");
        assert_eq!(t.title.as_deref(), Some("T"));
    }

    #[test]
    fn reference_keeps_preceding_attributes() {
        let (_, refs) = parse_blocks("{title=foo .c}\n[r]: /u");
        let r = refs.get("r").unwrap();
        assert_eq!(r.attrs.get("title"), Some("foo"));
        assert_eq!(r.attrs.classes, vec!["c"]);
    }

    #[test]
    fn footnotes_leave_the_tree() {
        let (nodes, mut refs) = parse_blocks("text\n\n[^n]: note\n\n    more\n\nafter");
        assert_eq!(nodes.len(), 2);
        let footnotes = refs.take_footnotes();
        assert_eq!(footnotes.len(), 1);
        assert_eq!(footnotes[0].label, "n");
        assert_eq!(footnotes[0].children.len(), 2);
    }

    #[test]
    fn tables_with_header_alignment_and_caption() {
        let nodes = blocks("| a | b |\n|:--|--:|\n| 1 | 2 |\n\n^ Cap");
        assert_eq!(nodes.len(), 1);
        let NodeKind::Table(children) = &nodes[0].kind else {
            panic!("expected table");
        };
        assert!(matches!(children[0].kind, NodeKind::Caption(_)));
        let NodeKind::Row { head, cells } = &children[1].kind else {
            panic!("expected row");
        };
        assert!(*head);
        let NodeKind::Cell { align, text, .. } = &cells[1].kind else {
            panic!("expected cell");
        };
        assert_eq!(*align, Align::Right);
        assert_eq!(text.text, "b");
        assert_eq!(children.len(), 3);
    }

    #[test]
    fn table_cells_respect_escapes_and_verbatim() {
        let nodes = blocks("| `a|b` | c\\|d |");
        let NodeKind::Table(rows) = &nodes[0].kind else {
            panic!("expected table");
        };
        let NodeKind::Row { cells, .. } = &rows[0].kind else {
            panic!("expected row");
        };
        assert_eq!(cells.len(), 2);
    }

    #[test]
    fn attribute_lines_attach_to_next_block() {
        let nodes = blocks("{#x}\n{.y}\n# Head");
        assert_eq!(nodes[0].attrs.id.as_deref(), Some("x"));
        assert_eq!(nodes[0].attrs.classes, vec!["y"]);
    }

    #[test]
    fn definition_list_splits_term() {
        let nodes = blocks(": apple\n\n  red fruit\n: pear");
        let NodeKind::List { style, items, tight, .. } = &nodes[0].kind else {
            panic!("expected list");
        };
        assert_eq!(*style, ListStyle::Definition);
        assert!(*tight);
        let NodeKind::ListItem { children, .. } = &items[0].kind else {
            panic!("expected item");
        };
        assert!(matches!(children[0].kind, NodeKind::Term(_)));
        assert!(matches!(children[1].kind, NodeKind::Definition(_)));
    }

    #[test]
    fn task_items_record_checkbox() {
        let nodes = blocks("- [ ] todo\n- [x] done");
        let NodeKind::List { style, items, .. } = &nodes[0].kind else {
            panic!("expected list");
        };
        assert_eq!(*style, ListStyle::Task('-'));
        assert!(matches!(items[1].kind, NodeKind::ListItem { checked: Some(true), .. }));
    }
}
