//! Inline delimiter engine.
//!
//! A single left-to-right pass over a leaf's text produces a flat list of
//! events. Delimiters are pushed as literal text and remembered on opener
//! stacks (one per delimiter kind, plus the bracket stack). When a closer
//! matches, the opener event is rewritten in place and every unmatched opener
//! registered after it is dropped, so it stays literal. No construct is ever
//! re-scanned, which keeps the pass linear in the leaf length.
//!
//! The event list is folded into a tree at the end; matched open/close pairs
//! are always properly nested.

use std::collections::HashMap;

use memchr::memchr;

use crate::ast::{Inline, InlineKind};
use crate::attr::{parse_attributes, Attributes};
use crate::block::{Leaf, References};
use crate::span::Span;

/// Resolve the inline content of a leaf against the reference table.
pub fn parse_inlines(leaf: &Leaf, refs: &References) -> Vec<Inline> {
    if leaf.is_empty() {
        return Vec::new();
    }
    let mut engine = Engine::new(leaf, refs);
    engine.run();
    engine.build()
}

const fn special_table() -> [bool; 256] {
    let mut table = [false; 256];
    let chars = b"\\\n`$<:[]!{}_*^~=+-()";
    let mut i = 0;
    while i < chars.len() {
        table[chars[i] as usize] = true;
        i += 1;
    }
    table
}

static SPECIAL: [bool; 256] = special_table();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Emphasis,
    Strong,
    Highlight,
    Insert,
    Delete,
    Superscript,
    Subscript,
    Link,
    Image,
    Span,
}

/// Number of emphasis-class delimiter kinds, each with its own opener stack.
const DELIMITER_KINDS: usize = 7;

impl Container {
    fn delimiter(b: u8) -> Option<Container> {
        Some(match b {
            b'_' => Container::Emphasis,
            b'*' => Container::Strong,
            b'=' => Container::Highlight,
            b'+' => Container::Insert,
            b'-' => Container::Delete,
            b'^' => Container::Superscript,
            b'~' => Container::Subscript,
            _ => return None,
        })
    }

    /// Highlight, insert and delete only exist in braced form.
    fn braced_only(self) -> bool {
        matches!(
            self,
            Container::Highlight | Container::Insert | Container::Delete
        )
    }

    fn slot(self) -> usize {
        match self {
            Container::Emphasis => 0,
            Container::Strong => 1,
            Container::Highlight => 2,
            Container::Insert => 3,
            Container::Delete => 4,
            Container::Superscript => 5,
            Container::Subscript => 6,
            Container::Link | Container::Image | Container::Span => DELIMITER_KINDS,
        }
    }

    fn wrap(self, children: Vec<Inline>) -> InlineKind {
        match self {
            Container::Emphasis => InlineKind::Emphasis { children },
            Container::Strong => InlineKind::Strong { children },
            Container::Highlight => InlineKind::Highlight { children },
            Container::Insert => InlineKind::Insert { children },
            Container::Delete => InlineKind::Delete { children },
            Container::Superscript => InlineKind::Superscript { children },
            Container::Subscript => InlineKind::Subscript { children },
            Container::Span => InlineKind::Span { children },
            Container::Link => InlineKind::Link {
                destination: None,
                title: None,
                reference: None,
                children,
            },
            Container::Image => InlineKind::Image {
                destination: None,
                title: None,
                reference: None,
                children,
            },
        }
    }
}

/// Resolved target of a link or image.
#[derive(Debug, Default)]
struct Target {
    destination: Option<String>,
    title: Option<String>,
    reference: Option<String>,
    attrs: Attributes,
}

#[derive(Debug)]
enum Ev {
    /// Literal text covering the event range.
    Str,
    SoftBreak,
    HardBreak,
    Nbsp,
    Open(Container),
    /// Closes the innermost open container.
    Close,
    CloseLink(Box<Target>),
    CloseSpan(Attributes),
    /// Node resolved eagerly (verbatim, autolink, symbol, ...).
    Node(InlineKind),
    /// Attribute block attaching to the preceding node.
    Attrs(Attributes),
}

#[derive(Debug)]
struct Event {
    kind: Ev,
    start: usize,
    end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Bracket {
    event: usize,
    image: bool,
}

/// A bracket followed by `](`, waiting for its closing parenthesis.
#[derive(Debug, Clone, Copy)]
struct Pending {
    bracket: Bracket,
    /// Event index of the literal `](`; everything from here is replaced.
    close_event: usize,
    /// Offset of the `]`.
    close_start: usize,
    depth: usize,
}

struct Engine<'a> {
    leaf: &'a Leaf,
    text: &'a str,
    bytes: &'a [u8],
    refs: &'a References,
    pos: usize,
    text_start: usize,
    events: Vec<Event>,
    /// Opener event indices per delimiter kind.
    openers: [Vec<usize>; DELIMITER_KINDS],
    brackets: Vec<Bracket>,
    pending: Option<Pending>,
    /// Closing parenthesis for a destination starting at each offset.
    /// Computed on the first `](` of the leaf.
    closes: Option<Vec<Option<usize>>>,
}

impl<'a> Engine<'a> {
    fn new(leaf: &'a Leaf, refs: &'a References) -> Self {
        Self {
            leaf,
            text: &leaf.text,
            bytes: leaf.text.as_bytes(),
            refs,
            pos: 0,
            text_start: 0,
            events: Vec::with_capacity(16),
            openers: Default::default(),
            brackets: Vec::new(),
            pending: None,
            closes: None,
        }
    }

    fn run(&mut self) {
        while let Some(offset) = self.bytes[self.pos..]
            .iter()
            .position(|&b| SPECIAL[b as usize])
        {
            self.pos += offset;
            let consumed = if self.pending.is_some() {
                self.step_destination()
            } else {
                self.step()
            };
            if !consumed {
                self.pos += 1;
            }
            if self.pos >= self.bytes.len() {
                break;
            }
        }
        self.flush(self.bytes.len());
    }

    #[inline]
    fn peek(&self, at: usize) -> Option<u8> {
        self.bytes.get(at).copied()
    }

    /// Emit pending literal text up to `end`.
    #[inline]
    fn flush(&mut self, end: usize) {
        if self.text_start < end {
            self.events.push(Event {
                kind: Ev::Str,
                start: self.text_start,
                end,
            });
        }
        self.text_start = end;
    }

    /// Flush, emit an event for `start..end` and continue after it.
    fn emit(&mut self, kind: Ev, start: usize, end: usize) {
        self.flush(start);
        self.events.push(Event { kind, start, end });
        self.pos = end;
        self.text_start = end;
    }

    fn step(&mut self) -> bool {
        let pos = self.pos;
        match self.bytes[pos] {
            b'\\' => self.escape(),
            b'\n' => self.soft_break(),
            b'`' => self.verbatim(pos, pos, None),
            b'$' => {
                let dollars = self.bytes[pos..].iter().take_while(|&&b| b == b'$').count();
                if dollars <= 2 && self.peek(pos + dollars) == Some(b'`') {
                    self.verbatim(pos, pos + dollars, Some(dollars == 2))
                } else {
                    self.pos = pos + dollars;
                    true
                }
            }
            b'<' => self.autolink(),
            b':' => self.symbol(),
            b'[' => {
                if self.peek(pos + 1) == Some(b'^') && self.footnote_reference() {
                    return true;
                }
                self.open_bracket(false)
            }
            b'!' if self.peek(pos + 1) == Some(b'[') => self.open_bracket(true),
            b']' => self.close_bracket(),
            b'{' => self.open_brace(),
            b => match Container::delimiter(b) {
                Some(kind) => self.delimiter(kind, false),
                None => false,
            },
        }
    }

    fn step_destination(&mut self) -> bool {
        let pos = self.pos;
        match self.bytes[pos] {
            b'\\' => self.escape(),
            b'\n' => self.soft_break(),
            b'(' => {
                if let Some(p) = &mut self.pending {
                    p.depth += 1;
                }
                false
            }
            b')' => {
                if let Some(p) = self.pending.as_mut().filter(|p| p.depth > 0) {
                    p.depth -= 1;
                    return false;
                }
                self.close_destination()
            }
            b => match Container::delimiter(b) {
                Some(kind) => self.delimiter(kind, true),
                None => false,
            },
        }
    }

    fn escape(&mut self) -> bool {
        let pos = self.pos;
        match self.peek(pos + 1) {
            Some(b) if b.is_ascii_punctuation() => {
                self.flush(pos);
                self.text_start = pos + 1;
                self.pos = pos + 2;
                self.flush(pos + 2);
                true
            }
            Some(b' ') => {
                self.emit(Ev::Nbsp, pos, pos + 2);
                true
            }
            Some(b'\n') => {
                self.emit(Ev::HardBreak, pos, pos + 2);
                true
            }
            _ => false,
        }
    }

    fn soft_break(&mut self) -> bool {
        let pos = self.pos;
        let keep = self.text[self.text_start..pos].trim_end_matches(' ').len();
        self.flush(self.text_start + keep);
        self.text_start = pos;
        self.emit(Ev::SoftBreak, pos, pos + 1);
        true
    }

    /// Backtick verbatim, optionally preceded by `$`/`$$` for math.
    fn verbatim(&mut self, start: usize, ticks: usize, math: Option<bool>) -> bool {
        let n = self.bytes[ticks..].iter().take_while(|&&b| b == b'`').count();
        let content_start = ticks + n;

        let mut close = None;
        let mut i = content_start;
        while let Some(offset) = memchr(b'`', &self.bytes[i..]) {
            let run_start = i + offset;
            let run = self.bytes[run_start..]
                .iter()
                .take_while(|&&b| b == b'`')
                .count();
            if run == n {
                close = Some(run_start);
                break;
            }
            i = run_start + run;
        }

        let (content_end, mut end) = match close {
            Some(c) => (c, c + n),
            None => (self.bytes.len(), self.bytes.len()),
        };
        let mut content = &self.text[content_start..content_end];
        if content.starts_with(" `") {
            content = &content[1..];
        }
        if content.ends_with("` ") {
            content = &content[..content.len() - 1];
        }
        let content = content.to_string();

        let kind = match math {
            Some(display) => InlineKind::Math {
                display,
                text: content,
            },
            None => match close.and_then(|_| self.raw_format(end)) {
                Some((format, format_end)) => {
                    end = format_end;
                    InlineKind::RawInline {
                        format,
                        text: content,
                    }
                }
                None => InlineKind::Verbatim { text: content },
            },
        };
        self.emit(Ev::Node(kind), start, end);
        true
    }

    /// `{=format}` directly after verbatim.
    fn raw_format(&self, at: usize) -> Option<(String, usize)> {
        let rest = self.text.get(at..)?.strip_prefix("{=")?;
        let len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-'))
            .count();
        if len == 0 || rest.as_bytes().get(len) != Some(&b'}') {
            return None;
        }
        Some((rest[..len].to_string(), at + 2 + len + 1))
    }

    fn autolink(&mut self) -> bool {
        let start = self.pos;
        let body_start = start + 1;
        let Some(len) = self.bytes[body_start..]
            .iter()
            .position(|b| matches!(b, b'>' | b'<' | b' ' | b'\t' | b'\n'))
        else {
            return false;
        };
        if len == 0 || self.bytes[body_start + len] != b'>' {
            return false;
        }
        let body = &self.text[body_start..body_start + len];

        let kind = if is_url(body) {
            InlineKind::Autolink {
                url: body.to_string(),
                email: false,
            }
        } else if is_email(body) {
            InlineKind::Autolink {
                url: body.to_string(),
                email: true,
            }
        } else {
            return false;
        };
        self.emit(Ev::Node(kind), start, body_start + len + 1);
        true
    }

    fn symbol(&mut self) -> bool {
        let start = self.pos;
        let len = self.bytes[start + 1..]
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'+' | b'-'))
            .count();
        if len == 0 || self.peek(start + 1 + len) != Some(b':') {
            return false;
        }
        let name = self.text[start + 1..start + 1 + len].to_string();
        self.emit(Ev::Node(InlineKind::Symbol { name }), start, start + len + 2);
        true
    }

    fn footnote_reference(&mut self) -> bool {
        let start = self.pos;
        let label_start = start + 2;
        let Some(len) = self.bytes[label_start..]
            .iter()
            .position(|b| matches!(b, b']' | b'[' | b' ' | b'\t' | b'\n'))
        else {
            return false;
        };
        if len == 0 || self.bytes[label_start + len] != b']' {
            return false;
        }
        let label = self.text[label_start..label_start + len].to_string();
        self.emit(
            Ev::Node(InlineKind::FootnoteReference { label, number: 0 }),
            start,
            label_start + len + 1,
        );
        true
    }

    fn open_bracket(&mut self, image: bool) -> bool {
        let start = self.pos;
        let end = start + if image { 2 } else { 1 };
        self.flush(start);
        let event = self.events.len();
        self.emit(Ev::Str, start, end);
        self.brackets.push(Bracket { event, image });
        true
    }

    /// `{` forcing an opener, or an attribute block.
    fn open_brace(&mut self) -> bool {
        let start = self.pos;
        if let Some(kind) = self.peek(start + 1).and_then(Container::delimiter) {
            self.push_opener(kind, start, start + 2);
            return true;
        }
        match parse_attributes(self.text, start) {
            Some((attrs, end)) => {
                self.emit(Ev::Attrs(attrs), start, end);
                true
            }
            None => false,
        }
    }

    fn push_opener(&mut self, kind: Container, start: usize, end: usize) {
        self.flush(start);
        let event = self.events.len();
        self.emit(Ev::Str, start, end);
        self.openers[kind.slot()].push(event);
    }

    /// Handle an emphasis-class delimiter character at the current position.
    fn delimiter(&mut self, kind: Container, close_only: bool) -> bool {
        let pos = self.pos;
        if self.peek(pos + 1) == Some(b'}') {
            return self.close(kind, pos, pos + 2);
        }
        if kind.braced_only() {
            return false;
        }

        let prev = self.text[..pos].chars().next_back();
        let next = self.text[pos + 1..].chars().next();
        let can_close = prev.is_some_and(|c| !c.is_whitespace());
        let can_open = next.is_some_and(|c| !c.is_whitespace());

        if can_close && self.close(kind, pos, pos + 1) {
            return true;
        }
        if can_open && !close_only {
            self.push_opener(kind, pos, pos + 1);
            return true;
        }
        false
    }

    /// Match a closer against the most recent opener of the same kind.
    fn close(&mut self, kind: Container, start: usize, end: usize) -> bool {
        let Some(&opener) = self.openers[kind.slot()].last() else {
            return false;
        };
        if self.events[opener].end == start {
            return false;
        }
        self.openers[kind.slot()].pop();
        self.clear_after(opener);
        self.events[opener].kind = Ev::Open(kind);
        self.emit(Ev::Close, start, end);
        true
    }

    /// Drop every unmatched opener registered after event `event`.
    fn clear_after(&mut self, event: usize) {
        for stack in &mut self.openers {
            while stack.last().is_some_and(|&e| e > event) {
                stack.pop();
            }
        }
        while self.brackets.last().is_some_and(|b| b.event > event) {
            self.brackets.pop();
        }
        if self.pending.is_some_and(|p| p.bracket.event > event) {
            self.pending = None;
        }
    }

    fn close_bracket(&mut self) -> bool {
        let pos = self.pos;
        let text = self.text;
        let Some(bracket) = self.brackets.pop() else {
            return false;
        };
        let content_start = self.events[bracket.event].end;

        match self.peek(pos + 1) {
            Some(b'(') => {
                if self.destination_close(pos + 2).is_none() {
                    return false;
                }
                self.clear_after(bracket.event);
                self.flush(pos);
                let close_event = self.events.len();
                self.emit(Ev::Str, pos, pos + 2);
                self.pending = Some(Pending {
                    bracket,
                    close_event,
                    close_start: pos,
                    depth: 0,
                });
                true
            }
            Some(b'[') => {
                let label_start = pos + 2;
                let Some(len) = self.bytes[label_start..]
                    .iter()
                    .position(|b| matches!(b, b']' | b'['))
                else {
                    return false;
                };
                if self.bytes[label_start + len] != b']' {
                    return false;
                }
                let label = match &text[label_start..label_start + len] {
                    "" => &text[content_start..pos],
                    label => label,
                };
                if label.contains('\n') {
                    return false;
                }
                let target = self.lookup(label).unwrap_or_else(|| Target {
                    reference: Some(label.to_string()),
                    ..Target::default()
                });
                self.resolve(bracket, pos, label_start + len + 1, Ev::CloseLink(Box::new(target)));
                true
            }
            next => {
                let label = &text[content_start..pos];
                if let Some(target) = self.lookup(label) {
                    self.resolve(bracket, pos, pos + 1, Ev::CloseLink(Box::new(target)));
                    return true;
                }
                if next == Some(b'{') && !bracket.image {
                    if let Some((attrs, end)) = parse_attributes(text, pos + 1) {
                        self.resolve(bracket, pos, end, Ev::CloseSpan(attrs));
                        return true;
                    }
                }
                false
            }
        }
    }

    /// Offset of the `)` ending a destination that starts at `from`.
    fn destination_close(&mut self, from: usize) -> Option<usize> {
        let bytes = self.bytes;
        let closes = self.closes.get_or_insert_with(|| destination_closes(bytes));
        closes.get(from).copied().flatten()
    }

    fn lookup(&self, label: &str) -> Option<Target> {
        let reference = self.refs.get(label)?;
        Some(Target {
            destination: Some(reference.destination.clone()),
            title: reference.title.clone(),
            reference: Some(label.to_string()),
            attrs: reference.attrs.clone(),
        })
    }

    fn resolve(&mut self, bracket: Bracket, start: usize, end: usize, close: Ev) {
        self.clear_after(bracket.event);
        let container = match &close {
            Ev::CloseSpan(_) => Container::Span,
            _ if bracket.image => Container::Image,
            _ => Container::Link,
        };
        self.events[bracket.event].kind = Ev::Open(container);
        self.emit(close, start, end);
    }

    fn close_destination(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        let pos = self.pos;
        let paren = pending.close_start + 1;
        let (destination, title) = split_destination(&self.text[paren + 1..pos]);

        self.events.truncate(pending.close_event);
        self.text_start = pos;
        let container = if pending.bracket.image {
            Container::Image
        } else {
            Container::Link
        };
        self.events[pending.bracket.event].kind = Ev::Open(container);
        let target = Target {
            destination: Some(destination),
            title,
            ..Target::default()
        };
        self.events.push(Event {
            kind: Ev::CloseLink(Box::new(target)),
            start: pending.close_start,
            end: pos + 1,
        });
        self.pos = pos + 1;
        self.text_start = pos + 1;
        true
    }

    fn build(self) -> Vec<Inline> {
        struct Frame {
            container: Option<Container>,
            start: usize,
            open_end: usize,
            children: Vec<Inline>,
        }

        let leaf = self.leaf;
        let text = self.text;
        let mut stack = vec![Frame {
            container: None,
            start: 0,
            open_end: 0,
            children: Vec::new(),
        }];

        for event in self.events {
            let span = leaf.span(event.start, event.end);
            match event.kind {
                Ev::Open(container) => {
                    stack.push(Frame {
                        container: Some(container),
                        start: event.start,
                        open_end: event.end,
                        children: Vec::new(),
                    });
                    continue;
                }
                Ev::Close | Ev::CloseLink(_) | Ev::CloseSpan(_) if stack.len() > 1 => {
                    let Some(frame) = stack.pop() else { break };
                    let Some(container) = frame.container else { break };
                    let span = leaf.span(frame.start, event.end);
                    let node = close_node(container, event.kind, frame.children, span);
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(node);
                    }
                    continue;
                }
                _ => {}
            }

            let Some(top) = stack.last_mut() else { break };
            let children = &mut top.children;
            match event.kind {
                Ev::Str => push_text(children, &text[event.start..event.end], span),
                Ev::SoftBreak => children.push(Inline::new(InlineKind::SoftBreak, span)),
                Ev::HardBreak => children.push(Inline::new(InlineKind::HardBreak, span)),
                Ev::Nbsp => children.push(Inline::new(InlineKind::NonBreakingSpace, span)),
                Ev::Node(kind) => children.push(Inline::new(kind, span)),
                Ev::Attrs(attrs) => attach(children, attrs),
                Ev::Open(_) | Ev::Close | Ev::CloseLink(_) | Ev::CloseSpan(_) => {}
            }
        }

        // Matched pairs always nest; an open frame here would be a bug, so
        // degrade it to its literal opener text.
        while stack.len() > 1 {
            let Some(frame) = stack.pop() else { break };
            if let Some(parent) = stack.last_mut() {
                push_text(
                    &mut parent.children,
                    &text[frame.start..frame.open_end],
                    leaf.span(frame.start, frame.open_end),
                );
                parent.children.extend(frame.children);
            }
        }
        stack.pop().map(|f| f.children).unwrap_or_default()
    }
}

/// For every offset, the first unescaped `)` at which a parenthesis count
/// started there drops below zero. Linear in the leaf length.
fn destination_closes(bytes: &[u8]) -> Vec<Option<usize>> {
    let n = bytes.len();
    let mut level = vec![0i64; n + 1];
    let mut live = vec![false; n];
    let mut i = 0;
    while i < n {
        match bytes[i] {
            b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => {
                level[i + 1] = level[i];
                level[i + 2] = level[i];
                i += 2;
                continue;
            }
            b'(' => level[i + 1] = level[i] + 1,
            b')' => {
                level[i + 1] = level[i] - 1;
                live[i] = true;
            }
            _ => level[i + 1] = level[i],
        }
        i += 1;
    }

    let mut nearest: HashMap<i64, usize> = HashMap::new();
    let mut closes = vec![None; n + 1];
    for p in (0..n).rev() {
        if live[p] {
            nearest.insert(level[p + 1], p);
        }
        closes[p] = nearest.get(&(level[p] - 1)).copied();
    }
    closes
}

fn close_node(container: Container, close: Ev, children: Vec<Inline>, span: Span) -> Inline {
    match close {
        Ev::CloseLink(target) => {
            let Target {
                destination,
                title,
                reference,
                attrs,
            } = *target;
            let kind = if container == Container::Image {
                InlineKind::Image {
                    destination,
                    title,
                    reference,
                    children,
                }
            } else {
                InlineKind::Link {
                    destination,
                    title,
                    reference,
                    children,
                }
            };
            Inline {
                kind,
                attrs,
                span,
            }
        }
        Ev::CloseSpan(attrs) => Inline {
            kind: InlineKind::Span { children },
            attrs,
            span,
        },
        _ => Inline::new(container.wrap(children), span),
    }
}

/// Append text, merging with a preceding text node.
fn push_text(children: &mut Vec<Inline>, s: &str, span: Span) {
    if s.is_empty() {
        return;
    }
    if let Some(Inline {
        kind: InlineKind::Text { text },
        span: last_span,
        ..
    }) = children.last_mut()
    {
        text.push_str(s);
        *last_span = last_span.merge(span);
        return;
    }
    children.push(Inline::text(s, span));
}

/// Attach an attribute block to the preceding node. A trailing word is
/// wrapped in a span; after whitespace there is nothing to attach to.
fn attach(children: &mut Vec<Inline>, attrs: Attributes) {
    let Some(last) = children.last_mut() else {
        return;
    };
    match &mut last.kind {
        InlineKind::Text { text } => {
            let word_start = text
                .char_indices()
                .rev()
                .find(|(_, c)| c.is_whitespace())
                .map(|(i, c)| i + c.len_utf8())
                .unwrap_or(0);
            if word_start == text.len() {
                return;
            }
            let word = text.split_off(word_start);
            let end = last.span.end;
            let word_span = Span::new(end.saturating_sub(word.len() as u32), end);
            last.span.end = word_span.start;
            if text.is_empty() {
                children.pop();
            }
            let mut node = Inline::new(
                InlineKind::Span {
                    children: vec![Inline::text(word, word_span)],
                },
                word_span,
            );
            node.attrs = attrs;
            children.push(node);
        }
        InlineKind::SoftBreak | InlineKind::HardBreak | InlineKind::NonBreakingSpace => {}
        _ => last.attrs.merge(attrs),
    }
}

/// Split raw destination text into destination and optional title.
/// Line breaks are elided and backslash escapes removed.
fn split_destination(raw: &str) -> (String, Option<String>) {
    let raw = raw.trim();
    let mut dest = raw;
    let mut title = None;
    if let Some(body) = raw.strip_suffix('"') {
        if let Some(q) = body.rfind('"') {
            if q > 0 && raw[..q].ends_with(char::is_whitespace) {
                title = Some(unescape(&raw[q + 1..raw.len() - 1]));
                dest = raw[..q].trim_end();
            }
        }
    }
    let joined: String = dest.split('\n').map(str::trim).collect();
    (unescape(&joined), title)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_punctuation() {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn is_url(s: &str) -> bool {
    let Some((scheme, rest)) = s.split_once(':') else {
        return false;
    };
    let mut bytes = scheme.bytes();
    !rest.is_empty()
        && bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'.' | b'-'))
}

fn is_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@') && !s.contains(':')
        }
        None => false,
    }
}
