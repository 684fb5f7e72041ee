//! AST assembler.
//!
//! Turns the unresolved block tree into a [`Document`]:
//!
//! 1. every leaf's text is resolved into inlines against the reference table;
//! 2. headings receive identifiers (explicit ids are reserved first);
//! 3. explicit references with no definition are matched against heading text;
//! 4. footnote references are numbered in order of first reference, and the
//!    referenced definitions are collected in that order;
//! 5. top-level headings are wrapped in nested sections.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::ast::{plain_text, Block, BlockKind, Document, Footnote, Inline, InlineKind};
use crate::attr::Attributes;
use crate::block::{FootnoteDef, Node, NodeKind, References};
use crate::inline::parse_inlines;
use crate::span::Span;

/// Characters removed from heading text when deriving an identifier.
const ID_STRIP: &str = "][~!@#$%^&*(){}`,.<>\\|=+/?";

/// A converted footnote body waiting to be referenced.
type Body = (Vec<Block>, Attributes, Span);

/// Assemble the document from parsed blocks and the reference table.
pub fn assemble(nodes: Vec<Node>, mut refs: References, span: Span) -> Document {
    let defs = refs.take_footnotes();
    let mut blocks = convert_all(nodes, &refs);
    let mut index = HashMap::with_capacity(defs.len());
    let mut bodies: Vec<Option<Body>> = Vec::with_capacity(defs.len());
    for FootnoteDef {
        label,
        children,
        attrs,
        span,
    } in defs
    {
        index.insert(label, bodies.len());
        bodies.push(Some((convert_all(children, &refs), attrs, span)));
    }

    let mut ids = Identifiers::default();
    ids.reserve(&blocks);
    for (body, _, _) in bodies.iter().flatten() {
        ids.reserve(body);
    }
    ids.assign(&mut blocks);
    for (body, _, _) in bodies.iter_mut().flatten() {
        ids.assign(body);
    }

    let mut numbering = Numbering::default();
    resolve_inlines(&mut blocks, &mut |inline: &mut Inline| {
        ids.link(inline);
        numbering.number(inline);
    });

    let mut footnotes = Vec::with_capacity(numbering.order.len());
    while let Some(label) = numbering.order.get(footnotes.len()).cloned() {
        let (mut body, attrs, def_span) = index
            .get(&label)
            .and_then(|&i| bodies[i].take())
            .unwrap_or_else(|| (Vec::new(), Attributes::new(), Span::empty(span.end)));
        resolve_inlines(&mut body, &mut |inline: &mut Inline| {
            ids.link(inline);
            numbering.number(inline);
        });
        footnotes.push(Footnote {
            label,
            number: footnotes.len() + 1,
            blocks: body,
            attrs,
            span: def_span,
        });
    }

    let blocks = sectionize(blocks);
    debug!(
        "assembled {} top-level blocks, {} footnotes ({} unreferenced)",
        blocks.len(),
        footnotes.len(),
        bodies.iter().flatten().count()
    );
    Document {
        blocks,
        footnotes,
        span,
    }
}

fn convert_all(nodes: Vec<Node>, refs: &References) -> Vec<Block> {
    nodes.into_iter().map(|node| convert(node, refs)).collect()
}

fn convert(node: Node, refs: &References) -> Block {
    let Node { kind, attrs, span } = node;
    let kind = match kind {
        NodeKind::Paragraph(leaf) => BlockKind::Paragraph {
            children: parse_inlines(&leaf, refs),
        },
        NodeKind::Heading { level, text } => BlockKind::Heading {
            level,
            children: parse_inlines(&text, refs),
        },
        NodeKind::List {
            style,
            tight,
            start,
            items,
        } => BlockKind::List {
            style,
            tight,
            start,
            children: convert_all(items, refs),
        },
        NodeKind::ListItem { checked, children } => BlockKind::ListItem {
            checked,
            children: convert_all(children, refs),
        },
        NodeKind::Term(leaf) => BlockKind::Term {
            children: parse_inlines(&leaf, refs),
        },
        NodeKind::Definition(children) => BlockKind::Definition {
            children: convert_all(children, refs),
        },
        NodeKind::BlockQuote(children) => BlockKind::BlockQuote {
            children: convert_all(children, refs),
        },
        NodeKind::CodeBlock { lang, text } => BlockKind::CodeBlock { lang, text },
        NodeKind::RawBlock { format, text } => BlockKind::RawBlock { format, text },
        NodeKind::ThematicBreak => BlockKind::ThematicBreak,
        NodeKind::Table(children) => BlockKind::Table {
            children: convert_all(children, refs),
        },
        NodeKind::Caption(leaf) => BlockKind::Caption {
            children: parse_inlines(&leaf, refs),
        },
        NodeKind::Row { head, cells } => BlockKind::Row {
            head,
            children: convert_all(cells, refs),
        },
        NodeKind::Cell { head, align, text } => BlockKind::Cell {
            head,
            align,
            children: parse_inlines(&text, refs),
        },
        NodeKind::Div(children) => BlockKind::Div {
            children: convert_all(children, refs),
        },
    };
    Block { kind, attrs, span }
}

/// Heading identifiers and the implicit reference table built from them.
#[derive(Debug, Default)]
struct Identifiers {
    used: HashSet<String>,
    /// Heading plain text to id; the first heading with a given text wins.
    headings: HashMap<String, String>,
}

impl Identifiers {
    fn reserve(&mut self, blocks: &[Block]) {
        for block in blocks {
            if let Some(id) = &block.attrs.id {
                self.used.insert(id.clone());
            }
            if let Some(children) = block.children() {
                self.reserve(children);
            }
        }
    }

    fn assign(&mut self, blocks: &mut [Block]) {
        for block in blocks {
            if let BlockKind::Heading { children, .. } = &block.kind {
                let text = plain_text(children);
                let id = match &block.attrs.id {
                    Some(id) => id.clone(),
                    None => {
                        let id = self.generate(&text);
                        block.attrs.set_id(id.clone());
                        id
                    }
                };
                self.headings.entry(text).or_insert(id);
            }
            if let Some(children) = block.children_mut() {
                self.assign(children);
            }
        }
    }

    fn generate(&mut self, text: &str) -> String {
        let stripped: String = text.chars().filter(|c| !ID_STRIP.contains(*c)).collect();
        let base = stripped.split_whitespace().collect::<Vec<_>>().join("-");
        if !base.is_empty() && self.used.insert(base.clone()) {
            return base;
        }
        let prefix = if base.is_empty() { "s" } else { base.as_str() };
        let mut n = 1;
        loop {
            let candidate = format!("{}-{}", prefix, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Point an unresolved explicit reference at a heading with that text.
    fn link(&self, inline: &mut Inline) {
        if let InlineKind::Link {
            destination,
            reference: Some(label),
            ..
        } = &mut inline.kind
        {
            if destination.is_none() {
                *destination = self.headings.get(label.as_str()).map(|id| format!("#{}", id));
            }
        }
    }
}

/// Footnote numbers in order of first reference.
#[derive(Debug, Default)]
struct Numbering {
    order: Vec<String>,
    numbers: HashMap<String, usize>,
}

impl Numbering {
    fn number(&mut self, inline: &mut Inline) {
        if let InlineKind::FootnoteReference { label, number } = &mut inline.kind {
            let next = self.order.len() + 1;
            *number = *self.numbers.entry(label.clone()).or_insert_with(|| {
                self.order.push(label.clone());
                next
            });
        }
    }
}

/// Visit every inline under `blocks` in document order.
fn resolve_inlines(blocks: &mut [Block], f: &mut impl FnMut(&mut Inline)) {
    for block in blocks {
        if let Some(inlines) = block.inlines_mut() {
            visit_inlines(inlines, f);
        }
        if let Some(children) = block.children_mut() {
            resolve_inlines(children, f);
        }
    }
}

fn visit_inlines(inlines: &mut [Inline], f: &mut impl FnMut(&mut Inline)) {
    for inline in inlines {
        f(inline);
        if let Some(children) = inline.children_mut() {
            visit_inlines(children, f);
        }
    }
}

/// Wrap top-level headings in sections; a section runs until the next
/// heading of the same or a higher level. Heading ids move to the section.
fn sectionize(blocks: Vec<Block>) -> Vec<Block> {
    let mut out = Vec::with_capacity(blocks.len());
    let mut open: Vec<(u8, Block)> = Vec::new();

    for mut block in blocks {
        if let BlockKind::Heading { level, .. } = block.kind {
            while open.last().is_some_and(|(l, _)| *l >= level) {
                close_section(&mut open, &mut out);
            }
            let mut section = Block::new(
                BlockKind::Section {
                    children: Vec::new(),
                },
                block.span,
            );
            section.attrs.id = block.attrs.id.take();
            push_child(&mut section, block);
            open.push((level, section));
            continue;
        }
        match open.last_mut() {
            Some((_, section)) => push_child(section, block),
            None => out.push(block),
        }
    }
    while !open.is_empty() {
        close_section(&mut open, &mut out);
    }
    out
}

fn close_section(open: &mut Vec<(u8, Block)>, out: &mut Vec<Block>) {
    if let Some((_, section)) = open.pop() {
        match open.last_mut() {
            Some((_, parent)) => push_child(parent, section),
            None => out.push(section),
        }
    }
}

fn push_child(section: &mut Block, child: Block) {
    section.span = section.span.merge(child.span);
    if let Some(children) = section.children_mut() {
        children.push(child);
    }
}
