//! Filter pipeline.
//!
//! A [`Filter`] maps block and inline tags to handlers. Applying a filter
//! walks the assembled document once in document order, footnote bodies
//! included. A handler may edit the node in place, replace it, splice in any
//! number of nodes, or delete it; the walk then continues into the children of
//! whatever nodes ended up in the tree. Nodes produced by a handler are not
//! passed to a handler again during the same walk.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::ast::{Block, BlockTag, Document, Inline, InlineTag};

/// What a handler wants done with the node it was given.
#[derive(Debug, Clone, PartialEq)]
pub enum Visit<T> {
    /// Keep the node, including any in-place edits.
    Unchanged,
    /// Replace the node with another one.
    Replace(T),
    /// Replace the node with a sequence of nodes (possibly empty).
    Splice(Vec<T>),
    /// Remove the node.
    Delete,
}

type Handler<T> = Box<dyn FnMut(&mut T) -> Visit<T>>;

/// A set of tag-keyed handlers applied in one traversal.
#[derive(Default)]
pub struct Filter {
    blocks: HashMap<BlockTag, Handler<Block>>,
    inlines: HashMap<InlineTag, Handler<Inline>>,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("blocks", &self.blocks.keys().collect::<Vec<_>>())
            .field("inlines", &self.inlines.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Counters reported after a traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Handler invocations.
    pub visited: usize,
    /// Nodes replaced, spliced or deleted.
    pub changed: usize,
}

impl Filter {
    /// Create a filter with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for blocks with `tag`, replacing any previous one.
    pub fn on_block<F>(mut self, tag: BlockTag, handler: F) -> Self
    where
        F: FnMut(&mut Block) -> Visit<Block> + 'static,
    {
        self.blocks.insert(tag, Box::new(handler));
        self
    }

    /// Register a handler for inlines with `tag`, replacing any previous one.
    pub fn on_inline<F>(mut self, tag: InlineTag, handler: F) -> Self
    where
        F: FnMut(&mut Inline) -> Visit<Inline> + 'static,
    {
        self.inlines.insert(tag, Box::new(handler));
        self
    }

    /// Check if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.inlines.is_empty()
    }

    /// Walk `doc` once, applying the handlers.
    pub fn apply(&mut self, doc: &mut Document) -> FilterStats {
        let mut stats = FilterStats::default();
        self.walk_blocks(&mut doc.blocks, &mut stats);
        for footnote in &mut doc.footnotes {
            self.walk_blocks(&mut footnote.blocks, &mut stats);
        }
        stats
    }

    fn walk_blocks(&mut self, blocks: &mut Vec<Block>, stats: &mut FilterStats) {
        if !self.blocks.is_empty() {
            let old = std::mem::take(blocks);
            blocks.reserve(old.len());
            for mut block in old {
                match self.blocks.get_mut(&block.tag()) {
                    Some(handler) => {
                        stats.visited += 1;
                        let visit = handler(&mut block);
                        splice(blocks, block, visit, stats);
                    }
                    None => blocks.push(block),
                }
            }
        }
        for block in blocks.iter_mut() {
            if let Some(inlines) = block.inlines_mut() {
                self.walk_inlines(inlines, stats);
            }
            if let Some(children) = block.children_mut() {
                self.walk_blocks(children, stats);
            }
        }
    }

    fn walk_inlines(&mut self, inlines: &mut Vec<Inline>, stats: &mut FilterStats) {
        if self.inlines.is_empty() {
            return;
        }
        let old = std::mem::take(inlines);
        inlines.reserve(old.len());
        for mut inline in old {
            match self.inlines.get_mut(&inline.tag()) {
                Some(handler) => {
                    stats.visited += 1;
                    let visit = handler(&mut inline);
                    splice(inlines, inline, visit, stats);
                }
                None => inlines.push(inline),
            }
        }
        for inline in inlines.iter_mut() {
            if let Some(children) = inline.children_mut() {
                self.walk_inlines(children, stats);
            }
        }
    }
}

fn splice<T>(out: &mut Vec<T>, node: T, visit: Visit<T>, stats: &mut FilterStats) {
    match visit {
        Visit::Unchanged => out.push(node),
        Visit::Replace(new) => {
            stats.changed += 1;
            out.push(new);
        }
        Visit::Splice(nodes) => {
            stats.changed += 1;
            out.extend(nodes);
        }
        Visit::Delete => stats.changed += 1,
    }
}

/// Run `filters` over `doc` in order, each with its own traversal.
pub fn apply_filters(mut doc: Document, filters: &mut [Filter]) -> Document {
    for (i, filter) in filters.iter_mut().enumerate() {
        let stats = filter.apply(&mut doc);
        debug!(
            "filter {}: {} nodes visited, {} changed",
            i, stats.visited, stats.changed
        );
    }
    doc
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::ast::{BlockKind, InlineKind};
    use crate::parse;
    use crate::render::{render, Format};

    #[test]
    fn in_place_edits_are_kept() {
        let mut filter = Filter::new().on_inline(InlineTag::Text, |inline| {
            if let InlineKind::Text { text } = &mut inline.kind {
                *text = text.to_uppercase();
            }
            Visit::Unchanged
        });
        let mut doc = parse("hello _world_\n");
        let stats = filter.apply(&mut doc);
        assert_eq!(stats.visited, 2);
        assert_eq!(render(&doc, Format::Html), "<p>HELLO <em>WORLD</em></p>\n");
    }

    #[test]
    fn delete_and_splice() {
        let doc = parse("keep\n\n***\n\ndrop\n");
        let mut filters = [
            Filter::new().on_block(BlockTag::ThematicBreak, |_| Visit::Delete),
            Filter::new().on_block(BlockTag::Paragraph, |block| {
                let drop = block
                    .inlines()
                    .is_some_and(|i| crate::ast::plain_text(i) == "drop");
                if drop {
                    Visit::Splice(Vec::new())
                } else {
                    Visit::Unchanged
                }
            }),
        ];
        let doc = apply_filters(doc, &mut filters);
        assert_eq!(render(&doc, Format::Html), "<p>keep</p>\n");
    }

    #[test]
    fn children_of_inserted_nodes_are_visited() {
        let mut filter = Filter::new()
            .on_block(BlockTag::ThematicBreak, |block| {
                let emphasis = Inline::new(
                    InlineKind::Emphasis {
                        children: vec![Inline::text("b", block.span)],
                    },
                    block.span,
                );
                Visit::Replace(Block::new(
                    BlockKind::Paragraph {
                        children: vec![emphasis],
                    },
                    block.span,
                ))
            })
            .on_inline(InlineTag::Emphasis, |inline| {
                Visit::Replace(Inline::text("x", inline.span))
            });
        let mut doc = parse("_a_\n\n***\n");
        let stats = filter.apply(&mut doc);
        assert_eq!(stats.changed, 3);
        assert_eq!(render(&doc, Format::Html), "<p>x</p>\n<p>x</p>\n");
    }

    #[test]
    fn footnote_bodies_are_visited() {
        let seen = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&seen);
        let mut filter = Filter::new().on_block(BlockTag::Paragraph, move |_| {
            counter.set(counter.get() + 1);
            Visit::Unchanged
        });
        let mut doc = parse("a[^1]\n\n[^1]: b\n");
        filter.apply(&mut doc);
        assert_eq!(seen.get(), 2);
    }
}
