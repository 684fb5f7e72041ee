//! # djot core
//!
//! A deterministic parser and HTML renderer for the djot markup language.
//!
//! Parsing runs in two phases. The block parser turns lines into a tree of
//! containers and leaves and fills the reference table. Once the table is
//! complete, every leaf's text goes through the inline delimiter engine and
//! the assembler produces the final [`Document`].
//!
//! ## Quick Start
//!
//! ```rust
//! use djot_core::{parse, render, Format};
//!
//! let doc = parse("# Hello\n\nThis is *strong* and _emphasized_.\n");
//! let html = render(&doc, Format::Html);
//! assert!(html.contains("<strong>strong</strong>"));
//! ```
//!
//! ## Filters
//!
//! ```rust
//! use djot_core::ast::{BlockTag, InlineKind, InlineTag};
//! use djot_core::{apply_filters, parse, render, Filter, Format, Visit};
//!
//! let shout = Filter::new().on_inline(InlineTag::Text, |inline| {
//!     if let InlineKind::Text { text } = &mut inline.kind {
//!         *text = text.to_uppercase();
//!     }
//!     Visit::Unchanged
//! });
//! let doc = apply_filters(parse("quiet\n"), &mut [shout]);
//! assert_eq!(render(&doc, Format::Html), "<p>QUIET</p>\n");
//! ```
//!
//! ## Totality
//!
//! Parsing never fails. Constructs that do not resolve degrade to literal
//! text; only the session boundary reports errors.

pub mod assemble;
pub mod ast;
pub mod attr;
pub mod block;
pub mod dump;
pub mod error;
pub mod filter;
pub mod inline;
pub mod lexer;
pub mod render;
pub mod session;
pub mod span;

use log::debug;

pub use ast::{Block, Document, Inline};
pub use attr::Attributes;
pub use error::{Error, Result};
pub use filter::{apply_filters, Filter, Visit};
pub use render::{render, render_with, Format, RenderOptions};
pub use session::{Handle, Session, Sessions};
pub use span::Span;

/// Parser configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    sourcepos: bool,
}

impl ParseOptions {
    /// Create the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Include source spans in the AST JSON and pretty listings.
    pub fn with_sourcepos(mut self, sourcepos: bool) -> Self {
        self.sourcepos = sourcepos;
        self
    }

    /// Whether source spans are reported.
    #[inline]
    pub fn sourcepos(&self) -> bool {
        self.sourcepos
    }
}

/// Parse a djot document with default options.
#[inline]
pub fn parse(input: &str) -> Document {
    parse_with(input, &ParseOptions::default())
}

/// Parse a djot document.
pub fn parse_with(input: &str, options: &ParseOptions) -> Document {
    let (nodes, refs) = block::parse_blocks(input);
    debug!(
        "block phase: {} top-level blocks, {} reference definitions",
        nodes.len(),
        refs.len()
    );
    let doc = assemble::assemble(nodes, refs, Span::new(0, input.len() as u32));
    debug!("parsed {} bytes (sourcepos: {})", input.len(), options.sourcepos);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_total_on_odd_input() {
        for input in ["", "\n", "[", "{", "`", "\\", "> ", "- [ ]", ":::", "|", "[^", "$`"] {
            let doc = parse(input);
            assert_eq!(doc.span, Span::new(0, input.len() as u32));
            let _ = render(&doc, Format::Html);
        }
    }

    #[test]
    fn options_builder() {
        let options = ParseOptions::new().with_sourcepos(true);
        assert!(options.sourcepos());
        assert!(!ParseOptions::default().sourcepos());
    }
}
