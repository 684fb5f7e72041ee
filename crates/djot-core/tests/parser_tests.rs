//! Integration tests for the djot parser

use djot_core::ast::{BlockKind, BlockTag, InlineKind, ListStyle};
use djot_core::dump::{to_ast_json, to_ast_pretty, to_matches_pretty};
use djot_core::{parse, parse_with, render, Block, Format, Inline, ParseOptions};
use pretty_assertions::assert_eq;

fn html(input: &str) -> String {
    render(&parse(input), Format::Html)
}

fn first_inlines(input: &str) -> Vec<Inline> {
    let doc = parse(input);
    doc.blocks
        .first()
        .and_then(Block::inlines)
        .map(<[Inline]>::to_vec)
        .unwrap_or_default()
}

// ============================================================================
// Reference Resolution Tests
// ============================================================================

#[test]
fn test_reference_labels_match_exactly() {
    assert_eq!(html("[Link][]\n\n[link]: /url\n"), "<p><a>Link</a></p>\n");
}

#[test]
fn test_collapsed_reference_equals_inline_link() {
    assert_eq!(
        html("[link][]\n\n[link]: url\n"),
        html("[link](url)\n")
    );
}

#[test]
fn test_undefined_reference_keeps_link_without_destination() {
    assert_eq!(html("[link][a and b]\n"), "<p><a>link</a></p>\n");
    let inlines = first_inlines("[link][a and b]\n");
    assert!(matches!(
        &inlines[0].kind,
        InlineKind::Link { destination: None, reference: Some(r), .. } if r == "a and b"
    ));
}

#[test]
fn test_definitions_after_use_still_resolve() {
    assert_eq!(
        html("[x][later]\n\n[later]: /l\n"),
        "<p><a href=\"/l\">x</a></p>\n"
    );
}

#[test]
fn test_first_definition_wins() {
    assert_eq!(
        html("[x][r]\n\n[r]: /first\n\n[r]: /second\n"),
        "<p><a href=\"/first\">x</a></p>\n"
    );
}

#[test]
fn test_local_attributes_override_definition_attributes() {
    let input = "{title=foo}\n[ref]: /url\n\n[link][ref]{title=bar}\n";
    assert_eq!(html(input), "<p><a href=\"/url\" title=\"bar\">link</a></p>\n");
}

#[test]
fn test_labels_cannot_span_lines() {
    assert_eq!(
        html("[x][a\nb]\n\n[a b]: /nope\n"),
        "<p>[x][a\nb]</p>\n"
    );
}

// ============================================================================
// Link Precedence Tests
// ============================================================================

#[test]
fn test_multi_line_destination_joins_lines() {
    assert_eq!(
        html("[link](url\nandurl)\n"),
        "<p><a href=\"urlandurl\">link</a></p>\n"
    );
}

#[test]
fn test_emphasis_before_bracket_closes_first() {
    assert_eq!(
        html("*[closed](hello*)\n"),
        "<p><strong>[closed](hello</strong>)</p>\n"
    );
    assert_eq!(
        html("\\*[closed](hello*)\n"),
        "<p>*<a href=\"hello*\">closed</a></p>\n"
    );
}

#[test]
fn test_links_nest() {
    assert_eq!(
        html("[[foo](bar)](baz)\n"),
        "<p><a href=\"baz\"><a href=\"bar\">foo</a></a></p>\n"
    );
}

#[test]
fn test_image_alt_text_flattens_links() {
    assert_eq!(
        html("![[link](url)](img)\n"),
        "<p><img alt=\"link\" src=\"img\"></p>\n"
    );
}

#[test]
fn test_unclosed_destination_is_literal() {
    assert_eq!(html("[a](b\n"), "<p>[a](b</p>\n");
}

// ============================================================================
// Block Structure Tests
// ============================================================================

#[test]
fn test_document_span_covers_input() {
    let input = "# Title\n\nBody text.\n";
    let doc = parse(input);
    assert_eq!(doc.span.start, 0);
    assert_eq!(doc.span.end as usize, input.len());
}

#[test]
fn test_headings_open_sections() {
    let doc = parse("# One\n\npara\n\n## Two\n");
    assert_eq!(doc.blocks.len(), 1);
    let section = &doc.blocks[0];
    assert_eq!(section.tag(), BlockTag::Section);
    assert_eq!(section.attrs.id.as_deref(), Some("One"));
    let children = section.children().unwrap();
    assert_eq!(children.len(), 3);
    assert_eq!(children[2].tag(), BlockTag::Section);
}

#[test]
fn test_list_styles() {
    let doc = parse("(i) one\n(ii) two\n");
    let BlockKind::List { style, start, .. } = &doc.blocks[0].kind else {
        panic!("expected list");
    };
    assert_eq!(style.to_string(), "(i)");
    assert_eq!(*start, 1);
    assert!(matches!(style, ListStyle::Ordered(..)));
}

#[test]
fn test_code_block_content_is_not_parsed() {
    let doc = parse("```\n*not strong*\n```\n");
    assert_eq!(
        doc.blocks[0].kind,
        BlockKind::CodeBlock {
            lang: None,
            text: "*not strong*\n".to_string()
        }
    );
}

#[test]
fn test_unclosed_fence_runs_to_end() {
    assert_eq!(
        html("```\ncode\n"),
        "<pre><code>code\n</code></pre>\n"
    );
}

#[test]
fn test_footnotes_removed_from_tree() {
    let doc = parse("a[^n]\n\n[^n]: note\n");
    assert_eq!(doc.blocks.len(), 1);
    assert_eq!(doc.footnotes.len(), 1);
    assert_eq!(doc.footnote("n").map(|f| f.number), Some(1));
}

// ============================================================================
// Serializer Tests
// ============================================================================

#[test]
fn test_ast_json_is_deterministic() {
    let input = "# H\n\n- a\n- b\n\n[x](y){.z}\n";
    let a = to_ast_json(&parse(input), false).unwrap();
    let b = to_ast_json(&parse(input), false).unwrap();
    assert_eq!(a, b);
    assert!(a.contains(r#""tag":"section""#));
    assert!(!a.contains(r#""span""#));
}

#[test]
fn test_sourcepos_option() {
    let options = ParseOptions::new().with_sourcepos(true);
    let doc = parse_with("hi\n", &options);
    assert_eq!(
        to_ast_pretty(&doc, options.sourcepos()),
        "doc (0-3)\n  paragraph (0-2)\n    text \"hi\" (0-2)\n"
    );
}

#[test]
fn test_matches_listing() {
    assert_eq!(
        to_matches_pretty(&parse("_x_\n")),
        "doc 0-4\nparagraph 0-3\nemphasis 0-3\ntext 1-2\n"
    );
}
