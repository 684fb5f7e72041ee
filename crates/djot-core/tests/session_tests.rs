//! Integration tests for the handle-based session table

use djot_core::{Error, Handle, ParseOptions, RenderOptions, Sessions};
use pretty_assertions::assert_eq;

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[test]
fn test_open_returns_distinct_handles() {
    let mut sessions = Sessions::new();
    let a = sessions.open("a\n");
    let b = sessions.open("a\n");
    assert_ne!(a, b);
    assert_eq!(sessions.len(), 2);
}

#[test]
fn test_close_releases_session() {
    let mut sessions = Sessions::new();
    let h = sessions.open("text\n");
    sessions.close(h).unwrap();
    assert!(sessions.is_empty());
    assert!(matches!(sessions.to_html(h), Err(Error::InvalidHandle(n)) if n == h.0));
}

#[test]
fn test_closing_twice_fails() {
    let mut sessions = Sessions::new();
    let h = sessions.open("");
    assert!(sessions.close(h).is_ok());
    let err = sessions.close(h).unwrap_err();
    assert_eq!(err.to_string(), format!("invalid handle {}", h.0));
}

#[test]
fn test_never_issued_handle_is_invalid() {
    let mut sessions = Sessions::new();
    assert!(sessions.close(Handle(0)).is_err());
    assert!(sessions.report_error(Handle(7)).starts_with("invalid handle"));
    assert!(sessions.document(Handle(7)).is_err());
}

// ============================================================================
// Query Tests
// ============================================================================

#[test]
fn test_all_queries_succeed_on_open_handle() {
    let mut sessions = Sessions::new();
    let h = sessions.open("# Title\n\nSome _text_.\n");
    assert_eq!(
        sessions.to_html(h).unwrap(),
        "<section id=\"Title\">\n<h1>Title</h1>\n<p>Some <em>text</em>.</p>\n</section>\n"
    );
    assert!(sessions.to_ast_json(h).unwrap().starts_with('{'));
    assert!(sessions.to_ast_pretty(h).unwrap().starts_with("doc\n"));
    assert!(sessions.to_matches_json(h).unwrap().starts_with('['));
    assert!(sessions.to_matches_pretty(h).unwrap().starts_with("doc 0-"));
    assert_eq!(sessions.report_error(h), "");
}

#[test]
fn test_queries_are_repeatable() {
    let mut sessions = Sessions::new();
    let h = sessions.open("- a\n- b\n");
    let first = sessions.to_html(h).unwrap();
    assert_eq!(sessions.to_html(h).unwrap(), first);
    assert_eq!(first, "<ul>\n<li>\na\n</li>\n<li>\nb\n</li>\n</ul>\n");
}

#[test]
fn test_sourcepos_follows_session_options() {
    let mut sessions = Sessions::new();
    let plain = sessions.open("x\n");
    let spans = sessions.open_with("x\n", ParseOptions::new().with_sourcepos(true));
    assert!(!sessions.to_ast_pretty(plain).unwrap().contains("(0-"));
    assert!(sessions.to_ast_pretty(spans).unwrap().contains("(0-2)"));
    assert!(sessions.to_ast_json(spans).unwrap().contains("\"span\""));
}

#[test]
fn test_render_options_are_shared() {
    let mut sessions = Sessions::new().with_render_options(RenderOptions::new());
    let h = sessions.open("`code`\n");
    assert_eq!(sessions.to_html(h).unwrap(), "<p><code>code</code></p>\n");
}

// ============================================================================
// Independence Tests
// ============================================================================

#[test]
fn test_handles_are_independent() {
    let mut sessions = Sessions::new();
    let a = sessions.open("one\n");
    let b = sessions.open("two\n");
    sessions.close(a).unwrap();
    assert_eq!(sessions.to_html(b).unwrap(), "<p>two</p>\n");
    assert_eq!(sessions.report_error(b), "");
    assert!(sessions.report_error(a).starts_with("invalid handle"));
}

#[test]
fn test_document_borrow_matches_parse() {
    let mut sessions = Sessions::new();
    let source = "> quote\n";
    let h = sessions.open(source);
    assert_eq!(sessions.document(h).unwrap(), &djot_core::parse(source));
}
