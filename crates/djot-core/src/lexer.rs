//! Line classifier for the block parser.
//!
//! The lexer splits input into lines using `memchr` for newline detection
//! (SIMD on supported platforms) and classifies the text that remains after
//! container prefixes have been stripped: block-start markers, fences,
//! table rows, definitions and attribute lines.

use memchr::memchr;

use crate::ast::{Delim, ListStyle, Numbering};
use crate::attr::{parse_attribute_line, Attributes};
use crate::span::Span;

/// A single line from the input with its source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// The line text (without trailing newline).
    pub text: &'a str,
    /// Byte span in the original input.
    pub span: Span,
}

/// Line-based lexer feeding the block parser.
pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            offset: 0,
        }
    }

    /// Read the next line from input.
    #[inline(always)]
    fn read_line(&mut self) -> Option<Line<'a>> {
        if self.offset >= self.bytes.len() {
            return None;
        }

        let start = self.offset;

        let end = match memchr(b'\n', &self.bytes[start..]) {
            Some(pos) => start + pos,
            None => self.bytes.len(),
        };

        // Handle CRLF: check byte before newline is CR
        let text_end = if end > start && self.bytes[end - 1] == b'\r' {
            end - 1
        } else {
            end
        };

        self.offset = if end < self.bytes.len() { end + 1 } else { end };

        Some(Line {
            // SAFETY: Input is valid UTF-8 (guaranteed by &str). We slice at byte positions
            // `start` (previous offset, always a line start) and `text_end` (at a newline/CR,
            // which are single-byte ASCII, or at input end). Both are char boundaries.
            text: unsafe { self.input.get_unchecked(start..text_end) },
            span: Span::new(start as u32, text_end as u32),
        })
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Line<'a>;

    #[inline]
    fn next(&mut self) -> Option<Line<'a>> {
        self.read_line()
    }
}

/// Check if text contains only spaces and tabs.
#[inline(always)]
pub fn is_blank(text: &str) -> bool {
    text.bytes().all(|b| b == b' ' || b == b'\t')
}

/// Measure leading indentation: `(columns, bytes)`. Tabs advance to the next
/// multiple of four columns.
pub fn indentation(text: &str) -> (usize, usize) {
    let mut cols = 0;
    let mut bytes = 0;
    for b in text.bytes() {
        match b {
            b' ' => cols += 1,
            b'\t' => cols += 4 - cols % 4,
            _ => break,
        }
        bytes += 1;
    }
    (cols, bytes)
}

/// A block-start marker recognised at the beginning of a line remainder.
#[derive(Debug, Clone, PartialEq)]
pub enum Start<'a> {
    /// `>` block quote marker; `len` bytes are consumed.
    Quote { len: usize },
    /// ATX-style heading; `len` covers the `#` run and following whitespace.
    Heading { level: u8, len: usize },
    /// Code or raw fence opener.
    Fence(Fence<'a>),
    /// Div fence (`:::` with an optional class word).
    Div { len: usize, class: Option<&'a str> },
    /// List item marker.
    ListItem(ListMarker),
    /// `[^label]:` footnote definition; `len` covers the marker and spaces.
    Footnote { label: &'a str, len: usize },
    /// `[label]:` reference definition; `len` covers the marker and spaces.
    Reference { label: &'a str, len: usize },
    /// Thematic break line.
    ThematicBreak,
    /// `| ... |` table row.
    TableRow,
    /// `{...}` line attaching attributes to the next block.
    Attributes(Attributes),
}

/// An opening code fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fence<'a> {
    /// Fence character: backtick or tilde.
    pub ch: u8,
    /// Number of fence characters.
    pub len: usize,
    /// Trimmed info text after the fence (language or `=format`).
    pub info: &'a str,
}

/// A parsed list marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMarker {
    /// Primary style interpretation.
    pub style: ListStyle,
    /// Ordinal for ordered lists.
    pub start: u64,
    /// Alternative interpretation for markers like `i.` (roman or alpha).
    pub alt: Option<(ListStyle, u64)>,
    /// Task checkbox state (`Some(checked)` for task items).
    pub checked: Option<bool>,
    /// Bytes consumed by the marker, checkbox and following whitespace.
    pub len: usize,
}

/// Classify the beginning of `text` (already stripped of indentation).
///
/// Returns `None` for blank lines and for plain paragraph text.
pub fn classify(text: &str) -> Option<Start<'_>> {
    let bytes = text.as_bytes();
    let first = *bytes.first()?;

    match first {
        b'>' if followed_by_space_or_end(bytes, 1) => {
            let len = if bytes.len() > 1 { 2 } else { 1 };
            return Some(Start::Quote { len });
        }
        b'#' => {
            if let Some(start) = heading(text) {
                return Some(start);
            }
        }
        b'`' | b'~' => {
            if let Some(fence) = fence(text) {
                return Some(Start::Fence(fence));
            }
        }
        b':' => {
            if let Some(start) = div_fence(text) {
                return Some(start);
            }
        }
        b'[' => {
            if let Some(start) = definition(text) {
                return Some(start);
            }
        }
        b'|' => {
            if is_table_row(text) {
                return Some(Start::TableRow);
            }
        }
        b'{' => {
            if let Some(attrs) = parse_attribute_line(text) {
                return Some(Start::Attributes(attrs));
            }
        }
        _ => {}
    }

    if matches!(first, b'*' | b'-') && is_thematic_break(text) {
        return Some(Start::ThematicBreak);
    }

    list_marker(text).map(Start::ListItem)
}

#[inline]
fn followed_by_space_or_end(bytes: &[u8], at: usize) -> bool {
    matches!(bytes.get(at), None | Some(b' ') | Some(b'\t'))
}

fn heading(text: &str) -> Option<Start<'_>> {
    let bytes = text.as_bytes();
    let level = bytes.iter().take_while(|&&b| b == b'#').count();
    if level == 0 || level > 6 || !followed_by_space_or_end(bytes, level) {
        return None;
    }
    let spaces = text[level..]
        .bytes()
        .take_while(|b| *b == b' ' || *b == b'\t')
        .count();
    Some(Start::Heading {
        level: level as u8,
        len: level + spaces,
    })
}

/// Recognise an opening (or closing) code fence.
pub fn fence(text: &str) -> Option<Fence<'_>> {
    let bytes = text.as_bytes();
    let ch = *bytes.first()?;
    if ch != b'`' && ch != b'~' {
        return None;
    }
    let len = bytes.iter().take_while(|&&b| b == ch).count();
    if len < 3 {
        return None;
    }
    let info = text[len..].trim();
    if ch == b'`' && info.contains('`') {
        return None;
    }
    Some(Fence { ch, len, info })
}

/// Check whether `text` closes a fence opened with `ch` repeated `len` times.
pub fn closes_fence(text: &str, ch: u8, len: usize) -> bool {
    let trimmed = text.trim();
    let run = trimmed.bytes().take_while(|&b| b == ch).count();
    run >= len && run == trimmed.len()
}

fn div_fence(text: &str) -> Option<Start<'_>> {
    let len = text.bytes().take_while(|&b| b == b':').count();
    if len < 3 {
        return None;
    }
    let rest = text[len..].trim();
    if rest.is_empty() {
        return Some(Start::Div { len, class: None });
    }
    let class = rest.split_whitespace().next()?;
    if rest.len() != class.len() {
        return None;
    }
    Some(Start::Div {
        len,
        class: Some(class),
    })
}

/// Check whether `text` is a bare colon fence of at least `len` colons.
pub fn closes_div(text: &str, len: usize) -> bool {
    let trimmed = text.trim();
    let run = trimmed.bytes().take_while(|&b| b == b':').count();
    run >= len && run == trimmed.len()
}

fn definition(text: &str) -> Option<Start<'_>> {
    let bytes = text.as_bytes();
    let close = memchr(b']', bytes)?;
    if bytes.get(close + 1) != Some(&b':') || !followed_by_space_or_end(bytes, close + 2) {
        return None;
    }
    let spaces = text[close + 2..]
        .bytes()
        .take_while(|b| *b == b' ' || *b == b'\t')
        .count();
    let len = close + 2 + spaces;
    if let Some(label) = text[1..close].strip_prefix('^') {
        if label.is_empty() {
            return None;
        }
        Some(Start::Footnote { label, len })
    } else {
        let label = &text[1..close];
        if label.is_empty() {
            return None;
        }
        Some(Start::Reference { label, len })
    }
}

/// Check for a thematic break: three or more `*` or `-`, spaces allowed.
pub fn is_thematic_break(text: &str) -> bool {
    let mut count = 0;
    for b in text.bytes() {
        match b {
            b'*' | b'-' => count += 1,
            b' ' | b'\t' => {}
            _ => return false,
        }
    }
    count >= 3
}

/// Check for a `| ... |` table row.
pub fn is_table_row(text: &str) -> bool {
    let trimmed = text.trim_end();
    trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|')
}

/// Recognise a `^ caption` line, returning the caption text offset.
pub fn caption(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.first() == Some(&b'^') && followed_by_space_or_end(bytes, 1) {
        let spaces = text[1..].bytes().take_while(|b| *b == b' ').count();
        Some(1 + spaces)
    } else {
        None
    }
}

fn list_marker(text: &str) -> Option<ListMarker> {
    let bytes = text.as_bytes();
    let first = *bytes.first()?;

    let (style, start, alt, marker_len) = match first {
        b'-' | b'*' | b'+' => (ListStyle::Bullet(first as char), 1, None, 1),
        b':' => (ListStyle::Definition, 1, None, 1),
        _ => ordered_marker(bytes)?,
    };

    if !followed_by_space_or_end(bytes, marker_len) {
        return None;
    }

    let mut len = marker_len;
    len += text[len..].bytes().take_while(|b| *b == b' ' || *b == b'\t').count();

    let mut style = style;
    let mut checked = None;
    if let ListStyle::Bullet(ch) = style {
        let rest = &bytes[len..];
        if rest.len() >= 3
            && rest[0] == b'['
            && rest[2] == b']'
            && matches!(rest[1], b' ' | b'x' | b'X')
            && followed_by_space_or_end(rest, 3)
        {
            checked = Some(rest[1] != b' ');
            style = ListStyle::Task(ch);
            len += 3;
            len += text[len..].bytes().take_while(|b| *b == b' ' || *b == b'\t').count();
        }
    }

    Some(ListMarker {
        style,
        start,
        alt,
        checked,
        len,
    })
}

type OrderedMarker = (ListStyle, u64, Option<(ListStyle, u64)>, usize);

fn ordered_marker(bytes: &[u8]) -> Option<OrderedMarker> {
    let enclosed = bytes.first() == Some(&b'(');
    let body_start = usize::from(enclosed);
    let body_len = bytes[body_start..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if body_len == 0 {
        return None;
    }
    let body = std::str::from_utf8(&bytes[body_start..body_start + body_len]).ok()?;
    let after = body_start + body_len;

    let delim = match (enclosed, bytes.get(after)) {
        (true, Some(b')')) => Delim::Enclosed,
        (false, Some(b'.')) => Delim::Period,
        (false, Some(b')')) => Delim::Paren,
        _ => return None,
    };
    let marker_len = after + 1;

    let ordered = |numbering| ListStyle::Ordered(numbering, delim);

    if body.bytes().all(|b| b.is_ascii_digit()) {
        if body.len() > 9 {
            return None;
        }
        let n: u64 = body.parse().ok()?;
        return Some((ordered(Numbering::Decimal), n, None, marker_len));
    }

    let roman = roman_value(body);
    if body.len() == 1 {
        let c = body.as_bytes()[0];
        let (alpha, value) = if c.is_ascii_lowercase() {
            (Numbering::LowerAlpha, (c - b'a' + 1) as u64)
        } else {
            (Numbering::UpperAlpha, (c - b'A' + 1) as u64)
        };
        let roman_numbering = if c.is_ascii_lowercase() {
            Numbering::LowerRoman
        } else {
            Numbering::UpperRoman
        };
        return Some(match roman {
            Some(r) if c == b'i' || c == b'I' => (
                ordered(roman_numbering),
                r,
                Some((ordered(alpha), value)),
                marker_len,
            ),
            Some(r) => (
                ordered(alpha),
                value,
                Some((ordered(roman_numbering), r)),
                marker_len,
            ),
            None => (ordered(alpha), value, None, marker_len),
        });
    }

    let numbering = if body.bytes().all(|b| b.is_ascii_lowercase()) {
        Numbering::LowerRoman
    } else if body.bytes().all(|b| b.is_ascii_uppercase()) {
        Numbering::UpperRoman
    } else {
        return None;
    };
    roman.map(|r| (ordered(numbering), r, None, marker_len))
}

fn roman_value(s: &str) -> Option<u64> {
    let digit = |c: u8| match c.to_ascii_lowercase() {
        b'i' => Some(1),
        b'v' => Some(5),
        b'x' => Some(10),
        b'l' => Some(50),
        b'c' => Some(100),
        b'd' => Some(500),
        b'm' => Some(1000),
        _ => None,
    };
    let values: Vec<i64> = s.bytes().map(digit).collect::<Option<_>>()?;
    let mut total = 0i64;
    for (i, &v) in values.iter().enumerate() {
        if values.get(i + 1).is_some_and(|&next| next > v) {
            total -= v;
        } else {
            total += v;
        }
    }
    u64::try_from(total).ok().filter(|&n| n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(input: &str) -> Vec<&str> {
        Lexer::new(input).map(|l| l.text).collect()
    }

    #[test]
    fn splits_lines_with_crlf() {
        assert_eq!(lines("a\r\nb\n\nc"), vec!["a", "b", "", "c"]);
        assert_eq!(lines("trailing\n"), vec!["trailing"]);
        assert!(lines("").is_empty());
    }

    #[test]
    fn line_spans_exclude_newlines() {
        let spans: Vec<Span> = Lexer::new("ab\r\ncd").map(|l| l.span).collect();
        assert_eq!(spans, vec![Span::new(0, 2), Span::new(4, 6)]);
    }

    #[test]
    fn indentation_counts_tabs() {
        assert_eq!(indentation("  x"), (2, 2));
        assert_eq!(indentation(" \tx"), (4, 2));
        assert_eq!(indentation("x"), (0, 0));
    }

    #[test]
    fn classifies_headings() {
        assert_eq!(classify("## Title"), Some(Start::Heading { level: 2, len: 3 }));
        assert_eq!(classify("#"), Some(Start::Heading { level: 1, len: 1 }));
        assert_eq!(classify("#nospace"), None);
        assert_eq!(classify("####### seven"), None);
    }

    #[test]
    fn classifies_fences() {
        let Some(Start::Fence(f)) = classify("````  rust ") else {
            panic!("expected fence");
        };
        assert_eq!((f.ch, f.len, f.info), (b'`', 4, "rust"));
        assert!(classify("``` a`b").is_none());
        assert!(closes_fence("`````", b'`', 4));
        assert!(!closes_fence("```", b'`', 4));
        assert!(!closes_fence("```` x", b'`', 4));
    }

    #[test]
    fn classifies_divs() {
        assert_eq!(
            classify("::: warning"),
            Some(Start::Div {
                len: 3,
                class: Some("warning")
            })
        );
        assert_eq!(classify("::::"), Some(Start::Div { len: 4, class: None }));
        assert!(closes_div(":::: ", 3));
        assert!(!closes_div("::", 3));
    }

    #[test]
    fn classifies_definitions() {
        assert_eq!(
            classify("[^note]: text"),
            Some(Start::Footnote { label: "note", len: 9 })
        );
        assert_eq!(
            classify("[foo]: /url"),
            Some(Start::Reference { label: "foo", len: 7 })
        );
        assert_eq!(classify("[foo] bar"), None);
    }

    #[test]
    fn thematic_break_beats_bullet() {
        assert_eq!(classify("* * *"), Some(Start::ThematicBreak));
        assert_eq!(classify("---"), Some(Start::ThematicBreak));
        assert!(matches!(classify("- item"), Some(Start::ListItem(_))));
    }

    #[test]
    fn bullet_and_task_markers() {
        let Some(Start::ListItem(m)) = classify("-  item") else {
            panic!("expected list item");
        };
        assert_eq!(m.style, ListStyle::Bullet('-'));
        assert_eq!(m.len, 3);

        let Some(Start::ListItem(m)) = classify("- [x] done") else {
            panic!("expected task");
        };
        assert_eq!(m.style, ListStyle::Task('-'));
        assert_eq!(m.checked, Some(true));
        assert_eq!(m.len, 6);
    }

    #[test]
    fn ordered_markers() {
        let Some(Start::ListItem(m)) = classify("3. three") else {
            panic!("expected list item");
        };
        assert_eq!(m.style, ListStyle::Ordered(Numbering::Decimal, Delim::Period));
        assert_eq!(m.start, 3);

        let Some(Start::ListItem(m)) = classify("(b) bee") else {
            panic!("expected list item");
        };
        assert_eq!(m.style, ListStyle::Ordered(Numbering::LowerAlpha, Delim::Enclosed));
        assert_eq!(m.start, 2);

        let Some(Start::ListItem(m)) = classify("iv) four") else {
            panic!("expected list item");
        };
        assert_eq!(m.style, ListStyle::Ordered(Numbering::LowerRoman, Delim::Paren));
        assert_eq!(m.start, 4);
    }

    #[test]
    fn ambiguous_roman_letters_carry_alternatives() {
        let Some(Start::ListItem(m)) = classify("i. one") else {
            panic!("expected list item");
        };
        assert_eq!(m.style, ListStyle::Ordered(Numbering::LowerRoman, Delim::Period));
        assert_eq!(
            m.alt,
            Some((ListStyle::Ordered(Numbering::LowerAlpha, Delim::Period), 9))
        );

        let Some(Start::ListItem(m)) = classify("v. vee") else {
            panic!("expected list item");
        };
        assert_eq!(m.style, ListStyle::Ordered(Numbering::LowerAlpha, Delim::Period));
        assert_eq!(m.start, 22);
    }

    #[test]
    fn roman_values() {
        assert_eq!(roman_value("xiv"), Some(14));
        assert_eq!(roman_value("MCMXC"), Some(1990));
        assert_eq!(roman_value("ab"), None);
    }

    #[test]
    fn table_rows_and_captions() {
        assert_eq!(classify("| a | b |"), Some(Start::TableRow));
        assert!(!is_table_row("| a"));
        assert_eq!(caption("^ Caption"), Some(2));
        assert_eq!(caption("^x"), None);
    }

    #[test]
    fn attribute_lines() {
        assert!(matches!(classify("{#id .c}"), Some(Start::Attributes(_))));
        assert_eq!(classify("{not attrs"), None);
    }
}
