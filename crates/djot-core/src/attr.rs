//! Attribute grammar shared by block and inline parsing.
//!
//! An attribute block is a brace-delimited list of entries:
//!
//! - `.name` adds a class
//! - `#name` sets the id
//! - `key=value`, `key="quoted value"`, `key={braced value}` set pairs
//! - `%comment%` is ignored
//!
//! The grammar never fails loudly: a malformed block is reported as `None`
//! and the caller treats the braces as literal text.

use serde::Serialize;

/// An attribute set attached to a node.
///
/// Pairs keep insertion order so that rendering is stable. Re-assigning a key
/// overwrites its value in place; classes accumulate; the id is overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Attributes {
    /// Element identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Class names in the order they were first added.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    /// Remaining key/value pairs in insertion order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pairs: Vec<(String, String)>,
}

impl Attributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the set carries no id, classes or pairs.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.classes.is_empty() && self.pairs.is_empty()
    }

    /// Set (overwrite) the id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Add a class unless it is already present.
    pub fn add_class(&mut self, class: impl Into<String>) {
        let class = class.into();
        if !class.is_empty() && !self.classes.contains(&class) {
            self.classes.push(class);
        }
    }

    /// Assign a key. `id` and `class` are routed to their dedicated fields.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "id" => self.set_id(value),
            "class" => {
                for class in value.split_whitespace() {
                    self.add_class(class);
                }
            }
            _ => {
                if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = value;
                } else {
                    self.pairs.push((key, value));
                }
            }
        }
    }

    /// Look up a key/value pair.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove a key/value pair, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(idx).1)
    }

    /// Apply `other` on top of this set.
    ///
    /// Keys in `other` override same-named keys here, its classes are
    /// appended, and its id (if any) replaces ours.
    pub fn merge(&mut self, other: Attributes) {
        if let Some(id) = other.id {
            self.id = Some(id);
        }
        for class in other.classes {
            self.add_class(class);
        }
        for (key, value) in other.pairs {
            self.insert(key, value);
        }
    }
}

#[inline]
fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b':') || b >= 0x80
}

#[inline]
fn is_bare_value_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'"' | b'\'' | b'=' | b'{' | b'}' | b'<' | b'>' | b'`')
}

/// Parse an attribute block starting at `pos` (which must hold `{`).
///
/// Returns the attributes and the offset just past the closing brace, or
/// `None` when the text is not a well-formed attribute block.
pub fn parse_attributes(text: &str, pos: usize) -> Option<(Attributes, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(pos) != Some(&b'{') {
        return None;
    }

    let mut attrs = Attributes::new();
    let mut i = pos + 1;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        match *bytes.get(i)? {
            b'}' => return Some((attrs, i + 1)),
            b'.' => {
                let end = scan_while(bytes, i + 1, is_name_byte);
                if end == i + 1 {
                    return None;
                }
                attrs.add_class(&text[i + 1..end]);
                i = end;
            }
            b'#' => {
                let end = scan_while(bytes, i + 1, is_name_byte);
                if end == i + 1 {
                    return None;
                }
                attrs.set_id(&text[i + 1..end]);
                i = end;
            }
            b'%' => {
                let close = memchr::memchr(b'%', &bytes[i + 1..])?;
                i = i + 1 + close + 1;
            }
            b if is_name_byte(b) => {
                let key_end = scan_while(bytes, i, is_name_byte);
                if bytes.get(key_end) != Some(&b'=') {
                    return None;
                }
                let key = &text[i..key_end];
                let (value, end) = parse_value(text, key_end + 1)?;
                attrs.insert(key, value);
                i = end;
            }
            _ => return None,
        }

        // Entries must be separated by whitespace or end at the brace.
        match bytes.get(i) {
            Some(b) if b.is_ascii_whitespace() || *b == b'}' => {}
            Some(b'.') | Some(b'#') => {}
            _ => return None,
        }
    }
}

/// Parse a line consisting solely of an attribute block.
pub fn parse_attribute_line(line: &str) -> Option<Attributes> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    let (attrs, end) = parse_attributes(trimmed, 0)?;
    if end == trimmed.len() {
        Some(attrs)
    } else {
        None
    }
}

fn scan_while(bytes: &[u8], mut i: usize, pred: fn(u8) -> bool) -> usize {
    while i < bytes.len() && pred(bytes[i]) {
        i += 1;
    }
    i
}

fn parse_value(text: &str, pos: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    match *bytes.get(pos)? {
        b'"' => {
            let mut value = String::new();
            let mut i = pos + 1;
            let mut run = i;
            while i < bytes.len() {
                match bytes[i] {
                    b'"' => {
                        value.push_str(&text[run..i]);
                        return Some((value, i + 1));
                    }
                    b'\\' if matches!(bytes.get(i + 1), Some(b'"') | Some(b'\\')) => {
                        value.push_str(&text[run..i]);
                        run = i + 1;
                        i += 2;
                    }
                    b'\n' => {
                        value.push_str(&text[run..i]);
                        value.push(' ');
                        i += 1;
                        run = i;
                    }
                    _ => i += 1,
                }
            }
            None
        }
        b'{' => {
            let mut depth = 1usize;
            let mut i = pos + 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'{' => {
                        depth += 1;
                        if depth > 2 {
                            return None;
                        }
                    }
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            return Some((text[pos + 1..i].to_string(), i + 1));
                        }
                    }
                    _ => {}
                }
                i += 1;
            }
            None
        }
        b if is_bare_value_byte(b) => {
            let end = scan_while(bytes, pos, is_bare_value_byte);
            Some((text[pos..end].to_string(), end))
        }
        _ => None,
    }
}
