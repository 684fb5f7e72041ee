//! Handle table backing the foreign boundary.
//!
//! A [`Sessions`] table owns parsed documents keyed by opaque [`Handle`]s.
//! Handles are issued monotonically and never reused, so a stale handle can
//! only ever report [`Error::InvalidHandle`]. Each session remembers the last
//! error raised through it; a failure in one session never affects another.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, warn};

use crate::ast::Document;
use crate::dump;
use crate::error::{Error, Result};
use crate::render::{render_with, RenderOptions};
use crate::{parse_with, ParseOptions};

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

/// One parsed source and its last error.
///
/// A session can be parsed without touching a [`Sessions`] table and
/// inserted later, so callers sharing a table only lock it for the insert.
#[derive(Debug)]
pub struct Session {
    /// `None` when parsing failed; the failure is in `last_error`.
    doc: Option<Document>,
    options: ParseOptions,
    last_error: Option<String>,
}

/// Owning table of sessions.
#[derive(Debug, Default)]
pub struct Sessions {
    sessions: HashMap<Handle, Session>,
    next: u64,
    render: RenderOptions,
}

impl Sessions {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the render options used by [`Sessions::to_html`].
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render = options;
        self
    }

    /// Parse `source` with default options and open a session for it.
    pub fn open(&mut self, source: &str) -> Handle {
        self.open_with(source, ParseOptions::default())
    }

    /// Parse `source` and open a session for it.
    ///
    /// A panic while parsing is caught and recorded as the session's error;
    /// the returned handle stays valid either way.
    pub fn open_with(&mut self, source: &str, options: ParseOptions) -> Handle {
        self.insert(Session::parse(source, options))
    }

    /// Register an already parsed session under a fresh handle.
    pub fn insert(&mut self, session: Session) -> Handle {
        self.next += 1;
        let handle = Handle(self.next);
        match &session.last_error {
            Some(err) => warn!("session {}: {}", handle.0, err),
            None => debug!("opened session {}", handle.0),
        }
        self.sessions.insert(handle, session);
        handle
    }

    /// The last error recorded for `handle`, or an empty string.
    pub fn report_error(&self, handle: Handle) -> String {
        match self.sessions.get(&handle) {
            Some(session) => session.last_error.clone().unwrap_or_default(),
            None => Error::InvalidHandle(handle.0).to_string(),
        }
    }

    /// Drop a session. Closing an unknown or closed handle is an error.
    pub fn close(&mut self, handle: Handle) -> Result<()> {
        match self.sessions.remove(&handle) {
            Some(_) => {
                debug!("closed session {}", handle.0);
                Ok(())
            }
            None => Err(Error::InvalidHandle(handle.0)),
        }
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if no sessions are open.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Borrow the parsed document of a session.
    pub fn document(&self, handle: Handle) -> Result<&Document> {
        let session = self
            .sessions
            .get(&handle)
            .ok_or(Error::InvalidHandle(handle.0))?;
        session.doc.as_ref().ok_or_else(|| unavailable(session))
    }

    /// Compact AST JSON of the session's document.
    pub fn to_ast_json(&mut self, handle: Handle) -> Result<String> {
        self.query(handle, |doc, options, _| dump::to_ast_json(doc, options.sourcepos()))
    }

    /// Indented AST listing of the session's document.
    pub fn to_ast_pretty(&mut self, handle: Handle) -> Result<String> {
        self.query(handle, |doc, options, _| Ok(dump::to_ast_pretty(doc, options.sourcepos())))
    }

    /// Matches listing as JSON.
    pub fn to_matches_json(&mut self, handle: Handle) -> Result<String> {
        self.query(handle, |doc, _, _| dump::to_matches_json(doc))
    }

    /// Matches listing as `kind start-end` lines.
    pub fn to_matches_pretty(&mut self, handle: Handle) -> Result<String> {
        self.query(handle, |doc, _, _| Ok(dump::to_matches_pretty(doc)))
    }

    /// HTML rendering of the session's document.
    pub fn to_html(&mut self, handle: Handle) -> Result<String> {
        self.query(handle, |doc, _, render| Ok(render_with(doc, render)))
    }

    /// Run a query against a session, recording any failure as its last error.
    fn query<F>(&mut self, handle: Handle, f: F) -> Result<String>
    where
        F: FnOnce(&Document, &ParseOptions, &RenderOptions) -> Result<String>,
    {
        let render = &self.render;
        let session = self
            .sessions
            .get_mut(&handle)
            .ok_or(Error::InvalidHandle(handle.0))?;
        let Some(doc) = &session.doc else {
            return Err(unavailable(session));
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| f(doc, &session.options, render)))
            .unwrap_or_else(|payload| Err(Error::from_panic(payload)));
        match result {
            Ok(out) => {
                session.last_error = None;
                Ok(out)
            }
            Err(err) => {
                session.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

impl Session {
    /// Parse `source`, catching any panic as the session's error.
    pub fn parse(source: &str, options: ParseOptions) -> Self {
        match panic::catch_unwind(AssertUnwindSafe(|| parse_with(source, &options))) {
            Ok(doc) => {
                debug!("parsed {} bytes for a new session", source.len());
                Session {
                    doc: Some(doc),
                    options,
                    last_error: None,
                }
            }
            Err(payload) => Session {
                doc: None,
                options,
                last_error: Some(Error::from_panic(payload).to_string()),
            },
        }
    }

    /// The error recorded while parsing, if any.
    pub fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

/// Error for a session whose parse failed.
fn unavailable(session: &Session) -> Error {
    Error::Internal(
        session
            .last_error
            .clone()
            .unwrap_or_else(|| "document unavailable".to_string()),
    )
}
