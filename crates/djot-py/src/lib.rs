//! Python bindings for the djot parser.
//!
//! Documents live in one process-wide session table. `open` parses a source
//! string and returns an integer handle; every other call takes that handle.

use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use djot_core::{
    dump::{self, Match as CoreMatch},
    span::Span as CoreSpan,
    Error as CoreError, Format, Handle, ParseOptions, Session, Sessions,
};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

static SESSIONS: LazyLock<Mutex<Sessions>> = LazyLock::new(|| Mutex::new(Sessions::new()));

fn sessions() -> MutexGuard<'static, Sessions> {
    SESSIONS.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_py_err(e: CoreError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

// ============================================================================
// Span
// ============================================================================

/// Source location in the input text (byte offsets).
#[pyclass(frozen, get_all, name = "Span")]
#[derive(Clone)]
pub struct PySpan {
    pub start: u32,
    pub end: u32,
}

#[pymethods]
impl PySpan {
    fn __repr__(&self) -> String {
        format!("Span({}, {})", self.start, self.end)
    }

    #[getter]
    fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

impl From<CoreSpan> for PySpan {
    fn from(s: CoreSpan) -> Self {
        PySpan {
            start: s.start,
            end: s.end,
        }
    }
}

// ============================================================================
// Match
// ============================================================================

/// A node kind and the source range it covers.
#[pyclass(frozen, get_all, name = "Match")]
#[derive(Clone)]
pub struct PyMatch {
    pub kind: String,
    pub span: PySpan,
}

#[pymethods]
impl PyMatch {
    fn __repr__(&self) -> String {
        format!("Match({:?}, {}, {})", self.kind, self.span.start, self.span.end)
    }
}

impl From<CoreMatch> for PyMatch {
    fn from(m: CoreMatch) -> Self {
        PyMatch {
            kind: m.kind.to_string(),
            span: CoreSpan::new(m.start, m.end).into(),
        }
    }
}

// ============================================================================
// Session functions
// ============================================================================

/// Parse a djot string and open a session for it.
///
/// Args:
///     source: Document string to parse
///     sourcepos: Include source positions in AST output (default: False)
///
/// Returns:
///     int: Handle for the new session
#[pyfunction]
#[pyo3(signature = (source, sourcepos=false), text_signature = "(source, sourcepos=False)")]
fn open(py: Python<'_>, source: &str, sourcepos: bool) -> u64 {
    let options = ParseOptions::new().with_sourcepos(sourcepos);
    // Parse without the GIL or the table lock; only the insert is serialized.
    let session = py.allow_threads(|| Session::parse(source, options));
    sessions().insert(session).0
}

/// Close a session. Raises ValueError if the handle is not open.
#[pyfunction]
#[pyo3(text_signature = "(handle)")]
fn close(handle: u64) -> PyResult<()> {
    sessions().close(Handle(handle)).map_err(to_py_err)
}

/// Last error recorded for a session, or an empty string.
#[pyfunction]
#[pyo3(text_signature = "(handle)")]
fn report_error(handle: u64) -> String {
    sessions().report_error(Handle(handle))
}

/// Compact AST JSON. Raises ValueError on error.
#[pyfunction]
#[pyo3(text_signature = "(handle)")]
fn to_ast_json(handle: u64) -> PyResult<String> {
    sessions().to_ast_json(Handle(handle)).map_err(to_py_err)
}

/// Indented AST listing. Raises ValueError on error.
#[pyfunction]
#[pyo3(text_signature = "(handle)")]
fn to_ast_pretty(handle: u64) -> PyResult<String> {
    sessions().to_ast_pretty(Handle(handle)).map_err(to_py_err)
}

/// Matches listing as JSON. Raises ValueError on error.
#[pyfunction]
#[pyo3(text_signature = "(handle)")]
fn to_matches_json(handle: u64) -> PyResult<String> {
    sessions().to_matches_json(Handle(handle)).map_err(to_py_err)
}

/// Matches listing as `kind start-end` lines. Raises ValueError on error.
#[pyfunction]
#[pyo3(text_signature = "(handle)")]
fn to_matches_pretty(handle: u64) -> PyResult<String> {
    sessions().to_matches_pretty(Handle(handle)).map_err(to_py_err)
}

/// HTML rendering. Raises ValueError on error.
#[pyfunction]
#[pyo3(text_signature = "(handle)")]
fn to_html(handle: u64) -> PyResult<String> {
    sessions().to_html(Handle(handle)).map_err(to_py_err)
}

/// Node matches of a session as `Match` objects. Raises ValueError on error.
#[pyfunction]
#[pyo3(text_signature = "(handle)")]
fn matches(handle: u64) -> PyResult<Vec<PyMatch>> {
    let table = sessions();
    let doc = table.document(Handle(handle)).map_err(to_py_err)?;
    Ok(dump::matches(doc).into_iter().map(PyMatch::from).collect())
}

// ============================================================================
// Module functions
// ============================================================================

/// Parse a djot string and render it to HTML without opening a session.
///
/// Args:
///     source: Document string
///
/// Returns:
///     str: Rendered HTML
#[pyfunction]
#[pyo3(text_signature = "(source)")]
fn parse_to_html(py: Python<'_>, source: &str) -> String {
    py.allow_threads(|| djot_core::render(&djot_core::parse(source), Format::Html))
}

// ============================================================================
// Module
// ============================================================================

/// djot - Markup parser and HTML renderer.
#[pymodule]
fn pydjot(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySpan>()?;
    m.add_class::<PyMatch>()?;
    m.add_function(wrap_pyfunction!(open, m)?)?;
    m.add_function(wrap_pyfunction!(close, m)?)?;
    m.add_function(wrap_pyfunction!(report_error, m)?)?;
    m.add_function(wrap_pyfunction!(to_ast_json, m)?)?;
    m.add_function(wrap_pyfunction!(to_ast_pretty, m)?)?;
    m.add_function(wrap_pyfunction!(to_matches_json, m)?)?;
    m.add_function(wrap_pyfunction!(to_matches_pretty, m)?)?;
    m.add_function(wrap_pyfunction!(to_html, m)?)?;
    m.add_function(wrap_pyfunction!(matches, m)?)?;
    m.add_function(wrap_pyfunction!(parse_to_html, m)?)?;
    Ok(())
}
