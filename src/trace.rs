//! Call-stack capture and rewriting for failure diagnostics.
//!
//! A [`Trace`] is captured unresolved where a [`Failure`](crate::Failure) is created (or where a
//! panic is raised, see [`panic`]). The walker hands every caught failure to a
//! [`StackRewriter`], which resolves the symbols into [`Frame`]s with paths relative to the
//! working directory. Resolution is deferred to the catch site because it is expensive and
//! only failures that reach a report need it.

use std::panic::Location;
use std::path::{Path, PathBuf};

use backtrace::{Backtrace, BacktraceSymbol};
use serde::Serialize;

use crate::errors::Failure;

pub mod panic;

/// Marker used for closures and symbols that could not be named.
pub const ANONYMOUS: &str = "<anonymous>";

/// Longest owner or function name kept in a rendered frame.
const MAX_NAME: usize = 50;

/// Symbol prefixes belonging to capture, panic and unwinding machinery.
const MACHINERY: &[&str] = &[
    "backtrace::",
    "tapsuite::trace::Trace::",
    "tapsuite::trace::panic::",
    "tapsuite::errors::Failure::",
    "std::panicking",
    "core::panicking",
    "std::panic::",
    "core::panic::",
    "std::sys::backtrace",
    "std::sys_common::backtrace",
    "rust_begin_unwind",
    "__rust",
    "<alloc::boxed::Box<F,A> as core::ops::function::Fn",
    "<core::panic::",
    "<tapsuite::errors::Failure as",
];

/// Frames from here on belong to the runner itself.
const RUNNER: &[&str] = &["tapsuite::runtime", "<tapsuite::runtime"];

// ============================================================================
// FRAME
// ============================================================================

/// A single resolved call-stack entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Type owning the function, when the symbol path names one.
    pub owner: Option<String>,
    /// Function name, or [`ANONYMOUS`].
    pub function: String,
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl Frame {
    fn from_location(location: &Location<'_>) -> Self {
        Self {
            owner: None,
            function: ANONYMOUS.to_string(),
            file: PathBuf::from(location.file()),
            line: location.line(),
            column: location.column(),
        }
    }

    /// `Owner.function` or just `function`.
    pub fn label(&self) -> String {
        let function = truncate(&self.function);
        match &self.owner {
            Some(owner) => format!("{}.{}", truncate(owner), function),
            None => function.to_string(),
        }
    }

    /// `file:line:column`.
    pub fn position(&self) -> String {
        format!("{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

fn truncate(name: &str) -> &str {
    match name.char_indices().nth(MAX_NAME) {
        Some((index, _)) => &name[..index],
        None => name,
    }
}

// ============================================================================
// TRACE
// ============================================================================

/// Call stack attached to a failure.
#[derive(Debug, Default)]
pub struct Trace {
    origin: Option<Frame>,
    raw: Option<Backtrace>,
    frames: Vec<Frame>,
}

impl Trace {
    /// Captures the current stack without resolving symbols.
    pub fn capture(origin: &Location<'_>) -> Self {
        Self {
            origin: Some(Frame::from_location(origin)),
            raw: Some(Backtrace::new_unresolved()),
            frames: Vec::new(),
        }
    }

    pub(crate) fn from_parts(origin: Option<Frame>, raw: Backtrace) -> Self {
        Self {
            origin,
            raw: Some(raw),
            frames: Vec::new(),
        }
    }

    /// Resolved frames, or the origin alone when nothing was resolved.
    pub fn frames(&self) -> &[Frame] {
        if self.frames.is_empty() {
            return self.origin.as_slice();
        }
        &self.frames
    }

    pub fn is_rewritten(&self) -> bool {
        self.raw.is_none()
    }

    /// Resolves the raw stack relative to `cwd`. Runs at most once.
    fn rewrite(&mut self, cwd: &Path) {
        if let Some(origin) = &mut self.origin {
            origin.file = relative_to(&origin.file, cwd);
        }
        let Some(mut raw) = self.raw.take() else {
            return;
        };
        raw.resolve();

        let symbols: Vec<&BacktraceSymbol> = raw
            .frames()
            .iter()
            .flat_map(|frame| frame.symbols())
            .collect();
        let start = symbols
            .iter()
            .position(|symbol| !is_machinery(symbol))
            .unwrap_or(symbols.len());

        self.frames = symbols[start..]
            .iter()
            .take_while(|symbol| !is_runner(symbol))
            .filter_map(|symbol| frame_from_symbol(symbol, cwd))
            .collect();
    }

    /// Renders the stack the way the runner prints it after a bail-out.
    pub fn render(&self, message: &str) -> String {
        let frames = self.frames();
        let width = frames
            .iter()
            .map(|frame| frame.label().chars().count())
            .max()
            .unwrap_or(0);

        let mut out = format!("{}\n\n", message);
        for frame in frames {
            out.push_str(&format!(
                "  at {:<width$}  {} ({}:{})\n",
                frame.label(),
                frame.file.display(),
                frame.line,
                frame.column,
                width = width
            ));
        }
        out
    }
}

fn symbol_name(symbol: &BacktraceSymbol) -> Option<String> {
    symbol.name().map(|name| format!("{:#}", name))
}

fn is_machinery(symbol: &BacktraceSymbol) -> bool {
    match symbol_name(symbol) {
        Some(name) => MACHINERY.iter().any(|prefix| name.starts_with(prefix)),
        None => true,
    }
}

fn is_runner(symbol: &BacktraceSymbol) -> bool {
    symbol_name(symbol)
        .map(|name| RUNNER.iter().any(|prefix| name.starts_with(prefix)))
        .unwrap_or(false)
}

fn frame_from_symbol(symbol: &BacktraceSymbol, cwd: &Path) -> Option<Frame> {
    let file = symbol.filename()?;
    let (owner, function) = match symbol_name(symbol) {
        Some(name) => split_symbol(&name),
        None => (None, ANONYMOUS.to_string()),
    };
    Some(Frame {
        owner,
        function,
        file: relative_to(file, cwd),
        line: symbol.lineno().unwrap_or(0),
        column: symbol.colno().unwrap_or(0),
    })
}

/// Splits `a::b::Type::method` into `(Some("Type"), "method")`.
///
/// Closure segments collapse into [`ANONYMOUS`]; the owner is the nearest preceding segment
/// that names a type.
pub fn split_symbol(name: &str) -> (Option<String>, String) {
    let mut segments = split_path(name);
    let mut anonymous = false;
    while segments
        .last()
        .is_some_and(|segment| segment.starts_with("{{") && segment.ends_with("}}"))
    {
        segments.pop();
        anonymous = true;
    }

    let Some(last) = segments.pop() else {
        return (None, ANONYMOUS.to_string());
    };
    let owner = segments.last().and_then(|segment| type_name(segment));
    if anonymous {
        return (owner.or_else(|| type_name(last)), ANONYMOUS.to_string());
    }
    (owner, last.to_string())
}

/// Splits on `::` outside of `<...>`.
fn split_path(name: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let bytes = name.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(index + 1) == Some(&b':') => {
                segments.push(&name[start..index]);
                index += 2;
                start = index;
                continue;
            }
            _ => {}
        }
        index += 1;
    }
    segments.push(&name[start..]);
    segments
}

/// The type named by a path segment, if it names one.
fn type_name(segment: &str) -> Option<String> {
    if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        let ty = inner.split(" as ").next().unwrap_or(inner);
        let ty = split_path(ty).pop().unwrap_or(ty);
        return Some(strip_generics(ty).to_string());
    }
    let ty = strip_generics(segment);
    ty.chars()
        .next()
        .filter(|first| first.is_uppercase())
        .map(|_| ty.to_string())
}

fn strip_generics(segment: &str) -> &str {
    segment.split('<').next().unwrap_or(segment)
}

/// `path` relative to `cwd` when it lives below it, unchanged otherwise.
pub fn relative_to(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_relative() {
        return path.to_path_buf();
    }
    path.strip_prefix(cwd)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

// ============================================================================
// REWRITER
// ============================================================================

/// Attaches resolved, cwd-relative frames to caught failures.
#[derive(Debug, Clone)]
pub struct StackRewriter {
    cwd: PathBuf,
}

impl StackRewriter {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Thrown non-error values carry no stack and are left untouched.
    pub fn rewrite(&self, failure: &mut Failure) {
        if let Some(trace) = failure.trace_mut() {
            trace.rewrite(&self.cwd);
        }
    }
}
