use std::io::{self, Write};

use crate::token::{Token, Type};

/// Any static (scan/parse/resolve) error knows how to render itself as
/// the single-line `[line N] Error<WHERE>: <MESSAGE>` form spec.md §6
/// requires. Rendering is separate from *where* the message goes and
/// which reporter flag it trips — see [`ErrorReporter`].
pub trait Error {
    fn render(&self) -> String;
}

/// An error raised while scanning. Line-attributed only; the scanner
/// has no token to point at yet.
#[derive(Debug)]
pub struct ScanError {
    pub line: usize,
    pub message: String,
}

impl Error for ScanError {
    fn render(&self) -> String {
        format!("[line {}] Error: {}", self.line, self.message)
    }
}

/// An error raised while parsing. Token-attributed so the message can
/// point at the offending lexeme, or "at end" if parsing ran off the
/// token stream.
#[derive(Debug)]
pub struct ParseError {
    pub token: Token,
    pub message: String,
}

impl Error for ParseError {
    fn render(&self) -> String {
        render_at_token(&self.token, &self.message)
    }
}

/// An error raised by the resolver's static checks.
#[derive(Debug)]
pub struct ResolveError {
    pub token: Token,
    pub message: String,
}

impl Error for ResolveError {
    fn render(&self) -> String {
        render_at_token(&self.token, &self.message)
    }
}

fn render_at_token(token: &Token, message: &str) -> String {
    if token.r#type == Type::EOF {
        format!("[line {}] Error at end: {}", token.location.line, message)
    } else {
        format!("[line {}] Error at '{}': {}", token.location.line, token.lexeme, message)
    }
}

/// A runtime error. Rendered on two lines per spec.md §6:
/// `<MESSAGE>\n[line N]`. This never implements [`Error`] — runtime
/// errors propagate through the interpreter's own `Signal` channel
/// (see `interpreter::Signal`) rather than through the reporter's
/// `report`, so they are reported exactly once, at the point they
/// unwind to the top of `interpret()`.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        RuntimeError { token, message: message.into() }
    }

    fn render(&self) -> String {
        format!("{}\n[line {}]", self.message, self.token.location.line)
    }
}

/// Explicit, per-run error state plus the sink errors are written to.
/// Replaces the reference design's `static mut hadError`/
/// `hadRuntimeError` booleans (spec.md §9) with a struct the driver
/// owns and resets between REPL lines; scanner/parser/resolver/
/// interpreter all take `&mut ErrorReporter` rather than writing to
/// stderr themselves, which is what makes them testable without
/// spawning a subprocess.
pub struct ErrorReporter {
    had_error: bool,
    had_runtime_error: bool,
    writer: Box<dyn Write>,
}

impl ErrorReporter {
    pub fn new(writer: Box<dyn Write>) -> Self {
        ErrorReporter { had_error: false, had_runtime_error: false, writer }
    }

    pub fn stderr() -> Self {
        ErrorReporter::new(Box::new(io::stderr()))
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn reset(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }

    /// Records and writes a static (scan/parse/resolve) error.
    pub fn report(&mut self, err: &dyn Error) {
        let _ = writeln!(self.writer, "{}", err.render());
        self.had_error = true;
    }

    /// Records and writes a runtime error once it has unwound to the
    /// top of `interpret()`.
    pub fn report_runtime(&mut self, err: &RuntimeError) {
        let _ = writeln!(self.writer, "{}", err.render());
        self.had_runtime_error = true;
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        ErrorReporter::stderr()
    }
}
