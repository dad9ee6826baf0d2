//! A tree-walk interpreter for Lox, the small dynamically-typed scripting
//! language from Bob Nystrom's *Crafting Interpreters*. Lexical scoping,
//! first-class functions and closures; no classes.
//!
//! ## Scanning
//! Source text becomes a token stream in [`scanner`]. Lexical errors
//! (an unterminated string, a stray `@`) are recorded on an
//! [`error::ErrorReporter`] and scanning continues, so a single pass
//! over the source can surface every lexical problem it contains at
//! once rather than stopping at the first one.
//!
//! ## Parsing
//! [`parser`] is a hand-written recursive-descent parser producing the
//! [`expr::Expr`] / [`stmt::Stmt`] trees. A malformed statement is
//! reported and the parser resynchronizes at the next likely statement
//! boundary (`;`, or a keyword that starts a new statement), so later,
//! independent syntax errors are still found in the same pass.
//!
//! ## Resolving
//! [`resolver`] walks the tree once, before any of it runs, and records
//! how many enclosing scopes separate each variable reference from its
//! declaration. This is what makes a closure's reads of its captured
//! variables deterministic — resolution happens against the *lexical*
//! structure of the source, never against whatever environments happen
//! to be on the call stack when the code runs.
//!
//! ## Interpreting
//! [`interpreter`] walks the resolved tree directly; there is no
//! separate bytecode compilation step. Runtime errors (`"1" + 2`, calling
//! a number) surface through [`interpreter::Signal`] and are reported
//! exactly once, terminating the rest of the top-level program.

pub mod ast;
pub mod environment;
pub mod error;
pub mod expr;
pub mod function;
pub mod interpreter;
pub mod literal;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod stmt;
pub mod token;
pub mod value;

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use error::ErrorReporter;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// Drives a single interpreter across however many sources get fed to
/// it — one for `run_file`, one per line for `run_prompt`. Keeping one
/// `Lox` alive across an entire REPL session is what lets a variable
/// declared on one line stay visible to the next.
pub struct Lox {
    interpreter: Interpreter,
}

impl Lox {
    pub fn new(writer: Box<dyn Write>) -> Self {
        Lox { interpreter: Interpreter::new(writer) }
    }

    /// Runs a script file to completion and returns the process exit
    /// code spec'd for the CLI: 0 on success, 65 if any static (scan,
    /// parse, or resolve) error was seen, 70 on an uncaught runtime
    /// error.
    pub fn run_file(&mut self, path: &str) -> i32 {
        let source = fs::read_to_string(path).expect("script path to be readable");

        let mut reporter = ErrorReporter::stderr();
        self.run(&source, &mut reporter);

        if reporter.had_error() {
            65
        } else if reporter.had_runtime_error() {
            70
        } else {
            0
        }
    }

    /// Runs an interactive REPL with line editing and a persisted
    /// history file, reading lines with [`rustyline`] until EOF
    /// (Ctrl-D), Ctrl-C, an empty line, or the literal `exit` (spec.md
    /// §6). A static or runtime error on one line is reported but does
    /// not end the session — it behaves like a one-line `run_file`,
    /// with the reporter reset between lines so an error on line 3
    /// does not suppress output from a correct line 4.
    pub fn run_prompt(&mut self) -> i32 {
        use rustyline::error::ReadlineError;
        use rustyline::DefaultEditor;

        let mut editor = DefaultEditor::new().expect("rustyline to initialize a line editor");
        let history_path = history_path();
        if let Some(path) = &history_path {
            let _ = editor.load_history(path);
        }

        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    if line.is_empty() || line == "exit" {
                        break;
                    }
                    let _ = editor.add_history_entry(line.as_str());
                    let mut reporter = ErrorReporter::stderr();
                    self.run(&line, &mut reporter);
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Readline error: {err}");
                    break;
                }
            }
        }

        if let Some(path) = &history_path {
            let _ = editor.save_history(path);
        }

        0
    }

    /// Runs one chunk of source through scan -> parse -> resolve ->
    /// interpret, stopping early at whichever stage first reports an
    /// error so later stages never see a tree they can't trust.
    pub fn run(&mut self, source: &str, reporter: &mut ErrorReporter) {
        let tokens = Scanner::new(source).scan_tokens(reporter);
        if reporter.had_error() {
            return;
        }

        let mut parser = Parser::new(tokens);
        let statements = parser.parse(reporter);
        if reporter.had_error() {
            return;
        }

        {
            let mut resolver = Resolver::new(&mut self.interpreter, reporter);
            resolver.resolve(&statements);
        }
        if reporter.had_error() {
            return;
        }

        self.interpreter.interpret(&statements, reporter);
    }
}

/// `~/.lox_history`, best-effort: a REPL with no persistable home
/// directory (e.g. a sandboxed CI runner) just keeps history in memory
/// for the session instead of failing to start.
fn history_path() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(".lox_history"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_file_reports_exit_code_65_on_static_error() {
        let mut lox = Lox::new(Box::new(std::io::sink()));
        let mut reporter = ErrorReporter::stderr();
        lox.run("1 +;", &mut reporter);
        assert!(reporter.had_error());
    }

    #[test]
    fn run_clears_between_independent_lines() {
        let mut lox = Lox::new(Box::new(std::io::sink()));

        let mut first = ErrorReporter::stderr();
        lox.run("var x = 1 +;", &mut first);
        assert!(first.had_error());

        let mut second = ErrorReporter::stderr();
        lox.run("print 1 + 1;", &mut second);
        assert!(!second.had_error());
        assert!(!second.had_runtime_error());
    }
}
