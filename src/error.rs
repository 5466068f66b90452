//! Error handling.
//!
//! Every failure surfaced to the host is one of three kinds: a parse error from
//! the reader, a lisp error raised while running a script, or an eval error which
//! signals a broken invariant in the embedding rather than in the script.

use std::fmt;

use crate::value::Value;

pub type LispResult<T = Value> = Result<T, Error>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Lisp(#[from] LispError),
    #[error("internal evaluator error: {0}")]
    Eval(String),
}

impl Error {
    pub fn eval(msg: impl Into<String>) -> Self {
        Self::Eval(msg.into())
    }

    /// `true` when the reader stopped because the input ended in the middle
    /// of a form and more text could complete it.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::Parse(ParseError { incomplete: true, .. }))
    }

    /// Rewraps an error raised while loading `path`.
    pub fn in_file(self, path: impl Into<String>) -> Self {
        let path = path.into();
        match self {
            Error::Parse(mut err) => {
                err.message = format!("{}: {}", path, err.message);
                err.incomplete = false;
                Error::Parse(err)
            }
            Error::Lisp(err) => Error::Lisp(LispError::InFile {
                path,
                source: Box::new(err),
            }),
            Error::Eval(msg) => Error::Eval(format!("{}: {}", path, msg)),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub incomplete: bool,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            incomplete: false,
        }
    }

    pub fn incomplete(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            incomplete: true,
        }
    }
}

/// Number of arguments a primitive accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::Range(lo, hi) => n >= lo && n <= hi,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
            Arity::Range(lo, hi) => write!(f, "{} to {}", lo, hi),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LispError {
    #[error("unbound symbol: {0}")]
    UnboundSymbol(String),
    #[error("arity mismatch: {name} takes {expected} arguments, got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("{name}: expected {expected} arguments, got {got}")]
    PrimitiveArity {
        name: &'static str,
        expected: Arity,
        got: usize,
    },
    #[error("{name}: expected {expected}, got {got}")]
    WrongType {
        name: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("integer overflow in {0}")]
    Overflow(&'static str),
    #[error("{0}: division by zero")]
    DivisionByZero(&'static str),
    #[error("{name}: index {index} out of range for length {len}")]
    OutOfRange {
        name: &'static str,
        index: i64,
        len: usize,
    },
    #[error("malformed {form}: {message}")]
    BadForm { form: &'static str, message: String },
    #[error("not a procedure: {0}")]
    NotCallable(String),
    #[error("{0}")]
    User(String),
    #[error("no behavior-tree host installed")]
    NoBehaviorTreeHost,
    #[error("{path}: {message}")]
    Io { path: String, message: String },
    #[error("{path}: {source}")]
    InFile {
        path: String,
        #[source]
        source: Box<LispError>,
    },
}

impl LispError {
    pub fn bad_form(form: &'static str, message: impl Into<String>) -> Self {
        Self::BadForm {
            form,
            message: message.into(),
        }
    }

    pub fn wrong_type(name: impl Into<String>, expected: &'static str, got: &'static str) -> Self {
        Self::WrongType {
            name: name.into(),
            expected,
            got,
        }
    }
}
