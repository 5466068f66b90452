//! Line-oriented read-eval-print driver.
//!
//! Input is buffered until it parses as complete forms, so a definition can be
//! typed over several lines. A hard error discards the buffered text and the
//! session carries on.

use crate::{
    context::Context,
    error::Error,
    fmt::pretty_string,
    value::EnvRef,
};

#[derive(Debug)]
pub enum ReplOutcome {
    /// The buffered input ends inside a form, or holds no form at all.
    NeedMore,
    /// Rendered value of the last complete form.
    Value(String),
    Error(Error),
}

pub struct Repl {
    env: EnvRef,
    buffer: String,
}

impl Repl {
    pub fn new(env: EnvRef) -> Self {
        Self {
            env,
            buffer: String::new(),
        }
    }

    pub fn env(&self) -> EnvRef {
        self.env
    }

    pub fn is_continuation(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn prompt(&self) -> &'static str {
        if self.is_continuation() {
            "...> "
        } else {
            "botlisp> "
        }
    }

    pub fn feed(&mut self, cx: &mut Context, line: &str) -> ReplOutcome {
        self.buffer.push_str(line);
        self.buffer.push('\n');

        let result = {
            let mut scope = cx.scope();
            match scope.read_all(&self.buffer) {
                Err(err) if err.is_incomplete() => return ReplOutcome::NeedMore,
                Err(err) => Err(err),
                Ok(forms) if forms.is_empty() => {
                    self.buffer.clear();
                    return ReplOutcome::NeedMore;
                }
                Ok(forms) => scope
                    .eval_sequence(&forms, self.env)
                    .map(|value| pretty_string(&scope, value)),
            }
        };
        self.buffer.clear();
        cx.maybe_collect();

        match result {
            Ok(text) => ReplOutcome::Value(text),
            Err(err) => ReplOutcome::Error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::LispError, gc::HeapConfig};

    fn session() -> (Context, Repl) {
        let mut cx = Context::new(HeapConfig::default());
        let env = cx.create_global_env();
        (cx, Repl::new(env))
    }

    fn value(outcome: ReplOutcome) -> String {
        match outcome {
            ReplOutcome::Value(text) => text,
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn multi_line_input_is_buffered() {
        let (mut cx, mut repl) = session();
        assert!(matches!(
            repl.feed(&mut cx, "(define (sq x)"),
            ReplOutcome::NeedMore
        ));
        assert_eq!(repl.prompt(), "...> ");
        assert_eq!(value(repl.feed(&mut cx, "  (* x x))")), "#<closure sq>");
        assert_eq!(repl.prompt(), "botlisp> ");
        assert_eq!(value(repl.feed(&mut cx, "(sq 7)")), "49");
    }

    #[test]
    fn errors_reset_the_buffer() {
        let (mut cx, mut repl) = session();
        assert!(matches!(
            repl.feed(&mut cx, "(car 5)"),
            ReplOutcome::Error(Error::Lisp(LispError::WrongType { .. }))
        ));
        assert!(matches!(
            repl.feed(&mut cx, "(1 2))"),
            ReplOutcome::Error(Error::Parse(_))
        ));
        assert!(!repl.is_continuation());
        assert_eq!(value(repl.feed(&mut cx, "(+ 1 2)")), "3");
    }

    #[test]
    fn last_form_on_a_line_is_shown() {
        let (mut cx, mut repl) = session();
        assert_eq!(value(repl.feed(&mut cx, "(define a 1) (define b 2) (+ a b)")), "3");
        assert!(matches!(repl.feed(&mut cx, "; just a comment"), ReplOutcome::NeedMore));
        assert!(!repl.is_continuation());
    }
}
