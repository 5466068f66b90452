//! S-expression reader.
//!
//! Produces heap values directly. Every allocation is rooted by the heap as it
//! happens, so the forms returned by [`read_all`] stay alive for as long as the
//! caller's root scope does.
//!
//! There is no dotted-pair syntax: the printer can emit `(a . b)` but the reader
//! never produces improper lists.

use crate::{
    context::Context,
    error::{LispResult, ParseError},
    symbol::{Symbol, NAMES},
    value::Value,
};

pub fn read_all(cx: &mut Context, text: &str) -> LispResult<Vec<Value>> {
    let mut reader = Reader::new(cx, text);
    let mut forms = Vec::new();
    loop {
        reader.skip_atmosphere();
        if reader.peek().is_none() {
            return Ok(forms);
        }
        forms.push(reader.read_form()?);
    }
}

/// Reads exactly one form; trailing text other than whitespace and comments
/// is an error.
pub fn read_one(cx: &mut Context, text: &str) -> LispResult {
    let mut reader = Reader::new(cx, text);
    reader.skip_atmosphere();
    if reader.peek().is_none() {
        return Err(reader.incomplete("expected a form").into());
    }
    let form = reader.read_form()?;
    reader.skip_atmosphere();
    if reader.peek().is_some() {
        return Err(reader.error("unexpected text after form").into());
    }
    Ok(form)
}

struct Reader<'a> {
    cx: &'a mut Context,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

fn delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';' | '\'' | '`' | ',')
}

impl<'a> Reader<'a> {
    fn new(cx: &'a mut Context, text: &str) -> Self {
        Self {
            cx,
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, msg: &str) -> ParseError {
        ParseError::new(msg, self.line, self.column)
    }

    fn incomplete(&self, msg: &str) -> ParseError {
        ParseError::incomplete(msg, self.line, self.column)
    }

    fn skip_atmosphere(&mut self) {
        while let Some(c) = self.peek() {
            if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn read_form(&mut self) -> LispResult {
        let Some(c) = self.peek() else {
            return Err(self.incomplete("unexpected end of input").into());
        };
        match c {
            '(' => {
                self.bump();
                self.read_list()
            }
            ')' => Err(self.error("unexpected ')'").into()),
            '\'' => {
                self.bump();
                self.read_prefixed(NAMES.quote)
            }
            '`' => {
                self.bump();
                self.read_prefixed(NAMES.quasiquote)
            }
            ',' => {
                self.bump();
                if self.peek() == Some('@') {
                    self.bump();
                    self.read_prefixed(NAMES.unquote_splicing)
                } else {
                    self.read_prefixed(NAMES.unquote)
                }
            }
            '"' => {
                self.bump();
                self.read_string()
            }
            _ => self.read_atom(),
        }
    }

    fn read_list(&mut self) -> LispResult {
        let (line, column) = (self.line, self.column);
        let mut items = Vec::new();
        loop {
            self.skip_atmosphere();
            match self.peek() {
                None => {
                    return Err(ParseError::incomplete(
                        format!("unclosed list opened at {}:{}", line, column - 1),
                        self.line,
                        self.column,
                    )
                    .into())
                }
                Some(')') => {
                    self.bump();
                    return Ok(self.cx.list(&items));
                }
                Some(_) => items.push(self.read_form()?),
            }
        }
    }

    fn read_prefixed(&mut self, head: Symbol) -> LispResult {
        self.skip_atmosphere();
        match self.peek() {
            None => Err(self
                .incomplete(&format!("expected a form after {}", head))
                .into()),
            Some(')') => Err(self.error(&format!("expected a form after {}", head)).into()),
            Some(_) => {
                let inner = self.read_form()?;
                let head = self.cx.symbol(head);
                Ok(self.cx.list(&[head, inner]))
            }
        }
    }

    fn read_string(&mut self) -> LispResult {
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(self.incomplete("unterminated string").into()),
                Some('"') => return Ok(self.cx.string(text)),
                Some('\\') => {
                    let escaped = match self.bump() {
                        None => return Err(self.incomplete("unterminated string").into()),
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some(other) => {
                            return Err(self
                                .error(&format!("unknown string escape \\{}", other))
                                .into())
                        }
                    };
                    text.push(escaped);
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn read_atom(&mut self) -> LispResult {
        let (line, column) = (self.line, self.column);
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if delimiter(c) {
                break;
            }
            token.push(c);
            self.bump();
        }

        match token.as_str() {
            "#t" | "true" => return Ok(self.cx.boolean(true)),
            "#f" | "false" => return Ok(self.cx.boolean(false)),
            "nil" => return Ok(self.cx.nil()),
            _ => (),
        }
        if token.starts_with('#') {
            return Err(ParseError::new(format!("bad syntax '{}'", token), line, column).into());
        }

        if looks_numeric(&token) {
            let digits = token.strip_prefix(['+', '-']).unwrap_or(&token);
            if digits.bytes().all(|b| b.is_ascii_digit()) {
                return match token.parse::<i64>() {
                    Ok(x) => Ok(self.cx.int(x)),
                    Err(_) => Err(ParseError::new(
                        format!("integer literal out of range: {}", token),
                        line,
                        column,
                    )
                    .into()),
                };
            }
            return match token.parse::<f64>() {
                Ok(x) if token.contains(['.', 'e', 'E']) => Ok(self.cx.float(x)),
                _ => Err(ParseError::new(
                    format!("malformed number: {}", token),
                    line,
                    column,
                )
                .into()),
            };
        }

        Ok(self.cx.intern(&token))
    }
}

/// Numbers start with a digit, optionally after a sign or a leading dot.
fn looks_numeric(token: &str) -> bool {
    let rest = token.strip_prefix(['+', '-']).unwrap_or(token);
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    rest.starts_with(|c: char| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, gc::HeapConfig, value::Object};

    fn with_cx<R>(f: impl FnOnce(&mut Context) -> R) -> R {
        let mut cx = Context::new(HeapConfig::default());
        let mut scope = cx.scope();
        f(&mut scope)
    }

    #[test]
    fn reads_atoms() {
        with_cx(|cx| {
            let forms = read_all(cx, "42 -7 1.5 -0.25 1e3 \"hi\\n\" sym + - #t #f nil true").unwrap();
            let kinds = forms
                .iter()
                .map(|v| cx.type_name(*v))
                .collect::<Vec<_>>();
            assert_eq!(
                kinds,
                vec![
                    "integer", "integer", "float", "float", "float", "string", "symbol", "symbol",
                    "symbol", "boolean", "boolean", "nil", "boolean"
                ]
            );
            assert!(matches!(cx.object(forms[1]).unwrap(), Object::Int(-7)));
            assert!(matches!(cx.object(forms[5]).unwrap(), Object::Str(s) if s == "hi\n"));
            assert_eq!(forms[11], cx.nil());
        });
    }

    #[test]
    fn symbols_are_identical() {
        with_cx(|cx| {
            let forms = read_all(cx, "foo foo").unwrap();
            assert_eq!(forms[0], forms[1]);
        });
    }

    #[test]
    fn quote_sugar() {
        with_cx(|cx| {
            let form = read_one(cx, "`(a ,b ,@c 'd)").unwrap();
            assert_eq!(
                cx.write_value(form).unwrap(),
                "(quasiquote (a (unquote b) (unquote-splicing c) (quote d)))"
            );
        });
    }

    #[test]
    fn incomplete_input_is_flagged() {
        with_cx(|cx| {
            for text in ["(define (f x)", "\"abc", "'", "(a (b c)"] {
                let err = read_all(cx, text).unwrap_err();
                assert!(err.is_incomplete(), "{} -> {}", text, err);
            }
        });
    }

    #[test]
    fn hard_errors_are_not_incomplete() {
        with_cx(|cx| {
            for text in [")", "(a))", "#x", "99999999999999999999", "\"\\q\""] {
                let err = read_all(cx, text).unwrap_err();
                assert!(matches!(err, Error::Parse(_)), "{}", text);
                assert!(!err.is_incomplete(), "{}", text);
            }
        });
    }

    #[test]
    fn malformed_numbers_are_not_reported_as_overflow() {
        with_cx(|cx| {
            for text in ["1+", "1e", "2x", "1.5.2", "-3abc"] {
                let err = read_all(cx, text).unwrap_err();
                assert!(!err.is_incomplete(), "{}", text);
                assert!(err.to_string().ends_with(&format!("malformed number: {}", text)), "{}", err);
            }
            let err = read_all(cx, "-99999999999999999999").unwrap_err();
            assert!(err.to_string().contains("integer literal out of range"), "{}", err);
            let forms = read_all(cx, "+5 .5 1e-3").unwrap();
            assert!(matches!(cx.object(forms[0]).unwrap(), Object::Int(5)));
            assert_eq!(cx.type_name(forms[1]), "float");
            assert_eq!(cx.type_name(forms[2]), "float");
        });
    }

    #[test]
    fn comments_and_positions() {
        with_cx(|cx| {
            let forms = read_all(cx, "; header\n(a ; inline\n b)\n").unwrap();
            assert_eq!(forms.len(), 1);
            let err = read_all(cx, "(a\n  b))").unwrap_err();
            match err {
                Error::Parse(p) => assert_eq!((p.line, p.column), (2, 5)),
                other => panic!("unexpected {:?}", other),
            }
        });
    }

    #[test]
    fn empty_list_is_nil() {
        with_cx(|cx| {
            let form = read_one(cx, "()").unwrap();
            assert_eq!(form, cx.nil());
        });
    }
}
