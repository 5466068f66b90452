//! Strings and console output.

use std::io::Write;

use super::defprim;
use crate::{
    context::Context,
    error::{Arity, LispError, LispResult},
    value::{EnvRef, Object, Value},
};

fn string_append(cx: &mut Context, args: &[Value]) -> LispResult {
    let mut out = String::new();
    for arg in args {
        out.push_str(cx.expect_str("string-append", *arg)?);
    }
    Ok(cx.string(out))
}

fn symbol_to_string(cx: &mut Context, args: &[Value]) -> LispResult {
    let sym = cx.expect_symbol("symbol->string", args[0])?;
    Ok(cx.string(sym.name()))
}

fn emit(text: &str) -> LispResult<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|err| {
            LispError::Io {
                path: "<stdout>".to_owned(),
                message: err.to_string(),
            }
            .into()
        })
}

/// Displays every argument separated by spaces, then a newline.
fn print(cx: &mut Context, args: &[Value]) -> LispResult {
    let mut line = args
        .iter()
        .map(|arg| cx.print_value(*arg))
        .collect::<LispResult<Vec<_>>>()?
        .join(" ");
    line.push('\n');
    emit(&line)?;
    Ok(cx.nil())
}

fn display(cx: &mut Context, args: &[Value]) -> LispResult {
    emit(&cx.print_value(args[0])?)?;
    Ok(cx.nil())
}

fn newline(cx: &mut Context, _: &[Value]) -> LispResult {
    emit("\n")?;
    Ok(cx.nil())
}

/// Raises a user error. A leading string is used verbatim; the remaining
/// irritants are appended in written form.
fn error(cx: &mut Context, args: &[Value]) -> LispResult {
    let mut parts = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        match cx.object(*arg)? {
            Object::Str(s) if i == 0 => parts.push(s.clone()),
            _ => parts.push(cx.write_value(*arg)?),
        }
    }
    Err(LispError::User(parts.join(" ")).into())
}

pub(super) fn init(cx: &mut Context, env: EnvRef) {
    defprim! { cx, env;
        "string-append", Arity::AtLeast(0), string_append;
        "symbol->string", Arity::Exact(1), symbol_to_string;
        "print", Arity::AtLeast(0), print;
        "display", Arity::Exact(1), display;
        "newline", Arity::Exact(0), newline;
        "error", Arity::AtLeast(1), error;
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        builtins::testing::{eval_str, ok},
        error::{Error, LispError},
    };

    #[test]
    fn strings() {
        assert_eq!(ok("(string-append \"ab\" \"\" \"c\")"), "\"abc\"");
        assert_eq!(ok("(symbol->string 'gripper)"), "\"gripper\"");
        assert!(matches!(
            eval_str("(string-append \"a\" 1)"),
            Err(Error::Lisp(LispError::WrongType { expected: "string", .. }))
        ));
    }

    #[test]
    fn output_returns_nil() {
        assert_eq!(ok("(print \"value:\" 1 'x)"), "nil");
        assert_eq!(ok("(display \"x\")"), "nil");
        assert_eq!(ok("(newline)"), "nil");
    }

    #[test]
    fn user_errors() {
        match eval_str("(error \"arm stalled at\" 3 \"deg\")") {
            Err(Error::Lisp(LispError::User(msg))) => {
                assert_eq!(msg, "arm stalled at 3 \"deg\"")
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
