//! Quasiquote expansion.
//!
//! Templates are walked directly rather than rewritten into `cons`/`append`
//! calls. Nesting is tracked with a depth counter: `quasiquote` increments it,
//! `unquote` and `unquote-splicing` decrement it, and only forms reached at
//! depth one are evaluated.

use super::eval;
use crate::{
    context::Context,
    error::{LispError, LispResult},
    symbol::{Symbol, NAMES},
    value::{EnvRef, Value},
};

/// If `value` is `(head x)`, returns `x`.
fn unwrap_form(cx: &Context, value: Value, head: Symbol) -> LispResult<Option<Value>> {
    let Some((car, rest)) = cx.as_cons(value) else {
        return Ok(None);
    };
    if cx.as_symbol(car) != Some(head) {
        return Ok(None);
    }
    match cx.list_to_vec(head.name(), rest)?[..] {
        [arg] => Ok(Some(arg)),
        _ => Err(LispError::bad_form(head.name(), "expected exactly one operand").into()),
    }
}

pub(super) fn expand(cx: &mut Context, template: Value, env: EnvRef, depth: usize) -> LispResult {
    if cx.as_cons(template).is_none() {
        return Ok(template);
    }

    if let Some(arg) = unwrap_form(cx, template, NAMES.unquote)? {
        return if depth == 1 {
            eval(cx, arg, env)
        } else {
            rewrap(cx, NAMES.unquote, arg, env, depth - 1)
        };
    }
    if let Some(arg) = unwrap_form(cx, template, NAMES.quasiquote)? {
        return rewrap(cx, NAMES.quasiquote, arg, env, depth + 1);
    }
    if let Some(arg) = unwrap_form(cx, template, NAMES.unquote_splicing)? {
        if depth == 1 {
            return Err(LispError::bad_form("unquote-splicing", "not inside a list").into());
        }
        return rewrap(cx, NAMES.unquote_splicing, arg, env, depth - 1);
    }

    let mut scope = cx.scope();
    let mut items = Vec::new();
    let mut rest = template;
    while let Some((element, cdr)) = scope.as_cons(rest) {
        match unwrap_form(&scope, element, NAMES.unquote_splicing)? {
            Some(arg) if depth == 1 => {
                let spliced = eval(&mut scope, arg, env)?;
                let spliced = scope
                    .list_to_vec("unquote-splicing", spliced)
                    .map_err(|_| {
                        LispError::bad_form("unquote-splicing", "value is not a proper list")
                    })?;
                items.extend(spliced);
            }
            _ => items.push(expand(&mut scope, element, env, depth)?),
        }
        rest = cdr;
    }
    let tail = if scope.is_nil(rest) {
        rest
    } else {
        expand(&mut scope, rest, env, depth)?
    };
    let list = scope.list_with_tail(&items, tail);
    Ok(scope.escape(list))
}

/// Rebuilds `(head arg')` where `arg'` is `arg` expanded at `depth`.
fn rewrap(cx: &mut Context, head: Symbol, arg: Value, env: EnvRef, depth: usize) -> LispResult {
    let mut scope = cx.scope();
    let inner = expand(&mut scope, arg, env, depth)?;
    let head = scope.symbol(head);
    let list = scope.list(&[head, inner]);
    Ok(scope.escape(list))
}

#[cfg(test)]
mod tests {
    use crate::{
        context::Context,
        error::{Error, LispError},
        gc::HeapConfig,
    };

    fn eval_str(src: &str) -> Result<String, Error> {
        let mut cx = Context::new(HeapConfig::default());
        let env = cx.create_global_env();
        let value = cx.eval_source(src, env)?;
        cx.write_value(value)
    }

    fn ok(src: &str) -> String {
        match eval_str(src) {
            Ok(text) => text,
            Err(err) => panic!("{} failed: {}", src, err),
        }
    }

    #[test]
    fn splicing() {
        assert_eq!(ok("(define xs '(2 3)) `(1 ,@xs 4)"), "(1 2 3 4)");
        assert_eq!(ok("`(,@nil)"), "nil");
        assert_eq!(ok("`(a ,(+ 1 2) b)"), "(a 3 b)");
        assert_eq!(ok("`x"), "x");
        assert_eq!(ok("`(1 (2 ,(* 2 2)))"), "(1 (2 4))");
    }

    #[test]
    fn nested_quasiquote_keeps_inner_unquotes() {
        assert_eq!(
            ok("(define x 5) `(a `(b ,(c ,x)))"),
            "(a (quasiquote (b (unquote (c 5)))))"
        );
    }

    #[test]
    fn splice_errors() {
        assert!(matches!(
            eval_str("`,@(list 1)"),
            Err(Error::Lisp(LispError::BadForm { form: "unquote-splicing", .. }))
        ));
        assert!(matches!(
            eval_str("`(1 ,@5)"),
            Err(Error::Lisp(LispError::BadForm { form: "unquote-splicing", .. }))
        ));
    }
}
