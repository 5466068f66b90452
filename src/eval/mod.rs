//! Tree-walking evaluator.
//!
//! Every function here follows the same rooting discipline: open a
//! [`RootScope`](crate::gc::RootScope) on entry, let allocations and
//! sub-evaluations root themselves in it, and leave through `escape` so the
//! result is rooted in the caller's region. On error the scope simply drops.

mod quasi;
mod special;

pub use special::Form;

use crate::{
    context::Context,
    env,
    error::{LispError, LispResult},
    value::{EnvRef, Object, Value},
};

pub fn eval(cx: &mut Context, expr: Value, env: EnvRef) -> LispResult {
    match cx.object(expr)? {
        Object::Symbol(sym) => {
            let sym = *sym;
            let value = env::lookup(cx.heap(), env, sym)?;
            // the binding could be overwritten before the caller is done
            cx.heap_mut().push_root(value);
            Ok(value)
        }
        Object::Cons(head, rest) => {
            let (head, rest) = (*head, *rest);
            if let Some(form) = cx.as_symbol(head).and_then(Form::lookup) {
                return special::eval_form(cx, form, rest, env);
            }
            eval_application(cx, head, rest, env)
        }
        _ => Ok(expr),
    }
}

fn eval_application(cx: &mut Context, head: Value, rest: Value, env: EnvRef) -> LispResult {
    let mut scope = cx.scope();
    let f = eval(&mut scope, head, env)?;
    let exprs = scope.list_to_vec("application", rest)?;
    let mut args = Vec::with_capacity(exprs.len());
    for expr in exprs {
        args.push(eval(&mut scope, expr, env)?);
    }
    let result = apply(&mut scope, f, &args)?;
    Ok(scope.escape(result))
}

/// Evaluates `exprs` in order and returns the last value, or nil when empty.
pub fn eval_sequence(cx: &mut Context, exprs: &[Value], env: EnvRef) -> LispResult {
    eval_forms(cx, exprs, env, false)
}

/// Like [`eval_sequence`], optionally giving the collector a chance to run
/// between top-level forms. Intermediate results are unrooted as soon as the
/// next form starts.
pub fn eval_forms(
    cx: &mut Context,
    forms: &[Value],
    env: EnvRef,
    collect_between: bool,
) -> LispResult {
    let mut scope = cx.scope();
    let mut last = scope.nil();
    for form in forms {
        scope.reset();
        last = eval(&mut scope, *form, env)?;
        if collect_between {
            scope.maybe_collect();
        }
    }
    Ok(scope.escape(last))
}

/// Calls `f` with already evaluated arguments. The arguments must be rooted
/// by the caller.
pub fn apply(cx: &mut Context, f: Value, args: &[Value]) -> LispResult {
    match cx.object(f)? {
        Object::Primitive(prim) => {
            let prim = *prim;
            if !prim.arity.accepts(args.len()) {
                return Err(LispError::PrimitiveArity {
                    name: prim.name,
                    expected: prim.arity,
                    got: args.len(),
                }
                .into());
            }
            (prim.func)(cx, args)
        }
        Object::Closure(closure) => {
            let closure = closure.clone();
            if closure.params.len() != args.len() {
                return Err(LispError::Arity {
                    name: closure.name.map_or("lambda", |name| name.name()).to_owned(),
                    expected: closure.params.len(),
                    got: args.len(),
                }
                .into());
            }
            let mut scope = cx.scope();
            let frame = scope.heap_mut().allocate_env(Some(closure.env));
            for (param, arg) in closure.params.iter().zip(args) {
                env::define(scope.heap_mut(), frame, *param, *arg)?;
            }
            let result = eval_sequence(&mut scope, &closure.body, frame)?;
            Ok(scope.escape(result))
        }
        _ => Err(LispError::NotCallable(cx.write_value(f)?).into()),
    }
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

    fn lisp_err(src: &str) -> LispError {
        match eval_str(src) {
            Err(Error::Lisp(err)) => err,
            other => panic!("{} should fail with a lisp error, got {:?}", src, other),
        }
    }

    #[test]
    fn self_evaluating() {
        assert_eq!(ok("42"), "42");
        assert_eq!(ok("\"s\""), "\"s\"");
        assert_eq!(ok("#t"), "#t");
        assert_eq!(ok("nil"), "nil");
        assert_eq!(ok("()"), "nil");
    }

    #[test]
    fn eq_on_numbers() {
        assert_eq!(ok("(eq? 1 1)"), "#t");
        assert_eq!(ok("(eq? 1 1.0)"), "#t");
        assert_eq!(ok("(eq? \"a\" \"a\")"), "#f");
        assert_eq!(ok("(eq? 'a 'a)"), "#t");
    }

    #[test]
    fn arithmetic() {
        assert!(matches!(
            lisp_err("(+ 9223372036854775807 1)"),
            LispError::Overflow(_)
        ));
        assert_eq!(ok("(+ 1 2.0)"), "3.0");
        assert_eq!(ok("(/ 4 2)"), "2.0");
        assert_eq!(ok("(/ 2)"), "0.5");
        assert_eq!(ok("(- 5)"), "-5");
        assert_eq!(ok("(* 2 3 4)"), "24");
    }

    #[test]
    fn chained_comparison() {
        assert_eq!(ok("(< 1 2 3)"), "#t");
        assert_eq!(ok("(< 1 3 2)"), "#f");
        assert_eq!(ok("(>= 3 3 1)"), "#t");
        assert_eq!(ok("(= 2 2.0 2)"), "#t");
    }

    #[test]
    fn closures_read_through_captured_env() {
        assert_eq!(
            ok("(define x 1) (define (get-x) x) (define x 2) (get-x)"),
            "2"
        );
        assert_eq!(
            ok("(define (adder n) (lambda (m) (+ n m))) ((adder 10) 5)"),
            "15"
        );
    }

    #[test]
    fn let_is_parallel() {
        assert!(matches!(
            lisp_err("(let ((a 1) (b a)) b)"),
            LispError::UnboundSymbol(name) if name == "a"
        ));
        assert_eq!(ok("(define a 5) (let ((a 1) (b a)) (list a b))"), "(1 5)");
    }

    #[test]
    fn closure_arity() {
        let src = "(define (f a b) a)";
        for call in ["(f 1)", "(f 1 2 3)"] {
            match lisp_err(&format!("{} {}", src, call)) {
                LispError::Arity { name, expected, .. } => {
                    assert_eq!(name, "f");
                    assert_eq!(expected, 2);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(matches!(
            lisp_err("((lambda (x) x))"),
            LispError::Arity { name, got: 0, .. } if name == "lambda"
        ));
    }

    #[test]
    fn primitive_arity() {
        let err = lisp_err("(car 1 2)");
        assert_eq!(err.to_string(), "car: expected 1 arguments, got 2");
    }

    #[test]
    fn not_callable() {
        assert!(matches!(lisp_err("(1 2)"), LispError::NotCallable(text) if text == "1"));
    }

    #[test]
    fn unbound_symbol() {
        assert!(matches!(
            lisp_err("undefined-thing"),
            LispError::UnboundSymbol(name) if name == "undefined-thing"
        ));
    }

    #[test]
    fn special_forms_shadow_bindings() {
        assert_eq!(ok("(define (quote x) 99) (quote 1)"), "1");
    }

    fn collections_after_boundary(collect_between: bool) -> u64 {
        let mut cx = Context::new(HeapConfig::default());
        let env = cx.create_global_env();
        let mut scope = cx.scope();
        let forms = scope.read_all("(cons 1 2) (quote done)").unwrap();
        let before = scope.stats().collections;

        // the cons cell is the only allocation left; it crosses the threshold
        let bytes = scope.stats().bytes_allocated;
        scope.heap_mut().set_next_threshold(bytes + 1);
        let last = super::eval_forms(&mut scope, &forms, env, collect_between).unwrap();
        assert_eq!(scope.write_value(last).unwrap(), "done");
        scope.stats().collections - before
    }

    #[test]
    fn top_level_forms_are_collection_points() {
        assert_eq!(collections_after_boundary(true), 1);
        assert_eq!(collections_after_boundary(false), 0);
    }

    #[test]
    fn recursion() {
        assert_eq!(
            ok("(define (fact n) (if (< n 2) 1 (* n (fact (- n 1))))) (fact 20)"),
            "2432902008176640000"
        );
    }
}
