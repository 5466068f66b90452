//! Special forms. A form is recognised purely by the symbol in head position,
//! so user bindings can never shadow one.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{eval, eval_forms, eval_sequence, quasi};
use crate::{
    bt,
    context::Context,
    env,
    error::{LispError, LispResult},
    reader,
    symbol::{Symbol, NAMES},
    value::{Closure, EnvRef, Object, Value},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Form {
    Quote,
    Quasiquote,
    Unquote,
    UnquoteSplicing,
    If,
    Define,
    Lambda,
    Let,
    Cond,
    Begin,
    Load,
    Bt,
    Defbt,
    And,
    Or,
    Set,
}

static FORMS: Lazy<HashMap<Symbol, Form>> = Lazy::new(|| {
    HashMap::from([
        (NAMES.quote, Form::Quote),
        (NAMES.quasiquote, Form::Quasiquote),
        (NAMES.unquote, Form::Unquote),
        (NAMES.unquote_splicing, Form::UnquoteSplicing),
        (NAMES.if_, Form::If),
        (NAMES.define, Form::Define),
        (NAMES.lambda, Form::Lambda),
        (NAMES.let_, Form::Let),
        (NAMES.cond, Form::Cond),
        (NAMES.begin, Form::Begin),
        (NAMES.load, Form::Load),
        (NAMES.bt, Form::Bt),
        (NAMES.defbt, Form::Defbt),
        (NAMES.and, Form::And),
        (NAMES.or, Form::Or),
        (NAMES.set, Form::Set),
    ])
});

impl Form {
    pub fn lookup(name: Symbol) -> Option<Form> {
        FORMS.get(&name).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Form::Quote => "quote",
            Form::Quasiquote => "quasiquote",
            Form::Unquote => "unquote",
            Form::UnquoteSplicing => "unquote-splicing",
            Form::If => "if",
            Form::Define => "define",
            Form::Lambda => "lambda",
            Form::Let => "let",
            Form::Cond => "cond",
            Form::Begin => "begin",
            Form::Load => "load",
            Form::Bt => "bt",
            Form::Defbt => "defbt",
            Form::And => "and",
            Form::Or => "or",
            Form::Set => "set!",
        }
    }
}

fn expect_args(form: Form, args: &[Value], min: usize, max: usize) -> LispResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(LispError::bad_form(
            form.name(),
            format!("expected {} operands, got {}", expected, args.len()),
        )
        .into());
    }
    Ok(())
}

pub(super) fn eval_form(cx: &mut Context, form: Form, rest: Value, env: EnvRef) -> LispResult {
    let args = cx.list_to_vec(form.name(), rest)?;
    match form {
        Form::Quote => {
            expect_args(form, &args, 1, 1)?;
            Ok(args[0])
        }
        Form::Quasiquote => {
            expect_args(form, &args, 1, 1)?;
            quasi::expand(cx, args[0], env, 1)
        }
        Form::Unquote | Form::UnquoteSplicing => {
            Err(LispError::bad_form(form.name(), "not inside quasiquote").into())
        }
        Form::If => eval_if(cx, &args, env),
        Form::Define => eval_define(cx, &args, env),
        Form::Lambda => {
            expect_args(form, &args, 2, usize::MAX)?;
            make_closure(cx, None, args[0], &args[1..], env)
        }
        Form::Let => eval_let(cx, &args, env),
        Form::Cond => eval_cond(cx, &args, env),
        Form::Begin => eval_sequence(cx, &args, env),
        Form::Load => eval_load(cx, &args, env),
        Form::Bt => {
            expect_args(form, &args, 1, 1)?;
            bt::compile(cx, args[0])
        }
        Form::Defbt => {
            expect_args(form, &args, 2, 2)?;
            let name = cx
                .as_symbol(args[0])
                .ok_or_else(|| LispError::bad_form("defbt", "name must be a symbol"))?;
            let mut scope = cx.scope();
            let handle = bt::compile(&mut scope, args[1])?;
            env::define(scope.heap_mut(), env, name, handle)?;
            Ok(scope.escape(handle))
        }
        Form::And => eval_and(cx, &args, env),
        Form::Or => eval_or(cx, &args, env),
        Form::Set => {
            expect_args(form, &args, 2, 2)?;
            let name = cx
                .as_symbol(args[0])
                .ok_or_else(|| LispError::bad_form("set!", "target must be a symbol"))?;
            let mut scope = cx.scope();
            let value = eval(&mut scope, args[1], env)?;
            env::set(scope.heap_mut(), env, name, value)?;
            Ok(scope.escape(value))
        }
    }
}

fn eval_if(cx: &mut Context, args: &[Value], env: EnvRef) -> LispResult {
    expect_args(Form::If, args, 2, 3)?;
    let mut scope = cx.scope();
    let test = eval(&mut scope, args[0], env)?;
    let branch = if scope.is_truthy(test) {
        args[1]
    } else if let Some(alternative) = args.get(2) {
        *alternative
    } else {
        return Ok(scope.nil());
    };
    scope.reset();
    let value = eval(&mut scope, branch, env)?;
    Ok(scope.escape(value))
}

fn eval_define(cx: &mut Context, args: &[Value], env: EnvRef) -> LispResult {
    expect_args(Form::Define, args, 2, usize::MAX)?;
    let mut scope = cx.scope();

    if let Some(name) = scope.as_symbol(args[0]) {
        expect_args(Form::Define, args, 2, 2)?;
        let value = eval(&mut scope, args[1], env)?;
        if let Object::Closure(closure) = scope.heap_mut().object_mut(value)? {
            closure.name.get_or_insert(name);
        }
        env::define(scope.heap_mut(), env, name, value)?;
        return Ok(scope.escape(value));
    }

    // (define (name . params) body...)
    let Some((name, params)) = scope.as_cons(args[0]) else {
        return Err(LispError::bad_form("define", "expected a symbol or a signature").into());
    };
    let name = scope
        .as_symbol(name)
        .ok_or_else(|| LispError::bad_form("define", "procedure name must be a symbol"))?;
    let closure = make_closure(&mut scope, Some(name), params, &args[1..], env)?;
    env::define(scope.heap_mut(), env, name, closure)?;
    Ok(scope.escape(closure))
}

fn make_closure(
    cx: &mut Context,
    name: Option<Symbol>,
    params: Value,
    body: &[Value],
    env: EnvRef,
) -> LispResult {
    let params = cx
        .list_to_vec("lambda", params)?
        .into_iter()
        .map(|param| {
            cx.as_symbol(param)
                .ok_or_else(|| LispError::bad_form("lambda", "parameters must be symbols"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    for (i, param) in params.iter().enumerate() {
        if params[..i].contains(param) {
            return Err(LispError::bad_form("lambda", format!("duplicate parameter {}", param)).into());
        }
    }
    Ok(cx.heap_mut().allocate(Object::Closure(Closure {
        name,
        params: params.into(),
        body: body.into(),
        env,
    })))
}

fn eval_let(cx: &mut Context, args: &[Value], env: EnvRef) -> LispResult {
    expect_args(Form::Let, args, 2, usize::MAX)?;
    let mut scope = cx.scope();
    let bindings = scope.list_to_vec("let", args[0])?;

    let mut names = Vec::with_capacity(bindings.len());
    let mut values = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let pair = scope.list_to_vec("let", binding)?;
        let &[name, init] = pair.as_slice() else {
            return Err(LispError::bad_form("let", "each binding must be (name value)").into());
        };
        let name = scope
            .as_symbol(name)
            .ok_or_else(|| LispError::bad_form("let", "binding name must be a symbol"))?;
        names.push(name);
        // evaluated in the outer environment
        values.push(eval(&mut scope, init, env)?);
    }

    let frame = scope.heap_mut().allocate_env(Some(env));
    for (name, value) in names.into_iter().zip(values) {
        env::define(scope.heap_mut(), frame, name, value)?;
    }
    let result = eval_sequence(&mut scope, &args[1..], frame)?;
    Ok(scope.escape(result))
}

fn eval_cond(cx: &mut Context, args: &[Value], env: EnvRef) -> LispResult {
    let mut scope = cx.scope();
    for (i, clause) in args.iter().enumerate() {
        let clause = scope.list_to_vec("cond", *clause)?;
        let Some((&test, body)) = clause.split_first() else {
            return Err(LispError::bad_form("cond", "empty clause").into());
        };

        if scope.as_symbol(test) == Some(NAMES.else_) {
            if i + 1 != args.len() {
                return Err(LispError::bad_form("cond", "else must be the last clause").into());
            }
            let value = eval_sequence(&mut scope, body, env)?;
            return Ok(scope.escape(value));
        }

        scope.reset();
        let value = eval(&mut scope, test, env)?;
        if scope.is_truthy(value) {
            if body.is_empty() {
                return Ok(scope.escape(value));
            }
            let value = eval_sequence(&mut scope, body, env)?;
            return Ok(scope.escape(value));
        }
    }
    Ok(scope.nil())
}

fn eval_and(cx: &mut Context, args: &[Value], env: EnvRef) -> LispResult {
    let mut scope = cx.scope();
    let mut last = scope.boolean(true);
    for expr in args {
        scope.reset();
        last = eval(&mut scope, *expr, env)?;
        if !scope.is_truthy(last) {
            break;
        }
    }
    Ok(scope.escape(last))
}

fn eval_or(cx: &mut Context, args: &[Value], env: EnvRef) -> LispResult {
    let mut scope = cx.scope();
    let mut last = scope.nil();
    for expr in args {
        scope.reset();
        last = eval(&mut scope, *expr, env)?;
        if scope.is_truthy(last) {
            break;
        }
    }
    Ok(scope.escape(last))
}

fn eval_load(cx: &mut Context, args: &[Value], env: EnvRef) -> LispResult {
    expect_args(Form::Load, args, 1, 1)?;
    let mut scope = cx.scope();
    let path = eval(&mut scope, args[0], env)?;
    let path = scope.expect_str("load", path)?.to_owned();
    log::info!(target: "load", "loading {}", path);

    let text = std::fs::read_to_string(&path).map_err(|err| LispError::Io {
        path: path.clone(),
        message: err.to_string(),
    })?;
    let value = reader::read_all(&mut scope, &text)
        .and_then(|forms| eval_forms(&mut scope, &forms, env, false))
        .map_err(|err| err.in_file(&path))?;
    Ok(scope.escape(value))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

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

    fn bad_form(src: &str) -> &'static str {
        match eval_str(src) {
            Err(Error::Lisp(LispError::BadForm { form, .. })) => form,
            other => panic!("{} should be malformed, got {:?}", src, other),
        }
    }

    #[test]
    fn quote_and_if() {
        assert_eq!(ok("'(a b)"), "(a b)");
        assert_eq!(ok("(if nil 1 2)"), "2");
        assert_eq!(ok("(if #f 1)"), "nil");
        assert_eq!(ok("(if 0 'yes 'no)"), "yes");
        assert_eq!(bad_form("(if)"), "if");
        assert_eq!(bad_form("(quote 1 2)"), "quote");
    }

    #[test]
    fn define_forms() {
        assert_eq!(ok("(define x 3)"), "3");
        assert_eq!(ok("(define (sq x) (* x x))"), "#<closure sq>");
        assert_eq!(ok("(define f (lambda (x) x)) f"), "#<closure f>");
        assert_eq!(ok("(lambda (x) x)"), "#<lambda>");
        assert_eq!(bad_form("(define 1 2)"), "define");
        assert_eq!(bad_form("(lambda (1) 1)"), "lambda");
        assert_eq!(bad_form("(lambda (x x) x)"), "lambda");
        assert_eq!(bad_form("(lambda (x))"), "lambda");
    }

    #[test]
    fn define_is_local_to_the_frame() {
        assert_eq!(
            ok("(define x 1) (define (f) (define x 2) x) (list (f) x)"),
            "(2 1)"
        );
    }

    #[test]
    fn cond_clauses() {
        assert_eq!(ok("(cond (nil 1) ((+ 1 1)) (else 3))"), "2");
        assert_eq!(ok("(cond (#f 1) (else 2 3))"), "3");
        assert_eq!(ok("(cond (#f 1))"), "nil");
        assert_eq!(bad_form("(cond (else 1) (#t 2))"), "cond");
        assert_eq!(bad_form("(cond ())"), "cond");
    }

    #[test]
    fn begin_and_or_set() {
        assert_eq!(ok("(begin)"), "nil");
        assert_eq!(ok("(begin 1 2 3)"), "3");
        assert_eq!(ok("(and)"), "#t");
        assert_eq!(ok("(or)"), "nil");
        assert_eq!(ok("(and 1 2 3)"), "3");
        assert_eq!(ok("(and 1 #f 3)"), "#f");
        assert_eq!(ok("(or nil 2 (car 1))"), "2");
        assert_eq!(ok("(define n 1) (define (bump) (set! n (+ n 1))) (bump) (bump) n"), "3");
        assert!(matches!(
            eval_str("(set! never-defined 1)"),
            Err(Error::Lisp(LispError::UnboundSymbol(_)))
        ));
    }

    #[test]
    fn bare_unquote_is_an_error() {
        assert_eq!(bad_form("(unquote x)"), "unquote");
        assert_eq!(bad_form(",@x"), "unquote-splicing");
    }

    #[test]
    fn bt_without_host() {
        assert!(matches!(
            eval_str("(bt (sequence a b))"),
            Err(Error::Lisp(LispError::NoBehaviorTreeHost))
        ));
    }

    #[test]
    fn load_evaluates_in_callers_scope() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("botlisp-load-{}.lisp", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "(define loaded-value 7)\n(+ loaded-value 1)").unwrap();
        drop(file);

        let src = format!("(list (load \"{}\") loaded-value)", path.display());
        assert_eq!(ok(&src), "(8 7)");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "(car 1)").unwrap();
        drop(file);
        match eval_str(&format!("(load \"{}\")", path.display())) {
            Err(Error::Lisp(LispError::InFile { path: p, source })) => {
                assert_eq!(p, path.display().to_string());
                assert!(matches!(*source, LispError::WrongType { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn load_missing_file() {
        assert!(matches!(
            eval_str("(load \"/definitely/not/here.lisp\")"),
            Err(Error::Lisp(LispError::Io { .. }))
        ));
    }
}
