//! The interpreter handle.
//!
//! A [`Context`] owns one heap and everything hanging off it. Every entry point
//! takes the context explicitly; [`with_default_context`] offers a process-wide
//! instance for embeddings that only ever need one interpreter.

use std::{fmt, path::Path};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::{
    bt::BehaviorTreeHost,
    builtins,
    error::{LispError, LispResult},
    eval,
    gc::{Heap, HeapConfig, HeapStats, RootScope},
    print, reader,
    symbol::Symbol,
    value::{EnvRef, HandleKind, Number, Object, Value},
};

pub struct Context {
    heap: Heap,
    pub(crate) bt_host: Option<Box<dyn BehaviorTreeHost>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(HeapConfig::from_env())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("stats", &self.heap.stats())
            .field("bt_host", &self.bt_host.is_some())
            .finish()
    }
}

impl Context {
    pub fn new(config: HeapConfig) -> Self {
        Self {
            heap: Heap::new(config),
            bt_host: None,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Opens a root scope; everything allocated through it stays rooted until
    /// the scope is dropped.
    pub fn scope(&mut self) -> RootScope<'_> {
        RootScope::new(self)
    }

    pub fn set_behavior_tree_host(&mut self, host: Box<dyn BehaviorTreeHost>) {
        self.bt_host = Some(host);
    }

    pub fn collect(&mut self) {
        self.heap.collect();
    }

    pub fn maybe_collect(&mut self) -> bool {
        self.heap.maybe_collect()
    }

    pub fn stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// Builds a root environment with every builtin installed and registers it
    /// as a permanent GC root.
    pub fn create_global_env(&mut self) -> EnvRef {
        let depth = self.heap.root_depth();
        let env = self.heap.allocate_env(None);
        self.heap.register_root_env(env);
        builtins::install(self, env);
        self.heap.truncate_roots(depth);
        env
    }

    /// Evaluates `expr` in `env`. The result stays reachable until the next
    /// host-level call.
    pub fn eval(&mut self, expr: Value, env: EnvRef) -> LispResult {
        self.host_call(|cx| eval::eval(cx, expr, env))
    }

    pub fn eval_sequence(&mut self, exprs: &[Value], env: EnvRef) -> LispResult {
        self.host_call(|cx| eval::eval_sequence(cx, exprs, env))
    }

    /// Reads and evaluates every top-level form in `text`, giving the collector
    /// a chance to run after each one. Returns the last value, or nil for an
    /// empty buffer.
    pub fn eval_source(&mut self, text: &str, env: EnvRef) -> LispResult {
        self.host_call(|cx| {
            let mut scope = cx.scope();
            let forms = reader::read_all(&mut scope, text)?;
            let value = eval::eval_forms(&mut scope, &forms, env, true)?;
            Ok(scope.escape(value))
        })
    }

    pub fn eval_file(&mut self, path: impl AsRef<Path>, env: EnvRef) -> LispResult {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| LispError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        self.eval_source(&text, env)
            .map_err(|err| err.in_file(path.display().to_string()))
    }

    fn host_call(&mut self, f: impl FnOnce(&mut Context) -> LispResult) -> LispResult {
        let depth = self.heap.root_depth();
        let result = f(self);
        self.heap.truncate_roots(depth);
        self.heap.set_last_result(result.as_ref().ok().copied());
        result
    }

    /// Parses every top-level form in `text`. The forms stay rooted in the
    /// caller's current root scope.
    pub fn read_all(&mut self, text: &str) -> LispResult<Vec<Value>> {
        reader::read_all(self, text)
    }

    pub fn write_value(&self, value: Value) -> LispResult<String> {
        print::write_value(self, value)
    }

    pub fn print_value(&self, value: Value) -> LispResult<String> {
        print::print_value(self, value)
    }

    // constructors

    pub fn nil(&self) -> Value {
        self.heap.nil()
    }

    pub fn boolean(&self, x: bool) -> Value {
        self.heap.boolean(x)
    }

    pub fn int(&mut self, x: i64) -> Value {
        self.heap.allocate(Object::Int(x))
    }

    pub fn float(&mut self, x: f64) -> Value {
        self.heap.allocate(Object::Float(x))
    }

    pub fn number(&mut self, n: Number) -> Value {
        match n {
            Number::Int(x) => self.int(x),
            Number::Float(x) => self.float(x),
        }
    }

    pub fn string(&mut self, s: impl Into<String>) -> Value {
        self.heap.allocate(Object::Str(s.into()))
    }

    pub fn symbol(&mut self, sym: Symbol) -> Value {
        self.heap.intern(sym)
    }

    pub fn intern(&mut self, name: &str) -> Value {
        self.heap.intern(Symbol::intern(name))
    }

    pub fn cons(&mut self, car: Value, cdr: Value) -> Value {
        self.heap.allocate(Object::Cons(car, cdr))
    }

    pub fn handle(&mut self, kind: HandleKind, id: i64) -> Value {
        self.heap.allocate(Object::Handle(kind, id))
    }

    /// Builds a proper list. Each intermediate cell is rooted by the
    /// allocation itself, so `items` only need to be reachable on entry.
    pub fn list(&mut self, items: &[Value]) -> Value {
        self.list_with_tail(items, self.nil())
    }

    pub fn list_with_tail(&mut self, items: &[Value], tail: Value) -> Value {
        items
            .iter()
            .rev()
            .fold(tail, |acc, item| self.cons(*item, acc))
    }

    // accessors

    pub fn object(&self, value: Value) -> LispResult<&Object> {
        self.heap.object(value)
    }

    pub fn type_name(&self, value: Value) -> &'static str {
        self.heap
            .object(value)
            .map(Object::type_name)
            .unwrap_or("collected")
    }

    pub fn is_nil(&self, value: Value) -> bool {
        value == self.heap.nil()
    }

    /// Everything except nil and false is true.
    pub fn is_truthy(&self, value: Value) -> bool {
        value != self.heap.nil() && value != self.heap.boolean(false)
    }

    pub fn as_symbol(&self, value: Value) -> Option<Symbol> {
        match self.heap.object(value) {
            Ok(Object::Symbol(sym)) => Some(*sym),
            _ => None,
        }
    }

    pub fn as_cons(&self, value: Value) -> Option<(Value, Value)> {
        match self.heap.object(value) {
            Ok(Object::Cons(car, cdr)) => Some((*car, *cdr)),
            _ => None,
        }
    }

    pub fn as_number(&self, value: Value) -> Option<Number> {
        match self.heap.object(value) {
            Ok(Object::Int(x)) => Some(Number::Int(*x)),
            Ok(Object::Float(x)) => Some(Number::Float(*x)),
            _ => None,
        }
    }

    pub fn expect_number(&self, name: &str, value: Value) -> LispResult<Number> {
        self.as_number(value)
            .ok_or_else(|| LispError::wrong_type(name, "number", self.type_name(value)).into())
    }

    pub fn expect_int(&self, name: &str, value: Value) -> LispResult<i64> {
        match self.heap.object(value)? {
            Object::Int(x) => Ok(*x),
            other => Err(LispError::wrong_type(name, "integer", other.type_name()).into()),
        }
    }

    pub fn expect_str(&self, name: &str, value: Value) -> LispResult<&str> {
        match self.heap.object(value)? {
            Object::Str(s) => Ok(s),
            other => Err(LispError::wrong_type(name, "string", other.type_name()).into()),
        }
    }

    pub fn expect_symbol(&self, name: &str, value: Value) -> LispResult<Symbol> {
        self.as_symbol(value)
            .ok_or_else(|| LispError::wrong_type(name, "symbol", self.type_name(value)).into())
    }

    pub fn car(&self, value: Value) -> LispResult {
        self.as_cons(value)
            .map(|(car, _)| car)
            .ok_or_else(|| LispError::wrong_type("car", "cons", self.type_name(value)).into())
    }

    pub fn cdr(&self, value: Value) -> LispResult {
        self.as_cons(value)
            .map(|(_, cdr)| cdr)
            .ok_or_else(|| LispError::wrong_type("cdr", "cons", self.type_name(value)).into())
    }

    /// Collects the elements of a proper list. `form` names the construct for
    /// error messages when the list is improper.
    pub fn list_to_vec(&self, form: &'static str, mut list: Value) -> LispResult<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            match self.heap.object(list)? {
                Object::Nil => return Ok(items),
                Object::Cons(car, cdr) => {
                    items.push(*car);
                    list = *cdr;
                }
                _ => return Err(LispError::bad_form(form, "expected a proper list").into()),
            }
        }
    }

    /// Numeric-aware identity used by `eq?`.
    pub fn eq(&self, a: Value, b: Value) -> bool {
        if a == b {
            return true;
        }
        match (self.heap.object(a), self.heap.object(b)) {
            (Ok(Object::Bool(x)), Ok(Object::Bool(y))) => x == y,
            (Ok(Object::Int(x)), Ok(Object::Int(y))) => x == y,
            (Ok(Object::Float(x)), Ok(Object::Float(y))) => x == y,
            (Ok(Object::Int(x)), Ok(Object::Float(y)))
            | (Ok(Object::Float(y)), Ok(Object::Int(x))) => *x as f64 == *y,
            _ => false,
        }
    }
}

static DEFAULT_CONTEXT: Lazy<Mutex<(Context, Option<EnvRef>)>> =
    Lazy::new(|| Mutex::new((Context::default(), None)));

/// Runs `f` against the process-wide default context and its global
/// environment, creating both on first use.
pub fn with_default_context<R>(f: impl FnOnce(&mut Context, EnvRef) -> R) -> R {
    let mut guard = DEFAULT_CONTEXT.lock();
    let (cx, global) = &mut *guard;
    let env = match global {
        Some(env) => *env,
        None => {
            let env = cx.create_global_env();
            *global = Some(env);
            env
        }
    };
    f(cx, env)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> (Context, LispResult<String>) {
        let mut cx = Context::new(HeapConfig::default());
        let env = cx.create_global_env();
        let result = cx
            .eval_source(src, env)
            .and_then(|v| cx.write_value(v));
        (cx, result)
    }

    #[test]
    fn eval_source_returns_last_value() {
        let (_, result) = run("(define x 40) (+ x 2)");
        assert_eq!(result.unwrap(), "42");
    }

    #[test]
    fn empty_source_is_nil() {
        let (_, result) = run("  ; nothing here\n");
        assert_eq!(result.unwrap(), "nil");
    }

    #[test]
    fn host_result_survives_collection_until_next_call() {
        let mut cx = Context::new(HeapConfig::default());
        let env = cx.create_global_env();
        let v = cx.eval_source("(list 1 2 3)", env).unwrap();
        cx.collect();
        assert_eq!(cx.write_value(v).unwrap(), "(1 2 3)");

        cx.eval_source("nil", env).unwrap();
        cx.collect();
        assert!(!cx.heap().is_live(v));
    }

    #[test]
    fn read_all_then_eval_sequence() {
        let mut cx = Context::new(HeapConfig::default());
        let env = cx.create_global_env();
        let mut scope = cx.scope();
        let forms = scope.read_all("(define y 3) (* y y)").unwrap();
        scope.collect();
        let v = scope.eval_sequence(&forms, env).unwrap();
        assert_eq!(scope.write_value(v).unwrap(), "9");
    }

    #[test]
    fn global_env_is_a_permanent_root() {
        let mut cx = Context::new(HeapConfig::default());
        let env = cx.create_global_env();
        cx.eval_source("(define keep (list 1 2))", env).unwrap();
        cx.collect();
        let v = cx.eval_source("keep", env).unwrap();
        assert_eq!(cx.write_value(v).unwrap(), "(1 2)");
    }

    #[test]
    fn tiny_threshold_stress() {
        let mut cx = Context::new(HeapConfig {
            initial_threshold: 1,
            growth_factor: 1.0,
        });
        let env = cx.create_global_env();
        let v = cx
            .eval_source(
                "(define (build n acc) (if (= n 0) acc (build (- n 1) (cons n acc))))
                 (define xs (build 50 nil))
                 (let ((a (length xs)) (b (car xs))) (list a b `(,@xs)))",
                env,
            )
            .unwrap();
        let text = cx.write_value(v).unwrap();
        assert!(text.starts_with("(50 1 (1 2 3"));
        assert!(cx.stats().collections > 10);
    }

    #[test]
    fn default_context_is_shared() {
        with_default_context(|cx, env| {
            cx.eval_source("(define shared-answer 41)", env).unwrap();
        });
        let v = with_default_context(|cx, env| {
            let v = cx.eval_source("(+ shared-answer 1)", env).unwrap();
            cx.write_value(v).unwrap()
        });
        assert_eq!(v, "42");
    }

    #[test]
    fn eq_semantics() {
        let mut cx = Context::new(HeapConfig::default());
        let mut scope = cx.scope();
        let a = scope.int(1);
        let b = scope.int(1);
        let c = scope.float(1.0);
        let s1 = scope.string("x");
        let s2 = scope.string("x");
        assert_ne!(a, b);
        assert!(scope.eq(a, b));
        assert!(scope.eq(a, c));
        assert!(!scope.eq(s1, s2));
        assert!(scope.eq(s1, s1));
        let t = scope.boolean(true);
        assert!(!scope.eq(t, a));
    }
}
