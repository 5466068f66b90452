//! Arrays, maps, priority queues, random number generators and opaque host
//! handles.

use std::{
    mem::size_of,
    time::{SystemTime, UNIX_EPOCH},
};

use indexmap::IndexMap;

use super::defprim;
use crate::{
    context::Context,
    error::{Arity, LispError, LispResult},
    value::{EnvRef, MapKey, Object, PriorityQueue, QueueEntry, Rng, Value},
};

fn index(name: &'static str, index: i64, len: usize) -> LispResult<usize> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| LispError::OutOfRange { name, index, len }.into())
}

macro_rules! with_object {
    ($cx: expr, $name: literal, $value: expr, $variant: ident($x: ident) => $body: expr, $expected: literal) => {
        match $cx.heap_mut().object_mut($value)? {
            Object::$variant($x) => $body,
            other => {
                return Err(LispError::wrong_type($name, $expected, other.type_name()).into())
            }
        }
    };
}

// arrays

fn array(cx: &mut Context, args: &[Value]) -> LispResult {
    Ok(cx.heap_mut().allocate(Object::Array(args.to_vec())))
}

fn array_ref(cx: &mut Context, args: &[Value]) -> LispResult {
    let i = cx.expect_int("array-ref", args[1])?;
    Ok(with_object!(cx, "array-ref", args[0], Array(items) => {
        items[index("array-ref", i, items.len())?]
    }, "array"))
}

fn array_set(cx: &mut Context, args: &[Value]) -> LispResult {
    let i = cx.expect_int("array-set!", args[1])?;
    with_object!(cx, "array-set!", args[0], Array(items) => {
        let i = index("array-set!", i, items.len())?;
        items[i] = args[2];
    }, "array");
    Ok(args[2])
}

fn array_push(cx: &mut Context, args: &[Value]) -> LispResult {
    with_object!(cx, "array-push!", args[0], Array(items) => items.push(args[1]), "array");
    cx.heap_mut().note_growth(size_of::<Value>());
    Ok(args[0])
}

fn array_length(cx: &mut Context, args: &[Value]) -> LispResult {
    let len = with_object!(cx, "array-length", args[0], Array(items) => items.len(), "array");
    Ok(cx.int(len as i64))
}

// maps

fn map_key(cx: &Context, name: &'static str, key: Value) -> LispResult<MapKey> {
    match cx.object(key)? {
        Object::Int(x) => Ok(MapKey::Int(*x)),
        Object::Str(s) => Ok(MapKey::Str(s.clone())),
        Object::Symbol(sym) => Ok(MapKey::Symbol(*sym)),
        Object::Bool(b) => Ok(MapKey::Bool(*b)),
        other => Err(LispError::wrong_type(name, "map key", other.type_name()).into()),
    }
}

fn make_map(cx: &mut Context, _: &[Value]) -> LispResult {
    Ok(cx.heap_mut().allocate(Object::Map(IndexMap::new())))
}

fn map_set(cx: &mut Context, args: &[Value]) -> LispResult {
    let key = map_key(cx, "map-set!", args[1])?;
    let fresh = with_object!(cx, "map-set!", args[0], Map(map) => {
        map.insert(key, (args[1], args[2])).is_none()
    }, "map");
    if fresh {
        cx.heap_mut()
            .note_growth(size_of::<(MapKey, (Value, Value))>());
    }
    Ok(args[0])
}

/// `(map-ref map key [default])`; missing keys yield the default or nil.
fn map_ref(cx: &mut Context, args: &[Value]) -> LispResult {
    let key = map_key(cx, "map-ref", args[1])?;
    let found = with_object!(cx, "map-ref", args[0], Map(map) => {
        map.get(&key).map(|(_, value)| *value)
    }, "map");
    Ok(found.unwrap_or_else(|| args.get(2).copied().unwrap_or_else(|| cx.nil())))
}

fn map_has(cx: &mut Context, args: &[Value]) -> LispResult {
    let key = map_key(cx, "map-has?", args[1])?;
    let found = with_object!(cx, "map-has?", args[0], Map(map) => map.contains_key(&key), "map");
    Ok(cx.boolean(found))
}

/// Keys in insertion order.
fn map_keys(cx: &mut Context, args: &[Value]) -> LispResult {
    let keys = with_object!(cx, "map-keys", args[0], Map(map) => {
        map.values().map(|(key, _)| *key).collect::<Vec<_>>()
    }, "map");
    Ok(cx.list(&keys))
}

fn map_count(cx: &mut Context, args: &[Value]) -> LispResult {
    let len = with_object!(cx, "map-count", args[0], Map(map) => map.len(), "map");
    Ok(cx.int(len as i64))
}

// priority queues

fn make_pqueue(cx: &mut Context, _: &[Value]) -> LispResult {
    Ok(cx
        .heap_mut()
        .allocate(Object::Queue(PriorityQueue::default())))
}

/// `(pq-push! queue priority value)`; lower priorities pop first.
fn pq_push(cx: &mut Context, args: &[Value]) -> LispResult {
    let priority = cx.expect_number("pq-push!", args[1])?.as_f64();
    with_object!(cx, "pq-push!", args[0], Queue(queue) => queue.push(priority, args[2]), "priority-queue");
    cx.heap_mut().note_growth(size_of::<QueueEntry>());
    Ok(args[0])
}

fn pq_pop(cx: &mut Context, args: &[Value]) -> LispResult {
    let popped = with_object!(cx, "pq-pop!", args[0], Queue(queue) => {
        queue.entries.pop().map(|entry| entry.value)
    }, "priority-queue");
    // the popped value is no longer reachable through the queue
    Ok(match popped {
        Some(value) => {
            cx.heap_mut().push_root(value);
            value
        }
        None => cx.nil(),
    })
}

fn pq_peek(cx: &mut Context, args: &[Value]) -> LispResult {
    let top = with_object!(cx, "pq-peek", args[0], Queue(queue) => {
        queue.entries.peek().map(|entry| entry.value)
    }, "priority-queue");
    Ok(top.unwrap_or_else(|| cx.nil()))
}

fn pq_count(cx: &mut Context, args: &[Value]) -> LispResult {
    let len = with_object!(cx, "pq-count", args[0], Queue(queue) => queue.entries.len(), "priority-queue");
    Ok(cx.int(len as i64))
}

// random numbers

/// `(make-rng [seed])`; without a seed the generator is seeded from the clock.
fn make_rng(cx: &mut Context, args: &[Value]) -> LispResult {
    let seed = match args.first() {
        Some(seed) => cx.expect_int("make-rng", *seed)? as u64,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default(),
    };
    Ok(cx.heap_mut().allocate(Object::Rng(Rng::new(seed))))
}

fn rng_float(cx: &mut Context, args: &[Value]) -> LispResult {
    let x = with_object!(cx, "rng-float", args[0], Rng(rng) => rng.next_f64(), "rng");
    Ok(cx.float(x))
}

/// `(rng-int rng lo hi)` draws uniformly from `[lo, hi)`.
fn rng_int(cx: &mut Context, args: &[Value]) -> LispResult {
    let lo = cx.expect_int("rng-int", args[1])?;
    let hi = cx.expect_int("rng-int", args[2])?;
    if hi <= lo {
        return Err(LispError::User(format!("rng-int: empty range [{}, {})", lo, hi)).into());
    }
    let span = hi.abs_diff(lo);
    let x = with_object!(cx, "rng-int", args[0], Rng(rng) => rng.next_u64() % span, "rng");
    Ok(cx.int(lo.wrapping_add(x as i64)))
}

// handles

fn handle_p(cx: &mut Context, args: &[Value]) -> LispResult {
    let hit = matches!(cx.object(args[0])?, Object::Handle(..));
    Ok(cx.boolean(hit))
}

fn handle_id(cx: &mut Context, args: &[Value]) -> LispResult {
    match cx.object(args[0])? {
        Object::Handle(_, id) => {
            let id = *id;
            Ok(cx.int(id))
        }
        other => Err(LispError::wrong_type("handle-id", "handle", other.type_name()).into()),
    }
}

pub(super) fn init(cx: &mut Context, env: EnvRef) {
    defprim! { cx, env;
        "array", Arity::AtLeast(0), array;
        "array-ref", Arity::Exact(2), array_ref;
        "array-set!", Arity::Exact(3), array_set;
        "array-push!", Arity::Exact(2), array_push;
        "array-length", Arity::Exact(1), array_length;
        "make-map", Arity::Exact(0), make_map;
        "map-set!", Arity::Exact(3), map_set;
        "map-ref", Arity::Range(2, 3), map_ref;
        "map-has?", Arity::Exact(2), map_has;
        "map-keys", Arity::Exact(1), map_keys;
        "map-count", Arity::Exact(1), map_count;
        "make-pqueue", Arity::Exact(0), make_pqueue;
        "pq-push!", Arity::Exact(3), pq_push;
        "pq-pop!", Arity::Exact(1), pq_pop;
        "pq-peek", Arity::Exact(1), pq_peek;
        "pq-count", Arity::Exact(1), pq_count;
        "make-rng", Arity::Range(0, 1), make_rng;
        "rng-float", Arity::Exact(1), rng_float;
        "rng-int", Arity::Exact(3), rng_int;
        "handle?", Arity::Exact(1), handle_p;
        "handle-id", Arity::Exact(1), handle_id;
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        builtins::testing::{eval_str, ok},
        context::Context,
        error::{Error, LispError},
        gc::HeapConfig,
        value::HandleKind,
    };

    #[test]
    fn arrays() {
        assert_eq!(ok("(array 1 2 3)"), "[1 2 3]");
        assert_eq!(
            ok("(define a (array)) (array-push! a 'x) (array-push! a 'y) (array-set! a 0 'z) a"),
            "[z y]"
        );
        assert_eq!(ok("(array-ref (array 5 6) 1)"), "6");
        assert_eq!(ok("(array-length (array 5 6))"), "2");
        assert!(matches!(
            eval_str("(array-ref (array 1) -1)"),
            Err(Error::Lisp(LispError::OutOfRange { index: -1, len: 1, .. }))
        ));
        assert!(matches!(
            eval_str("(array-ref '(1) 0)"),
            Err(Error::Lisp(LispError::WrongType { expected: "array", .. }))
        ));
    }

    #[test]
    fn maps_keep_insertion_order() {
        let src = "(define m (make-map))
                   (map-set! m 'speed 3)
                   (map-set! m \"name\" 'arm)
                   (map-set! m 'speed 4)";
        assert_eq!(ok(&format!("{} m", src)), "{speed 4 \"name\" arm}");
        assert_eq!(ok(&format!("{} (map-keys m)", src)), "(speed \"name\")");
        assert_eq!(ok(&format!("{} (map-count m)", src)), "2");
        assert_eq!(ok(&format!("{} (map-ref m 'missing)", src)), "nil");
        assert_eq!(ok(&format!("{} (map-ref m 'missing 0)", src)), "0");
        assert_eq!(ok(&format!("{} (map-has? m \"name\")", src)), "#t");
        assert!(matches!(
            eval_str("(map-set! (make-map) 1.5 1)"),
            Err(Error::Lisp(LispError::WrongType { expected: "map key", .. }))
        ));
    }

    #[test]
    fn priority_queue_order() {
        let src = "(define q (make-pqueue))
                   (pq-push! q 5 'late)
                   (pq-push! q 1 'first)
                   (pq-push! q 1 'second)
                   (pq-push! q 2.5 'middle)";
        assert_eq!(ok(&format!("{} (pq-peek q)", src)), "first");
        assert_eq!(
            ok(&format!(
                "{} (list (pq-pop! q) (pq-pop! q) (pq-pop! q) (pq-count q) (pq-pop! q) (pq-pop! q))",
                src
            )),
            "(first second middle 1 late nil)"
        );
        assert_eq!(ok(&format!("{} q", src)), "#<priority-queue 4>");
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let a = ok("(define r (make-rng 7)) (list (rng-int r 0 100) (rng-int r 0 100) (rng-float r))");
        let b = ok("(define r (make-rng 7)) (list (rng-int r 0 100) (rng-int r 0 100) (rng-float r))");
        assert_eq!(a, b);
        assert_eq!(ok("(define r (make-rng)) (<= -1 (rng-int r -1 1) 0)"), "#t");
        assert!(eval_str("(rng-int (make-rng 1) 3 3)").is_err());
    }

    #[test]
    fn handles_are_opaque() {
        let mut cx = Context::new(HeapConfig::default());
        let env = cx.create_global_env();
        let mut scope = cx.scope();
        let h = scope.handle(HandleKind::Planner, 12);
        let sym = crate::symbol::Symbol::intern("planner");
        crate::env::define(scope.heap_mut(), env, sym, h).unwrap();
        let v = scope
            .eval_source("(list (handle? planner) (handle-id planner) (handle? 12))", env)
            .unwrap();
        assert_eq!(scope.write_value(v).unwrap(), "(#t 12 #f)");
        assert_eq!(scope.write_value(h).unwrap(), "#<planner 12>");
    }
}
