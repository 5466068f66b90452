//! Collector introspection.

use indexmap::IndexMap;

use super::defprim;
use crate::{
    context::Context,
    error::{Arity, LispResult},
    gc::HeapStats,
    symbol::Symbol,
    value::{EnvRef, MapKey, Object, Value},
};

fn stats_map(cx: &mut Context, stats: HeapStats) -> LispResult {
    let fields = [
        ("total-allocated", stats.total_allocated as i64),
        ("live-objects", stats.live_objects as i64),
        ("bytes-allocated", stats.bytes_allocated as i64),
        ("next-threshold", stats.next_threshold as i64),
        ("collections", stats.collections as i64),
    ];
    let mut scope = cx.scope();
    let mut map = IndexMap::with_capacity(fields.len());
    for (name, count) in fields {
        let sym = Symbol::intern(name);
        let key = scope.symbol(sym);
        let value = scope.int(count);
        map.insert(MapKey::Symbol(sym), (key, value));
    }
    let map = scope.heap_mut().allocate(Object::Map(map));
    Ok(scope.escape(map))
}

/// Runs a full collection and reports the resulting stats.
fn gc_collect(cx: &mut Context, _: &[Value]) -> LispResult {
    cx.collect();
    let stats = cx.stats();
    stats_map(cx, stats)
}

fn gc_stats(cx: &mut Context, _: &[Value]) -> LispResult {
    let stats = cx.stats();
    stats_map(cx, stats)
}

pub(super) fn init(cx: &mut Context, env: EnvRef) {
    defprim! { cx, env;
        "gc-collect", Arity::Exact(0), gc_collect;
        "gc-stats", Arity::Exact(0), gc_stats;
    }
}

#[cfg(test)]
mod tests {
    use crate::builtins::testing::ok;

    #[test]
    fn gc_stats_is_a_map() {
        assert_eq!(
            ok("(map-keys (gc-stats))"),
            "(total-allocated live-objects bytes-allocated next-threshold collections)"
        );
        assert_eq!(ok("(map-ref (gc-collect) 'collections)"), "1");
    }

    #[test]
    fn collection_keeps_live_data() {
        assert_eq!(
            ok("(define xs (list 1 2 3)) (list 1 2) (gc-collect) (gc-collect) xs"),
            "(1 2 3)"
        );
        assert_eq!(
            ok("(define (f) (let ((tmp (list 'a 'b))) (gc-collect) tmp)) (f)"),
            "(a b)"
        );
    }
}
