//! Hook for the behavior-tree compiler.
//!
//! The interpreter does not know how behavior trees are built. `(bt FORM)` and
//! `(defbt NAME FORM)` hand the unevaluated FORM to whatever host was installed
//! with [`Context::set_behavior_tree_host`] and wrap the id it returns in a
//! `bt-definition` handle.

use crate::{
    context::Context,
    error::{LispError, LispResult},
    value::{HandleKind, Value},
};

pub trait BehaviorTreeHost: Send {
    /// Compiles `form` and returns an id identifying the definition.
    fn compile(&mut self, cx: &mut Context, form: Value) -> LispResult<i64>;
}

pub(crate) fn compile(cx: &mut Context, form: Value) -> LispResult {
    let mut host = cx.bt_host.take().ok_or(LispError::NoBehaviorTreeHost)?;
    let result = host.compile(cx, form);
    // a host may have replaced itself while compiling
    if cx.bt_host.is_none() {
        cx.bt_host = Some(host);
    }
    let id = result?;
    log::trace!(target: "bt", "compiled behavior tree {}", id);
    Ok(cx.handle(HandleKind::BtDefinition, id))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::{error::Error, gc::HeapConfig};

    /// Records the written form of everything it is asked to compile.
    struct Recorder {
        seen: Arc<parking_lot::Mutex<Vec<String>>>,
        next: Arc<AtomicUsize>,
    }

    impl BehaviorTreeHost for Recorder {
        fn compile(&mut self, cx: &mut Context, form: Value) -> LispResult<i64> {
            let text = cx.write_value(form)?;
            if text == "fail" {
                return Err(LispError::User("rejected".into()).into());
            }
            self.seen.lock().push(text);
            Ok(self.next.fetch_add(1, Ordering::SeqCst) as i64)
        }
    }

    fn setup() -> (Context, Arc<parking_lot::Mutex<Vec<String>>>) {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut cx = Context::new(HeapConfig::default());
        cx.set_behavior_tree_host(Box::new(Recorder {
            seen: seen.clone(),
            next: Arc::new(AtomicUsize::new(10)),
        }));
        (cx, seen)
    }

    #[test]
    fn bt_passes_form_unevaluated() {
        let (mut cx, seen) = setup();
        let env = cx.create_global_env();
        let v = cx.eval_source("(bt (sequence (move-to x) (grip)))", env).unwrap();
        assert_eq!(cx.write_value(v).unwrap(), "#<bt-definition 10>");
        assert_eq!(*seen.lock(), vec!["(sequence (move-to x) (grip))".to_string()]);
    }

    #[test]
    fn defbt_binds_the_handle() {
        let (mut cx, _) = setup();
        let env = cx.create_global_env();
        let v = cx
            .eval_source("(defbt patrol (loop (walk))) (list patrol (handle-id patrol))", env)
            .unwrap();
        assert_eq!(cx.write_value(v).unwrap(), "(#<bt-definition 10> 10)");
    }

    #[test]
    fn host_errors_propagate_and_host_stays_installed() {
        let (mut cx, _) = setup();
        let env = cx.create_global_env();
        let err = cx.eval_source("(bt fail)", env).unwrap_err();
        assert!(matches!(err, Error::Lisp(LispError::User(msg)) if msg == "rejected"));
        assert!(cx.eval_source("(bt ok)", env).is_ok());
    }
}
