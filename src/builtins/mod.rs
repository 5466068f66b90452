//! Primitive procedures installed into every global environment.

mod arith;
mod containers;
mod heap;
mod list;
mod predicates;
mod strings;

use crate::{
    context::Context,
    env,
    error::Arity,
    symbol::Symbol,
    value::{EnvRef, NativeFn, Object, Primitive},
};

macro_rules! defprim {
    ($cx: expr, $env: expr; $($lit: literal, $arity: expr, $func: expr;)*) => {
        $(
            $crate::builtins::define_primitive($cx, $env, $lit, $arity, $func);
        )*
    };
}

pub(crate) use defprim;

pub fn install(cx: &mut Context, env: EnvRef) {
    arith::init(cx, env);
    list::init(cx, env);
    predicates::init(cx, env);
    strings::init(cx, env);
    containers::init(cx, env);
    heap::init(cx, env);
}

pub(crate) fn define_primitive(
    cx: &mut Context,
    env: EnvRef,
    name: &'static str,
    arity: Arity,
    func: NativeFn,
) {
    let value = cx
        .heap_mut()
        .allocate(Object::Primitive(Primitive { name, arity, func }));
    if let Err(err) = env::define(cx.heap_mut(), env, Symbol::intern(name), value) {
        log::error!(target: "builtins", "failed to install {}: {}", name, err);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::{context::Context, error::Error, gc::HeapConfig};

    pub fn eval_str(src: &str) -> Result<String, Error> {
        let mut cx = Context::new(HeapConfig::default());
        let env = cx.create_global_env();
        let value = cx.eval_source(src, env)?;
        cx.write_value(value)
    }

    pub fn ok(src: &str) -> String {
        match eval_str(src) {
            Ok(text) => text,
            Err(err) => panic!("{} failed: {}", src, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ok;

    #[test]
    fn primitives_print_by_name() {
        assert_eq!(ok("car"), "#<primitive car>");
        assert_eq!(ok("(procedure? +)"), "#t");
    }
}
