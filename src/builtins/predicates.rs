use super::defprim;
use crate::{
    context::Context,
    error::{Arity, LispResult},
    value::{EnvRef, Object, Value},
};

macro_rules! type_predicates {
    ($($fname: ident, $lit: literal, $pat: pat),* $(,)?) => {
        $(
            fn $fname(cx: &mut Context, args: &[Value]) -> LispResult {
                let hit = matches!(cx.object(args[0])?, $pat);
                Ok(cx.boolean(hit))
            }
        )*

        pub(super) fn init(cx: &mut Context, env: EnvRef) {
            defprim! { cx, env;
                $($lit, Arity::Exact(1), $fname;)*
            }
        }
    };
}

type_predicates! {
    number_p, "number?", Object::Int(_) | Object::Float(_),
    integer_p, "integer?", Object::Int(_),
    float_p, "float?", Object::Float(_),
    string_p, "string?", Object::Str(_),
    symbol_p, "symbol?", Object::Symbol(_),
    boolean_p, "boolean?", Object::Bool(_),
    procedure_p, "procedure?", Object::Primitive(_) | Object::Closure(_),
    nil_p, "nil?", Object::Nil,
}
