use super::defprim;
use crate::{
    context::Context,
    error::{Arity, LispError, LispResult},
    value::{EnvRef, Object, Value},
};

/// Elements of a proper list, or a type error naming `name`.
fn items(cx: &Context, name: &'static str, mut list: Value) -> LispResult<Vec<Value>> {
    let head = list;
    let mut out = Vec::new();
    loop {
        match cx.object(list)? {
            Object::Nil => return Ok(out),
            Object::Cons(car, cdr) => {
                out.push(*car);
                list = *cdr;
            }
            _ => {
                let got = if list == head { cx.type_name(list) } else { "improper list" };
                return Err(LispError::wrong_type(name, "list", got).into());
            }
        }
    }
}

fn cons(cx: &mut Context, args: &[Value]) -> LispResult {
    Ok(cx.cons(args[0], args[1]))
}

fn car(cx: &mut Context, args: &[Value]) -> LispResult {
    cx.car(args[0])
}

fn cdr(cx: &mut Context, args: &[Value]) -> LispResult {
    cx.cdr(args[0])
}

fn list(cx: &mut Context, args: &[Value]) -> LispResult {
    Ok(cx.list(args))
}

fn length(cx: &mut Context, args: &[Value]) -> LispResult {
    let n = items(cx, "length", args[0])?.len();
    Ok(cx.int(n as i64))
}

/// Copies every argument but the last; the last becomes the shared tail.
fn append(cx: &mut Context, args: &[Value]) -> LispResult {
    let Some((&tail, init)) = args.split_last() else {
        return Ok(cx.nil());
    };
    let mut elements = Vec::new();
    for list in init {
        elements.extend(items(cx, "append", *list)?);
    }
    Ok(cx.list_with_tail(&elements, tail))
}

fn reverse(cx: &mut Context, args: &[Value]) -> LispResult {
    let mut elements = items(cx, "reverse", args[0])?;
    elements.reverse();
    Ok(cx.list(&elements))
}

fn nth(cx: &mut Context, args: &[Value]) -> LispResult {
    let elements = items(cx, "nth", args[0])?;
    let index = cx.expect_int("nth", args[1])?;
    usize::try_from(index)
        .ok()
        .and_then(|i| elements.get(i).copied())
        .ok_or_else(|| {
            LispError::OutOfRange {
                name: "nth",
                index,
                len: elements.len(),
            }
            .into()
        })
}

fn null_p(cx: &mut Context, args: &[Value]) -> LispResult {
    Ok(cx.boolean(cx.is_nil(args[0])))
}

fn pair_p(cx: &mut Context, args: &[Value]) -> LispResult {
    Ok(cx.boolean(cx.as_cons(args[0]).is_some()))
}

pub(super) fn init(cx: &mut Context, env: EnvRef) {
    defprim! { cx, env;
        "cons", Arity::Exact(2), cons;
        "car", Arity::Exact(1), car;
        "cdr", Arity::Exact(1), cdr;
        "list", Arity::AtLeast(0), list;
        "length", Arity::Exact(1), length;
        "append", Arity::AtLeast(0), append;
        "reverse", Arity::Exact(1), reverse;
        "nth", Arity::Exact(2), nth;
        "null?", Arity::Exact(1), null_p;
        "pair?", Arity::Exact(1), pair_p;
    }
}
