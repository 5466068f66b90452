//! Numeric primitives. Integers are i64 with overflow checks; any float
//! operand promotes the operation to f64.

use std::{
    cmp::Ordering,
    ops::{Add, Mul, Sub},
};

use super::defprim;
use crate::{
    context::Context,
    error::{Arity, LispError, LispResult},
    value::{EnvRef, Number, Value},
};

#[derive(Clone, Copy)]
enum NumberPair {
    Int(i64, i64),
    Float(f64, f64),
}

macro_rules! impl_op {
    ($($op: ident),*) => {
        impl NumberPair {$(
            fn $op(self, name: &'static str) -> LispResult<Number> {
                match self {
                    Self::Int(a, b) => paste::paste! { a.[<checked_ $op>](b) }
                        .map(Number::Int)
                        .ok_or_else(|| LispError::Overflow(name).into()),
                    Self::Float(a, b) => Ok(Number::Float(a.$op(b))),
                }
            }
        )*}
    };
}

impl_op! {
    add, sub, mul
}

impl NumberPair {
    fn new(a: Number, b: Number) -> Self {
        match (a, b) {
            (Number::Int(a), Number::Int(b)) => Self::Int(a, b),
            (a, b) => Self::Float(a.as_f64(), b.as_f64()),
        }
    }

    fn compare(self) -> Option<Ordering> {
        match self {
            Self::Int(a, b) => Some(a.cmp(&b)),
            Self::Float(a, b) => a.partial_cmp(&b),
        }
    }

    /// Floored modulo: the result takes the sign of the divisor. A zero
    /// divisor is an error for both kinds.
    fn modulo(self) -> LispResult<Number> {
        match self {
            Self::Int(_, 0) => Err(LispError::DivisionByZero("mod").into()),
            Self::Float(_, b) if b == 0.0 => Err(LispError::DivisionByZero("mod").into()),
            Self::Int(a, b) => {
                // only i64::MIN % -1 wraps, and its remainder is 0
                let r = a.wrapping_rem(b);
                Ok(Number::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
            }
            Self::Float(a, b) => Ok(Number::Float(a - b * (a / b).floor())),
        }
    }
}

fn numbers(cx: &Context, name: &str, args: &[Value]) -> LispResult<Vec<Number>> {
    args.iter().map(|arg| cx.expect_number(name, *arg)).collect()
}

fn fold(
    cx: &mut Context,
    name: &'static str,
    args: &[Value],
    init: Number,
    op: fn(NumberPair, &'static str) -> LispResult<Number>,
) -> LispResult {
    let mut acc = init;
    for x in numbers(cx, name, args)? {
        acc = op(NumberPair::new(acc, x), name)?;
    }
    Ok(cx.number(acc))
}

fn add(cx: &mut Context, args: &[Value]) -> LispResult {
    fold(cx, "+", args, Number::Int(0), NumberPair::add)
}

fn mul(cx: &mut Context, args: &[Value]) -> LispResult {
    fold(cx, "*", args, Number::Int(1), NumberPair::mul)
}

fn sub(cx: &mut Context, args: &[Value]) -> LispResult {
    let first = cx.expect_number("-", args[0])?;
    if args.len() == 1 {
        let negated = NumberPair::new(Number::Int(0), first).sub("-")?;
        return Ok(cx.number(negated));
    }
    fold(cx, "-", &args[1..], first, NumberPair::sub)
}

/// Always produces a float; `(/ x)` is the reciprocal.
fn div(cx: &mut Context, args: &[Value]) -> LispResult {
    let xs = numbers(cx, "/", args)?;
    let (mut acc, rest) = match xs.as_slice() {
        [x] => (1.0, std::slice::from_ref(x)),
        [x, rest @ ..] => (x.as_f64(), rest),
        [] => unreachable!("arity checked by apply"),
    };
    for x in rest {
        let x = x.as_f64();
        if x == 0.0 {
            return Err(LispError::DivisionByZero("/").into());
        }
        acc /= x;
    }
    Ok(cx.float(acc))
}

fn abs(cx: &mut Context, args: &[Value]) -> LispResult {
    let result = match cx.expect_number("abs", args[0])? {
        Number::Int(x) => Number::Int(x.checked_abs().ok_or(LispError::Overflow("abs"))?),
        Number::Float(x) => Number::Float(x.abs()),
    };
    Ok(cx.number(result))
}

fn modulo(cx: &mut Context, args: &[Value]) -> LispResult {
    let a = cx.expect_number("mod", args[0])?;
    let b = cx.expect_number("mod", args[1])?;
    let result = NumberPair::new(a, b).modulo()?;
    Ok(cx.number(result))
}

fn extremum(cx: &Context, name: &'static str, args: &[Value], keep: Ordering) -> LispResult {
    let mut best = args[0];
    let mut best_n = cx.expect_number(name, best)?;
    for arg in &args[1..] {
        let n = cx.expect_number(name, *arg)?;
        if NumberPair::new(n, best_n).compare() == Some(keep) {
            best = *arg;
            best_n = n;
        }
    }
    Ok(best)
}

fn min(cx: &mut Context, args: &[Value]) -> LispResult {
    extremum(cx, "min", args, Ordering::Less)
}

fn max(cx: &mut Context, args: &[Value]) -> LispResult {
    extremum(cx, "max", args, Ordering::Greater)
}

fn sqrt(cx: &mut Context, args: &[Value]) -> LispResult {
    let x = cx.expect_number("sqrt", args[0])?.as_f64();
    Ok(cx.float(x.sqrt()))
}

/// Rounds toward negative infinity and returns an integer.
fn floor(cx: &mut Context, args: &[Value]) -> LispResult {
    match cx.expect_number("floor", args[0])? {
        Number::Int(_) => Ok(args[0]),
        Number::Float(x) => {
            let x = x.floor();
            if !x.is_finite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
                return Err(LispError::Overflow("floor").into());
            }
            Ok(cx.int(x as i64))
        }
    }
}

/// Pairwise chain; stops at the first pair that does not hold.
fn chain(
    cx: &Context,
    name: &'static str,
    args: &[Value],
    holds: fn(Ordering) -> bool,
) -> LispResult {
    let mut prev = cx.expect_number(name, args[0])?;
    for arg in &args[1..] {
        let next = cx.expect_number(name, *arg)?;
        if !NumberPair::new(prev, next).compare().map_or(false, holds) {
            return Ok(cx.boolean(false));
        }
        prev = next;
    }
    Ok(cx.boolean(true))
}

fn lt(cx: &mut Context, args: &[Value]) -> LispResult {
    chain(cx, "<", args, Ordering::is_lt)
}

fn gt(cx: &mut Context, args: &[Value]) -> LispResult {
    chain(cx, ">", args, Ordering::is_gt)
}

fn le(cx: &mut Context, args: &[Value]) -> LispResult {
    chain(cx, "<=", args, Ordering::is_le)
}

fn ge(cx: &mut Context, args: &[Value]) -> LispResult {
    chain(cx, ">=", args, Ordering::is_ge)
}

fn num_eq(cx: &mut Context, args: &[Value]) -> LispResult {
    chain(cx, "=", args, Ordering::is_eq)
}

fn eq(cx: &mut Context, args: &[Value]) -> LispResult {
    Ok(cx.boolean(cx.eq(args[0], args[1])))
}

fn not(cx: &mut Context, args: &[Value]) -> LispResult {
    Ok(cx.boolean(!cx.is_truthy(args[0])))
}

pub(super) fn init(cx: &mut Context, env: EnvRef) {
    defprim! { cx, env;
        "+", Arity::AtLeast(0), add;
        "-", Arity::AtLeast(1), sub;
        "*", Arity::AtLeast(0), mul;
        "/", Arity::AtLeast(1), div;
        "abs", Arity::Exact(1), abs;
        "mod", Arity::Exact(2), modulo;
        "min", Arity::AtLeast(1), min;
        "max", Arity::AtLeast(1), max;
        "sqrt", Arity::Exact(1), sqrt;
        "floor", Arity::Exact(1), floor;
        "<", Arity::AtLeast(1), lt;
        ">", Arity::AtLeast(1), gt;
        "<=", Arity::AtLeast(1), le;
        ">=", Arity::AtLeast(1), ge;
        "=", Arity::AtLeast(1), num_eq;
        "eq?", Arity::Exact(2), eq;
        "not", Arity::Exact(1), not;
    }
}
