//! External representations of values.
//!
//! [`write_value`] produces text the reader accepts back for literals and
//! proper lists; [`print_value`] is the human-facing variant where strings are
//! emitted raw.

use std::fmt::Write;

use crate::{
    context::Context,
    error::LispResult,
    value::{Object, Value},
};

/// Past this nesting depth the printer gives up and emits `...`.
const MAX_DEPTH: usize = 256;

/// Marker for a container reached again while it is still being printed.
pub const CYCLE_MARKER: &str = "#<cycle>";

pub fn write_value(cx: &Context, value: Value) -> LispResult<String> {
    let mut out = String::new();
    Printer::new(cx, true).print(&mut out, value, 0)?;
    Ok(out)
}

pub fn print_value(cx: &Context, value: Value) -> LispResult<String> {
    let mut out = String::new();
    Printer::new(cx, false).print(&mut out, value, 0)?;
    Ok(out)
}

/// Floats always carry a `.` or an exponent so they read back as floats.
pub fn format_float(x: f64) -> String {
    format!("{:?}", x)
}

pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

struct Printer<'a> {
    cx: &'a Context,
    readable: bool,
    /// Arrays and maps on the path from the root to the current value.
    open: Vec<Value>,
}

impl<'a> Printer<'a> {
    fn new(cx: &'a Context, readable: bool) -> Self {
        Self {
            cx,
            readable,
            open: Vec::new(),
        }
    }

    fn print(&mut self, out: &mut String, value: Value, depth: usize) -> LispResult<()> {
        if depth > MAX_DEPTH {
            out.push_str("...");
            return Ok(());
        }
        if self.open.contains(&value) {
            out.push_str(CYCLE_MARKER);
            return Ok(());
        }
        let cx = self.cx;
        // writing into a String cannot fail
        let _ = match cx.object(value)? {
            Object::Nil => write!(out, "nil"),
            Object::Bool(true) => write!(out, "#t"),
            Object::Bool(false) => write!(out, "#f"),
            Object::Int(x) => write!(out, "{}", x),
            Object::Float(x) => write!(out, "{}", format_float(*x)),
            Object::Symbol(sym) => write!(out, "{}", sym),
            Object::Str(s) if self.readable => write!(out, "{}", escape_string(s)),
            Object::Str(s) => write!(out, "{}", s),
            Object::Cons(..) => return self.print_list(out, value, depth),
            Object::Primitive(prim) => write!(out, "#<primitive {}>", prim.name),
            Object::Closure(closure) => match closure.name {
                Some(name) => write!(out, "#<closure {}>", name),
                None => write!(out, "#<lambda>"),
            },
            Object::Array(items) => {
                out.push('[');
                self.open.push(value);
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.print(out, *item, depth + 1)?;
                }
                self.open.pop();
                write!(out, "]")
            }
            Object::Map(map) => {
                out.push('{');
                self.open.push(value);
                for (i, (key, entry)) in map.values().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.print(out, *key, depth + 1)?;
                    out.push(' ');
                    self.print(out, *entry, depth + 1)?;
                }
                self.open.pop();
                write!(out, "}}")
            }
            Object::Queue(queue) => write!(out, "#<priority-queue {}>", queue.entries.len()),
            Object::Rng(_) => write!(out, "#<rng>"),
            Object::Handle(kind, id) => write!(out, "#<{} {}>", kind.name(), id),
        };
        Ok(())
    }

    fn print_list(&mut self, out: &mut String, mut list: Value, depth: usize) -> LispResult<()> {
        out.push('(');
        let mut first = true;
        while let Some((car, cdr)) = self.cx.as_cons(list) {
            if !first {
                out.push(' ');
            }
            first = false;
            self.print(out, car, depth + 1)?;
            list = cdr;
        }
        if !self.cx.is_nil(list) {
            out.push_str(" . ");
            self.print(out, list, depth + 1)?;
        }
        out.push(')');
        Ok(())
    }
}
