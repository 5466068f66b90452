//! Pretty printing for values shown at the REPL.

use pretty::{BoxAllocator, DocAllocator, DocBuilder};
use termcolor::{Color, ColorSpec, NoColor, WriteColor};

use crate::{
    context::Context,
    print::{escape_string, format_float, CYCLE_MARKER},
    value::{Object, Value},
};

pub const WIDTH: usize = 70;

pub fn pretty(cx: &Context, value: Value, out: &mut dyn WriteColor) -> Result<(), std::io::Error> {
    let allocator = BoxAllocator;
    pretty_inner(cx, value, &allocator, &mut Vec::new(), 0)
        .1
        .render_colored(WIDTH, out)?;
    Ok(())
}

/// Renders without color, e.g. for logging or tests.
pub fn pretty_string(cx: &Context, value: Value) -> String {
    let mut out = NoColor::new(Vec::new());
    // rendering into memory does not fail
    let _ = pretty(cx, value, &mut out);
    String::from_utf8_lossy(&out.into_inner()).into_owned()
}

fn colored(color: Color) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color));
    spec
}

fn pretty_inner<'b, D>(
    cx: &Context,
    val: Value,
    allocator: &'b D,
    open: &mut Vec<Value>,
    depth: usize,
) -> DocBuilder<'b, D, ColorSpec>
where
    D: DocAllocator<'b, ColorSpec>,
    D::Doc: Clone,
{
    if depth > 256 {
        return allocator.text("...");
    }
    if open.contains(&val) {
        return allocator.text(CYCLE_MARKER);
    }
    let Ok(object) = cx.object(val) else {
        return allocator.text("#<collected>");
    };
    match object {
        Object::Nil => allocator.text("nil"),
        Object::Bool(x) => allocator
            .text(if *x { "#t" } else { "#f" })
            .annotate(colored(Color::Magenta)),
        Object::Int(x) => allocator.text(x.to_string()).annotate(colored(Color::Cyan)),
        Object::Float(x) => allocator.text(format_float(*x)).annotate(colored(Color::Cyan)),
        Object::Symbol(sym) => allocator.text(sym.name()),
        Object::Str(s) => allocator.text(escape_string(s)).annotate(colored(Color::Green)),
        Object::Cons(..) => {
            let mut items = Vec::new();
            let mut val = val;
            while let Some((car, cdr)) = cx.as_cons(val) {
                items.push(pretty_inner(cx, car, allocator, open, depth + 1));
                val = cdr;
            }
            let mut doc = allocator.intersperse(items, allocator.line());
            if !cx.is_nil(val) {
                doc = doc
                    .append(allocator.line())
                    .append(allocator.text("."))
                    .append(allocator.line())
                    .append(pretty_inner(cx, val, allocator, open, depth + 1));
            }
            allocator
                .text("(")
                .append(doc.nest(1).group())
                .append(allocator.text(")"))
        }
        Object::Array(items) => {
            open.push(val);
            let docs: Vec<_> = items
                .iter()
                .map(|item| pretty_inner(cx, *item, allocator, open, depth + 1))
                .collect();
            open.pop();
            allocator
                .text("[")
                .append(allocator.intersperse(docs, allocator.line()).nest(1).group())
                .append(allocator.text("]"))
        }
        Object::Map(map) => {
            open.push(val);
            let docs: Vec<_> = map
                .values()
                .map(|(k, v)| {
                    pretty_inner(cx, *k, allocator, open, depth + 1)
                        .append(allocator.space())
                        .append(pretty_inner(cx, *v, allocator, open, depth + 1))
                })
                .collect();
            open.pop();
            allocator
                .text("{")
                .append(allocator.intersperse(docs, allocator.line()).nest(1).group())
                .append(allocator.text("}"))
        }
        Object::Primitive(prim) => allocator
            .text(format!("#<primitive {}>", prim.name))
            .annotate(colored(Color::Yellow)),
        Object::Closure(closure) => allocator
            .text(match closure.name {
                Some(name) => format!("#<closure {}>", name),
                None => "#<lambda>".to_owned(),
            })
            .annotate(colored(Color::Yellow)),
        Object::Queue(queue) => allocator.text(format!("#<priority-queue {}>", queue.entries.len())),
        Object::Rng(_) => allocator.text("#<rng>"),
        Object::Handle(kind, id) => allocator
            .text(format!("#<{} {}>", kind.name(), id))
            .annotate(colored(Color::Blue)),
    }
}
