//! Heap-resident objects and the handles used to reach them.
//!
//! A [`Value`] is a small copyable handle: an index into the heap's slot arena
//! plus the generation the slot had when the object was allocated. Once the
//! collector frees a slot its generation changes, so a handle that outlived its
//! object is detected on access instead of silently aliasing a new object.

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    fmt,
    mem::size_of,
    sync::Arc,
};

use indexmap::IndexMap;

use crate::{
    context::Context,
    error::{Arity, LispResult},
    symbol::Symbol,
};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Gc {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Debug for Gc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.generation)
    }
}

/// Handle to a heap object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Value(pub(crate) Gc);

/// Handle to a heap-allocated environment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EnvRef(pub(crate) Gc);

pub type NativeFn = fn(&mut Context, &[Value]) -> LispResult;

#[derive(Clone, Copy)]
pub struct Primitive {
    pub name: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

#[derive(Clone)]
pub struct Closure {
    pub name: Option<Symbol>,
    pub params: Arc<[Symbol]>,
    pub body: Arc<[Value]>,
    pub env: EnvRef,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HandleKind {
    BtDefinition,
    BtInstance,
    Image,
    Blob,
    Planner,
    Job,
}

impl HandleKind {
    pub fn name(self) -> &'static str {
        match self {
            HandleKind::BtDefinition => "bt-definition",
            HandleKind::BtInstance => "bt-instance",
            HandleKind::Image => "image",
            HandleKind::Blob => "blob",
            HandleKind::Planner => "planner",
            HandleKind::Job => "job",
        }
    }
}

/// Hashable projection of a value used as a map key.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum MapKey {
    Int(i64),
    Str(String),
    Symbol(Symbol),
    Bool(bool),
}

pub struct QueueEntry {
    pub priority: f64,
    pub seq: u64,
    pub value: Value,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // `BinaryHeap` is a max-heap; invert so the lowest priority (then the
    // oldest entry) sits on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
pub struct PriorityQueue {
    pub entries: BinaryHeap<QueueEntry>,
    pub next_seq: u64,
}

impl PriorityQueue {
    pub fn push(&mut self, priority: f64, value: Value) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(QueueEntry {
            priority,
            seq,
            value,
        });
    }
}

/// xorshift64* generator state.
#[derive(Clone, Copy, Debug)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        // zero is a fixed point of xorshift
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
        .warm()
    }

    fn warm(mut self) -> Self {
        if self.state == 0 {
            self.state = 0x2545_F491_4F6C_DD1D;
        }
        self
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

pub enum Object {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Symbol(Symbol),
    Str(String),
    Cons(Value, Value),
    Primitive(Primitive),
    Closure(Closure),
    Array(Vec<Value>),
    Map(IndexMap<MapKey, (Value, Value)>),
    Queue(PriorityQueue),
    Rng(Rng),
    Handle(HandleKind, i64),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Nil => "nil",
            Object::Bool(_) => "boolean",
            Object::Int(_) => "integer",
            Object::Float(_) => "float",
            Object::Symbol(_) => "symbol",
            Object::Str(_) => "string",
            Object::Cons(..) => "cons",
            Object::Primitive(_) => "primitive",
            Object::Closure(_) => "closure",
            Object::Array(_) => "array",
            Object::Map(_) => "map",
            Object::Queue(_) => "priority-queue",
            Object::Rng(_) => "rng",
            Object::Handle(..) => "handle",
        }
    }

    /// Approximate number of bytes this object keeps alive, used to drive
    /// the collection threshold.
    pub fn heap_size(&self) -> usize {
        let payload = match self {
            Object::Str(s) => s.capacity(),
            Object::Closure(c) => {
                c.params.len() * size_of::<Symbol>() + c.body.len() * size_of::<Value>()
            }
            Object::Array(items) => items.capacity() * size_of::<Value>(),
            Object::Map(map) => map.capacity() * size_of::<(MapKey, (Value, Value))>(),
            Object::Queue(q) => q.entries.capacity() * size_of::<QueueEntry>(),
            _ => 0,
        };
        size_of::<Object>() + payload
    }

    /// Calls `visit` on every handle this object holds.
    pub(crate) fn trace(&self, mut visit: impl FnMut(Gc)) {
        match self {
            Object::Cons(car, cdr) => {
                visit(car.0);
                visit(cdr.0);
            }
            Object::Closure(closure) => {
                visit(closure.env.0);
                for expr in closure.body.iter() {
                    visit(expr.0);
                }
            }
            Object::Array(items) => {
                for item in items {
                    visit(item.0);
                }
            }
            Object::Map(map) => {
                for (key, value) in map.values() {
                    visit(key.0);
                    visit(value.0);
                }
            }
            Object::Queue(queue) => {
                for entry in queue.entries.iter() {
                    visit(entry.value.0);
                }
            }
            Object::Nil
            | Object::Bool(_)
            | Object::Int(_)
            | Object::Float(_)
            | Object::Symbol(_)
            | Object::Str(_)
            | Object::Primitive(_)
            | Object::Rng(_)
            | Object::Handle(..) => (),
        }
    }
}

/// Numeric view of a value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(x) => x as f64,
            Number::Float(x) => x,
        }
    }
}
