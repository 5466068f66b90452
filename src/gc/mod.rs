//! The managed heap.
//!
//! Objects live in an arena of slots addressed by `(index, generation)` handles.
//! Collection is a non-moving, stop-the-world mark-and-sweep: marking walks
//! handles with an explicit work list starting from the root set, sweeping frees
//! every unmarked slot and bumps its generation so any handle still pointing at
//! it is rejected on access.
//!
//! The root set is:
//! - the root-scope stack (see [`roots`]), which every fresh allocation is
//!   pushed onto;
//! - environments registered with [`Heap::register_root_env`];
//! - the `nil`/`true`/`false` singletons;
//! - every interned symbol object;
//! - the value most recently handed back to the host.

use std::{collections::HashMap, mem::size_of};

use crate::{
    env::Environment,
    error::{Error, LispResult},
    symbol::Symbol,
    utils::env::{read_float_from_env, read_uint_from_env},
    value::{EnvRef, Gc, Object, Value},
};

pub mod roots;

pub use roots::RootScope;

pub const DEFAULT_INITIAL_THRESHOLD: usize = 1024 * 1024;
pub const DEFAULT_GROWTH_FACTOR: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeapConfig {
    /// Bytes that may be allocated before the first collection; also the floor
    /// for every later threshold.
    pub initial_threshold: usize,
    /// Next threshold is `live_bytes * growth_factor` after each collection.
    pub growth_factor: f64,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            initial_threshold: DEFAULT_INITIAL_THRESHOLD,
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}

impl HeapConfig {
    /// Reads `BOTLISP_GC_THRESHOLD` (e.g. `4m`) and `BOTLISP_GC_GROWTH`,
    /// falling back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(threshold) = read_uint_from_env("BOTLISP_GC_THRESHOLD") {
            config.initial_threshold = threshold;
        }
        if let Some(growth) = read_float_from_env("BOTLISP_GC_GROWTH") {
            if growth >= 1.0 {
                config.growth_factor = growth;
            } else {
                log::warn!("ignoring BOTLISP_GC_GROWTH={}: must be at least 1.0", growth);
            }
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Objects ever allocated, environments included.
    pub total_allocated: u64,
    /// Objects that survived the last trace.
    pub live_objects: usize,
    /// Bytes allocated since the last trace, starting from the live total.
    pub bytes_allocated: usize,
    pub next_threshold: usize,
    pub collections: u64,
}

pub(crate) enum Cell {
    Object(Object),
    Env(Environment),
}

impl Cell {
    fn heap_size(&self) -> usize {
        size_of::<Slot>()
            + match self {
                Cell::Object(object) => object.heap_size(),
                Cell::Env(env) => env.heap_size(),
            }
    }

    fn trace(&self, visit: impl FnMut(Gc)) {
        match self {
            Cell::Object(object) => object.trace(visit),
            Cell::Env(env) => env.trace(visit),
        }
    }
}

struct Slot {
    generation: u32,
    marked: bool,
    size: usize,
    cell: Option<Cell>,
}

pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    pub(crate) roots: Vec<Gc>,
    root_envs: Vec<EnvRef>,
    symbols: HashMap<Symbol, Value>,
    last_result: Option<Value>,
    nil: Value,
    true_: Value,
    false_: Value,
    config: HeapConfig,
    total_allocated: u64,
    live_objects: usize,
    bytes_allocated: usize,
    next_threshold: usize,
    collections: u64,
}

const PLACEHOLDER: Value = Value(Gc {
    index: u32::MAX,
    generation: 0,
});

impl Heap {
    pub fn new(config: HeapConfig) -> Self {
        let mut heap = Self {
            slots: Vec::with_capacity(1024),
            free: Vec::new(),
            roots: Vec::with_capacity(1024),
            root_envs: Vec::new(),
            symbols: HashMap::with_capacity(256),
            last_result: None,
            nil: PLACEHOLDER,
            true_: PLACEHOLDER,
            false_: PLACEHOLDER,
            config,
            total_allocated: 0,
            live_objects: 0,
            bytes_allocated: 0,
            next_threshold: config.initial_threshold,
            collections: 0,
        };
        heap.nil = Value(heap.insert(Cell::Object(Object::Nil)));
        heap.true_ = Value(heap.insert(Cell::Object(Object::Bool(true))));
        heap.false_ = Value(heap.insert(Cell::Object(Object::Bool(false))));
        heap.roots.clear();
        heap
    }

    pub fn config(&self) -> HeapConfig {
        self.config
    }

    pub fn nil(&self) -> Value {
        self.nil
    }

    pub fn boolean(&self, x: bool) -> Value {
        if x {
            self.true_
        } else {
            self.false_
        }
    }

    /// Allocates `object`, collecting first if the byte threshold has been
    /// crossed. The returned handle is pushed onto the root-scope stack and
    /// stays rooted until the innermost open [`RootScope`] closes.
    ///
    /// `nil` and the booleans are never allocated twice; asking for one
    /// returns the heap's singleton.
    pub fn allocate(&mut self, object: Object) -> Value {
        match object {
            Object::Nil => return self.nil,
            Object::Bool(x) => return self.boolean(x),
            _ => (),
        }
        if self.bytes_allocated >= self.next_threshold {
            let mut pending = Vec::new();
            object.trace(|gc| pending.push(gc));
            self.collect_with(&pending);
        }
        Value(self.insert(Cell::Object(object)))
    }

    pub fn allocate_env(&mut self, parent: Option<EnvRef>) -> EnvRef {
        if self.bytes_allocated >= self.next_threshold {
            let pending = parent.map(|p| vec![p.0]).unwrap_or_default();
            self.collect_with(&pending);
        }
        EnvRef(self.insert(Cell::Env(Environment::new(parent))))
    }

    fn insert(&mut self, cell: Cell) -> Gc {
        let size = cell.heap_size();
        let gc = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.cell = Some(cell);
                slot.size = size;
                slot.marked = false;
                Gc {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    marked: false,
                    size,
                    cell: Some(cell),
                });
                Gc {
                    index,
                    generation: 0,
                }
            }
        };
        self.total_allocated += 1;
        self.bytes_allocated += size;
        self.roots.push(gc);
        gc
    }

    /// Accounts for an object growing after its allocation.
    pub(crate) fn note_growth(&mut self, bytes: usize) {
        self.bytes_allocated += bytes;
    }

    fn cell(&self, gc: Gc) -> LispResult<&Cell> {
        match self.slots.get(gc.index as usize) {
            Some(Slot {
                generation,
                cell: Some(cell),
                ..
            }) if *generation == gc.generation => Ok(cell),
            _ => Err(stale(gc)),
        }
    }

    fn cell_mut(&mut self, gc: Gc) -> LispResult<&mut Cell> {
        match self.slots.get_mut(gc.index as usize) {
            Some(Slot {
                generation,
                cell: Some(cell),
                ..
            }) if *generation == gc.generation => Ok(cell),
            _ => Err(stale(gc)),
        }
    }

    pub fn object(&self, value: Value) -> LispResult<&Object> {
        match self.cell(value.0)? {
            Cell::Object(object) => Ok(object),
            Cell::Env(_) => Err(Error::eval(format!(
                "handle {:?} names an environment, not a value",
                value.0
            ))),
        }
    }

    pub fn object_mut(&mut self, value: Value) -> LispResult<&mut Object> {
        match self.cell_mut(value.0)? {
            Cell::Object(object) => Ok(object),
            Cell::Env(_) => Err(Error::eval(format!(
                "handle {:?} names an environment, not a value",
                value.0
            ))),
        }
    }

    pub fn env(&self, env: EnvRef) -> LispResult<&Environment> {
        match self.cell(env.0)? {
            Cell::Env(env) => Ok(env),
            Cell::Object(_) => Err(Error::eval(format!(
                "handle {:?} names a value, not an environment",
                env.0
            ))),
        }
    }

    pub fn env_mut(&mut self, env: EnvRef) -> LispResult<&mut Environment> {
        match self.cell_mut(env.0)? {
            Cell::Env(env) => Ok(env),
            Cell::Object(_) => Err(Error::eval(format!(
                "handle {:?} names a value, not an environment",
                env.0
            ))),
        }
    }

    /// `true` while the slot behind `value` still holds the object it was
    /// allocated for.
    pub fn is_live(&self, value: Value) -> bool {
        self.cell(value.0).is_ok()
    }

    /// Returns this heap's unique object for `sym`, allocating it on first use.
    /// Symbol objects are roots and are never collected.
    pub fn intern(&mut self, sym: Symbol) -> Value {
        if let Some(value) = self.symbols.get(&sym) {
            return *value;
        }
        let value = self.allocate(Object::Symbol(sym));
        self.symbols.insert(sym, value);
        value
    }

    pub fn root_depth(&self) -> usize {
        self.roots.len()
    }

    pub(crate) fn push_root(&mut self, value: Value) {
        self.roots.push(value.0);
    }

    pub(crate) fn truncate_roots(&mut self, depth: usize) {
        debug_assert!(depth <= self.roots.len());
        self.roots.truncate(depth);
    }

    /// Keeps `env` alive until [`Heap::unregister_root_env`] is called.
    pub fn register_root_env(&mut self, env: EnvRef) {
        if !self.root_envs.contains(&env) {
            self.root_envs.push(env);
        }
    }

    pub fn unregister_root_env(&mut self, env: EnvRef) {
        self.root_envs.retain(|&e| e != env);
    }

    pub(crate) fn set_last_result(&mut self, value: Option<Value>) {
        self.last_result = value;
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            total_allocated: self.total_allocated,
            live_objects: self.live_objects,
            bytes_allocated: self.bytes_allocated,
            next_threshold: self.next_threshold,
            collections: self.collections,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_next_threshold(&mut self, bytes: usize) {
        self.next_threshold = bytes;
    }

    /// Collects only if the allocation threshold has been crossed.
    pub fn maybe_collect(&mut self) -> bool {
        log::trace!(
            target: "gc",
            "threshold check: {} of {} bytes",
            self.bytes_allocated,
            self.next_threshold
        );
        if self.bytes_allocated >= self.next_threshold {
            self.collect();
            true
        } else {
            false
        }
    }

    /// Runs a full collection cycle.
    pub fn collect(&mut self) {
        self.collect_with(&[]);
    }

    fn collect_with(&mut self, extra: &[Gc]) {
        let before = self.slots.len() - self.free.len();
        self.mark(extra);
        let live_bytes = self.sweep();

        self.bytes_allocated = live_bytes;
        self.next_threshold = self
            .config
            .initial_threshold
            .max((live_bytes as f64 * self.config.growth_factor) as usize);
        self.collections += 1;

        log::debug!(
            target: "gc",
            "collection #{}: {} -> {} objects, {} live bytes, next threshold {}",
            self.collections,
            before,
            self.live_objects,
            live_bytes,
            self.next_threshold
        );
    }

    fn mark(&mut self, extra: &[Gc]) {
        let mut stack: Vec<Gc> = Vec::with_capacity(self.roots.len() + extra.len() + 64);
        stack.extend_from_slice(&self.roots);
        stack.extend_from_slice(extra);
        stack.extend(self.root_envs.iter().map(|env| env.0));
        stack.extend(self.symbols.values().map(|sym| sym.0));
        stack.extend([self.nil.0, self.true_.0, self.false_.0]);
        stack.extend(self.last_result.map(|v| v.0));

        while let Some(gc) = stack.pop() {
            let slot = match self.slots.get_mut(gc.index as usize) {
                Some(slot) if slot.generation == gc.generation && !slot.marked => slot,
                _ => continue,
            };
            if let Some(cell) = &slot.cell {
                slot.marked = true;
                cell.trace(|child| stack.push(child));
            }
        }
    }

    /// Frees every unmarked slot and returns the number of live bytes.
    fn sweep(&mut self) -> usize {
        let mut live = 0;
        let mut live_bytes = 0;

        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(cell) = &slot.cell else {
                continue;
            };
            if slot.marked {
                slot.marked = false;
                slot.size = cell.heap_size();
                live += 1;
                live_bytes += slot.size;
            } else {
                slot.cell = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }

        self.live_objects = live;
        live_bytes
    }
}

fn stale(gc: Gc) -> Error {
    Error::eval(format!("use of collected or invalid handle {:?}", gc))
}
