//! Lexical environments.
//!
//! An environment is a binding map plus an optional parent. Environments live in
//! the same heap as values and are reclaimed by the collector once no closure,
//! root scope or root registration reaches them.

use std::mem::size_of;

use indexmap::IndexMap;

use crate::{
    error::{LispError, LispResult},
    gc::Heap,
    symbol::Symbol,
    value::{EnvRef, Gc, Value},
};

pub struct Environment {
    pub(crate) bindings: IndexMap<Symbol, Value>,
    pub(crate) parent: Option<EnvRef>,
}

impl Environment {
    pub(crate) fn new(parent: Option<EnvRef>) -> Self {
        Self {
            bindings: IndexMap::new(),
            parent,
        }
    }

    pub fn parent(&self) -> Option<EnvRef> {
        self.parent
    }

    pub fn get(&self, name: Symbol) -> Option<Value> {
        self.bindings.get(&name).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.bindings.keys().copied()
    }

    pub(crate) fn heap_size(&self) -> usize {
        size_of::<Environment>() + self.bindings.capacity() * (size_of::<(Symbol, Value)>() + 8)
    }

    pub(crate) fn trace(&self, mut visit: impl FnMut(Gc)) {
        for value in self.bindings.values() {
            visit(value.0);
        }
        if let Some(parent) = self.parent {
            visit(parent.0);
        }
    }
}

/// Resolves `name` starting at `env` and walking outward through parents.
pub fn lookup(heap: &Heap, mut env: EnvRef, name: Symbol) -> LispResult {
    loop {
        let frame = heap.env(env)?;
        if let Some(value) = frame.get(name) {
            return Ok(value);
        }
        match frame.parent {
            Some(parent) => env = parent,
            None => return Err(LispError::UnboundSymbol(name.name().to_owned()).into()),
        }
    }
}

/// Binds `name` in `env` itself, overwriting an existing binding there.
/// Ancestors are never touched.
pub fn define(heap: &mut Heap, env: EnvRef, name: Symbol, value: Value) -> LispResult<()> {
    let frame = heap.env_mut(env)?;
    if frame.bindings.insert(name, value).is_none() {
        heap.note_growth(size_of::<(Symbol, Value)>() + 8);
    }
    Ok(())
}

/// Overwrites the nearest existing binding of `name`.
pub fn set(heap: &mut Heap, mut env: EnvRef, name: Symbol, value: Value) -> LispResult<()> {
    loop {
        let frame = heap.env_mut(env)?;
        if let Some(slot) = frame.bindings.get_mut(&name) {
            *slot = value;
            return Ok(());
        }
        match frame.parent {
            Some(parent) => env = parent,
            None => return Err(LispError::UnboundSymbol(name.name().to_owned()).into()),
        }
    }
}
