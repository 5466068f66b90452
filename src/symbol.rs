//! Process-wide symbol interning.
//!
//! Symbol names are leaked into `'static` storage on first use and never freed,
//! so the table grows with the number of distinct identifiers ever seen. Every
//! interpreter in the process shares this table; each heap additionally keeps
//! one symbol object per [`Symbol`] it has materialized (see [`crate::gc::Heap::intern`]).

use std::{collections::HashMap, fmt};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

struct SymbolTable {
    names: Vec<&'static str>,
    index: HashMap<&'static str, Symbol>,
}

impl SymbolTable {
    fn new() -> Self {
        Self {
            names: Vec::with_capacity(256),
            index: HashMap::with_capacity(256),
        }
    }

    fn intern(&mut self, name: &str) -> Symbol {
        if let Some(sym) = self.index.get(name) {
            return *sym;
        }

        let name: &'static str = Box::leak(name.to_owned().into_boxed_str());
        let sym = Symbol(self.names.len() as u32);
        self.names.push(name);
        self.index.insert(name, sym);
        sym
    }
}

static SYMBOLS: Lazy<Mutex<SymbolTable>> = Lazy::new(|| Mutex::new(SymbolTable::new()));

impl Symbol {
    pub fn intern(name: &str) -> Symbol {
        SYMBOLS.lock().intern(name)
    }

    pub fn name(self) -> &'static str {
        SYMBOLS.lock().names[self.0 as usize]
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.name())
    }
}

pub trait Intern {
    fn intern(&self) -> Symbol;
}

impl Intern for str {
    fn intern(&self) -> Symbol {
        Symbol::intern(self)
    }
}

impl Intern for String {
    fn intern(&self) -> Symbol {
        Symbol::intern(self)
    }
}

impl Intern for Symbol {
    fn intern(&self) -> Symbol {
        *self
    }
}

/// Symbols with a fixed meaning to the evaluator and reader.
pub struct Names {
    pub quote: Symbol,
    pub quasiquote: Symbol,
    pub unquote: Symbol,
    pub unquote_splicing: Symbol,
    pub if_: Symbol,
    pub define: Symbol,
    pub lambda: Symbol,
    pub let_: Symbol,
    pub cond: Symbol,
    pub else_: Symbol,
    pub begin: Symbol,
    pub load: Symbol,
    pub bt: Symbol,
    pub defbt: Symbol,
    pub and: Symbol,
    pub or: Symbol,
    pub set: Symbol,
}

pub static NAMES: Lazy<Names> = Lazy::new(|| Names {
    quote: "quote".intern(),
    quasiquote: "quasiquote".intern(),
    unquote: "unquote".intern(),
    unquote_splicing: "unquote-splicing".intern(),
    if_: "if".intern(),
    define: "define".intern(),
    lambda: "lambda".intern(),
    let_: "let".intern(),
    cond: "cond".intern(),
    else_: "else".intern(),
    begin: "begin".intern(),
    load: "load".intern(),
    bt: "bt".intern(),
    defbt: "defbt".intern(),
    and: "and".intern(),
    or: "or".intern(),
    set: "set!".intern(),
});
