//! An embeddable Lisp for robot scripting.
//!
//! ```
//! use botlisp::prelude::*;
//!
//! let mut cx = Context::new(HeapConfig::default());
//! let env = cx.create_global_env();
//! let value = cx.eval_source("(define (sq x) (* x x)) (sq 12)", env).unwrap();
//! assert_eq!(cx.write_value(value).unwrap(), "144");
//! ```

pub mod bt;
pub mod builtins;
pub mod context;
pub mod env;
pub mod error;
pub mod eval;
pub mod fmt;
pub mod gc;
pub mod options;
pub mod print;
pub mod reader;
pub mod repl;
pub mod symbol;
pub mod utils;
pub mod value;

pub mod prelude {
    pub use crate::bt::BehaviorTreeHost;
    pub use crate::context::{with_default_context, Context};
    pub use crate::error::{Arity, Error, LispError, LispResult, ParseError};
    pub use crate::gc::{HeapConfig, HeapStats, RootScope};
    pub use crate::repl::{Repl, ReplOutcome};
    pub use crate::symbol::{Intern, Symbol};
    pub use crate::value::{EnvRef, HandleKind, Number, Object, Value};
}

pub use prelude::*;
