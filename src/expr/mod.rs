//! Filter expression engine
//!
//! The pipeline: tokenize the filter arguments (`lexer`), compile the
//! infix token stream into a postfix program (`parser`), then fold the
//! program over each task (`eval`). Sequence-only filters additionally
//! expose an ID/UUID whitelist for the loader's fast path.

pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::EvalContext;
pub use lexer::{Modifier, Op, Selector, Token};
pub use parser::{Filter, Node};
