//! # Taskwarrior data engine
//!
//! A Rust library implementing the Taskwarrior flat-file task data
//! engine: the task record and its four on-disk line formats (F1-F4),
//! the TDB2 storage layer (locking, pending/completed/undo/backlog
//! discipline, GC), the filter expression engine, the recurrence
//! engine, the urgency model, and the dependency graph.
//!
//! ## Features
//!
//! - **Task model**: attribute-map records with typed views, tags,
//!   annotations and dependencies
//! - **File formats**: auto-detected F1-F3 legacy reads, canonical F4
//!   writes, lossless round-trips
//! - **Storage**: advisory locking, atomic rewrites, an undo journal,
//!   and garbage collection between pending and completed
//! - **Filters**: IDs and ranges, tags, attribute modifiers, regex,
//!   and parenthesized algebraic expressions
//! - **Recurrence**: mask-driven child materialization with calendar
//!   month/year stepping
//! - **Urgency**: configurable weighted scoring
//!
//! ## Quick Start
//!
//! ```no_run
//! use taskdatalib::commands::{self, parse_invocation, Command};
//! use taskdatalib::{Configuration, Env, Session};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Configuration::from_discovery()?;
//! let args: Vec<String> = std::env::args().skip(1).collect();
//! let invocation = parse_invocation(&args, &mut config)?;
//!
//! let mut session = Session::new(Env::new(config));
//! session.load()?;
//!
//! let outcome = match invocation.command {
//!     Command::Add => commands::add::add(&mut session, &invocation.modifications)?,
//!     Command::Done => commands::done::done(
//!         &mut session,
//!         &invocation.filter,
//!         invocation.filter_was_empty,
//!         false,
//!     )?,
//!     _ => Default::default(),
//! };
//! session.commit()?;
//! for line in &outcome.feedback {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

// Re-export main types for convenience
pub use config::{Configuration, ConfigurationBuilder, UdaType};
pub use context::{Env, Session};
pub use date::{DateParser, DateParsing, DateSynonym};
pub use duration::Duration;
pub use error::{
    ConfigError, DateError, ParseError, QueryError, StorageError, TaskError, ValidationError,
};
pub use expr::{EvalContext, Filter, Modifier, Selector};
pub use nibbler::Nibbler;
pub use storage::TaskDb;
pub use task::{Annotation, AttributeValue, Priority, Recurrence, Task, TaskStatus};
pub use urgency::UrgencySnapshot;

// Module declarations
pub mod commands;
pub mod config;
pub mod context;
pub mod date;
pub mod deps;
pub mod duration;
pub mod error;
pub mod expr;
pub mod io;
pub mod nibbler;
pub mod storage;
pub mod task;
pub mod urgency;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
