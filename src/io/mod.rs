//! Import and export
//!
//! F4-line import (stdin or file) and JSON/F4 export for external
//! renderers and the sync collaborator.

pub mod export;
pub mod import;

// Re-export main functionality
pub use export::{export_f4, export_json, write_json};
pub use import::{import_from_file, import_from_reader, ImportResult};
