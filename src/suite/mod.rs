//! Suite definitions
//!
//! The input tree (Spec → Test → Context → Step) and its loader.

mod loader;
mod model;

pub use loader::{load_file, parse_str, prepare, Format};
pub use model::*;
