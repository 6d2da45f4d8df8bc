// Submodules for separation of concerns
mod eval;
mod parse;
mod types;
mod update;

// Public API re-exports
pub use eval::{get_path, matches, values_equal};
pub use parse::{parse_patch_json, parse_query_json};
pub(crate) use parse::upsert_seed;
pub use types::{Modifiers, Patch, Query, RemoveOptions, UpdateOptions};
pub use update::apply_patch;
