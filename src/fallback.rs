//! Recovery paths layered over the primary store: alias-aware fallback reads,
//! the "just cleaned" marker, and the destructive reset.

pub mod aliases;
mod marker;
mod reader;
mod reset;

pub use aliases::{DATASETS, Dataset};
pub use marker::{CleanMarker, FORCE_RELOAD_KEY, JUST_CLEANED_KEY};
pub use reader::{
    AlternateCollectionReader, CacheReader, DatasetReader, PrimaryReader, Recovered,
    RecoveringReader, Source, parse_cache_entry,
};
pub use reset::{EMPTY_ENTRY, ResetFailure, ResetReport, ResetStep, Resetter};
