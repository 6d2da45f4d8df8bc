mod core;
mod datafile;
mod docset;

pub use self::core::{Collection, CollectionOptions};
pub use self::datafile::LoadStats;
