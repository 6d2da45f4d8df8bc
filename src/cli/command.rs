/// One CLI operation, decoupled from argument parsing so it can be driven from tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open (creating and seeding as needed) and report the store's state.
    Init,
    Get {
        collection: String,
        query_json: String,
    },
    GetOne {
        collection: String,
        query_json: String,
    },
    Insert {
        collection: String,
        json: String,
    },
    Update {
        collection: String,
        query_json: String,
        patch_json: String,
        multi: bool,
        upsert: bool,
    },
    Remove {
        collection: String,
        query_json: String,
        multi: bool,
    },
    Count {
        collection: String,
        query_json: String,
    },
    Recover {
        dataset: String,
    },
    Clean,
    Compact,
    CacheGet {
        key: String,
    },
    CacheSet {
        key: String,
        value: String,
    },
    CacheRemove {
        key: String,
    },
    CacheList,
}
