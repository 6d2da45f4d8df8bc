//! Canonical names and legacy aliases for each logical dataset.
//!
//! This table is the only place alias names appear. Only the fallback read path
//! and the reset path consult it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dataset {
    pub name: &'static str,
    /// Collection the primary read path uses.
    pub canonical: &'static str,
    /// Secondary cache keys to try, in order.
    pub cache_keys: &'static [&'static str],
    /// Legacy collection names read directly when everything else is empty.
    pub alternate_collections: &'static [&'static str],
    /// Cache keys of critical datasets are re-verified after a reset.
    pub critical: bool,
}

pub const DATASETS: &[Dataset] = &[
    Dataset {
        name: "payables",
        canonical: "tradePayable",
        cache_keys: &["payables", "tradePayable", "trade_payable"],
        alternate_collections: &["payables", "trade_payable"],
        critical: true,
    },
    Dataset {
        name: "receivables",
        canonical: "tradeReceivable",
        cache_keys: &["receivables", "tradeReceivable", "trade_receivable"],
        alternate_collections: &["receivables", "trade_receivable"],
        critical: true,
    },
    Dataset {
        name: "cashLedger",
        canonical: "cashLedger",
        cache_keys: &["cashLedger", "cash_ledger"],
        alternate_collections: &["cash_ledger"],
        critical: true,
    },
    Dataset {
        name: "bankLedger",
        canonical: "bankLedger",
        cache_keys: &["bankLedger", "bank_ledger"],
        alternate_collections: &["bank_ledger"],
        critical: true,
    },
    Dataset {
        name: "customers",
        canonical: "customers",
        cache_keys: &["customers"],
        alternate_collections: &[],
        critical: false,
    },
    Dataset {
        name: "stock",
        canonical: "stock",
        cache_keys: &["stock", "inventory"],
        alternate_collections: &["inventory"],
        critical: false,
    },
    Dataset {
        name: "bills",
        canonical: "bills",
        cache_keys: &["bills", "invoices"],
        alternate_collections: &["invoices"],
        critical: false,
    },
    Dataset {
        name: "payments",
        canonical: "payments",
        cache_keys: &["payments"],
        alternate_collections: &[],
        critical: false,
    },
    Dataset {
        name: "purchases",
        canonical: "purchases",
        cache_keys: &["purchases"],
        alternate_collections: &[],
        critical: false,
    },
    Dataset {
        name: "receipts",
        canonical: "receipts",
        cache_keys: &["receipts"],
        alternate_collections: &[],
        critical: false,
    },
    Dataset {
        name: "expenses",
        canonical: "expenses",
        cache_keys: &["expenses"],
        alternate_collections: &[],
        critical: false,
    },
    Dataset {
        name: "expenseCategories",
        canonical: "expenseCategories",
        cache_keys: &["expenseCategories", "expense_categories"],
        alternate_collections: &["expense_categories"],
        critical: false,
    },
];

/// Look up a dataset by its name, canonical collection, or any alias.
#[must_use]
pub fn dataset(name: &str) -> Option<&'static Dataset> {
    DATASETS.iter().find(|d| d.name == name).or_else(|| {
        DATASETS.iter().find(|d| {
            d.canonical == name
                || d.cache_keys.contains(&name)
                || d.alternate_collections.contains(&name)
        })
    })
}

/// Cache keys re-verified after a reset.
pub fn critical_keys() -> impl Iterator<Item = &'static str> {
    DATASETS.iter().filter(|d| d.critical).flat_map(|d| d.cache_keys.iter().copied())
}
