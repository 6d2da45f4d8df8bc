use crate::collection::Collection;
use crate::errors::DbError;
use crate::query::Query;
use crate::types::Document;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

/// Whether first-run seeding must be skipped, and until when.
///
/// Passed explicitly into [`super::Registry::open`]; the expiry is checked at
/// call time, so a stale value simply stops applying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkipSeed {
    #[default]
    No,
    Until(DateTime<Utc>),
}

impl SkipSeed {
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            SkipSeed::No => false,
            SkipSeed::Until(t) => now < *t,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }
}

pub const EXPENSE_CATEGORIES: &[&str] = &[
    "Rent",
    "Utilities",
    "Salaries",
    "Transport",
    "Office Supplies",
    "Repairs & Maintenance",
    "Marketing",
    "Bank Charges",
    "Taxes",
    "Miscellaneous",
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    /// Collections that received seed documents.
    pub seeded: Vec<String>,
    /// Seeding was suppressed by an active [`SkipSeed`].
    pub skipped: bool,
}

fn opening_row() -> Document {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    let v = json!({
        "date": today,
        "description": "Opening Balance",
        "debit": 0,
        "credit": 0,
        "balance": 0,
    });
    match v {
        Value::Object(m) => m,
        _ => Document::new(),
    }
}

fn category(name: &str) -> Document {
    let mut d = Document::new();
    d.insert("name".into(), Value::String(name.to_string()));
    d.insert("isDefault".into(), Value::Bool(true));
    d
}

/// Seed `col` with `rows` only if it is empty. Returns whether anything was inserted.
pub(crate) fn seed_if_empty(col: &Collection, rows: Vec<Document>) -> Result<bool, DbError> {
    if col.count(&Query::all()) != 0 {
        return Ok(false);
    }
    for row in rows {
        col.insert(row)?;
    }
    log::info!("seeded collection {}", col.name());
    Ok(true)
}

/// Default rows for a collection name; empty for collections that are never seeded.
pub(crate) fn seed_rows(name: &str) -> Vec<Document> {
    match name {
        "cashLedger" | "bankLedger" => vec![opening_row()],
        "expenseCategories" => EXPENSE_CATEGORIES.iter().map(|c| category(c)).collect(),
        _ => Vec::new(),
    }
}
