use std::collections::BTreeMap;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Nutrient name (e.g. `calories`, `fatContent`) to its text value with unit
/// (e.g. `"389 kcal"`). Values are kept opaque.
pub type Nutrients = BTreeMap<String, serde_json::Value>;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub title: Option<String>,
    pub cuisine: Option<String>,
    pub rating: Option<f64>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub total_time: Option<i64>,
    pub description: Option<String>,
    pub nutrients: Nutrients,
    pub serves: Option<String>,
}

/// A cleaned record ready to be written. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewRecipe {
    pub cuisine: Option<String>,
    pub title: Option<String>,
    pub rating: Option<f64>,
    pub prep_time: Option<i64>,
    pub cook_time: Option<i64>,
    pub total_time: Option<i64>,
    pub description: Option<String>,
    /// Serialized JSON object; `"{}"` when the source had none.
    pub nutrients: String,
    pub serves: Option<String>,
}

/// One page of the listing, with the unfiltered total row count.
#[derive(Debug, Clone, Serialize)]
pub struct RecipePage {
    pub page: u64,
    pub limit: u64,
    pub total: i64,
    pub data: Vec<Recipe>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Pagination {
    /// Both `page` and `limit` must be at least 1. `limit` has no upper bound.
    pub fn new(page: u64, limit: u64) -> Result<Self> {
        if page < 1 {
            bail!("page must be at least 1, got {page}");
        }
        if limit < 1 {
            bail!("limit must be at least 1, got {limit}");
        }
        Ok(Pagination { page, limit })
    }

    /// Zero-based row offset of the first row on this page, clamped to what
    /// SQLite can bind.
    #[must_use]
    pub fn offset(&self) -> i64 {
        clamp_i64(self.page.saturating_sub(1).saturating_mul(self.limit))
    }

    /// Row limit as bound in SQL, clamped to `i64::MAX`.
    #[must_use]
    pub fn sql_limit(&self) -> i64 {
        clamp_i64(self.limit)
    }
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub recipes_imported: i64,
    pub missing_ratings: i64,
}
