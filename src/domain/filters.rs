use super::validator::{permitted_value, Validator};
use serde::Serialize;

/// Paging and ordering requested by a list endpoint.
#[derive(Debug, Clone)]
pub struct Filters {
    // ---
    pub page: u32,
    pub page_size: u32,
    /// Column name, optionally prefixed with `-` for descending order.
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    // ---
    /// The column to order by. Falls back to `id` for anything outside the safelist.
    pub fn sort_column(&self) -> &str {
        // ---
        if permitted_value(&self.sort.as_str(), self.sort_safelist) {
            self.sort.trim_start_matches('-')
        } else {
            "id"
        }
    }

    pub fn sort_descending(&self) -> bool {
        // ---
        self.sort.starts_with('-')
    }

    pub fn limit(&self) -> i64 {
        // ---
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        // ---
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}

pub fn validate_filters(v: &mut Validator, f: &Filters) {
    // ---
    v.check(f.page > 0, "page", "must be greater than zero");
    v.check(f.page <= 10_000_000, "page", "must be a maximum of 10 million");
    v.check(f.page_size > 0, "page_size", "must be greater than zero");
    v.check(f.page_size <= 100, "page_size", "must be a maximum of 100");
    v.check(
        permitted_value(&f.sort.as_str(), f.sort_safelist),
        "sort",
        "invalid sort value",
    );
}

/// Paging summary returned next to a list; empty when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    // ---
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: u32,
    #[serde(skip_serializing_if = "is_zero_total")]
    pub total_records: u64,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn is_zero_total(value: &u64) -> bool {
    *value == 0
}

impl Metadata {
    // ---
    pub fn calculate(total_records: u64, page: u32, page_size: u32) -> Self {
        // ---
        if total_records == 0 || page_size == 0 {
            return Self::default();
        }

        let last_page = total_records.div_ceil(u64::from(page_size));

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
            total_records,
        }
    }
}
