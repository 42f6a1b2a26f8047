//! In-memory list filtering and pagination shared by every list endpoint.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_with::{NoneAsEmptyString, serde_as};
use ts_rs::TS;

pub const DEFAULT_PER_PAGE: u32 = 25;
pub const MAX_PER_PAGE: u32 = 200;

/// Rows that can be narrowed by a [`ListFilter`].
pub trait Searchable {
    /// Free-text fields matched by the search box.
    fn search_text(&self) -> Vec<&str>;

    /// Serialized status, compared verbatim with the status filter.
    fn status_key(&self) -> Option<String> {
        None
    }

    /// Date used by the `from`/`to` range.
    fn date_key(&self) -> Option<NaiveDate> {
        None
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct ListFilter {
    #[serde_as(as = "NoneAsEmptyString")]
    #[ts(type = "string | null")]
    pub search: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[ts(type = "string | null")]
    pub status: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[ts(type = "string | null")]
    pub from: Option<NaiveDate>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[ts(type = "string | null")]
    pub to: Option<NaiveDate>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[ts(type = "number | null")]
    pub page: Option<u32>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[ts(type = "number | null")]
    pub per_page: Option<u32>,
}

/// Lowercases and strips the Spanish diacritics so "ampliación" matches "ampliacion".
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

impl ListFilter {
    pub fn matches<T: Searchable>(&self, item: &T) -> bool {
        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = fold(needle);
            if !item
                .search_text()
                .iter()
                .any(|field| fold(field).contains(&needle))
            {
                return false;
            }
        }

        if let Some(status) = &self.status {
            if item.status_key().as_deref() != Some(status.as_str()) {
                return false;
            }
        }

        if self.from.is_some() || self.to.is_some() {
            let Some(date) = item.date_key() else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) {
                return false;
            }
            if self.to.is_some_and(|to| date > to) {
                return false;
            }
        }

        true
    }

    pub fn apply<T: Searchable>(&self, items: Vec<T>) -> Vec<T> {
        items.into_iter().filter(|item| self.matches(item)).collect()
    }

    /// Filters, then slices the requested page.
    pub fn apply_paged<T: Searchable>(&self, items: Vec<T>) -> Page<T> {
        paginate(
            self.apply(items),
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}

/// Pages are 1-based; `per_page` is clamped to `1..=MAX_PER_PAGE`.
pub fn paginate<T>(items: Vec<T>, page: u32, per_page: u32) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, MAX_PER_PAGE);
    let total = items.len();
    let start = ((page - 1) as usize).saturating_mul(per_page as usize);

    let items = items
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();

    Page {
        items,
        total,
        page,
        per_page,
    }
}
