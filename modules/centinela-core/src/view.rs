//! Pure derivation of the visible subset and page slice.
//!
//! `derive_view` is the only way list surfaces see the collection. It never
//! mutates its input and yields identical output for identical input, so
//! callers may re-run it freely to decide whether a redraw is needed.

use crate::types::Incident;

pub const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub search: String,
    pub category: Option<String>,
    pub status: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: None,
            status: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct View<'a> {
    pub page_items: Vec<&'a Incident>,
    pub total_matching: usize,
    pub total_pages: usize,
    /// Effective page after clamping; may differ from the requested one.
    pub page: usize,
}

/// Full matching subset in collection order, before pagination. The map
/// layer draws from this; the list draws from the page slice.
pub fn matching<'a>(all: &'a [Incident], filters: &FilterState) -> Vec<&'a Incident> {
    all.iter().filter(|i| matches(i, filters)).collect()
}

pub fn derive_view<'a>(all: &'a [Incident], filters: &FilterState) -> View<'a> {
    let matched = matching(all, filters);
    let total_matching = matched.len();
    let page_size = filters.page_size.max(1);
    let total_pages = (total_matching + page_size - 1) / page_size;

    // A page past the end (stale after a filter change) clamps back to 1
    // so the caller is never stranded on an empty page while matches exist.
    let page = if filters.page == 0 || filters.page > total_pages {
        1
    } else {
        filters.page
    };

    let page_items = matched
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    View {
        page_items,
        total_matching,
        total_pages,
        page,
    }
}

fn matches(incident: &Incident, filters: &FilterState) -> bool {
    if let Some(category) = filters.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        let own = incident.category.as_deref().unwrap_or("");
        if !own.eq_ignore_ascii_case(category) {
            return false;
        }
    }

    if let Some(status) = filters.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        if !incident.status.label().eq_ignore_ascii_case(status) {
            return false;
        }
    }

    let term = filters.search.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    incident.id.to_string().contains(&term)
        || incident.description.to_lowercase().contains(&term)
        || incident
            .author
            .display_name()
            .to_lowercase()
            .contains(&term)
}

/// Distinct category values present in the collection, sorted. Feeds filter
/// dropdowns and the console summary.
pub fn distinct_categories(all: &[Incident]) -> Vec<String> {
    let mut seen: Vec<String> = all
        .iter()
        .filter_map(|i| i.category.clone())
        .filter(|c| !c.trim().is_empty())
        .collect();
    seen.sort();
    seen.dedup();
    seen
}

pub fn distinct_status_labels(all: &[Incident]) -> Vec<String> {
    let mut seen: Vec<String> = all.iter().map(|i| i.status.label().to_string()).collect();
    seen.sort();
    seen.dedup();
    seen
}

// ===========================================================================
// Tests
// ===========================================================================
