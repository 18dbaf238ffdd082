use serde::Serialize;

use crate::api::job::{SortOrder, WorkLocation};

/// Page size used by the marketplace's listing screens
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Category value the UI uses for "every category"
const ALL_CATEGORIES: &str = "all";

/// A change to one of the listing filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Search(String),
    Category(Option<String>),
    Location(Option<WorkLocation>),
}

impl Filter {
    /// Category filter from raw UI input; `""` and `"all"` mean no filter
    pub fn category(value: &str) -> Self {
        Filter::Category(Some(value.to_string()))
    }
}

/// Everything that determines which page of listings is requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    search: String,
    category: Option<String>,
    location: Option<WorkLocation>,
    sort: SortOrder,
    page: u32,
    page_size: u32,
}

impl QueryState {
    pub fn new(page_size: u32) -> Self {
        Self {
            search: String::new(),
            category: None,
            location: None,
            sort: SortOrder::default(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    /// Start from a filter other than the defaults
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.apply(filter);
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.set_sort(sort);
        self
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn location(&self) -> Option<WorkLocation> {
        self.location
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn has_filters(&self) -> bool {
        !self.search.trim().is_empty() || self.category.is_some() || self.location.is_some()
    }

    pub(crate) fn apply(&mut self, filter: Filter) {
        match filter {
            Filter::Search(term) => self.search = term,
            Filter::Category(category) => {
                self.category = category
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(ALL_CATEGORIES));
            }
            Filter::Location(location) => self.location = location,
        }
        self.page = 1;
    }

    pub(crate) fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
        self.page = 1;
    }

    /// Reset search, category and location; sort order is kept
    pub(crate) fn clear_filters(&mut self) {
        self.search.clear();
        self.category = None;
        self.location = None;
        self.page = 1;
    }

    pub(crate) fn rewind(&mut self) {
        self.page = 1;
    }

    pub(crate) fn advance(&mut self) {
        self.page += 1;
    }

    pub(crate) fn step_back(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    /// Request parameters for the current page
    pub fn to_request(&self) -> PageRequest {
        let search = self.search.trim();
        PageRequest {
            page: self.page,
            limit: self.page_size,
            sort: self.sort,
            search: (!search.is_empty()).then(|| search.to_string()),
            category: self.category.clone(),
            location: self.location,
        }
    }
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// Query string for `GET /jobs`
///
/// Filters at their default value are absent rather than empty; the backend
/// treats `category=` differently from no `category` at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
    pub sort: SortOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<WorkLocation>,
}
