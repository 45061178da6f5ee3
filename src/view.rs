//! Filtered, searched and paginated projection of a store's list.

use serde::Serialize;
use tracing::debug;

use crate::entity::{Choice, Entity, EntityFields};

pub const DEFAULT_PAGE_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter<S> {
    All,
    Only(S),
}

impl<S: Choice> StatusFilter<S> {
    /// `"all"` and anything unrecognized select every status.
    pub fn parse(value: &str) -> Self {
        match S::parse(value) {
            Some(status) => Self::Only(status),
            None => Self::All,
        }
    }

    pub fn admits(&self, status: S) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => *wanted == status,
        }
    }
}

/// One page of matches. `total_count` counts every match, not just `items`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", bound = "F: EntityFields")]
pub struct Page<'a, F: EntityFields> {
    pub items: Vec<&'a Entity<F>>,
    pub page: usize,
    pub page_size: Option<usize>,
    pub total_count: usize,
    pub total_pages: usize,
}

impl<F: EntityFields> Page<'_, F> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

#[derive(Debug, Clone)]
pub struct FilterView<F: EntityFields> {
    filter: StatusFilter<F::Status>,
    query: String,
    page: usize,
    page_size: Option<usize>,
}

impl<F: EntityFields> Default for FilterView<F> {
    fn default() -> Self {
        Self {
            filter: StatusFilter::All,
            query: String::new(),
            page: 1,
            page_size: Some(DEFAULT_PAGE_SIZE),
        }
    }
}

impl<F: EntityFields> FilterView<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&self) -> StatusFilter<F::Status> {
        self.filter
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    /// Accepts a status name or `"all"`.
    pub fn set_filter(&mut self, value: &str) {
        let filter = StatusFilter::parse(value);
        if filter == StatusFilter::All && !value.trim().eq_ignore_ascii_case("all") {
            debug!(
                target: "rentala",
                event = "unknown_status_filter",
                kind = F::KIND,
                value
            );
        }
        self.set_status(filter);
    }

    pub fn set_status(&mut self, filter: StatusFilter<F::Status>) {
        self.filter = filter;
        self.page = 1;
    }

    pub fn set_query(&mut self, text: &str) {
        self.query = text.trim().to_lowercase();
        self.page = 1;
    }

    pub fn clear_query(&mut self) {
        self.set_query("");
    }

    /// Requested page; clamped against the match count at compute time.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn next_page(&mut self, current: &Page<'_, F>) {
        if current.has_next() {
            self.page = current.page + 1;
        }
    }

    pub fn prev_page(&mut self, current: &Page<'_, F>) {
        if current.has_prev() {
            self.page = current.page - 1;
        }
    }

    /// `None` shows every match on one page. A size of zero is treated as
    /// `None`.
    pub fn set_page_size(&mut self, size: Option<usize>) {
        self.page_size = size.filter(|&n| n > 0);
        self.page = 1;
    }

    pub fn compute<'a>(&self, entities: &'a [Entity<F>]) -> Page<'a, F> {
        let matches: Vec<&'a Entity<F>> = entities
            .iter()
            .filter(|entity| self.filter.admits(entity.status()))
            .filter(|entity| entity.matches_lowercase(&self.query))
            .collect();

        let total_count = matches.len();
        let Some(size) = self.page_size else {
            return Page {
                items: matches,
                page: 1,
                page_size: None,
                total_count,
                total_pages: 1,
            };
        };

        let total_pages = total_count.div_ceil(size).max(1);
        let page = self.page.clamp(1, total_pages);
        let items = matches
            .into_iter()
            .skip((page - 1) * size)
            .take(size)
            .collect();
        Page {
            items,
            page,
            page_size: Some(size),
            total_count,
            total_pages,
        }
    }
}
