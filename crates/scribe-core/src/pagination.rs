//! Page-number pagination over newest-first listings.
//!
//! Page numbers are 1-based and always resolve to a page that exists: a missing
//! or malformed number means the first page, and out-of-range numbers are
//! clamped to the nearest valid page instead of failing.

use serde::Serialize;

/// Default number of posts on a page.
pub const DEFAULT_PER_PAGE: u64 = 10;

/// A requested page, before the size of the collection is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    number: i64,
    per_page: u64,
}

/// Concrete slice of a collection resolved from a [`PageRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u64,
    pub num_pages: u64,
    pub offset: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(number: i64, per_page: u64) -> Self {
        Self {
            number,
            per_page: per_page.max(1),
        }
    }

    /// First page of `per_page` items.
    pub fn first(per_page: u64) -> Self {
        Self::new(1, per_page)
    }

    /// Parse the raw `page` query parameter; anything that is not an integer
    /// means the first page.
    pub fn parse(raw: Option<&str>, per_page: u64) -> Self {
        let number = raw.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(1);
        Self::new(number, per_page)
    }

    /// The number as requested, before clamping.
    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn per_page(&self) -> u64 {
        self.per_page
    }

    /// Resolve against a collection of `total` items.
    pub fn window(&self, total: u64) -> PageWindow {
        let num_pages = total.div_ceil(self.per_page).max(1);
        let number = u64::try_from(self.number).unwrap_or(1).clamp(1, num_pages);

        PageWindow {
            number,
            num_pages,
            offset: (number - 1) * self.per_page,
            limit: self.per_page,
        }
    }

    /// Cut a page out of an already ordered in-memory collection.
    pub fn slice<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        let window = self.window(total);
        let items = items
            .into_iter()
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect();

        Page::new(items, window, total)
    }
}

/// One page of results plus the metadata needed to navigate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u64,
    pub num_pages: u64,
    pub total: u64,
    pub per_page: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total: u64) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total,
            per_page: window.limit,
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
            per_page: self.per_page,
        }
    }
}
