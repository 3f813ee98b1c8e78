use serde::Serialize;

use super::options::QueryOptions;

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// A request for one page of a listing.
///
/// `options.limit` and `options.start_after` are ignored: the page window is
/// derived from `page` and `page_size`.
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// 1-based page number. Out-of-range values are clamped.
    pub page: u64,
    pub page_size: u64,
    pub options: QueryOptions,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            options: QueryOptions::default(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// The page actually returned, after clamping.
    pub page: u64,
    pub page_size: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl PageInfo {
    /// Computes the page count for `total_items` and clamps `requested` to
    /// `[1, max(total_pages, 1)]`.
    pub fn resolve(requested: u64, page_size: u64, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(page_size);
        Self {
            page: requested.clamp(1, total_pages.max(1)),
            page_size,
            total_items,
            total_pages,
        }
    }

    /// Rows preceding this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.page_size
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_clamps_to_available_pages() {
        let info = PageInfo::resolve(7, 10, 25);
        assert_eq!(info.total_pages, 3);
        assert_eq!(info.page, 3);
        assert_eq!(info.offset(), 20);

        let info = PageInfo::resolve(0, 10, 25);
        assert_eq!(info.page, 1);
        assert_eq!(info.offset(), 0);
    }

    #[test]
    fn resolve_empty_listing_is_page_one_of_zero() {
        let info = PageInfo::resolve(4, 10, 0);
        assert_eq!(info.total_pages, 0);
        assert_eq!(info.page, 1);
    }
}
