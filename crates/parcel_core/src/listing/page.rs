//! Page requests and length-aware result pages.

use crate::config::ListingConfig;
use serde::Serialize;
use std::collections::BTreeMap;

/// How a listing selects its window of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    /// 1-based page number; totals and link parameters are reported.
    Number { page: u32, per_page: u32 },
    /// Raw row offset for infinite-scroll style fetching.
    Offset { offset: u64, limit: u32 },
}

impl PageRequest {
    /// Maps the `(page_size, offset_or_number, uses_direct_offset)` triple
    /// used by request handlers.
    pub fn new(page_size: u32, offset_or_number: u64, uses_direct_offset: bool) -> Self {
        if uses_direct_offset {
            Self::Offset {
                offset: offset_or_number,
                limit: page_size,
            }
        } else {
            Self::Number {
                page: u32::try_from(offset_or_number).unwrap_or(u32::MAX),
                per_page: page_size,
            }
        }
    }

    pub fn page(page: u32, per_page: u32) -> Self {
        Self::Number { page, per_page }
    }

    pub fn offset(offset: u64, limit: u32) -> Self {
        Self::Offset { offset, limit }
    }

    /// First page at the configured default size.
    pub fn first(config: &ListingConfig) -> Self {
        Self::page(1, config.default_page_size)
    }

    pub(crate) fn resolve(&self, config: &ListingConfig) -> PageWindow {
        match *self {
            Self::Number { page, per_page } => {
                let limit = config.normalize_page_size(per_page);
                let page = page.max(1);
                PageWindow {
                    limit,
                    offset: u64::from(page - 1) * u64::from(limit),
                    current_page: page,
                    echo_query: true,
                }
            }
            Self::Offset { offset, limit } => {
                let limit = config.normalize_page_size(limit);
                let page = offset / u64::from(limit.max(1)) + 1;
                PageWindow {
                    limit,
                    offset,
                    current_page: u32::try_from(page).unwrap_or(u32::MAX),
                    echo_query: false,
                }
            }
        }
    }
}

/// Resolved `LIMIT`/`OFFSET` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageWindow {
    pub limit: u32,
    pub offset: u64,
    pub current_page: u32,
    pub echo_query: bool,
}

/// One page of listing results with totals over the filtered set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of rows matching the filters, across all pages.
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
    pub last_page: u32,
    /// Row offset of the first item.
    pub offset: u64,
    /// Parameters appended to page links so filters survive paging.
    pub query: BTreeMap<String, String>,
}

impl<T> Page<T> {
    pub(crate) fn new(
        items: Vec<T>,
        total: u64,
        window: PageWindow,
        query: BTreeMap<String, String>,
    ) -> Self {
        let per_page = window.limit.max(1);
        let pages = total.div_ceil(u64::from(per_page)).max(1);
        Self {
            items,
            total,
            per_page,
            current_page: window.current_page,
            last_page: u32::try_from(pages).unwrap_or(u32::MAX),
            offset: window.offset,
            query: if window.echo_query {
                query
            } else {
                BTreeMap::new()
            },
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more_pages(&self) -> bool {
        self.offset + (self.items.len() as u64) < self.total
    }

    /// 1-based position of the first item, `None` for an empty page.
    pub fn first_item(&self) -> Option<u64> {
        (!self.items.is_empty()).then_some(self.offset + 1)
    }

    /// 1-based position of the last item, `None` for an empty page.
    pub fn last_item(&self) -> Option<u64> {
        (!self.items.is_empty()).then_some(self.offset + self.items.len() as u64)
    }

    /// Percent-encoded query string for `page`, including the echoed
    /// filter parameters, e.g. `page=2&query=is_active&search=red%20car`.
    pub fn page_url_query(&self, page: u32) -> String {
        let mut pairs = vec![format!("page={page}")];
        pairs.extend(self.query.iter().map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        }));
        pairs.join("&")
    }

    pub fn next_page_query(&self) -> Option<String> {
        self.has_more_pages()
            .then(|| self.page_url_query(self.current_page.saturating_add(1)))
    }

    pub fn previous_page_query(&self) -> Option<String> {
        (self.current_page > 1).then(|| self.page_url_query(self.current_page - 1))
    }

    /// Converts items while keeping pagination metadata.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
            offset: self.offset,
            query: self.query,
        }
    }
}
