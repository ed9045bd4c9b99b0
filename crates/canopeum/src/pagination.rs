//! Page-number pagination with `count`/`next`/`previous`/`results` envelopes.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 5;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Requested page, 1-based. Missing or out-of-range values are clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageRequest {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn size(&self) -> u32 {
        self.size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * self.limit()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Wrap one page of `results` out of `count` total rows.
    ///
    /// `base_url` is the absolute endpoint URL; `filters` are extra query
    /// parameters carried over to the `next`/`previous` links.
    pub fn new(
        request: PageRequest,
        count: i64,
        results: Vec<T>,
        base_url: &str,
        filters: &[(&str, String)],
    ) -> Self {
        let page = request.page();
        let size = request.size();
        let link = |target: u32| page_url(base_url, filters, target, size);

        let has_next = i64::from(page) * i64::from(size) < count;
        Page {
            count,
            next: has_next.then(|| link(page + 1)),
            previous: (page > 1).then(|| link(page - 1)),
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

fn page_url(base_url: &str, filters: &[(&str, String)], page: u32, size: u32) -> String {
    let mut url = String::from(base_url);
    let mut separator = if base_url.contains('?') { '&' } else { '?' };
    for (name, value) in filters {
        url.push(separator);
        url.push_str(name);
        url.push('=');
        url.push_str(value);
        separator = '&';
    }
    url.push(separator);
    url.push_str(&format!("page={page}&size={size}"));
    url
}
