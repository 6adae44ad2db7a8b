use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl PageQuery {
    pub fn page(&self) -> usize {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn limit(&self) -> usize {
        self.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub count: usize,
    pub pages: usize,
    pub page: usize,
    pub result: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty(query: &PageQuery) -> Self {
        Self {
            count: 0,
            pages: 0,
            page: query.page(),
            result: Vec::new(),
        }
    }
}

/// Slices an in-memory list into the requested page.
pub fn paginate<T>(items: Vec<T>, query: &PageQuery) -> Page<T> {
    let count = items.len();
    let limit = query.limit();
    let page = query.page();
    let pages = count.div_ceil(limit);

    let result = items
        .into_iter()
        .skip(page.saturating_sub(1).saturating_mul(limit))
        .take(limit)
        .collect();

    Page { count, pages, page, result }
}
