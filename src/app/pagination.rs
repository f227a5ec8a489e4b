use serde::Serialize;

/// Page metadata computed from a total row count. Pages are 1-based; an
/// out-of-range page is not an error, it just pairs empty items with this
/// metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub count: i64,
    pub current_page: i64,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
    pub last_page: i64,
}

pub fn paginate_meta(total: i64, page: i64, limit: i64) -> PageMeta {
    let last_page = if limit > 0 {
        (total + limit - 1) / limit
    } else {
        0
    };
    let next_page = if page + 1 > last_page {
        None
    } else {
        Some(page + 1)
    };
    let prev_page = if page - 1 < 1 { None } else { Some(page - 1) };

    PageMeta {
        count: total,
        current_page: page,
        next_page,
        prev_page,
        last_page,
    }
}

/// Transport shape of every list endpoint:
/// `{ items, count, currentPage, nextPage, prevPage, lastPage }`.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        Self {
            items,
            meta: paginate_meta(total, page, limit),
        }
    }
}

/// SQL OFFSET for a 1-based page.
pub fn offset(page: i64, limit: i64) -> i64 {
    (page - 1).max(0) * limit
}
