//! Contact picker paging.
//!
//! Stateless: callers re-fetch the full list on every request, so the rows on
//! a given page can shift if the underlying list changed in between.

/// One window over an ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub page_index: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Index of the first row within the full list.
    pub fn offset(&self, page_size: usize) -> usize {
        self.page_index * page_size.max(1)
    }
}

/// Slice `items` into page `page_index` of `page_size` rows (`page_size` of 0
/// is treated as 1). Past-the-end pages are empty with `has_prev` set.
pub fn page<T: Clone>(items: &[T], page_size: usize, page_index: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let start = page_index.saturating_mul(page_size);
    let end = start.saturating_add(page_size);
    let rows = items
        .get(start.min(items.len())..end.min(items.len()))
        .map(<[T]>::to_vec)
        .unwrap_or_default();

    Page {
        rows,
        page_index,
        has_prev: page_index > 0,
        has_next: end < items.len(),
    }
}
