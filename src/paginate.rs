use serde::Serialize;

/// Offset/limit window over an ordered result set, with enough metadata to
/// render navigation links. Page numbers are 1-based.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub prev: Option<u32>,
    pub next: Option<u32>,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32, total_items: u64) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total_pages = u32::try_from(total_items.div_ceil(u64::from(per_page)))
            .unwrap_or(u32::MAX)
            .max(1);

        Self {
            page,
            per_page,
            total_items,
            total_pages,
            prev: (page > 1).then(|| (page - 1).min(total_pages)),
            next: (page < total_pages).then(|| page + 1),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn is_past_end(&self) -> bool {
        self.page > self.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_of_twenty_five() {
        let pagination = Pagination::new(1, 10, 25);
        assert_eq!(pagination.total_pages, 3);
        assert_eq!(pagination.offset(), 0);
        assert_eq!(pagination.limit(), 10);
        assert_eq!(pagination.prev, None);
        assert_eq!(pagination.next, Some(2));
    }

    #[test]
    fn last_page_is_partial() {
        let pagination = Pagination::new(3, 10, 25);
        assert_eq!(pagination.offset(), 20);
        assert_eq!(pagination.prev, Some(2));
        assert_eq!(pagination.next, None);
        assert!(!pagination.is_past_end());
    }

    #[test]
    fn past_the_end_links_back_to_last_page() {
        let pagination = Pagination::new(7, 10, 25);
        assert!(pagination.is_past_end());
        assert_eq!(pagination.offset(), 60);
        assert_eq!(pagination.prev, Some(3));
        assert_eq!(pagination.next, None);
    }

    #[test]
    fn page_zero_is_clamped() {
        let pagination = Pagination::new(0, 10, 25);
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.offset(), 0);
    }

    #[test]
    fn empty_set_has_one_page() {
        let pagination = Pagination::new(1, 10, 0);
        assert_eq!(pagination.total_pages, 1);
        assert_eq!(pagination.next, None);
        assert!(!pagination.is_past_end());
    }
}
