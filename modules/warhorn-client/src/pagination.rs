//! Cursor pagination over Relay-style connections.
//!
//! Pages are pulled one at a time so callers can await their own work (writing
//! output, walking a nested traversal) between pages without buffering the
//! whole result set.

use std::fmt;
use std::future::Future;

use tracing::{debug, warn};

use crate::error::Result;
use crate::types::Connection;

/// Opaque continuation token returned by the server. Never parsed or built locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    /// An empty token means "no cursor", so it yields `None`.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Largest number of nodes the server puts in one page.
///
/// A page shorter than this is taken to be the last one and no further query
/// is issued. If Warhorn ever lowers its page size without this being updated,
/// traversals will stop after the first page and silently under-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(usize);

impl PageSize {
    pub const DEFAULT: PageSize = PageSize(100);

    /// Zero is rejected: every non-empty page would look like a full one.
    pub fn new(size: usize) -> Option<Self> {
        (size > 0).then_some(Self(size))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One page of nodes and the cursor that continues after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub nodes: Vec<T>,
    pub end_cursor: Option<Cursor>,
}

impl<T> From<Connection<T>> for Page<T> {
    fn from(conn: Connection<T>) -> Self {
        Self {
            nodes: conn.nodes,
            end_cursor: Cursor::new(conn.page_info.end_cursor),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationStats {
    /// Queries issued, including a trailing empty one.
    pub queries: usize,
    /// Nodes handed to the caller.
    pub nodes: usize,
}

/// Walks a cursor-paginated result set from the start, once.
///
/// Stops when a page comes back empty, when it is shorter than the page size,
/// or when a full page carries no cursor to continue from.
#[derive(Debug)]
pub struct CursorPaginator {
    page_size: PageSize,
    cursor: Option<Cursor>,
    finished: bool,
    stats: PaginationStats,
}

impl CursorPaginator {
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            cursor: None,
            finished: false,
            stats: PaginationStats::default(),
        }
    }

    /// Fetch the next page. `fetch` receives `None` for the first page and
    /// the previous page's end cursor afterwards. Returns `None` once the
    /// sequence is exhausted.
    pub async fn next_page<T, F, Fut>(&mut self, fetch: F) -> Result<Option<Vec<T>>>
    where
        F: FnOnce(Option<Cursor>) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        if self.finished {
            return Ok(None);
        }

        let page = fetch(self.cursor.take()).await?;
        self.stats.queries += 1;

        let count = page.nodes.len();
        if count == 0 {
            self.finished = true;
            return Ok(None);
        }
        self.stats.nodes += count;

        if count < self.page_size.get() {
            self.finished = true;
        } else {
            match page.end_cursor {
                Some(cursor) => {
                    debug!(cursor = %cursor, nodes = count, "Advancing to next page");
                    self.cursor = Some(cursor);
                }
                None => {
                    warn!(
                        nodes = count,
                        "Full page returned without an end cursor, stopping traversal"
                    );
                    self.finished = true;
                }
            }
        }

        Ok(Some(page.nodes))
    }

    pub fn stats(&self) -> PaginationStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn page(nodes: std::ops::Range<u32>, cursor: &str) -> Page<u32> {
        Page {
            nodes: nodes.collect(),
            end_cursor: Cursor::new(cursor),
        }
    }

    /// Drain a paginator over canned pages, returning visited nodes and the
    /// cursor passed to each fetch.
    async fn drain(
        page_size: usize,
        pages: Vec<Page<u32>>,
    ) -> (Vec<u32>, Vec<Option<String>>, PaginationStats) {
        let mut pages: VecDeque<_> = pages.into();
        let mut cursors = Vec::new();
        let mut visited = Vec::new();
        let mut paginator = CursorPaginator::new(PageSize::new(page_size).unwrap());

        while let Some(nodes) = paginator
            .next_page(|cursor| {
                cursors.push(cursor.map(Cursor::into_inner));
                let next = pages.pop_front().unwrap_or(Page {
                    nodes: Vec::new(),
                    end_cursor: None,
                });
                async move { Ok(next) }
            })
            .await
            .unwrap()
        {
            visited.extend(nodes);
        }

        (visited, cursors, paginator.stats())
    }

    #[test]
    fn empty_token_is_no_cursor() {
        assert_eq!(Cursor::new(""), None);
        assert_eq!(Cursor::new("abc").unwrap().as_str(), "abc");
        assert_eq!(Cursor::new("abc").unwrap().to_string(), "abc");
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert_eq!(PageSize::new(0), None);
        assert_eq!(PageSize::default().get(), 100);
    }

    #[tokio::test]
    async fn short_page_ends_traversal_without_extra_query() {
        let (visited, cursors, stats) =
            drain(3, vec![page(0..3, "c1"), page(3..5, "c2")]).await;

        assert_eq!(visited, vec![0, 1, 2, 3, 4]);
        assert_eq!(cursors, vec![None, Some("c1".to_string())]);
        assert_eq!(stats, PaginationStats { queries: 2, nodes: 5 });
    }

    #[tokio::test]
    async fn full_last_page_costs_one_trailing_empty_query() {
        let (visited, cursors, stats) =
            drain(2, vec![page(0..2, "c1"), page(2..4, "c2"), page(0..0, "")]).await;

        assert_eq!(visited, vec![0, 1, 2, 3]);
        assert_eq!(
            cursors,
            vec![None, Some("c1".to_string()), Some("c2".to_string())]
        );
        assert_eq!(stats, PaginationStats { queries: 3, nodes: 4 });
    }

    #[tokio::test]
    async fn full_page_followed_by_more_data_keeps_going() {
        let (visited, _, stats) = drain(
            2,
            vec![page(0..2, "c1"), page(2..4, "c2"), page(4..5, "c3")],
        )
        .await;

        assert_eq!(visited, vec![0, 1, 2, 3, 4]);
        assert_eq!(stats.queries, 3);
    }

    #[tokio::test]
    async fn empty_first_page_visits_nothing() {
        let (visited, cursors, stats) = drain(100, vec![page(0..0, "")]).await;

        assert!(visited.is_empty());
        assert_eq!(cursors, vec![None]);
        assert_eq!(stats, PaginationStats { queries: 1, nodes: 0 });
    }

    #[tokio::test]
    async fn full_page_without_cursor_does_not_restart() {
        let (visited, cursors, stats) =
            drain(2, vec![page(0..2, ""), page(0..2, "")]).await;

        assert_eq!(visited, vec![0, 1]);
        assert_eq!(cursors, vec![None]);
        assert_eq!(stats.queries, 1);
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let mut paginator = CursorPaginator::new(PageSize::DEFAULT);
        let result = paginator
            .next_page(|_| async {
                Err::<Page<u32>, _>(crate::WarhornError::Status {
                    status: 500,
                    body: "boom".to_string(),
                })
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
    }
}
