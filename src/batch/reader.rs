//! # Member Reader
//!
//! Pages through qualifying members in ascending id order. Each call to
//! [`MemberReader::read_page`] issues exactly one query against the source
//! and returns the items together with the cursor for the next page.
//!
//! ## Paging Strategies
//!
//! - **Keyset** (default): resumes strictly after the last id returned. The
//!   cursor stays correct when qualifying records are inserted or removed
//!   while the job runs, and each query costs the same regardless of depth.
//! - **Offset**: skips `page_index * page_size` rows. Simple, but a record
//!   that stops qualifying mid-run shifts later pages and one member is then
//!   skipped; inserts shift the other way and cause a re-read.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::errors::ReaderError;
use crate::models::{Member, PageCursor};
use crate::store::{MemberQuery, MemberSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PagingStrategy {
    #[default]
    Keyset,
    Offset,
}

impl PagingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyset => "keyset",
            Self::Offset => "offset",
        }
    }

    /// Whether a persisted cursor can resume under this strategy
    pub fn accepts(&self, cursor: &PageCursor) -> bool {
        matches!(
            (self, cursor),
            (_, PageCursor::Start)
                | (Self::Keyset, PageCursor::After { .. })
                | (Self::Offset, PageCursor::Offset { .. })
        )
    }
}

impl fmt::Display for PagingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<Member>,
    /// Cursor positioned after the last item of this page
    pub next_cursor: PageCursor,
    /// No qualifying member remains past `next_cursor`
    pub exhausted: bool,
    start: PageCursor,
    strategy: PagingStrategy,
}

impl Page {
    /// Cursor positioned right after `items[index]`.
    ///
    /// Used as the checkpoint when a chunk boundary falls inside the page.
    pub fn cursor_after(&self, index: usize) -> Option<PageCursor> {
        let item = self.items.get(index)?;
        Some(match self.strategy {
            PagingStrategy::Keyset => PageCursor::after(item.id.clone()),
            PagingStrategy::Offset => PageCursor::Offset {
                skip: self.start.skip() + index as u64 + 1,
            },
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

pub struct MemberReader {
    source: Arc<dyn MemberSource>,
    qualifying_status: String,
    page_size: usize,
    strategy: PagingStrategy,
}

impl fmt::Debug for MemberReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberReader")
            .field("qualifying_status", &self.qualifying_status)
            .field("page_size", &self.page_size)
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl MemberReader {
    pub fn new(
        source: Arc<dyn MemberSource>,
        qualifying_status: impl Into<String>,
        page_size: usize,
        strategy: PagingStrategy,
    ) -> Self {
        Self {
            source,
            qualifying_status: qualifying_status.into(),
            page_size: page_size.max(1),
            strategy,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn strategy(&self) -> PagingStrategy {
        self.strategy
    }

    /// Fetch the page that starts at `cursor`.
    ///
    /// An empty page marks the end of input. A short page is not treated as
    /// the end: the next call returns the empty page, which keeps the reader
    /// correct when records are inserted behind the cursor.
    pub async fn read_page(&self, cursor: &PageCursor) -> Result<Page, ReaderError> {
        if !self.strategy.accepts(cursor) {
            return Err(ReaderError::CursorMismatch {
                cursor: cursor.clone(),
                strategy: self.strategy,
            });
        }

        let query = MemberQuery {
            status: self.qualifying_status.clone(),
            cursor: cursor.clone(),
            limit: self.page_size,
        };

        let items = self
            .source
            .fetch_members(&query)
            .await
            .map_err(|source| ReaderError::Fetch {
                cursor: cursor.clone(),
                source,
            })?;

        let next_cursor = match (self.strategy, items.last()) {
            (_, None) => cursor.clone(),
            (PagingStrategy::Keyset, Some(last)) => PageCursor::after(last.id.clone()),
            (PagingStrategy::Offset, Some(_)) => PageCursor::Offset {
                skip: cursor.skip() + items.len() as u64,
            },
        };

        debug!(
            cursor = %cursor,
            next_cursor = %next_cursor,
            fetched = items.len(),
            strategy = %self.strategy,
            "Read member page"
        );

        Ok(Page {
            exhausted: items.is_empty(),
            items,
            next_cursor,
            start: cursor.clone(),
            strategy: self.strategy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBatchStore;

    fn store_with(ids: &[(&str, &str)]) -> Arc<InMemoryBatchStore> {
        Arc::new(InMemoryBatchStore::with_members(ids.iter().map(
            |(id, status)| {
                Member::new(*id)
                    .with_status(*status)
                    .with_policy_status("active")
            },
        )))
    }

    #[tokio::test]
    async fn test_keyset_pages_until_empty() {
        let store = store_with(&[("a", "active"), ("b", "active"), ("c", "active")]);
        let reader = MemberReader::new(store, "active", 2, PagingStrategy::Keyset);

        let first = reader.read_page(&PageCursor::Start).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.next_cursor, PageCursor::after("b"));
        assert!(!first.exhausted);

        let second = reader.read_page(&first.next_cursor).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.next_cursor, PageCursor::after("c"));

        let third = reader.read_page(&second.next_cursor).await.unwrap();
        assert!(third.exhausted);
        assert_eq!(third.next_cursor, PageCursor::after("c"));
    }

    #[tokio::test]
    async fn test_offset_cursor_counts_items() {
        let store = store_with(&[("a", "active"), ("b", "inactive"), ("c", "active")]);
        let reader = MemberReader::new(store, "active", 1, PagingStrategy::Offset);

        let first = reader.read_page(&PageCursor::Start).await.unwrap();
        assert_eq!(first.items[0].id, "a");
        assert_eq!(first.next_cursor, PageCursor::Offset { skip: 1 });

        let second = reader.read_page(&first.next_cursor).await.unwrap();
        assert_eq!(second.items[0].id, "c");
        assert_eq!(second.next_cursor, PageCursor::Offset { skip: 2 });
    }

    #[tokio::test]
    async fn test_cursor_after_mid_page() {
        let store = store_with(&[("a", "active"), ("b", "active"), ("c", "active")]);

        let keyset = MemberReader::new(store.clone(), "active", 3, PagingStrategy::Keyset);
        let page = keyset.read_page(&PageCursor::Start).await.unwrap();
        assert_eq!(page.cursor_after(0), Some(PageCursor::after("a")));
        assert_eq!(page.cursor_after(3), None);

        let offset = MemberReader::new(store, "active", 2, PagingStrategy::Offset);
        let page = offset
            .read_page(&PageCursor::Offset { skip: 1 })
            .await
            .unwrap();
        assert_eq!(page.cursor_after(0), Some(PageCursor::Offset { skip: 2 }));
        assert_eq!(page.cursor_after(1), Some(PageCursor::Offset { skip: 3 }));
    }

    #[tokio::test]
    async fn test_mismatched_cursor_is_rejected() {
        let store = store_with(&[("a", "active")]);
        let reader = MemberReader::new(store, "active", 10, PagingStrategy::Offset);

        let err = reader
            .read_page(&PageCursor::after("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReaderError::CursorMismatch { .. }));
    }

    #[tokio::test]
    async fn test_fetch_failure_carries_cursor() {
        let store = store_with(&[("a", "active")]);
        store.fail_fetch_after(0);
        let reader = MemberReader::new(store, "active", 10, PagingStrategy::Keyset);

        let err = reader.read_page(&PageCursor::Start).await.unwrap_err();
        match err {
            ReaderError::Fetch { cursor, .. } => assert_eq!(cursor, PageCursor::Start),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strategy_serde() {
        let parsed: PagingStrategy = serde_json::from_str("\"offset\"").unwrap();
        assert_eq!(parsed, PagingStrategy::Offset);
        assert_eq!(PagingStrategy::default(), PagingStrategy::Keyset);
    }
}
