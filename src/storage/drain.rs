//! Draining of cursor-paginated listings.

use futures::stream::{self, Stream};

use crate::error::{AppError, Result};
use crate::storage::KvStore;

/// Walks a prefix listing page by page until the backend signals completion.
///
/// The drain is bounded by `max_pages` and fails instead of looping when a
/// backend reports an incomplete page without a usable cursor. The cursor of
/// the next page is exposed through [`KeyDrain::resume_token`] so an
/// interrupted drain can be picked up with [`KeyDrain::resume`].
pub struct KeyDrain<'a> {
    store: &'a dyn KvStore,
    prefix: String,
    cursor: Option<String>,
    pages: usize,
    max_pages: usize,
    finished: bool,
}

impl<'a> KeyDrain<'a> {
    pub fn new(store: &'a dyn KvStore, prefix: impl Into<String>, max_pages: usize) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            cursor: None,
            pages: 0,
            max_pages,
            finished: false,
        }
    }

    /// Continue a listing from a token previously returned by `resume_token`.
    pub fn resume(
        store: &'a dyn KvStore,
        prefix: impl Into<String>,
        token: impl Into<String>,
        max_pages: usize,
    ) -> Self {
        Self {
            cursor: Some(token.into()),
            ..Self::new(store, prefix, max_pages)
        }
    }

    /// Token of the page that would be fetched next.
    pub fn resume_token(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Whether the store has signalled the end of the listing.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch the next page, or `None` once the listing is complete.
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>> {
        if self.finished {
            return Ok(None);
        }
        if self.pages >= self.max_pages {
            return Err(AppError::pagination(
                &self.prefix,
                format!("no completion signal after {} pages", self.pages),
            ));
        }

        let page = self.store.list(&self.prefix, self.cursor.as_deref()).await?;
        self.pages += 1;

        if page.complete {
            self.finished = true;
            self.cursor = None;
        } else {
            match page.cursor {
                None => {
                    return Err(AppError::pagination(
                        &self.prefix,
                        "incomplete page without a cursor",
                    ));
                }
                Some(next) if self.cursor.as_deref() == Some(next.as_str()) => {
                    return Err(AppError::pagination(
                        &self.prefix,
                        format!("cursor '{next}' did not advance"),
                    ));
                }
                Some(next) => self.cursor = Some(next),
            }
        }

        log::debug!(
            "Listed page {} of '{}' with {} keys",
            self.pages,
            self.prefix,
            page.keys.len()
        );
        Ok(Some(page.keys))
    }

    /// Drain every remaining page, concatenating them in the order received.
    pub async fn collect(mut self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        while let Some(page) = self.next_page().await? {
            keys.extend(page);
        }
        Ok(keys)
    }

    /// The remaining pages as a stream.
    pub fn into_pages(self) -> impl Stream<Item = Result<Vec<String>>> + 'a {
        stream::try_unfold(self, |mut drain| async move {
            let page = drain.next_page().await?;
            Ok::<_, AppError>(page.map(|keys| (keys, drain)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ListPage, MemoryStorage};
    use async_trait::async_trait;
    use futures::TryStreamExt;

    /// Backend whose listing never reports completion.
    struct EndlessStore {
        advance: bool,
        cursor: bool,
    }

    #[async_trait]
    impl KvStore for EndlessStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn put(&self, _key: &str, _value: &[u8]) -> Result<()> {
            Ok(())
        }

        async fn list(&self, _prefix: &str, cursor: Option<&str>) -> Result<ListPage> {
            let next = match (self.advance, cursor) {
                (true, Some(c)) => format!("{c}x"),
                _ => "x".to_string(),
            };
            Ok(ListPage {
                keys: vec!["k".to_string()],
                cursor: self.cursor.then_some(next),
                complete: false,
            })
        }
    }

    async fn filled(page_size: usize, count: usize) -> MemoryStorage {
        let store = MemoryStorage::with_page_size(page_size);
        for i in 0..count {
            store.put(&format!("comics/{i:03}"), b"1").await.unwrap();
        }
        store.put("images/001", b"1").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_collect_concatenates_pages() {
        let store = filled(3, 8).await;
        let keys = KeyDrain::new(&store, "comics/", 10).collect().await.unwrap();

        assert_eq!(keys.len(), 8);
        assert_eq!(keys.first().map(String::as_str), Some("comics/000"));
        assert_eq!(keys.last().map(String::as_str), Some("comics/007"));
    }

    #[tokio::test]
    async fn test_resume_from_token() {
        let store = filled(3, 8).await;
        let mut drain = KeyDrain::new(&store, "comics/", 10);
        let first = drain.next_page().await.unwrap().unwrap();
        let token = drain.resume_token().unwrap().to_string();

        let rest = KeyDrain::resume(&store, "comics/", token, 10)
            .collect()
            .await
            .unwrap();
        assert_eq!(first.len() + rest.len(), 8);
        assert_eq!(rest.first().map(String::as_str), Some("comics/003"));
    }

    #[tokio::test]
    async fn test_finished_after_last_page() {
        let store = filled(3, 5).await;
        let mut drain = KeyDrain::new(&store, "comics/", 10);

        assert_eq!(drain.next_page().await.unwrap().map(|p| p.len()), Some(3));
        assert!(!drain.is_finished());
        assert!(drain.resume_token().is_some());

        assert_eq!(drain.next_page().await.unwrap().map(|p| p.len()), Some(2));
        assert!(drain.is_finished());
        assert!(drain.resume_token().is_none());
        assert_eq!(drain.next_page().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_page_stream() {
        let store = filled(2, 5).await;
        let pages: Vec<Vec<String>> = KeyDrain::new(&store, "comics/", 10)
            .into_pages()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(pages.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_bounded_when_never_complete() {
        let store = EndlessStore {
            advance: true,
            cursor: true,
        };
        let err = KeyDrain::new(&store, "comics/", 5).collect().await.unwrap_err();
        assert!(matches!(err, AppError::Pagination { .. }));
    }

    #[tokio::test]
    async fn test_rejects_stuck_cursor() {
        let store = EndlessStore {
            advance: false,
            cursor: true,
        };
        let mut drain = KeyDrain::new(&store, "comics/", 100);
        assert!(drain.next_page().await.unwrap().is_some());
        assert!(matches!(
            drain.next_page().await,
            Err(AppError::Pagination { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_missing_cursor() {
        let store = EndlessStore {
            advance: false,
            cursor: false,
        };
        let err = KeyDrain::new(&store, "comics/", 100).collect().await.unwrap_err();
        assert!(matches!(err, AppError::Pagination { .. }));
    }
}
