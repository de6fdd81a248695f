//! Window-by-window, page-by-page traversal of the remote listing.
//!
//! The paginator walks a pre-computed sequence of date windows in
//! ascending order and yields raw listing items one at a time. A window
//! keeps paging while the remote returns a full page *and* a
//! continuation cursor; a short page or a missing cursor ends it. A
//! window that fails mid-flight is abandoned (its already-yielded items
//! stand) and traversal moves on to the next one, so a single bad
//! window never sinks the rest of the range.

use std::collections::VecDeque;

use serde_json::Value;

use nfse_core::period::DateWindow;
use nfse_plugnotas::NoteSource;

pub struct PeriodPaginator<'a, S: NoteSource + ?Sized> {
    source: &'a S,
    recipient_tax_id: String,
    page_size: usize,
    windows: std::vec::IntoIter<DateWindow>,
    /// Window currently being paged, with the cursor for its next page.
    current: Option<(DateWindow, Option<String>)>,
    buffered: VecDeque<Value>,
    window_errors: usize,
}

impl<'a, S: NoteSource + ?Sized> PeriodPaginator<'a, S> {
    pub fn new(
        source: &'a S,
        recipient_tax_id: impl Into<String>,
        windows: Vec<DateWindow>,
        page_size: usize,
    ) -> Self {
        Self {
            source,
            recipient_tax_id: recipient_tax_id.into(),
            page_size,
            windows: windows.into_iter(),
            current: None,
            buffered: VecDeque::new(),
            window_errors: 0,
        }
    }

    /// Next listing item, or `None` once every window is exhausted.
    pub async fn next(&mut self) -> Option<Value> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                return Some(item);
            }
            let (window, cursor) = match self.current.take() {
                Some(state) => state,
                None => (self.windows.next()?, None),
            };
            match self
                .source
                .fetch_page(
                    &self.recipient_tax_id,
                    window,
                    self.page_size,
                    cursor.as_deref(),
                )
                .await
            {
                Ok(page) => {
                    // A short page ends the window even when the remote
                    // still hands back a cursor.
                    if page.items.len() >= self.page_size {
                        if let Some(next) = page.next_cursor {
                            self.current = Some((window, Some(next)));
                        }
                    }
                    self.buffered.extend(page.items);
                }
                Err(error) => {
                    tracing::warn!(window = %window, error = %error, "listing window abandoned");
                    self.window_errors += 1;
                }
            }
        }
    }

    /// Windows abandoned because a page fetch failed.
    pub fn window_errors(&self) -> usize {
        self.window_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;

    use nfse_core::storage_key::ArtifactKind;
    use nfse_plugnotas::{ListingPage, PlugnotasError};

    /// Hands out scripted `fetch_page` responses in call order.
    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<ListingPage, PlugnotasError>>>,
        fetches: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<ListingPage, PlugnotasError>>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().collect()),
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NoteSource for ScriptedSource {
        async fn fetch_page(
            &self,
            _recipient_tax_id: &str,
            _window: DateWindow,
            _page_size: usize,
            _cursor: Option<&str>,
        ) -> Result<ListingPage, PlugnotasError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("fetch_page called past the script"))
        }

        async fn fetch_detail(&self, _official_id: &str) -> Result<Value, PlugnotasError> {
            unimplemented!()
        }

        async fn search(
            &self,
            _invoice_number: &str,
            _issuer_tax_id: &str,
            _recipient_tax_id: Option<&str>,
        ) -> Result<Vec<Value>, PlugnotasError> {
            unimplemented!()
        }

        async fn fetch_artifact(&self, _url: &str) -> Result<Vec<u8>, PlugnotasError> {
            unimplemented!()
        }

        fn artifact_endpoint(&self, _kind: ArtifactKind, _official_id: &str) -> String {
            unimplemented!()
        }
    }

    fn window(from: (i32, u32, u32), to: (i32, u32, u32)) -> DateWindow {
        DateWindow {
            start: NaiveDate::from_ymd_opt(from.0, from.1, from.2).unwrap(),
            end: NaiveDate::from_ymd_opt(to.0, to.1, to.2).unwrap(),
        }
    }

    fn items(labels: std::ops::Range<usize>) -> Vec<Value> {
        labels.map(|n| json!({ "numero": n.to_string() })).collect()
    }

    fn page(items: Vec<Value>, cursor: Option<&str>) -> Result<ListingPage, PlugnotasError> {
        Ok(ListingPage {
            items,
            next_cursor: cursor.map(str::to_string),
        })
    }

    fn api_error() -> Result<ListingPage, PlugnotasError> {
        Err(PlugnotasError::Api {
            status: 500,
            body: "boom".into(),
        })
    }

    async fn drain<S: NoteSource>(paginator: &mut PeriodPaginator<'_, S>) -> Vec<Value> {
        let mut all = Vec::new();
        while let Some(item) = paginator.next().await {
            all.push(item);
        }
        all
    }

    #[tokio::test]
    async fn full_pages_with_cursors_then_short_page_stop_fetching() {
        // Two full pages with cursors, then a short one: exactly three
        // fetches, no probe for a fourth.
        let source = ScriptedSource::new(vec![
            page(items(0..2), Some("c1")),
            page(items(2..4), Some("c2")),
            page(items(4..5), Some("c3")),
        ]);
        let windows = vec![window((2024, 1, 1), (2024, 1, 31))];
        let mut paginator = PeriodPaginator::new(&source, "25249058000102", windows, 2);

        let all = drain(&mut paginator).await;

        assert_eq!(all.len(), 5);
        assert_eq!(source.fetches(), 3);
        assert_eq!(paginator.window_errors(), 0);
    }

    #[tokio::test]
    async fn full_page_without_cursor_ends_the_window() {
        let source = ScriptedSource::new(vec![page(items(0..2), None)]);
        let windows = vec![window((2024, 1, 1), (2024, 1, 31))];
        let mut paginator = PeriodPaginator::new(&source, "25249058000102", windows, 2);

        let all = drain(&mut paginator).await;

        assert_eq!(all.len(), 2);
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn empty_page_with_cursor_still_ends_the_window() {
        let source = ScriptedSource::new(vec![page(vec![], Some("c1"))]);
        let windows = vec![window((2024, 1, 1), (2024, 1, 31))];
        let mut paginator = PeriodPaginator::new(&source, "25249058000102", windows, 2);

        let all = drain(&mut paginator).await;

        assert!(all.is_empty());
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn failed_window_is_skipped_and_the_rest_still_run() {
        // Second of three windows dies on its second page. Its first
        // page already came through; the third window is unaffected.
        let source = ScriptedSource::new(vec![
            page(items(0..1), None),
            page(items(10..12), Some("c1")),
            api_error(),
            page(items(20..21), None),
        ]);
        let windows = vec![
            window((2024, 1, 1), (2024, 1, 31)),
            window((2024, 2, 1), (2024, 2, 29)),
            window((2024, 3, 1), (2024, 3, 31)),
        ];
        let mut paginator = PeriodPaginator::new(&source, "25249058000102", windows, 2);

        let all = drain(&mut paginator).await;

        assert_eq!(all.len(), 4);
        assert_eq!(all[3], json!({ "numero": "20" }));
        assert_eq!(paginator.window_errors(), 1);
        assert_eq!(source.fetches(), 4);
    }

    #[tokio::test]
    async fn no_windows_yields_nothing_and_never_fetches() {
        let source = ScriptedSource::new(vec![]);
        let mut paginator = PeriodPaginator::new(&source, "25249058000102", vec![], 2);

        assert!(paginator.next().await.is_none());
        assert_eq!(source.fetches(), 0);
    }
}
