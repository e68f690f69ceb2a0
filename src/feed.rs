use std::collections::HashSet;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::cache::{PageKey, ResponseCache, TRENDING_CATEGORY};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::models::NewsItem;

/// Load state of the current category selection
#[derive(Debug, Clone, PartialEq)]
pub enum FeedState {
    Idle,
    Loading,
    Ready,
    Error(String),
}

/// A page fetch in flight, tagged with the generation that issued it.
/// Responses from a superseded generation are discarded on apply.
#[derive(Debug, Clone)]
pub struct PageRequest {
    generation: u64,
    category: String,
    page: u32,
}

impl PageRequest {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Drives the card feed: owns the fetcher and the response cache, tracks
/// the pagination cursor, and applies fetch results to the visible state.
pub struct FeedController {
    fetcher: Fetcher,
    cache: ResponseCache,
    page_size: usize,
    initial_load_timeout: Duration,
    state: FeedState,
    category: String,
    generation: u64,
    items: Vec<NewsItem>,
    next_page: u32,
    has_more: bool,
    is_loading_more: bool,
}

impl FeedController {
    pub fn new(fetcher: Fetcher, cache: ResponseCache, config: &Config) -> Self {
        Self {
            fetcher,
            cache,
            page_size: config.page_size,
            initial_load_timeout: config.initial_load_timeout(),
            state: FeedState::Idle,
            category: String::new(),
            generation: 0,
            items: Vec::new(),
            next_page: 1,
            has_more: false,
            is_loading_more: false,
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn items(&self) -> &[NewsItem] {
        &self.items
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading_more(&self) -> bool {
        self.is_loading_more
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Switch to a category and load its first page. The whole load,
    /// retries included, is bounded by the initial-load ceiling; on a
    /// ceiling timeout a stale cache entry is still preferred over an
    /// error state.
    pub async fn select_category(&mut self, category: &str) -> &FeedState {
        let request = self.begin(category);
        info!(category, "Loading feed");

        let result = match timeout(self.initial_load_timeout, self.fetch_page(&request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(category, "Initial page load exceeded its ceiling");
                match self.cache.get_stale(&Self::key_for(&request)) {
                    Some(entry) => Ok(entry.data.clone()),
                    None => Err(Error::InitialLoadTimeout),
                }
            }
        };

        self.apply(&request, result);
        &self.state
    }

    /// Load the next page of the current category, if any. Suppressed
    /// while a page fetch is already in flight or once the feed is
    /// exhausted.
    pub async fn load_more(&mut self) -> &FeedState {
        let Some(request) = self.begin_next_page() else {
            return &self.state;
        };
        let result = self.fetch_page(&request).await;
        self.apply(&request, result);
        &self.state
    }

    /// Start a new category selection: bumps the generation so that any
    /// response still in flight for the previous selection becomes inert.
    pub fn begin(&mut self, category: &str) -> PageRequest {
        self.generation += 1;
        self.state = FeedState::Loading;
        self.category = category.to_string();
        self.items.clear();
        self.next_page = 1;
        self.has_more = false;
        self.is_loading_more = false;

        PageRequest {
            generation: self.generation,
            category: self.category.clone(),
            page: 1,
        }
    }

    /// Issue a request for the next page, or None when there is nothing
    /// further to load or a page fetch is already in flight.
    pub fn begin_next_page(&mut self) -> Option<PageRequest> {
        if self.state != FeedState::Ready || !self.has_more || self.is_loading_more {
            return None;
        }
        self.is_loading_more = true;

        Some(PageRequest {
            generation: self.generation,
            category: self.category.clone(),
            page: self.next_page,
        })
    }

    /// Fold a fetch result into the feed. Returns false when the request
    /// belongs to a superseded generation and was discarded.
    pub fn apply(&mut self, request: &PageRequest, result: Result<Vec<NewsItem>>) -> bool {
        if request.generation != self.generation {
            debug!(
                category = %request.category,
                page = request.page,
                "Discarding response from a superseded selection"
            );
            return false;
        }
        self.is_loading_more = false;

        match result {
            Ok(page_items) => {
                // A short page means the feed is exhausted
                self.has_more =
                    request.category != TRENDING_CATEGORY && page_items.len() >= self.page_size;
                self.next_page = request.page + 1;
                self.append_items(page_items);
                self.state = FeedState::Ready;
                info!(
                    category = %request.category,
                    page = request.page,
                    total = self.items.len(),
                    "Feed updated"
                );
            }
            Err(err) if request.page == 1 => {
                error!(category = %request.category, error = %err, "Feed load failed");
                self.state = FeedState::Error(user_message(&err));
            }
            Err(err) => {
                // Keep the items already on screen; the next scroll
                // trigger retries this page.
                warn!(
                    category = %request.category,
                    page = request.page,
                    error = %err,
                    "Failed to load more items"
                );
            }
        }
        true
    }

    async fn fetch_page(&mut self, request: &PageRequest) -> Result<Vec<NewsItem>> {
        let key = Self::key_for(request);
        if let Some(entry) = self.cache.get(&key) {
            return Ok(entry.data.clone());
        }

        let fetched = if request.category == TRENDING_CATEGORY {
            self.fetcher.trending().await
        } else {
            self.fetcher.news(&request.category, request.page).await
        };

        match fetched {
            Ok(items) => {
                self.cache.put(key, items.clone());
                Ok(items)
            }
            Err(err) => match self.cache.get_stale(&key) {
                Some(entry) => {
                    warn!(
                        category = %request.category,
                        page = request.page,
                        error = %err,
                        "Live fetch failed, serving stale cache entry"
                    );
                    Ok(entry.data.clone())
                }
                None => Err(err),
            },
        }
    }

    fn key_for(request: &PageRequest) -> PageKey {
        if request.category == TRENDING_CATEGORY {
            PageKey::trending()
        } else {
            PageKey::new(&request.category, request.page)
        }
    }

    fn append_items(&mut self, new_items: Vec<NewsItem>) {
        let mut seen: HashSet<String> = self.items.iter().map(|item| item.url.clone()).collect();
        for item in new_items {
            if seen.insert(item.url.clone()) {
                self.items.push(item);
            }
        }
    }
}

fn user_message(error: &Error) -> String {
    match error {
        Error::InitialLoadTimeout => "News is taking too long to load. Please try again.".to_string(),
        _ => "Failed to load news. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn test_controller(page_size: usize) -> FeedController {
        let mut config = Config::default();
        config.page_size = page_size;
        // The fetcher is never exercised by these tests; results are fed
        // through apply() directly.
        let fetcher = Fetcher::new("http://localhost:0", &config);
        let cache = ResponseCache::new(config.cache_ttl_secs, config.max_cache_entries);
        FeedController::new(fetcher, cache, &config)
    }

    fn item(url: &str) -> NewsItem {
        NewsItem {
            title: url.to_string(),
            url: url.to_string(),
            source: "Ynet".to_string(),
            image_url: None,
            published_at: None,
            item_type: "article".to_string(),
            category: "general".to_string(),
            content: None,
            author: None,
        }
    }

    fn page(urls: &[&str]) -> Vec<NewsItem> {
        urls.iter().map(|url| item(url)).collect()
    }

    mod state_machine_tests {
        use super::*;

        #[test]
        fn test_starts_idle() {
            let controller = test_controller(3);
            assert_eq!(*controller.state(), FeedState::Idle);
            assert!(controller.items().is_empty());
        }

        #[test]
        fn test_begin_enters_loading_and_clears_items() {
            let mut controller = test_controller(3);

            let request = controller.begin("politics");
            controller.apply(&request, Ok(page(&["https://a", "https://b", "https://c"])));
            assert_eq!(controller.items().len(), 3);

            controller.begin("sports");
            assert_eq!(*controller.state(), FeedState::Loading);
            assert!(controller.items().is_empty());
            assert_eq!(controller.category(), "sports");
        }

        #[test]
        fn test_successful_page_enters_ready() {
            let mut controller = test_controller(3);

            let request = controller.begin("politics");
            let applied = controller.apply(&request, Ok(page(&["https://a"])));

            assert!(applied);
            assert_eq!(*controller.state(), FeedState::Ready);
            assert_eq!(controller.items().len(), 1);
        }

        #[test]
        fn test_empty_page_is_ready_not_error() {
            let mut controller = test_controller(3);

            let request = controller.begin("science");
            controller.apply(&request, Ok(vec![]));

            assert_eq!(*controller.state(), FeedState::Ready);
            assert!(controller.items().is_empty());
            assert!(!controller.has_more());
        }

        #[test]
        fn test_first_page_error_surfaces_message() {
            let mut controller = test_controller(3);

            let request = controller.begin("politics");
            controller.apply(
                &request,
                Err(Error::Format("unexpected response format".to_string())),
            );

            match controller.state() {
                FeedState::Error(message) => assert!(message.contains("try again")),
                state => panic!("expected error state, got {:?}", state),
            }
        }

        #[test]
        fn test_initial_load_timeout_has_its_own_message() {
            let mut controller = test_controller(3);

            let request = controller.begin("politics");
            controller.apply(&request, Err(Error::InitialLoadTimeout));

            match controller.state() {
                FeedState::Error(message) => assert!(message.contains("taking too long")),
                state => panic!("expected error state, got {:?}", state),
            }
        }
    }

    mod pagination_tests {
        use super::*;

        #[test]
        fn test_full_page_keeps_has_more() {
            let mut controller = test_controller(3);

            let request = controller.begin("politics");
            controller.apply(&request, Ok(page(&["https://a", "https://b", "https://c"])));

            assert!(controller.has_more());
        }

        #[test]
        fn test_short_page_exhausts_feed() {
            let mut controller = test_controller(3);

            let request = controller.begin("politics");
            controller.apply(&request, Ok(page(&["https://a", "https://b"])));

            assert!(!controller.has_more());
            assert!(controller.begin_next_page().is_none());
        }

        #[test]
        fn test_next_page_advances_cursor() {
            let mut controller = test_controller(2);

            let first = controller.begin("politics");
            controller.apply(&first, Ok(page(&["https://a", "https://b"])));

            let second = controller.begin_next_page().expect("feed should have more");
            assert_eq!(second.page(), 2);
            assert_eq!(second.category(), "politics");

            controller.apply(&second, Ok(page(&["https://c"])));
            assert_eq!(controller.items().len(), 3);
            assert!(!controller.has_more());
        }

        #[test]
        fn test_in_flight_page_suppresses_duplicate_trigger() {
            let mut controller = test_controller(2);

            let first = controller.begin("politics");
            controller.apply(&first, Ok(page(&["https://a", "https://b"])));

            let pending = controller.begin_next_page();
            assert!(pending.is_some());
            assert!(controller.is_loading_more());

            // A second scroll trigger while the fetch is in flight
            assert!(controller.begin_next_page().is_none());

            controller.apply(&pending.unwrap(), Ok(page(&["https://c", "https://d"])));
            assert!(!controller.is_loading_more());
            assert!(controller.begin_next_page().is_some());
        }

        #[test]
        fn test_no_next_page_while_loading_first() {
            let mut controller = test_controller(2);

            controller.begin("politics");
            assert!(controller.begin_next_page().is_none());
        }

        #[test]
        fn test_failed_next_page_keeps_items_and_state() {
            let mut controller = test_controller(2);

            let first = controller.begin("politics");
            controller.apply(&first, Ok(page(&["https://a", "https://b"])));

            let second = controller.begin_next_page().unwrap();
            controller.apply(
                &second,
                Err(Error::Format("unexpected response format".to_string())),
            );

            assert_eq!(*controller.state(), FeedState::Ready);
            assert_eq!(controller.items().len(), 2);
            // The trigger is re-armed so the page can be retried
            assert!(!controller.is_loading_more());
            assert!(controller.begin_next_page().is_some());
        }

        #[test]
        fn test_items_are_deduplicated_by_url() {
            let mut controller = test_controller(2);

            let first = controller.begin("politics");
            controller.apply(&first, Ok(page(&["https://a", "https://b"])));

            let second = controller.begin_next_page().unwrap();
            // Page 2 overlaps page 1, as live feeds shift underneath
            controller.apply(&second, Ok(page(&["https://b", "https://c"])));

            let urls: Vec<&str> = controller.items().iter().map(|i| i.url.as_str()).collect();
            assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
        }

        #[test]
        fn test_trending_is_never_paginated() {
            let mut controller = test_controller(2);

            let request = controller.begin(TRENDING_CATEGORY);
            // Longer than a page, but trending has no further pages
            controller.apply(
                &request,
                Ok(page(&["https://a", "https://b", "https://c", "https://d"])),
            );

            assert!(!controller.has_more());
            assert!(controller.begin_next_page().is_none());
        }
    }

    mod generation_tests {
        use super::*;

        #[test]
        fn test_superseded_response_is_discarded() {
            let mut controller = test_controller(3);

            let stale = controller.begin("politics");
            let current = controller.begin("sports");

            // The slow politics response lands after the switch
            let applied = controller.apply(&stale, Ok(page(&["https://politics/1"])));
            assert!(!applied);
            assert!(controller.items().is_empty());
            assert_eq!(*controller.state(), FeedState::Loading);

            let applied = controller.apply(&current, Ok(page(&["https://sports/1"])));
            assert!(applied);
            assert_eq!(controller.items().len(), 1);
            assert_eq!(controller.items()[0].url, "https://sports/1");
        }

        #[test]
        fn test_superseded_error_cannot_clobber_state() {
            let mut controller = test_controller(3);

            let stale = controller.begin("politics");
            let current = controller.begin("sports");
            controller.apply(&current, Ok(page(&["https://sports/1"])));

            let applied = controller.apply(
                &stale,
                Err(Error::Format("unexpected response format".to_string())),
            );
            assert!(!applied);
            assert_eq!(*controller.state(), FeedState::Ready);
        }

        #[test]
        fn test_superseded_next_page_is_discarded() {
            let mut controller = test_controller(2);

            let first = controller.begin("politics");
            controller.apply(&first, Ok(page(&["https://a", "https://b"])));
            let next = controller.begin_next_page().unwrap();

            // Category changes while page 2 is in flight
            let fresh = controller.begin("sports");

            assert!(!controller.apply(&next, Ok(page(&["https://c"]))));
            controller.apply(&fresh, Ok(page(&["https://sports/1"])));

            assert_eq!(controller.items().len(), 1);
            assert_eq!(controller.items()[0].url, "https://sports/1");
        }
    }
}
