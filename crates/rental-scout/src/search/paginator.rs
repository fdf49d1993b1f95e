use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use super::domain::ListingRecord;
use super::extractor::{ListingExtractor, ParseError};
use super::fetch::{pause, FetchError, PageFetcher, RetryPolicy};
use super::planner::QueryDescriptor;
use crate::config::PauseWindow;

/// One fetched results page that produced at least one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPage {
    pub number: u32,
    pub url: String,
    pub listings: Vec<ListingRecord>,
    pub skipped: Vec<ParseError>,
}

/// A results page whose fetch exhausted its attempts; the query stops there.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("page {page} of '{neighborhood}' failed: {source}")]
pub struct PageFailure {
    pub neighborhood: String,
    pub page: u32,
    pub source: FetchError,
}

/// Lazy, sequential walk over the results pages of a single query.
///
/// Ends after `max_pages`, at the first page without listings, or right after
/// yielding a [`PageFailure`].
#[derive(Debug)]
pub struct Paginator<'a, F: PageFetcher + ?Sized> {
    query: &'a QueryDescriptor,
    fetcher: &'a F,
    extractor: &'a ListingExtractor,
    retry: RetryPolicy,
    timeout: Duration,
    pause: PauseWindow,
    max_pages: u32,
    next_page: u32,
    pages_fetched: u32,
    finished: bool,
}

impl<'a, F: PageFetcher + ?Sized> Paginator<'a, F> {
    pub fn new(
        query: &'a QueryDescriptor,
        fetcher: &'a F,
        extractor: &'a ListingExtractor,
        max_pages: u32,
    ) -> Self {
        Self {
            query,
            fetcher,
            extractor,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
            pause: PauseWindow::default(),
            max_pages,
            next_page: 1,
            pages_fetched: 0,
            finished: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_pause(mut self, pause: PauseWindow) -> Self {
        self.pause = pause;
        self
    }

    /// Pages that were fetched successfully, including a final empty one.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }
}

impl<F: PageFetcher + ?Sized> Iterator for Paginator<'_, F> {
    type Item = Result<ResultPage, PageFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.next_page > self.max_pages {
            return None;
        }

        let number = self.next_page;
        self.next_page += 1;
        if number > 1 {
            pause(self.pause);
        }

        let url = self.query.page_url(number);
        debug!(neighborhood = %self.query.neighborhood, page = number, %url, "fetching results page");

        let body = match self.retry.run(&url, || self.fetcher.fetch(&url, self.timeout)) {
            Ok(body) => body,
            Err(source) => {
                self.finished = true;
                counter!("rental_scout_fetch_failures_total", "stage" => "results_page")
                    .increment(1);
                warn!(neighborhood = %self.query.neighborhood, page = number, error = %source, "results page unavailable, abandoning query");
                return Some(Err(PageFailure {
                    neighborhood: self.query.neighborhood.clone(),
                    page: number,
                    source,
                }));
            }
        };
        self.pages_fetched += 1;
        counter!("rental_scout_pages_fetched_total").increment(1);

        let extraction = self
            .extractor
            .extract(&body, &url, &self.query.neighborhood);
        for skipped in &extraction.skipped {
            debug!(page = number, reason = %skipped, "skipping listing card");
        }

        if extraction.listings.is_empty() {
            debug!(neighborhood = %self.query.neighborhood, page = number, "no listings on page, end of results");
            self.finished = true;
            return None;
        }

        Some(Ok(ResultPage {
            number,
            url,
            listings: extraction.listings,
            skipped: extraction.skipped,
        }))
    }
}
