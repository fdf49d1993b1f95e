use std::io::{self, Write};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tracing::{debug, info, warn};

use super::domain::ListingRecord;
use super::emitter::Emitter;
use super::enrich::{EnrichOutcome, ListingEnricher, NoEnrichment};
use super::extractor::ListingExtractor;
use super::fetch::{pause, PageFetcher, RetryPolicy};
use super::filter::{CriteriaFilter, ExclusionFilter};
use super::history::{DedupStore, PersistenceError};
use super::paginator::{PageFailure, Paginator};
use super::planner::QueryDescriptor;
use crate::config::{HttpConfig, PacingConfig, PauseWindow, SearchCriteria};

/// Run-scoped knobs that are not part of the search criteria themselves.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_pages: u32,
    pub filter_duplicates: bool,
    pub retry: RetryPolicy,
    pub page_timeout: Duration,
    pub page_pause: PauseWindow,
    pub neighborhood_pause: PauseWindow,
}

impl PipelineSettings {
    pub fn new(max_pages: u32, filter_duplicates: bool) -> Self {
        let http = HttpConfig::default();
        Self {
            max_pages,
            filter_duplicates,
            retry: RetryPolicy::from_config(&http),
            page_timeout: http.page_timeout,
            page_pause: PauseWindow::default(),
            neighborhood_pause: PauseWindow::default(),
        }
    }

    pub fn from_config(
        criteria: &SearchCriteria,
        filter_duplicates: bool,
        http: &HttpConfig,
        pacing: &PacingConfig,
    ) -> Self {
        Self {
            max_pages: criteria.max_pages,
            filter_duplicates,
            retry: RetryPolicy::from_config(http),
            page_timeout: http.page_timeout,
            page_pause: pacing.between_pages,
            neighborhood_pause: pacing.between_neighborhoods,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Counters for one neighborhood query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryReport {
    pub neighborhood: String,
    pub pages_fetched: u32,
    pub extracted: usize,
    pub skipped: usize,
    pub excluded: usize,
    pub mismatched: usize,
    pub duplicates: usize,
    pub emitted: usize,
    pub enrichment_failures: usize,
    pub failure: Option<PageFailure>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub queries: Vec<QueryReport>,
    /// Set when listings were emitted but the history file could not be updated.
    pub history_error: Option<PersistenceError>,
}

impl RunSummary {
    pub fn emitted(&self) -> usize {
        self.queries.iter().map(|query| query.emitted).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PageFailure> {
        self.queries.iter().filter_map(|query| query.failure.as_ref())
    }

    /// True when every query failed before a single results page came back.
    pub fn nothing_retrieved(&self) -> bool {
        !self.queries.is_empty()
            && self
                .queries
                .iter()
                .all(|query| query.pages_fetched == 0 && query.failure.is_some())
    }
}

/// Sequential retrieval pipeline: pages, extraction, filters, history,
/// optional enrichment, emission.
pub struct SearchPipeline<'a, F: PageFetcher + ?Sized> {
    fetcher: &'a F,
    settings: PipelineSettings,
    extractor: ListingExtractor,
    exclusion: ExclusionFilter,
    criteria: CriteriaFilter,
    enricher: Box<dyn ListingEnricher + 'a>,
}

impl<'a, F: PageFetcher + ?Sized> SearchPipeline<'a, F> {
    pub fn new(criteria: &SearchCriteria, fetcher: &'a F, settings: PipelineSettings) -> Self {
        Self {
            fetcher,
            settings,
            extractor: ListingExtractor::new(),
            exclusion: ExclusionFilter::new(&criteria.excluded_keywords),
            criteria: CriteriaFilter::new(criteria),
            enricher: Box::new(NoEnrichment),
        }
    }

    pub fn with_enricher(mut self, enricher: Box<dyn ListingEnricher + 'a>) -> Self {
        self.enricher = enricher;
        self
    }

    /// Runs every query in order. Only a failure to write the output aborts.
    pub fn run<W: Write>(
        &self,
        queries: &[QueryDescriptor],
        history: &mut DedupStore,
        emitter: &mut Emitter<W>,
    ) -> io::Result<RunSummary> {
        let started_at = Utc::now();
        let mut flush_failing = false;
        let mut reports = Vec::with_capacity(queries.len());

        for (index, query) in queries.iter().enumerate() {
            if index > 0 {
                pause(self.settings.neighborhood_pause);
            }
            info!(neighborhood = %query.neighborhood, url = %query.search_url(), "searching neighborhood");
            let report = self.run_query(query, history, emitter, &mut flush_failing)?;
            info!(
                neighborhood = %report.neighborhood,
                pages = report.pages_fetched,
                extracted = report.extracted,
                excluded = report.excluded,
                duplicates = report.duplicates,
                emitted = report.emitted,
                failed = report.failure.is_some(),
                "neighborhood finished"
            );
            reports.push(report);
        }

        let history_error = match history.flush() {
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, "dedup history was not durably updated");
                Some(err)
            }
        };

        Ok(RunSummary {
            started_at,
            finished_at: Utc::now(),
            queries: reports,
            history_error,
        })
    }

    fn run_query<W: Write>(
        &self,
        query: &QueryDescriptor,
        history: &mut DedupStore,
        emitter: &mut Emitter<W>,
        flush_failing: &mut bool,
    ) -> io::Result<QueryReport> {
        let mut report = QueryReport {
            neighborhood: query.neighborhood.clone(),
            ..QueryReport::default()
        };
        let mut pages = Paginator::new(query, self.fetcher, &self.extractor, self.settings.max_pages)
            .with_retry(self.settings.retry)
            .with_timeout(self.settings.page_timeout)
            .with_pause(self.settings.page_pause);

        for page in pages.by_ref() {
            let page = match page {
                Ok(page) => page,
                Err(failure) => {
                    report.failure = Some(failure);
                    break;
                }
            };
            debug!(page = page.number, listings = page.listings.len(), "results page parsed");
            report.extracted += page.listings.len();
            report.skipped += page.skipped.len();
            counter!("rental_scout_listings_extracted_total").increment(page.listings.len() as u64);

            for listing in page.listings {
                if self.admit(&listing, history, &mut report) {
                    self.deliver(listing, history, emitter, &mut report, flush_failing)?;
                }
            }
        }

        report.pages_fetched = pages.pages_fetched();
        Ok(report)
    }

    /// Exclusion, criteria and dedup checks; all run before any detail fetch.
    fn admit(&self, listing: &ListingRecord, history: &DedupStore, report: &mut QueryReport) -> bool {
        if !self.exclusion.keeps(listing) {
            debug!(title = %listing.title, "excluded by keyword");
            counter!("rental_scout_listings_excluded_total").increment(1);
            report.excluded += 1;
            return false;
        }
        if !self.criteria.keeps(listing) {
            debug!(title = %listing.title, bedrooms = ?listing.bedrooms, price = %listing.rental_price, "outside search criteria");
            report.mismatched += 1;
            return false;
        }
        if self.settings.filter_duplicates && history.contains(&listing.url) {
            debug!(url = %listing.url, "already seen");
            counter!("rental_scout_listings_duplicate_total").increment(1);
            report.duplicates += 1;
            return false;
        }
        true
    }

    fn deliver<W: Write>(
        &self,
        mut listing: ListingRecord,
        history: &mut DedupStore,
        emitter: &mut Emitter<W>,
        report: &mut QueryReport,
        flush_failing: &mut bool,
    ) -> io::Result<()> {
        if let EnrichOutcome::Failed(_) = self.enricher.enrich(&mut listing) {
            report.enrichment_failures += 1;
        }

        emitter.emit(&listing)?;
        counter!("rental_scout_listings_emitted_total").increment(1);
        report.emitted += 1;

        history.record(&listing.url);
        match history.flush() {
            Ok(_) => *flush_failing = false,
            Err(err) => {
                if !*flush_failing {
                    warn!(error = %err, "unable to persist dedup history, retrying at end of run");
                }
                *flush_failing = true;
            }
        }
        Ok(())
    }
}
