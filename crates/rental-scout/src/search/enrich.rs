use std::cell::Cell;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::counter;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::domain::ListingRecord;
use super::extractor::{collapse, compile};
use super::fetch::{pause, FetchError, PageFetcher, RetryPolicy};
use crate::config::PauseWindow;

const FEE_SECTION_SELECTORS: [&str; 3] = [
    "p.ui-pdp-maintenance-fee-ltr",
    ".ui-pdp-container__row--maintenance-fee-vis p",
    "[id*=\"maintenance\"]",
];

/// What happened to a listing in the enrichment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    Disabled,
    FeeFound(u64),
    NoFee,
    Failed(FetchError),
}

/// Optional per-listing stage run after deduplication and before emission.
pub trait ListingEnricher {
    fn enrich(&self, listing: &mut ListingRecord) -> EnrichOutcome;
}

/// Stage used when detail pages are not fetched; leaves listings untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl ListingEnricher for NoEnrichment {
    fn enrich(&self, _listing: &mut ListingRecord) -> EnrichOutcome {
        EnrichOutcome::Disabled
    }
}

/// Fetches each listing's detail page and fills in the maintenance fee.
#[derive(Debug)]
pub struct FeeEnricher<'a, F: PageFetcher + ?Sized> {
    fetcher: &'a F,
    fees: FeeExtractor,
    retry: RetryPolicy,
    timeout: Duration,
    pause: PauseWindow,
    fetched_any: Cell<bool>,
}

impl<'a, F: PageFetcher + ?Sized> FeeEnricher<'a, F> {
    pub fn new(fetcher: &'a F) -> Self {
        Self {
            fetcher,
            fees: FeeExtractor::new(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(15),
            pause: PauseWindow::default(),
            fetched_any: Cell::new(false),
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
}

impl<F: PageFetcher + ?Sized> ListingEnricher for FeeEnricher<'_, F> {
    fn enrich(&self, listing: &mut ListingRecord) -> EnrichOutcome {
        if self.fetched_any.replace(true) {
            pause(self.pause);
        }

        let url = listing.url.clone();
        let body = match self.retry.run(&url, || self.fetcher.fetch(&url, self.timeout)) {
            Ok(body) => body,
            Err(err) => {
                counter!("rental_scout_fetch_failures_total", "stage" => "detail_page")
                    .increment(1);
                warn!(%url, error = %err, "detail page unavailable, emitting listing without fee");
                return EnrichOutcome::Failed(err);
            }
        };

        match self.fees.maintenance_fee(&body) {
            Some(fee) => {
                debug!(%url, fee, "maintenance fee found");
                listing.apply_fee(fee);
                EnrichOutcome::FeeFound(fee)
            }
            None => {
                debug!(%url, "detail page has no maintenance fee");
                EnrichOutcome::NoFee
            }
        }
    }
}

/// Locates the recurring maintenance fee on a listing detail page.
#[derive(Debug)]
pub struct FeeExtractor {
    sections: Vec<Selector>,
}

impl Default for FeeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeeExtractor {
    pub fn new() -> Self {
        Self {
            sections: compile(&FEE_SECTION_SELECTORS),
        }
    }

    /// Prefers the dedicated fee section, falling back to the whole page text.
    pub fn maintenance_fee(&self, html: &str) -> Option<u64> {
        let document = Html::parse_document(html);

        let section_fee = self
            .sections
            .iter()
            .filter_map(|selector| document.select(selector).next())
            .map(|element| collapse(element.text()))
            .find_map(|text| first_amount(&text));
        if section_fee.is_some() {
            return section_fee;
        }

        labelled_amount(&collapse(document.root_element().text()))
    }
}

fn first_amount(text: &str) -> Option<u64> {
    static AMOUNT: OnceLock<Option<Regex>> = OnceLock::new();
    capture_amount(&AMOUNT, r"\$\s*([\d.]+)", text)
}

fn labelled_amount(text: &str) -> Option<u64> {
    static LABELLED: OnceLock<Option<Regex>> = OnceLock::new();
    capture_amount(&LABELLED, r"(?i)gastos\s+comunes.*?\$\s*([\d.]+)", text)
}

fn capture_amount(cell: &OnceLock<Option<Regex>>, pattern: &str, text: &str) -> Option<u64> {
    let regex = cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()?;
    let digits = regex.captures(text)?[1].replace('.', "");
    digits.parse().ok()
}
