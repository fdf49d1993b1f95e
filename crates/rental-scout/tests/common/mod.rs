#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use rental_scout::config::SearchCriteria;
use rental_scout::search::{
    Emitter, FetchError, ListingRecord, PageFetcher, PipelineSettings, RetryPolicy,
};

pub const EMPTY_PAGE: &str = "<html><body><p>No hay publicaciones</p></body></html>";

/// In-memory marketplace keyed by URL. Unknown URLs answer with an empty results page.
#[derive(Debug, Default)]
pub struct FakeMarketplace {
    pages: HashMap<String, Result<String, FetchError>>,
    requested: RefCell<Vec<String>>,
}

impl FakeMarketplace {
    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), Ok(body.into()));
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        self.pages.insert(
            url.clone(),
            Err(FetchError::Status { url, status }),
        );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }

    pub fn requests_to(&self, prefix: &str) -> usize {
        self.requested
            .borrow()
            .iter()
            .filter(|url| url.starts_with(prefix))
            .count()
    }
}

impl PageFetcher for FakeMarketplace {
    fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        self.requested.borrow_mut().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| Ok(EMPTY_PAGE.to_string()))
    }
}

pub fn criteria(neighborhoods: &[&str]) -> SearchCriteria {
    let neighborhoods: IndexMap<String, String> = neighborhoods
        .iter()
        .map(|name| (name.to_string(), name.replace(' ', "-")))
        .collect();
    SearchCriteria {
        neighborhoods,
        min_price: 0,
        max_price: 30_000,
        bedrooms: 2,
        department: "montevideo".to_string(),
        last_24_hours: false,
        excluded_keywords: Vec::new(),
        fetch_fees: false,
        max_pages: 3,
    }
}

pub fn settings(criteria: &SearchCriteria, filter_duplicates: bool) -> PipelineSettings {
    PipelineSettings::new(criteria.max_pages, filter_duplicates).with_retry(RetryPolicy {
        max_attempts: 2,
        delay: Duration::ZERO,
    })
}

pub fn detail_url(id: u32) -> String {
    format!("https://apartamento.mercadolibre.com.uy/MLU-{id}-apartamento-_JM")
}

pub fn card(id: u32, title: &str, price: &str) -> String {
    format!(
        r#"<li class="ui-search-layout__item">
             <div class="ui-search-result">
               <a class="ui-search-link" href="{url}#position={id}"><h2 class="ui-search-item__title">{title}</h2></a>
               <span class="andes-money-amount__fraction">{price}</span>
               <span class="ui-search-item__location">Pocitos, Montevideo</span>
               <ul><li>2 dormitorios</li><li>60 m² totales</li></ul>
             </div>
           </li>"#,
        url = detail_url(id),
    )
}

pub fn results_page(cards: &[String]) -> String {
    format!(
        "<html><body><ol class=\"ui-search-layout\">{}</ol></body></html>",
        cards.concat()
    )
}

pub fn three_listings() -> String {
    results_page(&[
        card(1, "Apartamento luminoso", "25.000"),
        card(2, "Frente al parque", "27.500"),
        card(3, "Con garaje", "29.000"),
    ])
}

pub fn fee_page(fee: &str) -> String {
    format!(
        r#"<html><body><div class="ui-pdp-container__row--maintenance-fee-vis"><p>Gastos comunes $ {fee}</p></div></body></html>"#
    )
}

pub fn emitted_records(emitter: Emitter<Vec<u8>>) -> Vec<ListingRecord> {
    let output = String::from_utf8(emitter.into_inner()).expect("utf-8 output");
    output
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is a listing"))
        .collect()
}
