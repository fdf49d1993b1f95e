use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::domain::ListingRecord;

const CONTAINER_SELECTORS: [&str; 3] = [
    "li.ui-search-layout__item",
    ".ui-search-result",
    "div.poly-card",
];
const LINK_SELECTORS: [&str; 3] = ["a.ui-search-link", "a.poly-component__title", "a"];
const TITLE_SELECTORS: [&str; 5] = [
    "h2.ui-search-item__title",
    "a.poly-component__title",
    "h3.poly-component__title-wrapper",
    "a.ui-search-link[title]",
    "h2.ui-search-item__group__element",
];
const PRICE_FALLBACK_SELECTORS: [&str; 2] = [
    "span.price-tag-fraction",
    "span.ui-search-price__part--second-line",
];
const LOCATION_SELECTORS: [&str; 3] = [
    "span.ui-search-item__location",
    "span.ui-search-item__location-label",
    "span.poly-component__location",
];

/// A listing card that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("card {position} has no usable link")]
    MissingUrl { position: usize },
    #[error("card {position} ({url}) has no title")]
    MissingTitle { position: usize, url: String },
}

/// Records parsed from one results page, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageExtraction {
    pub listings: Vec<ListingRecord>,
    pub skipped: Vec<ParseError>,
}

/// Parses marketplace results pages into raw (unenriched) listing records.
#[derive(Debug)]
pub struct ListingExtractor {
    containers: Vec<Selector>,
    links: Vec<Selector>,
    titles: Vec<Selector>,
    price_fraction: Vec<Selector>,
    price_cents: Vec<Selector>,
    price_fallback: Vec<Selector>,
    locations: Vec<Selector>,
}

impl Default for ListingExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingExtractor {
    pub fn new() -> Self {
        Self {
            containers: compile(&CONTAINER_SELECTORS),
            links: compile(&LINK_SELECTORS),
            titles: compile(&TITLE_SELECTORS),
            price_fraction: compile(&["span.andes-money-amount__fraction"]),
            price_cents: compile(&["span.andes-money-amount__cents"]),
            price_fallback: compile(&PRICE_FALLBACK_SELECTORS),
            locations: compile(&LOCATION_SELECTORS),
        }
    }

    /// Extracts every identifiable listing on the page.
    ///
    /// Cards without a link or title are reported in `skipped`; a URL seen
    /// twice on the same page is kept once.
    pub fn extract(&self, html: &str, page_url: &str, neighborhood: &str) -> PageExtraction {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        let cards = self
            .containers
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|cards| !cards.is_empty())
            .unwrap_or_default();

        let mut extraction = PageExtraction::default();
        let mut seen = HashSet::new();
        for (position, card) in cards.into_iter().enumerate() {
            match self.extract_card(card, position, base.as_ref(), neighborhood) {
                Ok(listing) => {
                    if seen.insert(listing.url.clone()) {
                        extraction.listings.push(listing);
                    }
                }
                Err(err) => extraction.skipped.push(err),
            }
        }
        extraction
    }

    fn extract_card(
        &self,
        card: ElementRef<'_>,
        position: usize,
        base: Option<&Url>,
        neighborhood: &str,
    ) -> Result<ListingRecord, ParseError> {
        let url = first_attr(card, &self.links, "href")
            .and_then(|href| canonical_url(base, &href))
            .ok_or(ParseError::MissingUrl { position })?;

        let title = first_text(card, &self.titles)
            .or_else(|| title_from_url(&url))
            .ok_or_else(|| ParseError::MissingTitle {
                position,
                url: url.clone(),
            })?;

        let rental_price = self.price(card);
        let location = first_text(card, &self.locations).unwrap_or_default();

        let card_text = collapse(card.text()).to_lowercase();
        let bedrooms = bedroom_count(&card_text);
        let area = area_label(&card_text);

        Ok(ListingRecord {
            title,
            total_price: rental_price.clone(),
            rental_price,
            neighborhood: neighborhood.to_string(),
            location,
            bedrooms,
            area,
            maintenance_fee: None,
            url,
        })
    }

    fn price(&self, card: ElementRef<'_>) -> String {
        let display = match first_text(card, &self.price_fraction) {
            Some(fraction) => match first_text(card, &self.price_cents) {
                Some(cents) => format!("{fraction},{cents}"),
                None => fraction,
            },
            None => first_text(card, &self.price_fallback).unwrap_or_default(),
        };
        display.chars().filter(|ch| !ch.is_whitespace()).collect()
    }
}

pub(super) fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|selector| Selector::parse(selector).ok())
        .collect()
}

pub(super) fn collapse<'a>(text: impl Iterator<Item = &'a str>) -> String {
    text.flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(card: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|selector| card.select(selector).next())
        .map(|element| collapse(element.text()))
        .find(|text| !text.is_empty())
}

fn first_attr(card: ElementRef<'_>, selectors: &[Selector], attr: &str) -> Option<String> {
    selectors
        .iter()
        .filter_map(|selector| card.select(selector).next())
        .filter_map(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// Absolute http(s) URL with the fragment removed.
fn canonical_url(base: Option<&Url>, href: &str) -> Option<String> {
    let mut url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

/// Last path segment before the first `_`, dashes turned into spaces.
fn title_from_url(url: &str) -> Option<String> {
    let segment = url.trim_end_matches('/').rsplit('/').next()?;
    let slug = segment.split('_').next()?.replace('-', " ");
    let slug = slug.trim();
    (!slug.is_empty()).then(|| slug.to_string())
}

fn bedroom_count(card_text: &str) -> Option<u8> {
    static DORM: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = DORM.get_or_init(|| Regex::new(r"(\d+)\s*dorm").ok());
    let count = pattern
        .as_ref()
        .and_then(|re| re.captures(card_text))
        .and_then(|caps| caps[1].parse().ok());
    count.or_else(|| card_text.contains("monoambiente").then_some(0))
}

fn area_label(card_text: &str) -> Option<String> {
    static AREA: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = AREA.get_or_init(|| Regex::new(r"(\d+)\s*m[²2]").ok());
    pattern
        .as_ref()
        .and_then(|re| re.captures(card_text))
        .map(|caps| format!("{} m2", &caps[1]))
}
