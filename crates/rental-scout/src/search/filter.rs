use super::domain::ListingRecord;
use crate::config::SearchCriteria;

/// Drops listings whose title mentions an excluded keyword.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    keywords: Vec<String>,
}

impl ExclusionFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|keyword| keyword.as_ref().trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Self { keywords }
    }

    /// Case-insensitive substring match against the title.
    pub fn keeps(&self, listing: &ListingRecord) -> bool {
        let title = listing.title.to_lowercase();
        !self
            .keywords
            .iter()
            .any(|keyword| title.contains(keyword.as_str()))
    }
}

/// Rejects listings the marketplace returned despite not matching the query.
#[derive(Debug, Clone, Copy)]
pub struct CriteriaFilter {
    bedrooms: u8,
    max_price: u64,
}

impl CriteriaFilter {
    pub fn new(criteria: &SearchCriteria) -> Self {
        Self {
            bedrooms: criteria.bedrooms,
            max_price: criteria.max_price,
        }
    }

    /// Unknown or zero bedroom counts and non-numeric prices are given the
    /// benefit of the doubt. A zero in the criteria disables the bedroom check.
    pub fn keeps(&self, listing: &ListingRecord) -> bool {
        let bedrooms_match = match listing.bedrooms {
            Some(bedrooms) if bedrooms > 0 && self.bedrooms > 0 => bedrooms == self.bedrooms,
            _ => true,
        };
        let within_budget = listing
            .rent_amount()
            .map_or(true, |rent| rent <= self.max_price);
        bedrooms_match && within_budget
    }
}
