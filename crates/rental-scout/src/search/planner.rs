use crate::config::{ConfigError, SearchCriteria};

pub const LISTING_HOST: &str = "https://listado.mercadolibre.com.uy";

/// Results per page; later pages are addressed by offset in the path.
const PAGE_STRIDE: u32 = 50;

/// Resolved search for a single neighborhood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub neighborhood: String,
    pub slug: String,
    pub bedrooms: u8,
    pub department: String,
    pub min_price: u64,
    pub max_price: u64,
    pub last_24_hours: bool,
}

impl QueryDescriptor {
    pub fn search_url(&self) -> String {
        let recency = if self.last_24_hours {
            "_PublishedToday_YES"
        } else {
            ""
        };
        format!(
            "{host}/inmuebles/apartamentos/{bedrooms}-dormitorios/{department}/{slug}_PriceRange_{min}UYU-{max}UYU{recency}_NoIndex_True",
            host = LISTING_HOST,
            bedrooms = self.bedrooms,
            department = self.department,
            slug = self.slug,
            min = self.min_price,
            max = self.max_price,
        )
    }

    /// URL of a 1-based results page.
    pub fn page_url(&self, page: u32) -> String {
        let base = self.search_url();
        if page <= 1 {
            base
        } else {
            format!("{base}_Desde_{}", (page - 1) * PAGE_STRIDE)
        }
    }
}

pub struct QueryPlanner<'a> {
    criteria: &'a SearchCriteria,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(criteria: &'a SearchCriteria) -> Self {
        Self { criteria }
    }

    /// One descriptor per configured neighborhood, or only `only` when given.
    pub fn plan(&self, only: Option<&str>) -> Result<Vec<QueryDescriptor>, ConfigError> {
        match only {
            Some(name) => {
                let (name, slug) = self.criteria.neighborhoods.get_key_value(name).ok_or_else(
                    || ConfigError::UnknownNeighborhood {
                        name: name.to_string(),
                        known: self.criteria.neighborhoods.keys().cloned().collect(),
                    },
                )?;
                Ok(vec![self.descriptor(name, slug)])
            }
            None => Ok(self
                .criteria
                .neighborhoods
                .iter()
                .map(|(name, slug)| self.descriptor(name, slug))
                .collect()),
        }
    }

    fn descriptor(&self, name: &str, slug: &str) -> QueryDescriptor {
        QueryDescriptor {
            neighborhood: name.to_string(),
            slug: slug.trim().to_string(),
            bedrooms: self.criteria.bedrooms,
            department: self.criteria.department.clone(),
            min_price: self.criteria.min_price,
            max_price: self.criteria.max_price,
            last_24_hours: self.criteria.last_24_hours,
        }
    }
}
