use super::ConfigError;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DEFAULT_HISTORY_FILE: &str = "visited_listings.txt";
const DEFAULT_MAX_PAGES: u32 = 3;

/// Immutable search parameters shared read-only by every pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// Neighborhood name to marketplace search slug, in configured order.
    pub neighborhoods: IndexMap<String, String>,
    pub min_price: u64,
    pub max_price: u64,
    pub bedrooms: u8,
    pub department: String,
    pub last_24_hours: bool,
    pub excluded_keywords: Vec<String>,
    pub fetch_fees: bool,
    pub max_pages: u32,
}

/// Where the dedup history lives and whether it filters by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    pub filter_duplicates: bool,
    pub path: PathBuf,
}

/// Parsed and validated contents of the search configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub criteria: SearchCriteria,
    pub history: HistoryConfig,
}

impl SearchConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ConfigError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ConfigError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::parse(&raw, path)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Self::parse(raw, Path::new("<inline>"))
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: SearchFile = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        file.validate()
    }
}

#[derive(Debug, Deserialize)]
struct SearchFile {
    #[serde(default)]
    neighborhoods: IndexMap<String, String>,
    #[serde(default)]
    excluded_keywords: Vec<String>,
    query: QuerySection,
    #[serde(default)]
    history: HistorySection,
    #[serde(default)]
    enrichment: EnrichmentSection,
    #[serde(default)]
    max_pages: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QuerySection {
    bedrooms: Value,
    department: String,
    #[serde(default)]
    min_price: Option<Value>,
    max_price: Value,
    #[serde(default)]
    last_24_hours: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct HistorySection {
    filter_duplicates: bool,
    path: PathBuf,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            filter_duplicates: true,
            path: PathBuf::from(DEFAULT_HISTORY_FILE),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct EnrichmentSection {
    fetch_fees: bool,
}

impl Default for EnrichmentSection {
    fn default() -> Self {
        Self { fetch_fees: true }
    }
}

impl SearchFile {
    fn validate(self) -> Result<SearchConfig, ConfigError> {
        if self.neighborhoods.is_empty() {
            return Err(ConfigError::NoNeighborhoods);
        }
        if let Some((name, _)) = self
            .neighborhoods
            .iter()
            .find(|(_, slug)| slug.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "neighborhoods",
                value: name.clone(),
            });
        }

        let department = self.query.department.trim().to_string();
        if department.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "query.department",
                value: self.query.department,
            });
        }

        let min_price = match &self.query.min_price {
            Some(value) => whole_number("query.min_price", value)?,
            None => 0,
        };
        let max_price = whole_number("query.max_price", &self.query.max_price)?;
        if min_price > max_price {
            return Err(ConfigError::InvalidValue {
                field: "query.min_price",
                value: format!("{min_price} > {max_price}"),
            });
        }

        let bedrooms = whole_number("query.bedrooms", &self.query.bedrooms)?;
        let bedrooms = u8::try_from(bedrooms).map_err(|_| ConfigError::InvalidValue {
            field: "query.bedrooms",
            value: bedrooms.to_string(),
        })?;

        let max_pages = match &self.max_pages {
            Some(value) => whole_number("max_pages", value)?,
            None => u64::from(DEFAULT_MAX_PAGES),
        };
        let max_pages = u32::try_from(max_pages)
            .ok()
            .filter(|pages| *pages >= 1)
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "max_pages",
                value: max_pages.to_string(),
            })?;

        let excluded_keywords = self
            .excluded_keywords
            .into_iter()
            .map(|keyword| keyword.trim().to_string())
            .filter(|keyword| !keyword.is_empty())
            .collect();

        Ok(SearchConfig {
            criteria: SearchCriteria {
                neighborhoods: self.neighborhoods,
                min_price,
                max_price,
                bedrooms,
                department,
                last_24_hours: self.query.last_24_hours,
                excluded_keywords,
                fetch_fees: self.enrichment.fetch_fees,
                max_pages,
            },
            history: HistoryConfig {
                filter_duplicates: self.history.filter_duplicates,
                path: self.history.path,
            },
        })
    }
}

/// Accepts JSON integers and numeric strings such as `"30000"`.
fn whole_number(field: &'static str, value: &Value) -> Result<u64, ConfigError> {
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ConfigError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "neighborhoods": { "pocitos": "pocitos", "punta carretas": "punta-carretas", "centro": "centro" },
        "excluded_keywords": ["Temporario", "  ", "amueblado"],
        "query": {
            "bedrooms": 2,
            "department": "montevideo",
            "min_price": "0",
            "max_price": 30000,
            "last_24_hours": true
        },
        "history": { "filter_duplicates": false, "path": "seen.txt" },
        "enrichment": { "fetch_fees": false },
        "max_pages": 2
    }"#;

    #[test]
    fn parses_full_configuration_in_file_order() {
        let config = SearchConfig::from_json(SAMPLE).expect("sample parses");
        let names: Vec<_> = config.criteria.neighborhoods.keys().cloned().collect();
        assert_eq!(names, vec!["pocitos", "punta carretas", "centro"]);
        assert_eq!(config.criteria.max_price, 30_000);
        assert_eq!(config.criteria.bedrooms, 2);
        assert!(config.criteria.last_24_hours);
        assert!(!config.criteria.fetch_fees);
        assert_eq!(config.criteria.max_pages, 2);
        assert_eq!(config.criteria.excluded_keywords, vec!["Temporario", "amueblado"]);
        assert_eq!(
            config.history,
            HistoryConfig {
                filter_duplicates: false,
                path: PathBuf::from("seen.txt"),
            }
        );
    }

    #[test]
    fn applies_defaults_for_optional_sections() {
        let config = SearchConfig::from_json(
            r#"{"neighborhoods": {"pocitos": "pocitos"},
                "query": {"bedrooms": "1", "department": "montevideo", "max_price": "25000"}}"#,
        )
        .expect("minimal config parses");

        assert_eq!(config.criteria.min_price, 0);
        assert_eq!(config.criteria.max_pages, DEFAULT_MAX_PAGES);
        assert!(config.criteria.fetch_fees);
        assert!(!config.criteria.last_24_hours);
        assert!(config.criteria.excluded_keywords.is_empty());
        assert!(config.history.filter_duplicates);
        assert_eq!(config.history.path, PathBuf::from(DEFAULT_HISTORY_FILE));
    }

    #[test]
    fn rejects_non_numeric_price_bounds() {
        let error = SearchConfig::from_json(
            r#"{"neighborhoods": {"pocitos": "pocitos"},
                "query": {"bedrooms": 2, "department": "montevideo", "max_price": "a lot"}}"#,
        )
        .expect_err("non-numeric price");

        match error {
            ConfigError::InvalidValue { field, value } => {
                assert_eq!(field, "query.max_price");
                assert!(value.contains("a lot"));
            }
            other => panic!("expected invalid value, got {other:?}"),
        }
    }

    #[test]
    fn rejects_inverted_price_range_and_zero_pages() {
        let inverted = SearchConfig::from_json(
            r#"{"neighborhoods": {"pocitos": "pocitos"},
                "query": {"bedrooms": 2, "department": "montevideo", "min_price": 40000, "max_price": 30000}}"#,
        );
        assert!(matches!(
            inverted,
            Err(ConfigError::InvalidValue { field: "query.min_price", .. })
        ));

        let zero_pages = SearchConfig::from_json(
            r#"{"neighborhoods": {"pocitos": "pocitos"}, "max_pages": 0,
                "query": {"bedrooms": 2, "department": "montevideo", "max_price": 30000}}"#,
        );
        assert!(matches!(
            zero_pages,
            Err(ConfigError::InvalidValue { field: "max_pages", .. })
        ));
    }

    #[test]
    fn rejects_empty_neighborhood_map() {
        let error = SearchConfig::from_json(
            r#"{"neighborhoods": {},
                "query": {"bedrooms": 2, "department": "montevideo", "max_price": 30000}}"#,
        )
        .expect_err("no neighborhoods");
        assert!(matches!(error, ConfigError::NoNeighborhoods));
    }

    #[test]
    fn from_path_reports_missing_and_malformed_files() {
        let missing = SearchConfig::from_path("./does-not-exist.json").expect_err("missing file");
        assert!(matches!(missing, ConfigError::NotFound { .. }));

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"{ not json").expect("write");
        let malformed = SearchConfig::from_path(file.path()).expect_err("malformed file");
        assert!(matches!(malformed, ConfigError::Parse { .. }));
    }
}
