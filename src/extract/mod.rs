pub mod analyzer;
pub mod batch;
pub mod cleaner;
pub mod extractor;

use serde::{Deserialize, Serialize};

use crate::mapping::SelectorMap;

pub use analyzer::{PageAnalysis, PageAnalyzer};
pub use batch::BatchProcessor;
pub use cleaner::FieldCleaner;
pub use extractor::DataExtractor;

/// Fields that make a lead worth keeping under [`Validity::Strict`].
pub const IDENTITY_FIELDS: [&str; 3] = ["name", "email", "company"];

/// One extracted record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(flatten)]
    pub fields: SelectorMap<String>,
    /// 1-based position of the source container on the page.
    #[serde(rename = "_extraction_index", default)]
    pub extraction_index: usize,
}

impl Lead {
    pub fn new(extraction_index: usize) -> Self {
        Self {
            fields: SelectorMap::new(),
            extraction_index,
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name, value.to_string());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_any(&self, fields: &[&str]) -> bool {
        fields
            .iter()
            .any(|f| self.get(f).map_or(false, |v| !v.is_empty()))
    }
}

/// Which field-specific cleanup rules apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleaningProfile {
    /// Validate email/phone/name/company and drop values that do not fit.
    #[default]
    Standard,
    /// Light normalization for bulk dialer lists (first/last name, number, city, state, zip).
    Bulk,
}

/// Minimum content for an extracted lead to be kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// At least one of name, email or company.
    #[default]
    Strict,
    /// Any non-empty field.
    Permissive,
}

impl Validity {
    pub fn accepts(&self, lead: &Lead) -> bool {
        match self {
            Validity::Strict => lead.has_any(&IDENTITY_FIELDS),
            Validity::Permissive => !lead.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionPolicy {
    pub cleaning: CleaningProfile,
    pub validity: Validity,
}

impl ExtractionPolicy {
    pub fn bulk() -> Self {
        Self {
            cleaning: CleaningProfile::Bulk,
            validity: Validity::Permissive,
        }
    }
}

/// Cut a sample string to at most `max_chars` characters.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
