use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::extractor::element_text;
use super::truncate_chars;
use crate::error::{Error, Result};
use crate::mapping::SelectorMap;

const CONTAINER_PATTERNS: [&str; 9] = [
    "tr",
    ".lead",
    ".contact",
    ".record",
    "[data-lead]",
    "[data-contact]",
    ".row",
    ".item",
    ".entry",
];

const FIELD_PATTERNS: [(&str, &[&str]); 4] = [
    (
        "email",
        &["input[type=\"email\"]", "[data-field=\"email\"]", ".email", "a[href^=\"mailto:\"]"],
    ),
    (
        "phone",
        &["input[type=\"tel\"]", "[data-field=\"phone\"]", ".phone", "a[href^=\"tel:\"]"],
    ),
    ("name", &["[data-field=\"name\"]", ".name", ".contact-name", "h1, h2, h3"]),
    (
        "company",
        &["[data-field=\"company\"]", ".company", ".organization", ".company-name"],
    ),
];

const CONTAINER_SAMPLE_CHARS: usize = 100;
const FIELD_SAMPLE_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSuggestion {
    pub selector: String,
    pub count: usize,
    pub sample_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSuggestion {
    pub selector: String,
    pub count: usize,
    pub sample_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureCounts {
    pub total_elements: usize,
    pub forms: usize,
    pub tables: usize,
    pub lists: usize,
    pub has_data_attributes: bool,
}

/// Selector suggestions for a page the user has not mapped yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub potential_containers: Vec<ContainerSuggestion>,
    pub field_suggestions: SelectorMap<Vec<FieldSuggestion>>,
    pub analysis: StructureCounts,
}

/// Looks for common CRM markup patterns: repeated record containers and
/// elements that usually hold contact fields.
pub struct PageAnalyzer {
    containers: Vec<(&'static str, Selector)>,
    fields: Vec<(&'static str, Vec<(&'static str, Selector)>)>,
    any_element: Selector,
    forms: Selector,
    tables: Selector,
    lists: Selector,
}

fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::invalid_selector(css, e))
}

impl PageAnalyzer {
    pub fn new() -> Result<Self> {
        let containers = CONTAINER_PATTERNS
            .iter()
            .map(|css| Ok((*css, compile(css)?)))
            .collect::<Result<Vec<_>>>()?;

        let fields = FIELD_PATTERNS
            .iter()
            .map(|(field, patterns)| {
                let compiled = patterns
                    .iter()
                    .map(|css| Ok((*css, compile(css)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok((*field, compiled))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            containers,
            fields,
            any_element: compile("*")?,
            forms: compile("form")?,
            tables: compile("table")?,
            lists: compile("ul, ol")?,
        })
    }

    pub fn analyze(&self, html: &str) -> PageAnalysis {
        let document = Html::parse_document(html);
        let mut result = PageAnalysis::default();

        for (css, selector) in &self.containers {
            let matches: Vec<_> = document.select(selector).collect();
            // A single match is not a repeating record.
            if matches.len() > 1 {
                result.potential_containers.push(ContainerSuggestion {
                    selector: css.to_string(),
                    count: matches.len(),
                    sample_text: truncate_chars(&element_text(matches[0]), CONTAINER_SAMPLE_CHARS),
                });
            }
        }

        for (field, patterns) in &self.fields {
            let suggestions: Vec<FieldSuggestion> = patterns
                .iter()
                .filter_map(|(css, selector)| {
                    let matches: Vec<_> = document.select(selector).collect();
                    let first = matches.first()?;
                    Some(FieldSuggestion {
                        selector: css.to_string(),
                        count: matches.len(),
                        sample_value: truncate_chars(&element_text(*first), FIELD_SAMPLE_CHARS),
                    })
                })
                .collect();

            if !suggestions.is_empty() {
                result.field_suggestions.insert(*field, suggestions);
            }
        }

        let elements: Vec<_> = document.select(&self.any_element).collect();
        result.analysis = StructureCounts {
            total_elements: elements.len(),
            forms: document.select(&self.forms).count(),
            tables: document.select(&self.tables).count(),
            lists: document.select(&self.lists).count(),
            has_data_attributes: elements
                .iter()
                .any(|el| el.value().attrs().any(|(name, _)| name.starts_with("data-"))),
        };

        debug!(
            "Page analysis: {} container candidates, {} field types",
            result.potential_containers.len(),
            result.field_suggestions.len()
        );

        result
    }
}
