use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::{ExtractionPolicy, FieldCleaner, Lead};
use crate::error::{Error, Result};
use crate::mapping::{ExtractionRequest, FieldSelector, SelectorMap, ValueSource};

/// Field selectors compiled once per request. Fields whose selector does not
/// parse are left out.
pub struct CompiledMappings {
    fields: Vec<(String, Selector, ValueSource)>,
}

impl CompiledMappings {
    pub fn compile(mappings: &SelectorMap<FieldSelector>) -> Self {
        let fields = mappings
            .iter()
            .filter_map(|(name, field)| match Selector::parse(field.selector()) {
                Ok(selector) => Some((name.to_string(), selector, field.source())),
                Err(e) => {
                    debug!("Skipping field {} with selector {}: {}", name, field.selector(), e);
                    None
                }
            })
            .collect();

        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Pulls lead records out of HTML using the field mappings of an
/// [`ExtractionRequest`].
#[derive(Debug)]
pub struct DataExtractor {
    cleaner: FieldCleaner,
    policy: ExtractionPolicy,
}

impl DataExtractor {
    pub fn new() -> Result<Self> {
        Self::with_policy(ExtractionPolicy::default())
    }

    pub fn with_policy(policy: ExtractionPolicy) -> Result<Self> {
        Ok(Self {
            cleaner: FieldCleaner::new(policy.cleaning)?,
            policy,
        })
    }

    pub fn policy(&self) -> ExtractionPolicy {
        self.policy
    }

    /// Extract leads from a full HTML document.
    ///
    /// With a container selector, each of the first `max_leads` containers
    /// yields at most one lead; otherwise the whole document is a single
    /// record. Leads that fail the validity rule are discarded, but the
    /// survivors keep the index of their container.
    pub fn extract_leads(&self, html: &str, request: &ExtractionRequest) -> Result<Vec<Lead>> {
        if html.trim().is_empty() || request.field_mappings.is_empty() {
            warn!("Missing HTML content or field mappings");
            return Ok(Vec::new());
        }

        let container = request
            .container()
            .map(|css| Selector::parse(css).map_err(|e| Error::invalid_selector(css, e)))
            .transpose()?;

        let document = Html::parse_document(html);
        let mappings = CompiledMappings::compile(&request.field_mappings);
        let mut leads = Vec::new();

        match container {
            Some(container) => {
                let containers: Vec<ElementRef> = document.select(&container).collect();
                info!(
                    "Found {} lead containers using selector: {}",
                    containers.len(),
                    request.container_selector
                );

                for (i, element) in containers.into_iter().take(request.max_leads).enumerate() {
                    if let Some(lead) = self.extract_from_element(element, &mappings, i + 1) {
                        leads.push(lead);
                    }
                }
            }
            None => {
                if let Some(lead) = self.extract_from_element(document.root_element(), &mappings, 1) {
                    leads.push(lead);
                }
            }
        }

        info!("Successfully extracted {} valid leads", leads.len());

        #[cfg(feature = "metrics")]
        metrics::counter!("leadliftr_leads_extracted_total", leads.len() as u64);

        Ok(leads)
    }

    /// Build one lead from the first match of every field selector inside
    /// `scope`. Returns `None` when the lead does not satisfy the policy.
    pub fn extract_from_element(
        &self,
        scope: ElementRef,
        mappings: &CompiledMappings,
        extraction_index: usize,
    ) -> Option<Lead> {
        let mut lead = Lead::new(extraction_index);

        for (name, selector, source) in &mappings.fields {
            let Some(element) = scope.select(selector).next() else {
                continue;
            };

            let raw = read_value(element, source);
            if let Some(value) = self.cleaner.clean(name, &raw) {
                lead.fields.insert(name.as_str(), value);
            }
        }

        self.policy.validity.accepts(&lead).then_some(lead)
    }
}

/// Text, outer HTML, or attribute value of an element.
pub fn read_value(element: ElementRef, source: &ValueSource) -> String {
    match source {
        ValueSource::Text => element_text(element),
        ValueSource::Html => element.html(),
        ValueSource::Attribute(name) => element.value().attr(name).unwrap_or_default().to_string(),
    }
}

/// Text content with each text node trimmed and the pieces joined by a space.
pub fn element_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
