pub mod ordered;
pub mod preset;
pub mod resolver;

use serde::{Deserialize, Serialize};

pub use ordered::SelectorMap;
pub use preset::{Preset, PresetLibrary};
pub use resolver::{apply_preset, parse_max_leads, resolve};

/// Bound used when the requested number of leads is missing or unusable.
pub const DEFAULT_MAX_LEADS: usize = 100;

/// One row of the field-mapping table as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub selector: String,
}

impl FieldMapping {
    pub fn new(name: impl Into<String>, label: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            selector: selector.into(),
        }
    }

    /// The rows a fresh mapping table starts with: common lead fields, no selectors.
    pub fn default_rows() -> Vec<FieldMapping> {
        [("name", "Name"), ("email", "Email"), ("phone", "Phone"), ("company", "Company")]
            .into_iter()
            .map(|(name, label)| FieldMapping::new(name, label, ""))
            .collect()
    }
}

/// Where an extracted value is read from on the matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValueSource {
    #[default]
    Text,
    Html,
    Attribute(String),
}

impl From<String> for ValueSource {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" | "text" => ValueSource::Text,
            "html" => ValueSource::Html,
            _ => ValueSource::Attribute(value),
        }
    }
}

impl From<ValueSource> for String {
    fn from(value: ValueSource) -> Self {
        match value {
            ValueSource::Text => "text".to_string(),
            ValueSource::Html => "html".to_string(),
            ValueSource::Attribute(name) => name,
        }
    }
}

/// Selector for one field: either a bare CSS selector or a selector with the
/// attribute to read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSelector {
    Css(String),
    Detailed {
        selector: String,
        #[serde(default)]
        attribute: ValueSource,
    },
}

impl FieldSelector {
    pub fn selector(&self) -> &str {
        match self {
            FieldSelector::Css(selector) => selector,
            FieldSelector::Detailed { selector, .. } => selector,
        }
    }

    pub fn source(&self) -> ValueSource {
        match self {
            FieldSelector::Css(_) => ValueSource::Text,
            FieldSelector::Detailed { attribute, .. } => attribute.clone(),
        }
    }
}

impl From<String> for FieldSelector {
    fn from(selector: String) -> Self {
        FieldSelector::Css(selector)
    }
}

impl From<&str> for FieldSelector {
    fn from(selector: &str) -> Self {
        FieldSelector::Css(selector.to_string())
    }
}

/// Which front-end flow produced a request.
///
/// Both flows share one pipeline; they differ only in where the HTML comes
/// from and in the default export flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    PastedHtml,
    LiveTab,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default = "default_use_display_names")]
    pub use_display_names: bool,
    #[serde(default)]
    pub include_metadata: bool,
}

impl ExportOptions {
    pub fn for_source(source: InputSource) -> Self {
        Self {
            use_display_names: true,
            include_metadata: matches!(source, InputSource::PastedHtml),
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            use_display_names: default_use_display_names(),
            include_metadata: false,
        }
    }
}

fn default_use_display_names() -> bool {
    true
}

/// Canonical, validated extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub field_mappings: SelectorMap<FieldSelector>,
    /// Empty means the whole document is one record.
    #[serde(default)]
    pub container_selector: String,
    pub max_leads: usize,
    #[serde(default)]
    pub export_options: ExportOptions,
}

impl ExtractionRequest {
    /// Build a request from already-keyed mappings, normalizing the bound and
    /// dropping entries whose name or selector is blank.
    pub fn new(
        field_mappings: SelectorMap<FieldSelector>,
        container_selector: &str,
        max_leads: Option<usize>,
        export_options: ExportOptions,
    ) -> Self {
        let field_mappings = field_mappings
            .into_iter()
            .filter(|(name, selector)| !name.trim().is_empty() && !selector.selector().trim().is_empty())
            .map(|(name, selector)| (name.trim().to_string(), selector))
            .collect();

        Self {
            field_mappings,
            container_selector: container_selector.trim().to_string(),
            max_leads: max_leads.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_LEADS),
            export_options,
        }
    }

    pub fn container(&self) -> Option<&str> {
        if self.container_selector.is_empty() {
            None
        } else {
            Some(&self.container_selector)
        }
    }
}

/// Human-readable label for a snake_case field name: `zip_code` -> `Zip Code`.
pub fn display_label(field_name: &str) -> String {
    let mut label = String::with_capacity(field_name.len());
    let mut at_boundary = true;
    for ch in field_name.replace('_', " ").chars() {
        let is_word = ch.is_alphanumeric();
        if is_word && at_boundary {
            label.extend(ch.to_uppercase());
        } else {
            label.push(ch);
        }
        at_boundary = !is_word;
    }
    label
}
