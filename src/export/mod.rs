pub mod csv_exporter;

use serde::{Deserialize, Serialize};

use crate::extract::cleaner::title_case;
use crate::extract::Lead;
use crate::mapping::{ExportOptions, ExtractionRequest};

pub use csv_exporter::{custom_filename, generate_filename, render_csv, write_csv, CsvExporter, ExportRecord, ExportedFile};

/// Byte order mark written ahead of every CSV so spreadsheet tools detect UTF-8.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const EXTRACTION_INDEX_COLUMN: &str = "_extraction_index";

/// Preferred column order for interactive exports.
pub const DEFAULT_COLUMNS: [&str; 10] = [
    "name",
    "email",
    "phone",
    "company",
    "title",
    "status",
    "lead_source",
    "notes",
    "created_date",
    "last_contact",
];

const DISPLAY_NAMES: [(&str, &str); 11] = [
    ("name", "Full Name"),
    ("email", "Email Address"),
    ("phone", "Phone Number"),
    ("company", "Company Name"),
    ("title", "Job Title"),
    ("status", "Lead Status"),
    ("lead_source", "Lead Source"),
    ("notes", "Notes"),
    ("created_date", "Created Date"),
    ("last_contact", "Last Contact Date"),
    (EXTRACTION_INDEX_COLUMN, "Extraction Index"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelection {
    /// Explicit column list; columns not present in the data are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(flatten)]
    pub options: ExportOptions,
    #[serde(default)]
    pub columns: ColumnSelection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl From<ExportOptions> for ExportConfig {
    fn from(options: ExportOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }
}

/// Header text for a field column.
pub fn display_name(column: &str) -> String {
    DISPLAY_NAMES
        .iter()
        .find(|(field, _)| *field == column)
        .map(|(_, display)| display.to_string())
        .unwrap_or_else(|| title_case(&column.replace('_', " ")))
}

/// The ordered set of columns a CSV is written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    columns: Vec<String>,
}

impl ColumnLayout {
    /// Columns for an in-memory export: the explicit selection if given,
    /// otherwise [`DEFAULT_COLUMNS`] followed by every other field in the
    /// order first seen, leaving out internal `_` columns.
    pub fn for_leads(leads: &[Lead], selection: &ColumnSelection) -> Self {
        let mut present: Vec<&str> = Vec::new();
        for lead in leads {
            for field in lead.fields.keys() {
                if !present.contains(&field) {
                    present.push(field);
                }
            }
        }

        let columns = match &selection.include_columns {
            Some(include) => include
                .iter()
                .filter(|c| c.as_str() == EXTRACTION_INDEX_COLUMN || present.contains(&c.as_str()))
                .cloned()
                .collect(),
            None => Self::ordered(&present, &DEFAULT_COLUMNS),
        };

        Self { columns }
    }

    /// Columns for a streamed export, known up front from the mapping.
    pub fn for_bulk(request: &ExtractionRequest, preferred: &[&str]) -> Self {
        let fields: Vec<&str> = request.field_mappings.keys().collect();
        Self {
            columns: Self::ordered(&fields, preferred),
        }
    }

    fn ordered(fields: &[&str], preferred: &[&str]) -> Vec<String> {
        let mut columns: Vec<String> = preferred
            .iter()
            .filter(|c| fields.contains(*c))
            .map(|c| c.to_string())
            .collect();

        for field in fields {
            if !field.starts_with('_') && !columns.iter().any(|c| c == field) {
                columns.push(field.to_string());
            }
        }
        columns
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn headers(&self, use_display_names: bool) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| if use_display_names { display_name(c) } else { c.clone() })
            .collect()
    }

    pub fn row(&self, lead: &Lead) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| {
                if c == EXTRACTION_INDEX_COLUMN {
                    lead.extraction_index.to_string()
                } else {
                    lead.get(c).unwrap_or_default().to_string()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leads() -> Vec<Lead> {
        vec![
            Lead::new(1).with_field("lead_score", "10").with_field("email", "a@example.com"),
            Lead::new(2).with_field("name", "Ada").with_field("region", "EU"),
        ]
    }

    #[test]
    fn test_default_column_order() {
        let layout = ColumnLayout::for_leads(&leads(), &ColumnSelection::default());
        assert_eq!(layout.columns(), &["name", "email", "lead_score", "region"]);
        assert_eq!(
            layout.headers(true),
            vec!["Full Name", "Email Address", "Lead Score", "Region"]
        );
        assert_eq!(layout.headers(false), vec!["name", "email", "lead_score", "region"]);
    }

    #[test]
    fn test_explicit_columns() {
        let selection = ColumnSelection {
            include_columns: Some(vec![
                "region".to_string(),
                "missing".to_string(),
                EXTRACTION_INDEX_COLUMN.to_string(),
            ]),
        };
        let layout = ColumnLayout::for_leads(&leads(), &selection);
        assert_eq!(layout.columns(), &["region", EXTRACTION_INDEX_COLUMN]);
        assert_eq!(layout.headers(true), vec!["Region", "Extraction Index"]);

        let rows: Vec<Vec<String>> = leads().iter().map(|l| layout.row(l)).collect();
        assert_eq!(rows[0], vec!["", "1"]);
        assert_eq!(rows[1], vec!["EU", "2"]);
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(display_name("last_contact"), "Last Contact Date");
        assert_eq!(display_name("zip_code"), "Zip Code");
        assert_eq!(display_name("URL_path"), "Url Path");
    }

    #[test]
    fn test_export_config_shape() {
        let config: ExportConfig = serde_json::from_str(
            r#"{"include_metadata": true, "columns": {"include_columns": ["email"]}, "filename": "mine"}"#,
        )
        .unwrap();
        assert!(config.options.use_display_names);
        assert!(config.options.include_metadata);
        assert_eq!(config.columns.include_columns.as_deref(), Some(&["email".to_string()][..]));
        assert_eq!(config.filename.as_deref(), Some("mine"));
    }
}
