use serde::{Deserialize, Serialize};

use crate::extract::Lead;

/// Number of records shown in a preview.
pub const PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewColumn {
    pub field: String,
    pub header: String,
}

/// Tabular preview of extracted leads, ready for display.
///
/// Columns come from the first record; internal `_` fields are hidden and a
/// record missing a column shows an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewTable {
    pub columns: Vec<PreviewColumn>,
    pub rows: Vec<Vec<String>>,
    pub shown: usize,
    pub total: usize,
}

impl PreviewTable {
    pub fn new(leads: &[Lead], total: usize) -> Self {
        let columns: Vec<PreviewColumn> = leads
            .first()
            .map(|first| {
                first
                    .fields
                    .keys()
                    .filter(|field| !field.starts_with('_'))
                    .map(|field| PreviewColumn {
                        field: field.to_string(),
                        header: capitalize_first(field),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let rows = leads
            .iter()
            .map(|lead| {
                columns
                    .iter()
                    .map(|column| lead.get(&column.field).unwrap_or_default().to_string())
                    .collect()
            })
            .collect();

        Self {
            columns,
            rows,
            shown: leads.len(),
            total,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn caption(&self) -> String {
        if self.is_empty() {
            "No data extracted. Please check your field mappings.".to_string()
        } else {
            format!("Showing {} of {} extracted records", self.shown, self.total)
        }
    }

    /// Plain-text rendering with padded columns for terminal output.
    pub fn render_text(&self) -> String {
        let mut out = self.caption();
        if self.is_empty() {
            return out;
        }

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                self.rows
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(column.header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |cells: Vec<&str>| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        out.push_str("\n\n");
        out.push_str(&line(self.columns.iter().map(|c| c.header.as_str()).collect()));
        out.push('\n');
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&line(rule.iter().map(String::as_str).collect()));
        for row in &self.rows {
            out.push('\n');
            out.push_str(&line(row.iter().map(String::as_str).collect()));
        }
        out
    }
}

fn capitalize_first(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_follow_first_record() {
        let leads = vec![
            Lead::new(1).with_field("name", "Ada").with_field("email", "ada@example.com"),
            Lead::new(2).with_field("email", "grace@example.com").with_field("company", "Navy"),
        ];
        let table = PreviewTable::new(&leads, 25);

        let headers: Vec<&str> = table.columns.iter().map(|c| c.header.as_str()).collect();
        assert_eq!(headers, vec!["Name", "Email"]);
        assert_eq!(table.rows[1], vec!["", "grace@example.com"]);
        assert_eq!(table.caption(), "Showing 2 of 25 extracted records");
    }

    #[test]
    fn test_empty_preview() {
        let table = PreviewTable::new(&[], 0);
        assert!(table.is_empty());
        assert!(table.columns.is_empty());
        assert_eq!(table.render_text(), "No data extracted. Please check your field mappings.");
    }

    #[test]
    fn test_render_text_pads_columns() {
        let leads = vec![Lead::new(1).with_field("name", "Ada Lovelace").with_field("lead_score", "9")];
        let text = PreviewTable::new(&leads, 1).render_text();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Showing 1 of 1 extracted records");
        assert_eq!(lines[2], "Name          Lead_score");
        assert_eq!(lines[3], "------------  ----------");
        assert_eq!(lines[4], "Ada Lovelace  9");
    }
}
