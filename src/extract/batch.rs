use scraper::{Html, Selector};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use super::extractor::CompiledMappings;
use super::{DataExtractor, ExtractionPolicy, Lead};
use crate::error::{Error, Result};
use crate::export::{ColumnLayout, UTF8_BOM};
use crate::mapping::ExtractionRequest;

pub const DEFAULT_BATCH_SIZE: usize = 5000;
/// Container bound used for bulk runs when the request leaves it at the interactive default.
pub const BULK_MAX_LEADS: usize = 500_000;

/// Column order dialer imports expect.
pub const BULK_COLUMN_ORDER: [&str; 6] = ["first_name", "last_name", "number", "city", "state", "zip_code"];

/// Extracts very large pages in fixed-size batches so that records can be
/// written out as they are produced.
#[derive(Debug)]
pub struct BatchProcessor {
    batch_size: usize,
    extractor: DataExtractor,
}

impl BatchProcessor {
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidInput("Batch size must be greater than 0".to_string()));
        }

        Ok(Self {
            batch_size,
            extractor: DataExtractor::with_policy(ExtractionPolicy::bulk())?,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Run the extraction and hand each batch to `on_batch` in page order.
    ///
    /// A container selector is required; without one nothing is produced.
    /// Returns the number of leads produced.
    pub fn process<F>(&self, html: &str, request: &ExtractionRequest, max_leads: usize, mut on_batch: F) -> Result<usize>
    where
        F: FnMut(Vec<Lead>) -> Result<()>,
    {
        let Some(container_css) = request.container() else {
            warn!("Container selector required for large dataset processing");
            return Ok(0);
        };
        if html.trim().is_empty() || request.field_mappings.is_empty() {
            warn!("Missing HTML content or field mappings");
            return Ok(0);
        }

        let container = Selector::parse(container_css).map_err(|e| Error::invalid_selector(container_css, e))?;
        let document = Html::parse_document(html);
        let mappings = CompiledMappings::compile(&request.field_mappings);

        let containers: Vec<_> = document.select(&container).take(max_leads).collect();
        info!(
            "Processing {} lead containers in batches of {}",
            containers.len(),
            self.batch_size
        );

        let mut produced = 0;
        for (batch_number, chunk) in containers.chunks(self.batch_size).enumerate() {
            let offset = batch_number * self.batch_size;
            let batch: Vec<Lead> = chunk
                .iter()
                .enumerate()
                .filter_map(|(i, element)| self.extractor.extract_from_element(*element, &mappings, offset + i + 1))
                .collect();

            info!("Processed batch {}: {} valid leads", batch_number + 1, batch.len());
            produced += batch.len();
            on_batch(batch)?;
        }

        Ok(produced)
    }

    /// Collect all batches in memory.
    pub fn batches(&self, html: &str, request: &ExtractionRequest, max_leads: usize) -> Result<Vec<Vec<Lead>>> {
        let mut batches = Vec::new();
        self.process(html, request, max_leads, |batch| {
            batches.push(batch);
            Ok(())
        })?;
        Ok(batches)
    }

    /// Stream every batch into one CSV file with a single header row.
    ///
    /// Columns follow [`BULK_COLUMN_ORDER`], then any other mapped field.
    pub fn export_large_csv<P: AsRef<Path>>(
        &self,
        html: &str,
        request: &ExtractionRequest,
        max_leads: usize,
        output_path: P,
    ) -> Result<usize> {
        let output_path = output_path.as_ref();
        let layout = ColumnLayout::for_bulk(request, &BULK_COLUMN_ORDER);

        let mut file = BufWriter::new(File::create(output_path)?);
        file.write_all(UTF8_BOM)?;
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        writer.write_record(layout.headers(request.export_options.use_display_names))?;

        let total = self.process(html, request, max_leads, |batch| {
            for lead in &batch {
                writer.write_record(layout.row(lead))?;
            }
            writer.flush()?;
            info!("Exported batch: {} records", batch.len());
            Ok(())
        })?;

        writer.flush()?;
        info!("Successfully exported {} records to {}", total, output_path.display());
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{resolve, ExportOptions, FieldMapping};

    fn dialer_page(rows: usize) -> String {
        let mut html = String::from("<table><tbody>");
        for i in 0..rows {
            html.push_str(&format!(
                "<tr class=\"row\"><td class=\"first\">first{i}</td><td class=\"last\">LAST{i}</td>\
                 <td class=\"num\">555 000 {i:04}</td><td class=\"zip\">ab{i}</td></tr>"
            ));
        }
        html.push_str("<tr class=\"row\"></tr></tbody></table>");
        html
    }

    fn dialer_request() -> ExtractionRequest {
        let rows = vec![
            FieldMapping::new("zip_code", "", ".zip"),
            FieldMapping::new("first_name", "", ".first"),
            FieldMapping::new("last_name", "", ".last"),
            FieldMapping::new("number", "", ".num"),
        ];
        resolve(&rows, "tr.row", "", ExportOptions::default())
    }

    #[test]
    fn test_batches_split_and_index() {
        let processor = BatchProcessor::new(4).unwrap();
        let batches = processor
            .batches(&dialer_page(10), &dialer_request(), BULK_MAX_LEADS)
            .unwrap();

        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        // The trailing empty row is dropped by the permissive rule.
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(batches[1][0].extraction_index, 5);
        assert_eq!(batches[0][0].get("first_name"), Some("First0"));
        assert_eq!(batches[0][0].get("zip_code"), Some("AB0"));
    }

    #[test]
    fn test_requires_container() {
        let processor = BatchProcessor::new(4).unwrap();
        let mut request = dialer_request();
        request.container_selector.clear();

        let batches = processor.batches(&dialer_page(3), &request, BULK_MAX_LEADS).unwrap();
        assert!(batches.is_empty());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(matches!(BatchProcessor::new(0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_export_large_csv_single_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulk.csv");

        let processor = BatchProcessor::new(3).unwrap();
        let total = processor
            .export_large_csv(&dialer_page(7), &dialer_request(), BULK_MAX_LEADS, &path)
            .unwrap();
        assert_eq!(total, 7);

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "First Name,Last Name,Number,Zip Code");
        assert_eq!(lines[1], "First0,Last0,555 000 0000,AB0");
    }
}
