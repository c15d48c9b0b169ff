use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{ColumnLayout, ExportConfig, UTF8_BOM};
use crate::error::{Error, Result};
use crate::extract::Lead;

const EXPORT_DATE_COLUMN: &str = "Export Date";
const TOTAL_RECORDS_COLUMN: &str = "Total Records";

/// A CSV file written by [`CsvExporter::export`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub record_count: usize,
}

/// An entry of the export directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub filename: String,
    pub size: u64,
    pub created: DateTime<Local>,
    pub path: PathBuf,
}

/// Writes leads to spreadsheet-friendly CSV files.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    export_dir: PathBuf,
}

impl CsvExporter {
    pub fn new<P: Into<PathBuf>>(export_dir: P) -> Result<Self> {
        let export_dir = export_dir.into();
        fs::create_dir_all(&export_dir)?;
        Ok(Self { export_dir })
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Write `leads` to a new file in the export directory.
    pub fn export(&self, leads: &[Lead], config: &ExportConfig) -> Result<ExportedFile> {
        if leads.is_empty() {
            return Err(Error::NoData("No lead data provided for export".to_string()));
        }

        // The directory may have been removed since construction.
        fs::create_dir_all(&self.export_dir)?;

        let filename = generate_filename(config, leads.len());
        let path = self.export_dir.join(&filename);

        let mut file = BufWriter::new(File::create(&path)?);
        write_csv(leads, config, &mut file)?;
        file.flush()?;

        info!("Successfully exported {} leads to {}", leads.len(), path.display());

        #[cfg(feature = "metrics")]
        metrics::counter!("leadliftr_csv_exports_total", 1);

        Ok(ExportedFile {
            path,
            record_count: leads.len(),
        })
    }

    /// CSV files in the export directory, newest first.
    pub fn export_history(&self) -> Result<Vec<ExportRecord>> {
        let mut records = Vec::new();
        if !self.export_dir.exists() {
            return Ok(records);
        }

        for entry in fs::read_dir(&self.export_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
                continue;
            }

            let metadata = entry.metadata()?;
            let created = match metadata.created().or_else(|_| metadata.modified()) {
                Ok(time) => DateTime::<Local>::from(time),
                Err(e) => {
                    warn!("No timestamp for {}: {}", path.display(), e);
                    continue;
                }
            };

            records.push(ExportRecord {
                filename: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                created,
                path,
            });
        }

        records.sort_by(|a, b| b.created.cmp(&a.created));
        debug!("Found {} previous exports", records.len());
        Ok(records)
    }
}

/// Serialize leads as CSV into `writer`: UTF-8 BOM, then a header row and
/// one row per lead, every field quoted.
pub fn write_csv<W: Write>(leads: &[Lead], config: &ExportConfig, mut writer: W) -> Result<()> {
    if leads.is_empty() {
        return Err(Error::NoData("No lead data provided for export".to_string()));
    }

    let layout = ColumnLayout::for_leads(leads, &config.columns);
    let mut headers = layout.headers(config.options.use_display_names);
    let formats: Vec<ColumnFormat> = headers.iter().map(|h| ColumnFormat::for_header(h)).collect();

    let metadata = config.options.include_metadata.then(|| {
        [
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            leads.len().to_string(),
        ]
    });
    if metadata.is_some() {
        headers.push(EXPORT_DATE_COLUMN.to_string());
        headers.push(TOTAL_RECORDS_COLUMN.to_string());
    }

    writer.write_all(UTF8_BOM)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv_writer.write_record(&headers)?;
    for lead in leads {
        let mut row: Vec<String> = layout
            .row(lead)
            .iter()
            .zip(&formats)
            .map(|(value, format)| format.apply(value))
            .collect();
        if let Some(extra) = &metadata {
            row.extend(extra.iter().cloned());
        }
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// The CSV document as bytes, for sending over HTTP.
pub fn render_csv(leads: &[Lead], config: &ExportConfig) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(leads, config, &mut buffer)?;
    Ok(buffer)
}

/// Target filename: the configured one (with `.csv` appended if missing) or
/// `crm_leads_{n}_records_{timestamp}.csv`. Characters outside `[\w\-.]`
/// become `_`.
pub fn generate_filename(config: &ExportConfig, record_count: usize) -> String {
    match config.filename.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => custom_filename(name),
        _ => format!(
            "crm_leads_{}_records_{}.csv",
            record_count,
            Local::now().format("%Y%m%d_%H%M%S")
        ),
    }
}

/// A user-chosen export name: `.csv` appended when missing, and every
/// character other than alphanumerics, `_`, `-` and `.` replaced so the file
/// stays inside the export directory.
pub fn custom_filename(name: &str) -> String {
    let name = name.trim();
    if name.ends_with(".csv") {
        sanitize_filename(name)
    } else {
        sanitize_filename(&format!("{name}.csv"))
    }
}

fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnFormat {
    Plain,
    Email,
    Phone,
    Name,
}

impl ColumnFormat {
    fn for_header(header: &str) -> Self {
        let header = header.to_lowercase();
        if header.contains("email") {
            Self::Email
        } else if header.contains("phone") {
            Self::Phone
        } else if header.contains("name") || header.contains("company") {
            Self::Name
        } else {
            Self::Plain
        }
    }

    fn apply(self, value: &str) -> String {
        let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
        match self {
            Self::Plain => value,
            Self::Email => value.to_lowercase(),
            Self::Phone => format_phone(&value),
            Self::Name => format_name(&value),
        }
    }
}

/// US phone formatting; anything that is not 10 digits, or 11 starting
/// with 1, is returned unchanged.
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
    let all_digits = digits.chars().all(|c| c.is_ascii_digit());

    match digits.len() {
        10 if all_digits => format!("({}) {}-{}", &digits[..3], &digits[3..6], &digits[6..]),
        11 if all_digits && digits.starts_with('1') => {
            format!("+1 ({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..])
        }
        _ => phone.to_string(),
    }
}

/// Capitalize each word; parts of a word separated by an apostrophe are
/// capitalized separately (`o'connor` -> `O'Connor`).
pub fn format_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| word.split('\'').map(capitalize).collect::<Vec<_>>().join("'"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
