pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod mapping;
pub mod scrub;
pub mod server;
pub mod source;
pub mod view;

pub use config::Config;
pub use error::{Error, Result};
pub use export::{CsvExporter, ExportConfig};
pub use extract::{DataExtractor, Lead, PageAnalyzer};
pub use mapping::{resolve, ExtractionRequest, FieldMapping, PresetLibrary};
