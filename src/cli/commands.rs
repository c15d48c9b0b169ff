use chrono::Local;
use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use super::{Cli, ExtractArgs};
use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use crate::export::{custom_filename, ColumnSelection, CsvExporter, ExportConfig};
use crate::extract::batch::BULK_MAX_LEADS;
use crate::extract::{BatchProcessor, DataExtractor, PageAnalysis, PageAnalyzer};
use crate::mapping::{apply_preset, resolve, ExportOptions, ExtractionRequest, InputSource};
use crate::scrub::scrub_csv;
use crate::server::{self, AppState};
use crate::source::SourceSpec;
use crate::view::{PreviewTable, PREVIEW_LIMIT};

/// Export flags after the CLI switches have been folded together.
#[derive(Debug, Clone, Default)]
pub struct ExportArgs {
    pub output: Option<PathBuf>,
    pub filename: Option<String>,
    pub use_display_names: bool,
    /// `None` keeps the default of the input source.
    pub include_metadata: Option<bool>,
    pub columns: Vec<String>,
    pub bulk: bool,
}

/// Write a default configuration file
pub async fn init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    info!("Initializing LeadLiftr configuration");

    let config_file = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if config_file.exists() && !force {
        warn!("Configuration file already exists: {}", config_file.display());
        println!("⚠️  Configuration already exists: {}", config_file.display());
        println!("   Use --force to overwrite it.");
        return Ok(());
    }

    let config = Config::default();
    config.save(&config_file)?;
    info!("Created default configuration: {}", config_file.display());

    println!("✅ LeadLiftr initialized successfully!");
    println!("   Config file: {}", config_file.display());
    println!("   Export directory: {}", config.export.export_dir.display());
    println!();
    println!("Next steps:");
    println!("   1. Find selectors: leadliftr analyze page.html");
    println!("   2. Try a mapping: leadliftr preview page.html --container 'tr.lead' --map name=.name");
    println!("   3. Start the API: leadliftr serve");

    Ok(())
}

/// Print every preset with its fields in emission order
pub fn list_presets(config: &Config) -> Result<()> {
    let library = config.presets()?;

    if library.is_empty() {
        println!("📋 No presets defined.");
        return Ok(());
    }

    println!("📋 Field-mapping presets ({}):", library.len());
    for (key, preset) in library.iter() {
        println!();
        println!("   {} - {}", key, preset.name);
        if !preset.container_selector.is_empty() {
            println!("      container: {}", preset.container_selector);
        }
        for row in apply_preset(preset) {
            println!("      {:<16} {}", row.label, row.selector);
        }
    }

    Ok(())
}

/// Suggest selectors for an unmapped page
pub async fn analyze(config: &Config, source: &str, json: bool) -> Result<()> {
    let (html, _) = load_html(config, source).await?;
    let analysis = PageAnalyzer::new()?.analyze(&html);

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }
    Ok(())
}

fn print_analysis(analysis: &PageAnalysis) {
    let counts = &analysis.analysis;
    println!("🔍 Page structure:");
    println!("   Elements: {}", counts.total_elements);
    println!("   Tables: {}  Forms: {}  Lists: {}", counts.tables, counts.forms, counts.lists);
    println!(
        "   Data attributes: {}",
        if counts.has_data_attributes { "yes" } else { "no" }
    );

    if analysis.potential_containers.is_empty() {
        println!("\n📦 No repeating containers found.");
    } else {
        println!("\n📦 Possible record containers:");
        for container in &analysis.potential_containers {
            println!("   {} ({} matches)", container.selector, container.count);
            if !container.sample_text.is_empty() {
                println!("      e.g. {}", container.sample_text);
            }
        }
    }

    if !analysis.field_suggestions.is_empty() {
        println!("\n🏷️  Field selectors:");
        for (field, suggestions) in analysis.field_suggestions.iter() {
            for suggestion in suggestions {
                println!(
                    "   {:<8} {} ({} matches) e.g. {}",
                    field, suggestion.selector, suggestion.count, suggestion.sample_value
                );
            }
        }
    }
}

/// Extract records and print a preview table
pub async fn preview(config: &Config, extract: ExtractArgs, json: bool) -> Result<()> {
    let (html, source) = load_html(config, &extract.source).await?;
    let request = build_request(config, &extract, ExportOptions::for_source(source))?;
    let leads = DataExtractor::new()?.extract_leads(&html, &request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&leads)?);
        return Ok(());
    }

    let shown = &leads[..leads.len().min(PREVIEW_LIMIT)];
    println!("{}", PreviewTable::new(shown, leads.len()).render_text());
    println!();
    println!("✅ Extracted {} leads", leads.len());
    Ok(())
}

/// Extract records and write them to a CSV file
pub async fn export(config: &Config, extract: ExtractArgs, args: ExportArgs) -> Result<()> {
    let (html, source) = load_html(config, &extract.source).await?;

    let options = ExportOptions {
        use_display_names: args.use_display_names,
        include_metadata: args
            .include_metadata
            .unwrap_or(ExportOptions::for_source(source).include_metadata),
    };
    let request = build_request(config, &extract, options)?;
    let export_dir = args.output.unwrap_or_else(|| config.export.export_dir.clone());
    let export_config = ExportConfig {
        options,
        columns: ColumnSelection {
            include_columns: if args.columns.is_empty() { None } else { Some(args.columns) },
        },
        filename: args.filename,
    };

    if args.bulk {
        let max_leads = if extract.max_leads.is_some() {
            request.max_leads
        } else {
            BULK_MAX_LEADS
        };
        return export_bulk(config, &html, &request, max_leads, &export_dir, export_config.filename);
    }

    let leads = DataExtractor::new()?.extract_leads(&html, &request)?;
    if leads.is_empty() {
        return Err(Error::NoData(format!("No records matched the field mappings in {}", extract.source)));
    }

    let exported = CsvExporter::new(export_dir)?.export(&leads, &export_config)?;
    println!("✅ Exported {} records", exported.record_count);
    println!("   File: {}", exported.path.display());
    Ok(())
}

fn export_bulk(
    config: &Config,
    html: &str,
    request: &ExtractionRequest,
    max_leads: usize,
    export_dir: &Path,
    filename: Option<String>,
) -> Result<()> {
    std::fs::create_dir_all(export_dir)?;
    let path = export_dir.join(bulk_filename(filename.as_deref()));

    let processor = BatchProcessor::new(config.extraction.batch_size)?;
    println!("📦 Processing in batches of {}...", processor.batch_size());
    let total = processor.export_large_csv(html, request, max_leads, &path)?;

    if total == 0 {
        println!("⚠️  No records extracted. Bulk exports need a container selector.");
    } else {
        println!("✅ Exported {} records", total);
    }
    println!("   File: {}", path.display());
    Ok(())
}

fn bulk_filename(custom: Option<&str>) -> String {
    match custom.map(str::trim) {
        Some(name) if !name.is_empty() => custom_filename(name),
        _ => format!("crm_leads_bulk_{}.csv", Local::now().format("%Y%m%d_%H%M%S")),
    }
}

/// Filter landline, toll-free and VOIP numbers out of a CSV file
pub fn scrub(csv: &Path, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| scrubbed_path(csv));

    let reader = File::open(csv).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(format!("CSV file {}", csv.display())),
        _ => Error::Io(e),
    })?;
    let writer = BufWriter::new(File::create(&output)?);

    let kept = scrub_csv(BufReader::new(reader), writer)?;
    info!("Scrubbed {} into {}", csv.display(), output.display());

    println!("🧹 Kept {} mobile leads", kept);
    println!("   File: {}", output.display());
    Ok(())
}

fn scrubbed_path(csv: &Path) -> PathBuf {
    let stem = csv
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "leads".to_string());
    csv.with_file_name(format!("{}_scrubbed.csv", stem))
}

/// List the CSV files in the export directory
pub fn history(config: &Config) -> Result<()> {
    let exporter = CsvExporter::new(config.export.export_dir.clone())?;
    let exports = exporter.export_history()?;

    if exports.is_empty() {
        println!("📂 No exports in {}", exporter.export_dir().display());
        return Ok(());
    }

    println!("📂 Exports in {}:", exporter.export_dir().display());
    for record in &exports {
        println!(
            "   {}  {:>10} bytes  {}",
            record.created.format("%Y-%m-%d %H:%M:%S"),
            record.size,
            record.filename
        );
    }
    Ok(())
}

/// Connect to Chrome and list the page tabs
pub async fn tabs(config: &Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.chrome.debug_port);
    let mut connector = config.chrome_connector()?;

    let version = connector.connect(port).await?;
    println!("✅ Connected to {} on port {}", version.browser, port);

    let tabs = connector.tabs().await?;
    if tabs.is_empty() {
        println!("📋 No open page tabs.");
        return Ok(());
    }

    println!("📋 Open tabs:");
    for tab in &tabs {
        println!("   {}  {}", tab.id, tab.title);
        println!("      {}", tab.url);
    }
    println!();
    println!("💡 Extract from a tab with: leadliftr preview chrome:<id> --map name=<selector>");
    Ok(())
}

/// Run the HTTP API until Ctrl-C
pub async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    #[cfg(feature = "metrics")]
    {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .install()
            .map_err(|e| Error::Config(format!("Failed to install metrics exporter: {}", e)))?;
        info!("Prometheus metrics exporter installed");
    }

    let state = AppState::new(config)?;
    println!("🚀 LeadLiftr API on http://{}:{}", host, port);
    server::serve(state, &host, port).await
}

/// Generate shell completions
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let cmd_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, cmd_name, &mut std::io::stdout());
}

/// Initialize logging from the verbosity flags and the logging config.
///
/// The returned guard flushes the log file on drop and must be held for the
/// life of the command.
pub fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(debug)
        .with_line_number(debug);

    let (writer, guard) = if logging.log_to_file {
        let path = Path::new(&logging.log_file);
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::Config(format!("Invalid log file: {}", logging.log_file)))?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
        (Some(writer), Some(guard))
    } else {
        (None, None)
    };

    let installed = match (logging.json_format, writer) {
        (true, Some(writer)) => builder.json().with_writer(writer).try_init(),
        (true, None) => builder.json().try_init(),
        (false, Some(writer)) => builder.with_ansi(false).with_writer(writer).try_init(),
        (false, None) => builder.try_init(),
    };
    installed.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    debug!("Logging initialized");
    Ok(guard)
}

/// Read HTML from a CLI source argument.
async fn load_html(config: &Config, raw: &str) -> Result<(String, InputSource)> {
    let source = SourceSpec::parse(raw)?.open(config).await?;
    info!("Reading HTML from {}", source.describe());

    let html = source.fetch_html().await?;
    if html.trim().is_empty() {
        return Err(Error::NoData(format!("{} is empty", source.describe())));
    }
    debug!("Read {} bytes of HTML", html.len());
    Ok((html, source.input_source()))
}

/// Preset rows first, then `--map` rows; a repeated field keeps the last selector.
fn build_request(config: &Config, extract: &ExtractArgs, options: ExportOptions) -> Result<ExtractionRequest> {
    let mut rows = Vec::new();
    let mut container = String::new();

    if let Some(name) = &extract.preset {
        let library = config.presets()?;
        let preset = library
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Preset '{}'", name)))?;
        rows = apply_preset(preset);
        container = preset.container_selector.clone();
    }

    rows.extend(extract.mappings.iter().cloned());
    if let Some(selector) = &extract.container {
        container = selector.clone();
    }

    let max_leads = extract
        .max_leads
        .clone()
        .unwrap_or_else(|| config.extraction.max_leads.to_string());

    let request = resolve(&rows, &container, &max_leads, options);
    if request.field_mappings.is_empty() {
        return Err(Error::InvalidInput(
            "No field mappings given; use --map name=selector or --preset".to_string(),
        ));
    }
    Ok(request)
}
