pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, LoggingConfig};
use crate::error::Result;
use crate::mapping::FieldMapping;

#[derive(Parser)]
#[command(name = "leadliftr")]
#[command(about = "Extract lead records from CRM pages and export them to CSV")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "LEADLIFTR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

/// Where to read HTML from and how to map it into records.
#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// HTML file, `-` for stdin, an http(s):// URL or `chrome:<tab id>`
    pub source: String,

    /// Field mapping as `name=selector` (repeatable)
    #[arg(short, long = "map", value_name = "NAME=SELECTOR", value_parser = parse_mapping)]
    pub mappings: Vec<FieldMapping>,

    /// Start from a named preset; `--map` entries override its fields
    #[arg(short, long)]
    pub preset: Option<String>,

    /// CSS selector for the element that holds one record
    #[arg(long)]
    pub container: Option<String>,

    /// Maximum number of records to extract
    #[arg(short = 'n', long)]
    pub max_leads: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// List the available field-mapping presets
    Presets,

    /// Suggest container and field selectors for a page
    Analyze {
        /// HTML file, `-` for stdin, an http(s):// URL or `chrome:<tab id>`
        source: String,

        /// Print the raw analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract records and show the first few
    Preview {
        #[command(flatten)]
        extract: ExtractArgs,

        /// Print the extracted records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract records and write them to a CSV file
    Export {
        #[command(flatten)]
        extract: ExtractArgs,

        /// Export directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// File name for the export
        #[arg(short, long)]
        filename: Option<String>,

        /// Use raw field names as column headers
        #[arg(long)]
        no_display_names: bool,

        /// Add export date and record count columns
        #[arg(long, conflicts_with = "no_metadata")]
        metadata: bool,

        /// Leave out export date and record count columns
        #[arg(long)]
        no_metadata: bool,

        /// Only export these columns, comma separated
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Stream very large pages to disk in batches
        #[arg(long)]
        bulk: bool,
    },

    /// Remove landline, toll-free and VOIP numbers from a lead CSV
    Scrub {
        /// CSV file with a phone column
        csv: PathBuf,

        /// Output file (defaults to `<name>_scrubbed.csv`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List previous CSV exports
    History,

    /// List the open Chrome tabs
    Tabs {
        /// Chrome remote debugging port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// `name=selector`; the selector may itself contain `=`.
fn parse_mapping(raw: &str) -> std::result::Result<FieldMapping, String> {
    let (name, selector) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=SELECTOR, got '{}'", raw))?;

    let name = name.trim();
    if name.is_empty() {
        return Err("field name cannot be empty".to_string());
    }
    Ok(FieldMapping::new(name, crate::mapping::display_label(name), selector.trim()))
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Neither of these needs an existing config file.
        match &self.command {
            Commands::Completions { shell } => {
                commands::generate_completions(*shell);
                return Ok(());
            }
            Commands::Init { force } => {
                let _log_guard = commands::init_logging(self.debug, self.verbose, &LoggingConfig::default())?;
                return commands::init(self.config.clone(), *force).await;
            }
            _ => {}
        }

        let config = Config::resolve(self.config.as_deref())?;
        let _log_guard = commands::init_logging(self.debug, self.verbose, &config.logging)?;

        match self.command {
            Commands::Presets => commands::list_presets(&config),
            Commands::Analyze { source, json } => commands::analyze(&config, &source, json).await,
            Commands::Preview { extract, json } => commands::preview(&config, extract, json).await,
            Commands::Export {
                extract,
                output,
                filename,
                no_display_names,
                metadata,
                no_metadata,
                columns,
                bulk,
            } => {
                let options = commands::ExportArgs {
                    output,
                    filename,
                    use_display_names: !no_display_names && config.export.use_display_names,
                    include_metadata: if metadata {
                        Some(true)
                    } else if no_metadata {
                        Some(false)
                    } else {
                        None
                    },
                    columns,
                    bulk,
                };
                commands::export(&config, extract, options).await
            }
            Commands::Scrub { csv, output } => commands::scrub(&csv, output),
            Commands::History => commands::history(&config),
            Commands::Tabs { port } => commands::tabs(&config, port).await,
            Commands::Serve { host, port } => commands::serve(config, host, port).await,
            Commands::Init { .. } | Commands::Completions { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_mapping() {
        let mapping = parse_mapping("zip_code=td[data-col=zip]").unwrap();
        assert_eq!(mapping.name, "zip_code");
        assert_eq!(mapping.label, "Zip Code");
        assert_eq!(mapping.selector, "td[data-col=zip]");

        assert!(parse_mapping("no-separator").is_err());
        assert!(parse_mapping(" =.email").is_err());
    }

    #[test]
    fn test_export_flags() {
        let cli = Cli::try_parse_from([
            "leadliftr",
            "export",
            "leads.html",
            "--map",
            "name=.name",
            "-m",
            "email=.email",
            "--container",
            "tr.lead",
            "--columns",
            "name,email",
            "--no-metadata",
        ])
        .unwrap();

        match cli.command {
            Commands::Export {
                extract,
                columns,
                no_metadata,
                metadata,
                ..
            } => {
                assert_eq!(extract.source, "leads.html");
                assert_eq!(extract.mappings.len(), 2);
                assert_eq!(extract.container.as_deref(), Some("tr.lead"));
                assert_eq!(columns, vec!["name", "email"]);
                assert!(no_metadata);
                assert!(!metadata);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["leadliftr", "export", "x.html", "--metadata", "--no-metadata"]).is_err());
    }
}
