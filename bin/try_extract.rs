//! Manual check: fetch a page and run a mapping against it.
//!
//! Usage: try_extract <url> <container> <name=selector>...

use leadliftr::extract::DataExtractor;
use leadliftr::mapping::{resolve, ExportOptions, FieldMapping};
use leadliftr::source::PageFetcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        eprintln!("Usage: try_extract <url> <container> <name=selector>...");
        std::process::exit(2);
    }

    let url = &args[0];
    let container = &args[1];
    let rows: Vec<FieldMapping> = args[2..]
        .iter()
        .filter_map(|arg| arg.split_once('='))
        .map(|(name, selector)| FieldMapping::new(name, name, selector))
        .collect();

    println!("Fetching page from: {}", url);
    let html = match PageFetcher::new()?.fetch(url).await {
        Ok(html) => {
            println!("✓ Downloaded {} bytes", html.len());
            html
        }
        Err(e) => {
            println!("✗ Failed to fetch page: {}", e);
            return Err(e.into());
        }
    };

    let request = resolve(&rows, container, "10", ExportOptions::default());
    println!("Mapped fields: {:?}", request.field_mappings.keys().collect::<Vec<_>>());

    let leads = DataExtractor::new()?.extract_leads(&html, &request)?;
    println!("Extracted {} leads", leads.len());

    for lead in &leads {
        println!("\nLead {}:", lead.extraction_index);
        for (field, value) in lead.fields.iter() {
            println!("  {}: {}", field, value);
        }
    }

    Ok(())
}
