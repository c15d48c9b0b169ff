//! Manual check against a local Chrome started with
//! `--remote-debugging-port=9222`: list tabs and dump the first one.

use leadliftr::source::{ChromeConnector, DEFAULT_DEBUG_PORT};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::args()
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_DEBUG_PORT);

    let mut connector = ChromeConnector::new()?;
    let version = connector.connect(port).await?;
    println!("✓ Connected to {} (protocol {})", version.browser, version.protocol_version);

    let tabs = connector.tabs().await?;
    println!("Open tabs: {}", tabs.len());
    for tab in &tabs {
        println!("  [{}] {} - {}", tab.id, tab.title, tab.url);
    }

    let Some(first) = tabs.first() else {
        println!("No page tabs to read");
        return Ok(());
    };

    let page = connector.select_tab(&first.id).await?;
    println!("\nSelected: {}", page.title);

    let html = connector.page_html().await?;
    let preview: String = html.chars().take(200).collect();
    println!("Page HTML ({} bytes): {}...", html.len(), preview);

    connector.disconnect().await;
    Ok(())
}
