pub mod chrome;
pub mod fetcher;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::mapping::InputSource;

pub use chrome::{BrowserVersion, ChromeConnector, PageInfo, TabInfo, DEFAULT_DEBUG_PORT};
pub use fetcher::PageFetcher;

/// Anything that can hand over an HTML document for extraction.
#[async_trait]
pub trait HtmlSource: Send + Sync {
    async fn fetch_html(&self) -> Result<String>;

    /// Short human readable origin, used in log lines.
    fn describe(&self) -> String;

    fn input_source(&self) -> InputSource {
        InputSource::PastedHtml
    }
}

/// HTML the caller already has in memory.
#[derive(Debug, Clone)]
pub struct StaticHtml(pub String);

#[async_trait]
impl HtmlSource for StaticHtml {
    async fn fetch_html(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn describe(&self) -> String {
        format!("pasted HTML ({} bytes)", self.0.len())
    }
}

#[derive(Debug, Clone)]
pub struct FileSource(pub PathBuf);

#[async_trait]
impl HtmlSource for FileSource {
    async fn fetch_html(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.0).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(format!("HTML file {}", self.0.display())),
            _ => Error::Io(e),
        })
    }

    fn describe(&self) -> String {
        self.0.display().to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StdinSource;

#[async_trait]
impl HtmlSource for StdinSource {
    async fn fetch_html(&self) -> Result<String> {
        let mut html = String::new();
        tokio::io::stdin().read_to_string(&mut html).await?;
        Ok(html)
    }

    fn describe(&self) -> String {
        "standard input".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct UrlSource {
    pub fetcher: PageFetcher,
    pub url: String,
}

#[async_trait]
impl HtmlSource for UrlSource {
    async fn fetch_html(&self) -> Result<String> {
        self.fetcher.fetch(&self.url).await
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// The tab currently selected on a shared Chrome session.
#[derive(Debug, Clone)]
pub struct LiveTab {
    pub connector: Arc<Mutex<ChromeConnector>>,
}

#[async_trait]
impl HtmlSource for LiveTab {
    async fn fetch_html(&self) -> Result<String> {
        let mut connector = self.connector.lock().await;
        if !connector.is_connected() {
            return Err(Error::NotConnected("Not connected to Chrome or no tab selected".to_string()));
        }
        connector.page_html().await
    }

    fn describe(&self) -> String {
        match self.connector.try_lock() {
            Ok(connector) => match connector.page_info() {
                Some(info) => format!("Chrome tab {} ({})", info.id, info.url),
                None => "Chrome (no tab selected)".to_string(),
            },
            Err(_) => "Chrome tab".to_string(),
        }
    }

    fn input_source(&self) -> InputSource {
        InputSource::LiveTab
    }
}

/// Where a CLI command reads its HTML from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Stdin,
    File(PathBuf),
    Url(String),
    ChromeTab(String),
}

impl SourceSpec {
    /// `-` is stdin, `http(s)://…` a URL, `chrome:<tab id>` a live tab,
    /// anything else a file path.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidInput("Empty source".to_string()));
        }

        if raw == "-" {
            Ok(SourceSpec::Stdin)
        } else if let Some(tab_id) = raw.strip_prefix("chrome:") {
            if tab_id.is_empty() {
                return Err(Error::InvalidInput("Missing tab id after 'chrome:'".to_string()));
            }
            Ok(SourceSpec::ChromeTab(tab_id.to_string()))
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            fetcher::validate_page_url(raw)?;
            Ok(SourceSpec::Url(raw.to_string()))
        } else {
            Ok(SourceSpec::File(PathBuf::from(raw)))
        }
    }

    /// Build the source. Chrome tabs are attached right away.
    pub async fn open(self, config: &Config) -> Result<Box<dyn HtmlSource>> {
        Ok(match self {
            SourceSpec::Stdin => Box::new(StdinSource),
            SourceSpec::File(path) => Box::new(FileSource(path)),
            SourceSpec::Url(url) => Box::new(UrlSource {
                fetcher: config.page_fetcher()?,
                url,
            }),
            SourceSpec::ChromeTab(tab_id) => {
                let mut connector = config.chrome_connector()?;
                connector.connect(config.chrome.debug_port).await?;
                connector.select_tab(&tab_id).await?;
                Box::new(LiveTab {
                    connector: Arc::new(Mutex::new(connector)),
                })
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_source_spec() {
        assert_eq!(SourceSpec::parse("-").unwrap(), SourceSpec::Stdin);
        assert_eq!(
            SourceSpec::parse("https://crm.example.com/leads").unwrap(),
            SourceSpec::Url("https://crm.example.com/leads".to_string())
        );
        assert_eq!(
            SourceSpec::parse("chrome:8F2A").unwrap(),
            SourceSpec::ChromeTab("8F2A".to_string())
        );
        assert_eq!(
            SourceSpec::parse("pages/leads.html").unwrap(),
            SourceSpec::File(PathBuf::from("pages/leads.html"))
        );
        assert!(SourceSpec::parse("chrome:").is_err());
        assert!(SourceSpec::parse("  ").is_err());
    }

    #[tokio::test]
    async fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<p>hello</p>").unwrap();

        let source = FileSource(file.path().to_path_buf());
        assert_eq!(source.fetch_html().await.unwrap(), "<p>hello</p>");
        assert_eq!(source.input_source(), InputSource::PastedHtml);

        let missing = FileSource(PathBuf::from("/definitely/not/here.html"));
        assert!(matches!(missing.fetch_html().await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_static_html_and_idle_tab() {
        let source = StaticHtml("<table></table>".to_string());
        assert_eq!(source.fetch_html().await.unwrap(), "<table></table>");
        assert_eq!(source.describe(), "pasted HTML (15 bytes)");

        let tab = LiveTab {
            connector: Arc::new(Mutex::new(ChromeConnector::new().unwrap())),
        };
        assert_eq!(tab.input_source(), InputSource::LiveTab);
        assert!(matches!(tab.fetch_html().await, Err(Error::NotConnected(_))));
    }
}
