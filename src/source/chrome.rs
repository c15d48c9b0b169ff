use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub const DEFAULT_DEBUG_PORT: u16 = 9222;

type DevToolsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reply of `/json/version`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser", default)]
    pub browser: String,
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,
}

/// A browser tab as listed by `/json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default = "default_target_type")]
    pub target_type: String,
    #[serde(rename = "webSocketDebuggerUrl", default, skip_serializing)]
    pub websocket_url: Option<String>,
}

fn default_target_type() -> String {
    "page".to_string()
}

impl TabInfo {
    /// A regular web page, not an extension, worker or browser UI page.
    pub fn is_user_page(&self) -> bool {
        self.target_type == "page" && !self.url.starts_with("chrome://")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub title: String,
    pub url: String,
    pub id: String,
}

impl From<&TabInfo> for PageInfo {
    fn from(tab: &TabInfo) -> Self {
        Self {
            title: tab.title.clone(),
            url: tab.url.clone(),
            id: tab.id.clone(),
        }
    }
}

/// Session with a Chrome instance started with `--remote-debugging-port`.
///
/// Commands are sent one at a time over the tab's DevTools websocket and
/// replies are matched by message id; events in between are skipped.
pub struct ChromeConnector {
    client: Client,
    host: String,
    port: Option<u16>,
    socket: Option<DevToolsSocket>,
    current_tab: Option<TabInfo>,
    message_id: u64,
    command_timeout: Duration,
}

impl std::fmt::Debug for ChromeConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("current_tab", &self.current_tab)
            .field("socket_open", &self.socket.is_some())
            .finish()
    }
}

impl ChromeConnector {
    pub fn new() -> Result<Self> {
        Self::with_host("localhost")
    }

    pub fn with_host(host: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self {
            client,
            host: host.into(),
            port: None,
            socket: None,
            current_tab: None,
            message_id: 0,
            command_timeout: Duration::from_secs(10),
        })
    }

    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    fn endpoint(&self, path: &str) -> Result<String> {
        let port = self
            .port
            .ok_or_else(|| Error::NotConnected("Not connected to Chrome".to_string()))?;
        Ok(format!("http://{}:{}{}", self.host, port, path))
    }

    /// Check that a debuggable browser listens on `port`.
    pub async fn connect(&mut self, port: u16) -> Result<BrowserVersion> {
        let url = format!("http://{}:{}/json/version", self.host, port);
        let response = self.client.get(&url).send().await.map_err(|e| {
            Error::Chrome(format!(
                "Connection to port {} failed ({}). Make sure Chrome is running with --remote-debugging-port={}",
                port, e, port
            ))
        })?;

        if !response.status().is_success() {
            return Err(Error::Chrome(format!("Failed to connect: HTTP {}", response.status().as_u16())));
        }

        let version: BrowserVersion = response.json().await?;
        info!("Connected to Chrome {}", version.browser);
        self.port = Some(port);
        Ok(version)
    }

    async fn targets(&self) -> Result<Vec<TabInfo>> {
        let response = self.client.get(self.endpoint("/json")?).send().await?;
        if !response.status().is_success() {
            return Err(Error::Chrome(format!("Failed to get tabs: HTTP {}", response.status().as_u16())));
        }
        Ok(response.json().await?)
    }

    /// Open page tabs, excluding `chrome://` pages.
    pub async fn tabs(&self) -> Result<Vec<TabInfo>> {
        let tabs: Vec<TabInfo> = self.targets().await?.into_iter().filter(TabInfo::is_user_page).collect();
        debug!("Found {} page tabs", tabs.len());
        Ok(tabs)
    }

    /// Attach to a tab, replacing any previously selected one.
    pub async fn select_tab(&mut self, tab_id: &str) -> Result<PageInfo> {
        self.close_socket().await;

        let tab = self
            .targets()
            .await?
            .into_iter()
            .find(|tab| tab.id == tab_id)
            .ok_or_else(|| Error::NotFound(format!("Tab with ID {} not found", tab_id)))?;

        let ws_url = tab
            .websocket_url
            .clone()
            .ok_or_else(|| Error::Chrome(format!("Tab {} has no debugger websocket; is DevTools open on it?", tab_id)))?;

        let (socket, _) = timeout(self.command_timeout, connect_async(ws_url.as_str()))
            .await
            .map_err(|_| Error::Timeout(format!("Websocket connection to {} timed out", ws_url)))??;

        self.socket = Some(socket);
        self.current_tab = Some(tab);

        self.send_command("Runtime.enable", None).await?;
        self.send_command("DOM.enable", None).await?;

        let info = self.page_info().ok_or_else(|| Error::Chrome("Tab selection was lost".to_string()))?;
        info!("Selected tab: {}", info.title);
        Ok(info)
    }

    /// Send one DevTools command and wait for the reply with the same id.
    pub async fn send_command(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        self.message_id += 1;
        let id = self.message_id;
        let command_timeout = self.command_timeout;
        let socket = self
            .socket
            .as_mut()
            .ok_or_else(|| Error::NotConnected("No tab selected".to_string()))?;

        let mut message = json!({ "id": id, "method": method });
        if let Some(params) = params {
            message["params"] = params;
        }
        socket.send(Message::Text(message.to_string())).await?;

        let reply = timeout(command_timeout, async {
            while let Some(frame) = socket.next().await {
                let text = match frame? {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };

                let reply: Value = serde_json::from_str(&text)?;
                if reply.get("id").and_then(Value::as_u64) == Some(id) {
                    return Ok(reply);
                }
                debug!("Skipping DevTools message while waiting for {}", method);
            }
            Err::<Value, Error>(Error::Chrome(format!("Connection closed while waiting for {}", method)))
        })
        .await
        .map_err(|_| Error::Timeout(format!("DevTools command {} timed out", method)))??;

        if let Some(error) = reply.get("error") {
            let message = error.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(Error::Chrome(format!("{} failed: {}", method, message)));
        }

        Ok(reply.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Outer HTML of the selected tab's document.
    pub async fn page_html(&mut self) -> Result<String> {
        if self.socket.is_none() || self.current_tab.is_none() {
            return Err(Error::NotConnected("No tab selected".to_string()));
        }

        let document = self.send_command("DOM.getDocument", None).await?;
        let node_id = document
            .pointer("/root/nodeId")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Chrome("DOM.getDocument returned no root node".to_string()))?;

        let outer = self
            .send_command("DOM.getOuterHTML", Some(json!({ "nodeId": node_id })))
            .await?;

        outer
            .get("outerHTML")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Chrome("DOM.getOuterHTML returned no HTML".to_string()))
    }

    pub fn page_info(&self) -> Option<PageInfo> {
        self.current_tab.as_ref().map(PageInfo::from)
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Browser reachable and a tab selected.
    pub fn is_connected(&self) -> bool {
        self.port.is_some() && self.current_tab.is_some()
    }

    async fn close_socket(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = socket.close(None).await {
                warn!("Error closing DevTools websocket: {}", e);
            }
        }
    }

    pub async fn disconnect(&mut self) {
        self.close_socket().await;
        self.current_tab = None;
        self.port = None;
        info!("Disconnected from Chrome");
    }
}
