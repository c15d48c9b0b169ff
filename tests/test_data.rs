//! Shared fixtures for the integration tests: CRM pages, a lead CSV and a
//! fake Chrome DevTools endpoint.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Three rows; the middle one has no name, email or company that survives
/// cleaning and is dropped, so the kept leads have indices 1 and 3.
pub const CRM_TABLE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>Leads</title></head>
<body>
  <table class="crm-table">
    <thead><tr><th>Name</th><th>Email</th><th>Phone</th><th>Company</th></tr></thead>
    <tbody>
      <tr class="lead-row" data-id="1">
        <td class="name">ada lovelace</td>
        <td class="email">Contact: ADA@Example.com</td>
        <td class="phone">(555) 123-4567</td>
        <td class="company">Analytical Engines</td>
      </tr>
      <tr class="lead-row" data-id="2">
        <td class="name">!!</td>
        <td class="email">not an email</td>
        <td class="phone">555-987-6543</td>
        <td class="company"></td>
      </tr>
      <tr class="lead-row" data-id="3">
        <td class="name">Grace   Hopper</td>
        <td class="email">grace@navy.mil</td>
        <td class="phone">ext 12</td>
        <td class="company">US Navy</td>
      </tr>
    </tbody>
  </table>
</body>
</html>"#;

/// Markup matching the built-in Ringy preset.
pub const RINGY_TABLE_HTML: &str = r#"<html><body>
  <table class="leads-table">
    <tbody>
      <tr>
        <td class="first-name">JOHN</td><td class="last-name">smith</td>
        <td class="phone">555  201  3344</td><td class="city">new york</td>
        <td class="state">ny</td><td class="zip">10001-ab</td>
      </tr>
      <tr>
        <td class="first-name">maria</td><td class="last-name">GARCIA</td>
        <td class="phone">555 301 4455</td><td class="city">el paso</td>
        <td class="state">tx</td><td class="zip">79901</td>
      </tr>
      <tr>
        <td class="first-name"></td><td class="last-name"></td>
        <td class="phone"></td><td class="city"></td>
        <td class="state"></td><td class="zip"></td>
      </tr>
    </tbody>
  </table>
</body></html>"#;

/// Card layout with data attributes, for the page analyzer.
pub const CONTACT_CARDS_HTML: &str = r#"<html><body>
  <div class="contact" data-contact="101">
    <span data-field="name">Ada Lovelace</span>
    <a class="email" href="mailto:ada@example.com">ada@example.com</a>
    <span class="phone">555-123-4567</span>
  </div>
  <div class="contact" data-contact="102">
    <span data-field="name">Grace Hopper</span>
    <a class="email" href="mailto:grace@example.com">grace@example.com</a>
  </div>
</body></html>"#;

/// Lead CSV with one row per scrub outcome.
pub const LEADS_CSV: &str = "\
First Name,Last Name,Phone Number,City
John,Smith,(555) 201-3344,New York
Mary,Jones,212-555-0199,New York
Toll,Free,1-800-555-0100,Anywhere
Vo,Ip,(646) 555-0123,Brooklyn
Ext,Ension,555-201-3344 x12,Nowhere
Maria,Garcia,555.301.4455,El Paso
";

pub const TAB_ID: &str = "LEADS-TAB";

/// A Chrome stand-in: `/json/version` and `/json` served by wiremock, and a
/// websocket answering the DevTools commands the connector sends with
/// `page_html` as the document.
pub async fn fake_chrome(page_html: &'static str) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ws_port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve_devtools(stream, page_html));
        }
    });

    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Browser": "Chrome/120.0.6099.109",
            "Protocol-Version": "1.3"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": TAB_ID,
                "title": "Leads - Example CRM",
                "url": "https://crm.example.com/leads",
                "type": "page",
                "webSocketDebuggerUrl": format!("ws://127.0.0.1:{}/devtools/page/{}", ws_port, TAB_ID)
            },
            {
                "id": "NEW-TAB",
                "title": "New Tab",
                "url": "chrome://newtab/",
                "type": "page"
            },
            {
                "id": "WORKER",
                "title": "Service Worker",
                "url": "https://crm.example.com/sw.js",
                "type": "service_worker"
            }
        ])))
        .mount(&server)
        .await;

    server
}

async fn serve_devtools(stream: TcpStream, page_html: &'static str) {
    let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };

    while let Some(Ok(Message::Text(text))) = socket.next().await {
        let command: Value = serde_json::from_str(&text).unwrap();
        let result = match command["method"].as_str() {
            Some("DOM.getDocument") => {
                // Real browsers interleave events with replies.
                let event = json!({ "method": "DOM.documentUpdated", "params": {} });
                socket.send(Message::Text(event.to_string())).await.unwrap();
                json!({ "root": { "nodeId": 1 } })
            }
            Some("DOM.getOuterHTML") => json!({ "outerHTML": page_html }),
            _ => json!({}),
        };

        let reply = json!({ "id": command["id"], "result": result });
        socket.send(Message::Text(reply.to_string())).await.unwrap();
    }
}
