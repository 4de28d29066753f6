//! Implements `ReportingApi` against an iiko server's REST API.

use crate::api::{document_range, olap_range, Credentials, ReportingApi};
use crate::period::Period;
use crate::resolver::EntityKind;
use crate::Result;
use anyhow::{bail, ensure, Context};
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tracing::trace;
use url::Url;

/// How much of an error body to put into an error message.
const ERROR_BODY_CHARS: usize = 200;

pub struct IikoClient {
    base_url: String,
    credentials: Credentials,
    http: reqwest::Client,
    key: Option<String>,
}

impl IikoClient {
    /// `base_url` is the API root, e.g. `https://example.iiko.it:8080/resto/api`. Servers with
    /// self-signed certificates need `accept_invalid_certs`.
    pub fn new(base_url: &Url, credentials: Credentials, accept_invalid_certs: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context("Unable to build the HTTP client")?;
        Ok(Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            credentials,
            http,
            key: None,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn key(&self) -> Result<&str> {
        self.key
            .as_deref()
            .context("Not logged in, authenticate before requesting data")
    }

    /// GETs `path` with the session key and `query`, and parses the body as JSON.
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.endpoint(path);
        trace!("GET {url} {query:?}");
        let request = self.http.get(&url).query(&[("key", self.key()?)]).query(query);
        let body = send(request, &url).await?;
        serde_json::from_str(&body).with_context(|| format!("The response from {url} is not JSON"))
    }
}

/// Sends `request` and returns the body, failing on any non-success status.
async fn send(request: RequestBuilder, url: &str) -> Result<String> {
    let response: Response = request
        .send()
        .await
        .with_context(|| format!("Request to {url} failed"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("Unable to read the response body from {url}"))?;
    if !status.is_success() {
        let snippet: String = body.chars().take(ERROR_BODY_CHARS).collect();
        bail!("{url} returned {status}: {snippet}");
    }
    Ok(body)
}

#[async_trait::async_trait]
impl ReportingApi for IikoClient {
    async fn authenticate(&mut self) -> Result<()> {
        let url = self.endpoint("auth");
        let form = [
            ("login", self.credentials.login().to_string()),
            ("pass", self.credentials.password_hash()),
        ];
        let body = send(self.http.post(&url).form(&form), &url)
            .await
            .context("Authentication failed")?;
        let key = body.trim();
        ensure!(!key.is_empty(), "The server at {url} returned an empty session key");
        self.key = Some(key.to_string());
        Ok(())
    }

    async fn olap_by_preset(&mut self, preset_id: &str, period: &Period) -> Result<Value> {
        let (from, to) = olap_range(period);
        self.get(
            &format!("v2/reports/olap/byPresetId/{preset_id}"),
            &[("dateFrom", from.as_str()), ("dateTo", to.as_str())],
        )
        .await
    }

    async fn writeoff_documents(&mut self, period: &Period) -> Result<Value> {
        let (from, to) = document_range(period);
        self.get(
            "v2/documents/writeoff",
            &[("dateFrom", from.as_str()), ("dateTo", to.as_str())],
        )
        .await
    }

    async fn listing(&mut self, kind: EntityKind) -> Result<Value> {
        let (path, query) = listing_request(kind);
        self.get(path, query).await
    }
}

/// Stores are the inventory accounts in the account listing, so stores and conceptions share the
/// generic entity endpoint.
fn listing_request(kind: EntityKind) -> (&'static str, &'static [(&'static str, &'static str)]) {
    match kind {
        EntityKind::Store => (
            "v2/entities/list",
            &[("rootType", "Account"), ("includeDeleted", "false")],
        ),
        EntityKind::Account => ("v2/entities/accounts/list", &[("includeDeleted", "false")]),
        EntityKind::Conception => (
            "v2/entities/list",
            &[("rootType", "Conception"), ("includeDeleted", "false")],
        ),
        EntityKind::Product => ("v2/entities/products/list", &[]),
    }
}
