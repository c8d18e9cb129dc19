use std::future::Future;

use pkgmirror_fetch::HttpClient;
use serde::Deserialize;
use tracing::{debug, info};

use crate::xmlrpc::{self, MethodResponse, Value};
use crate::{CatalogError, Result};

pub const SIMPLE_JSON: &str = "application/vnd.pypi.simple.v1+json";

/// One row of the upstream changelog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEntry {
    pub name: String,
    pub version: Option<String>,
    pub timestamp: i64,
    pub action: String,
}

impl ChangeEntry {
    /// Whether the change added or removed a file (`add source file ...`).
    pub fn is_file_change(&self) -> bool {
        self.action.contains("file")
    }
}

/// Source of the remote package universe and its change feed.
pub trait CatalogService: Send + Sync {
    fn list_all_names(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn changes_since(&self, since: i64) -> impl Future<Output = Result<Vec<ChangeEntry>>> + Send;
}

/// Catalog backed by a PyPI-compatible server: names from the JSON simple
/// index, changes from the XML-RPC `changelog` method.
#[derive(Clone, Debug)]
pub struct PypiCatalog<C> {
    client: C,
    simple_url: String,
    xmlrpc_url: String,
}

#[derive(Deserialize)]
struct SimpleIndex {
    projects: Vec<SimpleProject>,
}

#[derive(Deserialize)]
struct SimpleProject {
    name: String,
}

impl<C: HttpClient> PypiCatalog<C> {
    pub fn new(client: C, simple_url: impl Into<String>, xmlrpc_url: impl Into<String>) -> Self {
        let mut simple_url = simple_url.into();
        if !simple_url.ends_with('/') {
            simple_url.push('/');
        }
        Self {
            client,
            simple_url,
            xmlrpc_url: xmlrpc_url.into(),
        }
    }

    fn unavailable(url: &str, reason: impl ToString) -> CatalogError {
        CatalogError::Unavailable {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl<C: HttpClient> CatalogService for PypiCatalog<C> {
    async fn list_all_names(&self) -> Result<Vec<String>> {
        let url = self.simple_url.as_str();
        let headers = [("Accept".to_string(), SIMPLE_JSON.to_string())];
        let response = self
            .client
            .get(url, &headers)
            .await
            .map_err(|e| Self::unavailable(url, e))?;
        if response.status != 200 {
            return Err(Self::unavailable(url, format!("HTTP {}", response.status)));
        }
        let body = response.bytes().await.map_err(|e| Self::unavailable(url, e))?;
        let index: SimpleIndex =
            serde_json::from_slice(&body).map_err(|e| CatalogError::Malformed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        info!(count = index.projects.len(), "fetched package universe");
        Ok(index.projects.into_iter().map(|p| p.name).collect())
    }

    async fn changes_since(&self, since: i64) -> Result<Vec<ChangeEntry>> {
        let url = self.xmlrpc_url.as_str();
        let body = xmlrpc::method_call("changelog", &[Value::Int(since)]);
        let response = self
            .client
            .post(url, "text/xml", body.into_bytes())
            .await
            .map_err(|e| Self::unavailable(url, e))?;
        if response.status != 200 {
            return Err(Self::unavailable(url, format!("HTTP {}", response.status)));
        }
        let text = response.text().await.map_err(|e| Self::unavailable(url, e))?;
        let malformed = |reason: String| CatalogError::Malformed {
            url: url.to_string(),
            reason,
        };

        let rows = match xmlrpc::parse_response(&text).map_err(malformed)? {
            MethodResponse::Fault { code, message } => {
                return Err(CatalogError::Fault { code, message });
            }
            MethodResponse::Success(Value::Array(rows)) => rows,
            MethodResponse::Success(_) => {
                return Err(malformed("changelog did not return an array".into()));
            }
        };

        let entries: Vec<ChangeEntry> = rows.iter().filter_map(change_entry).collect();
        if entries.len() != rows.len() {
            debug!(skipped = rows.len() - entries.len(), "skipped malformed changelog rows");
        }
        info!(since, count = entries.len(), "fetched changelog");
        Ok(entries)
    }
}

fn change_entry(row: &Value) -> Option<ChangeEntry> {
    let [name, version, timestamp, action, ..] = row.as_array()? else {
        return None;
    };
    Some(ChangeEntry {
        name: name.as_str()?.to_string(),
        version: version.as_str().map(str::to_string),
        timestamp: timestamp.as_int()?,
        action: action.as_str().unwrap_or_default().to_string(),
    })
}
