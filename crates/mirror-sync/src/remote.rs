//! # Remote Source Client
//!
//! The paginated REST client the coordinator fetches through, behind an
//! object-safe trait so tests can script a source in-process.
//!
//! Every remote failure is soft at this boundary: a count probe that
//! errors reports `0`, a page fetch that errors reports an empty page with
//! no continuation. The engine treats either as "nothing this round",
//! never as fatal.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use mirror_core::{Page, Record, RecordId, ResourceType};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Remote Source Trait
// =============================================================================

/// A paginated remote source of records.
///
/// Implemented by [`BitrixClient`] for the real endpoint and by scripted
/// fakes in tests.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Total records available remotely for `resource`. Soft-fails to 0.
    async fn count(&self, resource: ResourceType) -> u64;

    /// Fetches one page starting at `start`. When `since_id` is given the
    /// listing is filtered to identifiers strictly greater than it.
    /// Soft-fails to an empty page.
    async fn fetch_page(
        &self,
        resource: ResourceType,
        start: u64,
        batch_size: usize,
        since_id: Option<RecordId>,
    ) -> Page;
}

// =============================================================================
// Bitrix Client
// =============================================================================

/// REST client for a Bitrix24-style webhook endpoint.
///
/// Two pre-built HTTP clients carry the two timeout regimes: count probes
/// are cheap and short, full-projection page fetches can be large and
/// slow.
pub struct BitrixClient {
    base_url: String,
    count_client: reqwest::Client,
    page_client: reqwest::Client,
}

impl BitrixClient {
    /// Builds a client from configuration.
    ///
    /// ## Errors
    /// `InvalidConfig` when no remote URL is configured; `HttpClient` when
    /// client construction fails.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let mut base_url = config.remote.base_url.trim().to_string();
        if base_url.is_empty() {
            return Err(SyncError::InvalidConfig(
                "remote.base_url is required".into(),
            ));
        }
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let count_client = reqwest::Client::builder()
            .timeout(config.remote.count_timeout())
            .build()?;

        let page_client = reqwest::Client::builder()
            .timeout(config.remote.fetch_timeout())
            .build()?;

        Ok(BitrixClient {
            base_url,
            count_client,
            page_client,
        })
    }

    /// Performs one GET against a REST method and decodes the JSON body.
    async fn get_json(
        &self,
        client: &reqwest::Client,
        method: &str,
        params: &[(String, String)],
    ) -> Result<Value, reqwest::Error> {
        let url = format!("{}{}", self.base_url, method);

        client
            .get(&url)
            .query(params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// Count for resources whose listing reports `total` directly.
    async fn count_from_total(&self, resource: ResourceType) -> Result<u64, reqwest::Error> {
        let params = vec![("SELECT[]".to_string(), "ID".to_string())];
        let body = self
            .get_json(&self.count_client, resource.list_method(), &params)
            .await?;

        Ok(body.get("total").and_then(value_to_u64).unwrap_or(0))
    }

    /// Count for resources without a `total` field: page through a minimal
    /// projection and accumulate result lengths.
    async fn count_by_paging(&self, resource: ResourceType) -> Result<u64, reqwest::Error> {
        let mut total = 0u64;
        let mut start = 0u64;

        loop {
            let params = vec![
                ("SELECT[]".to_string(), "ID".to_string()),
                ("start".to_string(), start.to_string()),
            ];
            let body = self
                .get_json(&self.count_client, resource.list_method(), &params)
                .await?;

            let page_len = body
                .get("result")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            if page_len == 0 {
                break;
            }
            total += page_len as u64;

            match body.get("next").and_then(value_to_u64) {
                Some(next) => start = next,
                None => break,
            }
        }

        Ok(total)
    }
}

#[async_trait]
impl RemoteSource for BitrixClient {
    async fn count(&self, resource: ResourceType) -> u64 {
        let counted = if resource.reports_total() {
            self.count_from_total(resource).await
        } else {
            self.count_by_paging(resource).await
        };

        match counted {
            Ok(total) => {
                debug!(resource = %resource, total, "Remote count");
                total
            }
            Err(e) => {
                warn!(resource = %resource, error = %e, "Remote count failed, reporting 0");
                0
            }
        }
    }

    async fn fetch_page(
        &self,
        resource: ResourceType,
        start: u64,
        _batch_size: usize,
        since_id: Option<RecordId>,
    ) -> Page {
        // Page size is fixed by the source; batch_size only spaces the
        // engine's dispatch offsets.
        let mut params: Vec<(String, String)> = Vec::new();
        if resource.needs_id_order() {
            params.push(("order[ID]".to_string(), "ASC".to_string()));
        }
        params.push(("start".to_string(), start.to_string()));
        params.push((select_key(resource).to_string(), "*".to_string()));
        if let Some(id) = since_id {
            params.push(("filter[>ID]".to_string(), id.to_string()));
        }

        match self
            .get_json(&self.page_client, resource.list_method(), &params)
            .await
        {
            Ok(body) => {
                let page = parse_page(resource, &body);
                debug!(
                    resource = %resource,
                    start,
                    fetched = page.records.len(),
                    next = ?page.next_offset,
                    "Fetched page"
                );
                page
            }
            Err(e) => {
                warn!(
                    resource = %resource,
                    start,
                    error = %e,
                    "Page fetch failed, reporting empty page"
                );
                Page::empty()
            }
        }
    }
}

/// Field-projection parameter name. The tasks API is camelCase throughout,
/// including its query parameters.
fn select_key(resource: ResourceType) -> &'static str {
    match resource {
        ResourceType::Tasks => "select[]",
        ResourceType::Deals | ResourceType::Projects => "SELECT[]",
    }
}

// =============================================================================
// Envelope Parsing
// =============================================================================

/// Extracts records and the continuation cursor from a listing envelope:
/// `{"result": <array or nested-by-key>, "next": <optional offset>}`.
///
/// Anything that doesn't match collapses to an empty page.
pub(crate) fn parse_page(resource: ResourceType, body: &Value) -> Page {
    let result = body.get("result");

    let records_value = match resource.result_key() {
        Some(key) => result.and_then(|r| r.get(key)),
        None => result,
    };

    let records: Vec<Record> = records_value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .cloned()
                .filter_map(Record::from_value)
                .collect()
        })
        .unwrap_or_default();

    let next_offset = body.get("next").and_then(value_to_u64);

    Page {
        records,
        next_offset,
    }
}

/// Reads a non-negative integer that may arrive as a JSON number or a
/// numeric string.
fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
