// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Google Cloud DNS v1 REST client.
//!
//! Implements [`DnsApi`] against one managed zone:
//!
//! - `GET  /dns/v1/projects/{project}/managedZones/{zone}/rrsets`
//! - `POST /dns/v1/projects/{project}/managedZones/{zone}/changes`
//! - `GET  /dns/v1/projects/{project}/managedZones/{zone}/changes/{id}`
//!
//! Non-success statuses become [`DnsApiError::Http`] with a reason from
//! [`crate::http_errors`]; request timeouts and connection failures are reported
//! separately so the retry layer can back off on them. A 401 refreshes the access
//! token and resends the request once.

use crate::auth::TokenProvider;
use crate::constants::HTTP_REQUEST_TIMEOUT_SECS;
use crate::dns_errors::DnsApiError;
use crate::http_errors::map_http_error_to_reason;
use crate::record_store::{Change, DnsApi, ListFilter, RecordSetPage};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Google API error envelope: `{"error": {"code": 409, "message": "..."}}`.
#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
}

/// Build the HTTP client shared by the Cloud DNS client and the token provider.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
        .build()
}

/// Client for one Cloud DNS managed zone.
pub struct CloudDnsClient {
    http: reqwest::Client,
    tokens: Arc<TokenProvider>,
    endpoint: Url,
    project: String,
    zone: String,
}

impl CloudDnsClient {
    /// Create a client for `project`/`zone` at `endpoint` (normally
    /// `https://dns.googleapis.com`).
    ///
    /// # Errors
    ///
    /// Returns [`DnsApiError::Transport`] if `endpoint` is not a usable base URL.
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<TokenProvider>,
        endpoint: &str,
        project: impl Into<String>,
        zone: impl Into<String>,
    ) -> Result<Self, DnsApiError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| DnsApiError::Transport(format!("invalid endpoint '{endpoint}': {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(DnsApiError::Transport(format!(
                "endpoint '{endpoint}' cannot be used as a base URL"
            )));
        }

        Ok(Self {
            http,
            tokens,
            endpoint,
            project: project.into(),
            zone: zone.into(),
        })
    }

    /// The managed zone this client writes to.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// The project owning the zone.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// URL of a collection or item under the managed zone.
    fn zone_url(&self, tail: &[&str]) -> Result<Url, DnsApiError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| DnsApiError::Transport("endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend([
                "dns",
                "v1",
                "projects",
                self.project.as_str(),
                "managedZones",
                self.zone.as_str(),
            ])
            .extend(tail);
        Ok(url)
    }

    /// Send `request` with a bearer token. A 401 drops the cached token and the request
    /// is sent once more with a fresh one.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, DnsApiError> {
        let retry = request.try_clone();
        let mut response = self.send_authorized(request).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            if let Some(retry) = retry {
                debug!("Access token rejected, retrying with a fresh one");
                response = self.send_authorized(retry).await?;
                if response.status() == StatusCode::UNAUTHORIZED {
                    self.tokens.invalidate().await;
                }
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http_error(status, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DnsApiError::Decode(e.to_string()))
    }

    async fn send_authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, DnsApiError> {
        let token = self.tokens.token().await?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(classify_transport_error)
    }
}

fn classify_transport_error(e: reqwest::Error) -> DnsApiError {
    if e.is_timeout() {
        DnsApiError::Timeout {
            timeout_ms: HTTP_REQUEST_TIMEOUT_SECS * 1000,
        }
    } else {
        DnsApiError::Transport(e.to_string())
    }
}

fn http_error(status: StatusCode, body: &str) -> DnsApiError {
    let (reason, default_message) = map_http_error_to_reason(status.as_u16());
    let message = serde_json::from_str::<GoogleErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or(default_message);

    warn!(status = status.as_u16(), reason = reason, message = %message, "Cloud DNS request failed");

    DnsApiError::Http {
        status: status.as_u16(),
        reason,
        message,
    }
}

#[async_trait]
impl DnsApi for CloudDnsClient {
    async fn list_record_sets(&self, filter: &ListFilter) -> Result<RecordSetPage, DnsApiError> {
        let mut url = self.zone_url(&["rrsets"])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(name) = &filter.name {
                query.append_pair("name", name);
            }
            if let Some(record_type) = &filter.record_type {
                query.append_pair("type", record_type);
            }
            if let Some(max_results) = filter.max_results {
                query.append_pair("maxResults", &max_results.to_string());
            }
            if let Some(page_token) = &filter.page_token {
                query.append_pair("pageToken", page_token);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        debug!(url = %url, "Listing record sets");
        self.send(self.http.get(url)).await
    }

    async fn create_change(&self, change: &Change) -> Result<Change, DnsApiError> {
        let url = self.zone_url(&["changes"])?;
        debug!(
            additions = change.additions.len(),
            deletions = change.deletions.len(),
            "Submitting change"
        );
        self.send(self.http.post(url).json(change)).await
    }

    async fn get_change(&self, change_id: &str) -> Result<Change, DnsApiError> {
        let url = self.zone_url(&["changes", change_id])?;
        self.send(self.http.get(url)).await
    }
}

#[cfg(test)]
#[path = "cloud_dns_tests.rs"]
mod cloud_dns_tests;
