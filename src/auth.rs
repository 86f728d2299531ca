// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! OAuth2 access tokens for Cloud DNS.
//!
//! Tokens come from one of two places:
//!
//! - a service account JSON key (`--sa-file`): an RS256-signed JWT assertion is exchanged
//!   at the key's `token_uri` using the JWT bearer grant
//! - the GCE metadata server, when no key file is configured
//!
//! Tokens are cached and refreshed five minutes before they expire. The metadata server
//! also supplies the project id when `--project` is not given.

use crate::constants::{
    CLOUD_DNS_SCOPE, GOOGLE_TOKEN_URI, JWT_BEARER_GRANT_TYPE, METADATA_FLAVOR_HEADER,
    METADATA_FLAVOR_VALUE, SERVICE_ACCOUNT_ASSERTION_LIFETIME_SECS, TOKEN_REFRESH_BUFFER_SECS,
};
use crate::dns_errors::DnsApiError;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The fields of a service account key file this crate needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account email, used as the JWT issuer
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: String,
    /// Token endpoint; defaults to Google's
    #[serde(default)]
    pub token_uri: Option<String>,
    /// Project the service account belongs to
    #[serde(default)]
    pub project_id: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`DnsApiError::Credentials`] if the JSON is malformed or lacks required fields.
    pub fn from_json(json: &str) -> Result<Self, DnsApiError> {
        serde_json::from_str(json)
            .map_err(|e| DnsApiError::Credentials(format!("invalid service account key: {e}")))
    }

    /// Read and parse a key file.
    ///
    /// # Errors
    ///
    /// Returns [`DnsApiError::Credentials`] if the file cannot be read or parsed.
    pub async fn from_file(path: &Path) -> Result<Self, DnsApiError> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            DnsApiError::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(GOOGLE_TOKEN_URI)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(TOKEN_REFRESH_BUFFER_SECS) < self.expires_at
    }
}

/// Where access tokens come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Exchange a signed assertion for a token
    ServiceAccount(ServiceAccountKey),
    /// Ask the metadata server at this base URL
    Metadata {
        /// e.g. `http://metadata.google.internal/computeMetadata/v1`
        base_url: String,
    },
    /// A fixed token, never refreshed
    Fixed(String),
}

/// Cached access token provider.
pub struct TokenProvider {
    source: TokenSource,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    /// Create a provider over `source`, issuing HTTP requests with `http`.
    pub fn new(source: TokenSource, http: reqwest::Client) -> Self {
        Self {
            source,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Short description of the credential source for startup logs.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.source {
            TokenSource::ServiceAccount(key) => format!("service account {}", key.client_email),
            TokenSource::Metadata { .. } => "metadata server".to_string(),
            TokenSource::Fixed(_) => "fixed token".to_string(),
        }
    }

    /// Return a valid access token, fetching a new one if the cached token is about to
    /// expire.
    ///
    /// # Errors
    ///
    /// Returns [`DnsApiError::TokenUnavailable`] for transient failures and
    /// [`DnsApiError::Credentials`] when the credentials are rejected.
    pub async fn token(&self) -> Result<String, DnsApiError> {
        if let TokenSource::Fixed(token) = &self.source {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if current.is_fresh(Utc::now()) {
                return Ok(current.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        debug!(expires_at = %fresh.expires_at, source = %self.describe(), "Fetched access token");
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self) -> Result<CachedToken, DnsApiError> {
        let now = Utc::now();
        let response = match &self.source {
            TokenSource::ServiceAccount(key) => self.exchange_assertion(key, now).await?,
            TokenSource::Metadata { base_url } => {
                let url = format!("{base_url}/instance/service-accounts/default/token");
                let response = self
                    .http
                    .get(&url)
                    .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE)
                    .send()
                    .await
                    .map_err(|e| DnsApiError::TokenUnavailable(e.to_string()))?;
                decode_token_response(response).await?
            }
            TokenSource::Fixed(token) => TokenResponse {
                access_token: token.clone(),
                expires_in: None,
            },
        };

        let lifetime = response
            .expires_in
            .unwrap_or(SERVICE_ACCOUNT_ASSERTION_LIFETIME_SECS);
        Ok(CachedToken {
            token: response.access_token,
            expires_at: now + TimeDelta::seconds(lifetime),
        })
    }

    async fn exchange_assertion(
        &self,
        key: &ServiceAccountKey,
        now: DateTime<Utc>,
    ) -> Result<TokenResponse, DnsApiError> {
        let assertion = sign_assertion(key, now)?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT_TYPE)
            .append_pair("assertion", &assertion)
            .finish();

        let response = self
            .http
            .post(key.token_uri())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await
            .map_err(|e| DnsApiError::TokenUnavailable(e.to_string()))?;

        decode_token_response(response).await
    }
}

/// Build and sign the RS256 JWT assertion for `key`.
///
/// # Errors
///
/// Returns [`DnsApiError::Credentials`] if the private key is not a valid RSA PEM.
pub fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String, DnsApiError> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: CLOUD_DNS_SCOPE,
        aud: key.token_uri(),
        iat,
        exp: iat + SERVICE_ACCOUNT_ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| DnsApiError::Credentials(format!("invalid private key: {e}")))?;

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| DnsApiError::Credentials(format!("failed to sign assertion: {e}")))
}

async fn decode_token_response(response: reqwest::Response) -> Result<TokenResponse, DnsApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = format!("token endpoint returned HTTP {}: {body}", status.as_u16());
        return Err(if status.is_server_error() || status.as_u16() == 429 {
            DnsApiError::TokenUnavailable(message)
        } else {
            DnsApiError::Credentials(message)
        });
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| DnsApiError::Decode(format!("token response: {e}")))
}

/// Read the project id from the metadata server at `base_url`.
///
/// # Errors
///
/// Returns an error if the metadata server cannot be reached or answers with a
/// non-success status.
pub async fn discover_project_id(
    http: &reqwest::Client,
    base_url: &str,
) -> Result<String, DnsApiError> {
    let url = format!("{base_url}/project/project-id");
    let response = http
        .get(&url)
        .header(METADATA_FLAVOR_HEADER, METADATA_FLAVOR_VALUE)
        .send()
        .await
        .map_err(|e| DnsApiError::Transport(format!("metadata server: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let (reason, message) = crate::http_errors::map_http_error_to_reason(status.as_u16());
        return Err(DnsApiError::Http {
            status: status.as_u16(),
            reason,
            message: format!("metadata server: {message}"),
        });
    }

    let project = response
        .text()
        .await
        .map_err(|e| DnsApiError::Decode(format!("project id: {e}")))?
        .trim()
        .to_string();
    info!(project = %project, "Discovered project from metadata server");
    Ok(project)
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;
