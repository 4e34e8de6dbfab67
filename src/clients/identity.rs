/// Identity service client: token acquisition and project/domain lookups
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::clients::OwnershipResolver;
use crate::error::{Result, SyncError};
use crate::types::{Credentials, Domain, Project};

const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Scoped token issued by the identity service
#[derive(Clone)]
pub struct AuthToken {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthToken {
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expiry) => Utc::now() >= expiry,
            None => false,
        }
    }

    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expiry| (expiry - Utc::now()).num_minutes())
    }

    /// Fail fast before a run starts with a token that is already dead
    pub fn ensure_valid(&self) -> Result<()> {
        if self.is_expired() {
            return Err(SyncError::TokenExpired(format!(
                "Token expired at {}",
                self.expires_at.map(|e| e.to_rfc3339()).unwrap_or_default()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    token: TokenDetails,
}

#[derive(Debug, Deserialize)]
struct TokenDetails {
    expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectBody {
    project: Option<Project>,
}

#[derive(Debug, Deserialize)]
struct DomainBody {
    domain: Option<Domain>,
}

/// Identity service client holding the run's token
pub struct IdentityClient {
    client: Client,
    base_url: String,
    token: AuthToken,
}

impl IdentityClient {
    /// Authenticate with password credentials scoped to the user's domain
    pub async fn login(client: Client, base_url: &str, credentials: &Credentials) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        info!("Authenticating as {} in domain {}", credentials.username, credentials.domain);

        let auth_req = serde_json::json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "domain": { "name": credentials.domain },
                            "name": credentials.username,
                            "password": credentials.password
                        }
                    }
                },
                "scope": {
                    "domain": { "name": credentials.domain }
                }
            }
        });

        let response = client
            .post(format!("{}/auth/tokens", base_url))
            .header("Content-Type", "application/json")
            .json(&auth_req)
            .send()
            .await?;

        let status = response.status();
        let header_token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.text().await?;

        debug!("Auth response status: {}", status);

        if !status.is_success() {
            return Err(SyncError::AuthenticationFailed(format!(
                "Identity service returned {}: {}",
                status, body
            )));
        }

        let value = header_token.ok_or_else(|| {
            SyncError::AuthenticationFailed(format!("No {} header in auth response", SUBJECT_TOKEN_HEADER))
        })?;

        let token = AuthToken {
            value,
            expires_at: parse_token_expiry(&body),
        };

        match token.minutes_until_expiry() {
            Some(minutes) => info!("Authenticated, token valid for {} minutes", minutes),
            None => info!("Authenticated, token expiry unknown"),
        }

        Ok(IdentityClient {
            client,
            base_url,
            token,
        })
    }

    pub fn token(&self) -> &AuthToken {
        &self.token
    }

    async fn get_json(&self, path: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .header(AUTH_TOKEN_HEADER, &self.token.value)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("Identity lookup {} returned {}", path, status);
            return Ok(None);
        }

        Ok(Some(response.text().await?))
    }
}

#[async_trait]
impl OwnershipResolver for IdentityClient {
    async fn resolve_project(&self, project_id: &str) -> Result<Option<Project>> {
        match self.get_json(&format!("projects/{}", project_id)).await? {
            Some(body) => Ok(serde_json::from_str::<ProjectBody>(&body)?.project),
            None => Ok(None),
        }
    }

    async fn resolve_domain(&self, domain_id: &str) -> Result<Option<Domain>> {
        match self.get_json(&format!("domains/{}", domain_id)).await? {
            Some(body) => Ok(serde_json::from_str::<DomainBody>(&body)?.domain),
            None => Ok(None),
        }
    }
}

/// Extract `token.expires_at` from an auth response body
fn parse_token_expiry(body: &str) -> Option<DateTime<Utc>> {
    let parsed: TokenBody = serde_json::from_str(body).ok()?;
    let raw = parsed.token.expires_at?;
    DateTime::parse_from_rfc3339(&raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
