// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::auth::crypto::SecretCipher;
use crate::auth::secret_cache::CentralSecretCache;
use crate::errors::AuthError;
use crate::transport::ApiTransport;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
const ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Provider error codes that mean the client secret itself is bad
static INVALID_SECRET_SIGNATURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"AADSTS(7000215|7000222)").unwrap_or_else(|_| unreachable!()));

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    OAuth,
    ServicePrincipal,
    Certificate,
}

/// One stored provider credential. Mutated only by the token manager,
/// persisted through `CredentialStore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    pub organization_id: String,
    pub auth_type: AuthType,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret_encrypted: Option<String>,
    pub certificate_pem_encrypted: Option<String>,
    pub certificate_thumbprint: Option<String>,
    pub refresh_token_encrypted: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub refresh_error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// External persistence for credential records
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn update(&self, record: &CredentialRecord) -> Result<(), AuthError>;
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims {
    aud: String,
    iss: String,
    sub: String,
    jti: String,
    exp: i64,
    nbf: i64,
}

/// Resolves access tokens for stored credentials across the three supported
/// flows, persisting rotation state as it goes.
pub struct TokenManager {
    transport: Arc<dyn ApiTransport>,
    store: Arc<dyn CredentialStore>,
    secrets: Arc<CentralSecretCache>,
    cipher: Arc<SecretCipher>,
    authority: String,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TokenManager {
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        store: Arc<dyn CredentialStore>,
        secrets: Arc<CentralSecretCache>,
        cipher: Arc<SecretCipher>,
    ) -> Self {
        Self {
            transport,
            store,
            secrets,
            cipher,
            authority: DEFAULT_AUTHORITY.to_string(),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Override the authority endpoint, used by tests
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, tenant_id)
    }

    fn credential_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock();
        inflight
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Resolve a usable access token for the record, refreshing through the
    /// flow its auth type demands. Concurrent refreshes for the same
    /// credential are serialized; refresh-token rotation makes a race a
    /// correctness bug, not just wasted work.
    pub async fn resolve_token(
        &self,
        record: &mut CredentialRecord,
    ) -> Result<AccessToken, AuthError> {
        let lock = self.credential_lock(&record.id);
        let _guard = lock.lock().await;

        let result = match record.auth_type {
            AuthType::OAuth => self.refresh_oauth(record).await,
            AuthType::ServicePrincipal => self.client_credentials(record).await,
            AuthType::Certificate => self.certificate_assertion(record).await,
        };

        match &result {
            Ok(token) => {
                record.token_expires_at = Some(token.expires_at);
                record.last_refresh_at = Some(Utc::now());
                record.refresh_error = None;
                self.store.update(record).await?;
                info!(credential = %record.id, "token resolved");
            }
            Err(err) => {
                record.refresh_error = Some(err.to_string());
                // Persist the failure marker; the original error wins even
                // if the store write also fails.
                if let Err(store_err) = self.store.update(record).await {
                    warn!(credential = %record.id, error = %store_err, "failed to persist refresh error");
                }
            }
        }
        result
    }

    async fn refresh_oauth(
        &self,
        record: &mut CredentialRecord,
    ) -> Result<AccessToken, AuthError> {
        let encrypted = record
            .refresh_token_encrypted
            .as_deref()
            .ok_or(AuthError::MissingSecret)?;
        let refresh_token = self.cipher.decrypt(encrypted)?;

        let client_secret = match record.client_secret_encrypted.as_deref() {
            Some(encrypted_secret) => Some(self.cipher.decrypt(encrypted_secret)?),
            None => None,
        };

        let mut params: Vec<(&str, &str)> = vec![
            ("grant_type", "refresh_token"),
            ("client_id", &record.client_id),
            ("refresh_token", &refresh_token),
            ("scope", MANAGEMENT_SCOPE),
        ];
        if let Some(secret) = client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let mut response = self.exchange(&record.tenant_id, &params).await?;

        // Providers rotate refresh tokens on use; the new one replaces the
        // stored one immediately or the credential dies on the next run.
        if let Some(rotated) = response.refresh_token.take() {
            record.refresh_token_encrypted = Some(self.cipher.encrypt(&rotated)?);
            debug!(credential = %record.id, "rotated refresh token stored");
        }

        Ok(Self::access_token(response))
    }

    async fn client_credentials(
        &self,
        record: &CredentialRecord,
    ) -> Result<AccessToken, AuthError> {
        // Prefer the centrally managed app secret; fall back to the
        // record's own encrypted secret.
        let (client_id, client_secret) = match self.secrets.get().await {
            Ok(app) => (app.client_id, app.client_secret),
            Err(central_err) => match record.client_secret_encrypted.as_deref() {
                Some(encrypted) => {
                    (record.client_id.clone(), self.cipher.decrypt(encrypted)?)
                }
                None => return Err(central_err),
            },
        };

        let params: Vec<(&str, &str)> = vec![
            ("grant_type", "client_credentials"),
            ("client_id", &client_id),
            ("client_secret", &client_secret),
            ("scope", MANAGEMENT_SCOPE),
        ];

        let response = self.exchange(&record.tenant_id, &params).await?;
        Ok(Self::access_token(response))
    }

    async fn certificate_assertion(
        &self,
        record: &CredentialRecord,
    ) -> Result<AccessToken, AuthError> {
        let encrypted = record
            .certificate_pem_encrypted
            .as_deref()
            .ok_or(AuthError::CertificateInvalid)?;
        let pem = self.cipher.decrypt(encrypted)?;
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|_| AuthError::CertificateInvalid)?;

        let token_url = self.token_url(&record.tenant_id);
        let now = Utc::now();
        let claims = AssertionClaims {
            aud: token_url.clone(),
            iss: record.client_id.clone(),
            sub: record.client_id.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            exp: (now + ChronoDuration::seconds(600)).timestamp(),
            nbf: now.timestamp(),
        };

        let mut header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        header.x5t = record.certificate_thumbprint.clone();
        let assertion = jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|_| AuthError::CertificateInvalid)?;

        let params: Vec<(&str, &str)> = vec![
            ("grant_type", "client_credentials"),
            ("client_id", &record.client_id),
            ("client_assertion_type", ASSERTION_TYPE),
            ("client_assertion", &assertion),
            ("scope", MANAGEMENT_SCOPE),
        ];

        let response = self.exchange(&record.tenant_id, &params).await?;
        Ok(Self::access_token(response))
    }

    async fn exchange(
        &self,
        tenant_id: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenEndpointResponse, AuthError> {
        let url = self.token_url(tenant_id);
        let response = self
            .transport
            .post_form(&url, params)
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        if response.is_success() {
            serde_json::from_str(&response.body)
                .map_err(|_| AuthError::RefreshFailed("malformed token response".into()))
        } else {
            Err(Self::map_provider_error(response.status, &response.body))
        }
    }

    /// Known provider signatures map to stable messages; raw bodies are
    /// never surfaced.
    fn map_provider_error(status: u16, body: &str) -> AuthError {
        if INVALID_SECRET_SIGNATURE.is_match(body) {
            return AuthError::InvalidClientSecret;
        }
        AuthError::TokenEndpoint {
            status,
            message: "token request rejected by identity provider".to_string(),
        }
    }

    fn access_token(response: TokenEndpointResponse) -> AccessToken {
        AccessToken {
            token: response.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(response.expires_in),
        }
    }
}
