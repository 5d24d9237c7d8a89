// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::MockTransport;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use vartija::auth::{
    AppSecret, AuthType, CentralSecretCache, CredentialRecord, CredentialStore, SecretCipher,
    SecretStore, TokenManager,
};
use vartija::errors::{AuthError, INVALID_CLIENT_SECRET_REMEDIATION};

struct RecordingStore {
    updates: Mutex<Vec<CredentialRecord>>,
}

#[async_trait]
impl CredentialStore for RecordingStore {
    async fn update(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        self.updates.lock().push(record.clone());
        Ok(())
    }
}

struct StaticSecretStore;

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn fetch_app_secret(&self) -> Result<AppSecret, AuthError> {
        Ok(AppSecret {
            client_id: "central-app".into(),
            client_secret: "central-secret".into(),
        })
    }

    async fn last_rotated_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

fn cipher() -> Arc<SecretCipher> {
    Arc::new(SecretCipher::from_key_bytes(&[9u8; 32]))
}

fn oauth_record(cipher: &SecretCipher) -> CredentialRecord {
    CredentialRecord {
        id: "cred-1".into(),
        organization_id: "org-1".into(),
        auth_type: AuthType::OAuth,
        tenant_id: "tenant-1".into(),
        client_id: "client-1".into(),
        client_secret_encrypted: None,
        certificate_pem_encrypted: None,
        certificate_thumbprint: None,
        refresh_token_encrypted: Some(cipher.encrypt("old-refresh-token").unwrap()),
        token_expires_at: None,
        last_refresh_at: None,
        refresh_error: Some("stale failure from an earlier run".into()),
    }
}

fn manager(
    transport: Arc<MockTransport>,
    store: Arc<RecordingStore>,
    cipher: Arc<SecretCipher>,
) -> TokenManager {
    let secrets = Arc::new(CentralSecretCache::new(Box::new(StaticSecretStore)));
    TokenManager::new(transport, store, secrets, cipher).with_authority("https://login.test")
}

#[tokio::test]
async fn oauth_refresh_persists_rotated_token_and_clears_error() {
    let transport = Arc::new(MockTransport::new());
    transport.set_post_response(
        200,
        json!({
            "access_token": "new-access",
            "expires_in": 3600,
            "refresh_token": "rotated-refresh-token"
        }),
    );
    let store = Arc::new(RecordingStore {
        updates: Mutex::new(Vec::new()),
    });
    let cipher = cipher();
    let manager = manager(transport.clone(), store.clone(), cipher.clone());

    let mut record = oauth_record(&cipher);
    let token = manager.resolve_token(&mut record).await.unwrap();

    assert_eq!(token.token, "new-access");
    assert!(token.expires_at > Utc::now());

    // The rotated refresh token is re-encrypted and persisted.
    let stored = cipher
        .decrypt(record.refresh_token_encrypted.as_deref().unwrap())
        .unwrap();
    assert_eq!(stored, "rotated-refresh-token");
    assert!(record.refresh_error.is_none());
    assert!(record.last_refresh_at.is_some());

    let updates = store.updates.lock();
    assert_eq!(updates.len(), 1);
    assert!(updates[0].refresh_error.is_none());

    // Exchange went to the tenant-scoped endpoint with the decrypted token.
    let posts = transport.posts.lock();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "https://login.test/tenant-1/oauth2/v2.0/token");
    assert!(posts[0]
        .1
        .iter()
        .any(|(k, v)| k == "refresh_token" && v == "old-refresh-token"));
    assert!(posts[0]
        .1
        .iter()
        .any(|(k, v)| k == "grant_type" && v == "refresh_token"));
}

#[tokio::test]
async fn invalid_client_secret_maps_to_fixed_remediation_and_is_persisted() {
    let transport = Arc::new(MockTransport::new());
    transport.set_post_response(
        401,
        json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided. Trace ID: abc"
        }),
    );
    let store = Arc::new(RecordingStore {
        updates: Mutex::new(Vec::new()),
    });
    let cipher = cipher();
    let manager = manager(transport, store.clone(), cipher.clone());

    let mut record = oauth_record(&cipher);
    let err = manager.resolve_token(&mut record).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidClientSecret));
    assert_eq!(err.to_string(), INVALID_CLIENT_SECRET_REMEDIATION);
    // The raw provider body never surfaces.
    assert!(!err.to_string().contains("AADSTS"));

    let updates = store.updates.lock();
    assert_eq!(updates.len(), 1);
    assert_eq!(
        updates[0].refresh_error.as_deref(),
        Some(INVALID_CLIENT_SECRET_REMEDIATION)
    );
}

#[tokio::test]
async fn service_principal_prefers_central_secret() {
    let transport = Arc::new(MockTransport::new());
    transport.set_post_response(
        200,
        json!({"access_token": "sp-access", "expires_in": 3600}),
    );
    let store = Arc::new(RecordingStore {
        updates: Mutex::new(Vec::new()),
    });
    let cipher = cipher();
    let manager = manager(transport.clone(), store, cipher.clone());

    let mut record = oauth_record(&cipher);
    record.auth_type = AuthType::ServicePrincipal;
    // Record carries its own secret, but the central one wins.
    record.client_secret_encrypted = Some(cipher.encrypt("record-secret").unwrap());

    let token = manager.resolve_token(&mut record).await.unwrap();
    assert_eq!(token.token, "sp-access");

    let posts = transport.posts.lock();
    assert!(posts[0]
        .1
        .iter()
        .any(|(k, v)| k == "client_id" && v == "central-app"));
    assert!(posts[0]
        .1
        .iter()
        .any(|(k, v)| k == "client_secret" && v == "central-secret"));
    assert!(posts[0]
        .1
        .iter()
        .any(|(k, v)| k == "grant_type" && v == "client_credentials"));
}

#[tokio::test]
async fn missing_refresh_token_fails_without_network_call() {
    let transport = Arc::new(MockTransport::new());
    let store = Arc::new(RecordingStore {
        updates: Mutex::new(Vec::new()),
    });
    let cipher = cipher();
    let manager = manager(transport.clone(), store, cipher.clone());

    let mut record = oauth_record(&cipher);
    record.refresh_token_encrypted = None;

    let err = manager.resolve_token(&mut record).await.unwrap_err();
    assert!(matches!(err, AuthError::MissingSecret));
    assert_eq!(transport.posts.lock().len(), 0);
}
