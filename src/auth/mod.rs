// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

mod crypto;
mod secret_cache;
mod token_manager;

pub use crypto::SecretCipher;
pub use secret_cache::{AppSecret, CentralSecretCache, SecretStore};
pub use token_manager::{
    AccessToken, AuthType, CredentialRecord, CredentialStore, TokenManager,
};
