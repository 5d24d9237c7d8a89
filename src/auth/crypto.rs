// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::errors::AuthError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

const NONCE_LEN: usize = 12;

/// Symmetric cipher for credential material at rest.
/// Payload format: base64(nonce || ciphertext).
pub struct SecretCipher {
    cipher: ChaCha20Poly1305,
}

impl SecretCipher {
    pub fn from_key_bytes(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    pub fn from_base64_key(encoded: &str) -> Result<Self, AuthError> {
        let raw = BASE64.decode(encoded).map_err(|_| AuthError::Decrypt)?;
        let key: [u8; 32] = raw.try_into().map_err(|_| AuthError::Decrypt)?;
        Ok(Self::from_key_bytes(&key))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, AuthError> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| AuthError::Decrypt)?;
        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce);
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, AuthError> {
        let payload = BASE64.decode(encoded).map_err(|_| AuthError::Decrypt)?;
        if payload.len() <= NONCE_LEN {
            return Err(AuthError::Decrypt);
        }
        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AuthError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| AuthError::Decrypt)
    }
}
