//! Opaque bearer tokens and their scopes.
//!
//! A token's plaintext is 32 random bytes encoded as unpadded base64url,
//! which is always [`TOKEN_LENGTH`] characters. Only the SHA-256 of the
//! plaintext is ever persisted or compared.

use super::validator::Validator;
use anyhow::Result;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Length of every token plaintext.
pub const TOKEN_LENGTH: usize = 43;

const TOKEN_ENTROPY_BYTES: usize = 32;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Activation,
    Authentication,
    PasswordReset,
}

impl Scope {
    // ---
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
            Scope::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.write_str(self.as_str())
    }
}

/// A freshly issued token.
///
/// This is the only value that ever carries the plaintext; it serializes to
/// `{"token": ..., "expiry": ...}` for the single response that hands it out.
#[derive(Clone, Serialize)]
pub struct Token {
    // ---
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: Scope,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.debug_struct("Token")
            .field("user_id", &self.user_id)
            .field("scope", &self.scope)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl Token {
    // ---
    /// Generates a new random token for `user_id` expiring `ttl` from now.
    pub fn generate(user_id: i64, ttl: Duration, scope: Scope) -> Result<Self> {
        // ---
        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng.try_fill_bytes(&mut bytes)?;

        let plaintext = URL_SAFE_NO_PAD.encode(bytes);
        let hash = hash_plaintext(&plaintext);
        // Persisted at whole-second precision; round down, never up.
        let expiry = (Utc::now() + TimeDelta::from_std(ttl)?).trunc_subsecs(0);

        Ok(Self {
            plaintext,
            hash,
            user_id,
            expiry,
            scope,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        // ---
        now >= self.expiry
    }
}

/// Deterministic digest used to store and look up tokens.
pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    // ---
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Checks the shape of a presented token before any lookup.
pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    // ---
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_LENGTH,
        "token",
        "must be 43 bytes long",
    );
    v.check(
        plaintext
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'),
        "token",
        "must contain only url-safe base64 characters",
    );
}
