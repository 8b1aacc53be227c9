//! Users, credentials, and the per-request identity.

use super::validator::{matches, Validator, EMAIL_RX};
use anyhow::{anyhow, Result};
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use std::fmt;

/// A registered member of the book club.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    // ---
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    /// Optimistic concurrency counter, bumped on every update.
    #[serde(skip)]
    pub version: i32,
}

/// Values needed to create a user; the store assigns id, timestamp and version.
#[derive(Debug, Clone)]
pub struct NewUser {
    // ---
    pub username: String,
    pub email: String,
    pub password: Password,
    pub activated: bool,
}

/// Who is making the current request.
///
/// Bound into the request extensions by the authenticator; every request
/// that passed it carries exactly one `Identity`.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    User(User),
}

impl Identity {
    // ---
    pub fn is_anonymous(&self) -> bool {
        // ---
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        // ---
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }
}

// ============================================================================
// Password hashing
// ============================================================================

/// A one-way password hash in PHC string form.
///
/// Plaintext only ever passes through [`Password::set`] and
/// [`Password::matches`]; it is never stored on the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    // ---
    hash: String,
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        f.write_str("Password(<redacted>)")
    }
}

impl Password {
    // ---
    /// Wraps a hash loaded from storage.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        // ---
        Self { hash: hash.into() }
    }

    pub fn hash(&self) -> &str {
        // ---
        &self.hash
    }

    /// Hashes `plaintext` with Argon2 on the blocking pool.
    pub async fn set(plaintext: &str) -> Result<Self> {
        // ---
        let plaintext = plaintext.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_plaintext(&plaintext)).await??;
        Ok(Self { hash })
    }

    /// Verifies `plaintext` against the stored hash.
    ///
    /// A mismatch is `Ok(false)`; a malformed stored hash is an error.
    pub async fn matches(&self, plaintext: &str) -> Result<bool> {
        // ---
        let plaintext = plaintext.to_string();
        let hash = self.hash.clone();
        tokio::task::spawn_blocking(move || verify_plaintext(&hash, &plaintext)).await?
    }
}

fn hash_plaintext(plaintext: &str) -> Result<String> {
    // ---
    let mut salt_bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut salt_bytes)?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_plaintext(hash: &str, plaintext: &str) -> Result<bool> {
    // ---
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow!("stored password hash: {e}"))?;
    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!(e.to_string())),
    }
}

// ============================================================================
// Validation
// ============================================================================

pub fn validate_email(v: &mut Validator, email: &str) {
    // ---
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(matches(email, &EMAIL_RX), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    // ---
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(password.len() <= 72, "password", "must not be more than 72 bytes long");
}

pub fn validate_username(v: &mut Validator, username: &str) {
    // ---
    v.check(!username.is_empty(), "username", "must be provided");
    v.check(username.len() <= 200, "username", "must not be more than 200 bytes long");
}
