//! Credentials and sessions
//!
//! Directory passwords are stored as opaque salted hashes and compared
//! through a pluggable verifier, never as plaintext. Logins are issued
//! HMAC-SHA256-signed session tokens with an expiry; the signature covers
//! the user id and expiry timestamp so neither can be tampered with.

use crate::error::{Result, VantageError};
use crate::types::UserId;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const HASH_SCHEME: &str = "sha256";

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Opaque salted password hash, stored as `sha256$<salt>$<digest>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a plaintext password with a fresh random salt
    pub fn hash(plain: &str) -> Self {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        Self(Self::encode(&salt, plain))
    }

    /// Reconstruct from a stored string without re-hashing
    pub fn from_stored(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn encode(salt: &[u8], plain: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(plain.as_bytes());
        let digest = hasher.finalize();
        format!("{}${}${}", HASH_SCHEME, hex_encode(salt), hex_encode(&digest))
    }

    fn salt_hex(&self) -> Option<&str> {
        self.0.split('$').nth(1)
    }
}

/// Pluggable credential check
///
/// The login handler only ever sees this trait, so the hashing scheme can be
/// swapped without touching the HTTP layer.
pub trait CredentialVerifier: Send + Sync {
    /// Check a candidate plaintext against a stored hash
    fn verify(&self, candidate: &str, stored: &PasswordHash) -> bool;
}

/// Default verifier for the `sha256$salt$digest` scheme
pub struct Sha256Verifier;

impl CredentialVerifier for Sha256Verifier {
    fn verify(&self, candidate: &str, stored: &PasswordHash) -> bool {
        let Some(salt_hex) = stored.salt_hex() else {
            return false;
        };
        let Some(salt) = decode_hex(salt_hex) else {
            return false;
        };
        PasswordHash::encode(&salt, candidate) == stored.as_str()
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// Issues and verifies signed, expiring session tokens
///
/// Token format: `<user_id>.<expires_at_unix>.<signature>` where the
/// signature is HMAC-SHA256 over `user_id:expires_at` with the shared
/// secret.
pub struct SessionSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl SessionSigner {
    pub fn new(secret: impl Into<Vec<u8>>, ttl_hours: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Issue a session token for a user, valid until now + TTL
    pub fn issue(&self, user_id: UserId) -> Result<String> {
        let expires_at = Utc::now() + self.ttl;
        let signature = self.sign(user_id, expires_at)?;
        Ok(format!("{}.{}.{}", user_id, expires_at.timestamp(), signature))
    }

    /// Verify signature and expiry, returning the session's user id
    pub fn verify(&self, token: &str) -> Result<UserId> {
        let mut parts = token.splitn(3, '.');
        let (Some(id_part), Some(exp_part), Some(sig_part)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(VantageError::Unauthorized(
                "malformed session token".to_string(),
            ));
        };

        let user_id = UserId::from_string(id_part)
            .map_err(|_| VantageError::Unauthorized("malformed session token".to_string()))?;
        let expires_ts: i64 = exp_part
            .parse()
            .map_err(|_| VantageError::Unauthorized("malformed session token".to_string()))?;
        let expires_at = DateTime::<Utc>::from_timestamp(expires_ts, 0)
            .ok_or_else(|| VantageError::Unauthorized("malformed session token".to_string()))?;

        if expires_at < Utc::now() {
            return Err(VantageError::Unauthorized("session expired".to_string()));
        }

        let expected = self.sign(user_id, expires_at)?;
        if expected != sig_part {
            return Err(VantageError::Unauthorized(
                "invalid session signature".to_string(),
            ));
        }

        Ok(user_id)
    }

    fn sign(&self, user_id: UserId, expires_at: DateTime<Utc>) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| VantageError::Other(format!("Invalid HMAC key: {}", e)))?;
        mac.update(format!("{}:{}", user_id, expires_at.timestamp()).as_bytes());
        Ok(hex_encode(&mac.finalize().into_bytes()))
    }
}
