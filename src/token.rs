//! Access token generation for assignments
//!
//! Every assignment carries a unique token that doubles as the public
//! evaluation link: 32 cryptographically random bytes, hex-encoded to 64
//! lowercase characters. Possession of the token is the only credential a
//! participant needs.

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Hex length of a freshly generated token
pub const TOKEN_HEX_LEN: usize = 64;

/// Opaque assignment access token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Generate a fresh random token (32 bytes, 64 hex chars)
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(
            bytes
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<String>(),
        )
    }

    /// Wrap a token string received from a client
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
