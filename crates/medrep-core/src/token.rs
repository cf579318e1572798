//! Stateless session credentials.
//!
//! A credential is `<payload>.<mac>` where `payload` is the unpadded
//! base64url encoding of the JSON claims (`sub`, `iat`, `exp` in unix
//! seconds) and `mac` is the lowercase hex HMAC-SHA256 of the payload
//! string under the server signing secret. The alphabet is cookie-safe, so
//! the same string travels in a `Set-Cookie` header or a bearer header.
//!
//! # Security Invariants
//!
//! - The MAC is recomputed and compared in constant time **before** the
//!   payload is decoded; structure and signature failures are collapsed into
//!   a single [`TokenError::Malformed`] outcome.
//! - Verification is pure: no clock reads, no state. Callers pass `now`.
//! - There is no revocation. A credential stays valid until its embedded
//!   expiry; rotating the signing secret invalidates every outstanding
//!   credential at once. This is an accepted design constraint.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Fixed credential lifetime: seven days.
pub const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Upper bound on accepted token length, enforced before any decoding.
pub const MAX_TOKEN_LEN: usize = 4096;

/// Minimum signing-secret length in bytes. Enforced by config validation at
/// startup; a minter is never constructed with a shorter secret.
pub const MIN_SECRET_LEN: usize = 32;

/// Errors from credential verification and issuance.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Structure or signature is invalid. Deliberately carries no detail
    /// about which check failed.
    #[error("malformed credential")]
    Malformed,

    /// Signature is valid but the credential's lifetime has elapsed.
    #[error("credential expired at {expired_at}")]
    Expired {
        /// Expiry instant embedded in the credential.
        expired_at: DateTime<Utc>,
    },

    /// Credential construction failed. Indicates a claim-serialization
    /// problem, not bad caller input.
    #[error("credential could not be issued: {reason}")]
    Issue {
        /// Underlying serialization or keying failure.
        reason: String,
    },
}

/// A verified session extracted from a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Authenticated subject (account id as issued).
    pub subject_id: String,
    /// When the credential was issued.
    pub issued_at: DateTime<Utc>,
    /// When the credential stops being accepted.
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies session credentials under a single signing secret.
pub struct TokenMinter {
    secret: SecretString,
}

impl TokenMinter {
    /// Creates a minter from the server signing secret.
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Issues a credential for `subject_id`, valid from `now` for
    /// [`TOKEN_TTL_SECS`].
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Issue`] when the claims cannot be serialized or
    /// the MAC cannot be keyed.
    pub fn issue(&self, subject_id: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject_id.to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + TOKEN_TTL_SECS,
        };
        let json = serde_json::to_vec(&claims).map_err(|err| TokenError::Issue {
            reason: err.to_string(),
        })?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let mac = self
            .compute_mac(payload.as_bytes())
            .map_err(|reason| TokenError::Issue { reason })?;
        Ok(format!("{payload}.{}", hex::encode(mac)))
    }

    /// Verifies `token` at instant `now` and returns the embedded session.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] for any structural or signature
    /// failure and [`TokenError::Expired`] for an authentic credential past
    /// its expiry.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Session, TokenError> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(TokenError::Malformed);
        }
        let (payload, mac_hex) = token.split_once('.').ok_or(TokenError::Malformed)?;

        let expected = self
            .compute_mac(payload.as_bytes())
            .map_err(|_| TokenError::Malformed)?;
        let provided = hex::decode(mac_hex).map_err(|_| TokenError::Malformed)?;
        if expected.len() != provided.len() {
            return Err(TokenError::Malformed);
        }
        let matches: bool = expected.ct_eq(provided.as_slice()).into();
        if !matches {
            return Err(TokenError::Malformed);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;
        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Malformed)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Malformed)?;

        if now > expires_at {
            return Err(TokenError::Expired {
                expired_at: expires_at,
            });
        }

        Ok(Session {
            subject_id: claims.sub,
            issued_at,
            expires_at,
        })
    }

    fn compute_mac(&self, payload: &[u8]) -> Result<Vec<u8>, String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|err| format!("invalid signing secret: {err}"))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl std::fmt::Debug for TokenMinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenMinter")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
