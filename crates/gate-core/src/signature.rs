//! Webhook signature verification.
//!
//! The sender signs every delivery body with HMAC-SHA256 over a shared
//! secret and transmits the digest as `sha256=<hex>` in a header. This
//! module recomputes the digest and compares it in constant time.
//!
//! # Security
//!
//! All malformed inputs — missing prefix, truncated hex, overlong hex,
//! non-hex characters, or a digest that simply does not match — are rejected
//! with the same opaque [`SignatureError::Invalid`]. Distinguishing the
//! failure mode in the response would give an attacker an oracle.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Prefix the sender puts in front of the hex digest.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Error returned for any signature verification failure.
///
/// Deliberately carries no detail about *why* verification failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    Invalid,
}

/// Interface for webhook signature verification.
///
/// Implementations must not proceed with any privileged operation when
/// verification fails; callers treat `Err` as a terminal admission decision.
pub trait SignatureVerifier: Send + Sync {
    /// Verify a claimed signature over the raw body bytes.
    fn verify(&self, payload: &[u8], claimed: &str) -> Result<(), SignatureError>;

    /// Check if implementation compares digests in constant time.
    fn supports_constant_time_comparison(&self) -> bool;
}

/// HMAC-SHA256 verifier backed by a shared secret.
///
/// # Examples
///
/// ```rust
/// use gate_core::signature::{HmacSha256Verifier, SignatureVerifier};
///
/// let verifier = HmacSha256Verifier::new("my-secret".to_string());
/// assert!(verifier.supports_constant_time_comparison());
/// ```
pub struct HmacSha256Verifier {
    secret: String,
}

impl HmacSha256Verifier {
    /// Construct a verifier with the given shared secret.
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Compute the expected digest for a payload.
    ///
    /// Exposed for tests and for callers that need to produce signatures
    /// (e.g. local development tooling).
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(payload);
        format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for HmacSha256Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSha256Verifier")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

impl SignatureVerifier for HmacSha256Verifier {
    /// Verify a HMAC-SHA256 webhook signature.
    ///
    /// The claimed value must carry the `sha256=` prefix followed by exactly
    /// 64 hex characters. The comparison runs over the decoded digest bytes
    /// with [`subtle::ConstantTimeEq`], so timing does not leak where the
    /// bytes first differ.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Invalid`] for every failure mode.
    fn verify(&self, payload: &[u8], claimed: &str) -> Result<(), SignatureError> {
        let hex_part = claimed
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(SignatureError::Invalid)?;

        let claimed_bytes = hex::decode(hex_part).map_err(|_| SignatureError::Invalid)?;
        if claimed_bytes.len() != 32 {
            return Err(SignatureError::Invalid);
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| SignatureError::Invalid)?;
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        if expected.ct_eq(claimed_bytes.as_slice()).into() {
            Ok(())
        } else {
            Err(SignatureError::Invalid)
        }
    }

    /// Returns `true`; the digest comparison uses `subtle::ConstantTimeEq`.
    fn supports_constant_time_comparison(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
