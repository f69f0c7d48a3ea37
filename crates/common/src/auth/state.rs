//! Signed OAuth state token codec
//!
//! Creates and verifies tamper-proof state tokens that survive the OAuth
//! redirect round-trip. The token is an HS256-signed JWT: a reversible,
//! URL-safe encoding of the payload plus a keyed-MAC signature segment. The
//! payload is authenticated, never encrypted, so it must not carry secrets.
//!
//! The codec proves authenticity only. Freshness (the 20-minute window on
//! `issued_at_ms`) is enforced by the caller, which owns the clock policy.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried through the OAuth redirect round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    pub provider: String,
    pub user_id: String,
    pub return_path: String,
    pub issued_at_ms: i64,
    pub version: u8,
}

/// Errors produced by [`StateCodec`].
#[derive(Debug, Error)]
pub enum StateCodecError {
    /// Token is structurally invalid (missing segments, bad encoding, or a
    /// payload that does not deserialize).
    #[error("malformed state token: {0}")]
    Malformed(String),

    /// Signature segment does not match the payload under the held secret.
    #[error("state token signature mismatch")]
    SignatureMismatch,

    /// Signing failed; only possible with a degenerate key.
    #[error("failed to sign state token: {0}")]
    Signing(String),
}

/// HS256 signer/verifier for OAuth state tokens, holding the server secret.
pub struct StateCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl StateCodec {
    /// Build a codec from the server-held signing secret.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Encode and sign a payload into an opaque, URL-safe token.
    pub fn create(&self, payload: &StatePayload) -> Result<String, StateCodecError> {
        encode(&Header::new(Algorithm::HS256), payload, &self.encoding_key)
            .map_err(|err| StateCodecError::Signing(err.to_string()))
    }

    /// Verify a token's signature and decode its payload.
    ///
    /// Expiry is not validated here; `issued_at_ms` comes back as-is for the
    /// caller's freshness check.
    pub fn parse(&self, token: &str) -> Result<StatePayload, StateCodecError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<StatePayload>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => StateCodecError::SignatureMismatch,
                _ => StateCodecError::Malformed(err.to_string()),
            })
    }
}
