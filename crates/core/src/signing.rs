//! Request signing for the telephony provider.
//!
//! Every request carries `sign = sha256_hex(api_key + json + api_salt)`. The
//! `json` string that is signed must be the exact string that is sent, so
//! [`SignedForm::new`] takes the serialized body and keeps it verbatim.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Signature over a JSON body: `sha256_hex(api_key + json + api_salt)`.
pub fn sign_payload(api_key: &str, json: &str, api_salt: &str) -> String {
    let mut input = String::with_capacity(api_key.len() + json.len() + api_salt.len());
    input.push_str(api_key);
    input.push_str(json);
    input.push_str(api_salt);
    sha256_hex(input.as_bytes())
}

/// Whether `sign` matches the body under the given credentials.
///
/// Comparison is case-insensitive on the hex digest.
pub fn verify_signature(api_key: &str, json: &str, api_salt: &str, sign: &str) -> bool {
    sign_payload(api_key, json, api_salt).eq_ignore_ascii_case(sign.trim())
}

/// Form-encoded body of a signed request. Field order is
/// `vpbx_api_key`, `sign`, `json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedForm {
    pub vpbx_api_key: String,
    pub sign: String,
    pub json: String,
}

impl SignedForm {
    /// Sign an already-serialized JSON body.
    pub fn new(api_key: &str, api_salt: &str, json: String) -> Self {
        Self {
            vpbx_api_key: api_key.to_string(),
            sign: sign_payload(api_key, &json, api_salt),
            json,
        }
    }

    /// Serialize `body` with `serde_json` and sign the result.
    pub fn from_body<T: Serialize>(
        api_key: &str,
        api_salt: &str,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(body)?;
        Ok(Self::new(api_key, api_salt, json))
    }
}
