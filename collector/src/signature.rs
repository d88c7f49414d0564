//! Request signature verification
//!
//! Clients sign the raw request body with HMAC-SHA256 over the shared
//! secret and send the hex digest alongside the payload. Verification is
//! constant-time over the decoded MAC bytes so the comparison leaks
//! nothing about the expected digest.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex HMAC-SHA256 signature of a payload
pub fn sign(payload: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length, so new_from_slice cannot fail.
    #[allow(clippy::expect_used)]
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a client-provided hex signature against a payload
///
/// Returns `false` for malformed hex, wrong-length digests, or a MAC
/// mismatch; no distinction is surfaced to the caller.
pub fn verify(payload: &[u8], provided: &str, secret: &str) -> bool {
    let Ok(provided_mac) = hex::decode(provided) else {
        return false;
    };

    #[allow(clippy::expect_used)]
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    if provided_mac.len() != expected.len() {
        return false;
    }
    provided_mac.ct_eq(expected.as_slice()).into()
}
