//! Webhook signature verification
//!
//! The provider signs the exact raw request body with HMAC-SHA256 and sends
//! `sha256=<hex digest>` in a header. Verification must run over the raw
//! bytes as received; re-serializing the payload can change them and break
//! the signature.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the expected signature header value for a payload.
pub fn sign(payload: &[u8], secret: &str) -> Option<String> {
    if secret.is_empty() {
        return None;
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Verify a provided signature against the raw payload bytes.
///
/// Fails closed: an empty secret never verifies. Comparison is constant-time
/// to avoid leaking how much of a forged signature matched.
pub fn verify(payload: &[u8], provided_signature: &str, secret: &str) -> bool {
    let Some(expected) = sign(payload, secret) else {
        return false;
    };

    expected
        .as_bytes()
        .ct_eq(provided_signature.as_bytes())
        .into()
}
