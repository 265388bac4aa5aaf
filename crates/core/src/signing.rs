//! HMAC signing for outbound webhook deliveries.
//!
//! Receivers verify that an alert genuinely came from us by recomputing the
//! signature over `"{timestamp}.{body}"` with their configured secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Sign a delivery body with HMAC-SHA256, binding it to its timestamp.
pub fn sign_payload(secret: &str, timestamp: i64, body: &str) -> String {
    let data = format!("{}.{}", timestamp, body);
    // new_from_slice only fails for algorithms with key length constraints;
    // HMAC-SHA256 takes any key length.
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts any key length");
    mac.update(data.as_bytes());
    format!("sha256={:x}", mac.finalize().into_bytes())
}

pub fn verify_signature(secret: &str, timestamp: i64, body: &str, signature: &str) -> bool {
    let expected = sign_payload(secret, timestamp, body);
    subtle::ConstantTimeEq::ct_eq(expected.as_bytes(), signature.as_bytes()).into()
}
