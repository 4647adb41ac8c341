// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook signature verification.
//!
//! LINE signs each webhook delivery with base64(HMAC-SHA256(channel secret,
//! raw request body)) in the `x-line-signature` header. Verification runs
//! over the exact raw bytes, before any JSON parsing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use nagare_core::NagareError;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a webhook signature against the raw request body.
///
/// The decoded signature is compared in constant time. Undecodable base64
/// counts as an invalid signature, not a malformed payload.
pub fn verify_signature(
    channel_secret: &str,
    body: &[u8],
    signature: &str,
) -> Result<(), NagareError> {
    let expected = BASE64
        .decode(signature)
        .map_err(|_| NagareError::SignatureInvalid)?;

    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .map_err(|e| NagareError::Internal(format!("hmac key setup: {e}")))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| NagareError::SignatureInvalid)
}

/// Computes the signature LINE would send for `body`.
pub fn sign(channel_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}
