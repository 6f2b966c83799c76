use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{ChannelError, Result};

/// Header carrying `sha256=<hex>` of the raw request body
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ChannelError::Config(format!("invalid app secret: {}", e)))
}

/// Check the provider signature of a webhook body against the app secret.
///
/// Comparison is constant-time.
pub fn verify_signature(body: &[u8], header: Option<&str>, secret: &str) -> Result<()> {
    let header = header.ok_or_else(|| ChannelError::Signature("missing signature header".into()))?;
    let digest_hex = header
        .trim()
        .strip_prefix("sha256=")
        .ok_or_else(|| ChannelError::Signature("signature must use sha256=<hex> format".into()))?;
    let expected = hex::decode(digest_hex)
        .map_err(|e| ChannelError::Signature(format!("invalid hex digest: {}", e)))?;

    let mut mac = mac(secret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| ChannelError::Signature("signature mismatch".into()))
}

/// `sha256=<hex>` header value for a body
pub fn sign_payload(body: &[u8], secret: &str) -> Result<String> {
    let mut mac = mac(secret)?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}
