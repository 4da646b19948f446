use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn sign_hex(secret: &[u8], payload: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex signature header (optionally `sha256=`-prefixed) against the
/// payload. Malformed headers and empty secrets verify as `false`.
pub fn verify_hex(secret: &[u8], signature: &str, payload: &[u8]) -> bool {
    if secret.is_empty() {
        return false;
    }

    let trimmed = signature.trim();
    let trimmed = trimmed.strip_prefix("sha256=").unwrap_or(trimmed);
    let Ok(provided) = hex::decode(trimmed) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}
