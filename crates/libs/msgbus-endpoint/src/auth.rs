//! The endpoint side of the shared-password admission challenge: answer
//! whatever nonce a router sends with `reqRutrPwd` by HMAC-SHA256-keying
//! it with the configured secret, matching the router's own verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn encrypt_nonce(nonce: &[u8], secret: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(nonce);
    mac.finalize().into_bytes().to_vec()
}
