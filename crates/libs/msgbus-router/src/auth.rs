//! Shared-password authentication for the admission handshake. We
//! pin a concrete, reasonable choice — HMAC-SHA256 — rather than leave it
//! abstract, since a router and its peers must agree on one.

use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of the nonce a router challenges a pending connection with.
pub const NONCE_LEN: usize = 128;

pub fn random_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Computes the ciphertext a peer must answer a password challenge with:
/// an HMAC-SHA256 of `nonce` keyed by the shared secret.
pub fn encrypt_nonce(nonce: &[u8], secret: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(nonce);
    mac.finalize().into_bytes().to_vec()
}

/// The router's side of the check: does `ciphertext` match what the
/// configured shared secret would have produced for `nonce`?
pub fn matches_encrypted_shared_password(nonce: &[u8], secret: &str, ciphertext: &[u8]) -> bool {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(nonce);
    mac.verify_slice(ciphertext).is_ok()
}
