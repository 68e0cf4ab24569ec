//! Simulated encryption workload run on worker threads.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm,
};

/// Encrypt `payload` with AES-256-GCM `rounds` times under a fresh key,
/// then decrypt the final ciphertext and check it round-trips.
///
/// Every round uses a new random nonce. Returns the last ciphertext.
pub fn simulate_encryption(payload: &[u8], rounds: u32) -> Result<Vec<u8>, String> {
    let key = Aes256Gcm::generate_key(OsRng);
    let cipher = Aes256Gcm::new(&key);

    let mut last = None;
    for _ in 0..rounds.max(1) {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, payload)
            .map_err(|e| format!("encryption failed: {}", e))?;
        last = Some((nonce, ciphertext));
    }

    let (nonce, ciphertext) = last.ok_or_else(|| "no rounds executed".to_string())?;
    let plaintext = cipher
        .decrypt(&nonce, ciphertext.as_ref())
        .map_err(|e| format!("decryption failed: {}", e))?;

    if plaintext != payload {
        return Err("round-trip mismatch".to_string());
    }

    Ok(ciphertext)
}
