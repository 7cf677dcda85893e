use crate::common::{FaceLockError, Result};
use crate::vault::KeyHandle;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;

/// Envelope header; also bound as associated data.
pub const MAGIC: &[u8; 4] = b"FLK1";
pub const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// Authenticated symmetric cipher.
///
/// `decrypt` must fail with `FaceLockError::Authenticity` for input that was
/// not produced by `encrypt` under the same key: wrong key, tampering, or
/// plain bytes.
pub trait Cipher {
    fn encrypt(&self, key: &KeyHandle, plaintext: &[u8]) -> Result<Vec<u8>>;
    fn decrypt(&self, key: &KeyHandle, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// XChaCha20-Poly1305 with a random nonce per message.
///
/// Layout: `magic (4) || nonce (24) || ciphertext || tag (16)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XChaChaCipher;

impl Cipher for XChaChaCipher {
    fn encrypt(&self, key: &KeyHandle, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = XChaCha20Poly1305::new_from_slice(key.expose())
            .map_err(|e| FaceLockError::Cipher(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad: MAGIC })
            .map_err(|e| FaceLockError::Cipher(e.to_string()))?;

        let mut out = Vec::with_capacity(MAGIC.len() + NONCE_LEN + sealed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, key: &KeyHandle, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < MAGIC.len() + NONCE_LEN + TAG_LEN || !ciphertext.starts_with(MAGIC) {
            return Err(FaceLockError::Authenticity);
        }

        let cipher = XChaCha20Poly1305::new_from_slice(key.expose())
            .map_err(|e| FaceLockError::Cipher(e.to_string()))?;

        let (nonce, sealed) = ciphertext[MAGIC.len()..].split_at(NONCE_LEN);
        cipher
            .decrypt(XNonce::from_slice(nonce), Payload { msg: sealed, aad: MAGIC })
            .map_err(|_| FaceLockError::Authenticity)
    }
}
