//! AES-128-CBC wrapper the web backend puts around string `data` fields.

use aes::Aes128;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use serde_json::{Map, Value};
use tracing::debug;

const BLOCK: usize = 16;
const DEFAULT_KEY: &str = "smartgencloudplus";
const IV_SOURCE: &str = "smartgencloudplus";

type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// UTF-8 bytes cut or right-padded with ASCII `0` to one block.
fn block_bytes(text: &str) -> [u8; BLOCK] {
    let mut out = [b'0'; BLOCK];
    let raw = text.as_bytes();
    let len = raw.len().min(BLOCK);
    out[..len].copy_from_slice(&raw[..len]);
    out
}

/// Strips PKCS#7 padding; a trailing byte outside `1..=16` leaves the data as is.
fn unpad(data: &[u8]) -> &[u8] {
    match data.last() {
        Some(&pad) if (1..=BLOCK as u8).contains(&pad) && pad as usize <= data.len() => {
            &data[..data.len() - pad as usize]
        }
        _ => data,
    }
}

#[derive(Clone)]
pub struct PayloadCipher {
    key: [u8; BLOCK],
    iv: [u8; BLOCK],
}

impl std::fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadCipher { .. }")
    }
}

impl PayloadCipher {
    /// The key comes from the configured signing secret, falling back to the
    /// vendor default when none is set.
    pub fn new(sign_secret: Option<&str>) -> Self {
        Self {
            key: block_bytes(sign_secret.filter(|s| !s.is_empty()).unwrap_or(DEFAULT_KEY)),
            iv: block_bytes(IV_SOURCE),
        }
    }

    /// Decodes base64, decrypts and parses the JSON object inside.
    pub fn decrypt_json(&self, encoded: &str) -> Option<Map<String, Value>> {
        let mut buf = match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Encrypted payload is not base64: {}", e);
                return None;
            }
        };
        let len = buf.len();
        let decryptor = Aes128CbcDec::new_from_slices(&self.key, &self.iv).ok()?;
        let plain = match decryptor.decrypt_padded_mut::<NoPadding>(&mut buf) {
            Ok(plain) => plain,
            Err(_) => {
                debug!("Encrypted payload length {} is not a whole number of blocks", len);
                return None;
            }
        };
        let text = String::from_utf8_lossy(unpad(plain));
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Some(map),
            _ => {
                debug!("Decrypted payload is not a JSON object");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Produced with `openssl enc -aes-128-cbc` using the key and IV below.
    const DEFAULT_KEY_CIPHERTEXT: &str = "npTK4X6RHKbcL7I6v8N8d5W88m5v1fH4yOjazv1lRkQ=";
    const SHORT_SECRET_CIPHERTEXT: &str = "crwvfbka0QZ6JsocvxGb6Q==";

    #[test]
    fn key_material_is_cut_or_zero_padded() {
        assert_eq!(&block_bytes("smartgencloudplus"), b"smartgencloudplu");
        assert_eq!(&block_bytes("abc"), b"abc0000000000000");
    }

    #[test]
    fn decrypts_with_default_key() {
        let payload = PayloadCipher::new(None).decrypt_json(DEFAULT_KEY_CIPHERTEXT).unwrap();
        assert_eq!(payload.get("rpm"), Some(&json!(1500)));
        assert_eq!(payload.get("kw"), Some(&json!(12.5)));
    }

    #[test]
    fn decrypts_with_configured_secret() {
        let payload = PayloadCipher::new(Some("abc")).decrypt_json(SHORT_SECRET_CIPHERTEXT).unwrap();
        assert_eq!(payload.get("hz"), Some(&json!(50)));
    }

    #[test]
    fn wrong_key_or_garbage_yields_nothing() {
        assert!(PayloadCipher::new(Some("abc")).decrypt_json(DEFAULT_KEY_CIPHERTEXT).is_none());
        assert!(PayloadCipher::new(None).decrypt_json("not base64!").is_none());
        assert!(PayloadCipher::new(None).decrypt_json("q83vAA==").is_none());
    }

    #[test]
    fn out_of_range_padding_is_kept() {
        assert_eq!(unpad(&[1, 2, 3, 0]), &[1, 2, 3, 0]);
        assert_eq!(unpad(&[1, 2, 3, 2, 2]), &[1, 2, 3]);
        assert_eq!(unpad(&[]), &[] as &[u8]);
    }
}
