//! AES counter-mode transport codec.
//!
//! Payloads are run through AES-CTR (big-endian 128-bit counter) and
//! carried as standard padded base64. The configured secret is both the
//! AES key and the initial counter block: the first 16 bytes of the key
//! seed the counter. With a 16-byte key this matches the wire format of
//! existing clients. 24- and 32-byte keys are an extension those clients
//! cannot produce; they keep the `key[..16]` counter seed. The keystream is
//! reused for every message, so it only hides payloads from casual
//! inspection.

use aes::{Aes128, Aes192, Aes256};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ctr::cipher::{KeyIvInit, StreamCipher};
use thiserror::Error;

use crate::config::CipherConfig;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes192Ctr = ctr::Ctr128BE<Aes192>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

const BLOCK_SIZE: usize = 16;

/// Errors raised by [`CipherCodec`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// The configured key is not 16, 24 or 32 bytes.
    #[error("invalid cipher key length {0}, expected 16, 24 or 32 bytes")]
    InvalidKeyLength(usize),

    /// The ciphertext is not valid base64.
    #[error("malformed ciphertext: {0}")]
    Decode(String),
}

/// Symmetric codec shared by the negotiation layer, the envelope writer
/// and the outbound client.
#[derive(Clone)]
pub struct CipherCodec {
    enabled: bool,
    key: Vec<u8>,
}

impl std::fmt::Debug for CipherCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherCodec")
            .field("enabled", &self.enabled)
            .field("key_len", &self.key.len())
            .finish()
    }
}

impl CipherCodec {
    pub fn new(config: &CipherConfig) -> Self {
        Self {
            enabled: config.enabled,
            key: config.key.as_bytes().to_vec(),
        }
    }

    /// A codec that passes every payload through untouched.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            key: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the key is usable. Always fine when disabled.
    pub fn verify_key(&self) -> Result<(), CipherError> {
        if self.enabled {
            check_key(&self.key)
        } else {
            Ok(())
        }
    }

    /// Encrypt `plaintext` into base64 text.
    ///
    /// When disabled, the plaintext is returned as text (lossily, if it is
    /// not UTF-8).
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, CipherError> {
        if !self.enabled {
            return Ok(String::from_utf8_lossy(plaintext).into_owned());
        }
        let mut buf = plaintext.to_vec();
        self.apply_keystream(&mut buf)?;
        Ok(STANDARD.encode(buf))
    }

    /// Decrypt base64 `ciphertext` back into bytes.
    ///
    /// When disabled, the input is returned unchanged.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if !self.enabled {
            return Ok(ciphertext.to_vec());
        }
        // Key errors take precedence over decode errors.
        check_key(&self.key)?;
        let mut buf = STANDARD
            .decode(trim_ascii(ciphertext))
            .map_err(|e| CipherError::Decode(e.to_string()))?;
        self.apply_keystream(&mut buf)?;
        Ok(buf)
    }

    fn apply_keystream(&self, buf: &mut [u8]) -> Result<(), CipherError> {
        check_key(&self.key)?;
        let iv = &self.key[..BLOCK_SIZE];
        let invalid = |_| CipherError::InvalidKeyLength(self.key.len());
        match self.key.len() {
            16 => Aes128Ctr::new_from_slices(&self.key, iv)
                .map_err(invalid)?
                .apply_keystream(buf),
            24 => Aes192Ctr::new_from_slices(&self.key, iv)
                .map_err(invalid)?
                .apply_keystream(buf),
            _ => Aes256Ctr::new_from_slices(&self.key, iv)
                .map_err(invalid)?
                .apply_keystream(buf),
        }
        Ok(())
    }
}

fn check_key(key: &[u8]) -> Result<(), CipherError> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        n => Err(CipherError::InvalidKeyLength(n)),
    }
}

fn trim_ascii(input: &[u8]) -> &[u8] {
    let start = input
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(input.len());
    let end = input
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &input[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(key: &str) -> CipherCodec {
        CipherCodec::new(&CipherConfig {
            enabled: true,
            key: key.to_string(),
        })
    }

    #[test]
    fn test_round_trip_all_key_sizes() {
        let keys = [
            "0123456789abcdef",
            "0123456789abcdef01234567",
            "0123456789abcdef0123456789abcdef",
        ];
        let binary = [0u8, 255, 7, 128, 64, 3, 9, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let payloads: [&[u8]; 4] = [b"", b"x", b"{\"a\":1}", &binary];
        for key in keys {
            let codec = codec(key);
            for p in payloads {
                let encrypted = codec.encrypt(p).unwrap();
                assert_eq!(codec.decrypt(encrypted.as_bytes()).unwrap(), p);
            }
        }
    }

    #[test]
    fn test_known_ciphertext() {
        // 16-byte key: ciphertexts produced by the deployed clients.
        let plain = b"the quick brown fox jumps over the lazy dog";

        let c128 = codec("0123456789abcdef");
        assert_eq!(
            c128.encrypt(plain).unwrap(),
            "BhobqG+plGJrh3oaFn7bRZeiszAXP/PhRYUhIHl8Y5oDUMRA1MX8EhJtYw=="
        );
        assert_eq!(c128.encrypt(b"{\"a\":1}").unwrap(), "CVAfqiTtgA==");

        // 32-byte key: AES-256 with the first 16 key bytes as counter seed.
        let c256 = codec("0123456789abcdef0123456789abcdef");
        assert_eq!(
            c256.encrypt(plain).unwrap(),
            "jFT/QK15svtKvxukuqx4FdPwEF0lF08XDwhjPKBubumMxaKTDpKtlzenTA=="
        );
    }

    #[test]
    fn test_disabled_is_identity() {
        let codec = CipherCodec::disabled();
        assert!(!codec.is_enabled());
        assert_eq!(codec.encrypt(b"hello").unwrap(), "hello");
        assert_eq!(codec.decrypt(b"not base64 !!").unwrap(), b"not base64 !!");
    }

    #[test]
    fn test_disabled_ignores_bad_key() {
        let codec = CipherCodec::new(&CipherConfig {
            enabled: false,
            key: "short".into(),
        });
        assert_eq!(codec.encrypt(b"abc").unwrap(), "abc");
        assert!(codec.verify_key().is_ok());
    }

    #[test]
    fn test_invalid_key_length() {
        let codec = codec("too-short");
        assert_eq!(codec.verify_key(), Err(CipherError::InvalidKeyLength(9)));
        assert_eq!(
            codec.encrypt(b"abc").unwrap_err(),
            CipherError::InvalidKeyLength(9)
        );
        assert_eq!(
            codec.decrypt(b"YWJj").unwrap_err(),
            CipherError::InvalidKeyLength(9)
        );
    }

    #[test]
    fn test_malformed_base64() {
        let codec = codec("0123456789abcdef");
        assert!(matches!(
            codec.decrypt(b"%%%not-base64%%%"),
            Err(CipherError::Decode(_))
        ));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let codec = codec("0123456789abcdef");
        assert_eq!(codec.decrypt(b"  CVAfqiTtgA==\n").unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", codec("0123456789abcdef"));
        assert!(!rendered.contains("0123456789abcdef"));
    }
}
