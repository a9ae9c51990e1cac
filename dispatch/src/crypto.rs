//! Symmetric encryption of push payloads.
//!
//! Bark-compatible servers expect AES-CBC with PKCS#7 padding where the key
//! and IV are the literal UTF-8 bytes of short ASCII strings the user copies
//! between clients. No key derivation is applied.

use crate::errors::{PushError, Result};
use aes::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// CBC block size, and therefore the IV length.
pub const IV_LEN: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// AES key size selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "AES128")]
    Aes128,
    #[serde(rename = "AES192")]
    Aes192,
    #[default]
    #[serde(rename = "AES256")]
    Aes256,
}

impl Algorithm {
    pub const fn key_len(&self) -> usize {
        match self {
            Algorithm::Aes128 => 16,
            Algorithm::Aes192 => 24,
            Algorithm::Aes256 => 32,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Aes128 => "AES128",
            Algorithm::Aes192 => "AES192",
            Algorithm::Aes256 => "AES256",
        };
        f.write_str(name)
    }
}

/// Block mode label carried in settings.
///
/// Settings written by other clients may say `GCM`; transports encrypt with
/// CBC regardless, since that is what the servers decrypt.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    #[default]
    Cbc,
    Gcm,
}

/// Encryption settings supplied with a dispatch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EncryptionConfig {
    #[serde(default)]
    pub algorithm: Algorithm,
    #[serde(default)]
    pub mode: Mode,
    /// Literal key material. Encryption is skipped by v1 routing when absent.
    pub key: Option<String>,
}

impl EncryptionConfig {
    pub fn new(algorithm: Algorithm, key: impl Into<String>) -> Self {
        Self {
            algorithm,
            mode: Mode::Cbc,
            key: Some(key.into()),
        }
    }

    /// The configured key, if it is present and non-empty.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }
}

/// Generate a random alphanumeric key sized for `algorithm`.
pub fn generate_key(algorithm: Algorithm) -> String {
    random_ascii(algorithm.key_len())
}

/// Generate a random alphanumeric 16 character IV.
pub fn generate_iv() -> String {
    random_ascii(IV_LEN)
}

fn random_ascii(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Encrypt `plaintext` with AES-CBC/PKCS#7 and return base64 ciphertext.
///
/// The AES variant follows the byte length of `key`.
pub fn encrypt(plaintext: &str, key: &str, iv: &str) -> Result<String> {
    let key = key.as_bytes();
    let iv = iv.as_bytes();
    if iv.len() != IV_LEN {
        return Err(PushError::InvalidIvLength(iv.len()));
    }

    let plaintext = plaintext.as_bytes();
    let ciphertext = match key.len() {
        16 => Aes128CbcEnc::new_from_slices(key, iv)
            .map(|enc| enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        24 => Aes192CbcEnc::new_from_slices(key, iv)
            .map(|enc| enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        32 => Aes256CbcEnc::new_from_slices(key, iv)
            .map(|enc| enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        other => return Err(PushError::InvalidKeyLength(other)),
    }
    .map_err(|_| PushError::InvalidKeyLength(key.len()))?;

    Ok(BASE64_STANDARD.encode(ciphertext))
}

#[cfg(test)]
pub(crate) fn decrypt(ciphertext: &str, key: &str, iv: &str) -> String {
    use aes::cipher::BlockDecryptMut;

    let bytes = BASE64_STANDARD.decode(ciphertext).unwrap();
    let plain = match key.len() {
        16 => cbc::Decryptor::<aes::Aes128>::new_from_slices(key.as_bytes(), iv.as_bytes())
            .unwrap()
            .decrypt_padded_vec_mut::<Pkcs7>(&bytes)
            .unwrap(),
        24 => cbc::Decryptor::<aes::Aes192>::new_from_slices(key.as_bytes(), iv.as_bytes())
            .unwrap()
            .decrypt_padded_vec_mut::<Pkcs7>(&bytes)
            .unwrap(),
        _ => cbc::Decryptor::<aes::Aes256>::new_from_slices(key.as_bytes(), iv.as_bytes())
            .unwrap()
            .decrypt_padded_vec_mut::<Pkcs7>(&bytes)
            .unwrap(),
    };
    String::from_utf8(plain).unwrap()
}
