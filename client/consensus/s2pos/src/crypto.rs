//! Commit-reveal crypto - AES-CFB sealing of per-epoch randomize secrets
//!
//! Secrets are encrypted under the node's opening key and published to the
//! randomize registry; the key itself is published later as the opening.
//! Failures here are soft: callers get an empty string and must treat any
//! non-numeric plaintext as "no secret".

use aes::{Aes128, Aes192, Aes256};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use cfb_mode::cipher::{AsyncStreamCipher, InvalidLength, KeyIvInit};
use rand::{rngs::OsRng, CryptoRng, Rng, RngCore};

/// AES block size, prepended to every ciphertext as the IV
pub const IV_SIZE: usize = 16;

/// Length of a generated opening key (AES-256)
pub const RANDOMIZE_KEY_LENGTH: usize = 32;

const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ123456789";

#[derive(Clone, Copy)]
enum Mode {
    Encrypt,
    Decrypt,
}

/// Run AES-CFB over `buf` in place; key length picks AES-128/192/256
fn apply_cfb(key: &[u8], iv: &[u8], buf: &mut [u8], mode: Mode) -> Result<(), InvalidLength> {
    macro_rules! run {
        ($cipher:ty) => {
            match mode {
                Mode::Encrypt => cfb_mode::Encryptor::<$cipher>::new_from_slices(key, iv).map(|c| c.encrypt(buf)),
                Mode::Decrypt => cfb_mode::Decryptor::<$cipher>::new_from_slices(key, iv).map(|c| c.decrypt(buf)),
            }
        };
    }

    match key.len() {
        16 => run!(Aes128),
        24 => run!(Aes192),
        32 => run!(Aes256),
        _ => Err(InvalidLength),
    }
}

/// Encrypt `text` under `key` with a fresh IV from the OS RNG.
///
/// Output is URL-safe base64 of `IV || ciphertext`. Returns an empty string
/// on failure.
pub fn encrypt(key: &[u8], text: &str) -> String {
    encrypt_with_rng(&mut OsRng, key, text)
}

/// [`encrypt`] with an injected IV source
pub fn encrypt_with_rng<R: RngCore + CryptoRng>(rng: &mut R, key: &[u8], text: &str) -> String {
    let mut sealed = vec![0u8; IV_SIZE + text.len()];
    let (iv, body) = sealed.split_at_mut(IV_SIZE);

    if let Err(e) = rng.try_fill_bytes(iv) {
        log::error!("Fail to encrypt iv: {}", e);
        return String::new();
    }
    body.copy_from_slice(text.as_bytes());

    if let Err(e) = apply_cfb(key, iv, body, Mode::Encrypt) {
        log::error!("Fail to encrypt: {}", e);
        return String::new();
    }

    URL_SAFE.encode(&sealed)
}

/// Decrypt the output of [`encrypt`]. Returns an empty string on failure.
pub fn decrypt(key: &[u8], crypto_text: &str) -> String {
    let mut sealed = match URL_SAFE.decode(crypto_text) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("Fail to decode ciphertext: {}", e);
            return String::new();
        }
    };

    if sealed.len() < IV_SIZE {
        log::error!("ciphertext too short");
        return String::new();
    }
    let (iv, body) = sealed.split_at_mut(IV_SIZE);

    if let Err(e) = apply_cfb(key, iv, body, Mode::Decrypt) {
        log::error!("Fail to decrypt: {}", e);
        return String::new();
    }

    match String::from_utf8(body.to_vec()) {
        Ok(text) => text,
        Err(_) => {
            log::debug!("Decrypted secret is not utf-8");
            String::new()
        }
    }
}

/// Generate an `n`-byte alphanumeric opening key
pub fn random_key<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<u8> {
    (0..n)
        .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())])
        .collect()
}

/// Recover a masternode's randomize value from its published secrets and opening.
///
/// Each secret is a zero-left-padded ciphertext. Secrets that do not decrypt to
/// an integer are skipped; the last one that does wins. No secrets yields 0.
pub fn decrypt_randomize(secrets: &[[u8; 32]], opening: &[u8; 32]) -> i64 {
    let mut random = 0;
    for secret in secrets {
        let start = secret.iter().position(|b| *b != 0).unwrap_or(secret.len());
        let Ok(trimmed) = std::str::from_utf8(&secret[start..]) else {
            continue;
        };
        if let Ok(number) = decrypt(opening, trimmed).parse::<i64>() {
            random = number;
        }
    }
    random
}
