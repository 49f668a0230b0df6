//! Card number encryption and masking.
//!
//! A [`CardCodec`] is built once at startup from the configured passphrase and
//! salt. Argon2id stretches the passphrase into 64 bytes: the first half keys
//! AES-256-GCM, the second half keys the lookup digest. Neither the passphrase
//! nor the derived keys are ever written to the database.
//!
//! Stored ciphertext is `base64(nonce || ciphertext || tag)` with a fresh
//! random 96-bit nonce per encryption, so two encryptions of the same number
//! never produce the same text. Lookups and uniqueness checks therefore go
//! through [`CardCodec::digest`] instead of comparing ciphertexts.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use argon2::Argon2;
use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::{LedgerError, ResultLedger};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Number of digits in a card number.
pub const CARD_NUMBER_LEN: usize = 16;

/// Symmetric codec for card numbers.
#[derive(Clone)]
pub struct CardCodec {
    cipher: Aes256Gcm,
    digest_key: [u8; KEY_LEN],
}

impl fmt::Debug for CardCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardCodec").finish_non_exhaustive()
    }
}

impl CardCodec {
    /// Derives the codec keys from a passphrase.
    ///
    /// The salt must be at least 8 bytes long (Argon2 minimum).
    pub fn from_secret(secret: &str, salt: &str) -> ResultLedger<Self> {
        if secret.is_empty() {
            return Err(LedgerError::Encryption(
                "encryption secret must not be empty".to_string(),
            ));
        }

        let mut okm = [0u8; KEY_LEN * 2];
        Argon2::default()
            .hash_password_into(secret.as_bytes(), salt.as_bytes(), &mut okm)
            .map_err(|e| LedgerError::Encryption(format!("key derivation failed: {e}")))?;

        let cipher = Aes256Gcm::new_from_slice(&okm[..KEY_LEN])
            .map_err(|_| LedgerError::Encryption("invalid key length".to_string()))?;
        let mut digest_key = [0u8; KEY_LEN];
        digest_key.copy_from_slice(&okm[KEY_LEN..]);

        Ok(Self { cipher, digest_key })
    }

    /// Encrypts a plain card number into its stored text form.
    pub fn encrypt(&self, plain: &str) -> ResultLedger<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plain.as_bytes())
            .map_err(|_| LedgerError::Encryption("encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(sealed))
    }

    /// Decrypts a stored card number.
    ///
    /// Fails on malformed text, truncated data, a wrong key or any tampering;
    /// never returns partial plaintext.
    pub fn decrypt(&self, stored: &str) -> ResultLedger<String> {
        let sealed = base64::engine::general_purpose::STANDARD
            .decode(stored.as_bytes())
            .map_err(|_| LedgerError::Encryption("ciphertext is not valid base64".to_string()))?;
        if sealed.len() <= NONCE_LEN {
            return Err(LedgerError::Encryption("ciphertext too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| {
                LedgerError::Encryption("decryption failed: wrong key or corrupted data".to_string())
            })?;

        String::from_utf8(plain)
            .map_err(|_| LedgerError::Encryption("decrypted data is not text".to_string()))
    }

    /// Keyed fingerprint of a canonical card number.
    ///
    /// Deterministic for a given key, so it can back a unique index.
    pub fn digest(&self, canonical: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.digest_key);
        hasher.update(canonical.as_bytes());
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

/// Strips whitespace from a card number.
///
/// Returns `None` unless the result is exactly 16 ASCII digits.
pub fn canonical_number(number: &str) -> Option<String> {
    let digits: String = number.chars().filter(|c| !c.is_whitespace()).collect();
    (digits.len() == CARD_NUMBER_LEN && digits.chars().all(|c| c.is_ascii_digit()))
        .then_some(digits)
}

/// Renders a card number for display: `**** **** **** 1234`.
///
/// Whitespace in the input is ignored. Inputs shorter than four characters
/// are masked entirely.
pub fn mask(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(|c| !c.is_whitespace()).collect();
    let keep = digits.len().min(4);
    let last4: String = if keep == 4 {
        digits[digits.len() - 4..].iter().collect()
    } else {
        "****".to_string()
    };
    format!("**** **** **** {last4}")
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use proptest::prelude::*;

    use super::*;

    fn codec() -> &'static CardCodec {
        static CODEC: OnceLock<CardCodec> = OnceLock::new();
        CODEC.get_or_init(|| CardCodec::from_secret("test-secret", "test-salt-0001").unwrap())
    }

    #[test]
    fn encrypt_then_decrypt_returns_the_number() {
        let number = "4000123412341234";
        let stored = codec().encrypt(number).unwrap();

        assert!(!stored.contains(number));
        assert_eq!(codec().decrypt(&stored).unwrap(), number);
    }

    #[test]
    fn encryption_is_randomized() {
        let a = codec().encrypt("4000123412341234").unwrap();
        let b = codec().encrypt("4000123412341234").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let other = CardCodec::from_secret("another-secret", "test-salt-0001").unwrap();
        let stored = codec().encrypt("4000123412341234").unwrap();

        assert!(matches!(
            other.decrypt(&stored),
            Err(LedgerError::Encryption(_))
        ));
    }

    #[test]
    fn tampered_or_truncated_ciphertext_fails() {
        let stored = codec().encrypt("4000123412341234").unwrap();
        let mut bytes = base64::engine::general_purpose::STANDARD
            .decode(stored.as_bytes())
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = base64::engine::general_purpose::STANDARD.encode(&bytes);

        assert!(matches!(
            codec().decrypt(&tampered),
            Err(LedgerError::Encryption(_))
        ));
        assert!(matches!(
            codec().decrypt("AAAA"),
            Err(LedgerError::Encryption(_))
        ));
        assert!(matches!(
            codec().decrypt("%%% not base64"),
            Err(LedgerError::Encryption(_))
        ));
    }

    #[test]
    fn short_salt_is_rejected() {
        assert!(matches!(
            CardCodec::from_secret("secret", "salt"),
            Err(LedgerError::Encryption(_))
        ));
        assert!(matches!(
            CardCodec::from_secret("", "long-enough-salt"),
            Err(LedgerError::Encryption(_))
        ));
    }

    #[test]
    fn digest_is_deterministic_and_keyed() {
        let other = CardCodec::from_secret("another-secret", "test-salt-0001").unwrap();
        let number = "4000123412341234";

        assert_eq!(codec().digest(number), codec().digest(number));
        assert_ne!(codec().digest(number), codec().digest("4000123412341235"));
        assert_ne!(codec().digest(number), other.digest(number));
    }

    #[test]
    fn mask_keeps_last_four() {
        assert_eq!(mask("1111222233334444"), "**** **** **** 4444");
        assert_eq!(mask("1111 2222 3333 4444"), "**** **** **** 4444");
    }

    #[test]
    fn canonical_strips_whitespace() {
        assert_eq!(
            canonical_number(" 1111 2222\t3333 4444 ").as_deref(),
            Some("1111222233334444")
        );
        assert_eq!(canonical_number("1111 2222 3333 444"), None);
        assert_eq!(canonical_number("1111 2222 3333 444x"), None);
        assert_eq!(canonical_number("11112222333344445"), None);
    }

    proptest! {
        #[test]
        fn masking_survives_round_trip(n in 1_000_000_000_000_000u64..=9_999_999_999_999_999u64) {
            let number = n.to_string();
            let stored = codec().encrypt(&number).unwrap();
            let plain = codec().decrypt(&stored).unwrap();

            prop_assert_eq!(&plain, &number);
            prop_assert_eq!(mask(&plain), mask(&number));
            prop_assert!(mask(&plain).ends_with(&number[12..]));
        }
    }
}
