//! BIP39 mnemonic encoding and seed derivation.
//!
//! Entropy drawn from the secure random source is encoded as a mnemonic
//! sentence with an appended checksum, then stretched together with an
//! optional passphrase into a 64-byte seed (PBKDF2-HMAC-SHA512, per the
//! standard). The mnemonic is the only part of the pair that leaves the
//! vault; the seed is written to a record.

use ::bip39::{Language, Mnemonic};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::rng::SecureRng;
use boltvault_common::{Error, Result};

/// Length of a BIP39 seed in bytes.
pub const SEED_LENGTH: usize = 64;

/// Wordlist languages supported for mnemonic encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MnemonicLanguage {
    English,
    Japanese,
}

impl MnemonicLanguage {
    /// Parse a language name as it appears in requests.
    ///
    /// # Errors
    /// - Returns `InvalidParameters` for an unsupported language
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "english" => Ok(Self::English),
            "japanese" => Ok(Self::Japanese),
            other => Err(Error::InvalidParameters(format!(
                "unsupported mnemonic language: {}",
                other
            ))),
        }
    }

    fn wordlist(self) -> Language {
        match self {
            Self::English => Language::English,
            Self::Japanese => Language::Japanese,
        }
    }
}

fn validate_entropy_bits(entropy_bits: u32) -> Result<usize> {
    match entropy_bits {
        128 | 160 | 192 | 224 | 256 => Ok(entropy_bits as usize / 8),
        other => Err(Error::InvalidParameters(format!(
            "entropy size must be a multiple of 32 between 128 and 256 bits, got {}",
            other
        ))),
    }
}

fn seed_from(mnemonic: &Mnemonic, passphrase: Option<&str>) -> Zeroizing<[u8; SEED_LENGTH]> {
    Zeroizing::new(mnemonic.to_seed(passphrase.unwrap_or("")))
}

/// Generate a mnemonic sentence and its seed.
///
/// # Preconditions
/// - `entropy_bits` must be one of 128, 160, 192, 224, 256
///
/// # Postconditions
/// - The sentence encodes exactly the drawn entropy plus its checksum
/// - The seed is the standard stretch of sentence + passphrase
///
/// # Errors
/// - Returns `InvalidParameters` for an invalid entropy size
/// - Returns `RngFailure` if the random source fails
pub fn generate(
    rng: &dyn SecureRng,
    entropy_bits: u32,
    language: MnemonicLanguage,
    passphrase: Option<&str>,
) -> Result<(String, Zeroizing<[u8; SEED_LENGTH]>)> {
    let entropy_len = validate_entropy_bits(entropy_bits)?;
    let mut entropy = Zeroizing::new(vec![0u8; entropy_len]);
    rng.fill(&mut entropy)?;

    let mnemonic = Mnemonic::from_entropy_in(language.wordlist(), &entropy)
        .map_err(|_| Error::Crypto("mnemonic encoding failed".to_string()))?;

    let seed = seed_from(&mnemonic, passphrase);
    Ok((mnemonic.to_string(), seed))
}

/// Recover the seed for an existing mnemonic sentence.
///
/// # Errors
/// - Returns `InvalidParameters` if the sentence is not a valid mnemonic
///   in `language` (unknown word, bad length or checksum mismatch)
pub fn recover(
    sentence: &str,
    language: MnemonicLanguage,
    passphrase: Option<&str>,
) -> Result<Zeroizing<[u8; SEED_LENGTH]>> {
    let mnemonic = parse(sentence, language)?;
    Ok(seed_from(&mnemonic, passphrase))
}

/// Decode a mnemonic sentence back to its entropy.
///
/// # Errors
/// - Returns `InvalidParameters` if the sentence fails validation
pub fn decode(sentence: &str, language: MnemonicLanguage) -> Result<Zeroizing<Vec<u8>>> {
    let mnemonic = parse(sentence, language)?;
    Ok(Zeroizing::new(mnemonic.to_entropy()))
}

/// Encode entropy as a mnemonic sentence.
///
/// # Errors
/// - Returns `InvalidParameters` for an invalid entropy length
pub fn encode(entropy: &[u8], language: MnemonicLanguage) -> Result<String> {
    let mnemonic = Mnemonic::from_entropy_in(language.wordlist(), entropy)
        .map_err(|_| Error::InvalidParameters("invalid entropy length".to_string()))?;
    Ok(mnemonic.to_string())
}

fn parse(sentence: &str, language: MnemonicLanguage) -> Result<Mnemonic> {
    // The library error names the offending word index; keep it out of our
    // message so nothing about the sentence leaks into diagnostics.
    Mnemonic::parse_in(language.wordlist(), sentence)
        .map_err(|_| Error::InvalidParameters("invalid mnemonic sentence".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{FixedRng, OsSecureRng};
    use proptest::prelude::*;

    #[test]
    fn test_generate_word_counts() {
        let rng = OsSecureRng;
        for (bits, words) in [(128u32, 12usize), (160, 15), (192, 18), (224, 21), (256, 24)] {
            let (sentence, seed) = generate(&rng, bits, MnemonicLanguage::English, None).unwrap();
            assert_eq!(sentence.split_whitespace().count(), words);
            assert_eq!(seed.len(), SEED_LENGTH);
        }
    }

    #[test]
    fn test_invalid_entropy_bits_rejected() {
        let rng = OsSecureRng;
        for bits in [0u32, 100, 129, 252, 288] {
            let err = generate(&rng, bits, MnemonicLanguage::English, None).unwrap_err();
            assert!(matches!(err, Error::InvalidParameters(_)));
        }
    }

    #[test]
    fn test_language_parse() {
        assert_eq!(
            MnemonicLanguage::parse("english").unwrap(),
            MnemonicLanguage::English
        );
        assert!(MnemonicLanguage::parse("klingon").is_err());
    }

    #[test]
    fn test_passphrase_changes_seed_not_sentence() {
        let entropy = vec![0xAB; 32];
        let rng1 = FixedRng::new(entropy.clone());
        let rng2 = FixedRng::new(entropy);

        let (s1, seed1) = generate(&rng1, 256, MnemonicLanguage::English, None).unwrap();
        let (s2, seed2) =
            generate(&rng2, 256, MnemonicLanguage::English, Some("passphrase")).unwrap();

        assert_eq!(s1, s2);
        assert_ne!(&seed1[..], &seed2[..]);
    }

    #[test]
    fn test_recover_matches_generate() {
        let rng = OsSecureRng;
        let (sentence, seed) =
            generate(&rng, 192, MnemonicLanguage::English, Some("pw")).unwrap();
        let recovered = recover(&sentence, MnemonicLanguage::English, Some("pw")).unwrap();
        assert_eq!(&seed[..], &recovered[..]);
    }

    #[test]
    fn test_flipped_word_fails_checksum() {
        let entropy = vec![0xAB; 32];
        let rng = FixedRng::new(entropy);
        let (sentence, _) = generate(&rng, 256, MnemonicLanguage::English, None).unwrap();

        let mut words: Vec<&str> = sentence.split_whitespace().collect();
        assert_ne!(words[0], "abandon");
        words[0] = "abandon";
        let flipped = words.join(" ");

        assert!(decode(&flipped, MnemonicLanguage::English).is_err());
    }

    #[test]
    fn test_japanese_wordlist() {
        let rng = OsSecureRng;
        let (sentence, _) = generate(&rng, 128, MnemonicLanguage::Japanese, None).unwrap();
        let entropy = decode(&sentence, MnemonicLanguage::Japanese).unwrap();
        assert_eq!(entropy.len(), 16);
        // A Japanese sentence is not valid against the English wordlist.
        assert!(decode(&sentence, MnemonicLanguage::English).is_err());
    }

    proptest! {
        #[test]
        fn prop_decode_encode_roundtrip(entropy in proptest::collection::vec(any::<u8>(), 16..=32)) {
            // Only multiples of 4 bytes are encodable.
            prop_assume!(entropy.len() % 4 == 0);
            let sentence = encode(&entropy, MnemonicLanguage::English).unwrap();
            let decoded = decode(&sentence, MnemonicLanguage::English).unwrap();
            prop_assert_eq!(&decoded[..], &entropy[..]);
            prop_assert_eq!(encode(&decoded, MnemonicLanguage::English).unwrap(), sentence);
        }
    }
}
