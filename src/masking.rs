//! One-way representations of secret values.
//!
//! Secret attributes are never written to state in clear text. The persisted
//! form is [`hash_value`], which is deterministic and lets a plan detect a
//! changed value without knowing the old one. [`censor`] only ever reaches
//! log output.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Filler that replaces the hidden prefix of a censored value.
pub const CENSOR_FILLER: &str = "xxxx";

/// Maximum number of trailing characters a censored value reveals.
pub const CENSOR_MAX_REVEALED: usize = 4;

/// How a secret value is turned into something safe to store or print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskStrategy {
    /// Base64-encoded SHA-256 digest. Used for state.
    #[default]
    Digest,
    /// Fixed filler followed by a short suffix. Used for logs.
    Censor,
}

impl MaskStrategy {
    /// Mask `value` with this strategy.
    pub fn apply(self, value: &str) -> String {
        match self {
            Self::Digest => hash_value(value),
            Self::Censor => censor(value),
        }
    }
}

/// SHA-256 digest of the UTF-8 bytes of `value`, base64 encoded.
pub fn hash_value(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    STANDARD.encode(digest)
}

/// Reveal at most the last four characters of `value`.
///
/// One character is revealed for every two characters of input.
pub fn censor(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let revealed = (chars.len() / 2).min(CENSOR_MAX_REVEALED);

    let mut out = String::with_capacity(CENSOR_FILLER.len() + revealed);
    out.push_str(CENSOR_FILLER);
    out.extend(&chars[chars.len() - revealed..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_censor_boundaries() {
        let cases = [
            ("", "xxxx"),
            ("1", "xxxx"),
            ("22", "xxxx2"),
            ("333", "xxxx3"),
            ("4444", "xxxx44"),
            ("55555", "xxxx55"),
            ("666666", "xxxx666"),
            ("7777777", "xxxx777"),
            ("88888888", "xxxx8888"),
            ("999999999", "xxxx9999"),
            ("a-much-longer-secret", "xxxxcret"),
        ];

        for (input, expected) in cases {
            assert_eq!(censor(input), expected, "censor({:?})", input);
        }
    }

    #[test]
    fn test_censor_counts_characters_not_bytes() {
        assert_eq!(censor("äöüß"), "xxxxüß");
    }

    #[test]
    fn test_hash_value_known_digest() {
        assert_eq!(
            hash_value("s3cr3t"),
            "TnOMpVY8Bs/QAYKZkz1Y2x3Yv5f2lz3Jm/bNxktVUL0="
        );
        assert_eq!(
            hash_value(""),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn test_hash_value_is_deterministic() {
        assert_eq!(
            hash_value("value-for-the-test"),
            hash_value("value-for-the-test")
        );
    }

    #[test]
    fn test_hash_value_distinguishes_inputs() {
        // Collisions are possible in principle but not expected for SHA-256.
        assert_ne!(
            hash_value("value-for-the-test"),
            hash_value("value-for-the-test-again")
        );
        assert_ne!(hash_value("a"), hash_value("A"));
    }

    #[test]
    fn test_strategy_dispatch() {
        assert_eq!(MaskStrategy::default(), MaskStrategy::Digest);
        assert_eq!(MaskStrategy::Digest.apply("s3cr3t"), hash_value("s3cr3t"));
        assert_eq!(MaskStrategy::Censor.apply("s3cr3t"), "xxxxr3t");
    }
}
