//! API bearer tokens.
//!
//! Tokens are random hex strings. Only their SHA-256 digest is kept in memory
//! once the server has loaded its configuration.
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Generate a cryptographically-random 32-byte token, hex encoded.
pub fn generate_api_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hex SHA-256 digest of `token`.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Compare two digests without short-circuiting on the first differing byte.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_hex() {
        let a = generate_api_token();
        let b = generate_api_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(digests_match(&hash_token("abc"), &hash_token("abc")));
        assert!(!digests_match(&hash_token("abc"), &hash_token("abd")));
        assert!(!digests_match("ab", "abc"));
    }
}
