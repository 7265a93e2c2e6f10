//! Token fingerprints and the cache key formats shared with the users service.
use sha2::{Digest, Sha256};

pub const VALID_TOKEN_PREFIX: &str = "jwt";
pub const BLACKLIST_PREFIX: &str = "black_list_jwt";

/// SHA-256 fingerprint of a raw bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenFingerprint(String);

impl TokenFingerprint {
    pub fn of(token: &str) -> Self {
        Self(hex::encode(Sha256::digest(token.as_bytes())))
    }

    /// Full lowercase hex digest (64 chars).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, safe for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }

    /// `jwt:<fingerprint>`
    pub fn validity_key(&self) -> String {
        format!("{VALID_TOKEN_PREFIX}:{}", self.0)
    }

    /// `black_list_jwt:<fingerprint>`
    pub fn blacklist_key(&self) -> String {
        format!("{BLACKLIST_PREFIX}:{}", self.0)
    }
}

impl std::fmt::Display for TokenFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        // sha256("abc")
        let fp = TokenFingerprint::of("abc");
        assert_eq!(
            fp.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(fp.short(), "ba7816bf8f01");
    }

    #[test]
    fn test_key_formats() {
        let fp = TokenFingerprint::of("abc");
        assert_eq!(
            fp.validity_key(),
            "jwt:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            fp.blacklist_key(),
            "black_list_jwt:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(TokenFingerprint::of("t1"), TokenFingerprint::of("t1"));
        assert_ne!(TokenFingerprint::of("t1"), TokenFingerprint::of("t2"));
    }
}
