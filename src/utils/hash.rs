use sha2::{Digest, Sha256};

/// Hash arbitrary bytes → hex
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// First 12 hex digits of the SHA-256, enough to tell dump files apart.
pub fn short_digest(bytes: &[u8]) -> String {
    sha256_bytes(bytes)[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(short_digest(b""), "e3b0c44298fc");
    }
}
