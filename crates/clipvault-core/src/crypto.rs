use sha2::{Digest, Sha256};

pub const MIN_MASTER_PASSWORD_LEN: usize = 4;

/// Hex SHA-256 of a secret. Used for the master password and gatekeeper
/// secrets; the stored digest is compared, never the plaintext.
pub fn secret_digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

pub fn verify_secret(input: &str, digest: &str) -> bool {
    !digest.is_empty() && secret_digest(input) == digest
}

/// Short, stable identifier for this host, sent with mirror payloads.
pub fn device_fingerprint() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_default();
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(std::env::consts::OS.as_bytes());
    hasher.update(b"|");
    hasher.update(std::env::consts::ARCH.as_bytes());
    hasher.update(b"|");
    hasher.update(host.as_bytes());
    hasher.update(b"|");
    hasher.update(user.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let d = secret_digest("abcd");
        assert_eq!(d.len(), 64);
        assert_eq!(d, secret_digest("abcd"));
        assert_ne!(d, secret_digest("abce"));
    }

    #[test]
    fn empty_digest_never_verifies() {
        assert!(!verify_secret("", ""));
        assert!(verify_secret("abcd", &secret_digest("abcd")));
    }

    #[test]
    fn fingerprint_is_sixteen_hex_chars() {
        let fp = device_fingerprint();
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, device_fingerprint());
    }
}
