use md5::Md5;
use sha2::{Digest, Sha256};

/// Digest algorithms a stored password hash may have been produced with.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DigestAlgorithm {
    Sha256,
    /// Accounts created by older deployments.
    Md5,
}

/// Tried in order when verifying; the first entry hashes new passwords.
pub const ACCEPTED_DIGESTS: [DigestAlgorithm; 2] = [DigestAlgorithm::Sha256, DigestAlgorithm::Md5];

impl DigestAlgorithm {
    /// Lowercase hex digest of `password`.
    pub fn hex_digest(self, password: impl AsRef<str>) -> String {
        let bytes = password.as_ref().as_bytes();
        match self {
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
            DigestAlgorithm::Md5 => hex::encode(Md5::digest(bytes)),
        }
    }
}

pub fn hash_password(password: impl AsRef<str>) -> String {
    ACCEPTED_DIGESTS[0].hex_digest(password)
}

/// Returns the algorithm whose digest of `password` equals `stored`.
pub fn verify_password(password: impl AsRef<str>, stored: &str) -> Option<DigestAlgorithm> {
    ACCEPTED_DIGESTS
        .iter()
        .copied()
        .find(|algorithm| algorithm.hex_digest(password.as_ref()) == stored)
}
