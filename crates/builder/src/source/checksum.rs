//! Archive digests

use kiln_errors::BuildError;
use kiln_types::{Checksum, ChecksumAlgorithm};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Incremental digest for any supported algorithm
pub(crate) enum Hasher {
    Sha1(Sha1),
    Sha256(Sha256),
    Md5(Md5),
}

impl Hasher {
    pub(crate) fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Sha1 => Self::Sha1(Sha1::new()),
            ChecksumAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            ChecksumAlgorithm::Md5 => Self::Md5(Md5::new()),
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Md5(h) => h.update(data),
        }
    }

    /// Lowercase hex digest
    pub(crate) fn finalize_hex(self) -> String {
        match self {
            Self::Sha1(h) => format!("{:x}", h.finalize()),
            Self::Sha256(h) => format!("{:x}", h.finalize()),
            Self::Md5(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Compare a computed digest against the expected one
pub(crate) fn verify(expected: &Checksum, actual: &str, file: &str) -> Result<(), BuildError> {
    if expected.expected().eq_ignore_ascii_case(actual) {
        Ok(())
    } else {
        Err(BuildError::ChecksumMismatch {
            file: file.to_string(),
            expected: expected.expected().to_lowercase(),
            actual: actual.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_hex(algorithm: ChecksumAlgorithm, data: &[u8]) -> String {
        let mut hasher = Hasher::new(algorithm);
        hasher.update(data);
        hasher.finalize_hex()
    }

    #[test]
    fn test_known_digests() {
        assert_eq!(
            digest_hex(ChecksumAlgorithm::Sha1, b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            digest_hex(ChecksumAlgorithm::Sha256, b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            digest_hex(ChecksumAlgorithm::Md5, b"abc"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn test_verify_is_case_insensitive() {
        let expected = Checksum::Md5 {
            md5: "900150983CD24FB0D6963F7D28E17F72".to_string(),
        };
        assert!(verify(&expected, "900150983cd24fb0d6963f7d28e17f72", "a.zip").is_ok());

        let err = verify(&expected, "00", "a.zip").unwrap_err();
        assert!(matches!(err, BuildError::ChecksumMismatch { ref file, .. } if file == "a.zip"));
    }
}
