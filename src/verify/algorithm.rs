// SPDX-License-Identifier: MPL-2.0
//! Closed algorithm enumeration (RSA modulus size × hash), the same fixed cross product the
//! original library encodes as `vb2_crypto_algorithm` (`vb2_crypto_to_signature`/`_to_hash`).

/// Hash algorithms usable anywhere a digest is required (key block self-hash, body hash).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub const fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

/// RSA modulus sizes this core recognises. `None` marks the sentinel "no signature" selector used
/// by hash-only (developer-mode) verification.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Rsa1024,
    Rsa2048,
    Rsa4096,
    Rsa8192,
    None,
}

impl SignatureAlgorithm {
    pub const fn signature_size(self) -> usize {
        match self {
            SignatureAlgorithm::Rsa1024 => 128,
            SignatureAlgorithm::Rsa2048 => 256,
            SignatureAlgorithm::Rsa4096 => 512,
            SignatureAlgorithm::Rsa8192 => 1024,
            SignatureAlgorithm::None => 0,
        }
    }
}

/// One entry of the `{RSA1024,RSA2048,RSA4096,RSA8192} x {SHA1,SHA256,SHA512}` cross product,
/// plus the unsigned sentinel, matching the original library's flat `CRYPTO_ALGORITHM` numbering.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Rsa1024Sha1,
    Rsa1024Sha256,
    Rsa1024Sha512,
    Rsa2048Sha1,
    Rsa2048Sha256,
    Rsa2048Sha512,
    Rsa4096Sha1,
    Rsa4096Sha256,
    Rsa4096Sha512,
    Rsa8192Sha1,
    Rsa8192Sha256,
    Rsa8192Sha512,
    Unsigned,
}

impl Algorithm {
    pub const fn from_u32(value: u32) -> Option<Algorithm> {
        match value {
            0 => Some(Algorithm::Rsa1024Sha1),
            1 => Some(Algorithm::Rsa1024Sha256),
            2 => Some(Algorithm::Rsa1024Sha512),
            3 => Some(Algorithm::Rsa2048Sha1),
            4 => Some(Algorithm::Rsa2048Sha256),
            5 => Some(Algorithm::Rsa2048Sha512),
            6 => Some(Algorithm::Rsa4096Sha1),
            7 => Some(Algorithm::Rsa4096Sha256),
            8 => Some(Algorithm::Rsa4096Sha512),
            9 => Some(Algorithm::Rsa8192Sha1),
            10 => Some(Algorithm::Rsa8192Sha256),
            11 => Some(Algorithm::Rsa8192Sha512),
            0xFFFF_FFFF => Some(Algorithm::Unsigned),
            _ => None,
        }
    }

    pub const fn signature(self) -> SignatureAlgorithm {
        match self {
            Algorithm::Rsa1024Sha1 | Algorithm::Rsa1024Sha256 | Algorithm::Rsa1024Sha512 => {
                SignatureAlgorithm::Rsa1024
            }
            Algorithm::Rsa2048Sha1 | Algorithm::Rsa2048Sha256 | Algorithm::Rsa2048Sha512 => {
                SignatureAlgorithm::Rsa2048
            }
            Algorithm::Rsa4096Sha1 | Algorithm::Rsa4096Sha256 | Algorithm::Rsa4096Sha512 => {
                SignatureAlgorithm::Rsa4096
            }
            Algorithm::Rsa8192Sha1 | Algorithm::Rsa8192Sha256 | Algorithm::Rsa8192Sha512 => {
                SignatureAlgorithm::Rsa8192
            }
            Algorithm::Unsigned => SignatureAlgorithm::None,
        }
    }

    pub const fn hash(self) -> HashAlgorithm {
        match self {
            Algorithm::Rsa1024Sha1 | Algorithm::Rsa2048Sha1 | Algorithm::Rsa4096Sha1 | Algorithm::Rsa8192Sha1 => {
                HashAlgorithm::Sha1
            }
            Algorithm::Rsa1024Sha256
            | Algorithm::Rsa2048Sha256
            | Algorithm::Rsa4096Sha256
            | Algorithm::Rsa8192Sha256 => HashAlgorithm::Sha256,
            Algorithm::Rsa1024Sha512
            | Algorithm::Rsa2048Sha512
            | Algorithm::Rsa4096Sha512
            | Algorithm::Rsa8192Sha512 => HashAlgorithm::Sha512,
            Algorithm::Unsigned => HashAlgorithm::Sha512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_from_u32() {
        for v in 0..12u32 {
            let a = Algorithm::from_u32(v).unwrap();
            assert_eq!(a.signature().signature_size() > 0, true);
        }
    }

    #[test]
    fn unsigned_sentinel_has_no_signature() {
        let a = Algorithm::from_u32(0xFFFF_FFFF).unwrap();
        assert_eq!(a.signature(), SignatureAlgorithm::None);
        assert_eq!(a.signature().signature_size(), 0);
    }

    #[test]
    fn unknown_algorithm_id_rejected() {
        assert!(Algorithm::from_u32(12).is_none());
    }
}
