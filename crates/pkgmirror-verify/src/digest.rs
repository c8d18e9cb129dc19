use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

use crate::hasher::{AnyHasher, Md5Hasher, Sha256Hasher};
use crate::reader::VerifiedReader;
use crate::{Result, VerificationError};

/// Digest algorithms that appear in index page fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    pub fn digest_length(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha256 => 32,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            _ => Err(VerificationError::UnsupportedAlgorithm(name.to_string())),
        }
    }

    pub fn hasher(&self) -> AnyHasher {
        match self {
            Self::Md5 => AnyHasher::Md5(Md5Hasher::new()),
            Self::Sha256 => AnyHasher::Sha256(Sha256Hasher::new()),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A content digest together with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    bytes:     Vec<u8>,
}

impl Digest {
    pub fn new(algorithm: DigestAlgorithm, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != algorithm.digest_length() {
            return Err(VerificationError::Malformed {
                algorithm: algorithm.as_str(),
                value: hex::encode(&bytes),
            });
        }
        Ok(Self { algorithm, bytes })
    }

    /// Parse a hex digest for `algorithm`; case-insensitive, surrounding
    /// whitespace ignored.
    pub fn from_hex(algorithm: DigestAlgorithm, value: &str) -> Result<Self> {
        let value = value.trim();
        let bytes = hex::decode(value).map_err(|_| VerificationError::Malformed {
            algorithm: algorithm.as_str(),
            value: value.to_string(),
        })?;
        Self::new(algorithm, bytes)
    }

    /// Parse an `algo=hex` URL fragment such as `md5=5eb63bbb...`.
    pub fn from_fragment(fragment: &str) -> Result<Self> {
        let (name, value) = fragment
            .split_once('=')
            .ok_or_else(|| VerificationError::UnsupportedAlgorithm(fragment.to_string()))?;
        Self::from_hex(DigestAlgorithm::from_name(name)?, value)
    }

    pub fn algorithm(&self) -> DigestAlgorithm { self.algorithm }

    pub fn as_bytes(&self) -> &[u8] { &self.bytes }

    pub fn to_hex(&self) -> String { hex::encode(&self.bytes) }

    /// Compare against a freshly computed digest of the same algorithm.
    pub fn verify(&self, actual: &Digest) -> Result<()> {
        if self == actual {
            Ok(())
        } else {
            Err(VerificationError::Mismatch {
                expected: self.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.algorithm, self.to_hex())
    }
}

/// Hash a file in a single streaming pass.
pub fn digest_file(path: impl AsRef<Path>, algorithm: DigestAlgorithm) -> Result<Digest> {
    let file = File::open(path.as_ref())?;
    let mut reader = VerifiedReader::new(io::BufReader::new(file), algorithm.hasher());
    io::copy(&mut reader, &mut io::sink())?;
    Digest::new(algorithm, reader.into_digest())
}
