//! Supported digest algorithms and the submitted hash task

use core::fmt;
use core::str::FromStr;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::errors::IntakeError;
use crate::types::{ConnectionId, Timestamp};

// ----------------------------------------------------------------------------
// Hash Algorithm
// ----------------------------------------------------------------------------

/// Digest algorithms a hash can be submitted under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 3] = [Self::Md5, Self::Sha256, Self::Sha512];

    /// Wire name of the algorithm
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of the lowercase hex digest
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha512 => 128,
        }
    }

    /// Pattern a submitted hash must match, as shown to workers
    pub fn pattern(&self) -> String {
        format!("^[a-f0-9]{{{}}}$", self.hex_len())
    }

    /// Whether `hash` is a well-formed digest for this algorithm
    pub fn is_valid_hash(&self, hash: &str) -> bool {
        hash.len() == self.hex_len()
            && hash
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    /// Lowercase hex digest of `input`
    pub fn digest_hex(&self, input: &[u8]) -> String {
        match self {
            HashAlgorithm::Md5 => hex::encode(Md5::digest(input)),
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(input)),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(input)),
        }
    }

    /// Whether `candidate` hashes to `target`
    pub fn matches(&self, candidate: &[u8], target: &str) -> bool {
        self.digest_hex(candidate) == target
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(IntakeError::UnsupportedAlgorithm {
                algorithm: other.to_string(),
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Hash Task
// ----------------------------------------------------------------------------

/// A hash submitted for cracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashTask {
    pub algorithm: HashAlgorithm,
    pub hash: String,
    pub submitter_id: ConnectionId,
    pub created_at: Timestamp,
}

impl HashTask {
    /// Validate a raw submission and build the task.
    ///
    /// The algorithm is checked before the hash format so an unknown algorithm
    /// is reported as such rather than as a malformed hash.
    pub fn validated(
        algorithm: &str,
        hash: &str,
        submitter_id: ConnectionId,
        created_at: Timestamp,
    ) -> Result<Self, IntakeError> {
        let algorithm: HashAlgorithm = algorithm.parse()?;
        if !algorithm.is_valid_hash(hash) {
            return Err(IntakeError::InvalidHashFormat {
                algorithm: algorithm.to_string(),
                pattern: algorithm.pattern(),
            });
        }
        Ok(Self {
            algorithm,
            hash: hash.to_string(),
            submitter_id,
            created_at,
        })
    }

    /// Whether `solution` hashes to this task's target
    pub fn is_solved_by(&self, solution: &str) -> bool {
        self.algorithm.matches(solution.as_bytes(), &self.hash)
    }
}
