// CLASSIFICATION: COMMUNITY
// Filename: identity.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Code-signing identity of clients allowed to open the channel.
//!
//! A client is identified by the code directory hash (cdhash) of its main
//! executable. The trusted value is embedded at build time from the
//! `RSRREPAIR_CDHASH` environment variable. Non-production builds may also
//! accept a second value published as the provider property
//! [`CDHASH_PROPERTY`].

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::host::PropertySource;
use crate::shared::{CDHASH_PROPERTY, CS_CDHASH_LEN};

mod embedded {
    include!(concat!(env!("OUT_DIR"), "/cdhash.rs"));
}

/// Truncated code directory hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CdHash([u8; CS_CDHASH_LEN]);

impl CdHash {
    /// Wrap raw cdhash bytes.
    pub const fn new(bytes: [u8; CS_CDHASH_LEN]) -> Self {
        Self(bytes)
    }

    /// SHA-256 of a CodeDirectory blob, truncated to the cdhash length.
    pub fn from_code_directory(blob: &[u8]) -> Self {
        let digest = Sha256::digest(blob);
        let mut bytes = [0u8; CS_CDHASH_LEN];
        bytes.copy_from_slice(&digest[..CS_CDHASH_LEN]);
        Self(bytes)
    }

    /// Raw cdhash bytes.
    pub fn as_bytes(&self) -> &[u8; CS_CDHASH_LEN] {
        &self.0
    }

    /// Exact comparison against a candidate of any length.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        candidate.len() == CS_CDHASH_LEN && bool::from(self.0[..].ct_eq(candidate))
    }
}

impl fmt::Debug for CdHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CdHash({})", hex::encode(self.0))
    }
}

impl fmt::Display for CdHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Errors from parsing a hex cdhash.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CdHashParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("cdhash must be 20 bytes, got {0}")]
    Length(usize),
}

impl FromStr for CdHash {
    type Err = CdHashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim())?;
        let bytes: [u8; CS_CDHASH_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CdHashParseError::Length(bytes.len()))?;
        Ok(Self(bytes))
    }
}

/// Which credentials authorise a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityPolicy {
    pub primary: Option<CdHash>,
    pub allow_property_identity: bool,
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self::for_build()
    }
}

impl IdentityPolicy {
    /// Embedded identity; the property identity only in debug builds.
    pub fn for_build() -> Self {
        Self {
            primary: embedded::EMBEDDED_CDHASH.map(CdHash::new),
            allow_property_identity: cfg!(debug_assertions),
        }
    }

    /// Only `primary` is trusted.
    pub fn production(primary: CdHash) -> Self {
        Self {
            primary: Some(primary),
            allow_property_identity: false,
        }
    }

    /// `primary` (if any) and the property identity are trusted.
    pub fn development(primary: Option<CdHash>) -> Self {
        Self {
            primary,
            allow_property_identity: true,
        }
    }

    /// True when `candidate` equals an accepted credential. The property is
    /// only read when the policy allows it.
    pub fn authorizes(&self, candidate: &CdHash, properties: &dyn PropertySource) -> bool {
        let mut allowed = self
            .primary
            .map(|expected| expected.matches(candidate.as_bytes()))
            .unwrap_or(false);
        if self.allow_property_identity {
            if let Some(secondary) = properties.property_bytes(CDHASH_PROPERTY) {
                allowed |= candidate.matches(&secondary);
            }
        }
        allowed
    }
}
