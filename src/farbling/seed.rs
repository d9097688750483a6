//! Farbling seeds
//!
//! Every farbling stream is derived from three inputs:
//!
//! - the domain identity, `HMAC-SHA256(session key, domain)`
//! - a purpose label, so canvas and audio never share a stream
//! - a CRC-16 of the original, unfarbled content
//!
//! The same page reading the same content twice gets the same answer, while
//! other content or another site gets a different one. Nothing about past
//! calls is remembered.

use hmac::{Hmac, Mac};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, ShieldError};

type HmacSha256 = Hmac<Sha256>;

/// Purpose label of image farbling.
pub const CANVAS_LABEL: &str = "canvas";
/// Purpose label of audio farbling.
pub const AUDIO_LABEL: &str = "audio";
/// Purpose label of point-in-path answers.
pub const POINT_LABEL: &str = "canvas-point";

/// Per-session secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    /// Fresh key from the platform RNG (`crypto.getRandomValues` in WASM).
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; 32];
        getrandom::getrandom(&mut bytes).map_err(|e| ShieldError::Entropy(e.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Identity of a domain under this key.
    pub fn domain_identity(&self, domain: &str) -> Result<DomainIdentity> {
        let mut mac = HmacSha256::new_from_slice(&self.0)
            .map_err(|e| ShieldError::Internal(format!("HMAC key: {}", e)))?;
        mac.update(domain.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&mac.finalize().into_bytes());
        Ok(DomainIdentity(out))
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Per-origin secret derived from the session key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DomainIdentity([u8; 32]);

impl DomainIdentity {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short printable prefix for logs.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl std::fmt::Debug for DomainIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DomainIdentity({}..)", self.fingerprint())
    }
}

/// Everything a farbling PRNG is seeded from.
#[derive(Debug, Clone)]
pub struct FarblingSeed<'a> {
    pub identity: &'a DomainIdentity,
    pub label: &'a str,
    pub checksum: u16,
}

impl<'a> FarblingSeed<'a> {
    pub fn new(identity: &'a DomainIdentity, label: &'a str, checksum: u16) -> Self {
        Self {
            identity,
            label,
            checksum,
        }
    }

    /// Deterministic PRNG for this seed.
    pub fn rng(&self) -> StdRng {
        let mut hasher = Sha256::new();
        hasher.update(self.identity.as_bytes());
        hasher.update(self.label.as_bytes());
        hasher.update(self.checksum.to_le_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&hasher.finalize());
        StdRng::from_seed(seed)
    }
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF).
#[derive(Debug, Clone, Copy)]
pub struct Crc16 {
    crc: u16,
}

const CRC16_TABLE: [u16; 256] = crc16_table();

const fn crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

impl Crc16 {
    pub fn new() -> Self {
        Self { crc: 0xFFFF }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            let idx = ((self.crc >> 8) as u8 ^ b) as usize;
            self.crc = (self.crc << 8) ^ CRC16_TABLE[idx];
        }
    }

    pub fn finish(&self) -> u16 {
        self.crc
    }

    pub fn checksum(bytes: &[u8]) -> u16 {
        let mut crc = Self::new();
        crc.update(bytes);
        crc.finish()
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}
