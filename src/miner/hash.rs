//! Double hashing over a pluggable 256-bit hash primitive

use ring::digest::{digest, SHA256};

/// A 32-byte hash output
pub type Digest = [u8; 32];

/// A single-pass 256-bit cryptographic hash function.
pub trait HashPrimitive {
    fn hash(&self, data: &[u8]) -> Digest;
}

/// SHA-256, as used by Bitcoin-style pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256;

impl HashPrimitive for Sha256 {
    #[inline(always)]
    fn hash(&self, data: &[u8]) -> Digest {
        let mut out = [0u8; 32];
        out.copy_from_slice(digest(&SHA256, data).as_ref());
        out
    }
}

/// Computes `H(H(data))` for a primitive `H`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleHash<H>(pub H);

impl<H: HashPrimitive> DoubleHash<H> {
    #[inline(always)]
    pub fn digest(&self, data: &[u8]) -> Digest {
        self.0.hash(&self.0.hash(data))
    }
}
