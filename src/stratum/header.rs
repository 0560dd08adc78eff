//! Block header assembly

use super::codec;
use super::job::{Job, JobError};
use crate::prelude::*;

/// An 80-byte block header:
/// `version(4) | prev_hash(32) | merkle_root(32) | timestamp(4) | bits(4) | nonce(4)`.
///
/// Job fields are copied in the byte order the pool sent them; only the nonce
/// changes while searching.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockHeader([u8; 80]);

impl BlockHeader {
    pub const LENGTH: usize = 80;
    const NONCE_OFFSET: usize = 76;

    /// Assemble the header for `job` with the given nonce, validating every
    /// job field. Searching should build once and then only call
    /// [`set_nonce`](Self::set_nonce).
    pub fn build(job: &Job, nonce: u32) -> Result<BlockHeader, JobError> {
        let mut data = [0u8; Self::LENGTH];

        data[0..4].copy_from_slice(&field::<4>("version", job.version())?);
        data[4..36].copy_from_slice(&field::<32>("prev_hash", job.prev_hash())?);
        data[36..68].copy_from_slice(&field::<32>("merkle_root", job.merkle_root())?);
        data[68..72].copy_from_slice(&field::<4>("timestamp", job.timestamp())?);
        data[72..76].copy_from_slice(&field::<4>("bits", job.bits())?);

        let mut header = BlockHeader(data);
        header.set_nonce(nonce);
        Ok(header)
    }

    /// Overwrite the nonce field (little-endian).
    #[inline]
    pub fn set_nonce(&mut self, nonce: u32) {
        self.0[Self::NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
    }

    #[cfg(test)]
    pub fn nonce(&self) -> u32 {
        let mut nonce = [0u8; 4];
        nonce.copy_from_slice(&self.0[Self::NONCE_OFFSET..]);
        u32::from_le_bytes(nonce)
    }

    pub fn as_bytes(&self) -> &[u8; BlockHeader::LENGTH] {
        &self.0
    }
}

fn field<const N: usize>(name: &'static str, value: &str) -> Result<[u8; N], JobError> {
    codec::decode_exact::<N>(value).map_err(|source| JobError::MalformedHex {
        field: name,
        source,
    })
}

impl Debug for BlockHeader {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "BlockHeader({})", codec::encode(&self.0[..]))
    }
}
