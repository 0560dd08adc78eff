//! Hex string conversion for pool-supplied header fields

use hex::FromHexError;

/// An error caused by malformed or oversized hex input
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    #[error("hex string has odd length")]
    OddLength,

    #[error("invalid hex character {character:?} at index {index}")]
    InvalidCharacter { character: char, index: usize },

    #[error("hex decodes to {actual} bytes, but capacity is {capacity}")]
    TooLong { capacity: usize, actual: usize },

    #[error("hex decodes to {actual} bytes, expected exactly {expected}")]
    WrongLength { expected: usize, actual: usize },
}

impl From<FromHexError> for HexError {
    fn from(e: FromHexError) -> Self {
        match e {
            FromHexError::OddLength => HexError::OddLength,
            FromHexError::InvalidHexCharacter { c, index } => HexError::InvalidCharacter {
                character: c,
                index,
            },
            // `hex::decode` never reports this
            FromHexError::InvalidStringLength => HexError::OddLength,
        }
    }
}

/// Decode a hex string into at most `capacity` bytes.
pub fn decode(s: &str, capacity: usize) -> Result<Vec<u8>, HexError> {
    let bytes = hex::decode(s)?;

    if bytes.len() > capacity {
        return Err(HexError::TooLong {
            capacity,
            actual: bytes.len(),
        });
    }

    Ok(bytes)
}

/// Decode a hex string that must describe exactly `N` bytes.
pub fn decode_exact<const N: usize>(s: &str) -> Result<[u8; N], HexError> {
    let bytes = decode(s, N).map_err(|e| match e {
        HexError::TooLong { actual, .. } => HexError::WrongLength {
            expected: N,
            actual,
        },
        e => e,
    })?;

    if bytes.len() != N {
        return Err(HexError::WrongLength {
            expected: N,
            actual: bytes.len(),
        });
    }

    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Encode bytes as lower-case hex, two characters per byte.
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    hex::encode(bytes)
}
