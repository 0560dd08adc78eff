//! Difficulty targets and the proof-of-work comparison

use super::codec::{self, HexError};
use super::job::{Job, JobError};
use crate::prelude::*;

/// A 256-bit unsigned threshold, stored big-endian. A digest meets the target
/// when, read as a big-endian integer, it is less than or equal to it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target([u8; 32]);

impl Target {
    pub const LENGTH: usize = 32;

    /// Nothing but an all-zero digest meets this target
    pub const ZERO: Target = Target([0x00; Target::LENGTH]);

    /// Every digest meets this target
    pub const MAX: Target = Target([0xff; Target::LENGTH]);

    /// The target used when none is configured: 19 leading zero nibbles.
    pub const DEFAULT: Target = Target([
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
        0x00, 0x0f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, //
    ]);

    pub const fn from_bytes(bytes: [u8; Target::LENGTH]) -> Self {
        Target(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Target::LENGTH] {
        &self.0
    }

    pub fn into_hex(self) -> String {
        codec::encode(self.0)
    }

    /// Decode the compact `bits` representation: the high byte is a base-256
    /// exponent and the low three bytes a mantissa, so that
    /// `target = mantissa * 256^(exponent - 3)`.
    ///
    /// Returns `None` for negative or overflowing encodings.
    pub fn from_compact(bits: u32) -> Option<Target> {
        let exponent = (bits >> 24) as isize;
        let mantissa = bits & 0x007f_ffff;

        if mantissa == 0 {
            return Some(Target::ZERO);
        }

        // sign bit
        if bits & 0x0080_0000 != 0 {
            return None;
        }

        let mut target = [0u8; Target::LENGTH];

        for (i, &byte) in mantissa.to_be_bytes()[1..].iter().enumerate() {
            // position of this byte, counted from the least significant end
            let position = exponent - 1 - i as isize;

            if position < 0 {
                continue;
            }

            let position = position as usize;
            if position >= Target::LENGTH {
                if byte != 0 {
                    return None;
                }
                continue;
            }

            target[Target::LENGTH - 1 - position] = byte;
        }

        Some(Target(target))
    }

    /// Derive the target from a job's hex-encoded compact `bits` field.
    pub fn from_job_bits(job: &Job) -> Result<Target, JobError> {
        let bits = codec::decode_exact::<4>(job.bits()).map_err(|source| {
            JobError::MalformedHex {
                field: "bits",
                source,
            }
        })?;

        Target::from_compact(u32::from_be_bytes(bits))
            .ok_or_else(|| JobError::InvalidBits(job.bits().to_string()))
    }

    /// Check whether `digest` is a valid proof of work for this target.
    #[inline]
    pub fn is_met_by(&self, digest: &[u8; Target::LENGTH]) -> bool {
        meets_target(digest, self)
    }
}

/// Compare `digest` and `target` as 256-bit big-endian integers.
///
/// Fixed-width big-endian byte arrays order exactly like the integers they
/// encode, so the comparison runs on the raw bytes and never on hex text.
#[inline]
pub fn meets_target(digest: &[u8; Target::LENGTH], target: &Target) -> bool {
    digest[..] <= target.0[..]
}

impl Default for Target {
    fn default() -> Self {
        Target::DEFAULT
    }
}

impl FromStr for Target {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        codec::decode_exact::<{ Target::LENGTH }>(s).map(Target)
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(&self.into_hex())
    }
}

impl Debug for Target {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Target({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn low(value: u8) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[31] = value;
        bytes
    }

    #[test]
    fn test_smallest_nonzero_digest() {
        let digest = low(0x01);

        assert!(meets_target(&digest, &Target::from_bytes(low(0x01))));
        assert!(meets_target(&digest, &Target::from_bytes(low(0x80))));
        assert!(meets_target(&digest, &Target::DEFAULT));
        assert!(meets_target(&digest, &Target::MAX));
        assert!(!meets_target(&digest, &Target::ZERO));
    }

    #[test]
    fn test_largest_digest() {
        let digest = [0xff; 32];
        let mut almost_max = [0xff; 32];
        almost_max[31] = 0xfe;

        assert!(meets_target(&digest, &Target::MAX));
        assert!(!meets_target(&digest, &Target::from_bytes(almost_max)));
        assert!(!meets_target(&digest, &Target::DEFAULT));
    }

    #[test]
    fn test_leading_byte_dominates() {
        let mut digest = [0x00; 32];
        digest[0] = 0x01;

        let mut target = [0xff; 32];
        target[0] = 0x00;

        assert!(!meets_target(&digest, &Target::from_bytes(target)));
    }

    #[test]
    fn test_hex_string_comparison_disagrees() {
        fn string_compare(digest_hex: &str, target_hex: &str) -> bool {
            digest_hex <= target_hex
        }

        // a digest equal to the default target, against the same threshold
        // written with two hex digits missing
        let digest = *Target::DEFAULT.as_bytes();
        let short_target = "0000000000000000000fffffffffffffffffffffffffffffffffffffffffff";
        assert!(meets_target(&digest, &Target::DEFAULT));
        assert!(!string_compare(&codec::encode(digest), short_target));

        // 0x20 > 0x10 numerically, but "00..20" sorts before "10"
        let digest = low(0x20);
        assert!(!meets_target(&digest, &Target::from_bytes(low(0x10))));
        assert!(string_compare(&codec::encode(digest), "10"));
    }

    #[test]
    fn test_from_compact_genesis() {
        let target = Target::from_compact(0x1d00ffff).unwrap();

        let mut expected = [0u8; 32];
        expected[4] = 0xff;
        expected[5] = 0xff;
        assert_eq!(target, Target::from_bytes(expected));
    }

    #[test]
    fn test_from_compact_high_difficulty() {
        let target = Target::from_compact(0x17034219).unwrap();

        assert_eq!(&target.as_bytes()[..9], &[0u8; 9]);
        assert_eq!(&target.as_bytes()[9..12], &[0x03, 0x42, 0x19]);
        assert_eq!(&target.as_bytes()[12..], &[0u8; 20]);
    }

    #[test]
    fn test_from_compact_small_exponent() {
        assert_eq!(
            Target::from_compact(0x01123456).unwrap(),
            Target::from_bytes(low(0x12))
        );
        assert_eq!(Target::from_compact(0x00123456).unwrap(), Target::ZERO);
    }

    #[test]
    fn test_from_compact_invalid() {
        assert_eq!(Target::from_compact(0x04923456), None);
        assert_eq!(Target::from_compact(0x23123456), None);
        assert_eq!(Target::from_compact(0x04800000), Some(Target::ZERO));
    }

    #[test]
    fn test_from_job_bits() {
        let job = Job::example("bits");
        assert_eq!(
            Target::from_job_bits(&job).unwrap(),
            Target::from_compact(0x1d00ffff).unwrap()
        );
    }

    #[test]
    fn test_parse_and_display() {
        let hex = "00000000000000000000ffffffffffffffffffffffffffffffffffffffffffff";
        let target = Target::from_str(hex).unwrap();

        assert_eq!(target.to_string(), hex);
        assert!(Target::from_str("00ff").is_err());
        assert_eq!(
            Target::DEFAULT.to_string(),
            "0000000000000000000fffffffffffffffffffffffffffffffffffffffffffff"
        );
    }
}
