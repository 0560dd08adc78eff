//! Work templates received from the pool

use super::codec::HexError;
use serde::Serialize;
use serde_json::Value;

/// An error caused by a pool message that doesn't describe usable work
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("incomplete job: expected method \"mining.notify\", got {0:?}")]
    WrongMethod(String),

    #[error("incomplete job: expected at least 8 params, got {0}")]
    TooFewParams(usize),

    #[error("incomplete job: param {index} ({field}) is missing or not a string")]
    MissingField { index: usize, field: &'static str },

    #[error("malformed hex in {field}: {source}")]
    MalformedHex {
        field: &'static str,
        source: HexError,
    },

    #[error("invalid compact target bits {0:?}")]
    InvalidBits(String),
}

impl JobError {
    /// Whether this error means required fields were absent, rather than
    /// present but malformed.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            JobError::WrongMethod(_) | JobError::TooFewParams(_) | JobError::MissingField { .. }
        )
    }
}

/// One unit of mining work. Immutable once parsed; a newer job supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    id: String,
    prev_hash: String,
    merkle_root: String,
    version: String,
    timestamp: String,
    bits: String,
}

/// Position, name, and slot capacity (in bytes) of each field in the
/// `mining.notify` params array.
const FIELDS: [(usize, &str, usize); 6] = [
    (0, "job_id", 63),
    (1, "prev_hash", 64),
    (2, "merkle_root", 128),
    (5, "version", 15),
    (6, "timestamp", 15),
    (7, "bits", 15),
];

impl Job {
    /// The only method that carries new work
    pub const NOTIFY_METHOD: &'static str = "mining.notify";

    /// The params array must reach at least the `bits` field
    pub const MIN_PARAMS: usize = 8;

    /// Build a job from an already-parsed `mining.notify` request.
    pub fn from_parsed(method: &str, params: &[Value]) -> Result<Job, JobError> {
        if method != Self::NOTIFY_METHOD {
            return Err(JobError::WrongMethod(method.to_string()));
        }

        if params.len() < Self::MIN_PARAMS {
            return Err(JobError::TooFewParams(params.len()));
        }

        let field = |slot: usize| {
            let (index, name, capacity) = FIELDS[slot];
            params[index]
                .as_str()
                .map(|value| truncate(value, capacity))
                .ok_or(JobError::MissingField { index, field: name })
        };

        Ok(Job {
            id: field(0)?,
            prev_hash: field(1)?,
            merkle_root: field(2)?,
            version: field(3)?,
            timestamp: field(4)?,
            bits: field(5)?,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prev_hash(&self) -> &str {
        &self.prev_hash
    }

    pub fn merkle_root(&self) -> &str {
        &self.merkle_root
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn bits(&self) -> &str {
        &self.bits
    }
}

/// Keep the leading bytes of `s` that fit in `capacity`, never splitting a
/// character.
fn truncate(s: &str, capacity: usize) -> String {
    if s.len() <= capacity {
        return s.to_string();
    }

    let mut end = capacity;
    while !s.is_char_boundary(end) {
        end -= 1;
    }

    s[..end].to_string()
}

#[cfg(test)]
impl Job {
    /// A well-formed job with recognisable field values.
    pub fn example(id: &str) -> Job {
        let params = vec![
            Value::from(id),
            Value::from("11".repeat(32)),
            Value::from("22".repeat(32)),
            Value::from("ignored"),
            Value::Array(vec![]),
            Value::from("20000000"),
            Value::from("5f5e1000"),
            Value::from("1d00ffff"),
        ];

        Job::from_parsed(Job::NOTIFY_METHOD, &params).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notify_params() -> Vec<Value> {
        let params = json!([
            "job-42",
            "000000000000000000026ad1c9a5c80b1e1a8a4f4b2c7d6e5f4a3b2c1d0e0f10",
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b",
            "coinb2",
            [],
            "20000000",
            "65a8f2b1",
            "17034219",
            true
        ]);

        match params {
            Value::Array(params) => params,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_complete_job() {
        let params = notify_params();
        let job = Job::from_parsed("mining.notify", &params).unwrap();

        assert_eq!(job.id(), "job-42");
        assert_eq!(job.prev_hash(), params[1].as_str().unwrap());
        assert_eq!(job.merkle_root(), params[2].as_str().unwrap());
        assert_eq!(job.version(), "20000000");
        assert_eq!(job.timestamp(), "65a8f2b1");
        assert_eq!(job.bits(), "17034219");
    }

    #[test]
    fn test_wrong_method() {
        let params = notify_params();

        for method in &["mining.set_difficulty", "Mining.Notify", ""] {
            let err = Job::from_parsed(method, &params).unwrap_err();
            assert_eq!(err, JobError::WrongMethod(method.to_string()));
            assert!(err.is_incomplete());
        }
    }

    #[test]
    fn test_too_few_params() {
        let params = notify_params();

        assert_eq!(
            Job::from_parsed("mining.notify", &params[..7]).unwrap_err(),
            JobError::TooFewParams(7)
        );
    }

    #[test]
    fn test_missing_fields() {
        for &(index, field, _) in FIELDS.iter() {
            let mut params = notify_params();
            params[index] = Value::Null;

            let err = Job::from_parsed("mining.notify", &params).unwrap_err();
            assert_eq!(err, JobError::MissingField { index, field });
            assert!(err.is_incomplete());
        }
    }

    #[test]
    fn test_non_string_field() {
        let mut params = notify_params();
        params[5] = json!(536870912);

        assert_eq!(
            Job::from_parsed("mining.notify", &params).unwrap_err(),
            JobError::MissingField {
                index: 5,
                field: "version"
            }
        );
    }

    #[test]
    fn test_unused_params_are_ignored() {
        let mut params = notify_params();
        params[3] = Value::Null;
        params[4] = json!({"anything": 1});

        assert!(Job::from_parsed("mining.notify", &params).is_ok());
    }

    #[test]
    fn test_truncation_keeps_leading_bytes() {
        let mut params = notify_params();
        let long_id = "x".repeat(100);
        params[0] = Value::from(long_id.as_str());
        params[5] = Value::from("0123456789abcdef0123");

        let job = Job::from_parsed("mining.notify", &params).unwrap();
        assert_eq!(job.id(), &long_id[..63]);
        assert_eq!(job.version(), "0123456789abcde");
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 'é' is two bytes, so 15 bytes would split the eighth one
        assert_eq!(truncate(&"é".repeat(10), 15), "é".repeat(7));
        assert_eq!(truncate("short", 15), "short");
    }
}
