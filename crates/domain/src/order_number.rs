//! Human-readable order numbers.
//!
//! Numbers look like `VEN-42137512`: a prefix, the current unix time modulo
//! 100000, and three random digits. Collisions are unlikely but possible, so
//! persistence treats a duplicate number as retryable.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const TIME_BUCKETS: i64 = 100_000;
const RANDOM_DIGITS: std::ops::RangeInclusive<u32> = 100..=999;

/// A human-readable order number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that can hand out order numbers.
pub trait OrderNumberSource: Send + Sync {
    fn next_number(&self) -> OrderNumber;
}

/// Time-and-random order number generator.
#[derive(Debug, Clone)]
pub struct OrderNumberGenerator {
    prefix: String,
}

impl OrderNumberGenerator {
    pub const DEFAULT_PREFIX: &'static str = "VEN";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Builds a number for a given instant and random source.
    pub fn generate_at<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> OrderNumber {
        let bucket = now.timestamp().rem_euclid(TIME_BUCKETS);
        let suffix = rng.random_range(RANDOM_DIGITS);
        OrderNumber(format!("{}-{}{}", self.prefix, bucket, suffix))
    }
}

impl Default for OrderNumberGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

impl OrderNumberSource for OrderNumberGenerator {
    fn next_number(&self) -> OrderNumber {
        self.generate_at(Utc::now(), &mut rand::rng())
    }
}
