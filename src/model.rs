//! Core data model.
//!
//! A record is one synthetic employment entry. A partition is the index range a
//! single producer owns.

use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One generated record. Never mutated after the generator builds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Record {
    /// Index the record was generated from. Unique within a run.
    pub id: u64,
    pub company: String,
    pub position: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub responsibilities: Vec<String>,
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// Half-open index range `[start, end)` owned by one producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub producer: usize,
    pub start: u64,
    pub end: u64,
}

impl Partition {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn indices(&self) -> Range<u64> {
        self.start..self.end
    }
}

/// Split `[0, num_records)` into `producers` contiguous partitions.
///
/// Every partition gets `num_records / producers` indices and the last one
/// also takes the remainder, so the union is exactly `[0, num_records)`.
/// `producers` must be at least 1.
pub fn partition(num_records: u64, producers: usize) -> Vec<Partition> {
    let producers = producers.max(1);
    let chunk = num_records / producers as u64;

    (0..producers)
        .map(|i| {
            let start = i as u64 * chunk;
            let end = if i + 1 == producers {
                num_records
            } else {
                start + chunk
            };
            Partition {
                producer: i,
                start,
                end,
            }
        })
        .collect()
}
