//! Record generation.
//!
//! Generators are pure: a record is a function of its index alone, so any
//! number of producers can share one generator without synchronization.

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use crate::model::Record;

/// A record could not be built for the given index.
///
/// Producers log and skip these; they never reach the work queue.
#[derive(Debug, Clone, Error)]
#[error("record generation failed at index {index}: {reason}")]
pub struct GenerateError {
    pub index: u64,
    pub reason: String,
}

/// Builds one record per index.
pub trait RecordGenerator: Send + Sync + 'static {
    fn generate(&self, index: u64) -> Result<Record, GenerateError>;
}

impl<F> RecordGenerator for F
where
    F: Fn(u64) -> Result<Record, GenerateError> + Send + Sync + 'static,
{
    fn generate(&self, index: u64) -> Result<Record, GenerateError> {
        self(index)
    }
}

const POSITION: &str = "Software Engineer";

const RESPONSIBILITIES: [&str; 3] = [
    "Developed and maintained web applications",
    "Collaborated with cross-functional teams",
    "Participated in code reviews",
];

/// Deterministic employment-history generator.
#[derive(Debug, Clone, Copy)]
pub struct EmploymentGenerator {
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

impl EmploymentGenerator {
    pub fn new() -> Self {
        Self {
            start_date: utc_midnight(2020, 1, 1),
            end_date: utc_midnight(2023, 8, 1),
        }
    }
}

impl Default for EmploymentGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordGenerator for EmploymentGenerator {
    fn generate(&self, index: u64) -> Result<Record, GenerateError> {
        Ok(Record {
            id: index,
            company: format!("Company {}", index + 1),
            position: POSITION.to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            responsibilities: RESPONSIBILITIES.iter().map(|r| r.to_string()).collect(),
        })
    }
}

fn utc_midnight(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn employment_record_is_a_function_of_index() {
        let generator = EmploymentGenerator::new();
        let a = generator.generate(41).unwrap();
        let b = generator.generate(41).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id, 41);
        assert_eq!(a.company, "Company 42");
        assert_eq!(a.position, "Software Engineer");
        assert_eq!(a.responsibilities.len(), 3);
        assert!(a.start_date < a.end_date);
    }

    #[test]
    fn closures_are_generators() {
        let failing = |index: u64| -> Result<Record, GenerateError> {
            Err(GenerateError {
                index,
                reason: "boom".to_string(),
            })
        };
        let err = failing.generate(7).unwrap_err();
        assert_eq!(err.index, 7);
        assert_eq!(err.to_string(), "record generation failed at index 7: boom");
    }
}
