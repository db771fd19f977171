//! Bulk fan-out results.
//!
//! Bulk calls run every element independently and wait for all of them.
//! Successes are kept even when other elements fail; the call as a whole
//! then fails with a [`BulkReport`] listing both sides.

use std::fmt;

use serde::Serialize;
use tenantvault_core::ErrorKind;

use crate::error::{Result, VaultError};

/// One element that went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkSuccess {
    /// Position in the input.
    pub index: usize,
    pub id: String,
}

/// One element that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkError {
    /// Position in the input.
    pub index: usize,
    pub kind: ErrorKind,
    pub message: String,
}

/// Per-element outcome of a bulk call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub succeeded: Vec<BulkSuccess>,
    pub failed: Vec<BulkError>,
}

impl BulkReport {
    /// Whether every element succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Kind of the lowest-index failure.
    pub fn first_failure_kind(&self) -> Option<ErrorKind> {
        self.failed.iter().min_by_key(|e| e.index).map(|e| e.kind)
    }
}

impl fmt::Display for BulkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} elements failed",
            self.failed.len(),
            self.failed.len() + self.succeeded.len()
        )?;
        if let Some(first) = self.failed.iter().min_by_key(|e| e.index) {
            write!(f, " (first at {}: {})", first.index, first.message)?;
        }
        Ok(())
    }
}

/// Fold per-element results, in input order.
///
/// Returns every value when all succeeded, otherwise a `PartialFailure`.
pub(crate) fn collect<T>(
    results: Vec<Result<T>>,
    id_of: impl Fn(&T) -> String,
) -> Result<Vec<T>> {
    let mut report = BulkReport::default();
    let mut values = Vec::with_capacity(results.len());

    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => {
                report.succeeded.push(BulkSuccess {
                    index,
                    id: id_of(&value),
                });
                values.push(value);
            }
            Err(e) => report.failed.push(BulkError {
                index,
                kind: e.kind(),
                message: e.to_string(),
            }),
        }
    }

    if report.is_success() {
        Ok(values)
    } else {
        tracing::warn!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "bulk operation partially failed"
        );
        Err(VaultError::PartialFailure(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_all_ok() {
        let results: Vec<Result<String>> = vec![Ok("a".into()), Ok("b".into())];
        assert_eq!(collect(results, Clone::clone).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_collect_partial_failure() {
        let results: Vec<Result<String>> = vec![
            Ok("a".into()),
            Err(VaultError::NotFound("x".into())),
            Ok("c".into()),
            Err(VaultError::BadRequest("y".into())),
        ];

        let err = collect(results, Clone::clone).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let VaultError::PartialFailure(report) = err else {
            panic!("expected partial failure");
        };
        assert_eq!(
            report.succeeded,
            vec![
                BulkSuccess { index: 0, id: "a".into() },
                BulkSuccess { index: 2, id: "c".into() },
            ]
        );
        let failed: Vec<_> = report.failed.iter().map(|e| (e.index, e.kind)).collect();
        assert_eq!(failed, vec![(1, ErrorKind::NotFound), (3, ErrorKind::BadRequest)]);
        assert!(report.to_string().starts_with("2 of 4 elements failed"));
    }
}
