// Safety verdict: reduces per-category severities to one decision.
//
// The classifier reports each category on a 0-7 scale. The image is safe only
// when every category stays at 2 or below. Confidence is the linear inverse of
// the worst severity: 1.0 at severity 0, 0.0 at severity 7.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classifier::traits::CategorySeverity;
use crate::error::AppError;

/// Highest severity level the classifier can report.
pub const MAX_SEVERITY: u8 = 7;

/// Highest severity still considered safe.
pub const SAFE_SEVERITY_CEILING: u8 = 2;

/// The verdict returned to callers of `POST /moderate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub is_safe: bool,
    /// Lowercased category label → severity
    pub categories: BTreeMap<String, u8>,
    /// 0.0 (most severe) to 1.0 (nothing detected)
    pub confidence: f64,
}

/// Compute the verdict for a set of category severities.
///
/// Labels are lowercased; if two labels collapse to the same key the higher
/// severity wins, so the reported map always contains the severity that
/// decided the verdict. (A last-write-wins map could report a lower value
/// than the one behind `is_safe`.) An empty input yields a safe verdict with
/// confidence 1.0.
pub fn aggregate(categories: &[CategorySeverity]) -> Result<ModerationResult, AppError> {
    let mut normalized: BTreeMap<String, u8> = BTreeMap::new();

    for entry in categories {
        let severity = validate_severity(entry)?;
        normalized
            .entry(entry.category.to_lowercase())
            .and_modify(|existing| *existing = (*existing).max(severity))
            .or_insert(severity);
    }

    let max_severity = normalized.values().copied().max().unwrap_or(0);

    Ok(ModerationResult {
        is_safe: is_safe(max_severity),
        categories: normalized,
        confidence: confidence(max_severity),
    })
}

/// Safe iff the worst severity is at most `SAFE_SEVERITY_CEILING`.
pub fn is_safe(max_severity: u8) -> bool {
    max_severity <= SAFE_SEVERITY_CEILING
}

/// `1 - max_severity / 7`.
pub fn confidence(max_severity: u8) -> f64 {
    1.0 - f64::from(max_severity) / f64::from(MAX_SEVERITY)
}

fn validate_severity(entry: &CategorySeverity) -> Result<u8, AppError> {
    match u8::try_from(entry.severity) {
        Ok(s) if s <= MAX_SEVERITY => Ok(s),
        _ => Err(AppError::InvalidSeverity {
            category: entry.category.clone(),
            severity: entry.severity,
        }),
    }
}
