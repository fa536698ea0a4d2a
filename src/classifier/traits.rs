// Image classifier trait: the swap-ready abstraction.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One category's raw severity as reported by the classifier.
///
/// Severity is kept as the classifier's raw integer; range checks happen in
/// the verdict aggregator so out-of-contract values surface as errors instead
/// of being silently truncated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySeverity {
    pub category: String,
    pub severity: i64,
}

impl CategorySeverity {
    pub fn new(category: impl Into<String>, severity: i64) -> Self {
        Self {
            category: category.into(),
            severity,
        }
    }
}

/// Trait for classifying an image into per-category severities.
/// Implementations must be async because providers are remote HTTP APIs.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Analyze raw image bytes.
    async fn analyze_image(&self, image: &[u8]) -> Result<Vec<CategorySeverity>>;
}
