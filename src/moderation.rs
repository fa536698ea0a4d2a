// Moderation pipeline: classify, aggregate, record usage.
//
// Usage is written only after a verdict is computed, so a failed or timed-out
// classification leaves no audit record.

use std::time::Duration;

use tracing::{info, warn};

use crate::classifier::traits::ImageClassifier;
use crate::db::models::{Token, UsageRecord};
use crate::db::Database;
use crate::error::AppError;
use crate::scoring::verdict::{aggregate, ModerationResult};

/// Endpoint label written to the usage log.
pub const MODERATE_ENDPOINT: &str = "/moderate";

/// Run one image through the classifier and return the verdict.
pub async fn moderate_image(
    classifier: &dyn ImageClassifier,
    db: &dyn Database,
    caller: &Token,
    image: &[u8],
    timeout: Duration,
) -> Result<ModerationResult, AppError> {
    let categories = match tokio::time::timeout(timeout, classifier.analyze_image(image)).await {
        Ok(Ok(categories)) => categories,
        Ok(Err(e)) => {
            warn!(error = %format!("{e:#}"), "Content Safety call failed");
            return Err(AppError::Classifier(format!("{e:#}")));
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs_f64(), "Content Safety call timed out");
            return Err(AppError::ClassifierTimeout(timeout));
        }
    };

    if categories.is_empty() {
        warn!("Content Safety returned no categories, treating image as safe");
    }

    let result = aggregate(&categories)?;

    db.record_usage(&UsageRecord::now(&caller.token, MODERATE_ENDPOINT))
        .await?;

    info!(
        is_safe = result.is_safe,
        confidence = result.confidence,
        image_bytes = image.len(),
        "Moderated image"
    );

    Ok(result)
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::classifier::traits::CategorySeverity;
    use crate::db::sqlite::SqliteDatabase;
    use async_trait::async_trait;
    use chrono::Utc;

    struct FixedClassifier(Vec<CategorySeverity>);

    #[async_trait]
    impl ImageClassifier for FixedClassifier {
        async fn analyze_image(&self, _image: &[u8]) -> anyhow::Result<Vec<CategorySeverity>> {
            Ok(self.0.clone())
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl ImageClassifier for FailingClassifier {
        async fn analyze_image(&self, _image: &[u8]) -> anyhow::Result<Vec<CategorySeverity>> {
            anyhow::bail!("503 Service Unavailable")
        }
    }

    struct StalledClassifier;

    #[async_trait]
    impl ImageClassifier for StalledClassifier {
        async fn analyze_image(&self, _image: &[u8]) -> anyhow::Result<Vec<CategorySeverity>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    fn caller() -> Token {
        Token {
            token: "caller".to_string(),
            is_admin: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_success_records_usage() {
        let db = SqliteDatabase::in_memory().unwrap();
        let classifier = FixedClassifier(vec![CategorySeverity::new("Violence", 2)]);

        let result = moderate_image(&classifier, &db, &caller(), b"img", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(result.is_safe);

        let usage = db.recent_usage(10).await.unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].token, "caller");
        assert_eq!(usage[0].endpoint, MODERATE_ENDPOINT);
    }

    #[tokio::test]
    async fn test_classifier_error_records_nothing() {
        let db = SqliteDatabase::in_memory().unwrap();
        let err = moderate_image(&FailingClassifier, &db, &caller(), b"img", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Classifier(ref m) if m.contains("503")));
        assert!(db.recent_usage(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_maps_to_classifier_timeout() {
        let db = SqliteDatabase::in_memory().unwrap();
        let timeout = Duration::from_millis(50);
        let err = moderate_image(&StalledClassifier, &db, &caller(), b"img", timeout)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ClassifierTimeout(d) if d == timeout));
        assert!(db.recent_usage(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_severity_records_nothing() {
        let db = SqliteDatabase::in_memory().unwrap();
        let classifier = FixedClassifier(vec![CategorySeverity::new("Hate", 12)]);
        let err = moderate_image(&classifier, &db, &caller(), b"img", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidSeverity { .. }));
        assert!(db.recent_usage(10).await.unwrap().is_empty());
    }
}
