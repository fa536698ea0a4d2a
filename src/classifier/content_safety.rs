// Azure AI Content Safety implementation.
//
// Sends the image as base64 to the `image:analyze` REST operation and returns
// the per-category severities. For images the service reports Hate, SelfHarm,
// Sexual and Violence on its four-level scale (0, 2, 4, 6).
//
// API docs: https://learn.microsoft.com/azure/ai-services/content-safety/

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::{CategorySeverity, ImageClassifier};

pub const DEFAULT_API_VERSION: &str = "2023-10-01";

/// Azure Content Safety image classifier.
pub struct ContentSafetyClient {
    client: Client,
    endpoint: String,
    api_key: String,
    api_version: String,
}

impl ContentSafetyClient {
    /// Create a client for the given resource endpoint and subscription key.
    pub fn new(endpoint: &str, api_key: &str, api_version: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_version: api_version.to_string(),
        }
    }

    /// Whether both endpoint and key are present.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.api_key.is_empty()
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/contentsafety/image:analyze?api-version={}",
            self.endpoint, self.api_version
        )
    }
}

#[async_trait]
impl ImageClassifier for ContentSafetyClient {
    async fn analyze_image(&self, image: &[u8]) -> Result<Vec<CategorySeverity>> {
        if !self.is_configured() {
            anyhow::bail!("Azure Content Safety credentials not configured");
        }

        let request = AnalyzeImageRequest {
            image: ImageData {
                content: STANDARD.encode(image),
            },
        };

        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to call Content Safety API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{}", describe_error(status, &body));
        }

        let result: AnalyzeImageResponse = response
            .json()
            .await
            .context("Failed to parse Content Safety API response")?;

        debug!(
            categories = result.categories_analysis.len(),
            image_bytes = image.len(),
            "Analyzed image"
        );

        into_severities(result)
    }
}

/// The service schema marks `severity` optional. A category without one is
/// rejected rather than scored.
fn into_severities(response: AnalyzeImageResponse) -> Result<Vec<CategorySeverity>> {
    response
        .categories_analysis
        .into_iter()
        .map(|c| match c.severity {
            Some(severity) => Ok(CategorySeverity::new(c.category, severity)),
            None => Err(anyhow::anyhow!(
                "no severity reported for category '{}'",
                c.category
            )),
        })
        .collect()
}

/// Build a readable message from a non-2xx response, preferring the
/// service's own `error.message` when the body carries one.
fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => format!("{} ({}): {}", status, err.error.code, err.error.message),
        Err(_) => format!("{status}: {body}"),
    }
}

// --- Content Safety request/response types ---

#[derive(Serialize)]
struct AnalyzeImageRequest {
    image: ImageData,
}

#[derive(Serialize)]
struct ImageData {
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeImageResponse {
    #[serde(default)]
    categories_analysis: Vec<CategoryAnalysis>,
}

#[derive(Deserialize)]
struct CategoryAnalysis {
    category: String,
    severity: Option<i64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}
