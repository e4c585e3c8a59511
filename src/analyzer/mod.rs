//! Vision-language fallback analyzer.
//!
//! Consulted when the offline classifier is unavailable or unconfident.
//! Sends the image plus a structured instruction to a generative vision
//! model and parses its JSON response into an [`IssueAnalysis`]. By design
//! this path produces no numeric confidence; only the classifier does.

mod types;

pub use types::{
    Candidate, CandidateContent, Content, GenerateRequest, GenerateResponse, InlineData, Part,
};

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{AnalyzerConfig, RequestConfig};
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::prompts::{ANALYSIS_INSTRUCTIONS, ANALYSIS_TASK};
use crate::storage::Priority;

/// Required fields in the analyzer's JSON response.
const REQUIRED_FIELDS: [&str; 5] = [
    "issue_category",
    "issue_details",
    "priority",
    "department",
    "complaint_description",
];

/// Structured analysis produced by the vision-language model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueAnalysis {
    pub issue_category: String,
    pub issue_details: String,
    pub priority: Priority,
    pub department: String,
    pub complaint_description: String,
}

/// Anything that can analyze a complaint image with a vision-language model.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    /// Analyze raw image bytes, optionally guided by the user's free text.
    async fn analyze(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        user_text: Option<&str>,
    ) -> AnalyzerResult<IssueAnalysis>;
}

/// Client for the Gemini generateContent API.
#[derive(Clone)]
pub struct GeminiAnalyzer {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    request_config: RequestConfig,
}

impl GeminiAnalyzer {
    /// Create a new analyzer client.
    ///
    /// A missing API key is allowed here; calls will fail with
    /// [`AnalyzerError::Unavailable`] until one is configured.
    pub fn new(config: &AnalyzerConfig, request_config: RequestConfig) -> AnalyzerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(AnalyzerError::Http)?;

        if config.api_key.is_none() {
            warn!("GEMINI_API_KEY not set, analyzer will report unavailable");
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the full analysis prompt, embedding the user's context.
    fn build_prompt(user_text: Option<&str>) -> String {
        let mut prompt = String::from(ANALYSIS_INSTRUCTIONS);
        if let Some(text) = user_text.filter(|t| !t.trim().is_empty()) {
            prompt.push_str(&format!("ADDITIONAL USER CONTEXT: \"{}\"\n\n", text));
        }
        prompt.push_str(ANALYSIS_TASK);
        prompt
    }

    async fn execute_request(
        &self,
        url: &str,
        request: &GenerateRequest,
    ) -> AnalyzerResult<String> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalyzerError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    AnalyzerError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let body: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| AnalyzerError::Api {
                    status: status.as_u16(),
                    message: format!("failed to decode response body: {e}"),
                })?;

        body.first_text().ok_or_else(|| AnalyzerError::Api {
            status: status.as_u16(),
            message: "response contains no candidate text".to_string(),
        })
    }
}

#[async_trait]
impl VisionAnalyzer for GeminiAnalyzer {
    async fn analyze(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        user_text: Option<&str>,
    ) -> AnalyzerResult<IssueAnalysis> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            AnalyzerError::Unavailable {
                message: "GEMINI_API_KEY not configured".to_string(),
            }
        })?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );

        let prompt = Self::build_prompt(user_text);
        let request = GenerateRequest::new(
            prompt,
            BASE64_STANDARD.encode(image_bytes),
            mime_type.to_string(),
        );

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    model = %self.model,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying vision analysis request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, &request).await {
                Ok(text) => {
                    let latency = start.elapsed();
                    info!(
                        model = %self.model,
                        latency_ms = latency.as_millis(),
                        "Vision analysis succeeded"
                    );
                    return parse_analysis_response(&text);
                }
                // Client-side API errors will not improve on retry.
                Err(e @ AnalyzerError::Api { status, .. }) if status < 500 => {
                    error!(model = %self.model, error = %e, "Vision analysis rejected");
                    return Err(e);
                }
                Err(e) => {
                    let latency = start.elapsed();
                    error!(
                        model = %self.model,
                        error = %e,
                        latency_ms = latency.as_millis(),
                        retry = retries,
                        "Vision analysis request failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(AnalyzerError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Parse and validate the model's response text.
///
/// Strips code fences, locates the first top-level JSON object by brace
/// matching, and checks that all required fields are present with a valid
/// priority literal. Failures carry the raw response for diagnostics.
pub fn parse_analysis_response(text: &str) -> AnalyzerResult<IssueAnalysis> {
    let stripped = strip_code_fences(text);

    let json_text = extract_json_object(&stripped).ok_or_else(|| AnalyzerError::Parse {
        message: "no JSON object found in response".to_string(),
        raw: text.to_string(),
    })?;

    let value: serde_json::Value =
        serde_json::from_str(json_text).map_err(|e| AnalyzerError::Parse {
            message: format!("invalid JSON: {e}"),
            raw: text.to_string(),
        })?;

    for field in REQUIRED_FIELDS {
        if value.get(field).and_then(|v| v.as_str()).is_none() {
            return Err(AnalyzerError::Parse {
                message: format!("missing required field: {field}"),
                raw: text.to_string(),
            });
        }
    }

    let priority_raw = value["priority"].as_str().unwrap_or_default();
    let priority: Priority = priority_raw.parse().map_err(|_| AnalyzerError::Parse {
        message: format!("invalid priority: {priority_raw}"),
        raw: text.to_string(),
    })?;

    debug!(category = %value["issue_category"], "Analysis response parsed");

    Ok(IssueAnalysis {
        issue_category: value["issue_category"].as_str().unwrap_or_default().to_string(),
        issue_details: value["issue_details"].as_str().unwrap_or_default().to_string(),
        priority,
        department: value["department"].as_str().unwrap_or_default().to_string(),
        complaint_description: value["complaint_description"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
    })
}

/// Remove markdown code-fence wrapping from a model response.
fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Locate the first top-level JSON object by brace matching, honoring
/// string literals and escapes.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
