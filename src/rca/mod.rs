//! Synchronous call-out to an external text-completion service for
//! root-cause analysis. Targets the Gemini `generateContent` REST endpoint
//! directly over `reqwest`, since no Gemini SDK crate is available —
//! mirrors the original's `google.generativeai` usage, translated to a
//! plain HTTP call in the teacher's `reqwest`-everywhere idiom.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::RcaConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RcaReport {
    pub root_cause: String,
    pub suggested_fixes: Vec<String>,
    pub risk_prediction: String,
    pub confidence: f64,
}

impl RcaReport {
    fn degraded(reason: impl std::fmt::Display) -> Self {
        Self {
            root_cause: format!("Analysis failed: {reason}"),
            suggested_fixes: Vec::new(),
            risk_prediction: "N/A".to_string(),
            confidence: 0.0,
        }
    }
}

pub struct RcaClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl RcaClient {
    pub fn new(config: &RcaConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(
                env_var = %config.api_key_env,
                "RCA API key not set, root-cause analysis disabled"
            );
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client configuration is always valid");
        Self {
            client,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.clone(),
        }
    }

    /// Whether credentials are configured. The `/api/rca/{trace_id}`
    /// handler checks this *before* calling [`Self::analyze`] and returns
    /// HTTP 503 directly when false.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_prompt(trace_id: &str, context: &serde_json::Value) -> String {
        format!(
            "You are analyzing a distributed trace anomaly.\n\
             Trace ID: {trace_id}\n\
             Forensic context: {context}\n\n\
             Identify the likely root cause of this anomaly.\n\
             FORMAT YOUR RESPONSE AS STRICT JSON with exactly these keys:\n\
             root_cause (string, 20 words or fewer), \
             suggested_fixes (array of strings), \
             risk_prediction (one sentence), \
             confidence (float between 0 and 1)."
        )
    }

    fn strip_markdown_fence(text: &str) -> &str {
        let text = text.trim();
        let text = text.strip_prefix("```json").unwrap_or(text);
        let text = text.strip_prefix("```").unwrap_or(text);
        text.strip_suffix("```").unwrap_or(text).trim()
    }

    /// Run the analysis. Never fails: any transport, auth, or parse problem
    /// yields a degraded report instead of propagating an error.
    pub async fn analyze(&self, trace_id: &str, context: &serde_json::Value) -> RcaReport {
        let Some(api_key) = &self.api_key else {
            return RcaReport::degraded("RCA API key not configured");
        };

        let prompt = Self::build_prompt(trace_id, context);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );

        let response = match self
            .client
            .post(&url)
            .json(&json!({"contents": [{"parts": [{"text": prompt}]}]}))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return RcaReport::degraded(e),
        };

        let body: serde_json::Value = match response.json().await {
            Ok(b) => b,
            Err(e) => return RcaReport::degraded(e),
        };

        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default();

        match serde_json::from_str::<RcaReport>(Self::strip_markdown_fence(text)) {
            Ok(report) => report,
            Err(e) => RcaReport::degraded(e),
        }
    }
}
