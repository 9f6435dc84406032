//! HTTP JSON translation backend.
//!
//! Posts one JSON document per request to a configurable endpoint and
//! expects `{"translation": "..."}` back. This is the seam for any
//! service-shaped machine-translation deployment; the orchestrator owns
//! retries, timeouts, and rate limiting, so this client stays thin.

use crate::error::{BabelsbergError, Result};
use crate::source::{TranslationBackend, TranslationRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    text: &'a str,
    target_language: &'a str,
    item_type: &'a str,
    context_before: &'a str,
    context_after: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    translation: String,
}

/// Translation backend speaking a minimal JSON protocol over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    endpoint: String,
    model_name: String,
}

impl HttpBackend {
    pub fn new(endpoint: impl Into<String>, model_name: impl Into<String>) -> Self {
        HttpBackend {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl TranslationBackend for HttpBackend {
    async fn translate(&self, request: TranslationRequest<'_>) -> Result<String> {
        let body = WireRequest {
            text: request.text,
            target_language: request.target_language,
            item_type: request.item_type,
            context_before: request.context_before,
            context_after: request.context_after,
            model: request.model,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| BabelsbergError::translation(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(BabelsbergError::translation(format!(
                "backend returned {}",
                response.status()
            )));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| BabelsbergError::translation(format!("invalid response body: {e}")))?;
        Ok(parsed.translation)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
