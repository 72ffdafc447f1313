//! HTTP client for the LLM proxy.
//!
//! The proxy speaks the Anthropic messages API (`POST /v1/messages`) for every
//! model it fronts, but the bodies it returns differ per model family; see
//! [`crate::normalize`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use pleasance_core::config::ProxyConfig;

use crate::normalize::extract_text;
use crate::traits::{CompletionBackend, CompletionParams};

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ProxyMessage<'a>; 1],
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Serialize)]
struct ProxyMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// ─────────────────────────────────────────────
// ProxyClient
// ─────────────────────────────────────────────

/// Completion client for the LLM proxy.
///
/// Holds one pooled `reqwest::Client`; share the `ProxyClient` behind an `Arc`
/// so concurrent batch items reuse its connections.
pub struct ProxyClient {
    client: reqwest::Client,
    /// Proxy base URL, without trailing slash.
    base_url: String,
    /// Opaque credential forwarded as a bearer token.
    api_key: Option<String>,
    call_timeout: Duration,
    health_timeout: Duration,
}

impl std::fmt::Debug for ProxyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyClient")
            .field("base_url", &self.base_url)
            .field("call_timeout", &self.call_timeout)
            .field("health_timeout", &self.health_timeout)
            .finish()
    }
}

impl ProxyClient {
    /// Create a client from the proxy section of the config.
    pub fn new(config: &ProxyConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;

        Ok(ProxyClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            call_timeout: Duration::from_secs(config.call_timeout_secs.max(1)),
            health_timeout: Duration::from_secs(config.health_timeout_secs.max(1)),
        })
    }

    /// Override the per-call ceiling taken from `proxy.call_timeout_secs`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    /// Issue the request; every failure comes back as a reason string.
    async fn try_call(
        &self,
        prompt: &str,
        model: &str,
        params: &CompletionParams,
    ) -> Result<String, String> {
        let body = MessagesRequest {
            model,
            max_tokens: params.max_tokens,
            messages: [ProxyMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            system: params.system.as_deref(),
        };

        let mut request = self
            .client
            .post(self.messages_url())
            .timeout(self.call_timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                format!("timed out after {}s", self.call_timeout.as_secs())
            } else {
                format!("request failed: {e}")
            }
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!(
                "status {}: {}",
                status,
                pleasance_core::utils::truncate_string(&error_text, 200)
            ));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))?;

        extract_text(&raw).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl CompletionBackend for ProxyClient {
    async fn call_model(
        &self,
        prompt: &str,
        model: &str,
        params: &CompletionParams,
    ) -> Option<String> {
        debug!(
            model = %model,
            max_tokens = params.max_tokens,
            prompt_chars = prompt.len(),
            "Calling model through proxy"
        );

        match self.try_call(prompt, model, params).await {
            Ok(text) => {
                debug!(model = %model, chars = text.len(), "Model responded");
                Some(text)
            }
            Err(reason) => {
                warn!(model = %model, reason = %reason, "Model call failed");
                None
            }
        }
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(resp) => {
                let healthy = resp.status() == reqwest::StatusCode::OK;
                debug!(status = %resp.status(), healthy, "Proxy health probe");
                healthy
            }
            Err(e) => {
                warn!(error = %e, "Proxy health probe failed");
                false
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_client(base_url: &str) -> ProxyClient {
        let config = ProxyConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        };
        ProxyClient::new(&config).unwrap()
    }

    // ── Unit tests ──

    #[test]
    fn test_urls_trailing_slash() {
        let client = make_client("https://proxy.example.com/");
        assert_eq!(client.messages_url(), "https://proxy.example.com/v1/messages");
        assert_eq!(client.health_url(), "https://proxy.example.com/health");
    }

    #[test]
    fn test_request_body_shape() {
        let params = CompletionParams::default()
            .with_max_tokens(1024)
            .with_temperature(0.5);
        let body = MessagesRequest {
            model: "m1",
            max_tokens: params.max_tokens,
            messages: [ProxyMessage {
                role: "user",
                content: "hi",
            }],
            temperature: params.temperature,
            system: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "model": "m1",
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": "hi"}],
                "temperature": 0.5
            })
        );
    }

    // ── Integration tests with mock server ──

    #[tokio::test]
    async fn test_call_model_anthropic_shape() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_json(json!({
                "model": "claude-sonnet-4-5",
                "max_tokens": 2048,
                "messages": [{"role": "user", "content": "Say hi"}],
                "temperature": 0.7,
                "system": "Be brief."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "hi"}]
            })))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        let params = CompletionParams::default().with_system("Be brief.");
        let text = client.call_model("Say hi", "claude-sonnet-4-5", &params).await;
        assert_eq!(text.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_call_model_sends_bearer_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("Authorization", "Bearer proxy-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "ok"})))
            .mount(&server)
            .await;

        let config = ProxyConfig {
            base_url: server.uri(),
            api_key: Some("proxy-key".into()),
            ..Default::default()
        };
        let client = ProxyClient::new(&config).unwrap();
        let text = client
            .call_model("x", "gemini-2.5-flash", &CompletionParams::default())
            .await;
        assert_eq!(text.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_call_model_non_200_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "Rate limit exceeded"}
            })))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        assert!(client
            .call_model("x", "m", &CompletionParams::default())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_call_model_unrecognized_shape_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": "x"})))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        assert!(client
            .call_model("x", "m", &CompletionParams::default())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_call_model_non_json_body_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>tunnel</html>"))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        assert!(client
            .call_model("x", "m", &CompletionParams::default())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_call_model_timeout_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"text": "late"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = make_client(&server.uri()).with_call_timeout(Duration::from_millis(50));
        assert!(client
            .call_model("x", "m", &CompletionParams::default())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_call_model_network_error_is_none() {
        // Point to a port that's not listening
        let client = make_client("http://127.0.0.1:1");
        assert!(client
            .call_model("x", "m", &CompletionParams::default())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_health_check_idempotent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        assert!(client.health_check().await);
        assert!(client.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_unhealthy() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(!make_client(&server.uri()).health_check().await);
        assert!(!make_client("http://127.0.0.1:1").health_check().await);
    }
}
