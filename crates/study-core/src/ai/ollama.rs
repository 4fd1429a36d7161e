use std::time::Instant;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::GatewayError;
use crate::config::GatewayConfig;

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    #[allow(dead_code)]
    done: bool,
}

#[derive(Deserialize)]
struct OllamaErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    models: Vec<OllamaModel>,
}

/// Client for one model on an Ollama server.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
}

impl OllamaClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(GatewayError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Same server and settings, different model.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Send one prompt and wait for the whole answer.
    pub async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.max_tokens.map(|num_predict| OllamaOptions { num_predict }),
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.chars().count(), "sending prompt");
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(&self.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            tracing::warn!(%status, %message, "ollama rejected prompt");
            return Err(GatewayError::Status { status, message });
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::from_transport(&self.base_url, e))?;

        tracing::debug!(
            model = %self.model,
            response_chars = ollama_response.response.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "received response"
        );

        if ollama_response.response.is_empty() {
            return Err(GatewayError::EmptyResponse);
        }
        Ok(ollama_response.response)
    }

    pub async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(&self.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status, message });
        }

        let models_response: OllamaModelsResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::from_transport(&self.base_url, e))?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }

    pub async fn has_model(&self, name: &str) -> Result<bool, GatewayError> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|m| m == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_config(base_url: &str) -> GatewayConfig {
        GatewayConfig {
            base_url: base_url.to_string(),
            model: "qwen3:1.7b".to_string(),
            max_tokens: None,
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn test_complete_returns_response_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "qwen3:1.7b",
                "prompt": "Explain entropy",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "qwen3:1.7b",
                "response": "  Entropy measures disorder.\n",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&gateway_config(&server.uri())).unwrap();
        let text = client.complete("Explain entropy").await.unwrap();
        assert_eq!(text, "  Entropy measures disorder.\n");
    }

    #[tokio::test]
    async fn test_max_tokens_is_sent_as_num_predict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({ "options": { "num_predict": 2000 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "ok",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = GatewayConfig {
            max_tokens: Some(2000),
            ..gateway_config(&server.uri())
        };
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.complete("hi").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_server_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({ "error": "model 'qwen3:1.7b' not found" })),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::new(&gateway_config(&server.uri())).unwrap();
        let err = client.complete("hi").await.unwrap_err();
        match err {
            GatewayError::Status { status, message } => {
                assert_eq!(status.as_u16(), 404);
                assert_eq!(message, "model 'qwen3:1.7b' not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_response_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "",
                "done": true
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&gateway_config(&server.uri())).unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_malformed_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&gateway_config(&server.uri())).unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "response": "late", "done": true }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = GatewayConfig {
            timeout: Duration::from_millis(200),
            ..gateway_config(&server.uri())
        };
        let client = OllamaClient::new(&config).unwrap();

        let started = Instant::now();
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout { .. }), "got {err}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_connect_error() {
        // Bind and drop a listener to get a local port with nothing behind it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = OllamaClient::new(&gateway_config(&format!("http://127.0.0.1:{port}"))).unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::Connect { .. }), "got {err}");
        assert!(err.to_string().contains("ollama serve"));
    }

    #[tokio::test]
    async fn test_list_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    { "name": "qwen3:1.7b", "size": 1 },
                    { "name": "llama3.2:latest", "size": 2 }
                ]
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&gateway_config(&server.uri())).unwrap();
        assert_eq!(
            client.list_models().await.unwrap(),
            vec!["qwen3:1.7b".to_string(), "llama3.2:latest".to_string()]
        );
        assert!(client.has_model("llama3.2:latest").await.unwrap());
        assert!(!client.has_model("mistral").await.unwrap());
    }

    #[test]
    fn test_with_model_keeps_server() {
        let client = OllamaClient::new(&gateway_config("http://localhost:11434")).unwrap();
        let other = client.with_model("llama3.2:latest");
        assert_eq!(other.model(), "llama3.2:latest");
        assert_eq!(other.base_url(), "http://localhost:11434");
        assert_eq!(client.model(), "qwen3:1.7b");
    }
}
