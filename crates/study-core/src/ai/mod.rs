pub mod ollama;

pub use ollama::OllamaClient;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("could not reach Ollama at {url}. Make sure Ollama is running with: ollama serve ({source})")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Ollama at {url} did not answer in time")]
    Timeout { url: String },
    #[error("Ollama request failed with status {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },
    #[error("the model returned an empty response")]
    EmptyResponse,
    #[error("unexpected response from Ollama: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("request to Ollama failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl GatewayError {
    /// Classify a transport error from reqwest.
    pub(crate) fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout { url: url.to_string() }
        } else if err.is_connect() {
            GatewayError::Connect { url: url.to_string(), source: err }
        } else if err.is_decode() {
            GatewayError::Decode(err)
        } else {
            GatewayError::Request(err)
        }
    }
}
