use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub const DEFAULT_CHECKOUT_SCRIPT_URL: &str = "https://checkout.razorpay.com/v1/checkout.js";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("payment script request failed: {0}")]
    Network(String),
    #[error("payment script returned status {0}")]
    Status(u16),
}

/// Loads the provider's checkout script once per page.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    fn is_loaded(&self) -> bool;
    async fn load(&self) -> Result<(), ScriptError>;
}

/// Fetches the script over HTTP and remembers a successful load.
pub struct HttpScriptLoader {
    url: String,
    client: reqwest::Client,
    loaded: OnceCell<()>,
}

impl HttpScriptLoader {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.into(),
            client,
            loaded: OnceCell::new(),
        }
    }
}

#[async_trait]
impl ScriptLoader for HttpScriptLoader {
    fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    async fn load(&self) -> Result<(), ScriptError> {
        // Concurrent callers share one fetch; a failure leaves the cell empty for retry.
        self.loaded
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .get(&self.url)
                    .send()
                    .await
                    .map_err(|e| ScriptError::Network(e.to_string()))?;
                if !response.status().is_success() {
                    warn!(status = response.status().as_u16(), url = %self.url, "checkout script unavailable");
                    return Err(ScriptError::Status(response.status().as_u16()));
                }
                info!(url = %self.url, "checkout script loaded");
                Ok(())
            })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn loads_once_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/checkout.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("/* js */"))
            .expect(1)
            .mount(&server)
            .await;

        let loader = HttpScriptLoader::new(
            format!("{}/v1/checkout.js", server.uri()),
            Duration::from_secs(5),
        );
        assert!(!loader.is_loaded());
        loader.load().await.unwrap();
        loader.load().await.unwrap();
        assert!(loader.is_loaded());
    }

    #[tokio::test]
    async fn failure_can_be_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let loader = HttpScriptLoader::new(server.uri(), Duration::from_secs(5));
        assert_eq!(loader.load().await, Err(ScriptError::Status(503)));
        assert!(!loader.is_loaded());
        assert!(loader.load().await.is_ok());
        assert!(loader.is_loaded());
    }
}
