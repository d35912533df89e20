//! Provider gateway: sends one signed request and hands back the body.

use std::future::Future;
use std::pin::Pin;
use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Method;
use tracing::{debug, warn};

use crate::signer::SignedRequest;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Future returned by [`Gateway::execute`].
pub type GatewayFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

/// Issues signed provider calls.
///
/// Implementations resolve to `None` when the call fails at the transport
/// level or the provider answers with a non-success status. Callers turn that
/// absence into a failed step; nothing is retried.
pub trait Gateway: Send + Sync {
    /// Sends `request` and returns the response body.
    fn execute<'a>(&'a self, request: &'a SignedRequest) -> GatewayFuture<'a>;
}

/// Gateway backed by a shared `reqwest` client.
#[derive(Clone, Debug, Default)]
pub struct HttpGateway {
    client: Option<reqwest::Client>,
}

impl HttpGateway {
    /// Creates a gateway using the process-wide client.
    #[must_use]
    pub const fn new() -> Self {
        Self { client: None }
    }

    /// Creates a gateway using a caller-supplied client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    fn client(&self) -> &reqwest::Client {
        self.client.as_ref().unwrap_or(&*HTTP_CLIENT)
    }

    async fn send(&self, request: &SignedRequest) -> Option<String> {
        let Ok(method) = Method::from_bytes(request.method.as_bytes()) else {
            warn!(method = %request.method, "unsupported HTTP method");
            return None;
        };

        let mut builder = self.client().request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(url = %request.url, error = %err, "provider request failed");
                return None;
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => {
                warn!(url = %request.url, error = %err, "provider response unreadable");
                return None;
            }
        };
        if !status.is_success() {
            warn!(url = %request.url, status = status.as_u16(), body = %text, "provider rejected request");
            return None;
        }
        debug!(url = %request.url, bytes = text.len(), "provider response received");
        Some(text)
    }
}

impl Gateway for HttpGateway {
    fn execute<'a>(&'a self, request: &'a SignedRequest) -> GatewayFuture<'a> {
        Box::pin(self.send(request))
    }
}
