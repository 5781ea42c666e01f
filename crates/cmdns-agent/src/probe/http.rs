//! HTTP probe strategy

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;

use cmdns_core::traits::Resolver;
use cmdns_core::ProbeError;

/// Probes a domain by fetching `http://<domain>/dot.png`
///
/// Any response counts as success; the status code is not inspected. Only a
/// transport-level failure fails the probe.
pub struct HttpResolver {
    client: reqwest::Client,
}

impl HttpResolver {
    /// Create a resolver whose requests give up after `timeout`
    ///
    /// Requests always go straight to the looked-up host. `HTTP_PROXY` and
    /// friends are ignored since a proxy would resolve the name on the
    /// client's behalf and the lookup would no longer come from this network.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }

    /// URL fetched for `domain`
    pub fn probe_url(domain: &str) -> String {
        format!("http://{}/dot.png", domain)
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    fn strategy(&self) -> &'static str {
        "http"
    }

    async fn resolve(&self, domain: &str) -> Result<(), ProbeError> {
        let url = Self::probe_url(domain);
        match self.client.get(&url).send().await {
            Ok(response) => {
                tracing::debug!("GET {} -> {}", url, response.status());
                Ok(())
            }
            Err(e) => Err(ProbeError::Request(error_chain(&e))),
        }
    }
}

/// Join an error with its sources, `outer: inner: root`
fn error_chain(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_probe_url() {
        assert_eq!(
            HttpResolver::probe_url("abc.example.net"),
            "http://abc.example.net/dot.png"
        );
    }

    #[tokio::test]
    async fn test_any_status_is_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let n = stream.read(&mut buf).await.unwrap();
            assert!(String::from_utf8_lossy(&buf[..n]).starts_with("GET /dot.png"));
            stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let resolver = HttpResolver::new(Duration::from_secs(5)).unwrap();
        resolver.resolve(&addr.to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let resolver = HttpResolver::new(Duration::from_secs(5)).unwrap();
        let err = resolver.resolve(&addr.to_string()).await.unwrap_err();
        let ProbeError::Request(text) = err else {
            panic!("Expected request error");
        };
        assert!(!text.is_empty());
        assert!(text.contains("dot.png"), "{text}");
    }
}
