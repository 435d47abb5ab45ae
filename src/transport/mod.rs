//! HTTP transport for the CKAN action API
//!
//! A [`Transport`] performs exactly one network attempt per call and never
//! returns a raw HTTP or parse error: every outcome is folded into a
//! [`CatalogResponse`]. Retrying is left to callers.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::query::{CatalogRequest, Method};

pub mod envelope;

/// Outcome of one catalog call
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogResponse {
    Success(Value),
    Failure(ClientError),
}

impl CatalogResponse {
    pub fn into_result(self) -> Result<Value> {
        match self {
            CatalogResponse::Success(value) => Ok(value),
            CatalogResponse::Failure(err) => Err(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CatalogResponse::Success(_))
    }
}

/// Body of a resource download, chunk by chunk
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Seam between the client and the network
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one action call
    async fn call(&self, request: &CatalogRequest) -> CatalogResponse;

    /// Open a streaming GET on an arbitrary resource URL
    async fn fetch(&self, url: &str) -> Result<ByteStream>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = config.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClientError::validation(
                "base_url",
                format!("must be an http(s) URL, got `{}`", config.base_url),
            ));
        }

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn map_error(&self, err: reqwest::Error) -> ClientError {
        classify(err, self.config.timeout)
    }
}

fn classify(err: reqwest::Error, timeout: Duration) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout(timeout)
    } else {
        ClientError::Transport(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: &CatalogRequest) -> CatalogResponse {
        let url = self.config.action_url(request.action().name());
        tracing::debug!(action = %request.action(), %url, "calling catalog");

        let builder = match request.method() {
            Method::Get => self.http.get(&url).query(&request.query_pairs()),
            Method::Post => self.http.post(&url).json(&request.json_body()),
        };

        // the whole exchange, body included, is bounded by the timeout
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        match tokio::time::timeout(self.config.timeout, exchange).await {
            Ok(Ok((status, body))) => {
                let decoded = envelope::decode(status, &body);
                if let CatalogResponse::Failure(ClientError::Protocol(msg)) = &decoded {
                    tracing::warn!(action = %request.action(), status, "bad envelope: {}", msg);
                }
                decoded
            }
            Ok(Err(e)) => CatalogResponse::Failure(self.map_error(e)),
            Err(_) => CatalogResponse::Failure(ClientError::Timeout(self.config.timeout)),
        }
    }

    async fn fetch(&self, url: &str) -> Result<ByteStream> {
        tracing::debug!(%url, "opening download");
        let response = tokio::time::timeout(self.config.timeout, self.http.get(url).send())
            .await
            .map_err(|_| ClientError::Timeout(self.config.timeout))?
            .map_err(|e| self.map_error(e))?;

        if !response.status().is_success() {
            return Err(ClientError::Transport(format!(
                "failed to download {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let timeout = self.config.timeout;
        Ok(response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| classify(e, timeout)))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::query::Action;

    #[test]
    fn rejects_non_http_base_url() {
        let err = HttpTransport::new(ClientConfig::new("ftp://example.org")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_failure() {
        // nothing listens on port 9 (discard) on the loopback interface
        let config = ClientConfig::new("http://127.0.0.1:9").with_timeout(Duration::from_secs(5));
        let transport = HttpTransport::new(config).unwrap();
        let response = transport
            .call(&CatalogRequest::new(Action::StatusShow))
            .await;
        match response {
            CatalogResponse::Failure(err) => assert!(err.is_transport(), "got {:?}", err),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        // accepts the connection, then never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let config = ClientConfig::new(format!("http://{}", addr))
            .with_timeout(Duration::from_millis(200));
        let transport = HttpTransport::new(config).unwrap();
        let response = transport
            .call(&CatalogRequest::new(Action::StatusShow))
            .await;
        server.abort();

        match response {
            CatalogResponse::Failure(err) => {
                assert_eq!(err.kind(), ErrorKind::Timeout, "got {:?}", err);
                assert!(err.is_transport());
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    /// Answers one request with `body` and hands back the request head
    async fn answer_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // read the head and any body before replying
            let mut received = Vec::new();
            let mut chunk = [0u8; 8192];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                received.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if received.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let head = String::from_utf8_lossy(&received).to_string();
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            head
        });
        (base, handle)
    }

    #[tokio::test]
    async fn short_request_goes_out_as_get() {
        let (base, server) = answer_once(r#"{"success": true, "result": true}"#).await;
        let transport = HttpTransport::new(ClientConfig::new(base)).unwrap();
        let response = transport.call(&CatalogRequest::new(Action::SiteRead)).await;
        assert_eq!(response, CatalogResponse::Success(Value::Bool(true)));

        let head = server.await.unwrap();
        assert!(head.starts_with("GET /api/3/action/site_read"), "{}", head);
    }

    #[tokio::test]
    async fn oversized_request_goes_out_as_post() {
        let (base, server) =
            answer_once(r#"{"success": true, "result": {"count": 0, "results": []}}"#).await;
        let transport = HttpTransport::new(ClientConfig::new(base)).unwrap();
        let long_fq = "tags:x OR ".repeat(300);
        let request = CatalogRequest::new(Action::PackageSearch).param("fq", long_fq.as_str());
        assert_eq!(request.method(), Method::Post);

        let response = transport.call(&request).await;
        assert!(response.is_success(), "{:?}", response);
        let head = server.await.unwrap();
        assert!(head.starts_with("POST /api/3/action/package_search "), "{}", head);
        assert!(!head.contains("fq="));
    }

    #[test]
    fn into_result_keeps_kind() {
        let failure = CatalogResponse::Failure(ClientError::protocol("bad"));
        assert!(!failure.is_success());
        assert_eq!(failure.into_result().unwrap_err().kind(), ErrorKind::Protocol);
    }
}
