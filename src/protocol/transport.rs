//! HTTP transport for device commands.
//!
//! The [`HttpTransport`] trait is the seam between the protocol client and the
//! network, so tests and mock configurations can swap in
//! [`MockDeviceNetwork`](super::mock::MockDeviceNetwork).

use crate::error::{ConfigError, DeviceError, TransportPhase};
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::time::Duration;

/// Default bound on a single request/response exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP verbs used by the device API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Reads (`/cgi-bin/api/details/...`).
    Get,
    /// Writes (`/cgi-bin/api/command/...`).
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// One request to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    /// Verb.
    pub method: Method,
    /// Full URL (`http://<address><path>`).
    pub url: String,
    /// Request body; empty for reads.
    pub body: String,
}

/// Status and body of a completed exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Entire response body.
    pub body: Bytes,
}

/// Performs a single HTTP exchange.
///
/// Implementations report failures as [`DeviceError::Transport`] with the
/// phase that failed. Status codes are *not* interpreted here.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` and read the whole response.
    async fn round_trip(&self, request: &DeviceRequest) -> Result<HttpResponse, DeviceError>;
}

/// Transport backed by a pooled [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport whose exchanges are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport_error(
    phase: TransportPhase,
    url: &str,
) -> impl FnOnce(reqwest::Error) -> DeviceError + '_ {
    move |e| DeviceError::Transport {
        phase,
        url: url.to_string(),
        source: Box::new(e),
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn round_trip(&self, request: &DeviceRequest) -> Result<HttpResponse, DeviceError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let built = self
            .client
            .request(method, &request.url)
            .body(request.body.clone())
            .build()
            .map_err(transport_error(TransportPhase::BuildRequest, &request.url))?;

        let response = self
            .client
            .execute(built)
            .await
            .map_err(transport_error(TransportPhase::Send, &request.url))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(transport_error(TransportPhase::ReadBody, &request.url))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response on an ephemeral port.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn test_reads_full_body() {
        let addr = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\n{\"data\":42}",
        )
        .await;
        let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap();

        let response = transport
            .round_trip(&DeviceRequest {
                method: Method::Get,
                url: format!("http://{}/cgi-bin/api/details/channel", addr),
                body: String::new(),
            })
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_ref(), b"{\"data\":42}");
    }

    #[tokio::test]
    async fn test_connection_refused_is_send_phase() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
        let url = format!("http://{}/cgi-bin/api/details/channel", addr);
        let err = transport
            .round_trip(&DeviceRequest {
                method: Method::Get,
                url: url.clone(),
                body: String::new(),
            })
            .await
            .unwrap_err();

        match err {
            DeviceError::Transport {
                phase,
                url: failed_url,
                ..
            } => {
                assert_eq!(phase, TransportPhase::Send);
                assert_eq!(failed_url, url);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_url_is_build_phase() {
        let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap();
        let err = transport
            .round_trip(&DeviceRequest {
                method: Method::Post,
                url: "http://[not a host/cgi-bin/api/command/channel".into(),
                body: "42".into(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeviceError::Transport {
                phase: TransportPhase::BuildRequest,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_truncated_body_is_read_phase() {
        let addr = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n{\"data\":",
        )
        .await;
        let transport = ReqwestTransport::from_client(reqwest::Client::new());
        let url = format!("http://{}/cgi-bin/api/details/device", addr);

        let err = transport
            .round_trip(&DeviceRequest {
                method: Method::Get,
                url: url.clone(),
                body: String::new(),
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("during body read"));
        match err {
            DeviceError::Transport {
                phase,
                url: failed_url,
                ..
            } => {
                assert_eq!(phase, TransportPhase::ReadBody);
                assert_eq!(failed_url, url);
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }
}
