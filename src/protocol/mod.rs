//! Device protocol client.
//!
//! Devices expose a small HTTP API under `/cgi-bin/api/`:
//!
//! | Method | Path                          | Body            | Response `data` |
//! |--------|-------------------------------|-----------------|-----------------|
//! | GET    | `/cgi-bin/api/details/channel`| –               | integer channel |
//! | POST   | `/cgi-bin/api/command/channel`| decimal channel | status string   |
//! | GET    | `/cgi-bin/api/details/device` | –               | details object  |
//!
//! [`DeviceClient::execute`] performs one exchange and returns the raw body;
//! the typed helpers decode the envelopes on top of it. There are no retries
//! at this layer.

pub mod envelope;
pub mod mock;
pub mod transport;

pub use mock::{Fault, MockDeviceNetwork, RecordedRequest};
pub use transport::{
    DeviceRequest, HttpResponse, HttpTransport, Method, ReqwestTransport, DEFAULT_TIMEOUT,
};

use crate::addressing::Channel;
use crate::details::DeviceDetails;
use crate::error::{ConfigError, DeviceError};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Channel query endpoint.
pub const CHANNEL_QUERY_PATH: &str = "/cgi-bin/api/details/channel";

/// Channel command endpoint.
pub const CHANNEL_COMMAND_PATH: &str = "/cgi-bin/api/command/channel";

/// Device details endpoint.
pub const DEVICE_DETAILS_PATH: &str = "/cgi-bin/api/details/device";

/// Issues commands against device HTTP endpoints.
///
/// Cheap to clone; clones share the underlying transport (and its connection
/// pool).
#[derive(Clone)]
pub struct DeviceClient {
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for DeviceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceClient").finish_non_exhaustive()
    }
}

impl DeviceClient {
    /// Client over an arbitrary transport.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Client over HTTP with the given per-exchange timeout.
    pub fn http(timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(timeout)?)))
    }

    /// Perform one request against `http://<address><path>` and return the body.
    ///
    /// Non-2xx responses fail with [`DeviceError::UnexpectedStatus`], which
    /// still carries the body.
    pub async fn execute(
        &self,
        address: &str,
        path: &str,
        body: &str,
        method: Method,
    ) -> Result<Bytes, DeviceError> {
        let request = DeviceRequest {
            method,
            url: format!("http://{}{}", address, path),
            body: body.to_string(),
        };
        tracing::debug!(method = %request.method, url = %request.url, body, "Device request");

        let response = self.transport.round_trip(&request).await?;
        tracing::debug!(
            url = %request.url,
            status = response.status,
            body = %String::from_utf8_lossy(&response.body),
            "Device response"
        );

        if !(200..300).contains(&response.status) {
            return Err(DeviceError::UnexpectedStatus {
                url: request.url,
                status: response.status,
                body: response.body,
            });
        }
        Ok(response.body)
    }

    /// Channel the device at `address` reports.
    pub async fn query_channel(&self, address: &str) -> Result<Channel, DeviceError> {
        let body = self
            .execute(address, CHANNEL_QUERY_PATH, "", Method::Get)
            .await?;
        envelope::decode_channel(&url(address, CHANNEL_QUERY_PATH), body)
    }

    /// Tune the device at `address` to `channel`; returns the device's status text.
    pub async fn command_channel(
        &self,
        address: &str,
        channel: Channel,
    ) -> Result<String, DeviceError> {
        let body = self
            .execute(
                address,
                CHANNEL_COMMAND_PATH,
                &channel.to_string(),
                Method::Post,
            )
            .await?;
        envelope::decode_status(&url(address, CHANNEL_COMMAND_PATH), body)
    }

    /// Details snapshot of the device at `address`.
    pub async fn query_details(&self, address: &str) -> Result<DeviceDetails, DeviceError> {
        let body = self
            .execute(address, DEVICE_DETAILS_PATH, "", Method::Get)
            .await?;
        envelope::decode_details(&url(address, DEVICE_DETAILS_PATH), body)
    }
}

fn url(address: &str, path: &str) -> String {
    format!("http://{}{}", address, path)
}
