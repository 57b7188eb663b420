//! Simulated device network for testing without hardware.
//!
//! [`MockDeviceNetwork`] implements [`HttpTransport`] and answers the device
//! API for a set of simulated hosts. Every request is recorded so tests can
//! assert exactly which writes were issued.
//!
//! ```rust,ignore
//! let network = Arc::new(MockDeviceNetwork::new());
//! network.add_device("10.0.5.10", 3);
//! let client = DeviceClient::new(network.clone());
//! ```

use super::transport::{DeviceRequest, HttpResponse, HttpTransport, Method};
use super::{CHANNEL_COMMAND_PATH, CHANNEL_QUERY_PATH, DEVICE_DETAILS_PATH};
use crate::error::{DeviceError, TransportPhase};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;

/// Failure injected for a simulated host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Fail every request as if the connection was refused.
    ConnectionRefused,
    /// Answer every request with this status code and body.
    Status(u16, String),
    /// Answer every request with 200 and this (invalid) body.
    MalformedBody(String),
}

/// A request seen by the mock network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Verb.
    pub method: Method,
    /// Full URL.
    pub url: String,
    /// Host part of the URL.
    pub host: String,
    /// Path part of the URL.
    pub path: String,
    /// Request body.
    pub body: String,
}

#[derive(Debug, Clone)]
struct MockDevice {
    channel: u8,
    details: Option<String>,
    fault: Option<Fault>,
}

#[derive(Debug, Default)]
struct MockState {
    devices: HashMap<String, MockDevice>,
    requests: Vec<RecordedRequest>,
}

/// Simulated fabric of transmitters and receivers.
#[derive(Debug, Default)]
pub struct MockDeviceNetwork {
    state: Mutex<MockState>,
    auto_provision: bool,
}

impl MockDeviceNetwork {
    /// Network with no devices; unknown hosts refuse connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Network where unknown hosts appear on first contact.
    ///
    /// A provisioned device starts on the channel matching its own address
    /// (the fourth octet for IPv4 literals, 0 otherwise).
    pub fn auto_provisioning() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            auto_provision: true,
        }
    }

    /// Add (or reset) a device at `host` tuned to `channel`.
    pub fn add_device(&self, host: &str, channel: u8) {
        self.state.lock().devices.insert(
            host.to_string(),
            MockDevice {
                channel,
                details: None,
                fault: None,
            },
        );
    }

    /// Retune a device, as another controller would.
    pub fn set_channel(&self, host: &str, channel: u8) {
        if let Some(device) = self.state.lock().devices.get_mut(host) {
            device.channel = channel;
        }
    }

    /// Current channel of a device.
    pub fn channel(&self, host: &str) -> Option<u8> {
        self.state.lock().devices.get(host).map(|d| d.channel)
    }

    /// Override the body served by the details endpoint.
    pub fn set_details_body(&self, host: &str, body: impl Into<String>) {
        if let Some(device) = self.state.lock().devices.get_mut(host) {
            device.details = Some(body.into());
        }
    }

    /// Inject a failure for every request to `host`.
    pub fn set_fault(&self, host: &str, fault: Fault) {
        if let Some(device) = self.state.lock().devices.get_mut(host) {
            device.fault = Some(fault);
        }
    }

    /// Remove an injected failure.
    pub fn clear_fault(&self, host: &str) {
        if let Some(device) = self.state.lock().devices.get_mut(host) {
            device.fault = None;
        }
    }

    /// All requests seen so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Channel writes (`POST /cgi-bin/api/command/channel`) sent to `host`.
    pub fn channel_writes(&self, host: &str) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| {
                r.host == host && r.method == Method::Post && r.path == CHANNEL_COMMAND_PATH
            })
            .cloned()
            .collect()
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    fn handle(&self, request: &DeviceRequest) -> Result<HttpResponse, DeviceError> {
        let (host, path) = split_url(&request.url).ok_or_else(|| DeviceError::Transport {
            phase: TransportPhase::BuildRequest,
            url: request.url.clone(),
            source: Box::new(io::Error::new(io::ErrorKind::InvalidInput, "invalid URL")),
        })?;

        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            method: request.method,
            url: request.url.clone(),
            host: host.to_string(),
            path: path.to_string(),
            body: request.body.clone(),
        });

        if self.auto_provision && !state.devices.contains_key(host) {
            let channel = host
                .parse::<Ipv4Addr>()
                .map(|ip| ip.octets()[3])
                .unwrap_or(0);
            state.devices.insert(
                host.to_string(),
                MockDevice {
                    channel,
                    details: None,
                    fault: None,
                },
            );
        }

        let Some(device) = state.devices.get_mut(host) else {
            return Err(refused(&request.url));
        };

        match &device.fault {
            Some(Fault::ConnectionRefused) => return Err(refused(&request.url)),
            Some(Fault::Status(status, body)) => return Ok(response(*status, body.clone())),
            Some(Fault::MalformedBody(body)) => return Ok(response(200, body.clone())),
            None => {}
        }

        let reply = match (request.method, path) {
            (Method::Get, CHANNEL_QUERY_PATH) => {
                response(200, format!("{{\"data\":{}}}", device.channel))
            }
            (Method::Post, CHANNEL_COMMAND_PATH) => match request.body.trim().parse::<u8>() {
                Ok(channel) => {
                    device.channel = channel;
                    response(200, "{\"data\":\"ok\"}".to_string())
                }
                Err(_) => response(400, "{\"data\":\"invalid channel\"}".to_string()),
            },
            (Method::Get, DEVICE_DETAILS_PATH) => {
                let body = device
                    .details
                    .clone()
                    .unwrap_or_else(|| default_details(host));
                response(200, body)
            }
            _ => response(404, "{\"data\":\"not found\"}".to_string()),
        };
        Ok(reply)
    }
}

#[async_trait]
impl HttpTransport for MockDeviceNetwork {
    async fn round_trip(&self, request: &DeviceRequest) -> Result<HttpResponse, DeviceError> {
        tokio::task::yield_now().await;
        self.handle(request)
    }
}

fn split_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("http://")?;
    let slash = rest.find('/').unwrap_or(rest.len());
    let (host, path) = rest.split_at(slash);
    if host.is_empty() {
        return None;
    }
    Some((host, path))
}

fn refused(url: &str) -> DeviceError {
    DeviceError::Transport {
        phase: TransportPhase::Send,
        url: url.to_string(),
        source: Box::new(io::Error::from(io::ErrorKind::ConnectionRefused)),
    }
}

fn response(status: u16, body: String) -> HttpResponse {
    HttpResponse {
        status,
        body: Bytes::from(body),
    }
}

fn default_details(host: &str) -> String {
    serde_json::json!({
        "data": {
            "model": "MOCK-AVIP",
            "firmware": {
                "version": "0.0.0",
                "date": "1970-01-01",
                "update": {"eta": false, "message": "", "progress": false, "result": false, "status": false}
            },
            "network": {
                "ipaddress": host,
                "mac": "00:00:00:00:00:00",
                "mtu": 1500,
                "netmask": "255.255.255.0",
                "speed": "1000Mb/s"
            },
            "status": "mock",
            "time": "",
            "uptime": "0:00"
        }
    })
    .to_string()
}
