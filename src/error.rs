//! Error types for matrix control operations.
//!
//! Failures are split in two layers:
//!
//! - [`DeviceError`] says *what* went wrong: address resolution, the HTTP
//!   exchange itself, an unexpected status code, or a body that did not decode.
//! - [`MatrixError`] says *where*: it wraps a [`DeviceError`] with the
//!   [`Operation`] that was running and the address it targeted.
//!
//! Error kinds that originate from the device keep the raw response body, so a
//! caller can tell "device unreachable" from "device replied with something we
//! don't understand" and still log what the device actually sent.
//!
//! ```rust,ignore
//! match receiver.current_source(&ctx).await {
//!     Err(e) if e.is_transport() => tracing::warn!("{} is offline: {}", e.target, e),
//!     Err(e) => return Err(e.into()),
//!     Ok(sources) => render(sources),
//! }
//! ```

use bytes::Bytes;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

/// Boxed error used as the source of transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias for results of matrix operations.
pub type MatrixResult<T> = std::result::Result<T, MatrixError>;

// =============================================================================
// Transport phases
// =============================================================================

/// Phase of an HTTP exchange in which a transport failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPhase {
    /// The request could not be constructed (bad URL, bad method).
    BuildRequest,
    /// Connecting, sending or waiting for response headers failed.
    Send,
    /// The response body could not be read to completion.
    ReadBody,
}

impl fmt::Display for TransportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportPhase::BuildRequest => "request construction",
            TransportPhase::Send => "send",
            TransportPhase::ReadBody => "body read",
        };
        write!(f, "{}", label)
    }
}

// =============================================================================
// Device errors
// =============================================================================

/// What went wrong while talking to a single device.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The host name or literal could not be resolved to an IPv4 address.
    ///
    /// Fatal to the call: no channel can be derived without an address.
    #[error("could not resolve '{address}' to an IPv4 address: {source}")]
    AddressResolution {
        /// Address as given by the caller.
        address: String,
        /// Underlying resolver error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP exchange failed before a complete response was available.
    #[error("transport failure during {phase} for {url}: {source}")]
    Transport {
        /// Which part of the exchange failed.
        phase: TransportPhase,
        /// Full request URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: BoxError,
    },

    /// The device answered outside the 2xx range.
    ///
    /// The body is kept because devices often explain the failure in it.
    #[error("{url} returned HTTP {status}")]
    UnexpectedStatus {
        /// Full request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: Bytes,
    },

    /// The body did not match the expected envelope.
    #[error("could not decode response from {url}: {source}")]
    Decode {
        /// Full request URL.
        url: String,
        /// JSON decoding error.
        #[source]
        source: serde_json::Error,
        /// Raw bytes that failed to decode.
        body: Bytes,
    },

    /// The caller's deadline elapsed before the primary request completed.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// A transmitter lies outside the receiver's subnet while the shared
    /// subnet is enforced.
    #[error("transmitter {transmitter} is outside the /{prefix} of receiver {receiver}")]
    SubnetMismatch {
        /// Receiver IPv4 address.
        receiver: Ipv4Addr,
        /// Transmitter IPv4 address.
        transmitter: Ipv4Addr,
        /// Configured shared prefix length.
        prefix: u8,
    },
}

impl DeviceError {
    /// Raw response body, if the device produced one.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            DeviceError::UnexpectedStatus { body, .. } | DeviceError::Decode { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }
}

// =============================================================================
// Operation context
// =============================================================================

/// Public operation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Querying the channel a device reports.
    QueryChannel,
    /// Reconstructing the source a receiver is tuned to.
    QuerySource,
    /// Pointing a receiver at a transmitter.
    SetRoute,
    /// Fetching the device details snapshot.
    DeviceDetails,
    /// Comparing a transmitter's channel to its address.
    CheckDrift,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::QueryChannel => "query-channel",
            Operation::QuerySource => "query-source",
            Operation::SetRoute => "set-route",
            Operation::DeviceDetails => "device-details",
            Operation::CheckDrift => "check-drift",
        };
        write!(f, "{}", label)
    }
}

/// A [`DeviceError`] tagged with the operation and target that produced it.
#[derive(Error, Debug)]
#[error("{operation} on '{target}' failed: {source}")]
pub struct MatrixError {
    /// Operation that was running.
    pub operation: Operation,
    /// Device address the operation targeted.
    pub target: String,
    /// What went wrong.
    #[source]
    pub source: DeviceError,
}

impl MatrixError {
    /// Wrap a device error with its operation context.
    pub fn new(operation: Operation, target: impl Into<String>, source: DeviceError) -> Self {
        Self {
            operation,
            target: target.into(),
            source,
        }
    }

    /// The underlying error kind.
    pub fn kind(&self) -> &DeviceError {
        &self.source
    }

    /// True if the address could not be resolved.
    pub fn is_address_resolution(&self) -> bool {
        matches!(self.source, DeviceError::AddressResolution { .. })
    }

    /// True if the HTTP exchange itself failed.
    pub fn is_transport(&self) -> bool {
        matches!(self.source, DeviceError::Transport { .. })
    }

    /// True if the device answered with a non-2xx status.
    pub fn is_unexpected_status(&self) -> bool {
        matches!(self.source, DeviceError::UnexpectedStatus { .. })
    }

    /// True if the response body could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self.source, DeviceError::Decode { .. })
    }
}

/// Attach operation context to device-level results.
pub(crate) trait OperationContext<T> {
    fn during(self, operation: Operation, target: &str) -> MatrixResult<T>;
}

impl<T> OperationContext<T> for Result<T, DeviceError> {
    fn during(self, operation: Operation, target: &str) -> MatrixResult<T> {
        self.map_err(|e| MatrixError::new(operation, target, e))
    }
}

// =============================================================================
// Configuration errors
// =============================================================================

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Extraction failed (bad TOML, wrong types, bad environment override).
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Values parsed but are not usable.
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// The HTTP client could not be built from the configuration.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Load(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_names_phase_and_target() {
        let err = MatrixError::new(
            Operation::QueryChannel,
            "10.0.5.10",
            DeviceError::Transport {
                phase: TransportPhase::Send,
                url: "http://10.0.5.10/cgi-bin/api/details/channel".into(),
                source: Box::new(std::io::Error::from(std::io::ErrorKind::ConnectionRefused)),
            },
        );

        let message = err.to_string();
        assert!(message.contains("query-channel"));
        assert!(message.contains("10.0.5.10"));
        assert!(message.contains("during send"));
        assert!(err.is_transport());
        assert!(!err.is_decode());
    }

    #[test]
    fn test_body_is_kept_for_device_responses() {
        let err = DeviceError::UnexpectedStatus {
            url: "http://rx/cgi-bin/api/command/channel".into(),
            status: 503,
            body: Bytes::from_static(b"busy"),
        };
        assert_eq!(err.body().map(|b| b.as_ref()), Some(&b"busy"[..]));

        let err = DeviceError::DeadlineExceeded(Duration::from_secs(1));
        assert!(err.body().is_none());
    }

    #[test]
    fn test_operation_context_wraps_errors() {
        let result: Result<(), DeviceError> =
            Err(DeviceError::DeadlineExceeded(Duration::from_millis(5)));
        let err = result.during(Operation::SetRoute, "rx-1").unwrap_err();
        assert_eq!(err.operation, Operation::SetRoute);
        assert_eq!(err.target, "rx-1");
    }
}
