//! Channel reconciliation.
//!
//! [`RouteEngine`] holds everything the routing operations need (protocol
//! client, resolver, addressing scheme) and is shared between
//! [`Receiver`](crate::receiver::Receiver)s and the background
//! [`DriftMonitor`](crate::drift::DriftMonitor).
//!
//! # Drift
//!
//! Transmitters can be retuned by other controllers and silently stop
//! broadcasting on the channel their address implies. [`RouteEngine::check_drift`]
//! asks the transmitter which channel it is on and, if that is not its own
//! fourth octet (or the answer cannot be obtained), writes the expected channel
//! back. A check with nothing to repair issues no writes.

use crate::addressing::{AddressingScheme, Channel};
use crate::error::{DeviceError, MatrixResult, Operation, OperationContext};
use crate::protocol::DeviceClient;
use crate::resolve::AddressResolver;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Result of a drift check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftOutcome {
    /// The transmitter reports its expected channel; nothing was written.
    InSync {
        /// Channel reported and expected.
        channel: Channel,
    },
    /// A corrective write was issued.
    Corrected {
        /// Channel written to the transmitter.
        expected: Channel,
        /// Channel the transmitter reported, `None` if the query failed.
        observed: Option<Channel>,
    },
}

impl DriftOutcome {
    /// True if a corrective write was issued.
    pub fn corrected(&self) -> bool {
        matches!(self, DriftOutcome::Corrected { .. })
    }
}

impl fmt::Display for DriftOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftOutcome::InSync { channel } => write!(f, "in sync on channel {}", channel),
            DriftOutcome::Corrected {
                expected,
                observed: Some(observed),
            } => write!(f, "corrected channel {} -> {}", observed, expected),
            DriftOutcome::Corrected {
                expected,
                observed: None,
            } => write!(f, "channel unknown, forced to {}", expected),
        }
    }
}

/// Shared routing logic.
pub struct RouteEngine {
    client: DeviceClient,
    resolver: Arc<dyn AddressResolver>,
    scheme: AddressingScheme,
}

impl fmt::Debug for RouteEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEngine")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

impl RouteEngine {
    /// Engine over the given client, resolver and scheme.
    pub fn new(
        client: DeviceClient,
        resolver: Arc<dyn AddressResolver>,
        scheme: AddressingScheme,
    ) -> Self {
        Self {
            client,
            resolver,
            scheme,
        }
    }

    /// Protocol client.
    pub fn client(&self) -> &DeviceClient {
        &self.client
    }

    /// Address resolver.
    pub fn resolver(&self) -> &dyn AddressResolver {
        self.resolver.as_ref()
    }

    /// Addressing scheme.
    pub fn scheme(&self) -> &AddressingScheme {
        &self.scheme
    }

    /// Resolve `address` to IPv4.
    pub async fn resolve(&self, address: &str) -> Result<Ipv4Addr, DeviceError> {
        self.resolver
            .resolve_ipv4(address)
            .await
            .map_err(|source| DeviceError::AddressResolution {
                address: address.to_string(),
                source,
            })
    }

    /// Channel reported by the device at `address` (which must resolve).
    pub async fn reported_channel(&self, address: &str) -> Result<Channel, DeviceError> {
        let ip = self.resolve(address).await?;
        tracing::trace!(address, %ip, "Querying channel");
        self.client.query_channel(address).await
    }

    /// Compare a transmitter's reported channel with its address and repair it.
    pub async fn check_drift(&self, transmitter: &str) -> MatrixResult<DriftOutcome> {
        let ip = self
            .resolve(transmitter)
            .await
            .during(Operation::CheckDrift, transmitter)?;
        let expected = self.scheme.channel_for(ip);

        let observed = match self.client.query_channel(transmitter).await {
            Ok(channel) if channel == expected => {
                tracing::debug!(transmitter, %channel, "Transmitter channel in sync");
                return Ok(DriftOutcome::InSync { channel });
            }
            Ok(channel) => {
                tracing::warn!(
                    transmitter,
                    reported = %channel,
                    %expected,
                    "Transmitter drifted from its address channel"
                );
                Some(channel)
            }
            Err(e) => {
                tracing::warn!(
                    transmitter,
                    %expected,
                    error = %e,
                    "Could not read transmitter channel, assuming drift"
                );
                None
            }
        };

        let status = self
            .client
            .command_channel(transmitter, expected)
            .await
            .during(Operation::CheckDrift, transmitter)?;
        tracing::info!(transmitter, %expected, status, "Transmitter channel corrected");

        Ok(DriftOutcome::Corrected { expected, observed })
    }
}
