//! Receiver-side routing operations.
//!
//! A [`Receiver`] is the unit routing decisions are made on: it is always the
//! "to" side of a route. It caches no channel state; each call re-resolves
//! addresses and re-queries the device.
//!
//! # Addressing constraint
//!
//! [`Receiver::current_source`] cannot ask the device which transmitter it is
//! showing, only which channel it is on. The transmitter address is rebuilt
//! from the receiver's own first three octets plus that channel, which is only
//! meaningful when receivers and transmitters share one /24. See
//! [`AddressingScheme`](crate::addressing::AddressingScheme).

use crate::context::CallContext;
use crate::details::DeviceInfo;
use crate::drift::DriftMonitor;
use crate::engine::{DriftOutcome, RouteEngine};
use crate::error::{DeviceError, MatrixError, MatrixResult, Operation, OperationContext};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tracing::{Instrument, Span};

/// A receiver device on the matrix.
#[derive(Debug, Clone)]
pub struct Receiver {
    address: String,
    engine: Arc<RouteEngine>,
    drift: DriftMonitor,
    span: Span,
}

impl Receiver {
    /// Receiver at `address` with its own `receiver` span.
    ///
    /// Every route schedules a drift check of its transmitter on `drift`.
    pub fn new(
        address: impl Into<String>,
        engine: Arc<RouteEngine>,
        drift: DriftMonitor,
    ) -> Self {
        let address = address.into();
        let span = tracing::info_span!("receiver", address = %address);
        Self {
            address,
            engine,
            drift,
            span,
        }
    }

    /// Replace the diagnostic span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Configured address (host name or IPv4 literal).
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Channel reported by the device at `address`, as text.
    ///
    /// `address` may be this receiver or any other device, transmitters
    /// included, so the raw channel is returned rather than a descriptor.
    pub async fn current_channel(&self, ctx: &CallContext, address: &str) -> MatrixResult<String> {
        ctx.run(self.engine.reported_channel(address))
            .instrument(self.span.clone())
            .await
            .map(|channel| channel.to_string())
            .during(Operation::QueryChannel, address)
    }

    /// Transmitter this receiver appears to be showing, keyed by output.
    ///
    /// A receiver has exactly one output, identified by the receiver address.
    pub async fn current_source(
        &self,
        ctx: &CallContext,
    ) -> MatrixResult<HashMap<String, Ipv4Addr>> {
        let descriptor = ctx
            .run(self.source_descriptor())
            .instrument(self.span.clone())
            .await
            .during(Operation::QuerySource, &self.address)?;

        let mut sources = HashMap::with_capacity(1);
        sources.insert(self.address.clone(), descriptor);
        Ok(sources)
    }

    async fn source_descriptor(&self) -> Result<Ipv4Addr, DeviceError> {
        let own = self.engine.resolve(&self.address).await?;
        let channel = self.engine.client().query_channel(&self.address).await?;
        let descriptor = self.engine.scheme().descriptor(own, channel);
        tracing::debug!(%channel, %descriptor, "Reconstructed source");
        Ok(descriptor)
    }

    /// Point this receiver at `transmitter`.
    ///
    /// Also schedules a drift check of the transmitter, which is not awaited
    /// and whose outcome never affects this call.
    ///
    /// A transmitter that does not resolve is reported as the error target.
    pub async fn set_route(&self, ctx: &CallContext, transmitter: &str) -> MatrixResult<()> {
        ctx.run(self.route_to(transmitter))
            .instrument(self.span.clone())
            .await
            .map_err(|e| {
                let target = match &e {
                    DeviceError::AddressResolution { address, .. } => address.clone(),
                    _ => self.address.clone(),
                };
                MatrixError::new(Operation::SetRoute, target, e)
            })
    }

    async fn route_to(&self, transmitter: &str) -> Result<(), DeviceError> {
        let scheme = self.engine.scheme();
        let tx_ip = self.engine.resolve(transmitter).await?;

        // The receiver's own address only feeds the subnet check.
        match self.engine.resolve(&self.address).await {
            Ok(rx_ip) => self.check_subnet(rx_ip, tx_ip)?,
            Err(e) if scheme.enforces_shared_subnet() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping subnet check for unresolved receiver");
            }
        }

        self.drift.submit(transmitter);

        let channel = scheme.channel_for(tx_ip);
        tracing::info!(transmitter, %channel, "Routing receiver");
        let status = self
            .engine
            .client()
            .command_channel(&self.address, channel)
            .await?;
        tracing::debug!(status, "Route applied");
        Ok(())
    }

    fn check_subnet(&self, rx_ip: Ipv4Addr, tx_ip: Ipv4Addr) -> Result<(), DeviceError> {
        let scheme = self.engine.scheme();
        if scheme.same_subnet(rx_ip, tx_ip) {
            return Ok(());
        }
        if scheme.enforces_shared_subnet() {
            return Err(DeviceError::SubnetMismatch {
                receiver: rx_ip,
                transmitter: tx_ip,
                prefix: scheme.prefix_len(),
            });
        }
        tracing::warn!(
            receiver = %rx_ip,
            transmitter = %tx_ip,
            "Transmitter is outside the receiver's /24; reported source will not match"
        );
        Ok(())
    }

    /// Flat descriptor of this device.
    ///
    /// Host name lookup failures fall back to the configured address. Any
    /// failure fetching or decoding the details is returned as an error.
    pub async fn device_details(&self, ctx: &CallContext) -> MatrixResult<DeviceInfo> {
        ctx.run(self.fetch_details())
            .instrument(self.span.clone())
            .await
            .during(Operation::DeviceDetails, &self.address)
    }

    async fn fetch_details(&self) -> Result<DeviceInfo, DeviceError> {
        let hostname = self.hostname().await;
        let details = self.engine.client().query_details(&self.address).await?;
        Ok(DeviceInfo::from_details(hostname, details))
    }

    async fn reverse_name(&self) -> std::io::Result<String> {
        let ip = self.engine.resolver().resolve_ipv4(&self.address).await?;
        self.engine.resolver().reverse_lookup(IpAddr::V4(ip)).await
    }

    async fn hostname(&self) -> String {
        match self.reverse_name().await {
            Ok(name) => name.trim_end_matches('.').to_string(),
            Err(e) => {
                tracing::debug!(error = %e, "Reverse lookup failed, using address");
                self.address.clone()
            }
        }
    }

    /// Check `transmitter` for drift now and wait for the result.
    pub async fn check_drift(&self, transmitter: &str) -> MatrixResult<DriftOutcome> {
        self.engine
            .check_drift(transmitter)
            .instrument(self.span.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::AddressingScheme;
    use crate::config::DriftConfig;
    use crate::protocol::{DeviceClient, MockDeviceNetwork};
    use crate::resolve::StaticResolver;
    use tracing_test::traced_test;

    fn receiver_at(
        address: &str,
        scheme: AddressingScheme,
    ) -> (Receiver, DriftMonitor, Arc<MockDeviceNetwork>) {
        let network = Arc::new(MockDeviceNetwork::new());
        let resolver = StaticResolver::new()
            .with_host("rx-lobby.av.example.", Ipv4Addr::new(10, 0, 5, 10))
            .with_host("tx-stage", Ipv4Addr::new(10, 0, 5, 42));
        let engine = Arc::new(RouteEngine::new(
            DeviceClient::new(network.clone()),
            Arc::new(resolver),
            scheme,
        ));
        let monitor = DriftMonitor::spawn(engine.clone(), &DriftConfig::default());
        (
            Receiver::new(address, engine, monitor.clone()),
            monitor,
            network,
        )
    }

    fn receiver(scheme: AddressingScheme) -> (Receiver, Arc<MockDeviceNetwork>) {
        let (rx, _monitor, network) = receiver_at("10.0.5.10", scheme);
        (rx, network)
    }

    #[tokio::test]
    async fn test_route_by_host_name() {
        let (rx, network) = receiver(AddressingScheme::default());
        network.add_device("10.0.5.10", 1);

        rx.set_route(&CallContext::new(), "tx-stage").await.unwrap();

        let writes = network.channel_writes("10.0.5.10");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].body, "42");
    }

    #[tokio::test]
    async fn test_route_always_schedules_drift_check() {
        let (rx, monitor, network) = receiver_at("10.0.5.10", AddressingScheme::default());
        network.add_device("10.0.5.10", 1);
        network.add_device("10.0.5.42", 7);

        rx.set_route(&CallContext::new(), "10.0.5.42").await.unwrap();
        monitor.wait_idle().await;

        let writes = network.channel_writes("10.0.5.42");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].body, "42");
    }

    #[tokio::test]
    async fn test_unresolved_receiver_still_routes() {
        let (rx, monitor, network) = receiver_at("rx-unlisted", AddressingScheme::default());
        network.add_device("rx-unlisted", 1);
        network.add_device("10.0.5.42", 42);

        rx.set_route(&CallContext::new(), "10.0.5.42").await.unwrap();

        let writes = network.channel_writes("rx-unlisted");
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].url, "http://rx-unlisted/cgi-bin/api/command/channel");
        assert_eq!(writes[0].body, "42");
        monitor.wait_idle().await;
    }

    #[tokio::test]
    async fn test_unresolved_receiver_is_fatal_when_subnet_enforced() {
        let (rx, _monitor, network) =
            receiver_at("rx-unlisted", AddressingScheme::new(true, true));
        network.add_device("rx-unlisted", 1);

        let err = rx
            .set_route(&CallContext::new(), "10.0.5.42")
            .await
            .unwrap_err();
        assert!(err.is_address_resolution());
        assert_eq!(err.target, "rx-unlisted");
        assert!(network.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_transmitter_is_the_error_target() {
        let (rx, network) = receiver(AddressingScheme::default());
        network.add_device("10.0.5.10", 1);

        let err = rx
            .set_route(&CallContext::new(), "tx-missing")
            .await
            .unwrap_err();
        assert!(err.is_address_resolution());
        assert_eq!(err.operation, Operation::SetRoute);
        assert_eq!(err.target, "tx-missing");
    }

    #[tokio::test]
    async fn test_cross_subnet_route_is_refused_when_enforced() {
        let (rx, network) = receiver(AddressingScheme::new(true, true));
        network.add_device("10.0.5.10", 1);

        let err = rx
            .set_route(&CallContext::new(), "10.0.6.42")
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), DeviceError::SubnetMismatch { prefix: 24, .. }));
        assert_eq!(err.target, "10.0.5.10");
        assert!(network.channel_writes("10.0.5.10").is_empty());
    }

    #[tokio::test]
    async fn test_cross_subnet_route_is_allowed_by_default() {
        let (rx, network) = receiver(AddressingScheme::default());
        network.add_device("10.0.5.10", 1);

        rx.set_route(&CallContext::new(), "10.0.6.42").await.unwrap();
        assert_eq!(network.channel("10.0.5.10"), Some(42));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_injected_span_wraps_operations() {
        let (rx, network) = receiver(AddressingScheme::default());
        network.add_device("10.0.5.10", 1);
        let rx = rx.with_span(tracing::info_span!("studio_wall"));

        rx.set_route(&CallContext::new(), "tx-stage").await.unwrap();

        assert!(logs_contain("studio_wall"));
        assert!(logs_contain("Routing receiver"));
    }

    #[tokio::test]
    async fn test_hostname_trims_trailing_dot() {
        let (rx, network) = receiver(AddressingScheme::default());
        network.add_device("10.0.5.10", 1);

        let info = rx.device_details(&CallContext::new()).await.unwrap();
        assert_eq!(info.hostname, "rx-lobby.av.example");
    }

    #[tokio::test]
    async fn test_current_source_is_keyed_by_receiver() {
        let (rx, network) = receiver(AddressingScheme::default());
        network.add_device("10.0.5.10", 42);

        let sources = rx.current_source(&CallContext::new()).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources["10.0.5.10"], Ipv4Addr::new(10, 0, 5, 42));
    }
}
