//! Composition root: builds the engine, drift pool and receivers from configuration.

use crate::config::MatrixConfig;
use crate::drift::DriftMonitor;
use crate::engine::{DriftOutcome, RouteEngine};
use crate::error::{ConfigError, MatrixResult};
use crate::protocol::{DeviceClient, HttpTransport, MockDeviceNetwork, ReqwestTransport};
use crate::receiver::Receiver;
use crate::resolve::{AddressResolver, SystemResolver};
use std::sync::Arc;

/// Entry point for controlling a matrix.
///
/// Must be created inside a tokio runtime (the drift pool is spawned on it).
///
/// ```rust,ignore
/// let matrix = MatrixClient::from_config(&MatrixConfig::load()?)?;
/// let rx = matrix.receiver("10.0.5.10");
/// rx.set_route(&CallContext::new(), "10.0.5.42").await?;
/// matrix.drift_monitor().wait_idle().await;
/// ```
#[derive(Debug, Clone)]
pub struct MatrixClient {
    engine: Arc<RouteEngine>,
    drift: DriftMonitor,
}

impl MatrixClient {
    /// Build from configuration; `mock = true` selects the simulated network.
    pub fn from_config(config: &MatrixConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport: Arc<dyn HttpTransport> = if config.mock {
            tracing::info!("Using simulated device network");
            Arc::new(MockDeviceNetwork::auto_provisioning())
        } else {
            Arc::new(ReqwestTransport::new(config.http.timeout)?)
        };
        let resolver = Arc::new(SystemResolver::with_hosts(config.hosts.clone()));
        Ok(Self::with_parts(transport, resolver, config))
    }

    /// Build from explicit transport and resolver.
    pub fn with_parts(
        transport: Arc<dyn HttpTransport>,
        resolver: Arc<dyn AddressResolver>,
        config: &MatrixConfig,
    ) -> Self {
        let engine = Arc::new(RouteEngine::new(
            DeviceClient::new(transport),
            resolver,
            config.scheme(),
        ));
        let drift = DriftMonitor::spawn(engine.clone(), &config.drift);
        Self { engine, drift }
    }

    /// Receiver at `address`, scheduling drift checks on this client's pool.
    pub fn receiver(&self, address: impl Into<String>) -> Receiver {
        Receiver::new(address, self.engine.clone(), self.drift.clone())
    }

    /// Check `transmitter` for drift now.
    pub async fn check_drift(&self, transmitter: &str) -> MatrixResult<DriftOutcome> {
        self.engine.check_drift(transmitter).await
    }

    /// The background drift pool.
    pub fn drift_monitor(&self) -> &DriftMonitor {
        &self.drift
    }

    /// Shared routing engine.
    pub fn engine(&self) -> &Arc<RouteEngine> {
        &self.engine
    }
}
