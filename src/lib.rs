//! # AV-over-IP Matrix Control
//!
//! Control-plane client for AV-over-IP matrices built from network-attached
//! transmitters (sources) and receivers (sinks). A receiver shows a
//! transmitter's stream once it is tuned to that transmitter's *channel*, and
//! by convention a transmitter's channel is the fourth octet of its IPv4
//! address.
//!
//! ## Crate Structure
//!
//! - **`addressing`**: `Channel` and the shared-/24 `AddressingScheme`.
//! - **`protocol`**: `DeviceClient` for the device HTTP API, its transport seam
//!   and a simulated device network.
//! - **`details`**: device details payload and the flat `DeviceInfo`.
//! - **`engine`**: `RouteEngine` with channel queries and drift repair.
//! - **`receiver`**: `Receiver` with the public routing operations.
//! - **`drift`**: bounded worker pool for background drift checks.
//! - **`matrix`**: `MatrixClient`, wiring everything from configuration.
//! - **`config`**: Figment-based configuration.
//! - **`resolve`**: forward/reverse address resolution.
//! - **`context`**: per-call deadlines.
//! - **`error`**: error types.
//! - **`telemetry`**: tracing subscriber setup.
//!
//! ## Example
//!
//! ```rust,ignore
//! use av_matrix::{CallContext, MatrixClient, MatrixConfig};
//!
//! let matrix = MatrixClient::from_config(&MatrixConfig::load()?)?;
//! let rx = matrix.receiver("10.0.5.10");
//! rx.set_route(&CallContext::new(), "10.0.5.42").await?;
//! let sources = rx.current_source(&CallContext::new()).await?;
//! assert_eq!(sources["10.0.5.10"].to_string(), "10.0.5.42");
//! ```

pub mod addressing;
pub mod config;
pub mod context;
pub mod details;
pub mod drift;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod protocol;
pub mod receiver;
pub mod resolve;
pub mod telemetry;

pub use addressing::{AddressingScheme, Channel};
pub use config::MatrixConfig;
pub use context::CallContext;
pub use details::DeviceInfo;
pub use drift::{DriftMonitor, DriftReport};
pub use engine::{DriftOutcome, RouteEngine};
pub use error::{ConfigError, DeviceError, MatrixError, MatrixResult, Operation, TransportPhase};
pub use matrix::MatrixClient;
pub use receiver::Receiver;
