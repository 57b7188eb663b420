//! Integration tests for drift detection and repair.

use av_matrix::protocol::{Fault, MockDeviceNetwork};
use av_matrix::resolve::StaticResolver;
use av_matrix::{Channel, DriftOutcome, MatrixClient, MatrixConfig};
use std::sync::Arc;

const TX: &str = "10.0.5.42";

fn matrix() -> (MatrixClient, Arc<MockDeviceNetwork>) {
    let network = Arc::new(MockDeviceNetwork::new());
    let matrix = MatrixClient::with_parts(
        network.clone(),
        Arc::new(StaticResolver::new()),
        &MatrixConfig::default(),
    );
    (matrix, network)
}

#[tokio::test]
async fn test_drifted_transmitter_gets_one_corrective_write() {
    let (matrix, network) = matrix();
    network.add_device(TX, 7);

    let outcome = matrix.check_drift(TX).await.unwrap();
    assert_eq!(
        outcome,
        DriftOutcome::Corrected {
            expected: Channel::new(42),
            observed: Some(Channel::new(7)),
        }
    );

    let writes = network.channel_writes(TX);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].url, "http://10.0.5.42/cgi-bin/api/command/channel");
    assert_eq!(writes[0].body, "42");
}

#[tokio::test]
async fn test_repeated_checks_are_idempotent() {
    let (matrix, network) = matrix();
    network.add_device(TX, 7);

    for _ in 0..3 {
        matrix.check_drift(TX).await.unwrap();
    }
    assert_eq!(network.channel_writes(TX).len(), 1);
}

#[tokio::test]
async fn test_in_sync_transmitter_is_left_alone() {
    let (matrix, network) = matrix();
    network.add_device(TX, 42);

    let outcome = matrix.check_drift(TX).await.unwrap();
    assert!(!outcome.corrected());
    assert!(network.channel_writes(TX).is_empty());
}

#[tokio::test]
async fn test_external_retune_is_repaired_again() {
    let (matrix, network) = matrix();
    network.add_device(TX, 42);

    assert!(!matrix.check_drift(TX).await.unwrap().corrected());
    network.set_channel(TX, 13);
    assert!(matrix.check_drift(TX).await.unwrap().corrected());
    assert!(!matrix.check_drift(TX).await.unwrap().corrected());

    assert_eq!(network.channel_writes(TX).len(), 1);
    assert_eq!(network.channel(TX), Some(42));
}

#[tokio::test]
async fn test_unreadable_channel_forces_write() {
    let (matrix, network) = matrix();
    network.add_device(TX, 42);
    network.set_fault(TX, Fault::Status(502, "bad gateway".into()));

    // The write hits the same fault; what matters is that it was attempted.
    assert!(matrix.check_drift(TX).await.is_err());
    assert_eq!(network.channel_writes(TX).len(), 1);
}

#[tokio::test]
async fn test_reserved_channel_is_written_unchanged() {
    let (matrix, network) = matrix();
    network.add_device("10.0.5.255", 3);

    let outcome = matrix.check_drift("10.0.5.255").await.unwrap();
    assert_eq!(
        outcome,
        DriftOutcome::Corrected {
            expected: Channel::new(255),
            observed: Some(Channel::new(3)),
        }
    );
    assert_eq!(network.channel_writes("10.0.5.255")[0].body, "255");
}
