//! Integration tests for device details retrieval.

use av_matrix::protocol::{Fault, MockDeviceNetwork};
use av_matrix::resolve::StaticResolver;
use av_matrix::{CallContext, MatrixClient, MatrixConfig, Operation};
use std::net::Ipv4Addr;
use std::sync::Arc;

const RX: &str = "10.0.5.10";

const DETAILS: &str = r#"{
    "data": {
        "model": "VBS-HDIP-747",
        "firmware": {
            "version": "3.4.1",
            "date": "2023-06-14",
            "update": {"eta": false, "message": "", "progress": false, "result": true, "status": false}
        },
        "network": {
            "ipaddress": "10.0.5.10",
            "mac": "00:1e:c0:aa:bb:cc",
            "mtu": 9000,
            "netmask": "255.255.255.0",
            "speed": "1000Mb/s"
        },
        "status": "running",
        "time": "2024-01-01 00:00:00",
        "uptime": "3 days, 4:05"
    }
}"#;

fn matrix(resolver: StaticResolver) -> (MatrixClient, Arc<MockDeviceNetwork>) {
    let network = Arc::new(MockDeviceNetwork::new());
    network.add_device(RX, 1);
    network.set_details_body(RX, DETAILS);
    let matrix =
        MatrixClient::with_parts(network.clone(), Arc::new(resolver), &MatrixConfig::default());
    (matrix, network)
}

#[tokio::test]
async fn test_details_with_reverse_dns_name() {
    let (matrix, _network) = matrix(
        StaticResolver::new().with_host("rx-lobby.av.example.", Ipv4Addr::new(10, 0, 5, 10)),
    );

    let info = matrix
        .receiver(RX)
        .device_details(&CallContext::new())
        .await
        .unwrap();

    assert_eq!(info.hostname, "rx-lobby.av.example");
    assert_eq!(info.model_name, "VBS-HDIP-747");
    assert_eq!(info.firmware_version, "3.4.1");
    assert_eq!(info.build_date, "2023-06-14");
    assert_eq!(info.power_status, "3 days, 4:05");
    assert_eq!(info.ip_address, "10.0.5.10");
    assert_eq!(info.mac_address, "00:1e:c0:aa:bb:cc");
}

#[tokio::test]
async fn test_reverse_dns_failure_falls_back_to_address() {
    let (matrix, _network) = matrix(StaticResolver::new());

    let info = matrix
        .receiver(RX)
        .device_details(&CallContext::new())
        .await
        .unwrap();
    assert_eq!(info.hostname, RX);
}

#[tokio::test]
async fn test_malformed_details_is_decode_error() {
    let (matrix, network) = matrix(StaticResolver::new());
    network.set_details_body(RX, r#"{"data": {"model": "VBS-HDIP-747", "firmware": 3}}"#);

    let err = matrix
        .receiver(RX)
        .device_details(&CallContext::new())
        .await
        .unwrap_err();

    assert!(err.is_decode());
    assert_eq!(err.operation, Operation::DeviceDetails);
    assert_eq!(
        err.kind().body().map(|b| b.as_ref()),
        Some(&br#"{"data": {"model": "VBS-HDIP-747", "firmware": 3}}"#[..])
    );
}

#[tokio::test]
async fn test_non_json_details_is_decode_error() {
    let (matrix, network) = matrix(StaticResolver::new());
    network.set_fault(RX, Fault::MalformedBody("<html>login</html>".into()));

    let err = matrix
        .receiver(RX)
        .device_details(&CallContext::new())
        .await
        .unwrap_err();
    assert!(err.is_decode());
}

#[tokio::test]
async fn test_unreachable_device_is_transport_error() {
    let (matrix, network) = matrix(StaticResolver::new());
    network.set_fault(RX, Fault::ConnectionRefused);

    let err = matrix
        .receiver(RX)
        .device_details(&CallContext::new())
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.target, RX);
}
