//! Device details payload and the flat descriptor built from it.

use serde::{Deserialize, Serialize};

/// Payload of `GET /cgi-bin/api/details/device`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDetails {
    /// Hardware model name.
    pub model: String,
    /// Firmware information.
    pub firmware: FirmwareDetails,
    /// Network configuration.
    pub network: NetworkDetails,
    /// Free-text device status.
    #[serde(default)]
    pub status: String,
    /// Device clock.
    #[serde(default)]
    pub time: String,
    /// Time since boot, as reported by the device.
    pub uptime: String,
}

/// Firmware block of the details payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareDetails {
    /// Firmware version string.
    pub version: String,
    /// Firmware build date.
    pub date: String,
    /// Firmware update state.
    #[serde(default)]
    pub update: FirmwareUpdate,
}

/// Firmware update progress flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareUpdate {
    /// ETA available.
    pub eta: bool,
    /// Update message.
    pub message: String,
    /// Update in progress.
    pub progress: bool,
    /// Last update result.
    pub result: bool,
    /// Update status flag.
    pub status: bool,
}

/// Network block of the details payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDetails {
    /// Configured IP address.
    pub ipaddress: String,
    /// MAC address.
    pub mac: String,
    /// Interface MTU.
    #[serde(default)]
    pub mtu: u32,
    /// Netmask.
    #[serde(default)]
    pub netmask: String,
    /// Link speed.
    #[serde(default)]
    pub speed: String,
}

/// Flat device descriptor returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Reverse-DNS name, or the configured address if lookup failed.
    pub hostname: String,
    /// Hardware model name.
    pub model_name: String,
    /// Firmware version.
    pub firmware_version: String,
    /// Firmware build date.
    pub build_date: String,
    /// Uptime, reported as the power status.
    pub power_status: String,
    /// IP address reported by the device.
    pub ip_address: String,
    /// MAC address reported by the device.
    pub mac_address: String,
}

impl DeviceInfo {
    /// Project a decoded details payload.
    pub fn from_details(hostname: String, details: DeviceDetails) -> Self {
        Self {
            hostname,
            model_name: details.model,
            firmware_version: details.firmware.version,
            build_date: details.firmware.date,
            power_status: details.uptime,
            ip_address: details.network.ipaddress,
            mac_address: details.network.mac,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
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
    }"#;

    #[test]
    fn test_projection() {
        let details: DeviceDetails = serde_json::from_str(FULL).unwrap();
        let info = DeviceInfo::from_details("rx-lobby".into(), details);

        assert_eq!(info.hostname, "rx-lobby");
        assert_eq!(info.model_name, "VBS-HDIP-747");
        assert_eq!(info.firmware_version, "3.4.1");
        assert_eq!(info.build_date, "2023-06-14");
        assert_eq!(info.power_status, "3 days, 4:05");
        assert_eq!(info.ip_address, "10.0.5.10");
        assert_eq!(info.mac_address, "00:1e:c0:aa:bb:cc");
    }

    #[test]
    fn test_optional_blocks_default() {
        let details: DeviceDetails = serde_json::from_str(
            r#"{"model": "m", "firmware": {"version": "1", "date": "d"},
                "network": {"ipaddress": "10.0.5.10", "mac": "aa"}, "uptime": "1m"}"#,
        )
        .unwrap();
        assert_eq!(details.firmware.update, FirmwareUpdate::default());
        assert_eq!(details.network.mtu, 0);
    }

    #[test]
    fn test_missing_required_field_fails() {
        let result = serde_json::from_str::<DeviceDetails>(
            r#"{"firmware": {"version": "1", "date": "d"},
                "network": {"ipaddress": "10.0.5.10", "mac": "aa"}, "uptime": "1m"}"#,
        );
        assert!(result.is_err());
    }
}
