//! Response envelope decoding.
//!
//! Every device response wraps its payload as `{"data": ...}`. The payload is
//! a status string for commands, an integer for channel queries and a nested
//! object for the device details endpoint.

use crate::addressing::Channel;
use crate::details::DeviceDetails;
use crate::error::DeviceError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Decode `{"data": T}`, keeping the raw bytes on failure.
pub fn decode<T: DeserializeOwned>(url: &str, body: Bytes) -> Result<T, DeviceError> {
    match serde_json::from_slice::<Envelope<T>>(&body) {
        Ok(envelope) => Ok(envelope.data),
        Err(source) => Err(DeviceError::Decode {
            url: url.to_string(),
            source,
            body,
        }),
    }
}

/// Free-text status returned by command endpoints.
pub fn decode_status(url: &str, body: Bytes) -> Result<String, DeviceError> {
    decode(url, body)
}

/// Channel number; values outside 0–255 are decode errors.
pub fn decode_channel(url: &str, body: Bytes) -> Result<Channel, DeviceError> {
    decode(url, body)
}

/// Nested device details payload.
pub fn decode_details(url: &str, body: Bytes) -> Result<DeviceDetails, DeviceError> {
    decode(url, body)
}
