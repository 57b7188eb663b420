//! Address ↔ channel mapping.
//!
//! Device firmware only knows channel numbers. By convention a transmitter is
//! configured to broadcast on the channel equal to the fourth octet of its own
//! IPv4 address, and a receiver displays a transmitter by tuning to that
//! channel. Going the other way, the transmitter a receiver is watching can
//! only be *reconstructed*: take the receiver's first three octets and put the
//! reported channel in the fourth.
//!
//! That reconstruction is correct only when receivers and transmitters share
//! one /24 network. [`AddressingScheme`] makes this a checked configuration
//! invariant instead of implicit arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Prefix length the channel scheme relies on. A channel is exactly one octet.
pub const SHARED_PREFIX_LEN: u8 = 24;

/// A device channel number (0–255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(u8);

impl Channel {
    /// Wrap a raw channel number.
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// The channel a transmitter at `address` is expected to use.
    pub fn for_address(address: Ipv4Addr) -> Self {
        Self(address.octets()[3])
    }

    /// Raw channel number.
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Channels 0 and 255 map to the network and broadcast addresses of a /24.
    ///
    /// Nothing special is done with them; they are only flagged in the logs.
    pub const fn is_reserved(self) -> bool {
        self.0 == 0 || self.0 == u8::MAX
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Channel {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u8>().map(Self)
    }
}

impl From<u8> for Channel {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

/// How addresses and channels relate on this network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressingScheme {
    enforce_shared_subnet: bool,
    flag_reserved_channels: bool,
}

impl Default for AddressingScheme {
    fn default() -> Self {
        Self {
            enforce_shared_subnet: false,
            flag_reserved_channels: true,
        }
    }
}

impl AddressingScheme {
    /// Scheme with the given policy flags.
    pub fn new(enforce_shared_subnet: bool, flag_reserved_channels: bool) -> Self {
        Self {
            enforce_shared_subnet,
            flag_reserved_channels,
        }
    }

    /// Prefix length shared by receivers and transmitters.
    pub const fn prefix_len(&self) -> u8 {
        SHARED_PREFIX_LEN
    }

    /// Whether routes across subnets are refused rather than warned about.
    pub const fn enforces_shared_subnet(&self) -> bool {
        self.enforce_shared_subnet
    }

    /// Whether channels 0 and 255 produce a warning.
    pub const fn flags_reserved_channels(&self) -> bool {
        self.flag_reserved_channels
    }

    /// Channel a receiver must tune to in order to show `transmitter`.
    pub fn channel_for(&self, transmitter: Ipv4Addr) -> Channel {
        let channel = Channel::for_address(transmitter);
        if self.flag_reserved_channels && channel.is_reserved() {
            tracing::warn!(
                %transmitter,
                %channel,
                "Channel derived from transmitter address is a network/broadcast octet"
            );
        }
        channel
    }

    /// Reconstruct the transmitter a receiver at `receiver` is watching.
    pub fn descriptor(&self, receiver: Ipv4Addr, channel: Channel) -> Ipv4Addr {
        let [a, b, c, _] = receiver.octets();
        Ipv4Addr::new(a, b, c, channel.value())
    }

    /// True if both addresses share the scheme's /24.
    pub fn same_subnet(&self, receiver: Ipv4Addr, transmitter: Ipv4Addr) -> bool {
        receiver.octets()[..3] == transmitter.octets()[..3]
    }
}
