// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IP network and interface-address value types used throughout the
//! test engine, plus the lazy host-address allocator recipes use to
//! hand out addresses from a subnet.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    num::ParseIntError,
};
use thiserror::Error;

/// Address family selector. Test parameters and filters are expressed
/// in terms of families rather than concrete address types.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum AddrFamily {
    V4,
    V6,
}

impl std::fmt::Display for AddrFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V4 => write!(f, "ipv4"),
            Self::V6 => write!(f, "ipv6"),
        }
    }
}

pub fn family_of(addr: &IpAddr) -> AddrFamily {
    match addr {
        IpAddr::V4(_) => AddrFamily::V4,
        IpAddr::V6(_) => AddrFamily::V6,
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum IpNet {
    V4(Ipv4Net),
    V6(Ipv6Net),
}

impl std::fmt::Display for IpNet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V4(p) => p.fmt(f),
            Self::V6(p) => p.fmt(f),
        }
    }
}

impl IpNet {
    pub fn addr(&self) -> IpAddr {
        match self {
            Self::V4(s) => s.addr.into(),
            Self::V6(s) => s.addr.into(),
        }
    }

    pub fn length(&self) -> u8 {
        match self {
            Self::V4(s) => s.len,
            Self::V6(s) => s.len,
        }
    }

    pub fn family(&self) -> AddrFamily {
        match self {
            Self::V4(_) => AddrFamily::V4,
            Self::V6(_) => AddrFamily::V6,
        }
    }

    fn mask(&self) -> u128 {
        match self {
            Self::V4(s) => {
                if s.len == 0 {
                    0
                } else {
                    (u32::MAX << (32 - s.len)) as u128
                }
            }
            Self::V6(s) => {
                if s.len == 0 {
                    0
                } else {
                    u128::MAX << (128 - s.len)
                }
            }
        }
    }

    fn network(&self) -> u128 {
        addr_to_u128(&self.addr()) & self.mask()
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        if family_of(addr) != self.family() {
            return false;
        }
        addr_to_u128(addr) & self.mask() == self.network()
    }

    /// The first and last assignable host addresses of this subnet as
    /// integers. For IPv4 the network and broadcast addresses are not
    /// assignable, except in /31 and /32 subnets where every address
    /// is. For IPv6 the subnet-router anycast address (the network
    /// address) is skipped, except in /127 and /128 subnets.
    fn host_range(&self) -> (u128, u128) {
        let net = self.network();
        match self {
            Self::V4(s) => match s.len {
                32 => (net, net),
                31 => (net, net + 1),
                len => {
                    let size = 1u128 << (32 - len);
                    (net + 1, net + size - 2)
                }
            },
            Self::V6(s) => match s.len {
                128 => (net, net),
                127 => (net, net + 1),
                len => {
                    let last = if len == 0 {
                        u128::MAX
                    } else {
                        net + ((1u128 << (128 - len)) - 1)
                    };
                    (net + 1, last)
                }
            },
        }
    }

    pub fn first_host(&self) -> IpAddr {
        u128_to_addr(self.family(), self.host_range().0)
    }

    pub fn last_host(&self) -> IpAddr {
        u128_to_addr(self.family(), self.host_range().1)
    }
}

#[derive(Debug, Error)]
pub enum IpPrefixParseError {
    #[error("v4 prefix parse error: {0}")]
    V4(#[from] Ipv4PrefixParseError),

    #[error("v6 prefix parse error: {0}")]
    V6(#[from] Ipv6PrefixParseError),
}

impl std::str::FromStr for IpNet {
    type Err = IpPrefixParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(result) = Ipv4Net::from_str(s) {
            return Ok(IpNet::V4(result));
        }
        Ok(IpNet::V6(Ipv6Net::from_str(s)?))
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Ipv4Net {
    pub addr: Ipv4Addr,
    pub len: u8,
}

impl std::fmt::Display for Ipv4Net {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

#[derive(Debug, Error)]
pub enum Ipv4PrefixParseError {
    #[error("expected CIDR representation <addr>/<mask>")]
    Cidr,

    #[error("address parse error: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("mask parse error: {0}")]
    Mask(#[from] ParseIntError),

    #[error("invalid v4 prefix length: {0}")]
    Length(u8),
}

impl std::str::FromStr for Ipv4Net {
    type Err = Ipv4PrefixParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() < 2 {
            return Err(Ipv4PrefixParseError::Cidr);
        }

        let len = u8::from_str(parts[1])?;
        if len > 32 {
            return Err(Ipv4PrefixParseError::Length(len));
        }

        Ok(Ipv4Net {
            addr: Ipv4Addr::from_str(parts[0])?,
            len,
        })
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Ipv6Net {
    pub addr: Ipv6Addr,
    pub len: u8,
}

impl std::fmt::Display for Ipv6Net {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

#[derive(Debug, Error)]
pub enum Ipv6PrefixParseError {
    #[error("expected CIDR representation <addr>/<mask>")]
    Cidr,

    #[error("address parse error: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("mask parse error: {0}")]
    Mask(#[from] ParseIntError),

    #[error("invalid v6 prefix length: {0}")]
    Length(u8),
}

impl std::str::FromStr for Ipv6Net {
    type Err = Ipv6PrefixParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() < 2 {
            return Err(Ipv6PrefixParseError::Cidr);
        }

        let len = u8::from_str(parts[1])?;
        if len > 128 {
            return Err(Ipv6PrefixParseError::Length(len));
        }

        Ok(Ipv6Net {
            addr: Ipv6Addr::from_str(parts[0])?,
            len,
        })
    }
}

/// Tentative flag bit, from linux/if_addr.h. An IPv6 address carries
/// it while duplicate address detection is still running.
pub const IFA_F_TENTATIVE: u32 = 0x40;

/// An interface address: host address plus prefix length, with
/// kernel address flags as reported by the device.
///
/// Equality, ordering and hashing consider only the address and
/// prefix length. Flags are transient device state and two `IfAddr`s
/// naming the same address compare equal whether or not one of them
/// is still tentative.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IfAddr {
    addr: IpAddr,
    prefix_len: u8,
    flags: u32,
}

#[derive(Debug, Error)]
pub enum AddrParseError {
    #[error("not a v4 or v6 address: {0}")]
    Addr(String),

    #[error("prefix length parse error: {0}")]
    PrefixLen(#[from] ParseIntError),

    #[error("invalid prefix length {len} for {family} address")]
    Length { len: u8, family: AddrFamily },

    #[error("expected <addr> or <addr>/<prefix>: {0}")]
    Form(String),
}

impl IfAddr {
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, AddrParseError> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(AddrParseError::Length {
                len: prefix_len,
                family: family_of(&addr),
            });
        }
        Ok(Self {
            addr,
            prefix_len,
            flags: 0,
        })
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn ip(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn family(&self) -> AddrFamily {
        family_of(&self.addr)
    }

    /// CIDR form, `addr/prefix`. `Display` prints the bare address.
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.addr, self.prefix_len)
    }

    pub fn is_multicast(&self) -> bool {
        self.addr.is_multicast()
    }

    /// Only meaningful for v6 addresses, always false for v4.
    pub fn is_link_local(&self) -> bool {
        match self.addr {
            IpAddr::V4(_) => false,
            IpAddr::V6(a) => (a.segments()[0] & 0xffc0) == 0xfe80,
        }
    }

    /// Only v6 addresses undergo duplicate address detection, so this
    /// is always false for v4.
    pub fn is_tentative(&self) -> bool {
        match self.addr {
            IpAddr::V4(_) => false,
            IpAddr::V6(_) => self.flags & IFA_F_TENTATIVE != 0,
        }
    }
}

impl PartialEq for IfAddr {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr && self.prefix_len == other.prefix_len
    }
}

impl Eq for IfAddr {}

impl Hash for IfAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
        self.prefix_len.hash(state);
    }
}

impl PartialOrd for IfAddr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IfAddr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.addr, self.prefix_len).cmp(&(other.addr, other.prefix_len))
    }
}

impl std::fmt::Display for IfAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.addr.fmt(f)
    }
}

impl std::str::FromStr for IfAddr {
    type Err = AddrParseError;

    /// Accepts a bare address or CIDR form. The v4 grammar is tried
    /// first, falling back to v6.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        let (addr_part, prefix_part) = match parts.as_slice() {
            [a] => (*a, None),
            [a, p] => (*a, Some(*p)),
            _ => return Err(AddrParseError::Form(s.into())),
        };

        let addr = if let Ok(v4) = Ipv4Addr::from_str(addr_part) {
            IpAddr::V4(v4)
        } else if let Ok(v6) = Ipv6Addr::from_str(addr_part) {
            IpAddr::V6(v6)
        } else {
            return Err(AddrParseError::Addr(addr_part.into()));
        };

        let prefix_len = match prefix_part {
            Some(p) => u8::from_str(p)?,
            None => match addr {
                IpAddr::V4(_) => 32,
                IpAddr::V6(_) => 128,
            },
        };

        IfAddr::new(addr, prefix_len)
    }
}

impl From<IpAddr> for IfAddr {
    fn from(addr: IpAddr) -> Self {
        let prefix_len = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        Self {
            addr,
            prefix_len,
            flags: 0,
        }
    }
}

fn addr_to_u128(addr: &IpAddr) -> u128 {
    match addr {
        IpAddr::V4(a) => u32::from(*a) as u128,
        IpAddr::V6(a) => u128::from(*a),
    }
}

fn u128_to_addr(family: AddrFamily, value: u128) -> IpAddr {
    match family {
        AddrFamily::V4 => IpAddr::V4(Ipv4Addr::from(value as u32)),
        AddrFamily::V6 => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

/// Lazy allocator over the assignable host addresses of a subnet.
///
/// Yields every host address of the subnet in increasing order, each
/// carrying the subnet's prefix length. The iterator is finite and by
/// value, so a sequence of addresses can only be traversed once;
/// callers share one allocator per subnet and pull addresses off it
/// as devices need them.
///
/// If `start` is an address inside the subnet, iteration begins
/// there, and `stride` then selects every n-th address from that
/// point. A `start` outside the subnet is ignored along with
/// `stride`, and iteration begins at the first host address.
pub fn host_addresses(
    net: IpNet,
    start: Option<IpAddr>,
    stride: Option<u32>,
) -> HostAddresses {
    let (first, last) = net.host_range();
    let (cursor, stride, done) = match start {
        Some(s) if net.contains(&s) => {
            let s = addr_to_u128(&s);
            if s < first || s > last {
                // Inside the subnet but not an assignable host
                // address, nothing to yield.
                (first, 1, true)
            } else {
                (s, u128::from(stride.unwrap_or(1).max(1)), false)
            }
        }
        _ => (first, 1, false),
    };
    HostAddresses {
        family: net.family(),
        prefix_len: net.length(),
        cursor,
        last,
        stride,
        done,
    }
}

/// See [`host_addresses`].
pub struct HostAddresses {
    family: AddrFamily,
    prefix_len: u8,
    cursor: u128,
    last: u128,
    stride: u128,
    done: bool,
}

impl Iterator for HostAddresses {
    type Item = IfAddr;

    fn next(&mut self) -> Option<IfAddr> {
        if self.done {
            return None;
        }
        let addr = u128_to_addr(self.family, self.cursor);
        match self.cursor.checked_add(self.stride) {
            Some(next) if next <= self.last => self.cursor = next,
            _ => self.done = true,
        }
        Some(IfAddr {
            addr,
            prefix_len: self.prefix_len,
            flags: 0,
        })
    }
}
