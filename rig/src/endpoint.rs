// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Endpoints and endpoint pairing.
//!
//! An endpoint is a (device, address) pair test traffic can be sent
//! from or to. Pairing works per address family over the addresses
//! the tracker recorded for two devices: the cross-product variant
//! pairs every address with every address of the same family, the
//! positional variant pairs them 1:1 for scenarios that need matched
//! counts (e.g. N parallel per-flow tunnels). A v4 address is never
//! paired with a v6 address.

use crate::error::Error;
use crate::platform::{Device, Netns};
use crate::tracker::ConfigTracker;
use itertools::Itertools;
use rig_common::net::{AddrFamily, IfAddr};
use std::sync::Arc;

/// One NIC as the recipe sees it: the device plus the namespace it
/// lives in.
#[derive(Clone)]
pub struct DevicePort {
    pub netns: Arc<dyn Netns>,
    pub device: Arc<dyn Device>,
}

impl DevicePort {
    pub fn new(netns: Arc<dyn Netns>, device: Arc<dyn Device>) -> Self {
        Self { netns, device }
    }
}

impl std::fmt::Debug for DevicePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DevicePort({})", self.device.id())
    }
}

#[derive(Clone)]
pub struct Endpoint {
    pub port: DevicePort,
    pub addr: IfAddr,
}

impl Endpoint {
    pub fn new(port: DevicePort, addr: IfAddr) -> Self {
        Self { port, addr }
    }

    pub fn family(&self) -> AddrFamily {
        self.addr.family()
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.port.device.id() == other.port.device.id()
            && self.addr == other.addr
    }
}

impl Eq for Endpoint {}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.port.device.id(), self.addr)
    }
}

/// One direction of pairing: `a` talks to `b`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointPair {
    pub a: Endpoint,
    pub b: Endpoint,
    /// Whether the two endpoints are routable to each other. Pairs
    /// between namespaces with no v6 path stay in the pair list for
    /// bookkeeping, but v6 probe generation skips them.
    pub reachable: bool,
}

impl EndpointPair {
    pub fn family(&self) -> AddrFamily {
        self.a.family()
    }

    pub fn reversed(&self) -> Self {
        Self {
            a: self.b.clone(),
            b: self.a.clone(),
            reachable: self.reachable,
        }
    }

    pub fn with_reachable(mut self, reachable: bool) -> Self {
        self.reachable = reachable;
        self
    }
}

fn usable(addr: &IfAddr) -> bool {
    !addr.is_link_local() && !addr.is_multicast()
}

/// Per family, the cross product of every tracked address of that
/// family on `a` with every tracked address of that family on `b`,
/// families concatenated in v4, v6 order. Link-local and multicast
/// addresses are skipped.
pub fn ip_endpoint_pairs(
    tracker: &ConfigTracker,
    a: &DevicePort,
    b: &DevicePort,
    families: &[AddrFamily],
) -> Result<Vec<EndpointPair>, Error> {
    let mut pairs = Vec::new();
    for family in families {
        let a_addrs: Vec<IfAddr> = tracker
            .addresses_of(a.device.id(), Some(*family))?
            .into_iter()
            .filter(usable)
            .collect();
        let b_addrs: Vec<IfAddr> = tracker
            .addresses_of(b.device.id(), Some(*family))?
            .into_iter()
            .filter(usable)
            .collect();

        pairs.extend(a_addrs.iter().cartesian_product(b_addrs.iter()).map(
            |(sa, sb)| EndpointPair {
                a: Endpoint::new(a.clone(), *sa),
                b: Endpoint::new(b.clone(), *sb),
                reachable: true,
            },
        ));
    }
    Ok(pairs)
}

/// Positional variant of [`ip_endpoint_pairs`]: per family the
/// addresses are paired 1:1 in assignment order, and the two sides
/// must have the same number of addresses of that family.
pub fn zip_endpoint_pairs(
    tracker: &ConfigTracker,
    a: &DevicePort,
    b: &DevicePort,
    families: &[AddrFamily],
) -> Result<Vec<EndpointPair>, Error> {
    let mut pairs = Vec::new();
    for family in families {
        let a_addrs: Vec<IfAddr> = tracker
            .addresses_of(a.device.id(), Some(*family))?
            .into_iter()
            .filter(usable)
            .collect();
        let b_addrs: Vec<IfAddr> = tracker
            .addresses_of(b.device.id(), Some(*family))?
            .into_iter()
            .filter(usable)
            .collect();

        if a_addrs.len() != b_addrs.len() {
            return Err(Error::EndpointMismatch {
                left: a_addrs.len(),
                right: b_addrs.len(),
            });
        }

        pairs.extend(a_addrs.into_iter().zip(b_addrs).map(|(sa, sb)| {
            EndpointPair {
                a: Endpoint::new(a.clone(), sa),
                b: Endpoint::new(b.clone(), sb),
                reachable: true,
            }
        }));
    }
    Ok(pairs)
}
