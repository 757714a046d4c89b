// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-run ledger of which addresses were assigned to which devices.
//!
//! One tracker is created at test-wide setup, mutated for the
//! lifetime of the run, and discarded with it. Address assignment
//! goes through [`ConfigTracker::assign_and_track`] so that the
//! ledger only ever records assignments that actually happened on the
//! device.

use crate::error::Error;
use crate::platform::Device;
use rig_common::net::{AddrFamily, IfAddr};
use slog::{debug, Logger};
use std::collections::HashMap;

pub struct ConfigTracker {
    /// Device ids in first-tracked order.
    order: Vec<String>,
    addrs: HashMap<String, Vec<IfAddr>>,
    log: Logger,
}

impl ConfigTracker {
    pub fn new(log: Logger) -> Self {
        Self {
            order: Vec::new(),
            addrs: HashMap::new(),
            log,
        }
    }

    /// Register a device with an empty address history. Tracking an
    /// already tracked device is a no-op.
    pub fn track(&mut self, device: &str) {
        if !self.addrs.contains_key(device) {
            self.order.push(device.to_string());
            self.addrs.insert(device.to_string(), Vec::new());
        }
    }

    /// Drop a device and its address history.
    pub fn untrack(&mut self, device: &str) -> Result<(), Error> {
        if self.addrs.remove(device).is_none() {
            return Err(Error::NotTracked(device.to_string()));
        }
        self.order.retain(|d| d != device);
        Ok(())
    }

    pub fn is_tracked(&self, device: &str) -> bool {
        self.addrs.contains_key(device)
    }

    /// Tracked device ids in first-tracked order.
    pub fn devices(&self) -> &[String] {
        &self.order
    }

    /// Assign `addr` on `device` and record it on success. A failed
    /// assignment leaves the ledger untouched. The device is tracked
    /// if it was not already.
    pub fn assign_and_track(
        &mut self,
        device: &dyn Device,
        addr: IfAddr,
        peer: Option<IfAddr>,
    ) -> Result<(), Error> {
        device.assign_address(&addr, peer.as_ref())?;
        self.track(device.id());
        debug!(self.log, "assigned {} to {}", addr.cidr(), device.id());
        self.addrs
            .get_mut(device.id())
            .expect("tracked above")
            .push(addr);
        Ok(())
    }

    /// Recorded addresses of `device` in assignment order, optionally
    /// filtered by family. Duplicates are legal and preserved.
    pub fn addresses_of(
        &self,
        device: &str,
        family: Option<AddrFamily>,
    ) -> Result<Vec<IfAddr>, Error> {
        let addrs = self
            .addrs
            .get(device)
            .ok_or_else(|| Error::NotTracked(device.to_string()))?;
        Ok(addrs
            .iter()
            .filter(|a| family.map_or(true, |f| a.family() == f))
            .copied()
            .collect())
    }
}
