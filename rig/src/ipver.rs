// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IP-version configuration axis.
//!
//! Purely combinatorial: one choice per configured address family,
//! no device side effects. Sub-test generation consults the attached
//! family to select which tracked addresses to pair up.

use crate::axis::ConfigAxis;
use crate::error::Error;
use crate::variant::{AxisId, Variant};
use rig_common::net::AddrFamily;

pub const IP_VERSION_AXIS: AxisId = AxisId("ip_version");

pub struct IpVersionAxis {
    versions: Vec<AddrFamily>,
}

impl IpVersionAxis {
    pub fn new(versions: Vec<AddrFamily>) -> Self {
        Self { versions }
    }

    /// Both families, the common default.
    pub fn all() -> Self {
        Self::new(vec![AddrFamily::V4, AddrFamily::V6])
    }
}

impl ConfigAxis for IpVersionAxis {
    fn id(&self) -> AxisId {
        IP_VERSION_AXIS
    }

    fn generate(&self, base: &Variant) -> Vec<Variant> {
        if self.versions.is_empty() {
            return vec![base.clone()];
        }
        self.versions
            .iter()
            .map(|family| {
                let mut v = base.clone();
                v.attach(IP_VERSION_AXIS, *family);
                v
            })
            .collect()
    }

    fn apply(&self, _variant: &Variant) -> Result<(), Error> {
        Ok(())
    }

    fn remove(&self, _variant: &Variant) -> Result<(), Error> {
        Ok(())
    }

    fn describe(&self, variant: &Variant) -> Vec<String> {
        match variant.get::<AddrFamily>(IP_VERSION_AXIS) {
            Some(family) => vec![format!("Testing IP version: {family}")],
            None => Vec::new(),
        }
    }
}
