// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interrupt-coalescing configuration axis.
//!
//! A single-choice hardware axis: it does not multiply the variant
//! count, it decorates every variant with one set of coalescing
//! tunables. Adaptive rx/tx are turned off first, before the numeric
//! settings, since the hardware rejects explicit values while
//! adaptive mode is active. Unlike the offload axis, removal restores
//! the original values recorded at apply time.

use crate::axis::ConfigAxis;
use crate::endpoint::DevicePort;
use crate::error::Error;
use crate::variant::{AxisId, Variant};
use rig_common::lock;
use slog::{warn, Logger};
use std::collections::HashMap;
use std::sync::Mutex;

pub const COALESCING_AXIS: AxisId = AxisId("coalescing");

/// Coalescing tunables in `ethtool -C` naming: `adaptive-rx`,
/// `adaptive-tx` first, then numeric parameters such as `rx-usecs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoalescingSettings {
    pub adaptive_rx: Option<bool>,
    pub adaptive_tx: Option<bool>,
    pub values: Vec<(String, u64)>,
}

impl CoalescingSettings {
    /// Tunable name/value pairs in application order.
    fn pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(rx) = self.adaptive_rx {
            out.push(("adaptive-rx".to_string(), onoff(rx)));
        }
        if let Some(tx) = self.adaptive_tx {
            out.push(("adaptive-tx".to_string(), onoff(tx)));
        }
        for (name, value) in &self.values {
            out.push((name.clone(), value.to_string()));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.adaptive_rx.is_none()
            && self.adaptive_tx.is_none()
            && self.values.is_empty()
    }
}

fn onoff(enabled: bool) -> String {
    if enabled { "on" } else { "off" }.to_string()
}

/// Attachment recording what was configured and, per device and
/// tunable, the original value to restore on removal. Originals are
/// recorded at apply time, so the attachment carries them behind a
/// mutex.
struct CoalescingState {
    settings: CoalescingSettings,
    originals: Mutex<HashMap<(String, String), String>>,
}

pub struct CoalescingAxis {
    nics: Vec<DevicePort>,
    settings: CoalescingSettings,
    log: Logger,
}

impl CoalescingAxis {
    pub fn new(
        nics: Vec<DevicePort>,
        settings: CoalescingSettings,
        log: Logger,
    ) -> Self {
        Self {
            nics,
            settings,
            log,
        }
    }
}

impl ConfigAxis for CoalescingAxis {
    fn id(&self) -> AxisId {
        COALESCING_AXIS
    }

    fn generate(&self, base: &Variant) -> Vec<Variant> {
        if self.settings.is_empty() {
            return vec![base.clone()];
        }
        let mut v = base.clone();
        v.attach(
            COALESCING_AXIS,
            CoalescingState {
                settings: self.settings.clone(),
                originals: Mutex::new(HashMap::new()),
            },
        );
        vec![v]
    }

    fn apply(&self, variant: &Variant) -> Result<(), Error> {
        let Some(state) = variant.get::<CoalescingState>(COALESCING_AXIS)
        else {
            return Ok(());
        };
        for nic in &self.nics {
            for (name, value) in state.settings.pairs() {
                let original = nic.device.get_tunable(&name)?;
                nic.device.set_tunable(&name, &value)?;
                lock!(state.originals)
                    .insert((nic.device.id().to_string(), name), original);
            }
        }
        Ok(())
    }

    fn remove(&self, variant: &Variant) -> Result<(), Error> {
        let Some(state) = variant.get::<CoalescingState>(COALESCING_AXIS)
        else {
            return Ok(());
        };
        let originals = lock!(state.originals).clone();
        let mut last = Ok(());
        for nic in &self.nics {
            // Restore in reverse application order so adaptive modes
            // come back last.
            for (name, _) in state.settings.pairs().iter().rev() {
                let key = (nic.device.id().to_string(), name.clone());
                let Some(original) = originals.get(&key) else {
                    // Apply never got this far on this device.
                    continue;
                };
                if let Err(e) = nic.device.set_tunable(name, original) {
                    warn!(
                        self.log,
                        "failed to restore {name} on {}: {e}",
                        nic.device.id()
                    );
                    last = Err(e);
                }
            }
        }
        last
    }

    fn describe(&self, variant: &Variant) -> Vec<String> {
        match variant.get::<CoalescingState>(COALESCING_AXIS) {
            Some(state) => state
                .settings
                .pairs()
                .iter()
                .map(|(name, value)| {
                    format!("Coalescing {name} configured: {value}")
                })
                .collect(),
            None => vec!["Coalescing configuration skipped".to_string()],
        }
    }
}
