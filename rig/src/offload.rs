// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! NIC offload configuration axis.
//!
//! Each choice of this axis is one combination of offload feature
//! settings (gro/gso/tso/...), applied verbatim to every target NIC.
//! On removal the features are reset to an all-enabled baseline, not
//! to their pre-test values; the coalescing axis shows the
//! alternative of restoring recorded originals.

use crate::axis::ConfigAxis;
use crate::endpoint::DevicePort;
use crate::error::Error;
use crate::platform::run_checked;
use crate::variant::{AxisId, Variant};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use slog::{warn, Logger};

pub const OFFLOAD_AXIS: AxisId = AxisId("offload");

/// One offload feature toggle, e.g. `gro on`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct OffloadSetting {
    pub feature: String,
    pub enabled: bool,
}

/// An ordered combination of offload feature settings.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct OffloadCombination {
    pub settings: Vec<OffloadSetting>,
}

impl OffloadCombination {
    pub fn from_pairs(pairs: &[(&str, bool)]) -> Self {
        Self {
            settings: pairs
                .iter()
                .map(|(feature, enabled)| OffloadSetting {
                    feature: feature.to_string(),
                    enabled: *enabled,
                })
                .collect(),
        }
    }

    /// The configured state of `feature`; features this combination
    /// does not name are reported enabled, matching device defaults.
    pub fn enabled(&self, feature: &str) -> bool {
        self.settings
            .iter()
            .find(|s| s.feature == feature)
            .map_or(true, |s| s.enabled)
    }

    pub fn any_disabled(&self) -> bool {
        self.settings.iter().any(|s| !s.enabled)
    }

    /// Feature arguments in `ethtool -K` syntax.
    fn ethtool_args(&self) -> String {
        self.settings
            .iter()
            .map(|s| {
                format!(
                    "{} {}",
                    s.feature,
                    if s.enabled { "on" } else { "off" }
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Same features, all enabled. The removal baseline.
    fn all_enabled(&self) -> Self {
        Self {
            settings: self
                .settings
                .iter()
                .map(|s| OffloadSetting {
                    feature: s.feature.clone(),
                    enabled: true,
                })
                .collect(),
        }
    }
}

impl std::fmt::Display for OffloadCombination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let desc = self
            .settings
            .iter()
            .map(|s| {
                format!(
                    "{}={}",
                    s.feature,
                    if s.enabled { "on" } else { "off" }
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        desc.fmt(f)
    }
}

pub struct OffloadAxis {
    nics: Vec<DevicePort>,
    combinations: Vec<OffloadCombination>,
    log: Logger,
}

impl OffloadAxis {
    pub fn new(
        nics: Vec<DevicePort>,
        combinations: Vec<OffloadCombination>,
        log: Logger,
    ) -> Self {
        Self {
            nics,
            combinations,
            log,
        }
    }

    fn ethtool(&self, combination: &OffloadCombination) -> Result<(), Error> {
        for nic in &self.nics {
            run_checked(
                nic.netns.as_ref(),
                &format!(
                    "ethtool -K {} {}",
                    nic.device.name(),
                    combination.ethtool_args()
                ),
            )?;
        }
        Ok(())
    }
}

impl ConfigAxis for OffloadAxis {
    fn id(&self) -> AxisId {
        OFFLOAD_AXIS
    }

    fn generate(&self, base: &Variant) -> Vec<Variant> {
        if self.combinations.is_empty() {
            return vec![base.clone()];
        }
        self.combinations
            .iter()
            .map(|combination| {
                let mut v = base.clone();
                v.attach(OFFLOAD_AXIS, combination.clone());
                v
            })
            .collect()
    }

    fn apply(&self, variant: &Variant) -> Result<(), Error> {
        match variant.get::<OffloadCombination>(OFFLOAD_AXIS) {
            Some(combination) => self.ethtool(combination),
            None => Ok(()),
        }
    }

    fn remove(&self, variant: &Variant) -> Result<(), Error> {
        let Some(combination) =
            variant.get::<OffloadCombination>(OFFLOAD_AXIS)
        else {
            return Ok(());
        };
        // Reset the touched features to on rather than to their
        // pre-test values.
        let baseline = combination.all_enabled();
        let mut last = Ok(());
        for nic in &self.nics {
            let cmd = format!(
                "ethtool -K {} {}",
                nic.device.name(),
                baseline.ethtool_args()
            );
            if let Err(e) = run_checked(nic.netns.as_ref(), &cmd) {
                warn!(
                    self.log,
                    "offload reset failed on {}: {e}",
                    nic.device.id()
                );
                last = Err(e);
            }
        }
        last
    }

    fn describe(&self, variant: &Variant) -> Vec<String> {
        match variant.get::<OffloadCombination>(OFFLOAD_AXIS) {
            Some(c) => vec![format!(
                "Currently configured offload combination: {c}"
            )],
            None => vec!["NIC offload configuration skipped".to_string()],
        }
    }
}
