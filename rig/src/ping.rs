// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reachability (ping) sub-tests.
//!
//! A ping configuration binds a client endpoint to a destination
//! endpoint with probe count, interval and packet size. Results are
//! classified by rate evaluators with explicit bounds; an out-of-
//! bounds result is recorded as a failed sub-test, it never aborts
//! the surrounding run.

use crate::endpoint::{Endpoint, EndpointPair};
use crate::error::Error;
use crate::ipver::IP_VERSION_AXIS;
use crate::results::ResultType;
use crate::variant::Variant;
use rig_common::net::AddrFamily;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct PingConf {
    pub client: Endpoint,
    pub destination: Endpoint,
    pub count: u32,
    pub interval: Duration,
    pub size: u32,
    pub evaluators: Vec<RatePingEvaluator>,
}

impl PingConf {
    /// The same probe in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            client: self.destination.clone(),
            destination: self.client.clone(),
            count: self.count,
            interval: self.interval,
            size: self.size,
            evaluators: self.evaluators.clone(),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "From: <{} ({})> To: <{} ({})>",
            self.client.port.netns.hostid(),
            self.client.addr,
            self.destination.port.netns.hostid(),
            self.destination.addr,
        )
    }
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub struct PingResult {
    pub sent: u32,
    pub received: u32,
    /// Delivery rate in percent.
    pub rate: u32,
}

/// Classifies a ping result against explicit rate bounds. At least
/// one bound must be configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePingEvaluator {
    min_rate: Option<u32>,
    max_rate: Option<u32>,
    rate: Option<u32>,
}

impl RatePingEvaluator {
    pub fn new(
        min_rate: Option<u32>,
        max_rate: Option<u32>,
        rate: Option<u32>,
    ) -> Result<Self, Error> {
        if min_rate.is_none() && max_rate.is_none() && rate.is_none() {
            return Err(Error::Evaluator(
                "rate evaluator requires at least one of min_rate, \
                 max_rate and rate"
                    .to_string(),
            ));
        }
        Ok(Self {
            min_rate,
            max_rate,
            rate,
        })
    }

    pub fn min_rate(min_rate: u32) -> Self {
        Self {
            min_rate: Some(min_rate),
            max_rate: None,
            rate: None,
        }
    }

    pub fn evaluate(&self, result: &PingResult) -> (ResultType, Vec<String>) {
        let mut status = ResultType::Pass;
        let mut lines = Vec::new();
        let measured = result.rate;

        if let Some(min) = self.min_rate {
            if measured < min {
                status = ResultType::Fail;
                lines.push(format!(
                    "measured rate {measured} is less than min_rate({min})"
                ));
            } else {
                lines.push(format!(
                    "measured rate {measured} is more than min_rate({min})"
                ));
            }
        }
        if let Some(max) = self.max_rate {
            if measured > max {
                status = ResultType::Fail;
                lines.push(format!(
                    "measured rate {measured} is more than max_rate({max})"
                ));
            } else {
                lines.push(format!(
                    "measured rate {measured} is less than max_rate({max})"
                ));
            }
        }
        if let Some(rate) = self.rate {
            if measured != rate {
                status = ResultType::Fail;
                lines.push(format!(
                    "measured rate {measured} is different than rate({rate})"
                ));
            } else {
                lines.push(format!(
                    "measured rate {measured} is equal to rate({rate})"
                ));
            }
        }
        (status, lines)
    }
}

/// Knobs for [`generate_ping_configs`].
#[derive(Clone, Debug)]
pub struct PingParams {
    pub count: u32,
    pub interval: Duration,
    pub size: u32,
    /// Probe every address pair of the selected family instead of
    /// just the first.
    pub parallel: bool,
    /// Also probe the reverse direction.
    pub bidirect: bool,
    pub evaluators: Vec<RatePingEvaluator>,
}

impl Default for PingParams {
    fn default() -> Self {
        Self {
            count: 100,
            interval: Duration::from_millis(200),
            size: 56,
            parallel: false,
            bidirect: false,
            evaluators: vec![RatePingEvaluator::min_rate(50)],
        }
    }
}

/// Generate the ping configurations for one variant, batched per
/// address family. Pairs whose family the variant's ip-version
/// attachment does not select are skipped; without the attachment
/// both families are probed. Pairs flagged unreachable produce no v6
/// probes, since a missing v6 path between namespaces is an expected
/// topology property rather than a test failure.
pub fn generate_ping_configs(
    variant: &Variant,
    pairs: &[EndpointPair],
    params: &PingParams,
) -> Vec<Vec<PingConf>> {
    let families: Vec<AddrFamily> =
        match variant.get::<AddrFamily>(IP_VERSION_AXIS) {
            Some(family) => vec![*family],
            None => vec![AddrFamily::V4, AddrFamily::V6],
        };

    let mut batches = Vec::new();
    for family in families {
        let mut batch = Vec::new();
        for pair in pairs.iter().filter(|p| p.family() == family) {
            if family == AddrFamily::V6 && !pair.reachable {
                continue;
            }
            let conf = PingConf {
                client: pair.a.clone(),
                destination: pair.b.clone(),
                count: params.count,
                interval: params.interval,
                size: params.size,
                evaluators: params.evaluators.clone(),
            };
            if params.bidirect {
                batch.push(conf.reversed());
            }
            batch.push(conf);
            if !params.parallel {
                break;
            }
        }
        if !batch.is_empty() {
            batches.push(batch);
        }
    }
    batches
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::endpoint::ip_endpoint_pairs;
    use crate::sim::{sim_port, SimNetns};
    use crate::tracker::ConfigTracker;
    use pretty_assertions::assert_eq;
    use rig_common::ifaddr;
    use slog::Logger;

    fn test_logger() -> Logger {
        rig_common::log::build_logger(std::io::stdout())
    }

    #[test]
    fn evaluator_requires_a_bound() {
        assert!(RatePingEvaluator::new(None, None, None).is_err());

        let eval = RatePingEvaluator::min_rate(50);
        let (ok, _) = eval.evaluate(&PingResult {
            sent: 100,
            received: 80,
            rate: 80,
        });
        assert_eq!(ok, ResultType::Pass);

        let (bad, lines) = eval.evaluate(&PingResult {
            sent: 100,
            received: 10,
            rate: 10,
        });
        assert_eq!(bad, ResultType::Fail);
        assert_eq!(
            lines,
            vec!["measured rate 10 is less than min_rate(50)"]
        );
    }

    #[test]
    fn exact_and_max_bounds() {
        let eval =
            RatePingEvaluator::new(None, Some(90), Some(85)).unwrap();
        let (status, lines) = eval.evaluate(&PingResult {
            sent: 100,
            received: 85,
            rate: 85,
        });
        assert_eq!(status, ResultType::Pass);
        assert_eq!(lines.len(), 2);

        let (status, _) = eval.evaluate(&PingResult {
            sent: 100,
            received: 95,
            rate: 95,
        });
        assert_eq!(status, ResultType::Fail);
    }

    #[test]
    fn config_generation_per_family() {
        let ns1 = SimNetns::new("host1");
        let ns2 = SimNetns::new("host2");
        let a = sim_port(&ns1, "eth0");
        let b = sim_port(&ns2, "eth0");
        let mut tracker = ConfigTracker::new(test_logger());
        tracker
            .assign_and_track(
                a.device.as_ref(),
                ifaddr!("192.168.101.1/24"),
                None,
            )
            .unwrap();
        tracker
            .assign_and_track(a.device.as_ref(), ifaddr!("fc00::1/64"), None)
            .unwrap();
        tracker
            .assign_and_track(
                b.device.as_ref(),
                ifaddr!("192.168.101.2/24"),
                None,
            )
            .unwrap();
        tracker
            .assign_and_track(b.device.as_ref(), ifaddr!("fc00::2/64"), None)
            .unwrap();
        let pairs = ip_endpoint_pairs(
            &tracker,
            &a,
            &b,
            &[AddrFamily::V4, AddrFamily::V6],
        )
        .unwrap();

        let batches = generate_ping_configs(
            &Variant::new(),
            &pairs,
            &PingParams::default(),
        );
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].client.family(), AddrFamily::V4);
        assert_eq!(batches[1][0].client.family(), AddrFamily::V6);

        let mut variant = Variant::new();
        variant.attach(IP_VERSION_AXIS, AddrFamily::V6);
        let params = PingParams {
            bidirect: true,
            ..Default::default()
        };
        let batches = generate_ping_configs(&variant, &pairs, &params);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0][0].client, batches[0][1].destination);
    }

    #[test]
    fn unreachable_pairs_produce_no_v6_probes() {
        let ns1 = SimNetns::new("host1");
        let ns2 = SimNetns::new("host2");
        let a = sim_port(&ns1, "eth0");
        let b = sim_port(&ns2, "eth0");
        let mut tracker = ConfigTracker::new(test_logger());
        tracker
            .assign_and_track(
                a.device.as_ref(),
                ifaddr!("192.168.101.1/24"),
                None,
            )
            .unwrap();
        tracker
            .assign_and_track(a.device.as_ref(), ifaddr!("fc00::1/64"), None)
            .unwrap();
        tracker
            .assign_and_track(
                b.device.as_ref(),
                ifaddr!("192.168.101.2/24"),
                None,
            )
            .unwrap();
        tracker
            .assign_and_track(b.device.as_ref(), ifaddr!("fc00::2/64"), None)
            .unwrap();
        let pairs: Vec<_> = ip_endpoint_pairs(
            &tracker,
            &a,
            &b,
            &[AddrFamily::V4, AddrFamily::V6],
        )
        .unwrap()
        .into_iter()
        .map(|p| p.with_reachable(false))
        .collect();

        // The v4 probe survives, the v6 one is dropped entirely.
        let batches = generate_ping_configs(
            &Variant::new(),
            &pairs,
            &PingParams::default(),
        );
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].client.family(), AddrFamily::V4);

        // A v6-only variant over unreachable pairs probes nothing.
        let mut variant = Variant::new();
        variant.attach(IP_VERSION_AXIS, AddrFamily::V6);
        let batches = generate_ping_configs(
            &variant,
            &pairs,
            &PingParams::default(),
        );
        assert!(batches.is_empty());
    }

    #[test]
    fn reversed_conf_swaps_endpoints() {
        let ns1 = SimNetns::new("host1");
        let ns2 = SimNetns::new("host2");
        let a = sim_port(&ns1, "eth0");
        let b = sim_port(&ns2, "eth0");
        let conf = PingConf {
            client: Endpoint::new(a, ifaddr!("192.168.101.1/24")),
            destination: Endpoint::new(b, ifaddr!("192.168.101.2/24")),
            count: 100,
            interval: Duration::from_millis(200),
            size: 56,
            evaluators: vec![],
        };
        let rev = conf.reversed();
        assert_eq!(rev.client, conf.destination);
        assert_eq!(rev.destination, conf.client);
        assert_eq!(rev.reversed().client, conf.client);
    }
}
