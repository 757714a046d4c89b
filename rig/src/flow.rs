// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test-traffic flows and the flow-combination generator.
//!
//! A flow describes one direction of measured traffic between two
//! endpoints. Flow combinations are generated per variant by nested
//! iteration over address family, traffic pattern and message size.
//! The generator consults the variant's offload attachment to prune
//! combinations known invalid for the domain; a pruned combination
//! produces no flow at all and is only visible in the debug log.

use crate::axis::ConfigAxis;
use crate::endpoint::{Endpoint, EndpointPair};
use crate::error::Error;
use crate::ipver::IP_VERSION_AXIS;
use crate::offload::{OffloadCombination, OFFLOAD_AXIS};
use crate::variant::{AxisId, Variant};
use rand::Rng;
use rig_common::net::AddrFamily;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use slog::{debug, Logger};
use std::time::Duration;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum FlowKind {
    TcpStream,
    UdpStream,
    SctpStream,
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TcpStream => write!(f, "tcp_stream"),
            Self::UdpStream => write!(f, "udp_stream"),
            Self::SctpStream => write!(f, "sctp_stream"),
        }
    }
}

/// How a configured cpu list is assigned to measurement processes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CpuPinPolicy {
    /// Every process is pinned to all configured cpus.
    All,
    /// Process N is pinned to exactly one cpu, round-robin.
    RoundRobin,
}

impl CpuPinPolicy {
    pub fn pin_for(
        &self,
        cpus: Option<&Vec<u32>>,
        process_no: usize,
    ) -> Option<Vec<u32>> {
        let cpus = cpus?;
        if cpus.is_empty() {
            return None;
        }
        match self {
            Self::All => Some(cpus.clone()),
            Self::RoundRobin => Some(vec![cpus[process_no % cpus.len()]]),
        }
    }
}

/// One direction of measured test traffic.
#[derive(Clone, Debug, PartialEq)]
pub struct Flow {
    pub kind: FlowKind,
    pub generator: Endpoint,
    pub generator_cpupin: Option<Vec<u32>>,
    pub receiver: Endpoint,
    pub receiver_cpupin: Option<Vec<u32>>,
    pub receiver_port: u16,
    pub msg_size: u32,
    pub duration: Duration,
    pub parallel_streams: u32,
}

impl Flow {
    pub fn family(&self) -> AddrFamily {
        self.generator.family()
    }

    /// The exact mirror of this flow: generator and receiver roles
    /// swapped, nothing else changed. Reversing twice yields a flow
    /// equal to the original.
    pub fn reverse(&self) -> Flow {
        Flow {
            kind: self.kind,
            generator: self.receiver.clone(),
            generator_cpupin: self.receiver_cpupin.clone(),
            receiver: self.generator.clone(),
            receiver_cpupin: self.generator_cpupin.clone(),
            receiver_port: self.receiver_port,
            msg_size: self.msg_size,
            duration: self.duration,
            parallel_streams: self.parallel_streams,
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:?} -> {:?} msg_size={} duration={} streams={}",
            self.kind,
            self.generator,
            self.receiver,
            self.msg_size,
            humantime::format_duration(self.duration),
            self.parallel_streams,
        )
    }
}

/// Knobs for [`generate_flow_combinations`].
#[derive(Clone, Debug)]
pub struct FlowParams {
    pub kinds: Vec<FlowKind>,
    pub msg_sizes: Vec<u32>,
    pub duration: Duration,
    pub parallel_streams: u32,
    /// Number of measurement processes per combination; each gets its
    /// own flow record and cpu pin.
    pub parallel_processes: usize,
    pub generator_cpus: Option<Vec<u32>>,
    pub generator_cpu_policy: CpuPinPolicy,
    pub receiver_cpus: Option<Vec<u32>>,
    pub receiver_cpu_policy: CpuPinPolicy,
    /// Also measure the mirrored reverse direction.
    pub bidirect: bool,
    /// Swap generator and receiver roles wholesale, for asymmetric
    /// scenarios measured from the far side.
    pub reverse: bool,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            kinds: vec![FlowKind::TcpStream],
            msg_sizes: vec![16384],
            duration: Duration::from_secs(60),
            parallel_streams: 1,
            parallel_processes: 1,
            generator_cpus: None,
            generator_cpu_policy: CpuPinPolicy::All,
            receiver_cpus: None,
            receiver_cpu_policy: CpuPinPolicy::All,
            bidirect: false,
            reverse: false,
        }
    }
}

pub const FLOW_AXIS: AxisId = AxisId("flows");

/// Axis wrapper for flow generation. A single-choice axis: it never
/// multiplies the variant count, it attaches the flow parameters so
/// sub-test generation can pick them up per variant. Its real job is
/// the `requires` declaration: the pruning predicate below consults
/// the offload attachment, so the offload axis must be nested inside
/// this one, and [`crate::axis::AxisChain::new`] rejects chains that
/// get this wrong.
pub struct FlowAxis {
    params: FlowParams,
}

impl FlowAxis {
    pub fn new(params: FlowParams) -> Self {
        Self { params }
    }
}

impl ConfigAxis for FlowAxis {
    fn id(&self) -> AxisId {
        FLOW_AXIS
    }

    fn requires(&self) -> &[AxisId] {
        &[OFFLOAD_AXIS]
    }

    fn generate(&self, base: &Variant) -> Vec<Variant> {
        let mut v = base.clone();
        v.attach(FLOW_AXIS, self.params.clone());
        vec![v]
    }

    fn apply(&self, _variant: &Variant) -> Result<(), Error> {
        Ok(())
    }

    fn remove(&self, _variant: &Variant) -> Result<(), Error> {
        Ok(())
    }

    fn describe(&self, variant: &Variant) -> Vec<String> {
        match variant.get::<FlowParams>(FLOW_AXIS) {
            Some(params) => vec![format!(
                "Flow types: {}",
                params
                    .kinds
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            )],
            None => Vec::new(),
        }
    }
}

/// Whether the variant's offload combination is known to break flows
/// of this kind.
fn offload_conflict(offload: &OffloadCombination, kind: FlowKind) -> bool {
    match kind {
        // Udp streams fragment without generic receive offload.
        FlowKind::UdpStream => !offload.enabled("gro"),
        // Sctp streams conflict with partial offload setups while
        // segmentation offload stays on.
        FlowKind::SctpStream => {
            offload.any_disabled() && offload.enabled("gso")
        }
        FlowKind::TcpStream => false,
    }
}

/// Generate the flow combinations to measure for one variant: per
/// endpoint pair of the selected family, one combination per
/// {traffic pattern} x {message size}, each holding one flow per
/// measurement process plus mirrored flows when requested.
pub fn generate_flow_combinations(
    variant: &Variant,
    pairs: &[EndpointPair],
    params: &FlowParams,
    log: &Logger,
) -> Vec<Vec<Flow>> {
    let families: Vec<AddrFamily> = match variant
        .get::<AddrFamily>(IP_VERSION_AXIS)
    {
        Some(family) => vec![*family],
        None => vec![AddrFamily::V4, AddrFamily::V6],
    };
    let offload = variant.get::<OffloadCombination>(OFFLOAD_AXIS);

    let mut combinations = Vec::new();
    for pair in pairs {
        if !families.contains(&pair.family()) {
            continue;
        }
        let pair = if params.reverse { pair.reversed() } else { pair.clone() };
        for kind in &params.kinds {
            if let Some(offload) = offload {
                if offload_conflict(offload, *kind) {
                    debug!(
                        log,
                        "skipping {kind} flows, conflicts with \
                         offload combination {offload}"
                    );
                    continue;
                }
            }
            for msg_size in &params.msg_sizes {
                let mut flows = Vec::new();
                let port: u16 = rand::thread_rng().gen_range(10_000..60_000);
                for process_no in 0..params.parallel_processes.max(1) {
                    let flow = Flow {
                        kind: *kind,
                        generator: pair.a.clone(),
                        generator_cpupin: params
                            .generator_cpu_policy
                            .pin_for(
                                params.generator_cpus.as_ref(),
                                process_no,
                            ),
                        receiver: pair.b.clone(),
                        receiver_cpupin: params.receiver_cpu_policy.pin_for(
                            params.receiver_cpus.as_ref(),
                            process_no,
                        ),
                        receiver_port: port + process_no as u16,
                        msg_size: *msg_size,
                        duration: params.duration,
                        parallel_streams: params.parallel_streams,
                    };
                    if params.bidirect {
                        flows.push(flow.reverse());
                    }
                    flows.push(flow);
                }
                combinations.push(flows);
            }
        }
    }
    combinations
}
