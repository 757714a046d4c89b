// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Throughput sub-tests.
//!
//! A performance configuration is a set of flows measured together,
//! repeated for a number of iterations. Results carry per-interval
//! bit-rate samples for both the generator and the receiver side, and
//! are classified by flow evaluators.

use crate::flow::Flow;
use crate::results::ResultType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct PerfConf {
    /// Flows measured in parallel.
    pub flows: Vec<Flow>,
    pub iterations: u32,
}

impl PerfConf {
    pub fn new(flows: Vec<Flow>, iterations: u32) -> Self {
        Self { flows, iterations }
    }
}

/// One flow configuration set per flow combination.
pub fn generate_perf_configs(
    combinations: Vec<Vec<Flow>>,
    iterations: u32,
) -> Vec<PerfConf> {
    combinations
        .into_iter()
        .map(|flows| PerfConf::new(flows, iterations))
        .collect()
}

/// Measured samples for one flow, averaged over iterations.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FlowResult {
    /// Per-interval transmit rate in bits per second.
    pub generator_bps: Vec<f64>,
    /// Per-interval receive rate in bits per second.
    pub receiver_bps: Vec<f64>,
}

impl FlowResult {
    pub fn average_generator_bps(&self) -> f64 {
        average(&self.generator_bps)
    }

    pub fn average_receiver_bps(&self) -> f64 {
        average(&self.receiver_bps)
    }
}

fn average(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Results for one measurement, one entry per configured flow.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PerfResult {
    pub flows: Vec<FlowResult>,
}

/// Classifies measured flow results. Evaluation failures mark the
/// sub-test failed but never abort the run.
pub trait FlowEvaluator {
    fn evaluate(
        &self,
        conf: &PerfConf,
        result: &PerfResult,
    ) -> (ResultType, Vec<String>);
}

/// Baseline sanity evaluator: every flow must have moved bits in both
/// directions.
pub struct NonzeroFlowEvaluator;

impl FlowEvaluator for NonzeroFlowEvaluator {
    fn evaluate(
        &self,
        conf: &PerfConf,
        result: &PerfResult,
    ) -> (ResultType, Vec<String>) {
        let mut status = ResultType::Pass;
        let mut lines = Vec::new();
        for (i, flow) in result.flows.iter().enumerate() {
            let name = conf
                .flows
                .get(i)
                .map(|f| f.to_string())
                .unwrap_or_else(|| format!("flow {i}"));
            if flow.average_generator_bps() > 0.0
                && flow.average_receiver_bps() > 0.0
            {
                lines.push(format!("{name}: generator and receiver reported non-zero throughput"));
            } else {
                status = ResultType::Fail;
                lines.push(format!(
                    "{name}: zero throughput reported (generator {:.2} bps, receiver {:.2} bps)",
                    flow.average_generator_bps(),
                    flow.average_receiver_bps(),
                ));
            }
        }
        (status, lines)
    }
}

/// Evaluator with an explicit lower bound on the average receive
/// rate of every flow.
pub struct BoundsFlowEvaluator {
    pub min_average_bps: f64,
}

impl FlowEvaluator for BoundsFlowEvaluator {
    fn evaluate(
        &self,
        conf: &PerfConf,
        result: &PerfResult,
    ) -> (ResultType, Vec<String>) {
        let mut status = ResultType::Pass;
        let mut lines = Vec::new();
        for (i, flow) in result.flows.iter().enumerate() {
            let name = conf
                .flows
                .get(i)
                .map(|f| f.to_string())
                .unwrap_or_else(|| format!("flow {i}"));
            let measured = flow.average_receiver_bps();
            if measured < self.min_average_bps {
                status = ResultType::Fail;
                lines.push(format!(
                    "{name}: measured rate {measured:.2} bps is less than \
                     min_average_bps({:.2})",
                    self.min_average_bps
                ));
            } else {
                lines.push(format!(
                    "{name}: measured rate {measured:.2} bps is more than \
                     min_average_bps({:.2})",
                    self.min_average_bps
                ));
            }
        }
        (status, lines)
    }
}
