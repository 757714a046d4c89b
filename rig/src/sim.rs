// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory platform implementations for the test suite.
//!
//! Commands, tunable writes and delivered signals are recorded so
//! tests can assert on the exact sequence of side effects the engine
//! produced. Failure injection is one-shot: `fail_next_*` arms a
//! single failure and the next call consumes it.

use crate::endpoint::DevicePort;
use crate::error::Error;
use crate::perf::{FlowResult, PerfConf, PerfResult};
use crate::ping::{PingConf, PingResult};
use crate::platform::{Device, Job, Netns, PerfTester, PingTester};
use rig_common::lock;
use rig_common::net::{IfAddr, IFA_F_TENTATIVE};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct SimDevice {
    id: String,
    name: String,
    addrs: Mutex<Vec<IfAddr>>,
    tunables: Mutex<HashMap<String, String>>,
    tunable_writes: Mutex<Vec<(String, String)>>,
    fail_next_assign: AtomicBool,
    /// While positive, `addresses` reports every address tentative
    /// and decrements. Lets tests exercise the duplicate address
    /// detection wait deterministically.
    tentative_polls: AtomicU32,
}

impl SimDevice {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn fail_next_assign(&self) {
        self.fail_next_assign.store(true, Ordering::SeqCst);
    }

    pub fn set_tentative_polls(&self, polls: u32) {
        self.tentative_polls.store(polls, Ordering::SeqCst);
    }

    /// Every tunable write in call order, including duplicates.
    pub fn tunable_writes(&self) -> Vec<(String, String)> {
        lock!(self.tunable_writes).clone()
    }

    pub fn tunable(&self, name: &str) -> Option<String> {
        lock!(self.tunables).get(name).cloned()
    }
}

impl Device for SimDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn up(&self) -> Result<(), Error> {
        Ok(())
    }

    fn down(&self) -> Result<(), Error> {
        Ok(())
    }

    fn assign_address(
        &self,
        addr: &IfAddr,
        _peer: Option<&IfAddr>,
    ) -> Result<(), Error> {
        if self.fail_next_assign.swap(false, Ordering::SeqCst) {
            return Err(Error::Config(format!(
                "{}: injected assignment failure",
                self.id
            )));
        }
        lock!(self.addrs).push(*addr);
        Ok(())
    }

    fn addresses(&self) -> Result<Vec<IfAddr>, Error> {
        let tentative = {
            let polls = &self.tentative_polls;
            if polls.load(Ordering::SeqCst) > 0 {
                polls.fetch_sub(1, Ordering::SeqCst);
                true
            } else {
                false
            }
        };
        Ok(lock!(self.addrs)
            .iter()
            .map(|a| {
                if tentative {
                    a.with_flags(IFA_F_TENTATIVE)
                } else {
                    *a
                }
            })
            .collect())
    }

    fn get_tunable(&self, name: &str) -> Result<String, Error> {
        self.tunable(name)
            .ok_or_else(|| Error::Config(format!("no tunable {name}")))
    }

    fn set_tunable(&self, name: &str, value: &str) -> Result<(), Error> {
        lock!(self.tunable_writes)
            .push((name.to_string(), value.to_string()));
        lock!(self.tunables)
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

pub struct SimJob {
    passed: bool,
    result: Option<serde_json::Value>,
    signals: Arc<Mutex<Vec<i32>>>,
}

impl Job for SimJob {
    fn wait(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn kill(&mut self, signal: i32) -> Result<(), Error> {
        lock!(self.signals).push(signal);
        Ok(())
    }

    fn passed(&self) -> bool {
        self.passed
    }

    fn result(&self) -> Option<serde_json::Value> {
        self.result.clone()
    }
}

#[derive(Default)]
pub struct SimNetns {
    hostid: String,
    devices: Mutex<HashMap<String, Arc<SimDevice>>>,
    commands: Mutex<Vec<String>>,
    signals: Arc<Mutex<Vec<i32>>>,
    background_results: Mutex<VecDeque<serde_json::Value>>,
    fail_next_run: AtomicBool,
    fail_next_background: AtomicBool,
}

impl SimNetns {
    pub fn new(hostid: &str) -> Arc<Self> {
        Arc::new(Self {
            hostid: hostid.to_string(),
            ..Default::default()
        })
    }

    pub fn add_device(&self, device: Arc<SimDevice>) {
        lock!(self.devices).insert(device.name.clone(), device);
    }

    pub fn device(&self, name: &str) -> Option<Arc<SimDevice>> {
        lock!(self.devices).get(name).cloned()
    }

    /// Every dispatched command in call order, foreground and
    /// background alike.
    pub fn commands(&self) -> Vec<String> {
        lock!(self.commands).clone()
    }

    /// Signals delivered to jobs spawned from this namespace.
    pub fn signals(&self) -> Vec<i32> {
        lock!(self.signals).clone()
    }

    /// Structured output for the next background job.
    pub fn queue_background_result(&self, result: serde_json::Value) {
        lock!(self.background_results).push_back(result);
    }

    pub fn fail_next_run(&self) {
        self.fail_next_run.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_background(&self) {
        self.fail_next_background.store(true, Ordering::SeqCst);
    }
}

impl Netns for SimNetns {
    fn hostid(&self) -> &str {
        &self.hostid
    }

    fn run(&self, cmd: &str) -> Result<Box<dyn Job>, Error> {
        lock!(self.commands).push(cmd.to_string());
        Ok(Box::new(SimJob {
            passed: !self.fail_next_run.swap(false, Ordering::SeqCst),
            result: None,
            signals: self.signals.clone(),
        }))
    }

    fn run_background(&self, cmd: &str) -> Result<Box<dyn Job>, Error> {
        lock!(self.commands).push(cmd.to_string());
        let passed =
            !self.fail_next_background.swap(false, Ordering::SeqCst);
        let result = lock!(self.background_results).pop_front();
        Ok(Box::new(SimJob {
            passed,
            result,
            signals: self.signals.clone(),
        }))
    }
}

/// Register a fresh device named `name` in `ns` and return the
/// corresponding port. The device id is `hostid.name`.
pub fn sim_port(ns: &Arc<SimNetns>, name: &str) -> DevicePort {
    let device = Arc::new(SimDevice::new(
        &format!("{}.{name}", ns.hostid),
        name,
    ));
    ns.add_device(device.clone());
    DevicePort::new(ns.clone(), device)
}

/// Scripted ping collaborator. Queued results are consumed in order;
/// with the queue empty every probe reports full delivery.
#[derive(Default)]
pub struct SimPingTester {
    queue: Mutex<VecDeque<Result<PingResult, Error>>>,
    runs: Mutex<Vec<PingConf>>,
}

impl SimPingTester {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_result(&self, result: Result<PingResult, Error>) {
        lock!(self.queue).push_back(result);
    }

    /// Configurations in run order.
    pub fn runs(&self) -> Vec<PingConf> {
        lock!(self.runs).clone()
    }
}

impl PingTester for SimPingTester {
    fn run(&self, conf: &PingConf) -> Result<PingResult, Error> {
        lock!(self.runs).push(conf.clone());
        match lock!(self.queue).pop_front() {
            Some(result) => result,
            None => Ok(PingResult {
                sent: conf.count,
                received: conf.count,
                rate: 100,
            }),
        }
    }
}

/// Scripted throughput collaborator, same queueing model as
/// [`SimPingTester`].
#[derive(Default)]
pub struct SimPerfTester {
    queue: Mutex<VecDeque<Result<PerfResult, Error>>>,
    runs: Mutex<Vec<PerfConf>>,
}

impl SimPerfTester {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_result(&self, result: Result<PerfResult, Error>) {
        lock!(self.queue).push_back(result);
    }

    pub fn runs(&self) -> Vec<PerfConf> {
        lock!(self.runs).clone()
    }
}

impl PerfTester for SimPerfTester {
    fn run(&self, conf: &PerfConf) -> Result<PerfResult, Error> {
        lock!(self.runs).push(conf.clone());
        match lock!(self.queue).pop_front() {
            Some(result) => result,
            None => Ok(PerfResult {
                flows: conf
                    .flows
                    .iter()
                    .map(|_| FlowResult {
                        generator_bps: vec![1e9; 3],
                        receiver_bps: vec![0.95e9; 3],
                    })
                    .collect(),
            }),
        }
    }
}
