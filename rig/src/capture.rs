// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Packet-assert capture sub-tests.
//!
//! A capture runs as a background sniffer job on one interface while
//! other sub-tests generate traffic, then reports how many packets
//! matched a filter expression. The count is checked against an
//! inclusive window; a max of zero means unbounded above.

use crate::error::Error;
use crate::platform::{Netns, SIGINT};
use crate::results::ResultType;
use slog::{info, warn, Logger};
use std::sync::Arc;

#[derive(Clone)]
pub struct PacketAssertConf {
    pub netns: Arc<dyn Netns>,
    /// Interface to sniff on.
    pub iface: String,
    /// Capture filter expression, pcap syntax.
    pub filter: String,
    pub min_packets: u64,
    /// Inclusive upper bound; zero disables the upper bound.
    pub max_packets: u64,
    pub promiscuous: bool,
}

impl PacketAssertConf {
    fn command(&self) -> String {
        let mut cmd = format!("packet-assert -i {}", self.iface);
        if self.promiscuous {
            cmd.push_str(" -p");
        }
        if !self.filter.is_empty() {
            cmd.push_str(&format!(" -f '{}'", self.filter));
        }
        cmd
    }

    pub fn describe(&self) -> String {
        format!(
            "PacketAssert on {}:{} filter '{}'",
            self.netns.hostid(),
            self.iface,
            self.filter,
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CaptureState {
    NotStarted,
    Running,
    Stopped,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    /// Packets that matched the filter.
    pub matched: u64,
}

/// Lifecycle handle for one background capture. Starting twice is an
/// error and leaves the running capture untouched; stopping delivers
/// SIGINT, reaps the job and reads the matched-packet count from its
/// structured output.
pub struct CaptureHandle {
    state: CaptureState,
    job: Option<Box<dyn crate::platform::Job>>,
    log: Logger,
}

impl CaptureHandle {
    pub fn new(log: Logger) -> Self {
        Self {
            state: CaptureState::NotStarted,
            job: None,
            log,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn start(&mut self, conf: &PacketAssertConf) -> Result<(), Error> {
        if self.state == CaptureState::Running {
            return Err(Error::CaptureAlreadyRunning);
        }
        info!(self.log, "starting capture: {}", conf.describe());
        let job = conf.netns.run_background(&conf.command())?;
        self.job = Some(job);
        self.state = CaptureState::Running;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<CaptureResult, Error> {
        if self.state != CaptureState::Running {
            return Err(Error::CaptureNotRunning);
        }
        // job is always present while running
        let mut job = self
            .job
            .take()
            .ok_or(Error::CaptureNotRunning)?;
        job.kill(SIGINT)?;
        job.wait()?;
        self.state = CaptureState::Stopped;

        if !job.passed() {
            warn!(self.log, "capture job failed, reporting zero packets");
            return Ok(CaptureResult { matched: 0 });
        }
        let matched = job
            .result()
            .as_ref()
            .and_then(|v| v.get("p_recv"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        Ok(CaptureResult { matched })
    }
}

/// Check a capture result against the configured packet window.
pub fn evaluate_capture(
    conf: &PacketAssertConf,
    result: &CaptureResult,
) -> (ResultType, Vec<String>) {
    let matched = result.matched;
    let within = matched >= conf.min_packets
        && (conf.max_packets == 0 || matched <= conf.max_packets);
    let bound = if conf.max_packets == 0 {
        "unbounded".to_string()
    } else {
        conf.max_packets.to_string()
    };
    let lines = vec![format!(
        "{}: matched {matched} packets, expected between {} and {}",
        conf.describe(),
        conf.min_packets,
        bound,
    )];
    (ResultType::passed(within), lines)
}
