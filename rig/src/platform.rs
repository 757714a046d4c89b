// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collaborator contracts the engine drives remote hosts through.
//!
//! The engine never issues `ip`/`tc`/`ethtool` calls itself, it goes
//! through these traits. Production implementations live with the
//! controller/agent transport; the test suite uses the in-memory
//! implementations in [`crate::sim`].

use crate::error::Error;
use crate::perf::{PerfConf, PerfResult};
use crate::ping::{PingConf, PingResult};
use rig_common::net::IfAddr;
use std::time::{Duration, Instant};

/// Conventional cancellation signal for background jobs.
pub const SIGINT: i32 = 2;

/// One network device (NIC, bond, bridge port, ...) on some host or
/// namespace. Address assignment may leave the address tentative
/// until duplicate address detection finishes; `addresses` reports
/// the current flags.
pub trait Device: Send + Sync {
    /// Identifier unique within one run, e.g. `host1.eth0`.
    fn id(&self) -> &str;

    /// Interface name on the host, e.g. `eth0`.
    fn name(&self) -> &str;

    fn up(&self) -> Result<(), Error>;

    fn down(&self) -> Result<(), Error>;

    /// Assign `addr`, optionally with a point-to-point `peer`.
    fn assign_address(
        &self,
        addr: &IfAddr,
        peer: Option<&IfAddr>,
    ) -> Result<(), Error>;

    /// Currently assigned addresses with their current flags.
    fn addresses(&self) -> Result<Vec<IfAddr>, Error>;

    /// Read a named device tunable (coalescing parameter, queue
    /// count, ...).
    fn get_tunable(&self, name: &str) -> Result<String, Error>;

    /// Set a named device tunable.
    fn set_tunable(&self, name: &str, value: &str) -> Result<(), Error>;
}

/// A handle for a command dispatched to a host or namespace.
///
/// Foreground jobs come back already finished. Background jobs must
/// be killed and waited on before their result is consumed, or a
/// zombie is left on the remote host.
pub trait Job: Send {
    /// Block until the job finishes.
    fn wait(&mut self) -> Result<(), Error>;

    /// Send `signal` to the running job.
    fn kill(&mut self, signal: i32) -> Result<(), Error>;

    /// Whether the job finished successfully.
    fn passed(&self) -> bool;

    /// Structured job output, available once the job has finished.
    fn result(&self) -> Option<serde_json::Value>;
}

/// A host or network namespace commands can be dispatched to.
pub trait Netns: Send + Sync {
    /// Identifier for log and description lines, e.g. `host1`.
    fn hostid(&self) -> &str;

    /// Run `cmd` to completion.
    fn run(&self, cmd: &str) -> Result<Box<dyn Job>, Error>;

    /// Start `cmd` in the background and return its handle.
    fn run_background(&self, cmd: &str) -> Result<Box<dyn Job>, Error>;
}

/// Run a command and fail if the job did not pass.
pub fn run_checked(ns: &dyn Netns, cmd: &str) -> Result<(), Error> {
    let job = ns.run(cmd)?;
    if !job.passed() {
        return Err(Error::Job(format!("{}: {cmd}", ns.hostid())));
    }
    Ok(())
}

/// Reachability sub-test collaborator.
pub trait PingTester {
    fn run(&self, conf: &PingConf) -> Result<PingResult, Error>;
}

/// Performance sub-test collaborator.
pub trait PerfTester {
    fn run(&self, conf: &PerfConf) -> Result<PerfResult, Error>;
}

/// Block until `condition` returns true, polling every `poll`, for at
/// most `timeout`. The only suspension point the engine uses; it is
/// not retried beyond the timeout.
pub fn wait_for_condition<F>(
    mut condition: F,
    timeout: Duration,
    poll: Duration,
) -> Result<(), Error>
where
    F: FnMut() -> Result<bool, Error>,
{
    let start = Instant::now();
    loop {
        if condition()? {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(Error::Timeout(timeout));
        }
        std::thread::sleep(poll);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wait_for_condition_bounded() {
        let mut n = 0;
        wait_for_condition(
            || {
                n += 1;
                Ok(n >= 3)
            },
            Duration::from_secs(5),
            Duration::from_millis(1),
        )
        .expect("condition reached");
        assert_eq!(n, 3);

        let r = wait_for_condition(
            || Ok(false),
            Duration::from_millis(10),
            Duration::from_millis(1),
        );
        assert!(matches!(r, Err(Error::Timeout(_))));
    }
}
