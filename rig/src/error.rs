// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

/// Engine error taxonomy.
///
/// Configuration-side failures (`Config`, `NotTracked`, `AxisOrder`,
/// `Timeout`) are fatal to the remaining variants of a run and
/// propagate. Sub-test failures are not errors at all, they are
/// recorded as failed results. Cleanup failures are logged by the
/// caller and swallowed.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration failed: {0}")]
    Config(String),

    #[error("device {0} is not tracked")]
    NotTracked(String),

    #[error("axis {axis} requires {requires} to be nested inside it")]
    AxisOrder { axis: String, requires: String },

    #[error("duplicate axis {0} in chain")]
    DuplicateAxis(String),

    #[error("endpoint address lists differ in size: {left} vs {right}")]
    EndpointMismatch { left: usize, right: usize },

    #[error("evaluator misconfigured: {0}")]
    Evaluator(String),

    #[error("a capture job is already running")]
    CaptureAlreadyRunning,

    #[error("no capture job is running")]
    CaptureNotRunning,

    #[error("condition not met within {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    #[error("job failed: {0}")]
    Job(String),
}
