// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-run results ledger.
//!
//! Every sub-test outcome and every configuration description is
//! recorded here as free text plus a pass/fail mark. Overall recipe
//! success is the conjunction of the recorded sub-test results;
//! description records never fail a run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
pub enum ResultType {
    Pass,
    Fail,
}

impl ResultType {
    pub fn passed(condition: bool) -> Self {
        if condition {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunRecord {
    pub result: ResultType,
    pub description: String,
    /// Whether this record is a sub-test outcome, as opposed to a
    /// configuration description entry.
    pub sub_test: bool,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunResults {
    records: Vec<RunRecord>,
}

impl RunResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record configuration description lines as a single passing
    /// entry.
    pub fn add_description(&mut self, lines: &[String]) {
        self.records.push(RunRecord {
            result: ResultType::Pass,
            description: lines.join("\n"),
            sub_test: false,
        });
    }

    /// Record one sub-test outcome.
    pub fn add_sub_test(
        &mut self,
        result: ResultType,
        description: impl Into<String>,
    ) {
        self.records.push(RunRecord {
            result,
            description: description.into(),
            sub_test: true,
        });
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn sub_tests(&self) -> impl Iterator<Item = &RunRecord> {
        self.records.iter().filter(|r| r.sub_test)
    }

    /// Conjunction of all recorded sub-test results. A run with no
    /// sub-tests recorded passes vacuously.
    pub fn overall(&self) -> ResultType {
        ResultType::passed(
            self.sub_tests().all(|r| r.result == ResultType::Pass),
        )
    }
}
