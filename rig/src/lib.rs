// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A composable network-test matrix engine.
//!
//! The engine turns independently authored configuration axes (NIC
//! offload combinations, interrupt coalescing, IP versions, ...) into
//! an ordered stream of fully resolved test variants, applies each
//! variant's side effects through platform collaborator traits, runs
//! reachability and performance sub-tests against it, and tears the
//! configuration down symmetrically before moving on. One failing
//! sub-test never aborts the run; one failing cleanup step never
//! blocks the remaining cleanup.
//!
//! The moving parts, leaves first:
//!
//! - [`tracker::ConfigTracker`] records which addresses were assigned
//!   to which device over the lifetime of one run.
//! - [`variant::Variant`] carries each axis's chosen value under the
//!   axis's own key.
//! - [`axis::ConfigAxis`] is the contract an axis implements, and
//!   [`axis::AxisChain`] linearizes N axes into one pipeline.
//! - [`recipe::RecipeRunner`] drives the whole state machine.

pub mod axis;
pub mod capture;
pub mod coalescing;
pub mod endpoint;
pub mod error;
pub mod flow;
pub mod ipver;
pub mod offload;
pub mod perf;
pub mod ping;
pub mod platform;
pub mod recipe;
pub mod results;
pub mod tracker;
pub mod variant;

#[cfg(test)]
pub mod sim;

pub use error::Error;
