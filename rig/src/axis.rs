// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The configuration-axis contract and the pipeline composing axes.
//!
//! An axis is one independently variable dimension of a test scenario
//! (offload settings, IP version, coalescing, ...). A chain of N axes
//! is linearized into a fixed-order pipeline: the first axis in the
//! chain is the innermost, its choices are generated first and its
//! side effects are removed last. Composing axes with K1..Km choices
//! yields the full Cartesian product, minus any combinations an outer
//! axis prunes after consulting the values inner axes attached.

use crate::error::Error;
use crate::variant::{AxisId, Variant};
use slog::{info, warn, Logger};

/// The contract every configuration axis implements. Implementations
/// hold their own collaborator handles (namespaces, devices); the
/// chain only hands them variants.
pub trait ConfigAxis: Send + Sync {
    fn id(&self) -> AxisId;

    /// Axes whose attachments this axis consults while generating.
    /// Every id listed must belong to an axis nested inside this one
    /// (earlier in the chain); [`AxisChain::new`] enforces that, so
    /// ordering is an explicit contract rather than an accident of
    /// declaration order.
    fn requires(&self) -> &[AxisId] {
        &[]
    }

    /// One variant per choice of this axis, each a shallow clone of
    /// `base` with this axis's value attached. An axis with nothing
    /// to vary yields `base` unchanged. Returning fewer combinations
    /// than choices prunes: a pruned combination produces no variant
    /// at all.
    fn generate(&self, base: &Variant) -> Vec<Variant>;

    /// Perform this axis's side effect for `variant`. Must be a no-op
    /// when `variant` carries no value for this axis.
    fn apply(&self, variant: &Variant) -> Result<(), Error>;

    /// Exact inverse of `apply`; must tolerate variants `apply` was a
    /// no-op for. Failures are logged by the chain and never block
    /// the other axes' cleanup.
    fn remove(&self, variant: &Variant) -> Result<(), Error>;

    /// Human-readable description lines, purely additive.
    fn describe(&self, variant: &Variant) -> Vec<String>;
}

/// An ordered list of axes composed into one pipeline, innermost
/// first.
pub struct AxisChain {
    axes: Vec<Box<dyn ConfigAxis>>,
    log: Logger,
}

impl AxisChain {
    /// Build a chain, validating the ordering contract: every axis's
    /// `requires()` must name only axes that appear earlier in
    /// `axes`, and ids must be unique.
    pub fn new(
        axes: Vec<Box<dyn ConfigAxis>>,
        log: Logger,
    ) -> Result<Self, Error> {
        let mut seen: Vec<AxisId> = Vec::new();
        for axis in &axes {
            if seen.contains(&axis.id()) {
                return Err(Error::DuplicateAxis(axis.id().to_string()));
            }
            for req in axis.requires() {
                if !seen.contains(req) {
                    return Err(Error::AxisOrder {
                        axis: axis.id().to_string(),
                        requires: req.to_string(),
                    });
                }
            }
            seen.push(axis.id());
        }
        Ok(Self { axes, log })
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    /// Lazily generate the composed variant stream. Inner axes vary
    /// slowest: for every variant of the inner pipeline stage, each
    /// outer axis expands it into one variant per choice.
    pub fn generate(&self, base: Variant) -> impl Iterator<Item = Variant> + '_ {
        let mut stream: Box<dyn Iterator<Item = Variant> + '_> =
            Box::new(std::iter::once(base));
        for axis in &self.axes {
            stream = Box::new(stream.flat_map(move |parent| {
                axis.generate(&parent).into_iter()
            }));
        }
        stream
    }

    /// Apply every axis's side effect in pipeline order, failing fast
    /// on the first error.
    pub fn apply_all(&self, variant: &Variant) -> Result<(), Error> {
        for axis in &self.axes {
            axis.apply(variant).map_err(|e| {
                Error::Config(format!("axis {}: {e}", axis.id()))
            })?;
        }
        Ok(())
    }

    /// Remove every axis's side effect in reverse pipeline order.
    /// Cleanup failures are logged and do not stop the remaining
    /// axes' cleanup.
    pub fn remove_all(&self, variant: &Variant) {
        for axis in self.axes.iter().rev() {
            if let Err(e) = axis.remove(variant) {
                warn!(
                    self.log,
                    "cleanup failure on axis {}: {e}, continuing",
                    axis.id()
                );
            }
        }
    }

    /// Accumulated description of `variant`, one header line plus
    /// each axis's lines in pipeline order.
    pub fn describe_all(&self, variant: &Variant) -> Vec<String> {
        let mut lines = vec!["Sub configuration description:".to_string()];
        for axis in &self.axes {
            lines.extend(axis.describe(variant));
        }
        lines
    }

    /// Log a variant's description at info level.
    pub fn log_description(&self, variant: &Variant) {
        for line in self.describe_all(variant) {
            info!(self.log, "{line}");
        }
    }
}
