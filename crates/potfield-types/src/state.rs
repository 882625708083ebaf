// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::config::Property;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arena identifier of a prism. Ids grow monotonically and are never reused,
/// a split retires the parent id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrismId(pub u64);

impl fmt::Display for PrismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Axis-aligned rectangular prism. Extents are `[min, max]`, z is depth
/// (positive downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prism {
    pub x: [f64; 2],
    pub y: [f64; 2],
    pub z: [f64; 2],
    pub susceptibility: f64,
    pub remanence: f64,
    pub density: f64,
}

impl Prism {
    pub fn new(x: [f64; 2], y: [f64; 2], z: [f64; 2]) -> Self {
        Prism {
            x,
            y,
            z,
            susceptibility: 0.0,
            remanence: 0.0,
            density: 0.0,
        }
    }

    /// Extent along axis 0 (x), 1 (y) or 2 (z).
    pub fn extent(&self, axis: usize) -> [f64; 2] {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    pub fn size(&self, axis: usize) -> f64 {
        let e = self.extent(axis);
        e[1] - e[0]
    }

    pub fn center(&self) -> [f64; 3] {
        [
            0.5 * (self.x[0] + self.x[1]),
            0.5 * (self.y[0] + self.y[1]),
            0.5 * (self.z[0] + self.z[1]),
        ]
    }

    pub fn mid_depth(&self) -> f64 {
        0.5 * (self.z[0] + self.z[1])
    }

    pub fn volume(&self) -> f64 {
        self.size(0) * self.size(1) * self.size(2)
    }

    pub fn property(&self, property: Property) -> f64 {
        match property {
            Property::Susceptibility => self.susceptibility,
            Property::Remanence => self.remanence,
            Property::Density => self.density,
        }
    }

    pub fn set_property(&mut self, property: Property, value: f64) {
        match property {
            Property::Susceptibility => self.susceptibility = value,
            Property::Remanence => self.remanence = value,
            Property::Density => self.density = value,
        }
    }
}

/// Shape of one sensor block of the flattened observation vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockShape {
    /// First index of the block in the flattened vector
    pub offset: usize,
    /// 1 for profile data
    pub rows: usize,
    pub cols: usize,
}

impl BlockShape {
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len()
    }
}

/// Why the iteration loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// `max_iterations == 0`: one forward evaluation, no solve
    ForwardOnly,
    MaxIterations,
    /// Relative RMS misfit below `max_rel_misfit`
    MisfitReached,
    /// Misfit improvement below `max_misfit_variation` twice in a row
    Stagnation,
    /// No prism qualifies for splitting
    NoRefinement,
    /// Splitting would leave more prisms than observations
    OverRefinement,
    /// Caller aborted on the conditioning diagnostic
    Aborted,
    /// Normal equations could not be inverted
    SingularSystem,
}

/// Magnitude comparison of the unregularized normal equations against the
/// damping and smoothing terms, computed on the first iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditioningDiagnostic {
    /// max(GᵗWG) / max(lam·sigma_param)
    pub frechet_to_regularization: f64,
    /// max(GᵗWG) / max(gam·S)
    pub frechet_to_smoothing: f64,
    pub lambda: f64,
    pub gamma: f64,
}

impl ConditioningDiagnostic {
    pub fn is_ill_conditioned(&self, limit: f64) -> bool {
        !(self.frechet_to_regularization <= limit && self.frechet_to_smoothing <= limit)
    }
}

/// Caller answer to an ill-conditioning diagnostic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConditioningDecision {
    Continue,
    Abort,
    /// Restart the first iteration with new initial damping scalars.
    Retry { lambda: f64, gamma: f64 },
}

/// One prism split: retired parent and its children, as they were right
/// after the split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitRecord {
    pub iteration: usize,
    pub parent: (PrismId, Prism),
    pub children: Vec<(PrismId, Prism)>,
}

/// Per-iteration bookkeeping of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InversionHistory {
    /// Parameter snapshot after each solve, constant term excluded
    pub par_hist: Vec<Array1<f64>>,
    /// std(residual) after each solve
    pub rms_misfit: Vec<f64>,
    /// std(residual)/std(data) after each solve, in percent
    pub rel_rms_misfit: Vec<f64>,
    /// Damping scalars used by each solve
    pub lambda: Vec<f64>,
    pub gamma: Vec<f64>,
    pub splits: Vec<SplitRecord>,
}

impl InversionHistory {
    /// Split records of one iteration.
    pub fn splits_at(&self, iteration: usize) -> impl Iterator<Item = &SplitRecord> {
        self.splits.iter().filter(move |s| s.iteration == iteration)
    }
}

/// Read-only outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InversionReport {
    pub halt_reason: HaltReason,
    /// Solves performed
    pub iterations: usize,
    /// Final parameter vector, constant term last
    pub params: Array1<f64>,
    pub prisms: Vec<(PrismId, Prism)>,
    /// Predicted field at the observations
    pub data_mod: Array1<f64>,
    /// Median-centred residual
    pub residual: Array1<f64>,
    pub blocks: Vec<BlockShape>,
    pub history: InversionHistory,
    pub conditioning: Option<ConditioningDiagnostic>,
}

impl InversionReport {
    /// Slice of a flattened vector belonging to sensor block `block`.
    pub fn block_values<'a>(&self, values: &'a Array1<f64>, block: usize) -> Option<&'a [f64]> {
        let shape = self.blocks.get(block)?;
        values.as_slice().map(|s| &s[shape.range()])
    }
}
