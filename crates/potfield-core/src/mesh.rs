// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Prism Mesh
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Live prism set, sensitivity and smoothing matrices, and prism splitting.

use crate::kernel::PotentialKernel;
use crate::regularization::DepthWeighting;
use crate::window::ObservationPoints;
use ndarray::{Array1, Array2};
use potfield_types::config::{MeshConfig, Property, PropertySet, UncertaintyConfig};
use potfield_types::error::{PotfieldError, PotfieldResult};
use potfield_types::state::{Prism, PrismId};
use std::collections::BTreeMap;
use tracing::debug;

/// Relative slack when comparing prism faces and minimum sizes.
const GEOMETRY_RTOL: f64 = 1e-9;

/// Operations the inversion needs from a prism model.
///
/// Parameters are laid out property block after property block; inside a
/// block prisms follow `prism_ids()` order. Matrices carry one extra trailing
/// column (Frechet) or row and column (smoothing) for the constant term.
pub trait PrismMesh {
    /// Register one prism and return its fresh id.
    fn add_prism(&mut self, prism: Prism) -> PrismId;

    /// Live prisms in parameter order.
    fn prisms(&self) -> Vec<(PrismId, Prism)>;

    fn prism_ids(&self) -> Vec<PrismId> {
        self.prisms().into_iter().map(|(id, _)| id).collect()
    }

    fn n_prisms(&self) -> usize;

    /// Bottom of the model, reference for depth weighting.
    fn max_depth(&self) -> f64;

    fn parameter_count(&self, properties: PropertySet) -> usize {
        self.n_prisms() * properties.n_properties()
    }

    fn compute_frechet(
        &self,
        properties: PropertySet,
        points: &ObservationPoints,
    ) -> PotfieldResult<Array2<f64>>;

    fn compute_smoothing(
        &self,
        properties: PropertySet,
        uncertainty: &UncertaintyConfig,
    ) -> PotfieldResult<Array2<f64>>;

    /// Number of prisms `split(id)` would produce (1 when it cannot split).
    fn child_count(&self, id: PrismId) -> usize;

    fn can_split(&self, id: PrismId) -> bool {
        self.child_count(id) > 1
    }

    /// Replace a prism by its children. The parent id is retired; a prism
    /// that cannot be halved is left in place and its own id returned.
    fn split(&mut self, id: PrismId) -> PotfieldResult<Vec<PrismId>>;

    fn property(&self, id: PrismId, property: Property) -> PotfieldResult<f64>;

    fn set_property(&mut self, id: PrismId, property: Property, value: f64)
        -> PotfieldResult<()>;

    /// Current parameter vector, constant term excluded.
    fn parameters(&self, properties: PropertySet) -> Array1<f64> {
        let prisms = self.prisms();
        let mut out = Vec::with_capacity(prisms.len() * properties.n_properties());
        for &property in properties.properties() {
            out.extend(prisms.iter().map(|(_, p)| p.property(property)));
        }
        Array1::from_vec(out)
    }

    /// Write a parameter vector (constant term optional) back into the prisms.
    fn set_parameters(
        &mut self,
        properties: PropertySet,
        params: &Array1<f64>,
    ) -> PotfieldResult<()> {
        let ids = self.prism_ids();
        let n = ids.len() * properties.n_properties();
        if params.len() != n && params.len() != n + 1 {
            return Err(PotfieldError::DimensionMismatch {
                context: "set_parameters".to_string(),
                expected: n + 1,
                got: params.len(),
            });
        }
        for (ip, &property) in properties.properties().iter().enumerate() {
            for (i, &id) in ids.iter().enumerate() {
                self.set_property(id, property, params[ip * ids.len() + i])?;
            }
        }
        Ok(())
    }
}

/// Arena of prisms keyed by monotonically increasing, never reused ids.
#[derive(Debug, Clone)]
pub struct PrismArena<K: PotentialKernel> {
    kernel: K,
    prisms: BTreeMap<PrismId, Prism>,
    next_id: u64,
    /// Prisms are never halved below these sizes, per axis
    min_size: [f64; 3],
    zmax: f64,
}

/// `n` regular cells from `min` to `max`.
fn cell_edges(min: f64, max: f64, n: usize) -> Vec<f64> {
    let d = (max - min) / n as f64;
    (0..=n)
        .map(|i| if i == n { max } else { min + i as f64 * d })
        .collect()
}

/// Overlap length of two intervals, 0 when disjoint.
fn overlap(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[1].min(b[1]) - a[0].max(b[0])).max(0.0)
}

fn touches(a: f64, b: f64, scale: f64) -> bool {
    (a - b).abs() <= GEOMETRY_RTOL * scale.max(1.0)
}

/// Shared face of two prisms as a fraction of the smaller face, 0 when the
/// prisms are not face neighbours.
fn shared_face_fraction(a: &Prism, b: &Prism) -> f64 {
    for axis in 0..3 {
        let (ea, eb) = (a.extent(axis), b.extent(axis));
        let scale = a.size(axis).max(b.size(axis));
        if !(touches(ea[1], eb[0], scale) || touches(eb[1], ea[0], scale)) {
            continue;
        }
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        let shared = overlap(a.extent(u), b.extent(u)) * overlap(a.extent(v), b.extent(v));
        if shared <= 0.0 {
            return 0.0;
        }
        let face_a = a.size(u) * a.size(v);
        let face_b = b.size(u) * b.size(v);
        return shared / face_a.min(face_b);
    }
    0.0
}

impl<K: PotentialKernel> PrismArena<K> {
    pub fn new(kernel: K, min_size: [f64; 3], zmax: f64) -> Self {
        PrismArena {
            kernel,
            prisms: BTreeMap::new(),
            next_id: 0,
            min_size,
            zmax,
        }
    }

    /// Regular initial mesh: x outermost, z innermost. Profiles get a single
    /// prism across the line.
    pub fn from_mesh_config(kernel: K, mesh: &MeshConfig) -> PotfieldResult<Self> {
        let b = &mesh.bounds;
        if !(b.xmax > b.xmin) || !(b.ymax > b.ymin) || !(b.zmax > b.zmin) {
            return Err(PotfieldError::ConfigError(
                "mesh.bounds must satisfy min < max on every axis".to_string(),
            ));
        }
        for value in mesh.cell_size.as_array() {
            if !value.is_finite() || value <= 0.0 {
                return Err(PotfieldError::ConfigError(
                    "mesh.cell_size must be finite and > 0".to_string(),
                ));
            }
        }
        let [nx, ny, nz] = mesh.cell_counts()?;
        let xs = cell_edges(b.xmin, b.xmax, nx);
        let ys = cell_edges(b.ymin, b.ymax, ny);
        let zs = cell_edges(b.zmin, b.zmax, nz);

        let mut arena = Self::new(kernel, mesh.min_cell_size.as_array(), b.zmax);
        for x in xs.windows(2) {
            for y in ys.windows(2) {
                for z in zs.windows(2) {
                    arena.add_prism(Prism::new([x[0], x[1]], [y[0], y[1]], [z[0], z[1]]));
                }
            }
        }
        debug!(
            "initial mesh: {}x{}x{} = {} prisms",
            xs.len() - 1,
            ys.len() - 1,
            zs.len() - 1,
            arena.n_prisms()
        );
        Ok(arena)
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn get(&self, id: PrismId) -> Option<&Prism> {
        self.prisms.get(&id)
    }

    /// Axes along which halving keeps the minimum size.
    fn split_axes(&self, prism: &Prism) -> [bool; 3] {
        let mut axes = [false; 3];
        for (axis, flag) in axes.iter_mut().enumerate() {
            let half = 0.5 * prism.size(axis);
            *flag = half >= self.min_size[axis] * (1.0 - GEOMETRY_RTOL);
        }
        axes
    }

    fn lookup(&self, id: PrismId) -> PotfieldResult<&Prism> {
        self.prisms
            .get(&id)
            .ok_or(PotfieldError::UnknownPrism { id: id.0 })
    }
}

/// Halves of an extent, or the extent itself.
fn halves(extent: [f64; 2], split: bool) -> Vec<[f64; 2]> {
    if split {
        let mid = 0.5 * (extent[0] + extent[1]);
        vec![[extent[0], mid], [mid, extent[1]]]
    } else {
        vec![extent]
    }
}

impl<K: PotentialKernel> PrismMesh for PrismArena<K> {
    fn add_prism(&mut self, prism: Prism) -> PrismId {
        let id = PrismId(self.next_id);
        self.next_id += 1;
        self.prisms.insert(id, prism);
        id
    }

    fn prisms(&self) -> Vec<(PrismId, Prism)> {
        self.prisms.iter().map(|(&id, &p)| (id, p)).collect()
    }

    fn prism_ids(&self) -> Vec<PrismId> {
        self.prisms.keys().copied().collect()
    }

    fn n_prisms(&self) -> usize {
        self.prisms.len()
    }

    fn max_depth(&self) -> f64 {
        self.zmax
    }

    fn compute_frechet(
        &self,
        properties: PropertySet,
        points: &ObservationPoints,
    ) -> PotfieldResult<Array2<f64>> {
        let n_data = points.len();
        if points.y.len() != n_data || points.z.len() != n_data {
            return Err(PotfieldError::DimensionMismatch {
                context: "compute_frechet: observation coordinates".to_string(),
                expected: n_data,
                got: points.y.len().min(points.z.len()),
            });
        }
        for &property in properties.properties() {
            if !self.kernel.supports(property) {
                return Err(PotfieldError::ConfigError(format!(
                    "{property:?} cannot be modelled with {:?} data",
                    self.kernel.data_type()
                )));
            }
        }

        let n_prisms = self.prisms.len();
        let n_param = n_prisms * properties.n_properties();
        let mut g = Array2::zeros((n_data, n_param + 1));
        for (ip, &property) in properties.properties().iter().enumerate() {
            for (j, prism) in self.prisms.values().enumerate() {
                let col = ip * n_prisms + j;
                for i in 0..n_data {
                    g[[i, col]] = self.kernel.response(prism, property, points.point(i));
                }
            }
        }
        g.column_mut(n_param).fill(1.0);
        Ok(g)
    }

    fn compute_smoothing(
        &self,
        properties: PropertySet,
        uncertainty: &UncertaintyConfig,
    ) -> PotfieldResult<Array2<f64>> {
        let prisms: Vec<&Prism> = self.prisms.values().collect();
        let n_prisms = prisms.len();
        let n_param = n_prisms * properties.n_properties();
        let depth = DepthWeighting::new(uncertainty.depth_ref, self.zmax);
        let mut s = Array2::zeros((n_param + 1, n_param + 1));

        for (ip, &property) in properties.properties().iter().enumerate() {
            let sigma = uncertainty.sigma_property(property);
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(PotfieldError::ConfigError(format!(
                    "variability of {property:?} must be finite and > 0"
                )));
            }
            let base = 1.0 / (sigma * sigma);
            let p = property.depth_exponent();
            let offset = ip * n_prisms;
            for a in 0..n_prisms {
                for b in (a + 1)..n_prisms {
                    let frac = shared_face_fraction(prisms[a], prisms[b]);
                    if frac <= 0.0 {
                        continue;
                    }
                    let wa = depth.scale(prisms[a].mid_depth()).powi(p);
                    let wb = depth.scale(prisms[b].mid_depth()).powi(p);
                    let w = base * frac * 0.5 * (wa + wb);
                    let (i, j) = (offset + a, offset + b);
                    s[[i, i]] += w;
                    s[[j, j]] += w;
                    s[[i, j]] -= w;
                    s[[j, i]] -= w;
                }
            }
        }
        Ok(s)
    }

    fn child_count(&self, id: PrismId) -> usize {
        match self.prisms.get(&id) {
            Some(prism) => self
                .split_axes(prism)
                .iter()
                .map(|&s| if s { 2 } else { 1 })
                .product(),
            None => 0,
        }
    }

    fn split(&mut self, id: PrismId) -> PotfieldResult<Vec<PrismId>> {
        let parent = *self.lookup(id)?;
        let axes = self.split_axes(&parent);
        if !axes.iter().any(|&s| s) {
            return Ok(vec![id]);
        }
        self.prisms.remove(&id);

        let mut children = Vec::with_capacity(8);
        for x in halves(parent.x, axes[0]) {
            for y in halves(parent.y, axes[1]) {
                for z in halves(parent.z, axes[2]) {
                    let child = Prism {
                        x,
                        y,
                        z,
                        ..parent
                    };
                    children.push(self.add_prism(child));
                }
            }
        }
        debug!("split prism {id} into {} children", children.len());
        Ok(children)
    }

    fn property(&self, id: PrismId, property: Property) -> PotfieldResult<f64> {
        Ok(self.lookup(id)?.property(property))
    }

    fn set_property(
        &mut self,
        id: PrismId,
        property: Property,
        value: f64,
    ) -> PotfieldResult<()> {
        let prism = self
            .prisms
            .get_mut(&id)
            .ok_or(PotfieldError::UnknownPrism { id: id.0 })?;
        prism.set_property(property, value);
        Ok(())
    }
}
