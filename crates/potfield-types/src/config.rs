// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::MAX_INITIAL_PRISMS;
use crate::error::{PotfieldError, PotfieldResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Kind of potential-field data being inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Magnetic,
    Gravity,
}

/// Physical property carried by a prism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Property {
    /// SI susceptibility
    Susceptibility,
    /// Remanent magnetization [A/m], along the Earth field direction
    Remanence,
    /// Density contrast [kg/m³]
    Density,
}

impl Property {
    /// Exponent of the depth weighting applied to the parameter variance.
    pub fn depth_exponent(self) -> i32 {
        match self {
            Property::Susceptibility | Property::Remanence => 3,
            Property::Density => 2,
        }
    }

    pub fn is_magnetic(self) -> bool {
        !matches!(self, Property::Density)
    }
}

/// Set of properties resolved for one inversion run.
///
/// Susceptibility and remanence are mutually exclusive, density belongs to
/// gravity data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertySet {
    Susceptibility,
    Remanence,
    Density,
}

impl PropertySet {
    /// Properties in parameter-vector block order.
    pub fn properties(self) -> &'static [Property] {
        match self {
            PropertySet::Susceptibility => &[Property::Susceptibility],
            PropertySet::Remanence => &[Property::Remanence],
            PropertySet::Density => &[Property::Density],
        }
    }

    pub fn n_properties(self) -> usize {
        self.properties().len()
    }

    pub fn data_type(self) -> DataType {
        match self {
            PropertySet::Susceptibility | PropertySet::Remanence => DataType::Magnetic,
            PropertySet::Density => DataType::Gravity,
        }
    }
}

/// Property selection as entered by the operator, before consistency checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InversionRequest {
    #[serde(default)]
    pub susceptibility: bool,
    #[serde(default)]
    pub remanence: bool,
    #[serde(default)]
    pub density: bool,
}

impl InversionRequest {
    /// Resolve contradictory or empty selections into one property set.
    ///
    /// Never fails: inconsistent requests are corrected and logged.
    pub fn resolve(&self, data_type: DataType) -> PropertySet {
        match data_type {
            DataType::Gravity => {
                if self.susceptibility || self.remanence {
                    warn!("magnetic properties requested for gravity data; inverting density only");
                }
                PropertySet::Density
            }
            DataType::Magnetic => {
                if self.density {
                    warn!("density requested for magnetic data; ignored");
                }
                match (self.susceptibility, self.remanence) {
                    (true, true) => {
                        warn!(
                            "susceptibility and remanence cannot be inverted together; \
                             susceptibility inversion cancelled"
                        );
                        PropertySet::Remanence
                    }
                    (true, false) => PropertySet::Susceptibility,
                    (false, true) => PropertySet::Remanence,
                    (false, false) => {
                        warn!("no magnetic property chosen; susceptibility used by default");
                        PropertySet::Susceptibility
                    }
                }
            }
        }
    }
}

/// Geometry of the survey: a profile (2.5-D) or a gridded map (3-D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyDimension {
    Line,
    Grid,
}

/// Model volume. z is depth, positive downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelBounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
    pub zmin: f64,
    pub zmax: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellSize {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CellSize {
    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    pub dimension: SurveyDimension,
    pub bounds: ModelBounds,
    /// Initial prism size
    pub cell_size: CellSize,
    /// Prisms are never split below these sizes
    pub min_cell_size: CellSize,
}

/// Round to `decimals` decimal places; negative values round to tens, hundreds...
fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn coordinate_range(coords: &[f64], axis: &str) -> PotfieldResult<(f64, f64)> {
    let (min, max) = coords
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !(max > min) {
        return Err(PotfieldError::ConfigError(format!(
            "{axis} coordinates must span a non-zero range"
        )));
    }
    Ok((min, max))
}

impl MeshConfig {
    /// Default 2.5-D mesh for a profile: about five prisms along the line,
    /// one layer half a prism thick, model extended by its depth on both
    /// ends so that edge prisms see data.
    pub fn suggest_for_line(x: &[f64]) -> PotfieldResult<Self> {
        let (xmin, xmax) = coordinate_range(x, "x")?;
        let length = xmax - xmin;
        let mut decimals = 1 - length.log10() as i32;
        let dx_ini = loop {
            let dx = round_to(length / 5.0, decimals);
            if dx > 0.0 {
                break dx;
            }
            decimals += 1;
        };
        let dz_ini = dx_ini / 2.0;
        let zmax = dz_ini;
        let half_width = zmax;

        Ok(MeshConfig {
            dimension: SurveyDimension::Line,
            bounds: ModelBounds {
                xmin: xmin - zmax,
                xmax: xmax + zmax,
                ymin: -half_width,
                ymax: half_width,
                zmin: 0.0,
                zmax,
            },
            cell_size: CellSize {
                x: dx_ini,
                y: 2.0 * half_width,
                z: dz_ini,
            },
            min_cell_size: CellSize {
                x: dx_ini / 4.0,
                y: 2.0 * half_width,
                z: dz_ini / 4.0,
            },
        })
    }

    /// Default 3-D mesh for gridded data: about 25 prisms over the map, one
    /// layer a tenth of the largest map dimension thick.
    pub fn suggest_for_grid(x: &[f64], y: &[f64]) -> PotfieldResult<Self> {
        let (xmin, xmax) = coordinate_range(x, "x")?;
        let (ymin, ymax) = coordinate_range(y, "y")?;
        let length_x = xmax - xmin;
        let length_y = ymax - ymin;
        let length = length_x.max(length_y);
        let mut decimals = 1 - length.log10() as i32;
        let d_ini = loop {
            let d = round_to((length_x * length_y / 25.0).sqrt(), decimals);
            if d > 0.0 {
                break d;
            }
            decimals += 1;
        };
        let dz_ini = length / 10.0;

        Ok(MeshConfig {
            dimension: SurveyDimension::Grid,
            bounds: ModelBounds {
                xmin: xmin - d_ini,
                xmax: xmax + d_ini,
                ymin: ymin - d_ini,
                ymax: ymax + d_ini,
                zmin: 0.0,
                zmax: dz_ini,
            },
            cell_size: CellSize {
                x: d_ini,
                y: d_ini,
                z: dz_ini,
            },
            min_cell_size: CellSize {
                x: d_ini / 4.0,
                y: d_ini / 4.0,
                z: dz_ini / 4.0,
            },
        })
    }

    /// Initial cells per axis, `round(extent / cell_size)` and at least one.
    /// Profiles have a single cell across the line.
    pub fn cell_counts(&self) -> PotfieldResult<[usize; 3]> {
        let b = &self.bounds;
        let count = |extent: f64, step: f64| (extent / step).round().max(1.0);
        let nx = count(b.xmax - b.xmin, self.cell_size.x);
        let ny = match self.dimension {
            SurveyDimension::Line => 1.0,
            SurveyDimension::Grid => count(b.ymax - b.ymin, self.cell_size.y),
        };
        let nz = count(b.zmax - b.zmin, self.cell_size.z);
        let total = nx * ny * nz;
        if !total.is_finite() || total > MAX_INITIAL_PRISMS as f64 {
            return Err(PotfieldError::ConfigError(format!(
                "mesh.cell_size gives {total:.0} initial prisms, at most {MAX_INITIAL_PRISMS} allowed"
            )));
        }
        Ok([nx as usize, ny as usize, nz as usize])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoppingConfig {
    /// 0 means forward modelling only.
    pub max_iterations: usize,
    /// Stop when std(residual)/std(data) falls below this value.
    pub max_rel_misfit: f64,
    /// Misfit improvement (relative to std(data)) considered stagnant.
    pub max_misfit_variation: f64,
}

impl Default for StoppingConfig {
    fn default() -> Self {
        StoppingConfig {
            max_iterations: 10,
            max_rel_misfit: 0.01,
            max_misfit_variation: 0.001,
        }
    }
}

/// Multiplicative decay of a damping scalar, floored at `minimum`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DampingSchedule {
    pub initial: f64,
    pub factor: f64,
    pub minimum: f64,
}

impl DampingSchedule {
    pub fn next(&self, current: f64) -> f64 {
        (current * self.factor).max(self.minimum)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DampingConfig {
    /// Regularization weight
    pub lambda: DampingSchedule,
    /// Smoothing weight
    pub gamma: DampingSchedule,
}

impl DampingConfig {
    pub fn for_data_type(data_type: DataType) -> Self {
        let (lam, gam) = match data_type {
            DataType::Magnetic => (1.0e-4, 1.0e-3),
            DataType::Gravity => (1.0e-2, 1.0e-2),
        };
        DampingConfig {
            lambda: DampingSchedule {
                initial: lam,
                factor: 0.7,
                minimum: 1.0e-6,
            },
            gamma: DampingSchedule {
                initial: gam,
                factor: 0.7,
                minimum: 1.0e-6,
            },
        }
    }
}

/// Data uncertainties and parameter variabilities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyConfig {
    /// Magnetic data uncertainty [nT]
    #[serde(default = "default_sigma_mag")]
    pub sigma_mag: f64,
    /// Gravity data uncertainty [mGal]
    #[serde(default = "default_sigma_grav")]
    pub sigma_grav: f64,
    #[serde(default = "default_sigma_sus")]
    pub sigma_sus: f64,
    /// [A/m]
    #[serde(default = "default_sigma_rem")]
    pub sigma_rem: f64,
    /// [kg/m³]
    #[serde(default = "default_sigma_rho")]
    pub sigma_rho: f64,
    /// Reference for depth weighting of the parameter variability (1 = none)
    #[serde(default = "default_depth_ref")]
    pub depth_ref: f64,
}

fn default_sigma_mag() -> f64 {
    1.0
}
fn default_sigma_grav() -> f64 {
    1.0
}
fn default_sigma_sus() -> f64 {
    1.0e-6
}
fn default_sigma_rem() -> f64 {
    1.0
}
fn default_sigma_rho() -> f64 {
    10.0
}
fn default_depth_ref() -> f64 {
    1.0
}

impl Default for UncertaintyConfig {
    fn default() -> Self {
        UncertaintyConfig {
            sigma_mag: default_sigma_mag(),
            sigma_grav: default_sigma_grav(),
            sigma_sus: default_sigma_sus(),
            sigma_rem: default_sigma_rem(),
            sigma_rho: default_sigma_rho(),
            depth_ref: default_depth_ref(),
        }
    }
}

impl UncertaintyConfig {
    pub fn sigma_data(&self, data_type: DataType) -> f64 {
        match data_type {
            DataType::Magnetic => self.sigma_mag,
            DataType::Gravity => self.sigma_grav,
        }
    }

    pub fn sigma_property(&self, property: Property) -> f64 {
        match property {
            Property::Susceptibility => self.sigma_sus,
            Property::Remanence => self.sigma_rem,
            Property::Density => self.sigma_rho,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Samples on each side a local maximum must dominate.
    pub window_half_width: usize,
    /// Minimum normalized sensitivity contribution for a prism to be split.
    pub amplitude_threshold: f64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        RefinementConfig {
            window_half_width: 5,
            amplitude_threshold: 0.1,
        }
    }
}

/// Main geomagnetic field at the survey.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarthField {
    /// [nT]
    pub intensity: f64,
    /// [degrees]
    pub inclination: f64,
    /// [degrees]
    pub declination: f64,
}

impl Default for EarthField {
    fn default() -> Self {
        EarthField {
            intensity: 48_000.0,
            inclination: 62.0,
            declination: 0.0,
        }
    }
}

impl EarthField {
    /// Unit vector of the field in (east, north, down) coordinates.
    pub fn direction(&self) -> [f64; 3] {
        let inc = self.inclination.to_radians();
        let dec = self.declination.to_radians();
        [inc.cos() * dec.sin(), inc.cos() * dec.cos(), inc.sin()]
    }
}

/// Complete, read-only configuration of one inversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InversionConfig {
    pub data_type: DataType,
    #[serde(default)]
    pub request: InversionRequest,
    #[serde(default)]
    pub stopping: StoppingConfig,
    /// When absent, defaults depend on the data type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damping: Option<DampingConfig>,
    #[serde(default)]
    pub uncertainty: UncertaintyConfig,
    #[serde(default)]
    pub refinement: RefinementConfig,
    pub mesh: MeshConfig,
    #[serde(default)]
    pub earth: EarthField,
    /// Keep one data point out of `subsample_stride` in each direction.
    #[serde(default = "default_stride")]
    pub subsample_stride: usize,
}

fn default_stride() -> usize {
    1
}

fn check_positive(value: f64, name: &str) -> PotfieldResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PotfieldError::ConfigError(format!(
            "{name} must be finite and > 0"
        )));
    }
    Ok(())
}

fn check_non_negative(value: f64, name: &str) -> PotfieldResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(PotfieldError::ConfigError(format!(
            "{name} must be finite and >= 0"
        )));
    }
    Ok(())
}

fn validate_schedule(schedule: &DampingSchedule, name: &str) -> PotfieldResult<()> {
    check_non_negative(schedule.initial, &format!("{name}.initial"))?;
    check_non_negative(schedule.minimum, &format!("{name}.minimum"))?;
    if !schedule.factor.is_finite() || schedule.factor <= 0.0 || schedule.factor > 1.0 {
        return Err(PotfieldError::ConfigError(format!(
            "{name}.factor must be finite and in (0, 1]"
        )));
    }
    Ok(())
}

impl InversionConfig {
    /// Configuration with the default control parameters for `data_type`.
    pub fn new(data_type: DataType, mesh: MeshConfig) -> Self {
        let request = match data_type {
            DataType::Magnetic => InversionRequest {
                susceptibility: true,
                ..Default::default()
            },
            DataType::Gravity => InversionRequest {
                density: true,
                ..Default::default()
            },
        };
        InversionConfig {
            data_type,
            request,
            stopping: StoppingConfig::default(),
            damping: None,
            uncertainty: UncertaintyConfig::default(),
            refinement: RefinementConfig::default(),
            mesh,
            earth: EarthField::default(),
            subsample_stride: 1,
        }
    }

    /// Load from JSON file.
    pub fn from_file(path: &str) -> PotfieldResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn damping(&self) -> DampingConfig {
        self.damping
            .unwrap_or_else(|| DampingConfig::for_data_type(self.data_type))
    }

    pub fn property_set(&self) -> PropertySet {
        self.request.resolve(self.data_type)
    }

    pub fn validate(&self) -> PotfieldResult<()> {
        check_non_negative(self.stopping.max_rel_misfit, "stopping.max_rel_misfit")?;
        check_non_negative(
            self.stopping.max_misfit_variation,
            "stopping.max_misfit_variation",
        )?;

        let damping = self.damping();
        validate_schedule(&damping.lambda, "damping.lambda")?;
        validate_schedule(&damping.gamma, "damping.gamma")?;

        let u = &self.uncertainty;
        check_positive(u.sigma_data(self.data_type), "uncertainty.sigma_data")?;
        for &property in self.property_set().properties() {
            check_positive(u.sigma_property(property), "uncertainty.sigma_property")?;
        }
        check_positive(u.depth_ref, "uncertainty.depth_ref")?;

        if self.refinement.window_half_width == 0 {
            return Err(PotfieldError::ConfigError(
                "refinement.window_half_width must be >= 1".to_string(),
            ));
        }
        let amp = self.refinement.amplitude_threshold;
        if !amp.is_finite() || !(0.0..=1.0).contains(&amp) {
            return Err(PotfieldError::ConfigError(
                "refinement.amplitude_threshold must be in [0, 1]".to_string(),
            ));
        }

        if self.subsample_stride == 0 {
            return Err(PotfieldError::ConfigError(
                "subsample_stride must be >= 1".to_string(),
            ));
        }

        let b = &self.mesh.bounds;
        if !(b.xmax > b.xmin) || !(b.ymax > b.ymin) || !(b.zmax > b.zmin) {
            return Err(PotfieldError::ConfigError(
                "mesh.bounds must satisfy min < max on every axis".to_string(),
            ));
        }
        for (value, name) in self
            .mesh
            .cell_size
            .as_array()
            .iter()
            .zip(["mesh.cell_size.x", "mesh.cell_size.y", "mesh.cell_size.z"])
        {
            check_positive(*value, name)?;
        }
        for (value, name) in self.mesh.min_cell_size.as_array().iter().zip([
            "mesh.min_cell_size.x",
            "mesh.min_cell_size.y",
            "mesh.min_cell_size.z",
        ]) {
            check_positive(*value, name)?;
        }
        self.mesh.cell_counts()?;
        check_positive(self.earth.intensity, "earth.intensity")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// CARGO_MANIFEST_DIR points to crates/potfield-types/, the shipped
    /// configs live two levels up.
    fn project_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("..")
    }

    fn config_path(relative: &str) -> String {
        project_root().join(relative).to_string_lossy().to_string()
    }

    fn line_mesh() -> MeshConfig {
        MeshConfig::suggest_for_line(&[0.0, 25.0, 50.0]).unwrap()
    }

    #[test]
    fn test_resolve_both_magnetic_keeps_remanence() {
        let req = InversionRequest {
            susceptibility: true,
            remanence: true,
            density: false,
        };
        assert_eq!(req.resolve(DataType::Magnetic), PropertySet::Remanence);
    }

    #[test]
    fn test_resolve_empty_magnetic_defaults_to_susceptibility() {
        let req = InversionRequest::default();
        assert_eq!(req.resolve(DataType::Magnetic), PropertySet::Susceptibility);
    }

    #[test]
    fn test_resolve_gravity_is_density() {
        let req = InversionRequest {
            susceptibility: true,
            remanence: false,
            density: false,
        };
        assert_eq!(req.resolve(DataType::Gravity), PropertySet::Density);
    }

    #[test]
    fn test_damping_defaults_depend_on_data_type() {
        let mag = InversionConfig::new(DataType::Magnetic, line_mesh());
        let grav = InversionConfig::new(DataType::Gravity, line_mesh());
        assert!((mag.damping().lambda.initial - 1e-4).abs() < 1e-15);
        assert!((mag.damping().gamma.initial - 1e-3).abs() < 1e-15);
        assert!((grav.damping().lambda.initial - 1e-2).abs() < 1e-15);
        assert!((grav.damping().gamma.initial - 1e-2).abs() < 1e-15);
    }

    #[test]
    fn test_schedule_is_floored() {
        let s = DampingSchedule {
            initial: 1e-5,
            factor: 0.5,
            minimum: 1e-6,
        };
        let mut v = s.initial;
        for _ in 0..20 {
            let next = s.next(v);
            assert!(next <= v);
            assert!(next >= s.minimum);
            v = next;
        }
        assert_eq!(v, 1e-6);
    }

    #[test]
    fn test_suggest_for_line() {
        let x: Vec<f64> = (0..51).map(|i| i as f64).collect();
        let mesh = MeshConfig::suggest_for_line(&x).unwrap();
        assert_eq!(mesh.dimension, SurveyDimension::Line);
        assert!((mesh.cell_size.x - 10.0).abs() < 1e-12);
        assert!((mesh.cell_size.z - 5.0).abs() < 1e-12);
        assert!((mesh.bounds.xmin + 5.0).abs() < 1e-12);
        assert!((mesh.bounds.xmax - 55.0).abs() < 1e-12);
        assert!((mesh.min_cell_size.x - 2.5).abs() < 1e-12);
        // Lines are never split across the profile.
        assert_eq!(mesh.min_cell_size.y, mesh.cell_size.y);
    }

    #[test]
    fn test_suggest_for_grid() {
        let x: Vec<f64> = (0..11).map(|i| i as f64 * 10.0).collect();
        let y: Vec<f64> = (0..11).map(|i| i as f64 * 10.0).collect();
        let mesh = MeshConfig::suggest_for_grid(&x, &y).unwrap();
        assert_eq!(mesh.dimension, SurveyDimension::Grid);
        assert!((mesh.cell_size.x - 20.0).abs() < 1e-12);
        assert!((mesh.cell_size.z - 10.0).abs() < 1e-12);
        assert!((mesh.bounds.ymin + 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_suggest_rejects_degenerate_line() {
        assert!(MeshConfig::suggest_for_line(&[3.0, 3.0]).is_err());
        assert!(MeshConfig::suggest_for_line(&[]).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = InversionConfig::new(DataType::Gravity, line_mesh());
        assert!(cfg.validate().is_ok());

        cfg.subsample_stride = 0;
        assert!(cfg.validate().is_err());
        cfg.subsample_stride = 1;

        cfg.uncertainty.sigma_rho = 0.0;
        assert!(cfg.validate().is_err());
        cfg.uncertainty.sigma_rho = 10.0;

        cfg.refinement.amplitude_threshold = 1.5;
        assert!(cfg.validate().is_err());
        cfg.refinement.amplitude_threshold = 0.1;

        let mut damping = cfg.damping();
        damping.lambda.factor = 1.2;
        cfg.damping = Some(damping);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_initial_mesh() {
        let mut cfg = InversionConfig::new(DataType::Gravity, line_mesh());
        let [nx, ny, _] = cfg.mesh.cell_counts().unwrap();
        assert_eq!(ny, 1);
        assert!(nx >= 1);

        cfg.mesh.cell_size.x = 1e-9;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("initial prisms"), "{err}");

        cfg.mesh.cell_size.x = f64::MIN_POSITIVE;
        assert!(cfg.mesh.cell_counts().is_err());
    }

    #[test]
    fn test_load_line_gravity_config() {
        let cfg = InversionConfig::from_file(&config_path("configs/line_gravity.json")).unwrap();
        assert_eq!(cfg.data_type, DataType::Gravity);
        assert_eq!(cfg.property_set(), PropertySet::Density);
        assert_eq!(cfg.stopping.max_iterations, 8);
        assert_eq!(cfg.mesh.dimension, SurveyDimension::Line);
        // Omitted damping falls back to gravity defaults.
        assert!((cfg.damping().lambda.initial - 1e-2).abs() < 1e-15);
    }

    #[test]
    fn test_load_grid_magnetic_config() {
        let cfg = InversionConfig::from_file(&config_path("configs/grid_magnetic.json")).unwrap();
        assert_eq!(cfg.data_type, DataType::Magnetic);
        assert_eq!(cfg.property_set(), PropertySet::Susceptibility);
        assert_eq!(cfg.subsample_stride, 2);
        assert!((cfg.damping().gamma.factor - 0.8).abs() < 1e-15);
    }

    #[test]
    fn test_roundtrip_serialization() {
        let cfg = InversionConfig::from_file(&config_path("configs/grid_magnetic.json")).unwrap();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let cfg2: InversionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.data_type, cfg2.data_type);
        assert_eq!(cfg.mesh, cfg2.mesh);
        assert_eq!(cfg.damping, cfg2.damping);
    }

    #[test]
    fn test_earth_field_direction_vertical() {
        let earth = EarthField {
            intensity: 50_000.0,
            inclination: 90.0,
            declination: 0.0,
        };
        let d = earth.direction();
        assert!(d[0].abs() < 1e-12);
        assert!(d[1].abs() < 1e-12);
        assert!((d[2] - 1.0).abs() < 1e-12);
    }
}
