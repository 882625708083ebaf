// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Data Window
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Extraction of the observations that take part in an inversion.
//!
//! Each sensor is windowed to `[xmin + zmax, xmax − zmax]` (and the same in y
//! for gridded data) so that edge prisms are not driven by data outside the
//! model, decimated by `stride` starting at `stride / 2`, flattened row-major
//! and concatenated sensor after sensor.

use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use potfield_math::stats::{median, std_population};
use potfield_types::config::{ModelBounds, SurveyDimension};
use potfield_types::error::{PotfieldError, PotfieldResult};
use potfield_types::state::BlockShape;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Raw measurements of one sensor on a regular layout.
///
/// Profiles are stored as a single row. Columns must have ascending x, rows
/// ascending y. `z` is the sensor position in model coordinates (positive
/// down, so negative above the surface).
#[derive(Debug, Clone, PartialEq)]
pub struct SensorGrid {
    pub x: Array2<f64>,
    pub y: Array2<f64>,
    pub z: Array2<f64>,
    pub values: Array2<f64>,
}

fn check_shape(name: &str, got: (usize, usize), expected: (usize, usize)) -> PotfieldResult<()> {
    if got != expected {
        return Err(PotfieldError::DimensionMismatch {
            context: format!("sensor {name}"),
            expected: expected.0 * expected.1,
            got: got.0 * got.1,
        });
    }
    Ok(())
}

impl SensorGrid {
    /// Profile data. `y` and `z` may differ per sample.
    pub fn line(
        x: Array1<f64>,
        y: Array1<f64>,
        z: Array1<f64>,
        values: Array1<f64>,
    ) -> PotfieldResult<Self> {
        Self::grid(
            x.insert_axis(Axis(0)),
            y.insert_axis(Axis(0)),
            z.insert_axis(Axis(0)),
            values.insert_axis(Axis(0)),
        )
    }

    /// Gridded data, `[row, col]` = `[y index, x index]`.
    pub fn grid(
        x: Array2<f64>,
        y: Array2<f64>,
        z: Array2<f64>,
        values: Array2<f64>,
    ) -> PotfieldResult<Self> {
        let shape = values.dim();
        check_shape("x", x.dim(), shape)?;
        check_shape("y", y.dim(), shape)?;
        check_shape("z", z.dim(), shape)?;
        Ok(SensorGrid { x, y, z, values })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }
}

/// Flattened observation coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationPoints {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub z: Array1<f64>,
}

impl ObservationPoints {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn point(&self, i: usize) -> [f64; 3] {
        [self.x[i], self.y[i], self.z[i]]
    }
}

/// Map extent for displaying results, padded by half a sample spacing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotExtent {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

/// Observations retained for the inversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedData {
    pub points: ObservationPoints,
    /// Median-centred windowed data, never modified afterwards
    pub data_ori: Array1<f64>,
    /// Population std of `data_ori`
    pub std_data_ori: f64,
    /// One entry per sensor, in concatenation order
    pub blocks: Vec<BlockShape>,
    pub plot_extent: PlotExtent,
}

impl WindowedData {
    pub fn n_data(&self) -> usize {
        self.data_ori.len()
    }

    pub fn n_sensors(&self) -> usize {
        self.blocks.len()
    }
}

/// Windowing rule shared by every sensor of a survey.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataWindow {
    pub bounds: ModelBounds,
    pub dimension: SurveyDimension,
    pub stride: usize,
}

/// Indices of ascending `coords` inside `[lo, hi]`, decimated by `stride`.
fn window_indices(coords: ArrayView1<'_, f64>, lo: f64, hi: f64, stride: usize) -> Vec<usize> {
    let first = coords.iter().position(|&c| c >= lo);
    let last = coords.iter().rposition(|&c| c <= hi);
    match (first, last) {
        (Some(n1), Some(n2)) => {
            let n1 = n1.max(stride / 2);
            (n1..n2 + 1).step_by(stride).collect()
        }
        _ => Vec::new(),
    }
}

impl DataWindow {
    pub fn new(
        bounds: ModelBounds,
        dimension: SurveyDimension,
        stride: usize,
    ) -> PotfieldResult<Self> {
        if stride == 0 {
            return Err(PotfieldError::ConfigError(
                "subsample_stride must be >= 1".to_string(),
            ));
        }
        Ok(DataWindow {
            bounds,
            dimension,
            stride,
        })
    }

    /// Row and column indices kept for one sensor.
    fn sensor_indices(&self, sensor: &SensorGrid) -> (Vec<usize>, Vec<usize>) {
        let b = &self.bounds;
        let cols = window_indices(
            sensor.x.row(0),
            b.xmin + b.zmax,
            b.xmax - b.zmax,
            self.stride,
        );
        let rows = match self.dimension {
            SurveyDimension::Grid if sensor.shape().0 > 1 => window_indices(
                sensor.y.column(0),
                b.ymin + b.zmax,
                b.ymax - b.zmax,
                self.stride,
            ),
            _ => (0..sensor.shape().0).collect(),
        };
        (rows, cols)
    }

    /// Window, decimate and flatten one or more sensors.
    pub fn prepare(&self, sensors: &[SensorGrid]) -> PotfieldResult<WindowedData> {
        if sensors.is_empty() {
            return Err(PotfieldError::EmptyWindow("no sensor data given".to_string()));
        }

        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        let mut values = Vec::new();
        let mut blocks = Vec::with_capacity(sensors.len());
        let mut spacing = (0.0, 0.0);

        for (isensor, sensor) in sensors.iter().enumerate() {
            let (rows, cols) = if sensor.values.is_empty() {
                (Vec::new(), Vec::new())
            } else {
                self.sensor_indices(sensor)
            };
            if rows.is_empty() || cols.is_empty() {
                return Err(PotfieldError::EmptyWindow(format!(
                    "sensor {} has no data inside the model window",
                    isensor + 1
                )));
            }
            let offset = values.len();
            for &r in &rows {
                for &c in &cols {
                    let v = sensor.values[[r, c]];
                    let p = [sensor.x[[r, c]], sensor.y[[r, c]], sensor.z[[r, c]]];
                    if !v.is_finite() || p.iter().any(|q| !q.is_finite()) {
                        return Err(PotfieldError::ConfigError(format!(
                            "sensor {} sample ({r}, {c}) is not finite",
                            isensor + 1
                        )));
                    }
                    x.push(p[0]);
                    y.push(p[1]);
                    z.push(p[2]);
                    values.push(v);
                }
            }
            if isensor == 0 {
                let dx = match cols.as_slice() {
                    [c0, c1, ..] => sensor.x[[rows[0], *c1]] - sensor.x[[rows[0], *c0]],
                    _ => 0.0,
                };
                let dy = match rows.as_slice() {
                    [r0, r1, ..] => sensor.y[[*r1, cols[0]]] - sensor.y[[*r0, cols[0]]],
                    _ => 0.0,
                };
                spacing = (dx, dy);
            }
            let block = BlockShape {
                offset,
                rows: rows.len(),
                cols: cols.len(),
            };
            debug!(
                "sensor {}: {}x{} samples kept of {}x{}",
                isensor + 1,
                block.rows,
                block.cols,
                sensor.shape().0,
                sensor.shape().1
            );
            blocks.push(block);
        }

        let raw = Array1::from_vec(values);
        let centre = median(&raw.view()).unwrap_or(0.0);
        let data_ori = raw.mapv(|v| v - centre);
        let std_data_ori = std_population(&data_ori.view()).unwrap_or(0.0);
        if !(std_data_ori > 0.0) {
            return Err(PotfieldError::ConfigError(
                "windowed data have zero variance".to_string(),
            ));
        }

        let points = ObservationPoints {
            x: Array1::from_vec(x),
            y: Array1::from_vec(y),
            z: Array1::from_vec(z),
        };
        let (dx, dy) = spacing;
        let fold_min = |a: &Array1<f64>| a.iter().copied().fold(f64::INFINITY, f64::min);
        let fold_max = |a: &Array1<f64>| a.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let plot_extent = PlotExtent {
            xmin: fold_min(&points.x) - 0.5 * dx,
            xmax: fold_max(&points.x) + 0.5 * dx,
            ymin: fold_min(&points.y) - 0.5 * dy,
            ymax: fold_max(&points.y) + 0.5 * dy,
        };

        info!(
            "{} data points to be inverted ({} sensor(s))",
            data_ori.len(),
            blocks.len()
        );

        Ok(WindowedData {
            points,
            data_ori,
            std_data_ori,
            blocks,
            plot_extent,
        })
    }
}

/// Reshape one block of a flattened vector into its `(rows, cols)` map.
pub fn block_map(values: &Array1<f64>, block: &BlockShape) -> PotfieldResult<Array2<f64>> {
    if block.offset + block.len() > values.len() {
        return Err(PotfieldError::DimensionMismatch {
            context: "block_map: flattened vector".to_string(),
            expected: block.offset + block.len(),
            got: values.len(),
        });
    }
    values
        .slice(s![block.offset..block.offset + block.len()])
        .to_owned()
        .into_shape_with_order((block.rows, block.cols))
        .map_err(|e| PotfieldError::LinAlg(format!("block_map: {e}")))
}
