//! Adaptive regularized inversion of potential-field anomalies on prism meshes.
//!
//! Data windowing, forward kernels, regularization, refinement selection and
//! the iteration engine.

pub mod inversion;
pub mod kernel;
pub mod mesh;
pub mod refinement;
pub mod regularization;
pub mod window;
