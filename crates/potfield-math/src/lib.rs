//! Mathematical primitives for SCPN Potfield.

pub mod extrema;
pub mod linalg;
pub mod stats;
