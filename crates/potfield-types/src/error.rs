// ─────────────────────────────────────────────────────────────────────
// SCPN Potfield — Error
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PotfieldError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        got: usize,
    },

    #[error("Data window is empty: {0}")]
    EmptyWindow(String),

    #[error("Unknown prism id {id}")]
    UnknownPrism { id: u64 },

    #[error("Linear algebra error: {0}")]
    LinAlg(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PotfieldResult<T> = Result<T, PotfieldError>;
