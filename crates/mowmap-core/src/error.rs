//! Error types for map transposition and editing.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MapError {
    /// Datum or settings are not available yet.
    #[error("map not ready: {0}")]
    NotReady(String),

    /// A ring ended up with too few vertices to form a polygon.
    #[error("invalid geometry for feature {feature_id}: {reason}")]
    InvalidGeometry { feature_id: String, reason: String },

    /// Edit mode was entered with an unsupported target.
    #[error("cannot enter edit mode: {0}")]
    InvalidModeEntry(String),

    #[error("unknown feature {0}")]
    UnknownFeature(String),

    #[error("invalid feature id {0}")]
    InvalidId(String),

    /// A drawn obstacle does not sit inside any working area.
    #[error("unable to match a working area for obstacle")]
    ObstacleOutsideArea,

    #[error("projection failed: {0}")]
    Projection(String),
}
