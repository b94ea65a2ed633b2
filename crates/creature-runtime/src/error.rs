use std::io;
use thiserror::Error;

/// Which transform was being inverted when a singular matrix was met
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStage {
    /// The rest parent matrix handed to a bone at load time
    RestParent,
    /// The bone's own rest world matrix
    RestWorld,
    /// The bind pose matrix anchored at the rest start point
    BindWorld,
    /// The animated parent world matrix (`update_all_transforms(true)`)
    ParentWorld,
}

impl std::fmt::Display for TransformStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RestParent => "rest parent",
            Self::RestWorld => "rest world",
            Self::BindWorld => "bind world",
            Self::ParentWorld => "parent world",
        };
        f.write_str(name)
    }
}

/// Error types for Creature asset loading and playback
#[derive(Error, Debug)]
pub enum CreatureError {
    /// I/O error while reading an asset
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed JSON or JSON that does not match the asset layout
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Structurally invalid asset data
    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    /// A matrix with zero determinant was inverted
    #[error("Degenerate {stage} transform on bone '{bone}'")]
    DegenerateTransform { bone: String, stage: TransformStage },

    /// No animation clip with this name has been loaded
    #[error("Unknown animation: {0}")]
    UnknownAnimation(String),

    /// Playback was requested before any clip was made active
    #[error("No active animation")]
    NoActiveAnimation,

    /// No bone with this key exists in the skeleton
    #[error("Unknown bone: {0}")]
    UnknownBone(String),
}

/// Result type using CreatureError
pub type Result<T> = std::result::Result<T, CreatureError>;
