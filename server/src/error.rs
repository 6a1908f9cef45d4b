//! Error types for the host.
//!
//! Command handlers never send these back to clients; they are logged and the
//! state is left as it was.

use shared::workstation::InteractionError;
use shared::CubeState;

/// Reasons a snapshot or a command was rejected by the ship state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShipError {
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(&'static str),

    #[error("location index {index} out of range (unlocked: {len})")]
    LocationIndexOutOfRange { index: i32, len: usize },

    #[error("thruster index {0} out of range")]
    ThrusterIndexOutOfRange(usize),

    #[error("cube cannot move from {from:?} to {to:?}")]
    IllegalCubeTransition { from: CubeState, to: CubeState },

    #[error("no location is set")]
    NoLocationSet,

    #[error("ship is not launchable")]
    NotLaunchable,

    #[error("trajectory dials are not all activated")]
    DialsNotActivated,
}

/// Reasons a sensor station command was ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("scan already in progress")]
    ScanInProgress,

    #[error("scanning is not available")]
    UnableToScan,

    #[error("no scan response is waiting to be committed")]
    NoScanResponse,

    #[error("player {0} did not request the pending scan")]
    NotScanRequester(u32),

    #[error("no incoming transmission")]
    NoTransmission,

    #[error("comm event {0} does not match the tracked transmission")]
    StaleCommEvent(String),

    #[error("sensor station is not powered")]
    Unpowered,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameBrainError {
    #[error("game-state service unavailable: {0}")]
    Unavailable(String),

    #[error("unknown location {0}")]
    UnknownLocation(String),

    #[error("location {0} is not unlocked")]
    LocationLocked(String),

    #[error("unknown comm event {0}")]
    UnknownCommEvent(String),

    #[error("invalid unlock code {0}")]
    InvalidCode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("unknown scene {0}")]
    UnknownScene(String),

    #[error("scene {0} is not loaded")]
    NotLoaded(String),

    #[error("online scene {0} never became active")]
    OnlineSceneInactive(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scenario file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Why a client command was not executed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Ship(#[from] ShipError),

    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Station(#[from] InteractionError),
}
