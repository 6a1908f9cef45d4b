pub mod dial;
pub mod merge;
pub mod model;
pub mod workstation;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use dial::DialState;
pub use merge::{apply_list_op, merge_indexed, Equivalent, ListOp};
pub use model::*;

pub const PROTOCOL_VERSION: u32 = 1;
pub const THRUSTER_COUNT: usize = 4;
pub const SCAN_DURATION: Duration = Duration::from_secs(4);
pub const DEFAULT_RESET_DELAY: Duration = Duration::from_secs(3);
pub const LAUNCH_THRESHOLD: f32 = 0.95;
pub const MAX_PACKET_SIZE: usize = 16 * 1024;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
    },
    Command {
        sequence: u32,
        command: Command,
    },
    Heartbeat,
    Disconnect,

    Connected {
        client_id: u32,
    },
    LoadScene {
        scene: String,
    },
    UnloadScene {
        scene: String,
    },
    Spawned {
        player_id: PlayerId,
    },
    Snapshot {
        snapshot: Box<ShipSnapshot>,
    },
    StateChanged {
        change: StateChange,
    },
    Rpc {
        rpc: Rpc,
    },
    Disconnected {
        reason: String,
    },
}

/// Requests a client may send; only the host executes them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Command {
    Jump,
    EjectCube,
    InsertCube,
    SetThruster { index: usize, on: bool },
    SetAllThrusters { on: bool },
    ResetShip,
    SetLocation { index: i32 },
    CommitDial { kind: DialKind, angle: i32 },
    SetTrajectoryLock { locked: bool },
    Scan,
    FinishScan,
    PlayTransmission,
    CompleteCommEvent { event_id: String },
    SetWorkstationPower { station: WorkstationId, powered: bool },
    EnterWorkstation { station: WorkstationId },
    LeaveWorkstation { station: WorkstationId },
    UnlockLocation { code: String },
}

/// One replicated-field write on the host, in the order it was written.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum StateChange {
    Session(Session),
    GalaxyMapEnabled(bool),
    FirstContactComplete(bool),
    CurrentLocation(Option<Location>),
    UnlockedLocations(ListOp<Location>),
    Missions(ListOp<MissionData>),
    CubeState {
        state: CubeState,
        holder: Option<PlayerId>,
    },
    Thruster {
        index: usize,
        on: bool,
    },
    /// Location flag, index and dial targets travel together so no observer
    /// ever sees a selected location with stale targets.
    LocationSelection {
        set: bool,
        index: usize,
        targets: TrajectoryTargets,
    },
    Dial {
        kind: DialKind,
        dial: DialState,
    },
    TrajectoryLocked(bool),
    Launchable(bool),
    WorkstationPower {
        station: WorkstationId,
        powered: bool,
    },
    Sensor(SensorChange),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum SensorChange {
    IncomingTransmission(bool),
    IncomingTransmissionEvent(Option<CommEvent>),
    ScanningInProgress(bool),
    CurrentLocationScanned(bool),
    AbleToScan(bool),
    Screen(SensorScreen),
}

/// Presentation-only messages. Some are broadcast, some target one player.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Rpc {
    ResetLaunchWorkstations,
    Launch {
        location_id: String,
        cutscene_url: String,
    },
    HideCube,
    ScanResult {
        response: ScanResponse,
    },
    ScanFailed,
    PlayVideo {
        event_id: String,
        url: String,
    },
    StopVideo,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SensorSnapshot {
    pub incoming_transmission: bool,
    pub incoming_transmission_event: Option<CommEvent>,
    pub scanning_in_progress: bool,
    pub current_location_scanned: bool,
    pub able_to_scan: bool,
    pub screen: SensorScreen,
}

/// Full copy of the replicated state, sent once when a player spawns.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ShipSnapshot {
    pub session: Session,
    pub galaxy_map_enabled: bool,
    pub first_contact_complete: bool,
    pub current_location: Option<Location>,
    pub unlocked_locations: Vec<Location>,
    pub missions: Vec<MissionData>,
    pub cube_state: CubeState,
    pub cube_holder: Option<PlayerId>,
    pub thrusters: [bool; THRUSTER_COUNT],
    pub location_set: bool,
    pub current_set_location_index: usize,
    pub dials: [DialState; 3],
    pub trajectory_locked: bool,
    pub launchable: bool,
    pub workstation_power: Vec<(WorkstationId, bool)>,
    pub sensor: SensorSnapshot,
}
