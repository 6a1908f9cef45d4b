//! Data model shared by the host, the clients and the game-state service.
//!
//! Field names follow the game-state service's JSON shape (camelCase) so the
//! same types deserialize scenario files and travel over the wire.

use serde::{Deserialize, Serialize};

pub type PlayerId = u32;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub team_name: String,
    pub score: i32,
    pub jump_cutscene_url: String,
    pub galaxy_map_enabled: bool,
    /// Unix seconds; zero when the timer has not been started.
    pub timer_start: u64,
    pub timer_end: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryTargets {
    pub launch: i32,
    pub correction: i32,
    pub cube: i32,
}

impl TrajectoryTargets {
    /// Targets used when no location is selected.
    pub const CLEARED: TrajectoryTargets = TrajectoryTargets {
        launch: crate::dial::NO_TARGET,
        correction: crate::dial::NO_TARGET,
        cube: crate::dial::NO_TARGET,
    };

    pub fn get(&self, kind: DialKind) -> i32 {
        match kind {
            DialKind::Launch => self.launch,
            DialKind::Correction => self.correction,
            DialKind::Cube => self.cube,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    #[serde(alias = "id", alias = "locationID")]
    pub location_id: String,
    pub name: String,
    pub trajectory_launch: i32,
    pub trajectory_correction: i32,
    pub trajectory_cube: i32,
    pub backdrop_id: String,
}

impl Location {
    pub fn new(location_id: &str, name: &str, targets: TrajectoryTargets) -> Self {
        Self {
            location_id: location_id.to_string(),
            name: name.to_string(),
            trajectory_launch: targets.launch,
            trajectory_correction: targets.correction,
            trajectory_cube: targets.cube,
            backdrop_id: String::new(),
        }
    }

    pub fn targets(&self) -> TrajectoryTargets {
        TrajectoryTargets {
            launch: self.trajectory_launch,
            correction: self.trajectory_correction,
            cube: self.trajectory_cube,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskData {
    pub task_id: String,
    pub description: String,
    pub complete: bool,
    pub video_present: bool,
    pub info_present: bool,
    pub info_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MissionData {
    pub mission_id: String,
    pub title: String,
    pub summary_short: String,
    pub summary_long: String,
    pub complete: bool,
    pub points: i32,
    pub tasks: Vec<TaskData>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CubeState {
    InNavReader,
    InPlayerHands,
    InCubeDrive,
    #[default]
    NotAvailable,
}

/// Decides which screen and audio/video flow a transmission plays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    Probe,
    #[default]
    #[serde(rename = "None")]
    Blank,
    BadTranslation,
    Incoming,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommEvent {
    pub event_id: String,
    pub template: TemplateKind,
    pub video_url: String,
}

/// One poll of the external game-state service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameData {
    pub session: Session,
    pub current_location_id: String,
    pub locations: Vec<Location>,
    pub missions: Vec<MissionData>,
    pub cube_available: bool,
    pub incoming_transmission: bool,
    pub current_location_scanned: bool,
    pub comm_event: Option<CommEvent>,
    pub first_contact_complete: bool,
}

impl GameData {
    pub fn find_location(&self, location_id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.location_id == location_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanResponse {
    pub event_waiting: bool,
    pub comm_event: Option<CommEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorScreen {
    #[default]
    Off,
    ReadyToScan,
    Scanning,
    NoResults,
    IncomingTransmission { template: TemplateKind },
    RefreshScan,
    PlayingVideo { url: String },
    TransmissionComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkstationId {
    FlightEngineer,
    NavStation,
    TrajectoryStation,
    CubeStation,
    SensorStation,
    PowerRouting,
}

impl WorkstationId {
    pub const ALL: [WorkstationId; 6] = [
        WorkstationId::FlightEngineer,
        WorkstationId::NavStation,
        WorkstationId::TrajectoryStation,
        WorkstationId::CubeStation,
        WorkstationId::SensorStation,
        WorkstationId::PowerRouting,
    ];

    pub fn parse(name: &str) -> Option<WorkstationId> {
        match name.to_ascii_lowercase().as_str() {
            "flight" | "flightengineer" => Some(WorkstationId::FlightEngineer),
            "nav" | "navstation" => Some(WorkstationId::NavStation),
            "trajectory" | "trajectorystation" => Some(WorkstationId::TrajectoryStation),
            "cube" | "cubestation" => Some(WorkstationId::CubeStation),
            "sensor" | "sensorstation" => Some(WorkstationId::SensorStation),
            "power" | "powerrouting" => Some(WorkstationId::PowerRouting),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialKind {
    Launch,
    Correction,
    Cube,
}

impl DialKind {
    pub const ALL: [DialKind; 3] = [DialKind::Launch, DialKind::Correction, DialKind::Cube];

    pub fn index(self) -> usize {
        match self {
            DialKind::Launch => 0,
            DialKind::Correction => 1,
            DialKind::Cube => 2,
        }
    }

    pub fn parse(name: &str) -> Option<DialKind> {
        match name.to_ascii_lowercase().as_str() {
            "launch" => Some(DialKind::Launch),
            "correction" => Some(DialKind::Correction),
            "cube" => Some(DialKind::Cube),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_accepts_service_json() {
        let json = r#"{"id":"loc1","name":"Kuiper Relay","trajectoryLaunch":10,
            "trajectoryCorrection":200,"trajectoryCube":355,"backdropId":"nebula"}"#;
        let location: Location = serde_json::from_str(json).unwrap();

        assert_eq!(location.location_id, "loc1");
        assert_eq!(
            location.targets(),
            TrajectoryTargets {
                launch: 10,
                correction: 200,
                cube: 355
            }
        );
        assert_eq!(location.backdrop_id, "nebula");
    }

    #[test]
    fn test_game_data_defaults_missing_fields() {
        let data: GameData = serde_json::from_str(r#"{"currentLocationId":"loc1"}"#).unwrap();
        assert_eq!(data.current_location_id, "loc1");
        assert!(data.locations.is_empty());
        assert!(data.comm_event.is_none());
        assert!(!data.cube_available);
    }

    #[test]
    fn test_template_kind_none_spelling() {
        let event: CommEvent =
            serde_json::from_str(r#"{"eventId":"e1","template":"None","videoUrl":"v"}"#).unwrap();
        assert_eq!(event.template, TemplateKind::Blank);
    }

    #[test]
    fn test_cleared_targets() {
        assert_eq!(TrajectoryTargets::CLEARED.get(DialKind::Launch), -1);
        assert_eq!(TrajectoryTargets::CLEARED.get(DialKind::Correction), -1);
        assert_eq!(TrajectoryTargets::CLEARED.get(DialKind::Cube), -1);
    }

    #[test]
    fn test_name_parsing() {
        assert_eq!(WorkstationId::parse("Sensor"), Some(WorkstationId::SensorStation));
        assert_eq!(WorkstationId::parse("galley"), None);
        assert_eq!(DialKind::parse("CUBE"), Some(DialKind::Cube));
        assert_eq!(DialKind::Cube.index(), 2);
    }
}
