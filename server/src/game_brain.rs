//! Bridge to the external game-state service ("Gamebrain").
//!
//! The service owns the mission narrative: which locations are unlocked,
//! where the ship is, which transmissions are waiting. The host polls it for
//! snapshots and forwards jump, scan, comm-event and unlock requests to it.
//!
//! All service calls run on a worker task so the event loop never waits on
//! them. Responses come back over a channel and may never arrive at all; the
//! ship state is written so that a lost response just leaves it where it was.

use crate::error::{ConfigError, GameBrainError};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use shared::{CommEvent, GameData, Location, MissionData, PlayerId, ScanResponse, Session};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

#[derive(Debug, Clone, PartialEq)]
pub enum GameBrainRequest {
    Jump {
        location_id: String,
    },
    Scan {
        requester: PlayerId,
        location_id: String,
    },
    CompleteCommEvent {
        event_id: String,
    },
    UnlockLocation {
        code: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GameBrainResponse {
    ShipData {
        has_changes: bool,
        data: Option<GameData>,
    },
    Jump {
        location_id: String,
        result: Result<(), GameBrainError>,
    },
    Scan {
        requester: PlayerId,
        result: Result<ScanResponse, GameBrainError>,
    },
    CommEventCompleted {
        event_id: String,
        result: Result<(), GameBrainError>,
    },
    LocationUnlocked {
        code: String,
        result: Result<String, GameBrainError>,
    },
}

/// The external game-state service, seen from the host.
pub trait GameBrain: Send + 'static {
    /// Returns whether anything changed since the last fetch, and the
    /// snapshot. The service may answer with no data at all.
    fn fetch_ship_data(&mut self) -> Result<(bool, Option<GameData>), GameBrainError>;

    fn jump(&mut self, location_id: &str) -> Result<(), GameBrainError>;

    fn scan(&mut self, location_id: &str) -> Result<ScanResponse, GameBrainError>;

    fn complete_comm_event(&mut self, event_id: &str) -> Result<(), GameBrainError>;

    /// Returns the id of the location the code unlocked.
    fn unlock_location(&mut self, code: &str) -> Result<String, GameBrainError>;
}

fn handle_request<B: GameBrain>(brain: &mut B, request: GameBrainRequest) -> GameBrainResponse {
    match request {
        GameBrainRequest::Jump { location_id } => {
            let result = brain.jump(&location_id);
            GameBrainResponse::Jump {
                location_id,
                result,
            }
        }
        GameBrainRequest::Scan {
            requester,
            location_id,
        } => GameBrainResponse::Scan {
            requester,
            result: brain.scan(&location_id),
        },
        GameBrainRequest::CompleteCommEvent { event_id } => {
            let result = brain.complete_comm_event(&event_id);
            GameBrainResponse::CommEventCompleted { event_id, result }
        }
        GameBrainRequest::UnlockLocation { code } => {
            let result = brain.unlock_location(&code);
            GameBrainResponse::LocationUnlocked { code, result }
        }
    }
}

/// Spawns the task that polls the service and serves requests.
///
/// The task ends when either channel is closed.
pub fn spawn_game_brain_worker<B: GameBrain>(
    mut brain: B,
    poll_interval: Duration,
    latency: Duration,
    mut requests: mpsc::UnboundedReceiver<GameBrainRequest>,
    responses: mpsc::UnboundedSender<GameBrainResponse>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut poll = interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    match brain.fetch_ship_data() {
                        Ok((has_changes, data)) => {
                            if responses.send(GameBrainResponse::ShipData { has_changes, data }).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Ship data poll failed: {}", e),
                    }
                }

                request = requests.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    debug!("Game brain request: {:?}", request);

                    if !latency.is_zero() {
                        sleep(latency).await;
                    }

                    if responses.send(handle_request(&mut brain, request)).is_err() {
                        break;
                    }
                }
            }
        }

        debug!("Game brain worker stopped");
    })
}

/// A location as described in a scenario file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioLocation {
    #[serde(flatten)]
    pub location: Location,
    pub unlocked: bool,
    pub unlock_code: String,
    pub comm_event: Option<CommEvent>,
    /// Completing this location's transmission completes first contact.
    pub first_contact: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scenario {
    pub session: Session,
    pub start_location_id: String,
    pub locations: Vec<ScenarioLocation>,
    pub missions: Vec<MissionData>,
    /// Probability in 0..=1 that a jump or scan request fails.
    pub failure_rate: f64,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let scenario: Scenario = serde_json::from_str(&text)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ConfigError::Invalid(format!(
                "failureRate {} is outside 0..=1",
                self.failure_rate
            )));
        }
        if !self
            .locations
            .iter()
            .any(|l| l.location.location_id == self.start_location_id)
        {
            return Err(ConfigError::Invalid(format!(
                "start location {} is not defined",
                self.start_location_id
            )));
        }
        Ok(())
    }

    /// Small built-in campaign used when no scenario file is given.
    pub fn demo() -> Self {
        serde_json::from_str(DEMO_SCENARIO).unwrap_or_default()
    }
}

const DEMO_SCENARIO: &str = r#"{
    "session": {
        "teamName": "Cyber Defenders",
        "jumpCutsceneUrl": "videos/jump.mp4",
        "galaxyMapEnabled": false
    },
    "startLocationId": "dock",
    "locations": [
        { "id": "dock", "name": "Orbital Dock", "trajectoryLaunch": 0,
          "trajectoryCorrection": 0, "trajectoryCube": 0, "backdropId": "dock",
          "unlocked": true },
        { "id": "relay", "name": "Kuiper Relay", "trajectoryLaunch": 45,
          "trajectoryCorrection": 270, "trajectoryCube": 120, "backdropId": "relay",
          "unlocked": true,
          "commEvent": { "eventId": "relay-contact", "template": "Incoming",
                         "videoUrl": "videos/relay-contact.mp4" },
          "firstContact": true },
        { "id": "wreck", "name": "Derelict Wreck", "trajectoryLaunch": 300,
          "trajectoryCorrection": 15, "trajectoryCube": 210, "backdropId": "wreck",
          "unlockCode": "BLACKBOX",
          "commEvent": { "eventId": "wreck-signal", "template": "BadTranslation",
                         "videoUrl": "videos/wreck-signal.mp4" } }
    ],
    "missions": [
        { "missionId": "m1", "title": "Make contact", "points": 100,
          "tasks": [ { "taskId": "t1", "description": "Scan the relay" },
                     { "taskId": "t2", "description": "Watch the transmission",
                       "videoPresent": true } ] }
    ]
}"#;

/// In-process stand-in for the game-state service, driven by a [`Scenario`].
pub struct LocalGameBrain {
    scenario: Scenario,
    current_location_id: String,
    unlocked: HashSet<String>,
    scanned: HashSet<String>,
    completed_events: HashSet<String>,
    first_contact_complete: bool,
    dirty: bool,
    rng: StdRng,
}

impl LocalGameBrain {
    pub fn new(scenario: Scenario) -> Self {
        Self::with_rng(scenario, StdRng::from_entropy())
    }

    pub fn with_seed(scenario: Scenario, seed: u64) -> Self {
        Self::with_rng(scenario, StdRng::seed_from_u64(seed))
    }

    fn with_rng(scenario: Scenario, rng: StdRng) -> Self {
        let unlocked = scenario
            .locations
            .iter()
            .filter(|l| l.unlocked || l.location.location_id == scenario.start_location_id)
            .map(|l| l.location.location_id.clone())
            .collect();

        Self {
            current_location_id: scenario.start_location_id.clone(),
            scenario,
            unlocked,
            scanned: HashSet::new(),
            completed_events: HashSet::new(),
            first_contact_complete: false,
            dirty: true,
            rng,
        }
    }

    pub fn current_location_id(&self) -> &str {
        &self.current_location_id
    }

    fn roll_failure(&mut self) -> Result<(), GameBrainError> {
        let rate = self.scenario.failure_rate.clamp(0.0, 1.0);
        if rate > 0.0 && self.rng.gen_bool(rate) {
            return Err(GameBrainError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }

    fn find(&self, location_id: &str) -> Option<&ScenarioLocation> {
        self.scenario
            .locations
            .iter()
            .find(|l| l.location.location_id == location_id)
    }

    fn pending_event(&self, location_id: &str) -> Option<CommEvent> {
        self.find(location_id)
            .and_then(|l| l.comm_event.clone())
            .filter(|e| !self.completed_events.contains(&e.event_id))
    }

    fn snapshot(&self) -> GameData {
        let scanned = self.scanned.contains(&self.current_location_id);
        let comm_event = if scanned {
            self.pending_event(&self.current_location_id)
        } else {
            None
        };

        GameData {
            session: self.scenario.session.clone(),
            current_location_id: self.current_location_id.clone(),
            locations: self
                .scenario
                .locations
                .iter()
                .filter(|l| self.unlocked.contains(&l.location.location_id))
                .map(|l| l.location.clone())
                .collect(),
            missions: self.scenario.missions.clone(),
            cube_available: true,
            incoming_transmission: comm_event.is_some(),
            current_location_scanned: scanned,
            comm_event,
            first_contact_complete: self.first_contact_complete,
        }
    }
}

impl GameBrain for LocalGameBrain {
    fn fetch_ship_data(&mut self) -> Result<(bool, Option<GameData>), GameBrainError> {
        let has_changes = std::mem::replace(&mut self.dirty, false);
        Ok((has_changes, Some(self.snapshot())))
    }

    fn jump(&mut self, location_id: &str) -> Result<(), GameBrainError> {
        self.roll_failure()?;
        if self.find(location_id).is_none() {
            return Err(GameBrainError::UnknownLocation(location_id.to_string()));
        }
        if !self.unlocked.contains(location_id) {
            return Err(GameBrainError::LocationLocked(location_id.to_string()));
        }

        info!("Ship jumped to {}", location_id);
        self.current_location_id = location_id.to_string();
        self.dirty = true;
        Ok(())
    }

    fn scan(&mut self, location_id: &str) -> Result<ScanResponse, GameBrainError> {
        self.roll_failure()?;
        if self.find(location_id).is_none() {
            return Err(GameBrainError::UnknownLocation(location_id.to_string()));
        }

        self.scanned.insert(location_id.to_string());
        self.dirty = true;

        let comm_event = self.pending_event(location_id);
        Ok(ScanResponse {
            event_waiting: comm_event.is_some(),
            comm_event,
        })
    }

    fn complete_comm_event(&mut self, event_id: &str) -> Result<(), GameBrainError> {
        let first_contact = self
            .scenario
            .locations
            .iter()
            .find(|l| l.comm_event.as_ref().map(|e| e.event_id.as_str()) == Some(event_id))
            .map(|l| l.first_contact)
            .ok_or_else(|| GameBrainError::UnknownCommEvent(event_id.to_string()))?;

        self.completed_events.insert(event_id.to_string());
        if first_contact {
            self.first_contact_complete = true;
        }
        self.dirty = true;
        Ok(())
    }

    fn unlock_location(&mut self, code: &str) -> Result<String, GameBrainError> {
        let location_id = self
            .scenario
            .locations
            .iter()
            .find(|l| !l.unlock_code.is_empty() && l.unlock_code.eq_ignore_ascii_case(code))
            .map(|l| l.location.location_id.clone())
            .ok_or_else(|| GameBrainError::InvalidCode(code.to_string()))?;

        if self.unlocked.insert(location_id.clone()) {
            info!("Unlocked location {}", location_id);
            self.dirty = true;
        }
        Ok(location_id)
    }
}
