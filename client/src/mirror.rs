//! Observer copy of the ship.
//!
//! The mirror is never written by local input. It starts from the snapshot
//! sent at spawn and replays every [`StateChange`] in the order the host
//! wrote it, notifying listeners for each value that actually moved.

use log::{debug, warn};
use shared::workstation::Workstation;
use shared::{
    apply_list_op, CommEvent, CubeState, DialKind, Location, MissionData, PlayerId, SensorChange,
    SensorScreen, ShipSnapshot, StateChange, WorkstationId,
};

/// What changed, as seen by presentation code.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorEvent {
    Resynced,
    SessionChanged,
    GalaxyMapChanged(bool),
    FirstContactChanged(bool),
    LocationChanged(Option<String>),
    LocationsChanged,
    MissionsChanged,
    CubeStateChanged {
        state: CubeState,
        holder: Option<PlayerId>,
    },
    ThrusterChanged {
        index: usize,
        on: bool,
    },
    LocationSelectionChanged {
        set: bool,
        index: usize,
    },
    DialChanged(DialKind),
    TrajectoryLockChanged(bool),
    LaunchableChanged(bool),
    WorkstationPowerChanged {
        station: WorkstationId,
        powered: bool,
    },
    SensorChanged(SensorChange),
    /// A list operation did not fit the local copy; a fresh snapshot is
    /// needed.
    OutOfSync,
}

type Listener = Box<dyn FnMut(&MirrorEvent) + Send>;

#[derive(Default)]
pub struct ShipMirror {
    state: ShipSnapshot,
    synced: bool,
    listeners: Vec<Listener>,
}

impl ShipMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&MirrorEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, event: MirrorEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn state(&self) -> &ShipSnapshot {
        &self.state
    }

    pub fn current_location(&self) -> Option<&Location> {
        self.state.current_location.as_ref()
    }

    pub fn unlocked_locations(&self) -> &[Location] {
        &self.state.unlocked_locations
    }

    pub fn missions(&self) -> &[MissionData] {
        &self.state.missions
    }

    pub fn cube_state(&self) -> CubeState {
        self.state.cube_state
    }

    pub fn launchable(&self) -> bool {
        self.state.launchable
    }

    pub fn incoming_transmission_event(&self) -> Option<&CommEvent> {
        self.state.sensor.incoming_transmission_event.as_ref()
    }

    pub fn sensor_screen(&self) -> &SensorScreen {
        &self.state.sensor.screen
    }

    pub fn is_powered(&self, station: WorkstationId) -> bool {
        self.state
            .workstation_power
            .iter()
            .find(|(id, _)| *id == station)
            .map(|(_, powered)| *powered)
            .unwrap_or(true)
    }

    /// Local view of a workstation for gating primitives.
    pub fn workstation(&self, station: WorkstationId) -> Workstation {
        let mut workstation = Workstation::new(station);
        workstation.set_powered(self.is_powered(station));
        workstation
    }

    pub fn apply_snapshot(&mut self, snapshot: ShipSnapshot) {
        debug!(
            "Applying snapshot ({} locations, {} missions)",
            snapshot.unlocked_locations.len(),
            snapshot.missions.len()
        );
        self.state = snapshot;
        self.synced = true;
        self.notify(MirrorEvent::Resynced);
    }

    /// Drops the copy, e.g. after losing the connection.
    pub fn clear(&mut self) {
        self.state = ShipSnapshot::default();
        self.synced = false;
    }

    /// Applies one delta. Returns the event raised, if the value moved.
    pub fn apply_change(&mut self, change: StateChange) -> Option<MirrorEvent> {
        let event = self.apply(change)?;
        self.notify(event.clone());
        Some(event)
    }

    fn apply(&mut self, change: StateChange) -> Option<MirrorEvent> {
        let state = &mut self.state;
        match change {
            StateChange::Session(session) => {
                replace(&mut state.session, session).then_some(MirrorEvent::SessionChanged)
            }
            StateChange::GalaxyMapEnabled(on) => replace(&mut state.galaxy_map_enabled, on)
                .then_some(MirrorEvent::GalaxyMapChanged(on)),
            StateChange::FirstContactComplete(done) => {
                replace(&mut state.first_contact_complete, done)
                    .then_some(MirrorEvent::FirstContactChanged(done))
            }
            StateChange::CurrentLocation(location) => {
                let id = location.as_ref().map(|l| l.location_id.clone());
                replace(&mut state.current_location, location)
                    .then_some(MirrorEvent::LocationChanged(id))
            }
            StateChange::UnlockedLocations(op) => {
                if apply_list_op(&mut state.unlocked_locations, op) {
                    Some(MirrorEvent::LocationsChanged)
                } else {
                    self.out_of_sync("unlocked locations")
                }
            }
            StateChange::Missions(op) => {
                if apply_list_op(&mut state.missions, op) {
                    Some(MirrorEvent::MissionsChanged)
                } else {
                    self.out_of_sync("missions")
                }
            }
            StateChange::CubeState { state: cube, holder } => {
                let changed = replace(&mut state.cube_state, cube)
                    | replace(&mut state.cube_holder, holder);
                changed.then_some(MirrorEvent::CubeStateChanged {
                    state: cube,
                    holder,
                })
            }
            StateChange::Thruster { index, on } => match state.thrusters.get_mut(index) {
                Some(slot) => replace(slot, on).then_some(MirrorEvent::ThrusterChanged { index, on }),
                None => {
                    warn!("Ignoring thruster index {}", index);
                    None
                }
            },
            StateChange::LocationSelection {
                set,
                index,
                targets,
            } => {
                let mut changed = replace(&mut state.location_set, set);
                changed |= replace(&mut state.current_set_location_index, index);
                for kind in DialKind::ALL {
                    changed |= state.dials[kind.index()].set_target(targets.get(kind));
                }
                changed.then_some(MirrorEvent::LocationSelectionChanged { set, index })
            }
            StateChange::Dial { kind, dial } => {
                replace(&mut state.dials[kind.index()], dial)
                    .then_some(MirrorEvent::DialChanged(kind))
            }
            StateChange::TrajectoryLocked(locked) => replace(&mut state.trajectory_locked, locked)
                .then_some(MirrorEvent::TrajectoryLockChanged(locked)),
            StateChange::Launchable(launchable) => replace(&mut state.launchable, launchable)
                .then_some(MirrorEvent::LaunchableChanged(launchable)),
            StateChange::WorkstationPower { station, powered } => {
                let changed = match state
                    .workstation_power
                    .iter_mut()
                    .find(|(id, _)| *id == station)
                {
                    Some((_, slot)) => replace(slot, powered),
                    None => {
                        state.workstation_power.push((station, powered));
                        true
                    }
                };
                changed.then_some(MirrorEvent::WorkstationPowerChanged { station, powered })
            }
            StateChange::Sensor(change) => {
                let sensor = &mut state.sensor;
                let changed = match change.clone() {
                    SensorChange::IncomingTransmission(v) => {
                        replace(&mut sensor.incoming_transmission, v)
                    }
                    SensorChange::IncomingTransmissionEvent(event) => {
                        replace(&mut sensor.incoming_transmission_event, event)
                    }
                    SensorChange::ScanningInProgress(v) => {
                        replace(&mut sensor.scanning_in_progress, v)
                    }
                    SensorChange::CurrentLocationScanned(v) => {
                        replace(&mut sensor.current_location_scanned, v)
                    }
                    SensorChange::AbleToScan(v) => replace(&mut sensor.able_to_scan, v),
                    SensorChange::Screen(screen) => replace(&mut sensor.screen, screen),
                };
                changed.then_some(MirrorEvent::SensorChanged(change))
            }
        }
    }

    fn out_of_sync(&mut self, list: &str) -> Option<MirrorEvent> {
        warn!("List operation on {} does not fit the local copy", list);
        self.synced = false;
        Some(MirrorEvent::OutOfSync)
    }
}

/// Writes `value` and reports whether it differed.
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
