//! Authoritative ship state.
//!
//! [`ShipStateManager`] is the single source of truth for everything the crew
//! shares: the session, the unlocked locations and missions merged in from the
//! game-state service, the cube, the thrusters, the trajectory dials and the
//! launch state machine.
//!
//! ## Launch sequence
//!
//! 1. A location is selected, which pushes its three trajectory targets to
//!    the dials.
//! 2. The crew turns each dial onto its target and engages the trajectory
//!    lock.
//! 3. With the cube in the cube drive and all thrusters on, the ship becomes
//!    launchable and the launch slider issues a jump.
//! 4. The game-state service confirms the jump; only then does the ship
//!    broadcast the launch and reset itself.
//!
//! ## Cube
//!
//! `InNavReader -> InPlayerHands -> InCubeDrive`, with `NotAvailable` reached
//! only through a reset. A fresh snapshot with the cube available puts it
//! back in the nav reader. No other transition exists.
//!
//! Every write goes through a [`Replicated`] field and emits one
//! [`StateChange`] only when the value really changed.

use crate::error::{GameBrainError, ShipError};
use crate::game_brain::GameBrainRequest;
use crate::replicated::{Outbox, Replicated, ReplicatedList, ThrusterSet};
use log::{debug, error, info, warn};
use shared::{
    CubeState, DialKind, DialState, Equivalent, GameData, Location, MissionData, PlayerId, Rpc,
    Session, ShipSnapshot, StateChange, TrajectoryTargets, THRUSTER_COUNT,
};
use std::time::{Duration, Instant};

pub struct ShipStateManager {
    session: Replicated<Session>,
    galaxy_map_enabled: Replicated<bool>,
    first_contact_complete: Replicated<bool>,
    current_location: Replicated<Option<Location>>,
    unlocked_locations: ReplicatedList<Location>,
    missions: ReplicatedList<MissionData>,

    cube_state: Replicated<CubeState>,
    player_holding_cube: Option<PlayerId>,
    thrusters: ThrusterSet,

    location_set: Replicated<bool>,
    current_set_location_index: Replicated<usize>,
    dials: [DialState; 3],
    trajectory_locked: Replicated<bool>,
    launchable: Replicated<bool>,

    reset_delay: Duration,
    pending_reset_at: Option<Instant>,
    pending_jump: Option<String>,

    outbox: Outbox,
}

impl ShipStateManager {
    pub fn new(reset_delay: Duration) -> Self {
        Self {
            session: Replicated::default(),
            galaxy_map_enabled: Replicated::default(),
            first_contact_complete: Replicated::default(),
            current_location: Replicated::default(),
            unlocked_locations: ReplicatedList::new(),
            missions: ReplicatedList::new(),
            cube_state: Replicated::new(CubeState::NotAvailable),
            player_holding_cube: None,
            thrusters: ThrusterSet::default(),
            location_set: Replicated::default(),
            current_set_location_index: Replicated::default(),
            dials: [DialState::default(); 3],
            trajectory_locked: Replicated::default(),
            launchable: Replicated::default(),
            reset_delay,
            pending_reset_at: None,
            pending_jump: None,
            outbox: Outbox::default(),
        }
    }

    pub fn session(&self) -> &Session {
        self.session.get()
    }

    pub fn galaxy_map_enabled(&self) -> bool {
        self.galaxy_map_enabled.value()
    }

    pub fn first_contact_complete(&self) -> bool {
        self.first_contact_complete.value()
    }

    pub fn current_location(&self) -> Option<&Location> {
        self.current_location.get().as_ref()
    }

    pub fn unlocked_locations(&self) -> &[Location] {
        self.unlocked_locations.as_slice()
    }

    pub fn missions(&self) -> &[MissionData] {
        self.missions.as_slice()
    }

    pub fn cube_state(&self) -> CubeState {
        self.cube_state.value()
    }

    pub fn player_holding_cube(&self) -> Option<PlayerId> {
        self.player_holding_cube
    }

    pub fn thruster(&self, index: usize) -> Result<bool, ShipError> {
        self.thrusters.get(index)
    }

    pub fn thrusters(&self) -> [bool; THRUSTER_COUNT] {
        self.thrusters.as_array()
    }

    pub fn location_set(&self) -> bool {
        self.location_set.value()
    }

    pub fn current_set_location_index(&self) -> usize {
        self.current_set_location_index.value()
    }

    pub fn dial(&self, kind: DialKind) -> DialState {
        self.dials[kind.index()]
    }

    pub fn trajectory_locked(&self) -> bool {
        self.trajectory_locked.value()
    }

    pub fn launchable(&self) -> bool {
        self.launchable.value()
    }

    pub fn reset_pending(&self) -> bool {
        self.pending_reset_at.is_some()
    }

    pub fn pending_jump(&self) -> Option<&str> {
        self.pending_jump.as_deref()
    }

    pub fn outbox_mut(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    /// Merges one poll of the game-state service.
    ///
    /// A missing snapshot or one without a current location is rejected as a
    /// whole; nothing is written.
    pub fn on_external_data(
        &mut self,
        has_changes: bool,
        data: Option<&GameData>,
        now: Instant,
    ) -> Result<(), ShipError> {
        let data = match data {
            Some(data) if !data.current_location_id.is_empty() => data,
            Some(_) => {
                error!("Dropping ship data poll: empty current location id");
                return Err(ShipError::InvalidSnapshot("empty current location id"));
            }
            None => {
                error!("Dropping ship data poll: no data");
                return Err(ShipError::InvalidSnapshot("no data"));
            }
        };
        debug!(
            "Merging ship data (service reports changes: {})",
            has_changes
        );

        if self.session.set(data.session.clone()) {
            self.outbox
                .change(StateChange::Session(data.session.clone()));
        }
        if self.galaxy_map_enabled.set(data.session.galaxy_map_enabled) {
            self.outbox.change(StateChange::GalaxyMapEnabled(
                data.session.galaxy_map_enabled,
            ));
        }
        if self.first_contact_complete.set(data.first_contact_complete) {
            self.outbox.change(StateChange::FirstContactComplete(
                data.first_contact_complete,
            ));
        }

        let previous_id = self
            .current_location
            .get()
            .as_ref()
            .map(|l| l.location_id.clone())
            .unwrap_or_default();
        let location_changed =
            !previous_id.is_empty() && previous_id != data.current_location_id;

        for op in self
            .unlocked_locations
            .merge(&data.locations, Location::is_equivalent)
        {
            self.outbox.change(StateChange::UnlockedLocations(op));
        }
        for op in self
            .missions
            .merge(&data.missions, MissionData::is_equivalent)
        {
            self.outbox.change(StateChange::Missions(op));
        }

        if self.location_set() && self.current_set_location_index() >= self.unlocked_locations.len()
        {
            warn!(
                "Selected location index {} no longer exists, clearing selection",
                self.current_set_location_index()
            );
            let _ = self.set_location(-1);
        }

        let current = self
            .unlocked_locations
            .iter()
            .find(|l| l.location_id == data.current_location_id)
            .cloned();
        if current.is_none() {
            warn!(
                "Current location {} is not among the unlocked locations",
                data.current_location_id
            );
        }
        if self.current_location.set(current.clone()) {
            self.outbox.change(StateChange::CurrentLocation(current));
        }

        if data.cube_available && self.cube_state() == CubeState::NotAvailable {
            self.set_cube_state(CubeState::InNavReader);
        }

        if location_changed {
            info!(
                "Ship moved from {} to {}, resetting in {:?}",
                previous_id, data.current_location_id, self.reset_delay
            );
            self.pending_reset_at = Some(now + self.reset_delay);
        }

        Ok(())
    }

    /// Runs timers. Call once per frame.
    pub fn update(&mut self, now: Instant) {
        if let Some(at) = self.pending_reset_at {
            if now >= at {
                self.pending_reset_at = None;
                self.reset_ship();
            }
        }
    }

    /// Selects a location by its index in the unlocked list, or clears the
    /// selection with -1.
    pub fn set_location(&mut self, index: i32) -> Result<(), ShipError> {
        let (set, slot, targets) = if index == -1 {
            (false, 0, TrajectoryTargets::CLEARED)
        } else {
            let selected = usize::try_from(index)
                .ok()
                .and_then(|i| self.unlocked_locations.get(i).map(|l| (i, l.targets())));

            match selected {
                Some((i, targets)) => (true, i, targets),
                None => {
                    let len = self.unlocked_locations.len();
                    warn!("Ignoring location index {} (unlocked: {})", index, len);
                    return Err(ShipError::LocationIndexOutOfRange { index, len });
                }
            }
        };

        let mut changed = self.location_set.set(set);
        changed |= self.current_set_location_index.set(slot);
        for kind in DialKind::ALL {
            changed |= self.dials[kind.index()].set_target(targets.get(kind));
        }

        if changed {
            self.outbox.change(StateChange::LocationSelection {
                set,
                index: slot,
                targets,
            });
        }

        self.release_lock_if_misaligned();
        self.update_launchable();
        Ok(())
    }

    /// Takes the cube out of the nav reader into the player's hands.
    pub fn eject_cube(&mut self, player: PlayerId) -> Result<(), ShipError> {
        let from = self.cube_state();
        if from != CubeState::InNavReader {
            warn!("Player {} cannot eject the cube while it is {:?}", player, from);
            return Err(ShipError::IllegalCubeTransition {
                from,
                to: CubeState::InPlayerHands,
            });
        }

        self.player_holding_cube = Some(player);
        self.set_cube_state(CubeState::InPlayerHands);
        Ok(())
    }

    /// Puts the cube from a player's hands into the cube drive.
    pub fn insert_cube(&mut self) -> Result<(), ShipError> {
        let from = self.cube_state();
        if from != CubeState::InPlayerHands {
            warn!("Cannot insert the cube while it is {:?}", from);
            return Err(ShipError::IllegalCubeTransition {
                from,
                to: CubeState::InCubeDrive,
            });
        }

        self.set_cube_state(CubeState::InCubeDrive);
        Ok(())
    }

    /// Drops the holder reference when a player leaves mid-carry.
    pub fn release_cube_holder(&mut self, player: PlayerId) {
        if self.player_holding_cube == Some(player) {
            info!("Cube holder {} left", player);
            self.player_holding_cube = None;
            self.outbox.change(StateChange::CubeState {
                state: self.cube_state(),
                holder: None,
            });
        }
    }

    fn set_cube_state(&mut self, state: CubeState) {
        let previous_holder = self.player_holding_cube;
        if state != CubeState::InPlayerHands {
            self.player_holding_cube = None;
            if let Some(player) = previous_holder {
                self.outbox.send_to(player, Rpc::HideCube);
            }
        }

        let changed = self.cube_state.set(state);
        if changed || previous_holder != self.player_holding_cube {
            info!("Cube {:?} (holder {:?})", state, self.player_holding_cube);
            self.outbox.change(StateChange::CubeState {
                state,
                holder: self.player_holding_cube,
            });
        }
        self.update_launchable();
    }

    pub fn set_thruster(&mut self, index: usize, on: bool) -> Result<(), ShipError> {
        if self.thrusters.set(index, on).inspect_err(|e| warn!("{}", e))? {
            self.outbox.change(StateChange::Thruster { index, on });
            self.update_launchable();
        }
        Ok(())
    }

    pub fn set_all_thrusters(&mut self, on: bool) {
        for index in 0..THRUSTER_COUNT {
            if let Ok(true) = self.thrusters.set(index, on) {
                self.outbox.change(StateChange::Thruster { index, on });
            }
        }
        self.update_launchable();
    }

    /// Commits a released dial's angle.
    pub fn commit_dial(&mut self, kind: DialKind, angle: i32) {
        let dial = &mut self.dials[kind.index()];
        if dial.set_angle(angle) {
            let dial = *dial;
            debug!("Dial {:?} at {} (activated: {})", kind, dial.angle, dial.activated);
            self.outbox.change(StateChange::Dial { kind, dial });
        }
        self.release_lock_if_misaligned();
        self.update_launchable();
    }

    pub fn all_dials_activated(&self) -> bool {
        self.dials.iter().all(|d| d.activated)
    }

    pub fn set_trajectory_lock(&mut self, locked: bool) -> Result<(), ShipError> {
        if locked && !self.all_dials_activated() {
            warn!("Trajectory lock refused: dials not on target");
            return Err(ShipError::DialsNotActivated);
        }
        if self.trajectory_locked.set(locked) {
            info!("Trajectory {}", if locked { "locked" } else { "unlocked" });
            self.outbox.change(StateChange::TrajectoryLocked(locked));
        }
        self.update_launchable();
        Ok(())
    }

    fn release_lock_if_misaligned(&mut self) {
        if self.trajectory_locked() && !self.all_dials_activated() {
            self.trajectory_locked.set(false);
            self.outbox.change(StateChange::TrajectoryLocked(false));
        }
    }

    fn update_launchable(&mut self) {
        let launchable = self.location_set()
            && self.trajectory_locked()
            && self.cube_state() == CubeState::InCubeDrive
            && self.thrusters.all_on();

        if self.launchable.set(launchable) {
            info!("Ship launchable: {}", launchable);
            self.outbox.change(StateChange::Launchable(launchable));
        }
    }

    /// Asks the game-state service to jump to the selected location. The ship
    /// only launches once the service confirms.
    pub fn request_jump(&mut self) -> Result<(), ShipError> {
        if !self.location_set() {
            warn!("Jump refused: no location set");
            return Err(ShipError::NoLocationSet);
        }
        let index = self.current_set_location_index();
        let Some(location) = self.unlocked_locations.get(index) else {
            let len = self.unlocked_locations.len();
            warn!("Jump refused: location index {} out of range", index);
            return Err(ShipError::LocationIndexOutOfRange {
                index: index as i32,
                len,
            });
        };
        if !self.launchable() {
            warn!("Jump refused: ship not launchable");
            return Err(ShipError::NotLaunchable);
        }

        let location_id = location.location_id.clone();
        info!("Requesting jump to {}", location_id);
        self.pending_jump = Some(location_id.clone());
        self.outbox
            .request(GameBrainRequest::Jump { location_id });
        Ok(())
    }

    pub fn on_jump_response(&mut self, location_id: &str, result: Result<(), GameBrainError>) {
        if self.pending_jump.as_deref() != Some(location_id) {
            warn!("Ignoring stale jump response for {}", location_id);
            return;
        }
        self.pending_jump = None;

        match result {
            Ok(()) => {
                info!("Jump to {} confirmed", location_id);
                self.outbox.broadcast(Rpc::Launch {
                    location_id: location_id.to_string(),
                    cutscene_url: self.session().jump_cutscene_url.clone(),
                });
                self.reset_ship();
            }
            Err(e) => warn!("Jump to {} failed: {}", location_id, e),
        }
    }

    pub fn request_unlock(&mut self, code: String) {
        self.outbox
            .request(GameBrainRequest::UnlockLocation { code });
    }

    /// Returns the launch stations to their idle state. Safe to repeat.
    pub fn reset_ship(&mut self) {
        info!("Resetting ship");
        self.set_cube_state(CubeState::NotAvailable);
        self.set_all_thrusters(false);
        let _ = self.set_location(-1);

        for kind in DialKind::ALL {
            let dial = &mut self.dials[kind.index()];
            if dial.set_angle(0) {
                let dial = *dial;
                self.outbox.change(StateChange::Dial { kind, dial });
            }
        }
        if self.trajectory_locked.set(false) {
            self.outbox.change(StateChange::TrajectoryLocked(false));
        }
        self.update_launchable();

        self.outbox.broadcast(Rpc::ResetLaunchWorkstations);
    }

    pub fn fill_snapshot(&self, snapshot: &mut ShipSnapshot) {
        snapshot.session = self.session().clone();
        snapshot.galaxy_map_enabled = self.galaxy_map_enabled();
        snapshot.first_contact_complete = self.first_contact_complete();
        snapshot.current_location = self.current_location().cloned();
        snapshot.unlocked_locations = self.unlocked_locations().to_vec();
        snapshot.missions = self.missions().to_vec();
        snapshot.cube_state = self.cube_state();
        snapshot.cube_holder = self.player_holding_cube;
        snapshot.thrusters = self.thrusters();
        snapshot.location_set = self.location_set();
        snapshot.current_set_location_index = self.current_set_location_index();
        snapshot.dials = self.dials;
        snapshot.trajectory_locked = self.trajectory_locked();
        snapshot.launchable = self.launchable();
    }
}
