//! Host-side service context.
//!
//! [`HostContext`] lives as long as the process. The [`ConnectedScope`] it
//! hands out owns every piece of ship state and only exists while the host
//! is running a session; stopping the host tears it down explicitly.

use crate::config::ServerConfig;
use crate::error::{CommandError, SensorError};
use crate::game_brain::GameBrainResponse;
use crate::replicated::{Outbox, Outgoing};
use crate::sensor_station::SensorStation;
use crate::ship_state::ShipStateManager;
use crate::stations::StationRoster;
use log::{debug, info, warn};
use shared::{
    Command, GameData, PlayerId, Rpc, ShipSnapshot, StateChange, WorkstationId,
};
use std::time::Instant;

/// Station whose power gates a command, if any.
pub fn station_for(command: &Command) -> Option<WorkstationId> {
    match command {
        Command::Jump | Command::SetThruster { .. } | Command::SetAllThrusters { .. } => {
            Some(WorkstationId::FlightEngineer)
        }
        Command::EjectCube | Command::SetLocation { .. } | Command::UnlockLocation { .. } => {
            Some(WorkstationId::NavStation)
        }
        Command::InsertCube => Some(WorkstationId::CubeStation),
        Command::CommitDial { .. } | Command::SetTrajectoryLock { .. } => {
            Some(WorkstationId::TrajectoryStation)
        }
        Command::Scan | Command::FinishScan | Command::PlayTransmission => {
            Some(WorkstationId::SensorStation)
        }
        Command::SetWorkstationPower { .. } => Some(WorkstationId::PowerRouting),
        Command::ResetShip
        | Command::CompleteCommEvent { .. }
        | Command::EnterWorkstation { .. }
        | Command::LeaveWorkstation { .. } => None,
    }
}

/// All state scoped to a running session.
pub struct ConnectedScope {
    ship: ShipStateManager,
    sensor: SensorStation,
    roster: StationRoster,
    outbox: Outbox,
    collected: Vec<Outgoing>,
}

impl ConnectedScope {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            ship: ShipStateManager::new(config.reset_delay),
            sensor: SensorStation::new(),
            roster: StationRoster::new(),
            outbox: Outbox::default(),
            collected: Vec::new(),
        }
    }

    pub fn ship(&self) -> &ShipStateManager {
        &self.ship
    }

    pub fn sensor(&self) -> &SensorStation {
        &self.sensor
    }

    pub fn roster(&self) -> &StationRoster {
        &self.roster
    }

    /// Moves queued effects into one ordered list.
    fn collect(&mut self) {
        self.collected.extend(self.ship.outbox_mut().drain());
        self.collected.extend(self.sensor.outbox_mut().drain());
        self.collected.extend(self.outbox.drain());
    }

    /// Runs a client command under host authority. Rejections leave every
    /// field as it was.
    pub fn dispatch(&mut self, player: PlayerId, command: Command) -> Result<(), CommandError> {
        let is_scan = command == Command::Scan;
        let result = self.execute(player, command);
        if let Err(e) = &result {
            warn!("Command from player {} rejected: {}", player, e);
            // The terminal locked itself when it sent the scan.
            if is_scan && self.sensor.scan_requester() != Some(player) {
                self.outbox.send_to(player, Rpc::ScanFailed);
            }
        }
        self.collect();
        result
    }

    fn execute(&mut self, player: PlayerId, command: Command) -> Result<(), CommandError> {
        if let Some(station) = station_for(&command) {
            self.roster.ensure_powered(station)?;
        }
        debug!("Player {} command {:?}", player, command);

        match command {
            Command::Jump => self.ship.request_jump()?,
            Command::EjectCube => self.ship.eject_cube(player)?,
            Command::InsertCube => self.ship.insert_cube()?,
            Command::SetThruster { index, on } => self.ship.set_thruster(index, on)?,
            Command::SetAllThrusters { on } => self.ship.set_all_thrusters(on),
            Command::ResetShip => self.ship.reset_ship(),
            Command::SetLocation { index } => self.ship.set_location(index)?,
            Command::CommitDial { kind, angle } => self.ship.commit_dial(kind, angle),
            Command::SetTrajectoryLock { locked } => self.ship.set_trajectory_lock(locked)?,
            Command::Scan => {
                let location_id = self
                    .ship
                    .current_location()
                    .map(|l| l.location_id.clone())
                    .ok_or(SensorError::UnableToScan)?;
                self.sensor.scan(player, &location_id)?
            }
            Command::FinishScan => self.sensor.finish_scan(player)?,
            Command::PlayTransmission => self.sensor.play_transmission()?,
            Command::CompleteCommEvent { event_id } => {
                self.sensor.complete_comm_event(&event_id)?
            }
            Command::SetWorkstationPower { station, powered } => {
                self.set_workstation_power(station, powered)
            }
            Command::EnterWorkstation { station } => {
                let entered = self.roster.enter(station, player)?;
                if entered && station == WorkstationId::SensorStation {
                    self.sensor.set_workstation_view_on_enter();
                }
            }
            Command::LeaveWorkstation { station } => {
                self.roster.leave(station, player);
            }
            Command::UnlockLocation { code } => self.ship.request_unlock(code),
        }
        Ok(())
    }

    fn set_workstation_power(&mut self, station: WorkstationId, powered: bool) {
        if !self.roster.set_power(station, powered) {
            return;
        }
        self.outbox
            .change(StateChange::WorkstationPower { station, powered });
        if station == WorkstationId::SensorStation {
            self.sensor.set_powered(powered);
        }
    }

    /// Merges one game-state poll into the ship and the sensor station.
    pub fn on_game_data(&mut self, has_changes: bool, data: Option<&GameData>, now: Instant) {
        if self.ship.on_external_data(has_changes, data, now).is_ok() {
            if let Some(data) = data {
                self.sensor.on_game_data(data);
            }
        }
        self.collect();
    }

    pub fn on_brain_response(&mut self, response: GameBrainResponse, now: Instant) {
        match response {
            GameBrainResponse::ShipData { has_changes, data } => {
                self.on_game_data(has_changes, data.as_ref(), now);
                return;
            }
            GameBrainResponse::Jump {
                location_id,
                result,
            } => self.ship.on_jump_response(&location_id, result),
            GameBrainResponse::Scan { requester, result } => {
                self.sensor.on_scan_response(requester, result)
            }
            GameBrainResponse::CommEventCompleted { event_id, result } => match result {
                Ok(()) => info!("Game brain confirmed comm event {}", event_id),
                Err(e) => warn!("Completing comm event {} failed: {}", event_id, e),
            },
            GameBrainResponse::LocationUnlocked { code, result } => match result {
                Ok(location_id) => info!("Code {} unlocked {}", code, location_id),
                Err(e) => warn!("Unlock with code {} failed: {}", code, e),
            },
        }
        self.collect();
    }

    /// Per-frame timers.
    pub fn update(&mut self, now: Instant) {
        self.ship.update(now);
        self.collect();
    }

    /// Cleans up after a player that disconnected or timed out.
    pub fn player_left(&mut self, player: PlayerId) {
        self.ship.release_cube_holder(player);
        self.sensor.release_requester(player);
        for station in self.roster.leave_all(player) {
            debug!("Player {} left {:?}", player, station);
        }
        self.collect();
    }

    pub fn drain_outgoing(&mut self) -> Vec<Outgoing> {
        self.collect();
        std::mem::take(&mut self.collected)
    }

    pub fn snapshot(&self) -> ShipSnapshot {
        let mut snapshot = ShipSnapshot::default();
        self.ship.fill_snapshot(&mut snapshot);
        self.sensor.fill_snapshot(&mut snapshot.sensor);
        snapshot.workstation_power = self.roster.power_table();
        snapshot
    }
}

/// Process-wide context. Owns the configuration and, while a session runs,
/// the connected scope.
pub struct HostContext {
    config: ServerConfig,
    scope: Option<ConnectedScope>,
}

impl HostContext {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            scope: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Opens a fresh connected scope, replacing any previous one.
    pub fn start(&mut self) -> &mut ConnectedScope {
        info!("Opening connected scope");
        self.scope.insert(ConnectedScope::new(&self.config))
    }

    pub fn scope(&self) -> Option<&ConnectedScope> {
        self.scope.as_ref()
    }

    pub fn scope_mut(&mut self) -> Option<&mut ConnectedScope> {
        self.scope.as_mut()
    }

    /// Tears the connected scope down, returning whatever it still had queued.
    pub fn stop(&mut self) -> Vec<Outgoing> {
        match self.scope.take() {
            Some(mut scope) => {
                info!("Closing connected scope");
                scope.drain_outgoing()
            }
            None => Vec::new(),
        }
    }
}
