//! Power routing and occupancy of the ship's workstations.

use log::{info, warn};
use shared::workstation::{InteractionError, Pipe, Primitive, Workstation};
use shared::{PlayerId, WorkstationId};
use std::collections::BTreeMap;

pub struct StationRoster {
    stations: BTreeMap<WorkstationId, Workstation>,
    pipes: BTreeMap<WorkstationId, Pipe>,
}

impl StationRoster {
    pub fn new() -> Self {
        Self {
            stations: WorkstationId::ALL
                .iter()
                .map(|id| (*id, Workstation::new(*id)))
                .collect(),
            pipes: WorkstationId::ALL
                .iter()
                .filter(|id| **id != WorkstationId::PowerRouting)
                .map(|id| (*id, Pipe::new(*id)))
                .collect(),
        }
    }

    pub fn get(&self, id: WorkstationId) -> Option<&Workstation> {
        self.stations.get(&id)
    }

    pub fn is_powered(&self, id: WorkstationId) -> bool {
        self.stations.get(&id).map(|s| s.powered).unwrap_or(false)
    }

    pub fn ensure_powered(&self, id: WorkstationId) -> Result<(), InteractionError> {
        match self.stations.get(&id) {
            Some(station) => station.ensure_interactable(),
            None => Err(InteractionError::Unpowered(id)),
        }
    }

    /// Routes power to a station by connecting or cutting its pipe. The
    /// routing board itself has no pipe and is always on.
    pub(crate) fn set_power(&mut self, id: WorkstationId, powered: bool) -> bool {
        let Some(pipe) = self.pipes.get_mut(&id) else {
            warn!("{:?} cannot be switched off", id);
            return false;
        };
        pipe.set_connected(powered);
        let flowing = pipe.is_activated();

        let changed = self
            .stations
            .get_mut(&id)
            .map(|station| station.set_powered(flowing))
            .unwrap_or(false);
        if changed {
            info!("{:?} power {}", id, if flowing { "on" } else { "off" });
        }
        changed
    }

    pub(crate) fn enter(&mut self, id: WorkstationId, player: PlayerId) -> Result<bool, InteractionError> {
        match self.stations.get_mut(&id) {
            Some(station) => station.enter(player),
            None => Err(InteractionError::Unpowered(id)),
        }
    }

    pub(crate) fn leave(&mut self, id: WorkstationId, player: PlayerId) -> bool {
        self.stations
            .get_mut(&id)
            .map(|s| s.leave(player))
            .unwrap_or(false)
    }

    /// Frees every station the player occupied.
    pub(crate) fn leave_all(&mut self, player: PlayerId) -> Vec<WorkstationId> {
        self.stations
            .values_mut()
            .filter_map(|s| if s.leave(player) { Some(s.id) } else { None })
            .collect()
    }

    pub fn power_table(&self) -> Vec<(WorkstationId, bool)> {
        self.stations.values().map(|s| (s.id, s.powered)).collect()
    }
}

impl Default for StationRoster {
    fn default() -> Self {
        Self::new()
    }
}
