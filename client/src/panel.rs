//! Switches, levers and buttons on the launch workstations.
//!
//! Each control is gated by its workstation's power before it produces a
//! command. The controls themselves are re-synced from the mirror whenever
//! the host reports a change, so a refused command snaps them back.

use crate::mirror::ShipMirror;
use log::warn;
use shared::workstation::{Button, Lever, Light, Switch, Workstation};
use shared::{Command, WorkstationId, THRUSTER_COUNT};

#[derive(Debug, Default, Clone, Copy)]
pub struct ControlPanel {
    thrusters: [Switch; THRUSTER_COUNT],
    lock: Lever,
    eject: Button,
    insert: Button,
    launch_light: Light,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(&mut self, mirror: &ShipMirror) {
        let state = mirror.state();
        for (switch, on) in self.thrusters.iter_mut().zip(state.thrusters) {
            switch.on = on;
        }
        self.lock.engaged = state.trajectory_locked;
        self.launch_light.set(state.launchable);
    }

    pub fn flip_thruster(&mut self, mirror: &ShipMirror, index: usize, on: bool) -> Option<Command> {
        let Some(switch) = self.thrusters.get_mut(index) else {
            warn!("No thruster {}", index);
            return None;
        };
        let station = mirror.workstation(WorkstationId::FlightEngineer);
        if let Err(e) = switch.set(&station, on) {
            warn!("Thruster switch: {}", e);
            return None;
        }
        Some(Command::SetThruster { index, on })
    }

    pub fn flip_all_thrusters(&mut self, mirror: &ShipMirror, on: bool) -> Option<Command> {
        let station = mirror.workstation(WorkstationId::FlightEngineer);
        for switch in &mut self.thrusters {
            if let Err(e) = switch.set(&station, on) {
                warn!("Thruster switches: {}", e);
                return None;
            }
        }
        Some(Command::SetAllThrusters { on })
    }

    pub fn pull_lock(&mut self, mirror: &ShipMirror, locked: bool) -> Option<Command> {
        let station = mirror.workstation(WorkstationId::TrajectoryStation);
        match self.lock.set(&station, locked) {
            Ok(_) => Some(Command::SetTrajectoryLock { locked }),
            Err(e) => {
                warn!("Trajectory lock: {}", e);
                None
            }
        }
    }

    pub fn press_eject(&mut self, mirror: &ShipMirror) -> Option<Command> {
        let station = mirror.workstation(WorkstationId::NavStation);
        press(&mut self.eject, &station, Command::EjectCube)
    }

    pub fn press_insert(&mut self, mirror: &ShipMirror) -> Option<Command> {
        let station = mirror.workstation(WorkstationId::CubeStation);
        press(&mut self.insert, &station, Command::InsertCube)
    }

    pub fn launch_light(&self, mirror: &ShipMirror) -> bool {
        self.launch_light
            .shows(&mirror.workstation(WorkstationId::FlightEngineer))
    }
}

fn press(button: &mut Button, station: &Workstation, command: Command) -> Option<Command> {
    if let Err(e) = button.press(station) {
        warn!("{:?}: {}", command, e);
        return None;
    }
    button.release();
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::StateChange;

    fn unpowered(station: WorkstationId) -> ShipMirror {
        let mut mirror = ShipMirror::new();
        mirror.apply_change(StateChange::WorkstationPower {
            station,
            powered: false,
        });
        mirror
    }

    #[test]
    fn test_thruster_switches() {
        let mirror = ShipMirror::new();
        let mut panel = ControlPanel::new();

        assert_eq!(
            panel.flip_thruster(&mirror, 3, true),
            Some(Command::SetThruster { index: 3, on: true })
        );
        assert_eq!(panel.flip_thruster(&mirror, THRUSTER_COUNT, true), None);
        assert_eq!(
            panel.flip_all_thrusters(&mirror, false),
            Some(Command::SetAllThrusters { on: false })
        );
    }

    #[test]
    fn test_controls_need_power() {
        let mut panel = ControlPanel::new();

        let mirror = unpowered(WorkstationId::FlightEngineer);
        assert_eq!(panel.flip_thruster(&mirror, 0, true), None);

        let mirror = unpowered(WorkstationId::NavStation);
        assert_eq!(panel.press_eject(&mirror), None);
        assert_eq!(panel.press_insert(&mirror), Some(Command::InsertCube));

        let mirror = unpowered(WorkstationId::TrajectoryStation);
        assert_eq!(panel.pull_lock(&mirror, true), None);
    }

    #[test]
    fn test_sync_snaps_controls_to_host_state() {
        let mut mirror = ShipMirror::new();
        let mut panel = ControlPanel::new();
        panel.flip_thruster(&mirror, 1, true);

        mirror.apply_change(StateChange::Launchable(true));
        panel.sync(&mirror);
        assert!(!panel.thrusters[1].on);
        assert!(panel.launch_light(&mirror));

        mirror.apply_change(StateChange::WorkstationPower {
            station: WorkstationId::FlightEngineer,
            powered: false,
        });
        assert!(!panel.launch_light(&mirror));
    }
}
