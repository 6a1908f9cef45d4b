//! Socket-free half of the client: reacts to host packets and console input
//! and decides which commands to send.

use crate::console::{ConsoleCmd, HELP};
use crate::dial::{DialInput, LaunchSlider};
use crate::mirror::{MirrorEvent, ShipMirror};
use crate::panel::ControlPanel;
use crate::scenes::SceneSet;
use crate::sensor::SensorTerminal;
use log::{debug, info, warn};
use shared::{Command, DialKind, Packet, PlayerId, Rpc};
use std::time::Instant;

pub struct Terminal {
    player_id: Option<PlayerId>,
    mirror: ShipMirror,
    sensor: SensorTerminal,
    dials: [DialInput; 3],
    slider: LaunchSlider,
    panel: ControlPanel,
    scenes: SceneSet,
}

impl Terminal {
    pub fn new() -> Self {
        let mut mirror = ShipMirror::new();
        mirror.subscribe(|event| match event {
            MirrorEvent::LaunchableChanged(true) => info!("Ship is ready to launch"),
            MirrorEvent::CubeStateChanged { state, .. } => info!("Cube is now {:?}", state),
            MirrorEvent::LocationChanged(Some(id)) => info!("Arrived at {}", id),
            MirrorEvent::OutOfSync => warn!("Local ship copy is out of sync"),
            other => debug!("{:?}", other),
        });

        Self {
            player_id: None,
            mirror,
            sensor: SensorTerminal::new(),
            dials: DialKind::ALL.map(DialInput::new),
            slider: LaunchSlider::new(),
            panel: ControlPanel::new(),
            scenes: SceneSet::new(),
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    pub fn is_spawned(&self) -> bool {
        self.player_id.is_some()
    }

    pub fn mirror(&self) -> &ShipMirror {
        &self.mirror
    }

    pub fn sensor(&self) -> &SensorTerminal {
        &self.sensor
    }

    pub fn scenes(&self) -> &SceneSet {
        &self.scenes
    }

    /// Forgets everything tied to the current connection.
    pub fn reset(&mut self) {
        self.player_id = None;
        self.mirror.clear();
        self.sensor = SensorTerminal::new();
        self.slider.reset();
        self.panel.sync(&self.mirror);
        self.scenes.clear();
    }

    pub fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::LoadScene { scene } => {
                self.scenes.load(&scene);
            }
            Packet::UnloadScene { scene } => {
                self.scenes.unload(&scene);
            }
            Packet::Spawned { player_id } => {
                info!("Spawned as player {}", player_id);
                self.player_id = Some(player_id);
            }
            Packet::Snapshot { snapshot } => {
                self.mirror.apply_snapshot(*snapshot);
                for dial in &mut self.dials {
                    dial.sync(&self.mirror);
                }
                self.panel.sync(&self.mirror);
            }
            Packet::StateChanged { change } => {
                if let Some(event) = self.mirror.apply_change(change) {
                    if let MirrorEvent::SensorChanged(change) = &event {
                        self.sensor.on_sensor_change(change);
                    }
                    self.panel.sync(&self.mirror);
                }
            }
            Packet::Rpc { rpc } => self.handle_rpc(rpc),
            _ => warn!("Unexpected packet type"),
        }
    }

    fn handle_rpc(&mut self, rpc: Rpc) {
        match rpc {
            Rpc::ResetLaunchWorkstations => {
                self.slider.reset();
                for dial in &mut self.dials {
                    dial.release();
                    dial.sync(&self.mirror);
                }
            }
            Rpc::Launch {
                location_id,
                cutscene_url,
            } => info!("Jumping to {} ({})", location_id, cutscene_url),
            Rpc::HideCube => info!("Cube left your hands"),
            Rpc::ScanResult { response } => self.sensor.on_scan_result(response),
            Rpc::ScanFailed => self.sensor.on_scan_failed(),
            Rpc::PlayVideo { event_id, url } => info!("Playing transmission {} ({})", event_id, url),
            Rpc::StopVideo => info!("Transmission stopped"),
        }
    }

    /// Turns one console command into the command to send, if any. `Quit` is left
    /// to the caller.
    pub fn handle_console(&mut self, cmd: ConsoleCmd, now: Instant) -> Option<Command> {
        match cmd {
            ConsoleCmd::Scan => self.sensor.request_scan(&self.mirror, now),
            ConsoleCmd::Eject => self.panel.press_eject(&self.mirror),
            ConsoleCmd::Insert => self.panel.press_insert(&self.mirror),
            ConsoleCmd::Slide(value) => self.slider.push(&self.mirror, value),
            ConsoleCmd::Thruster { index, on } => {
                self.panel.flip_thruster(&self.mirror, index, on)
            }
            ConsoleCmd::Thrusters(on) => self.panel.flip_all_thrusters(&self.mirror, on),
            ConsoleCmd::Location(index) => Some(Command::SetLocation { index }),
            ConsoleCmd::Dial { kind, angle } => {
                let dial = &mut self.dials[kind.index()];
                dial.sync(&self.mirror);
                dial.turn_to(&self.mirror, angle)?;
                dial.release()
            }
            ConsoleCmd::Lock(locked) => self.panel.pull_lock(&self.mirror, locked),
            ConsoleCmd::Power { station, on } => Some(Command::SetWorkstationPower {
                station,
                powered: on,
            }),
            ConsoleCmd::Enter(station) => Some(Command::EnterWorkstation { station }),
            ConsoleCmd::Leave(station) => Some(Command::LeaveWorkstation { station }),
            ConsoleCmd::Play => Some(Command::PlayTransmission),
            ConsoleCmd::VideoFinished(url) => self.sensor.on_video_finished(&self.mirror, &url),
            ConsoleCmd::TranslationError(event_id) => {
                self.sensor.on_translation_error(&self.mirror, &event_id)
            }
            ConsoleCmd::Reset => Some(Command::ResetShip),
            ConsoleCmd::Code(code) => Some(Command::UnlockLocation { code }),
            ConsoleCmd::Status => {
                println!("{}", self.status());
                None
            }
            ConsoleCmd::Help => {
                println!("{}", HELP);
                None
            }
            ConsoleCmd::Quit => None,
        }
    }

    /// Per-frame work. Returns a command when a held scan is ready to commit.
    pub fn update(&mut self, now: Instant) -> Option<Command> {
        self.sensor.update(now)
    }

    pub fn status(&self) -> String {
        let state = self.mirror.state();
        let location = state
            .current_location
            .as_ref()
            .map(|l| l.name.as_str())
            .unwrap_or("-");
        let dials: Vec<String> = state
            .dials
            .iter()
            .map(|d| format!("{}/{}{}", d.angle, d.target, if d.activated { "*" } else { "" }))
            .collect();

        format!(
            "location: {} | selected: {} #{} | cube: {:?} | thrusters: {:?} | dials: [{}] | locked: {} | launch light: {} | sensor: {:?}",
            location,
            state.location_set,
            state.current_set_location_index,
            state.cube_state,
            state.thrusters,
            dials.join(", "),
            state.trajectory_locked,
            self.panel.launch_light(&self.mirror),
            state.sensor.screen,
        )
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}
