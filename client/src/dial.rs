//! Local trajectory controls.
//!
//! Dials turn freely on the terminal and are only committed to the host when
//! let go. The launch slider fires a jump once per stroke past its threshold.

use crate::mirror::ShipMirror;
use log::{debug, warn};
use shared::workstation::{Dial, Slider};
use shared::{Command, DialKind, WorkstationId, LAUNCH_THRESHOLD};

#[derive(Debug, Clone, Copy)]
pub struct DialInput {
    kind: DialKind,
    dial: Dial,
}

impl DialInput {
    pub fn new(kind: DialKind) -> Self {
        Self {
            kind,
            dial: Dial::default(),
        }
    }

    pub fn kind(&self) -> DialKind {
        self.kind
    }

    pub fn angle(&self) -> i32 {
        self.dial.state.angle
    }

    /// Picks up the host's committed dial so local turning starts from it.
    pub fn sync(&mut self, mirror: &ShipMirror) {
        if !self.dial.is_held() {
            self.dial.state = mirror.state().dials[self.kind.index()];
        }
    }

    pub fn rotate(&mut self, mirror: &ShipMirror, delta: i32) -> Option<i32> {
        let station = mirror.workstation(WorkstationId::TrajectoryStation);
        match self.dial.rotate(&station, delta) {
            Ok(angle) => Some(angle),
            Err(e) => {
                warn!("{:?} dial: {}", self.kind, e);
                None
            }
        }
    }

    /// Turns the dial to an absolute angle in one motion.
    pub fn turn_to(&mut self, mirror: &ShipMirror, angle: i32) -> Option<i32> {
        let delta = angle - self.dial.state.angle;
        self.rotate(mirror, delta)
    }

    pub fn release(&mut self) -> Option<Command> {
        let angle = self.dial.release()?;
        debug!("{:?} dial released at {}", self.kind, angle);
        Some(Command::CommitDial {
            kind: self.kind,
            angle,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LaunchSlider {
    slider: Slider,
}

impl LaunchSlider {
    pub fn new() -> Self {
        Self {
            slider: Slider::new(LAUNCH_THRESHOLD),
        }
    }

    pub fn value(&self) -> f32 {
        self.slider.value
    }

    /// Moves the slider. Returns `Jump` on the stroke that crosses the
    /// threshold while the ship is launchable.
    pub fn push(&mut self, mirror: &ShipMirror, value: f32) -> Option<Command> {
        let station = mirror.workstation(WorkstationId::FlightEngineer);
        let crossed = match self.slider.set_value(&station, value) {
            Ok(crossed) => crossed,
            Err(e) => {
                warn!("Launch slider: {}", e);
                return None;
            }
        };

        if !crossed {
            return None;
        }
        if !mirror.launchable() {
            warn!("Launch slider pushed but the ship is not launchable");
            return None;
        }
        Some(Command::Jump)
    }

    pub fn reset(&mut self) {
        self.slider.reset();
    }
}

impl Default for LaunchSlider {
    fn default() -> Self {
        Self::new()
    }
}
