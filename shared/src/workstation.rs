//! Interactive workstation primitives.
//!
//! A workstation gates every primitive mounted on it behind its power flag.
//! The primitives only hold local interaction state; anything that must be
//! shared goes to the host as a command and comes back replicated.

use crate::dial::DialState;
use crate::model::{PlayerId, WorkstationId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InteractionError {
    #[error("{0:?} is not powered")]
    Unpowered(WorkstationId),

    #[error("{station:?} is occupied by player {occupant}")]
    Occupied {
        station: WorkstationId,
        occupant: PlayerId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workstation {
    pub id: WorkstationId,
    pub powered: bool,
    pub occupant: Option<PlayerId>,
}

impl Workstation {
    pub fn new(id: WorkstationId) -> Self {
        Self {
            id,
            powered: true,
            occupant: None,
        }
    }

    pub fn is_interactable(&self) -> bool {
        self.powered
    }

    pub fn ensure_interactable(&self) -> Result<(), InteractionError> {
        if self.powered {
            Ok(())
        } else {
            Err(InteractionError::Unpowered(self.id))
        }
    }

    /// Returns true if the flag changed.
    pub fn set_powered(&mut self, powered: bool) -> bool {
        let changed = self.powered != powered;
        self.powered = powered;
        changed
    }

    /// Returns Ok(true) when the player newly occupies the station.
    pub fn enter(&mut self, player: PlayerId) -> Result<bool, InteractionError> {
        match self.occupant {
            Some(occupant) if occupant == player => Ok(false),
            Some(occupant) => Err(InteractionError::Occupied {
                station: self.id,
                occupant,
            }),
            None => {
                self.occupant = Some(player);
                Ok(true)
            }
        }
    }

    pub fn leave(&mut self, player: PlayerId) -> bool {
        if self.occupant == Some(player) {
            self.occupant = None;
            true
        } else {
            false
        }
    }
}

pub trait Primitive {
    fn is_activated(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Switch {
    pub on: bool,
}

impl Switch {
    pub fn set(&mut self, station: &Workstation, on: bool) -> Result<bool, InteractionError> {
        station.ensure_interactable()?;
        let changed = self.on != on;
        self.on = on;
        Ok(changed)
    }

    pub fn toggle(&mut self, station: &Workstation) -> Result<bool, InteractionError> {
        let on = !self.on;
        self.set(station, on)?;
        Ok(on)
    }
}

impl Primitive for Switch {
    fn is_activated(&self) -> bool {
        self.on
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lever {
    pub engaged: bool,
}

impl Lever {
    pub fn set(&mut self, station: &Workstation, engaged: bool) -> Result<bool, InteractionError> {
        station.ensure_interactable()?;
        let changed = self.engaged != engaged;
        self.engaged = engaged;
        Ok(changed)
    }
}

impl Primitive for Lever {
    fn is_activated(&self) -> bool {
        self.engaged
    }
}

/// Momentary push button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Button {
    pub pressed: bool,
}

impl Button {
    pub fn press(&mut self, station: &Workstation) -> Result<(), InteractionError> {
        station.ensure_interactable()?;
        self.pressed = true;
        Ok(())
    }

    pub fn release(&mut self) {
        self.pressed = false;
    }
}

impl Primitive for Button {
    fn is_activated(&self) -> bool {
        self.pressed
    }
}

/// A 0..=1 slider that fires once each time it is pushed past its threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slider {
    pub value: f32,
    pub threshold: f32,
    armed: bool,
}

impl Slider {
    pub fn new(threshold: f32) -> Self {
        Self {
            value: 0.0,
            threshold,
            armed: true,
        }
    }

    /// Moves the slider and returns true on the stroke that crosses the
    /// threshold. Dropping back below the threshold re-arms it.
    pub fn set_value(&mut self, station: &Workstation, value: f32) -> Result<bool, InteractionError> {
        station.ensure_interactable()?;
        self.value = value.clamp(0.0, 1.0);

        if self.value >= self.threshold {
            let crossed = self.armed;
            self.armed = false;
            Ok(crossed)
        } else {
            self.armed = true;
            Ok(false)
        }
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
        self.armed = true;
    }
}

impl Primitive for Slider {
    fn is_activated(&self) -> bool {
        self.value >= self.threshold
    }
}

/// Indicator light. Only shows while its workstation has power.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Light {
    pub lit: bool,
}

impl Light {
    pub fn set(&mut self, lit: bool) -> bool {
        let changed = self.lit != lit;
        self.lit = lit;
        changed
    }

    pub fn shows(&self, station: &Workstation) -> bool {
        self.lit && station.powered
    }
}

impl Primitive for Light {
    fn is_activated(&self) -> bool {
        self.lit
    }
}

/// Power conduit feeding a workstation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipe {
    pub feeds: WorkstationId,
    pub connected: bool,
}

impl Pipe {
    pub fn new(feeds: WorkstationId) -> Self {
        Self {
            feeds,
            connected: true,
        }
    }

    pub fn set_connected(&mut self, connected: bool) -> bool {
        let changed = self.connected != connected;
        self.connected = connected;
        changed
    }
}

impl Primitive for Pipe {
    fn is_activated(&self) -> bool {
        self.connected
    }
}

/// Rotatable dial. The angle moves freely while held and is only handed out
/// for committing when released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dial {
    pub state: DialState,
    held: bool,
}

impl Dial {
    pub fn rotate(&mut self, station: &Workstation, delta: i32) -> Result<i32, InteractionError> {
        station.ensure_interactable()?;
        self.held = true;
        self.state.set_angle(self.state.angle + delta);
        Ok(self.state.angle)
    }

    /// Returns the angle to commit, if the dial was being held.
    pub fn release(&mut self) -> Option<i32> {
        if self.held {
            self.held = false;
            Some(self.state.angle)
        } else {
            None
        }
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl Primitive for Dial {
    fn is_activated(&self) -> bool {
        self.state.activated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_unpowered_station_blocks_interaction() {
        let mut station = Workstation::new(WorkstationId::FlightEngineer);
        let mut switch = Switch::default();

        assert!(station.set_powered(false));
        assert_eq!(
            switch.set(&station, true),
            Err(InteractionError::Unpowered(WorkstationId::FlightEngineer))
        );
        assert!(!switch.is_activated());

        station.set_powered(true);
        assert_eq!(switch.set(&station, true), Ok(true));
        assert!(switch.is_activated());
    }

    #[test]
    fn test_occupancy() {
        let mut station = Workstation::new(WorkstationId::SensorStation);
        assert_eq!(station.enter(1), Ok(true));
        assert_eq!(station.enter(1), Ok(false));
        assert!(matches!(
            station.enter(2),
            Err(InteractionError::Occupied { occupant: 1, .. })
        ));
        assert!(!station.leave(2));
        assert!(station.leave(1));
        assert_eq!(station.occupant, None);
    }

    #[test]
    fn test_slider_fires_once_per_stroke() {
        let station = Workstation::new(WorkstationId::FlightEngineer);
        let mut slider = Slider::new(0.9);

        assert_eq!(slider.set_value(&station, 0.5), Ok(false));
        assert_eq!(slider.set_value(&station, 0.95), Ok(true));
        assert_eq!(slider.set_value(&station, 1.5), Ok(false));
        assert_approx_eq!(slider.value, 1.0, 0.0001);

        assert_eq!(slider.set_value(&station, 0.1), Ok(false));
        assert_eq!(slider.set_value(&station, 0.92), Ok(true));
    }

    #[test]
    fn test_dial_commits_on_release_only() {
        let station = Workstation::new(WorkstationId::TrajectoryStation);
        let mut dial = Dial::default();

        assert_eq!(dial.release(), None);
        assert_eq!(dial.rotate(&station, 30), Ok(30));
        assert_eq!(dial.rotate(&station, -40), Ok(350));
        assert!(dial.is_held());
        assert_eq!(dial.release(), Some(350));
        assert_eq!(dial.release(), None);
    }

    #[test]
    fn test_light_needs_power() {
        let mut station = Workstation::new(WorkstationId::SensorStation);
        let mut light = Light::default();
        assert!(light.set(true));
        assert!(light.shows(&station));
        station.set_powered(false);
        assert!(!light.shows(&station));
        assert!(light.is_activated());
    }

    #[test]
    fn test_button_and_lever() {
        let station = Workstation::new(WorkstationId::SensorStation);
        let mut button = Button::default();
        button.press(&station).unwrap();
        assert!(button.is_activated());
        button.release();
        assert!(!button.is_activated());

        let mut lever = Lever::default();
        assert_eq!(lever.set(&station, true), Ok(true));
        assert_eq!(lever.set(&station, true), Ok(false));
    }
}
