use serde::{Deserialize, Serialize};

pub const FULL_TURN: i32 = 360;

/// Target value meaning "no location selected".
pub const NO_TARGET: i32 = -1;

pub fn normalize_angle(angle: i32) -> i32 {
    angle.rem_euclid(FULL_TURN)
}

/// A dial is activated when its angle sits on its target. Negative targets
/// are the cleared sentinel and never activate.
pub fn is_activated(angle: i32, target: i32) -> bool {
    target >= 0 && normalize_angle(angle) == normalize_angle(target)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialState {
    pub angle: i32,
    pub target: i32,
    pub activated: bool,
}

impl Default for DialState {
    fn default() -> Self {
        Self {
            angle: 0,
            target: NO_TARGET,
            activated: false,
        }
    }
}

impl DialState {
    /// Stores a normalized angle. Returns true if anything observable changed.
    pub fn set_angle(&mut self, angle: i32) -> bool {
        let before = *self;
        self.angle = normalize_angle(angle);
        self.activated = is_activated(self.angle, self.target);
        before != *self
    }

    pub fn set_target(&mut self, target: i32) -> bool {
        let before = *self;
        self.target = if target < 0 {
            NO_TARGET
        } else {
            normalize_angle(target)
        };
        self.activated = is_activated(self.angle, self.target);
        before != *self
    }
}
