//! Host-writable replicated fields.
//!
//! Everything in here can be read by anyone holding a reference, but only code
//! inside the server crate can write. Writes report whether the value actually
//! changed so callers emit exactly one [`StateChange`] per real transition and
//! nothing for no-op writes.

use crate::error::ShipError;
use crate::game_brain::GameBrainRequest;
use shared::{ListOp, PlayerId, Rpc, StateChange, THRUSTER_COUNT};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replicated<T> {
    value: T,
}

impl<T: PartialEq> Replicated<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Returns true if the stored value changed.
    pub(crate) fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }
}

impl<T: Copy + PartialEq> Replicated<T> {
    pub fn value(&self) -> T {
        self.value
    }
}

/// Index-addressed list that is only ever changed through a positional merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplicatedList<T> {
    items: Vec<T>,
}

impl<T: Clone> ReplicatedList<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub(crate) fn merge<F>(&mut self, incoming: &[T], equivalent: F) -> Vec<ListOp<T>>
    where
        F: Fn(&T, &T) -> bool,
    {
        shared::merge_indexed(&mut self.items, incoming, equivalent)
    }
}

/// The four ship thrusters. Fixed size: elements can be set, never inserted
/// or removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrusterSet {
    thrusters: [bool; THRUSTER_COUNT],
}

impl ThrusterSet {
    pub fn get(&self, index: usize) -> Result<bool, ShipError> {
        self.thrusters
            .get(index)
            .copied()
            .ok_or(ShipError::ThrusterIndexOutOfRange(index))
    }

    pub fn all_on(&self) -> bool {
        self.thrusters.iter().all(|on| *on)
    }

    pub fn as_array(&self) -> [bool; THRUSTER_COUNT] {
        self.thrusters
    }

    /// Returns Ok(true) if the element changed.
    pub(crate) fn set(&mut self, index: usize, on: bool) -> Result<bool, ShipError> {
        let slot = self
            .thrusters
            .get_mut(index)
            .ok_or(ShipError::ThrusterIndexOutOfRange(index))?;
        let changed = *slot != on;
        *slot = on;
        Ok(changed)
    }
}

/// Something the host has to send or ask for as a result of a state change.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Change(StateChange),
    Broadcast(Rpc),
    To { player: PlayerId, rpc: Rpc },
    Request(GameBrainRequest),
}

/// Ordered queue of outgoing effects, drained by the network layer once per
/// frame.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<Outgoing>,
}

impl Outbox {
    pub(crate) fn change(&mut self, change: StateChange) {
        self.queue.push(Outgoing::Change(change));
    }

    pub(crate) fn broadcast(&mut self, rpc: Rpc) {
        self.queue.push(Outgoing::Broadcast(rpc));
    }

    pub(crate) fn send_to(&mut self, player: PlayerId, rpc: Rpc) {
        self.queue.push(Outgoing::To { player, rpc });
    }

    pub(crate) fn request(&mut self, request: GameBrainRequest) {
        self.queue.push(Outgoing::Request(request));
    }

    pub fn drain(&mut self) -> Vec<Outgoing> {
        std::mem::take(&mut self.queue)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
