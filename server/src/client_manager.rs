//! Connection roster and command queuing for the host
//!
//! This module handles the server-side bookkeeping of connected crew members:
//! - Connection lifecycle (connect, spawn, disconnect, timeout)
//! - Command buffering in per-client issuance order
//! - Connection health monitoring and automatic cleanup
//!
//! A client's id doubles as its player id once it has spawned.

use log::info;
use shared::{Command, PlayerId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Silence after which a connection is considered lost.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected crew member and their queued commands
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Display name sent with the connect packet
    pub name: String,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Highest command sequence number we've processed
    pub last_processed_command: u32,
    /// Commands waiting for the next tick, ordered by sequence
    pub pending_commands: Vec<(u32, Command)>,
    /// True once the join sequence finished and the player exists
    pub spawned: bool,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, name: String) -> Self {
        Self {
            id,
            addr,
            name,
            last_seen: Instant::now(),
            last_processed_command: 0,
            pending_commands: Vec::new(),
            spawned: false,
        }
    }

    /// Queues a command unless its sequence was already seen.
    ///
    /// Returns false for duplicates and replays of processed commands.
    pub fn add_command(&mut self, sequence: u32, command: Command) -> bool {
        self.last_seen = Instant::now();

        if sequence <= self.last_processed_command
            || self.pending_commands.iter().any(|(s, _)| *s == sequence)
        {
            return false;
        }

        self.pending_commands.push((sequence, command));
        // Sort by sequence to handle out-of-order packet delivery
        self.pending_commands.sort_by_key(|(s, _)| *s);
        true
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    /// Client IDs start from 1 and increment for each new connection.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Returns Some(client_id) if successful, None if the ship is full.
    pub fn add_client(&mut self, addr: SocketAddr, name: &str) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} ({}) connected from {}", client_id, name, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, name.to_string()));

        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client> {
        let removed = self.clients.remove(client_id);
        if let Some(client) = &removed {
            info!("Client {} ({}) disconnected", client.id, client.name);
        }
        removed
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|c| c.addr)
    }

    /// Returns false if the client ID is unknown or the command is stale.
    pub fn add_command(&mut self, client_id: u32, sequence: u32, command: Command) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => client.add_command(sequence, command),
            None => false,
        }
    }

    pub fn touch(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
        }
    }

    /// Takes every queued command, each client's in sequence order, and marks
    /// them processed. Clients that have not spawned yet keep their queue.
    pub fn take_pending_commands(&mut self) -> Vec<(PlayerId, Command)> {
        let mut ids: Vec<u32> = self.clients.keys().copied().collect();
        ids.sort_unstable();

        let mut commands = Vec::new();
        for id in ids {
            let Some(client) = self.clients.get_mut(&id) else {
                continue;
            };
            if !client.spawned {
                continue;
            }
            for (sequence, command) in client.pending_commands.drain(..) {
                client.last_processed_command = client.last_processed_command.max(sequence);
                commands.push((id, command));
            }
        }
        commands
    }

    pub fn mark_spawned(&mut self, client_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.spawned = true;
                true
            }
            None => false,
        }
    }

    /// Removes connections silent for longer than [`CLIENT_TIMEOUT`].
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Addresses of connections that have a spawned player. State deltas only
    /// go to these; everyone else gets them in the spawn snapshot.
    pub fn get_spawned_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .filter(|(_, client)| client.spawned)
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr, "nav".into());

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert_eq!(client.last_processed_command, 0);
        assert!(client.pending_commands.is_empty());
        assert!(!client.spawned);
    }

    #[test]
    fn test_client_orders_commands_by_sequence() {
        let mut client = Client::new(1, test_addr(), "nav".into());

        assert!(client.add_command(2, Command::InsertCube));
        assert!(client.add_command(1, Command::EjectCube));
        assert!(!client.add_command(2, Command::InsertCube));

        assert_eq!(client.pending_commands.len(), 2);
        assert_eq!(client.pending_commands[0], (1, Command::EjectCube));
        assert_eq!(client.pending_commands[1], (2, Command::InsertCube));
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr(), "nav".into());

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);

        assert_eq!(manager.add_client(test_addr(), "a"), Some(1));
        assert!(manager.add_client(test_addr2(), "b").is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let client_id = manager.add_client(test_addr(), "a").unwrap();

        let removed = manager.remove_client(&client_id);
        assert_eq!(removed.map(|c| c.name), Some("a".to_string()));
        assert!(manager.is_empty());
        assert!(manager.remove_client(&999).is_none());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let client_id1 = manager.add_client(test_addr(), "a").unwrap();
        manager.add_client(test_addr2(), "b").unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_commands_wait_for_spawn() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr(), "a").unwrap();

        assert!(manager.add_command(id, 1, Command::Scan));
        assert!(manager.take_pending_commands().is_empty());

        manager.mark_spawned(id);
        assert_eq!(manager.take_pending_commands(), vec![(id, Command::Scan)]);
        assert!(manager.take_pending_commands().is_empty());
    }

    #[test]
    fn test_processed_commands_are_not_replayed() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(test_addr(), "a").unwrap();
        manager.mark_spawned(id);

        manager.add_command(id, 5, Command::Jump);
        manager.take_pending_commands();

        assert!(!manager.add_command(id, 5, Command::Jump));
        assert!(!manager.add_command(id, 3, Command::Jump));
        assert!(manager.add_command(id, 6, Command::Jump));
        assert!(!manager.add_command(999, 1, Command::Jump));
    }

    #[test]
    fn test_take_preserves_per_client_order() {
        let mut manager = ClientManager::new(3);
        let a = manager.add_client(test_addr(), "a").unwrap();
        let b = manager.add_client(test_addr2(), "b").unwrap();
        manager.mark_spawned(a);
        manager.mark_spawned(b);

        manager.add_command(a, 2, Command::InsertCube);
        manager.add_command(b, 1, Command::Scan);
        manager.add_command(a, 1, Command::EjectCube);

        let commands = manager.take_pending_commands();
        let from_a: Vec<_> = commands.iter().filter(|(p, _)| *p == a).collect();
        assert_eq!(commands.len(), 3);
        assert_eq!(from_a[0].1, Command::EjectCube);
        assert_eq!(from_a[1].1, Command::InsertCube);
    }

    #[test]
    fn test_spawned_addrs() {
        let mut manager = ClientManager::new(3);
        let a = manager.add_client(test_addr(), "a").unwrap();
        manager.add_client(test_addr2(), "b").unwrap();
        manager.mark_spawned(a);

        assert_eq!(manager.get_spawned_addrs(), vec![(a, test_addr())]);
        assert_eq!(manager.get_client_addrs().len(), 2);
    }
}
