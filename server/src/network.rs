//! Server network layer handling UDP communications and the host event loop

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::context::HostContext;
use crate::game_brain::{spawn_game_brain_worker, GameBrain, GameBrainRequest, GameBrainResponse};
use crate::replicated::Outgoing;
use crate::scene_lifecycle::{LocalSceneLoader, SceneLifecycle};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

pub type NetResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    /// The join sequence for this client finished; it may spawn.
    ReadyToSpawn { client_id: u32 },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// Recipients are resolved when the packet is queued so a client that
    /// spawns afterwards never receives a delta already in its snapshot.
    BroadcastPacket {
        packet: Packet,
        recipients: Vec<(u32, SocketAddr)>,
    },
}

/// The host: networking, connected scope, scenes and the game-state worker
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    context: HostContext,
    scenes: SceneLifecycle<LocalSceneLoader>,
    tick_duration: Duration,
    tick: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
    brain_tx: mpsc::UnboundedSender<GameBrainRequest>,
    brain_rx: mpsc::UnboundedReceiver<GameBrainResponse>,
    brain_handle: JoinHandle<()>,
}

impl Server {
    pub async fn new<B: GameBrain>(config: ServerConfig, brain: B) -> NetResult<Self> {
        config.validate()?;

        let socket = Arc::new(UdpSocket::bind(&config.bind_addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let (brain_tx, brain_requests) = mpsc::unbounded_channel();
        let (brain_responses, brain_rx) = mpsc::unbounded_channel();

        let brain_handle = spawn_game_brain_worker(
            brain,
            config.poll_interval,
            config.brain_latency,
            brain_requests,
            brain_responses,
        );

        let loader = Arc::new(LocalSceneLoader::new(
            config.scene_catalogue(),
            config.tick_duration(),
        ));
        let scenes = SceneLifecycle::new(loader, config.scene_config());

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            tick_duration: config.tick_duration(),
            context: HostContext::new(config),
            scenes,
            tick: 0,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
            brain_tx,
            brain_rx,
            brain_handle,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender for injecting [`ServerMessage::Shutdown`] from outside the loop.
    pub fn shutdown_sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, recipients } => {
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to serialize broadcast: {}", e);
                                continue;
                            }
                        };

                        for (client_id, addr) in recipients {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    /// Runs the host-start scene sequence off the event loop.
    fn spawn_host_start(&self) {
        let scenes = self.scenes.clone();
        let online_scene = self.context.config().online_scene.clone();

        tokio::spawn(async move {
            if let Err(e) = scenes.loader().activate(&online_scene).await {
                error!("Failed to activate online scene: {}", e);
                return;
            }
            if let Err(e) = scenes.run_host_start().await {
                error!("Host start failed: {}", e);
            }
        });
    }

    /// Sends scene instructions to a new connection, then asks the loop to
    /// spawn it.
    fn spawn_join_sequence(&self, client_id: u32, addr: SocketAddr) {
        let scenes = self.scenes.clone();
        let game_tx = self.game_tx.clone();
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            scenes
                .join_sequence(|packet| {
                    if let Err(e) = game_tx.send(GameMessage::SendPacket { packet, addr }) {
                        error!("Failed to queue scene instruction: {}", e);
                    }
                })
                .await;

            if let Err(e) = server_tx.send(ServerMessage::ReadyToSpawn { client_id }) {
                error!("Failed to signal spawn for {}: {}", client_id, e);
            }
        });
    }

    async fn send_packet_impl(socket: &UdpSocket, packet: &Packet, addr: SocketAddr) -> NetResult<()> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Queues a packet for every spawned player.
    async fn broadcast_packet(&self, packet: Packet) {
        let recipients = {
            let clients = self.clients.read().await;
            clients.get_spawned_addrs()
        };
        if recipients.is_empty() {
            return;
        }

        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, recipients })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn remove_client(&mut self, client_id: u32) {
        let removed = {
            let mut clients = self.clients.write().await;
            clients.remove_client(&client_id)
        };
        if removed.is_some() {
            self.player_left(client_id);
        }
    }

    fn player_left(&mut self, client_id: u32) {
        if let Some(scope) = self.context.scope_mut() {
            scope.player_left(client_id);
        }
    }

    /// Processes incoming packets
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect {
                client_version,
                name,
            } => {
                info!(
                    "Client {} connecting from {} (version: {})",
                    name, addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    warn!("Rejecting {}: protocol version {}", addr, client_version);
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // Remove existing connection if present
                let existing_client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };
                if let Some(existing_id) = existing_client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.remove_client(existing_id).await;
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, &name)
                };

                match client_id {
                    Some(client_id) => {
                        self.send_packet(Packet::Connected { client_id }, addr);
                        self.spawn_join_sequence(client_id, addr);
                    }
                    None => self.send_packet(
                        Packet::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    ),
                }
            }

            Packet::Command { sequence, command } => {
                let mut clients = self.clients.write().await;
                match clients.find_client_by_addr(addr) {
                    Some(client_id) => {
                        if !clients.add_command(client_id, sequence, command) {
                            debug!("Dropped stale command {} from {}", sequence, client_id);
                        }
                    }
                    None => warn!("Command from unknown address {}", addr),
                }
            }

            Packet::Heartbeat => {
                let mut clients = self.clients.write().await;
                if let Some(client_id) = clients.find_client_by_addr(addr) {
                    clients.touch(client_id);
                }
            }

            Packet::Disconnect => {
                let client_id = {
                    let clients = self.clients.read().await;
                    clients.find_client_by_addr(addr)
                };

                if let Some(client_id) = client_id {
                    self.remove_client(client_id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Finishes a join: flushes pending deltas, then sends the spawn and the
    /// full snapshot so the new player starts from a consistent state.
    async fn spawn_player(&mut self, client_id: u32) {
        self.flush_outgoing().await;

        let addr = {
            let mut clients = self.clients.write().await;
            if !clients.mark_spawned(client_id) {
                debug!("Client {} left before spawning", client_id);
                return;
            }
            clients.addr_of(client_id)
        };
        let (Some(addr), Some(scope)) = (addr, self.context.scope()) else {
            return;
        };

        info!("Spawning player {}", client_id);
        let snapshot = Box::new(scope.snapshot());
        self.send_packet(
            Packet::Spawned {
                player_id: client_id,
            },
            addr,
        );
        self.send_packet(Packet::Snapshot { snapshot }, addr);
    }

    /// Runs queued commands in per-client order.
    async fn process_commands(&mut self) {
        let commands = {
            let mut clients = self.clients.write().await;
            clients.take_pending_commands()
        };

        let Some(scope) = self.context.scope_mut() else {
            return;
        };
        for (player, command) in commands {
            // Rejections are logged by the scope.
            let _ = scope.dispatch(player, command);
        }
    }

    /// Turns the scope's queued effects into packets and service requests.
    async fn flush_outgoing(&mut self) {
        let outgoing = match self.context.scope_mut() {
            Some(scope) => scope.drain_outgoing(),
            None => return,
        };

        for effect in outgoing {
            match effect {
                Outgoing::Change(change) => {
                    self.broadcast_packet(Packet::StateChanged { change }).await
                }
                Outgoing::Broadcast(rpc) => self.broadcast_packet(Packet::Rpc { rpc }).await,
                Outgoing::To { player, rpc } => {
                    let addr = {
                        let clients = self.clients.read().await;
                        clients.addr_of(player)
                    };
                    match addr {
                        Some(addr) => self.send_packet(Packet::Rpc { rpc }, addr),
                        None => debug!("Dropping {:?} for departed player {}", rpc, player),
                    }
                }
                Outgoing::Request(request) => {
                    if let Err(e) = self.brain_tx.send(request) {
                        error!("Game brain worker unavailable: {}", e);
                    }
                }
            }
        }
    }

    /// Host-stop: scenes are unloaded everywhere, clients are told the
    /// session is over and the connected scope is torn down.
    async fn shutdown(&mut self) {
        info!("Server shutting down");
        let recipients = {
            let clients = self.clients.read().await;
            clients.get_client_addrs()
        };

        let mut packets = Vec::new();
        let released = self.scenes.host_stop(|packet| packets.push(packet)).await;
        debug!("Released {} unused scene resources", released);
        packets.push(Packet::Disconnected {
            reason: "Host stopped".to_string(),
        });

        // Sent directly so nothing is lost when the runtime winds down.
        for packet in &packets {
            for (client_id, addr) in &recipients {
                if let Err(e) = Self::send_packet_impl(&self.socket, packet, *addr).await {
                    warn!("Failed to notify client {}: {}", client_id, e);
                }
            }
        }

        self.context.stop();
        self.brain_handle.abort();
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> NetResult<()> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        self.context.start();
        self.spawn_host_start();

        let mut tick_interval = interval(self.tick_duration);
        let mut brain_open = true;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            warn!("Client {} timed out", client_id);
                            self.player_left(client_id);
                        },
                        Some(ServerMessage::ReadyToSpawn { client_id }) => {
                            self.spawn_player(client_id).await;
                        },
                        Some(ServerMessage::Shutdown) | None => break,
                    }
                },

                response = self.brain_rx.recv(), if brain_open => {
                    match response {
                        Some(response) => {
                            if let Some(scope) = self.context.scope_mut() {
                                scope.on_brain_response(response, Instant::now());
                            }
                        }
                        None => {
                            error!("Game brain worker stopped");
                            brain_open = false;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.process_commands().await;
                    if let Some(scope) = self.context.scope_mut() {
                        scope.update(Instant::now());
                    }
                    self.flush_outgoing().await;

                    self.tick += 1;
                    if self.tick % 300 == 0 {
                        let client_count = self.clients.read().await.len();
                        debug!("Tick {}: {} clients", self.tick, client_count);
                    }
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }
}
