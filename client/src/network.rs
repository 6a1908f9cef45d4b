use crate::console::{console_input_thread, ConsoleCmd};
use crate::terminal::Terminal;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Command, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

pub type NetResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    name: String,
    client_id: Option<u32>,
    connected: bool,
    running: bool,

    terminal: Terminal,
    sequence: u32,

    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(server_addr: &str, name: &str, fake_ping_ms: u64) -> NetResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            name: name.to_string(),
            client_id: None,
            connected: false,
            running: true,
            terminal: Terminal::new(),
            sequence: 0,
            fake_ping_ms,
        })
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    async fn connect(&mut self) -> NetResult<()> {
        info!("Connecting to server as {}...", self.name);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.name.clone(),
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> NetResult<()> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_command(&mut self, command: Command) -> NetResult<()> {
        if !self.terminal.is_spawned() {
            warn!("Not spawned yet, dropping {:?}", command);
            return Ok(());
        }

        self.sequence += 1;
        debug!("Sending command #{}: {:?}", self.sequence, command);
        let packet = Packet::Command {
            sequence: self.sequence,
            command,
        };
        self.send_packet(&packet).await
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
                self.sequence = 0;
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                self.running = false;
                self.terminal.reset();
            }

            other => self.terminal.handle_packet(other),
        }
    }

    async fn handle_console_line(&mut self, line: &str) -> NetResult<()> {
        if line.trim().is_empty() {
            return Ok(());
        }

        let cmd = match ConsoleCmd::parse(line) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("{} (try 'help')", e);
                return Ok(());
            }
        };

        if cmd == ConsoleCmd::Quit {
            self.running = false;
            return Ok(());
        }

        if let Some(command) = self.terminal.handle_console(cmd, Instant::now()) {
            self.send_command(command).await?;
        }
        Ok(())
    }

    pub async fn run(&mut self) -> NetResult<()> {
        self.connect().await?;

        let mut console = console_input_thread();
        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut frame_interval = interval(FRAME_INTERVAL);

        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        while self.running {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet),
                                Err(e) => warn!("Malformed packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                line = console.recv() => {
                    match line {
                        Some(line) => {
                            if let Err(e) = self.handle_console_line(&line).await {
                                error!("Error sending command: {}", e);
                            }
                        }
                        None => {
                            info!("Console closed");
                            self.running = false;
                        }
                    }
                },

                _ = heartbeat_interval.tick() => {
                    let result = if self.connected {
                        self.send_packet(&Packet::Heartbeat).await
                    } else {
                        self.connect().await
                    };
                    if let Err(e) = result {
                        error!("Error sending heartbeat: {}", e);
                    }
                },

                _ = frame_interval.tick() => {
                    if let Some(command) = self.terminal.update(Instant::now()) {
                        if let Err(e) = self.send_command(command).await {
                            error!("Error sending command: {}", e);
                        }
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
