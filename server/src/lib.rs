//! # Ship Host Library
//!
//! This library provides the authoritative host for the cooperative starship
//! game. One host owns the ship; every crew member's terminal is an observer
//! that sends commands and receives replicated state.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! Only the host writes replicated fields. Each write reports whether the
//! value changed, and only real transitions are sent to observers, in the
//! order they were written.
//!
//! ### External Game State
//! The mission narrative lives in an external game-state service. The host
//! polls it, merges each snapshot positionally into the unlocked locations
//! and missions, and forwards jump, scan, comm-event and unlock requests.
//! Responses may be late, fail, or never arrive; none of these leave the
//! ship in a half-updated state.
//!
//! ### Scene Lifecycle
//! Additive scenes are loaded once at host start. Joining clients are told to
//! load them before their player is spawned, and stopping the host unloads
//! them everywhere.
//!
//! ## Architecture Design
//!
//! ### Single-Task Event Loop
//! The host processes network events, service responses and frame ticks
//! sequentially in one task. Network I/O, timeouts, the service worker and
//! scene loading run in their own tasks and talk to the loop over channels.
//!
//! ### Frame-Driven Timers
//! The delayed ship reset is an explicit deadline checked every frame rather
//! than a sleeping task.
//!
//! ## Module Organization
//!
//! - `replicated`: host-writable fields and the outbox of pending effects
//! - `ship_state`: cube, thrusters, location selection, dials and launch
//! - `sensor_station`: scanning and incoming transmissions
//! - `stations`: workstation power routing and occupancy
//! - `context`: the connected scope and command dispatch
//! - `game_brain`: the external game-state service and its local stand-in
//! - `scene_lifecycle`: additive scene loading
//! - `client_manager`: connection roster and command queues
//! - `network`: UDP transport and the event loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::game_brain::{LocalGameBrain, Scenario};
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig::default();
//!     let brain = LocalGameBrain::new(Scenario::demo());
//!
//!     let mut server = Server::new(config, brain).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod context;
pub mod error;
pub mod game_brain;
pub mod network;
pub mod replicated;
pub mod scene_lifecycle;
pub mod sensor_station;
pub mod ship_state;
pub mod stations;
