//! # Workstation Terminal Library
//!
//! This library provides the client side of the cooperative starship game: a
//! headless terminal that joins a host, mirrors the ship's replicated state
//! and turns console input into commands for the host to execute.
//!
//! ## Architecture Overview
//!
//! The terminal never writes ship state. Everything it shows comes from the
//! host's snapshot and the stream of changes that follows it. Local input
//! only produces commands, with two exceptions that exist purely for feel:
//!
//! ### Optimistic Scan Lock
//! Starting a scan locks the sensor terminal immediately and keeps the
//! scanning screen up for a fixed time. The host's answer is held until that
//! time has passed and only then committed with `FinishScan`.
//!
//! ### Local Dials
//! Trajectory dials turn freely on the terminal and are committed to the
//! host when released.
//!
//! ## Module Organization
//!
//! - `mirror`: read-only copy of the ship with change listeners
//! - `sensor`: scan lock, scan timer and video acknowledgement gating
//! - `dial`: trajectory dials and the launch slider
//! - `panel`: power-gated switches, levers and buttons
//! - `scenes`: additive scenes the host asked this terminal to load
//! - `console`: console command parsing and the stdin reader
//! - `terminal`: packet and console handling without a socket
//! - `network`: UDP connection, heartbeat and the main loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut client = Client::new("127.0.0.1:8080", "navigator", 0).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod console;
pub mod dial;
pub mod mirror;
pub mod network;
pub mod panel;
pub mod scenes;
pub mod sensor;
pub mod terminal;
