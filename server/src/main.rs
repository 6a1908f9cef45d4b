use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::game_brain::LocalGameBrain;
use server::network::{Server, ServerMessage};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Frames per second of the host loop
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum number of connected crew members
    #[arg(short, long, default_value = "8")]
    max_clients: usize,

    /// How often the game-state service is polled, in milliseconds
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// Delay between arriving at a new location and the ship reset
    #[arg(long, default_value = "3000")]
    reset_delay_ms: u64,

    /// Simulated response time of the game-state service
    #[arg(long, default_value = "0")]
    brain_latency_ms: u64,

    /// Scene that must be active before additive scenes load
    #[arg(long, default_value = "Ship")]
    online_scene: String,

    /// Additive scene to load at host start (repeatable)
    #[arg(long = "scene")]
    scenes: Vec<String>,

    /// JSON scenario for the local game-state service
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            tick_rate: self.tick_rate,
            max_clients: self.max_clients,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            reset_delay: Duration::from_millis(self.reset_delay_ms),
            brain_latency: Duration::from_millis(self.brain_latency_ms),
            online_scene: self.online_scene,
            additive_scenes: if self.scenes.is_empty() {
                defaults.additive_scenes
            } else {
                self.scenes
            },
            scenario_path: self.scenario,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let config = args.into_config();
    info!("Starting host on {}", config.bind_addr);
    info!(
        "Scenes: {} + {:?}",
        config.online_scene, config.additive_scenes
    );

    let scenario = config.load_scenario()?;
    info!(
        "Scenario: {} locations, {} missions",
        scenario.locations.len(),
        scenario.missions.len()
    );
    let brain = LocalGameBrain::new(scenario);

    let mut server = Server::new(config, brain).await?;

    let shutdown = server.shutdown_sender();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, stopping host...");
                let _ = shutdown.send(ServerMessage::Shutdown);
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server.run().await?;

    info!("Host stopped");
    Ok(())
}
