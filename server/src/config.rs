use crate::error::ConfigError;
use crate::game_brain::Scenario;
use crate::scene_lifecycle::SceneConfig;
use shared::DEFAULT_RESET_DELAY;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the host needs to start, independent of where it came from.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_rate: u32,
    pub max_clients: usize,
    pub poll_interval: Duration,
    pub reset_delay: Duration,
    pub brain_latency: Duration,
    pub online_scene: String,
    pub additive_scenes: Vec<String>,
    pub scenario_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_rate: 30,
            max_clients: 8,
            poll_interval: Duration::from_secs(1),
            reset_delay: DEFAULT_RESET_DELAY,
            brain_latency: Duration::ZERO,
            online_scene: "Ship".to_string(),
            additive_scenes: vec![
                "Bridge".to_string(),
                "EngineRoom".to_string(),
                "SensorBay".to_string(),
            ],
            scenario_path: None,
        }
    }
}

impl ServerConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick rate must be positive".into()));
        }
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid("max clients must be positive".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll interval must be positive".into()));
        }
        if self.online_scene.is_empty() {
            return Err(ConfigError::Invalid("online scene must be named".into()));
        }
        Ok(())
    }

    pub fn scene_config(&self) -> SceneConfig {
        SceneConfig {
            online_scene: self.online_scene.clone(),
            additive_scenes: self.additive_scenes.clone(),
            frame: self.tick_duration(),
            online_timeout: Duration::from_secs(10),
        }
    }

    /// Every scene the local loader knows about.
    pub fn scene_catalogue(&self) -> Vec<String> {
        std::iter::once(self.online_scene.clone())
            .chain(self.additive_scenes.iter().cloned())
            .collect()
    }

    /// Loads the scenario file, or the built-in one when none is set.
    pub fn load_scenario(&self) -> Result<Scenario, ConfigError> {
        match &self.scenario_path {
            Some(path) => Scenario::load(path),
            None => Ok(Scenario::demo()),
        }
    }
}
