//! Additive scene loading around host start, player join and host stop.
//!
//! The ship is split into an "online" scene, active as soon as the host is
//! up, and a set of additive scenes (bridge, engine room, ...) that hold the
//! workstations. A connection is never spawned before its client has been
//! told to load every additive scene.

use crate::error::SceneError;
use log::{debug, info, warn};
use shared::Packet;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{sleep, Instant};

/// Engine-side scene management, as seen from the host.
pub trait SceneLoader: Send + Sync + 'static {
    fn active_scene(&self) -> impl Future<Output = Option<String>> + Send;

    fn load_additive(&self, scene: &str) -> impl Future<Output = Result<(), SceneError>> + Send;

    fn unload(&self, scene: &str) -> impl Future<Output = Result<(), SceneError>> + Send;

    /// Frees assets no loaded scene references any more.
    fn release_unused(&self) -> impl Future<Output = usize> + Send;
}

/// In-process scene loader with a fixed catalogue and a simulated load time.
pub struct LocalSceneLoader {
    catalogue: HashSet<String>,
    load_time: Duration,
    active: RwLock<Option<String>>,
    loaded: RwLock<Vec<String>>,
    unused: RwLock<Vec<String>>,
}

impl LocalSceneLoader {
    pub fn new<I, S>(catalogue: I, load_time: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            catalogue: catalogue.into_iter().map(Into::into).collect(),
            load_time,
            active: RwLock::new(None),
            loaded: RwLock::new(Vec::new()),
            unused: RwLock::new(Vec::new()),
        }
    }

    /// Switches the single active scene.
    pub async fn activate(&self, scene: &str) -> Result<(), SceneError> {
        if !self.catalogue.contains(scene) {
            return Err(SceneError::UnknownScene(scene.to_string()));
        }
        info!("Active scene: {}", scene);
        *self.active.write().await = Some(scene.to_string());
        Ok(())
    }

    pub async fn loaded_scenes(&self) -> Vec<String> {
        self.loaded.read().await.clone()
    }
}

impl SceneLoader for LocalSceneLoader {
    async fn active_scene(&self) -> Option<String> {
        self.active.read().await.clone()
    }

    async fn load_additive(&self, scene: &str) -> Result<(), SceneError> {
        if !self.catalogue.contains(scene) {
            return Err(SceneError::UnknownScene(scene.to_string()));
        }
        if self.loaded.read().await.iter().any(|s| s == scene) {
            debug!("Scene {} already loaded", scene);
            return Ok(());
        }

        if !self.load_time.is_zero() {
            sleep(self.load_time).await;
        }
        self.unused.write().await.retain(|s| s != scene);
        self.loaded.write().await.push(scene.to_string());
        debug!("Loaded scene {}", scene);
        Ok(())
    }

    async fn unload(&self, scene: &str) -> Result<(), SceneError> {
        let mut loaded = self.loaded.write().await;
        let Some(position) = loaded.iter().position(|s| s == scene) else {
            return Err(SceneError::NotLoaded(scene.to_string()));
        };
        loaded.remove(position);
        self.unused.write().await.push(scene.to_string());
        debug!("Unloaded scene {}", scene);
        Ok(())
    }

    async fn release_unused(&self) -> usize {
        let mut unused = self.unused.write().await;
        let released = unused.len();
        unused.clear();
        released
    }
}

/// Which scenes make up the ship and how long to wait for them.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    pub online_scene: String,
    pub additive_scenes: Vec<String>,
    /// One scheduler frame.
    pub frame: Duration,
    /// Give up waiting for the online scene after this long.
    pub online_timeout: Duration,
}

/// Coordinates scene loading on the host. Cheap to clone; clones share the
/// "additional scenes loaded" flag.
pub struct SceneLifecycle<L: SceneLoader> {
    loader: Arc<L>,
    config: Arc<SceneConfig>,
    loaded_tx: Arc<watch::Sender<bool>>,
    loaded_scenes: Arc<RwLock<Vec<String>>>,
}

impl<L: SceneLoader> Clone for SceneLifecycle<L> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            config: Arc::clone(&self.config),
            loaded_tx: Arc::clone(&self.loaded_tx),
            loaded_scenes: Arc::clone(&self.loaded_scenes),
        }
    }
}

impl<L: SceneLoader> SceneLifecycle<L> {
    pub fn new(loader: Arc<L>, config: SceneConfig) -> Self {
        let (loaded_tx, _) = watch::channel(false);
        Self {
            loader,
            config: Arc::new(config),
            loaded_tx: Arc::new(loaded_tx),
            loaded_scenes: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn loader(&self) -> &Arc<L> {
        &self.loader
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn additional_scenes_loaded(&self) -> bool {
        *self.loaded_tx.borrow()
    }

    async fn wait_for_online_scene(&self) -> Result<(), SceneError> {
        let deadline = Instant::now() + self.config.online_timeout;
        loop {
            if self.loader.active_scene().await.as_deref() == Some(&self.config.online_scene) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SceneError::OnlineSceneInactive(
                    self.config.online_scene.clone(),
                ));
            }
            sleep(self.config.frame).await;
        }
    }

    /// Waits for the online scene, then loads each additive scene one after
    /// another, then raises the "additional scenes loaded" flag.
    pub async fn run_host_start(&self) -> Result<(), SceneError> {
        self.wait_for_online_scene().await?;

        for scene in &self.config.additive_scenes {
            info!("Loading additive scene {}", scene);
            self.loader.load_additive(scene).await?;
            self.loaded_scenes.write().await.push(scene.clone());
        }

        info!(
            "Additional scenes loaded ({})",
            self.config.additive_scenes.len()
        );
        self.loaded_tx.send_replace(true);
        Ok(())
    }

    /// Resolves once the host-start sequence has finished.
    pub async fn wait_until_loaded(&self) {
        let mut loaded = self.loaded_tx.subscribe();
        loop {
            if *loaded.borrow_and_update() {
                return;
            }
            if loaded.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sends every additive scene to a joining connection through `send`,
    /// then waits one frame. The caller spawns the player afterwards.
    pub async fn join_sequence<F>(&self, mut send: F)
    where
        F: FnMut(Packet) + Send,
    {
        self.wait_until_loaded().await;

        let scenes = self.loaded_scenes.read().await.clone();
        for scene in scenes {
            send(Packet::LoadScene { scene });
        }
        sleep(self.config.frame).await;
    }

    /// Tells every observer to unload the additive scenes, unloads them
    /// locally and frees what they used. Returns the number of released
    /// resources.
    pub async fn host_stop<F>(&self, mut broadcast: F) -> usize
    where
        F: FnMut(Packet) + Send,
    {
        let scenes = std::mem::take(&mut *self.loaded_scenes.write().await);
        info!("Unloading {} additive scenes", scenes.len());

        for scene in &scenes {
            broadcast(Packet::UnloadScene {
                scene: scene.clone(),
            });
        }
        for scene in &scenes {
            if let Err(e) = self.loader.unload(scene).await {
                warn!("Failed to unload {}: {}", scene, e);
            }
        }

        self.loaded_tx.send_replace(false);
        self.loader.release_unused().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SceneConfig {
        SceneConfig {
            online_scene: "Ship".into(),
            additive_scenes: vec!["Bridge".into(), "EngineRoom".into()],
            frame: Duration::from_millis(1),
            online_timeout: Duration::from_millis(200),
        }
    }

    fn loader() -> Arc<LocalSceneLoader> {
        Arc::new(LocalSceneLoader::new(
            ["Ship", "Bridge", "EngineRoom"],
            Duration::ZERO,
        ))
    }

    #[tokio::test]
    async fn test_host_start_loads_in_order() {
        let loader = loader();
        loader.activate("Ship").await.unwrap();
        let lifecycle = SceneLifecycle::new(Arc::clone(&loader), config());

        assert!(!lifecycle.additional_scenes_loaded());
        lifecycle.run_host_start().await.unwrap();

        assert!(lifecycle.additional_scenes_loaded());
        assert_eq!(loader.loaded_scenes().await, vec!["Bridge", "EngineRoom"]);
    }

    #[tokio::test]
    async fn test_host_start_waits_for_online_scene() {
        let loader = loader();
        let lifecycle = SceneLifecycle::new(Arc::clone(&loader), config());

        let starter = lifecycle.clone();
        let start = tokio::spawn(async move { starter.run_host_start().await });

        sleep(Duration::from_millis(10)).await;
        assert!(!lifecycle.additional_scenes_loaded());

        loader.activate("Ship").await.unwrap();
        start.await.unwrap().unwrap();
        assert!(lifecycle.additional_scenes_loaded());
    }

    #[tokio::test]
    async fn test_host_start_gives_up_without_online_scene() {
        let lifecycle = SceneLifecycle::new(loader(), config());
        assert_eq!(
            lifecycle.run_host_start().await,
            Err(SceneError::OnlineSceneInactive("Ship".into()))
        );
        assert!(!lifecycle.additional_scenes_loaded());
    }

    #[tokio::test]
    async fn test_unknown_additive_scene_fails() {
        let loader = loader();
        loader.activate("Ship").await.unwrap();
        let mut config = config();
        config.additive_scenes.push("Cargo".into());
        let lifecycle = SceneLifecycle::new(loader, config);

        assert_eq!(
            lifecycle.run_host_start().await,
            Err(SceneError::UnknownScene("Cargo".into()))
        );
    }

    #[tokio::test]
    async fn test_join_sequence_blocks_until_loaded() {
        let loader = loader();
        loader.activate("Ship").await.unwrap();
        let lifecycle = SceneLifecycle::new(loader, config());

        let joiner = lifecycle.clone();
        let join = tokio::spawn(async move {
            let mut sent = Vec::new();
            joiner.join_sequence(|packet| sent.push(packet)).await;
            sent
        });

        sleep(Duration::from_millis(5)).await;
        assert!(!join.is_finished());

        lifecycle.run_host_start().await.unwrap();
        let sent = join.await.unwrap();
        assert_eq!(
            sent,
            vec![
                Packet::LoadScene {
                    scene: "Bridge".into()
                },
                Packet::LoadScene {
                    scene: "EngineRoom".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_host_stop_unloads_and_releases() {
        let loader = loader();
        loader.activate("Ship").await.unwrap();
        let lifecycle = SceneLifecycle::new(Arc::clone(&loader), config());
        lifecycle.run_host_start().await.unwrap();

        let mut broadcast = Vec::new();
        let released = lifecycle.host_stop(|p| broadcast.push(p)).await;

        assert_eq!(released, 2);
        assert_eq!(broadcast.len(), 2);
        assert!(matches!(&broadcast[0], Packet::UnloadScene { scene } if scene == "Bridge"));
        assert!(loader.loaded_scenes().await.is_empty());
        assert!(!lifecycle.additional_scenes_loaded());

        // Nothing left to stop.
        assert_eq!(lifecycle.host_stop(|_| {}).await, 0);
    }
}
