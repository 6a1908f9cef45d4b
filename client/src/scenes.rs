use log::{info, warn};

/// Additive scenes this terminal has been told to load, in load order.
#[derive(Debug, Default, Clone)]
pub struct SceneSet {
    loaded: Vec<String>,
}

impl SceneSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, scene: &str) -> bool {
        if self.is_loaded(scene) {
            warn!("Scene {} is already loaded", scene);
            return false;
        }
        info!("Loading scene {}", scene);
        self.loaded.push(scene.to_string());
        true
    }

    pub fn unload(&mut self, scene: &str) -> bool {
        match self.loaded.iter().position(|s| s == scene) {
            Some(index) => {
                info!("Unloading scene {}", scene);
                self.loaded.remove(index);
                true
            }
            None => {
                warn!("Scene {} is not loaded", scene);
                false
            }
        }
    }

    pub fn is_loaded(&self, scene: &str) -> bool {
        self.loaded.iter().any(|s| s == scene)
    }

    pub fn scenes(&self) -> &[String] {
        &self.loaded
    }

    pub fn clear(&mut self) {
        self.loaded.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_and_unload() {
        let mut scenes = SceneSet::new();
        assert!(scenes.load("Bridge"));
        assert!(scenes.load("EngineRoom"));
        assert!(!scenes.load("Bridge"));
        assert_eq!(scenes.scenes(), &["Bridge", "EngineRoom"]);

        assert!(scenes.unload("Bridge"));
        assert!(!scenes.unload("Bridge"));
        assert!(!scenes.is_loaded("Bridge"));
        assert!(scenes.is_loaded("EngineRoom"));
    }
}
