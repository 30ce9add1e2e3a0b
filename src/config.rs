use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Change the host applies right before rendering `frame`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameEvent {
    Resize { frame: u32, width: u32, height: u32 },
    Orbit { frame: u32, yaw: f32, pitch: f32 },
    Zoom { frame: u32, delta: f32 },
}

impl FrameEvent {
    pub fn frame(&self) -> u32 {
        match self {
            FrameEvent::Resize { frame, .. }
            | FrameEvent::Orbit { frame, .. }
            | FrameEvent::Zoom { frame, .. } => *frame,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub seed: u64,
    pub sphere_count: u32,
    pub min_radius: f32,
    pub max_radius: f32,
    pub placement_radius: f32,
}

impl Default for SceneConfig {
    fn default() -> SceneConfig {
        SceneConfig {
            seed: 0,
            sphere_count: 40,
            min_radius: 0.3,
            max_radius: 1.2,
            placement_radius: 12.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub distance: f32,
    // degrees
    pub yaw: f32,
    // degrees
    pub pitch: f32,
    // degrees
    pub fovy: f32,
}

impl Default for CameraConfig {
    fn default() -> CameraConfig {
        CameraConfig {
            distance: 18.0,
            yaw: 90.0,
            pitch: -20.0,
            fovy: 60.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    // number of render_frame calls
    pub frames: u32,
    // seeds the pixel jitter
    pub seed: u64,
    pub num_bounces: u32,
    pub worker_threads: usize,
    // equirectangular image; procedural sky when absent
    pub environment: Option<PathBuf>,
    pub environment_intensity: f32,
    pub exposure: f32,
    pub output: PathBuf,
    pub scene: SceneConfig,
    pub camera: CameraConfig,
    pub events: Vec<FrameEvent>,
}

impl Default for RenderConfig {
    fn default() -> RenderConfig {
        RenderConfig {
            width: 800,
            height: 600,
            frames: 64,
            seed: 0,
            num_bounces: 8,
            worker_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            environment: None,
            environment_intensity: 1.0,
            exposure: 1.0,
            output: PathBuf::from("render.png"),
            scene: SceneConfig::default(),
            camera: CameraConfig::default(),
            events: vec![],
        }
    }
}

impl RenderConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<RenderConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: RenderConfig = serde_json::from_str(&text)?;
        info!("loaded config {}", path.display());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidDimension {
                width: self.width,
                height: self.height,
            });
        }
        if self.scene.min_radius <= 0.0 || self.scene.min_radius > self.scene.max_radius {
            return Err(Error::InvalidConfig(format!(
                "invalid sphere radius range {}..{}",
                self.scene.min_radius, self.scene.max_radius
            )));
        }
        Ok(())
    }

    /// Events scheduled before `frame`, in config order.
    pub fn events_at(&self, frame: u32) -> impl Iterator<Item = &FrameEvent> {
        self.events.iter().filter(move |e| e.frame() == frame)
    }
}
