//! Output targets fixed before a run starts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Target duration, resolution and frame rate of the composed short.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub duration: Duration,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl TargetSpec {
    pub fn new(duration: Duration, width: u32, height: u32, fps: u32) -> Self {
        Self {
            duration,
            width,
            height,
            fps,
        }
    }

    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Length of one output frame.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }

    /// Fraction of a `width`x`height` source kept by a center crop to the
    /// target aspect ratio (1.0 when the ratios already match).
    pub fn crop_keep_ratio(&self, width: u32, height: u32) -> f64 {
        if width == 0 || height == 0 {
            return 0.0;
        }
        let source = width as f64 / height as f64;
        let target = self.aspect_ratio();
        (source / target).min(target / source)
    }
}

impl Default for TargetSpec {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(15),
            width: 1080,
            height: 1920,
            fps: 30,
        }
    }
}
