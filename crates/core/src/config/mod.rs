use serde::{Deserialize, Serialize};

use crate::blend::BlendConfig;

/// Top-level configuration for the lip-sync engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub blend: BlendConfig,
    pub frame: FrameConfig,
}

/// Frame pacing for hosts that let the engine own the render loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Target frames per second of the demo loop.
    pub fps: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self { fps: 60 }
    }
}
