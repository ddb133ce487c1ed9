//! Glowfield
//! Procedural particle-field backgrounds: flow lines and glowing dots
//! simulated on the CPU and composited into a soft, blurred image.

pub mod color;
pub mod compositor;
pub mod config;
pub mod engine;
pub mod noise;
pub mod offscreen_render;
pub mod particles;
pub mod postprocess;
pub mod presets;
pub mod scheduler;
pub mod surface;

pub use config::{AppConfig, EngineConfig};
pub use engine::{Container, Engine, EngineStats, Viewport};
pub use presets::Preset;
