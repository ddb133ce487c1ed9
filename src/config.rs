//! Configuration System for Glowfield
//! Engine coefficients per preset plus the host application's settings file

use anyhow::Context;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::color::Hsl;
use crate::noise::NoiseScale;
use crate::presets::Preset;

// ============================================================================
// Enums
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum BlendMode {
    /// Plain source-over.
    Normal,
    /// Source-over where the source tints the backdrop: `src * dst + (1 - a_src) * dst`.
    Multiply,
}

/// Where a particle stops being "inside" the viewport.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub enum BoundsPolicy {
    /// Recycle as soon as the position crosses a viewport edge.
    Exact,
    /// Edges pushed outward by the particle's own radius so a disc fully exits first.
    ExpandByRadius,
}

// ============================================================================
// Randomized ranges
// ============================================================================

/// `base + U[0, 1) * range`.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize, Debug)]
pub struct Spread {
    pub base: f32,
    pub range: f32,
}

impl Spread {
    pub const fn new(base: f32, range: f32) -> Self {
        Self { base, range }
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> f32 {
        self.base + rng.gen::<f32>() * self.range
    }

    /// Half-open membership, or equality for a zero-width range.
    pub fn contains(&self, v: f32) -> bool {
        if self.range == 0.0 {
            v == self.base
        } else {
            v >= self.base && v < self.base + self.range
        }
    }
}

// ============================================================================
// Hue resolution
// ============================================================================

/// Maps a particle's stored hue to the color it is drawn with.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize, Debug)]
pub enum HuePolicy {
    /// Wrapped hue inside `[cool_start, cool_end]` resolves to `cool`, anything else to `warm`.
    Band {
        cool_start: f32,
        cool_end: f32,
        warm: Hsl,
        cool: Hsl,
    },
    /// Hue used as-is with a fixed saturation and lightness.
    Continuous { saturation: f32, lightness: f32 },
}

impl HuePolicy {
    pub fn resolve(&self, stored_hue: f32) -> Hsl {
        match *self {
            HuePolicy::Band {
                cool_start,
                cool_end,
                warm,
                cool,
            } => {
                let h = stored_hue.rem_euclid(360.0);
                if h >= cool_start && h <= cool_end {
                    cool
                } else {
                    warm
                }
            }
            HuePolicy::Continuous {
                saturation,
                lightness,
            } => Hsl::new(stored_hue, saturation, lightness),
        }
    }
}

// ============================================================================
// Motion rules
// ============================================================================

#[derive(Clone, Copy, PartialEq, Serialize, Deserialize, Debug)]
pub enum Motion {
    /// Stroked segments steered every frame by the flow field.
    FlowLine {
        /// Vertical extent of the spawn band centred on the viewport.
        band_height: f32,
        /// Spawn hue range.
        hue: Spread,
        /// Noise value is multiplied by `noise_steps * TAU` to get a heading.
        noise_steps: f32,
        /// Weight of the new heading when blending with the previous velocity.
        velocity_blend: f32,
    },
    /// Discs with a heading fixed at spawn and a slowly drifting base hue.
    GlowDot {
        hue_start: f32,
        hue_step: f32,
        /// Noise sample at spawn is scaled by this and added to the base hue.
        hue_spread: f32,
    },
}

// ============================================================================
// Post-processing
// ============================================================================

/// One softening pass: blur the draw surface and blend it onto the composite.
#[derive(Clone, Copy, PartialEq, Serialize, Deserialize, Debug)]
pub struct GlowPass {
    /// Gaussian standard deviation in pixels; 0 copies the crisp image.
    pub blur: f32,
    pub blend: BlendMode,
}

impl GlowPass {
    pub const fn new(blur: f32, blend: BlendMode) -> Self {
        Self { blur, blend }
    }
}

// ============================================================================
// Engine configuration
// ============================================================================

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct EngineConfig {
    pub count: usize,
    pub ttl: Spread,
    pub speed: Spread,
    pub radius: Spread,
    pub motion: Motion,
    pub noise: NoiseScale,
    pub hue_policy: HuePolicy,
    /// Extra opacity multiplier on top of the fade envelope.
    pub opacity: f32,
    pub bounds: BoundsPolicy,
    pub background: Hsl,
    pub passes: Vec<GlowPass>,
    /// Minimum time between accepted ticks, in milliseconds. `None` runs every refresh.
    pub frame_interval_ms: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Preset::default().config()
    }
}

// ============================================================================
// Application configuration
// ============================================================================

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    pub width: u32,
    pub height: u32,
    pub frames: usize,
    /// Host clock step between rendered frames; the frame-rate gate sees this.
    pub frame_time_ms: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frames: 120,
            frame_time_ms: 1000.0 / 60.0,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub preset: Preset,
    /// Fixed noise/particle seed; a fresh one per mount when absent.
    pub seed: Option<u64>,
    pub window_width: f32,
    pub window_height: f32,
    pub export: ExportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            seed: None,
            window_width: 1400.0,
            window_height: 800.0,
            export: ExportConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing config to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let config = serde_json::from_str(&json)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow_policy() -> HuePolicy {
        Preset::FlowLine.config().hue_policy
    }

    fn accent_policy() -> HuePolicy {
        Preset::GlowDotAccent.config().hue_policy
    }

    #[test]
    fn flow_line_band_edges() {
        let policy = flow_policy();
        let warm = Hsl::new(20.0, 90.0, 55.0);
        let cool = Hsl::new(220.0, 70.0, 40.0);

        assert_eq!(policy.resolve(119.99), warm);
        assert_eq!(policy.resolve(120.0), cool);
        assert_eq!(policy.resolve(120.01), cool);
        assert_eq!(policy.resolve(299.99), cool);
        assert_eq!(policy.resolve(300.0), cool);
        assert_eq!(policy.resolve(300.01), warm);
        assert_eq!(policy.resolve(0.0), warm);
    }

    #[test]
    fn accent_split_threshold() {
        let policy = accent_policy();
        let warm = Hsl::new(20.0, 100.0, 35.0);
        let cool = Hsl::new(220.0, 60.0, 25.0);

        assert_eq!(policy.resolve(179.99), warm);
        assert_eq!(policy.resolve(180.0), cool);
        assert_eq!(policy.resolve(359.99), cool);
        assert_eq!(policy.resolve(360.0), warm);
    }

    #[test]
    fn band_policy_wraps_stored_hue() {
        let policy = accent_policy();
        assert_eq!(policy.resolve(-10.0), policy.resolve(350.0));
        assert_eq!(policy.resolve(740.0), policy.resolve(20.0));
        assert_eq!(policy.resolve(-200.0), policy.resolve(160.0));
    }

    #[test]
    fn continuous_policy_passes_hue_through() {
        let policy = HuePolicy::Continuous {
            saturation: 8.0,
            lightness: 30.0,
        };
        assert_eq!(policy.resolve(47.5), Hsl::new(47.5, 8.0, 30.0));
        assert_eq!(policy.resolve(400.0), Hsl::new(400.0, 8.0, 30.0));
    }

    #[test]
    fn spread_membership_is_half_open() {
        let s = Spread::new(50.0, 150.0);
        assert!(s.contains(50.0));
        assert!(s.contains(199.9));
        assert!(!s.contains(200.0));
        assert!(!s.contains(49.9));
        assert!(Spread::new(3.0, 0.0).contains(3.0));
    }

    #[test]
    fn app_config_survives_save_and_load() {
        let dir = std::env::temp_dir().join(format!("glowfield-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let config = AppConfig {
            preset: Preset::GlowDotNeutral,
            seed: Some(99),
            ..AppConfig::default()
        };
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{ "preset": "FlowLine" }"#).unwrap();
        assert_eq!(config.preset, Preset::FlowLine);
        assert_eq!(config.export, ExportConfig::default());
        assert!(config.seed.is_none());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = AppConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(format!("{err:#}").contains("reading config"));
    }
}
