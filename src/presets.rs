use serde::{Deserialize, Serialize};

use crate::color::Hsl;
use crate::config::{
    BlendMode, BoundsPolicy, EngineConfig, GlowPass, HuePolicy, Motion, Spread,
};
use crate::noise::NoiseScale;

/// Available background variants
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preset {
    /// Thin noise-steered strokes on a warm off-white backdrop
    FlowLine,
    /// Large drifting orange/blue discs on a deep blue-black backdrop
    GlowDotAccent,
    /// The glow-dot motion with desaturated, continuously varying hues
    GlowDotNeutral,
}

impl Default for Preset {
    fn default() -> Self {
        Self::GlowDotAccent
    }
}

impl Preset {
    pub fn all() -> Vec<Preset> {
        vec![Self::FlowLine, Self::GlowDotAccent, Self::GlowDotNeutral]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FlowLine => "Flow Line",
            Self::GlowDotAccent => "Glow Dot (Accent)",
            Self::GlowDotNeutral => "Glow Dot (Neutral)",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FlowLine => "Short strokes following a simplex flow field, softened by multiply glow",
            Self::GlowDotAccent => "Slow orange and blue discs under a heavy blur, ~30 fps",
            Self::GlowDotNeutral => "Slow smoky grey discs under a heavy blur, ~30 fps",
        }
    }

    /// Case- and punctuation-insensitive lookup used by the command line.
    pub fn from_name(name: &str) -> Option<Preset> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "flowline" | "flow" | "light" => Some(Self::FlowLine),
            "glowdotaccent" | "glowdot" | "accent" | "dark" => Some(Self::GlowDotAccent),
            "glowdotneutral" | "neutral" => Some(Self::GlowDotNeutral),
            _ => None,
        }
    }

    pub fn config(&self) -> EngineConfig {
        match self {
            Self::FlowLine => preset_flow_line(),
            Self::GlowDotAccent => preset_glow_dot_accent(),
            Self::GlowDotNeutral => preset_glow_dot_neutral(),
        }
    }
}

fn preset_flow_line() -> EngineConfig {
    EngineConfig {
        count: 700,
        ttl: Spread::new(50.0, 150.0),
        speed: Spread::new(0.1, 2.0),
        radius: Spread::new(1.0, 4.0),
        motion: Motion::FlowLine {
            band_height: 100.0,
            hue: Spread::new(20.0, 220.0),
            noise_steps: 8.0,
            velocity_blend: 0.5,
        },
        noise: NoiseScale {
            x: 0.00125,
            y: 0.00125,
            t: 0.0005,
        },
        hue_policy: HuePolicy::Band {
            cool_start: 120.0,
            cool_end: 300.0,
            warm: Hsl::new(20.0, 90.0, 55.0),
            cool: Hsl::new(220.0, 70.0, 40.0),
        },
        opacity: 1.0,
        bounds: BoundsPolicy::Exact,
        background: Hsl::new(30.0, 20.0, 97.0),
        passes: vec![
            GlowPass::new(8.0, BlendMode::Multiply),
            GlowPass::new(4.0, BlendMode::Multiply),
            GlowPass::new(0.0, BlendMode::Normal),
        ],
        frame_interval_ms: None,
    }
}

fn preset_glow_dot_accent() -> EngineConfig {
    EngineConfig {
        count: 150,
        ttl: Spread::new(150.0, 200.0),
        speed: Spread::new(0.05, 0.5),
        radius: Spread::new(100.0, 200.0),
        motion: Motion::GlowDot {
            hue_start: 20.0,
            hue_step: 0.5,
            hue_spread: 40.0,
        },
        noise: NoiseScale::uniform(0.0015),
        hue_policy: HuePolicy::Band {
            cool_start: 180.0,
            cool_end: 360.0,
            warm: Hsl::new(20.0, 100.0, 35.0),
            cool: Hsl::new(220.0, 60.0, 25.0),
        },
        opacity: 0.6,
        bounds: BoundsPolicy::ExpandByRadius,
        background: Hsl::new(220.0, 60.0, 8.0),
        passes: vec![GlowPass::new(50.0, BlendMode::Normal)],
        frame_interval_ms: Some(33.0),
    }
}

fn preset_glow_dot_neutral() -> EngineConfig {
    EngineConfig {
        hue_policy: HuePolicy::Continuous {
            saturation: 8.0,
            lightness: 30.0,
        },
        background: Hsl::new(30.0, 20.0, 97.0),
        ..preset_glow_dot_accent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_only_in_configuration() {
        let accent = Preset::GlowDotAccent.config();
        let neutral = Preset::GlowDotNeutral.config();
        assert_eq!(accent.motion, neutral.motion);
        assert_eq!(accent.count, neutral.count);
        assert_ne!(accent.hue_policy, neutral.hue_policy);
    }

    #[test]
    fn only_glow_dot_is_gated() {
        assert!(Preset::FlowLine.config().frame_interval_ms.is_none());
        assert_eq!(Preset::GlowDotAccent.config().frame_interval_ms, Some(33.0));
        assert_eq!(Preset::GlowDotNeutral.config().frame_interval_ms, Some(33.0));
    }

    #[test]
    fn bounds_policies_stay_distinct() {
        assert_eq!(Preset::FlowLine.config().bounds, BoundsPolicy::Exact);
        assert_eq!(
            Preset::GlowDotAccent.config().bounds,
            BoundsPolicy::ExpandByRadius
        );
    }

    #[test]
    fn names_resolve_back_to_presets() {
        for preset in Preset::all() {
            assert_eq!(Preset::from_name(preset.name()), Some(preset));
        }
        assert_eq!(Preset::from_name("flow-line"), Some(Preset::FlowLine));
        assert_eq!(Preset::from_name("sparkles"), None);
    }
}
