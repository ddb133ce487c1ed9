//! Color helpers for the particle field
//! HSL values as the presets describe them, premultiplied RGBA as the surfaces store them

use serde::{Deserialize, Serialize};

/// Hue in degrees, saturation and lightness in percent (CSS convention).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub hue: f32,
    pub saturation: f32,
    pub lightness: f32,
}

impl Hsl {
    pub const fn new(hue: f32, saturation: f32, lightness: f32) -> Self {
        Self {
            hue,
            saturation,
            lightness,
        }
    }

    pub fn with_alpha(self, alpha: f32) -> Hsla {
        Hsla { hsl: self, alpha }
    }

    /// Straight (non-premultiplied) RGB in 0..1.
    pub fn to_rgb(self) -> [f32; 3] {
        let h = self.hue.rem_euclid(360.0) / 30.0;
        let s = (self.saturation / 100.0).clamp(0.0, 1.0);
        let l = (self.lightness / 100.0).clamp(0.0, 1.0);
        let a = s * l.min(1.0 - l);

        // CSS Color 4 `hslToRgb`: no sector boundaries to round across.
        let channel = |n: f32| {
            let k = (n + h).rem_euclid(12.0);
            l - a * (k - 3.0).min(9.0 - k).clamp(-1.0, 1.0)
        };
        [channel(0.0), channel(8.0), channel(4.0)]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsla {
    pub hsl: Hsl,
    pub alpha: f32,
}

impl Hsla {
    pub fn to_premultiplied(self) -> Rgba {
        let a = self.alpha.clamp(0.0, 1.0);
        let [r, g, b] = self.hsl.to_rgb();
        Rgba([r * a, g * a, b * a, a])
    }
}

/// Premultiplied linear-ish RGBA in 0..1, the pixel format of every surface.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgba(pub [f32; 4]);

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba([0.0; 4]);

    pub fn opaque(hsl: Hsl) -> Self {
        hsl.with_alpha(1.0).to_premultiplied()
    }

    pub fn alpha(&self) -> f32 {
        self.0[3]
    }

    /// Source-over with `coverage` scaling the source.
    #[inline]
    pub fn over(self, dst: &mut [f32; 4], coverage: f32) {
        let k = 1.0 - self.0[3] * coverage;
        for c in 0..4 {
            dst[c] = self.0[c] * coverage + dst[c] * k;
        }
    }

    /// 8-bit straight RGBA, the layout handed to `image` and egui.
    pub fn to_rgba8(px: &[f32; 4]) -> [u8; 4] {
        let a = px[3].clamp(0.0, 1.0);
        if a <= 0.0 {
            return [0, 0, 0, 0];
        }
        let q = |v: f32| ((v / a).clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        [q(px[0]), q(px[1]), q(px[2]), (a * 255.0 + 0.5) as u8]
    }
}
