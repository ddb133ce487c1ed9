//! Drawing surfaces
//!
//! Premultiplied float RGBA buffers. The draw surface receives one crisp
//! primitive per particle per frame; the composite surface accumulates the
//! softened passes and is what gets presented.

use image::{ImageBuffer, Rgba as ImageRgba};
use rayon::prelude::*;

use crate::color::Rgba;
use crate::particles::{DrawCommand, Shape};

/// Presented frame, 8-bit straight RGBA.
pub type FrameBuffer = ImageBuffer<ImageRgba<u8>, Vec<u8>>;

#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl Default for Surface {
    fn default() -> Self {
        Surface::new(0, 0)
    }
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn clear(&mut self) {
        self.fill(Rgba::TRANSPARENT);
    }

    pub fn fill(&mut self, color: Rgba) {
        self.pixels.fill(color.0);
    }

    /// Changes dimensions keeping the overlapping top-left region. Newly exposed
    /// pixels take `fill`. Same-size calls leave the surface untouched.
    pub fn resize(&mut self, width: u32, height: u32, fill: Rgba) {
        if width == self.width && height == self.height {
            return;
        }

        let mut next = vec![fill.0; (width as usize) * (height as usize)];
        let copy_w = width.min(self.width) as usize;
        let copy_h = height.min(self.height) as usize;
        for y in 0..copy_h {
            let src = y * self.width as usize;
            let dst = y * width as usize;
            next[dst..dst + copy_w].copy_from_slice(&self.pixels[src..src + copy_w]);
        }

        self.width = width;
        self.height = height;
        self.pixels = next;
    }

    /// Rasterizes `commands` in order with anti-aliased edges. Rows are filled
    /// in parallel; within a row commands keep their submission order.
    pub fn rasterize(&mut self, commands: &[DrawCommand]) {
        if self.is_empty() || commands.is_empty() {
            return;
        }

        let width = self.width as usize;
        let prepared: Vec<Prepared> = commands
            .iter()
            .filter_map(|cmd| Prepared::new(cmd, self.width, self.height))
            .collect();
        if prepared.is_empty() {
            return;
        }

        self.pixels
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row, line)| {
                let py = row as f32 + 0.5;
                for prim in prepared.iter().filter(|p| p.covers_row(row)) {
                    for col in prim.x0..=prim.x1 {
                        let coverage = prim.coverage(col as f32 + 0.5, py);
                        if coverage > 0.0 {
                            prim.color.over(&mut line[col], coverage);
                        }
                    }
                }
            });
    }

    /// Blends `src` over this surface. Both surfaces must share dimensions.
    pub fn composite(&mut self, src: &Surface, blend: crate::config::BlendMode) {
        debug_assert_eq!((self.width, self.height), (src.width, src.height));
        crate::postprocess::blend(&mut self.pixels, &src.pixels, blend);
    }

    /// Quantizes into `out`, reallocating only when the size changed.
    pub fn write_frame(&self, out: &mut FrameBuffer) {
        if out.width() != self.width || out.height() != self.height {
            *out = ImageBuffer::new(self.width, self.height);
        }
        out.as_mut()
            .par_chunks_mut(4)
            .zip(self.pixels.par_iter())
            .for_each(|(dst, px)| dst.copy_from_slice(&Rgba::to_rgba8(px)));
    }
}

/// A command clipped to the surface with its color resolved once.
struct Prepared {
    shape: Shape,
    color: Rgba,
    x0: usize,
    x1: usize,
    y0: usize,
    y1: usize,
}

impl Prepared {
    fn new(cmd: &DrawCommand, width: u32, height: u32) -> Option<Self> {
        let color = cmd.color.to_premultiplied();
        if color.alpha() <= 0.0 {
            return None;
        }

        let (min, max) = match cmd.shape {
            Shape::Segment { from, to, width } => {
                let r = 0.5 * width + 1.0;
                (
                    [from[0].min(to[0]) - r, from[1].min(to[1]) - r],
                    [from[0].max(to[0]) + r, from[1].max(to[1]) + r],
                )
            }
            Shape::Disc { center, radius } => {
                let r = radius + 1.0;
                ([center[0] - r, center[1] - r], [center[0] + r, center[1] + r])
            }
        };

        if !(min[0].is_finite() && min[1].is_finite() && max[0].is_finite() && max[1].is_finite()) {
            return None;
        }
        if max[0] < 0.0 || max[1] < 0.0 || min[0] >= width as f32 || min[1] >= height as f32 {
            return None;
        }

        Some(Self {
            shape: cmd.shape,
            color,
            x0: min[0].max(0.0) as usize,
            x1: (max[0] as usize).min(width as usize - 1),
            y0: min[1].max(0.0) as usize,
            y1: (max[1] as usize).min(height as usize - 1),
        })
    }

    #[inline]
    fn covers_row(&self, row: usize) -> bool {
        row >= self.y0 && row <= self.y1
    }

    /// Fraction of the pixel centred at `(px, py)` inside the shape, with a
    /// one-pixel linear ramp at the edge.
    #[inline]
    fn coverage(&self, px: f32, py: f32) -> f32 {
        match self.shape {
            Shape::Disc { center, radius } => {
                let dx = px - center[0];
                let dy = py - center[1];
                (radius + 0.5 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0)
            }
            Shape::Segment { from, to, width } => {
                let d = distance_to_segment(px, py, from, to);
                // Sub-pixel strokes keep their weight by fading instead of vanishing.
                let half = 0.5 * width;
                if half < 0.5 {
                    (1.0 - d).clamp(0.0, 1.0) * width
                } else {
                    (half + 0.5 - d).clamp(0.0, 1.0)
                }
            }
        }
    }
}

fn distance_to_segment(px: f32, py: f32, a: [f32; 2], b: [f32; 2]) -> f32 {
    let abx = b[0] - a[0];
    let aby = b[1] - a[1];
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq > 0.0 {
        (((px - a[0]) * abx + (py - a[1]) * aby) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let dx = px - (a[0] + abx * t);
    let dy = py - (a[1] + aby * t);
    (dx * dx + dy * dy).sqrt()
}

/// The draw/composite pair owned by one engine
#[derive(Clone, Debug)]
pub struct FrameBuffers {
    pub draw: Surface,
    pub composite: Surface,
}

impl FrameBuffers {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            draw: Surface::new(width, height),
            composite: Surface::new(width, height),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.composite.width(), self.composite.height())
    }

    /// Resizes both surfaces keeping what is already shown. The draw surface
    /// picks up the composite image first, then the composite is rebuilt from
    /// it, so neither loses content to the dimension change.
    pub fn resize(&mut self, width: u32, height: u32, background: Rgba) {
        if (width, height) == self.size() {
            return;
        }
        self.draw = self.composite.clone();
        self.draw.resize(width, height, Rgba::TRANSPARENT);
        self.composite.resize(width, height, background);
        log::debug!("frame buffers resized to {width}x{height}");
    }
}
