//! Post-Processing for Glowfield
//! CPU blur and blend passes that turn crisp particle strokes into a soft glow

use rayon::prelude::*;

use crate::config::BlendMode;
use crate::surface::Surface;

/// Reusable scratch memory for blurring a surface.
#[derive(Default)]
pub struct PostProcessor {
    /// Row-major working copy.
    work: Vec<[f32; 4]>,
    /// Transposed copy for the vertical passes.
    transposed: Vec<[f32; 4]>,
    scratch: Vec<[f32; 4]>,
    /// Output of the last blur.
    out: Surface,
}

impl PostProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gaussian-like blur of `src` with standard deviation `sigma` pixels.
    /// Pixels outside the surface count as transparent, so glow fades at the edges.
    /// A `sigma` of zero returns an exact copy.
    pub fn blur(&mut self, src: &Surface, sigma: f32) -> &Surface {
        let (width, height) = (src.width() as usize, src.height() as usize);
        if self.out.width() != src.width() || self.out.height() != src.height() {
            self.out = Surface::new(src.width(), src.height());
        }

        if sigma <= 0.0 || src.is_empty() {
            self.out.pixels_mut().copy_from_slice(src.pixels());
            return &self.out;
        }

        let boxes = box_sizes_for_gauss(sigma, 3);

        self.work.clear();
        self.work.extend_from_slice(src.pixels());
        self.transposed.resize(width * height, [0.0; 4]);
        self.scratch.resize(width * height, [0.0; 4]);

        for &size in &boxes {
            box_blur_rows(&self.work, &mut self.scratch, width, (size - 1) / 2);
            std::mem::swap(&mut self.work, &mut self.scratch);
        }

        transpose(&self.work, &mut self.transposed, width, height);
        for &size in &boxes {
            box_blur_rows(&self.transposed, &mut self.scratch, height, (size - 1) / 2);
            std::mem::swap(&mut self.transposed, &mut self.scratch);
        }

        transpose(&self.transposed, self.out.pixels_mut(), height, width);
        &self.out
    }
}

/// Box widths whose successive application approximates a Gaussian of `sigma`.
fn box_sizes_for_gauss(sigma: f32, n: usize) -> Vec<usize> {
    let n_f = n as f32;
    let w_ideal = (12.0 * sigma * sigma / n_f + 1.0).sqrt();
    let mut wl = w_ideal.floor() as i64;
    if wl % 2 == 0 {
        wl -= 1;
    }
    let wl = wl.max(1);
    let wu = wl + 2;

    let wl_f = wl as f32;
    let m_ideal =
        (12.0 * sigma * sigma - n_f * wl_f * wl_f - 4.0 * n_f * wl_f - 3.0 * n_f) / (-4.0 * wl_f - 4.0);
    let m = m_ideal.round().max(0.0) as usize;

    (0..n)
        .map(|i| if i < m { wl as usize } else { wu as usize })
        .collect()
}

/// Sliding-window mean over each row with zero padding outside.
fn box_blur_rows(src: &[[f32; 4]], dst: &mut [[f32; 4]], width: usize, radius: usize) {
    if width == 0 {
        return;
    }
    let norm = 1.0 / (2 * radius + 1) as f32;

    dst.par_chunks_mut(width)
        .zip(src.par_chunks(width))
        .for_each(|(out, row)| {
            let mut acc = [0.0f32; 4];
            for px in row.iter().take(radius.min(width)) {
                add(&mut acc, px);
            }
            for x in 0..width {
                let enter = x + radius;
                if enter < width {
                    add(&mut acc, &row[enter]);
                }
                if x > radius {
                    sub(&mut acc, &row[x - radius - 1]);
                }
                out[x] = [
                    (acc[0] * norm).max(0.0),
                    (acc[1] * norm).max(0.0),
                    (acc[2] * norm).max(0.0),
                    (acc[3] * norm).max(0.0),
                ];
            }
        });
}

#[inline]
fn add(acc: &mut [f32; 4], px: &[f32; 4]) {
    for c in 0..4 {
        acc[c] += px[c];
    }
}

#[inline]
fn sub(acc: &mut [f32; 4], px: &[f32; 4]) {
    for c in 0..4 {
        acc[c] -= px[c];
    }
}

/// `src` is `height` rows of `width`; `dst` becomes `width` rows of `height`.
fn transpose(src: &[[f32; 4]], dst: &mut [[f32; 4]], width: usize, height: usize) {
    if width == 0 || height == 0 {
        return;
    }
    dst.par_chunks_mut(height).enumerate().for_each(|(x, col)| {
        for (y, out) in col.iter_mut().enumerate() {
            *out = src[y * width + x];
        }
    });
}

/// Composites premultiplied `src` onto `dst` in place.
pub fn blend(dst: &mut [[f32; 4]], src: &[[f32; 4]], mode: BlendMode) {
    dst.par_iter_mut().zip(src.par_iter()).for_each(|(d, s)| {
        let sa = s[3];
        if sa <= 0.0 {
            return;
        }
        let da = d[3];
        match mode {
            BlendMode::Normal => {
                for c in 0..4 {
                    d[c] = s[c] + d[c] * (1.0 - sa);
                }
            }
            BlendMode::Multiply => {
                for c in 0..3 {
                    d[c] = s[c] * (1.0 - da) + d[c] * (1.0 - sa) + s[c] * d[c];
                }
                d[3] = sa + da * (1.0 - sa);
            }
        }
    });
}
