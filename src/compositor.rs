//! Compositor for Glowfield
//! Turns one frame of draw commands into the presented background image

use crate::color::Rgba;
use crate::config::{EngineConfig, GlowPass};
use crate::particles::DrawCommand;
use crate::postprocess::PostProcessor;
use crate::surface::{FrameBuffer, FrameBuffers, Surface};

/// Frame compositor owning both surfaces
pub struct Compositor {
    buffers: FrameBuffers,
    postprocess: PostProcessor,
    passes: Vec<GlowPass>,
    background: Rgba,
    // Presented image
    frame: FrameBuffer,
}

impl Compositor {
    pub fn new(width: u32, height: u32, config: &EngineConfig) -> Self {
        let background = Rgba::opaque(config.background);
        let mut buffers = FrameBuffers::new(width, height);
        buffers.composite.fill(background);

        let mut compositor = Self {
            buffers,
            postprocess: PostProcessor::new(),
            passes: config.passes.clone(),
            background,
            frame: FrameBuffer::new(width, height),
        };
        compositor.present();
        compositor
    }

    pub fn size(&self) -> (u32, u32) {
        self.buffers.size()
    }

    /// Keeps the current image; particles are left where they are.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) == self.size() {
            return;
        }
        self.buffers.resize(width, height, self.background);
        self.present();
    }

    /// Clears the draw surface and resets the composite to the backdrop.
    pub fn begin_frame(&mut self) {
        self.buffers.draw.clear();
        self.buffers.composite.fill(self.background);
    }

    pub fn draw(&mut self, commands: &[DrawCommand]) {
        self.buffers.draw.rasterize(commands);
    }

    /// Applies each glow pass, always sourcing from the crisp draw surface.
    pub fn post_process(&mut self) {
        for pass in &self.passes {
            if pass.blur <= 0.0 {
                self.buffers
                    .composite
                    .composite(&self.buffers.draw, pass.blend);
            } else {
                let blurred = self.postprocess.blur(&self.buffers.draw, pass.blur);
                self.buffers.composite.composite(blurred, pass.blend);
            }
        }
    }

    /// Publishes the composite surface as the current frame.
    pub fn present(&mut self) -> &FrameBuffer {
        self.buffers.composite.write_frame(&mut self.frame);
        &self.frame
    }

    /// Last presented frame.
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn composite_surface(&self) -> &Surface {
        &self.buffers.composite
    }

    pub fn draw_surface(&self) -> &Surface {
        &self.buffers.draw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Hsl;
    use crate::config::BlendMode;
    use crate::particles::Shape;
    use crate::presets::Preset;

    fn disc(x: f32, y: f32, radius: f32, color: Hsl, alpha: f32) -> DrawCommand {
        DrawCommand {
            shape: Shape::Disc {
                center: [x, y],
                radius,
            },
            color: color.with_alpha(alpha),
        }
    }

    #[test]
    fn empty_frame_is_the_background() {
        let config = Preset::GlowDotAccent.config();
        let mut c = Compositor::new(16, 9, &config);
        c.begin_frame();
        c.post_process();
        let frame = c.present();
        let bg = Rgba::to_rgba8(&Rgba::opaque(config.background).0);
        assert!(frame.pixels().all(|p| p.0 == bg));
    }

    #[test]
    fn glow_pass_softens_crisp_edges() {
        let mut config = Preset::GlowDotAccent.config();
        config.passes = vec![GlowPass::new(4.0, BlendMode::Normal)];
        let mut c = Compositor::new(64, 64, &config);

        c.begin_frame();
        c.draw(&[disc(32.0, 32.0, 8.0, Hsl::new(20.0, 100.0, 50.0), 1.0)]);
        c.post_process();
        c.present();

        let crisp = c.draw_surface();
        let soft = c.composite_surface();
        // Just outside the disc the crisp surface is empty but the glow reaches.
        assert_eq!(crisp.pixel(32, 43)[3], 0.0);
        let bg = Rgba::opaque(config.background).0;
        assert_ne!(soft.pixel(32, 43), bg);
        // Far corner stays background.
        let corner = soft.pixel(0, 0);
        assert!((corner[0] - bg[0]).abs() < 1e-3);
    }

    #[test]
    fn multiply_passes_darken_light_backdrop() {
        let config = Preset::FlowLine.config();
        let mut c = Compositor::new(48, 48, &config);
        c.begin_frame();
        c.draw(&[DrawCommand {
            shape: Shape::Segment {
                from: [10.0, 24.0],
                to: [38.0, 24.0],
                width: 4.0,
            },
            color: Hsl::new(220.0, 70.0, 40.0).with_alpha(1.0),
        }]);
        c.post_process();

        let bg = Rgba::opaque(config.background).0;
        let near = c.composite_surface().pixel(24, 28);
        let luma = |p: [f32; 4]| p[0] + p[1] + p[2];
        assert!(luma(near) < luma(bg), "glow should darken the off-white backdrop");
        assert_eq!(c.composite_surface().pixel(24, 24)[3], 1.0);
    }

    #[test]
    fn each_frame_starts_from_scratch() {
        let config = Preset::GlowDotAccent.config();
        let mut c = Compositor::new(32, 32, &config);
        c.begin_frame();
        c.draw(&[disc(16.0, 16.0, 6.0, Hsl::new(220.0, 60.0, 25.0), 1.0)]);
        c.post_process();
        c.present();

        c.begin_frame();
        c.post_process();
        let bg = Rgba::opaque(config.background).0;
        assert!(c.composite_surface().pixels().iter().all(|p| *p == bg));
        assert!(c.draw_surface().pixels().iter().all(|p| *p == [0.0; 4]));
    }

    #[test]
    fn trivial_resize_keeps_presented_pixels() {
        let config = Preset::GlowDotAccent.config();
        let mut c = Compositor::new(40, 30, &config);
        c.begin_frame();
        c.draw(&[disc(20.0, 15.0, 10.0, Hsl::new(20.0, 100.0, 35.0), 0.6)]);
        c.post_process();
        let before = c.present().clone();

        c.resize(40, 30);
        assert_eq!(c.frame(), &before);
        assert_eq!(c.present(), &before);
    }

    #[test]
    fn resize_to_zero_and_back() {
        let config = Preset::FlowLine.config();
        let mut c = Compositor::new(20, 20, &config);
        c.resize(0, 0);
        c.begin_frame();
        c.draw(&[disc(5.0, 5.0, 3.0, Hsl::new(0.0, 0.0, 0.0), 1.0)]);
        c.post_process();
        assert_eq!(c.present().dimensions(), (0, 0));

        c.resize(12, 8);
        assert_eq!(c.size(), (12, 8));
        assert_eq!(c.present().dimensions(), (12, 8));
    }
}
