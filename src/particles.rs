//! Particle Engine for Glowfield
//! Fixed-capacity pool of particles steered by a noise field and recycled in place

use rand::{Rng, RngCore};
use rayon::prelude::*;
use std::f32::consts::TAU;

use crate::color::Hsla;
use crate::config::{BoundsPolicy, EngineConfig, Motion};
use crate::noise::NoiseSource;

/// One slot in the pool
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Frames since spawn.
    pub life: u32,
    pub ttl: f32,
    pub speed: f32,
    pub radius: f32,
    pub hue: f32,
}

/// Visual primitive produced by one advance
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    /// Round-capped stroke; `width` is the full line width.
    Segment {
        from: [f32; 2],
        to: [f32; 2],
        width: f32,
    },
    Disc {
        center: [f32; 2],
        radius: f32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    pub shape: Shape,
    pub color: Hsla,
}

/// Per-frame inputs shared by every slot
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
    pub width: f32,
    pub height: f32,
    /// Frames rendered since mount; the noise field's time axis.
    pub tick: u64,
}

impl FrameContext {
    pub fn new(width: u32, height: u32, tick: u64) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
            tick,
        }
    }
}

/// Triangular opacity envelope: 0 at birth and death, 1 halfway through.
pub fn fade_in_out(life: f32, ttl: f32) -> f32 {
    if ttl <= 0.0 {
        return 0.0;
    }
    let half = 0.5 * ttl;
    ((life + half).rem_euclid(ttl) - half).abs() / half
}

/// Global hue the glow-dot motion drifts through; `None` for other motions.
pub fn base_hue(motion: &Motion, tick: u64) -> Option<f32> {
    match *motion {
        Motion::GlowDot {
            hue_start,
            hue_step,
            ..
        } => Some(hue_start + hue_step * tick as f32),
        Motion::FlowLine { .. } => None,
    }
}

#[derive(Clone, Copy)]
struct Step {
    command: DrawCommand,
    expired: bool,
}

/// Pool of exactly `config.count` particles
pub struct ParticlePool {
    config: EngineConfig,
    particles: Vec<Particle>,
    steps: Vec<Step>,
    commands: Vec<DrawCommand>,
    respawns: u64,
}

impl ParticlePool {
    /// Builds the pool with every slot freshly spawned.
    pub fn new(
        config: &EngineConfig,
        ctx: &FrameContext,
        noise: &dyn NoiseSource,
        rng: &mut dyn RngCore,
    ) -> Self {
        let mut pool = Self {
            config: config.clone(),
            particles: vec![Particle::default(); config.count],
            steps: Vec::with_capacity(config.count),
            commands: Vec::with_capacity(config.count),
            respawns: 0,
        };
        for slot in 0..pool.particles.len() {
            pool.spawn(slot, ctx, noise, rng);
        }
        pool
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Respawns since the pool was built, not counting the initial fill.
    pub fn respawns(&self) -> u64 {
        self.respawns
    }

    /// Assigns fresh randomized state to `slot`.
    pub fn spawn(
        &mut self,
        slot: usize,
        ctx: &FrameContext,
        noise: &dyn NoiseSource,
        rng: &mut dyn RngCore,
    ) {
        let config = &self.config;
        let particle = match config.motion {
            Motion::FlowLine {
                band_height, hue, ..
            } => {
                let x = rng.gen::<f32>() * ctx.width;
                let y = 0.5 * ctx.height + (rng.gen::<f32>() - 0.5) * band_height;
                Particle {
                    x,
                    y,
                    vx: 0.0,
                    vy: 0.0,
                    life: 0,
                    ttl: config.ttl.sample(rng),
                    speed: config.speed.sample(rng),
                    radius: config.radius.sample(rng),
                    hue: hue.sample(rng),
                }
            }
            Motion::GlowDot { hue_spread, .. } => {
                let base = base_hue(&config.motion, ctx.tick).unwrap_or_default();
                let x = rng.gen::<f32>() * ctx.width;
                let y = rng.gen::<f32>() * ctx.height;
                let n = config.noise.sample(noise, x, y, base as f64);
                let heading = rng.gen::<f32>() * TAU;
                let speed = config.speed.sample(rng);
                Particle {
                    x,
                    y,
                    vx: speed * heading.cos(),
                    vy: speed * heading.sin(),
                    life: 0,
                    ttl: config.ttl.sample(rng),
                    speed,
                    radius: config.radius.sample(rng),
                    hue: base + n * hue_spread,
                }
            }
        };
        self.particles[slot] = particle;
    }

    /// Moves one particle, returns what to draw for this frame and recycles the
    /// slot if it left the viewport or outlived its ttl.
    pub fn advance(
        &mut self,
        slot: usize,
        ctx: &FrameContext,
        noise: &dyn NoiseSource,
        rng: &mut dyn RngCore,
    ) -> DrawCommand {
        let step = step_particle(&self.config, &mut self.particles[slot], ctx, noise);
        if step.expired {
            self.respawn(slot, ctx, noise, rng);
        }
        step.command
    }

    /// Advances every slot in index order. Motion is computed in parallel since
    /// slots never read each other; respawns then run sequentially so the random
    /// stream is consumed in slot order.
    pub fn advance_all(
        &mut self,
        ctx: &FrameContext,
        noise: &dyn NoiseSource,
        rng: &mut dyn RngCore,
    ) -> &[DrawCommand] {
        let config = &self.config;
        self.particles
            .par_iter_mut()
            .map(|p| step_particle(config, p, ctx, noise))
            .collect_into_vec(&mut self.steps);

        self.commands.clear();
        for slot in 0..self.steps.len() {
            let step = self.steps[slot];
            self.commands.push(step.command);
            if step.expired {
                self.respawn(slot, ctx, noise, rng);
            }
        }
        &self.commands
    }

    fn respawn(
        &mut self,
        slot: usize,
        ctx: &FrameContext,
        noise: &dyn NoiseSource,
        rng: &mut dyn RngCore,
    ) {
        self.respawns += 1;
        self.spawn(slot, ctx, noise, rng);
    }
}

fn step_particle(
    config: &EngineConfig,
    p: &mut Particle,
    ctx: &FrameContext,
    noise: &dyn NoiseSource,
) -> Step {
    let alpha = fade_in_out(p.life as f32, p.ttl) * config.opacity;
    let color = config.hue_policy.resolve(p.hue).with_alpha(alpha);

    let shape = match config.motion {
        Motion::FlowLine {
            noise_steps,
            velocity_blend,
            ..
        } => {
            let n = config.noise.sample(noise, p.x, p.y, ctx.tick as f64) * noise_steps * TAU;
            p.vx = lerp(p.vx, n.cos(), velocity_blend);
            p.vy = lerp(p.vy, n.sin(), velocity_blend);
            let from = [p.x, p.y];
            p.x += p.vx * p.speed;
            p.y += p.vy * p.speed;
            Shape::Segment {
                from,
                to: [p.x, p.y],
                width: p.radius,
            }
        }
        Motion::GlowDot { .. } => {
            let center = [p.x, p.y];
            p.x += p.vx;
            p.y += p.vy;
            Shape::Disc {
                center,
                radius: p.radius,
            }
        }
    };

    p.life += 1;

    let margin = match config.bounds {
        BoundsPolicy::Exact => 0.0,
        BoundsPolicy::ExpandByRadius => p.radius,
    };
    let outside = p.x < -margin
        || p.x > ctx.width + margin
        || p.y < -margin
        || p.y > ctx.height + margin;

    Step {
        command: DrawCommand { shape, color },
        expired: outside || p.life as f32 > p.ttl,
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
