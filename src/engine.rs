//! Background engine
//!
//! Ties the particle pool, compositor and scheduler together behind the
//! mount / tick / resize / unmount contract a host UI drives.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::compositor::Compositor;
use crate::config::EngineConfig;
use crate::noise::{NoiseField, NoiseSource};
use crate::particles::{FrameContext, Particle, ParticlePool};
use crate::presets::Preset;
use crate::scheduler::{Admission, FrameGate, Scheduler, Ticket};
use crate::surface::FrameBuffer;

/// Size of the area the background covers, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Whatever the host mounts the background into.
pub trait Container {
    /// Current size, or `None` while there is nothing to draw into yet.
    fn viewport(&self) -> Option<Viewport>;
}

impl Container for Viewport {
    fn viewport(&self) -> Option<Viewport> {
        Some(*self)
    }
}

impl Container for Option<Viewport> {
    fn viewport(&self) -> Option<Viewport> {
        *self
    }
}

/// Counters for the host's status display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub frames: u64,
    pub skipped: u64,
    pub particles: usize,
    pub respawns: u64,
}

struct Scene {
    pool: ParticlePool,
    compositor: Compositor,
}

/// One mounted background
pub struct Engine {
    config: EngineConfig,
    noise: Box<dyn NoiseSource>,
    rng: Box<dyn RngCore + Send>,
    scheduler: Scheduler,
    scene: Option<Scene>,
    pending_viewport: Option<Viewport>,
    tick: u64,
}

impl Engine {
    /// Mounts `preset` into `container` with a fresh random seed.
    pub fn mount(container: &impl Container, preset: Preset) -> Self {
        Self::mount_seeded(container, preset, rand::random())
    }

    /// Mounts `preset` with a reproducible particle and noise seed.
    pub fn mount_seeded(container: &impl Container, preset: Preset, seed: u64) -> Self {
        Self::seeded(container, preset.config(), seed, preset.name())
    }

    /// Mounts a hand-tuned configuration.
    pub fn mount_config(container: &impl Container, config: EngineConfig, seed: u64) -> Self {
        Self::seeded(container, config, seed, "custom")
    }

    fn seeded(container: &impl Container, config: EngineConfig, seed: u64, label: &str) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = NoiseField::new(rng.gen());
        match container.viewport() {
            Some(v) => log::info!(
                "mounting {label} background at {}x{}: {} particles, seed {seed}",
                v.width,
                v.height,
                config.count
            ),
            None => log::info!(
                "mounting {label} background: {} particles, seed {seed}",
                config.count
            ),
        }
        Self::mount_with(container, config, Box::new(noise), Box::new(rng))
    }

    /// Mounts with caller-supplied noise and randomness.
    pub fn mount_with(
        container: &impl Container,
        config: EngineConfig,
        noise: Box<dyn NoiseSource>,
        rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let mut scheduler = Scheduler::new(FrameGate::new(config.frame_interval_ms));
        scheduler.schedule();

        let mut engine = Self {
            config,
            noise,
            rng,
            scheduler,
            scene: None,
            pending_viewport: container.viewport(),
            tick: 0,
        };
        if engine.pending_viewport.is_some() {
            engine.apply_pending_viewport();
        } else {
            log::debug!("container unavailable, deferring start until it has a size");
        }
        engine
    }

    /// Ticket the host should fire on its next refresh.
    pub fn pending_ticket(&self) -> Option<Ticket> {
        self.scheduler.pending()
    }

    /// Runs one scheduled tick at host time `now_ms` and returns the ticket
    /// for the next one. Stale tickets and ticks after unmount do nothing.
    pub fn tick(&mut self, ticket: Ticket, now_ms: f64) -> Option<Ticket> {
        match self.scheduler.admit(ticket, now_ms) {
            Admission::Stale => {
                log::trace!("ignoring stale tick {ticket:?}");
                return None;
            }
            Admission::Skip => {}
            Admission::Run => self.render_frame(),
        }
        self.scheduler.schedule()
    }

    /// Records a new container size; it takes effect before the next frame is drawn.
    pub fn resize(&mut self, viewport: Viewport) {
        if self.scheduler.is_stopped() {
            return;
        }
        self.pending_viewport = Some(viewport);
    }

    /// Stops scheduling and releases both surfaces. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        if self.scheduler.is_stopped() {
            return;
        }
        self.scheduler.stop();
        self.scene = None;
        self.pending_viewport = None;
        log::info!("background unmounted after {} frames", self.tick);
    }

    pub fn is_mounted(&self) -> bool {
        !self.scheduler.is_stopped()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Last presented frame, if a surface exists.
    pub fn frame(&self) -> Option<&FrameBuffer> {
        self.scene.as_ref().map(|s| s.compositor.frame())
    }

    pub fn particles(&self) -> Option<&[Particle]> {
        self.scene.as_ref().map(|s| s.pool.particles())
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            frames: self.tick,
            skipped: self.scheduler.skipped(),
            particles: self.scene.as_ref().map_or(0, |s| s.pool.len()),
            respawns: self.scene.as_ref().map_or(0, |s| s.pool.respawns()),
        }
    }

    fn apply_pending_viewport(&mut self) {
        let Some(viewport) = self.pending_viewport.take() else {
            return;
        };

        match self.scene.as_mut() {
            Some(scene) => {
                log::debug!("resizing background to {}x{}", viewport.width, viewport.height);
                scene.compositor.resize(viewport.width, viewport.height);
            }
            None => {
                let ctx = FrameContext::new(viewport.width, viewport.height, self.tick);
                let pool = ParticlePool::new(
                    &self.config,
                    &ctx,
                    self.noise.as_ref(),
                    self.rng.as_mut(),
                );
                let compositor = Compositor::new(viewport.width, viewport.height, &self.config);
                log::debug!(
                    "background started at {}x{} with {} particles",
                    viewport.width,
                    viewport.height,
                    pool.len()
                );
                self.scene = Some(Scene { pool, compositor });
            }
        }
    }

    fn render_frame(&mut self) {
        self.apply_pending_viewport();
        let Some(scene) = self.scene.as_mut() else {
            return;
        };

        self.tick += 1;
        let (width, height) = scene.compositor.size();
        let ctx = FrameContext::new(width, height, self.tick);

        scene.compositor.begin_frame();
        let commands = scene
            .pool
            .advance_all(&ctx, self.noise.as_ref(), self.rng.as_mut());
        scene.compositor.draw(commands);
        scene.compositor.post_process();
        scene.compositor.present();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.unmount();
    }
}
