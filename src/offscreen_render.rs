//! Headless offscreen renderer + PNG sequence exporter.
//!
//! Drives a mounted [`Engine`] with a synthetic host clock, so the frame-rate
//! gate behaves exactly as it does in the window: with a 60 Hz export clock a
//! gated preset still only renders about every other tick. Only accepted
//! ticks produce files.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use anyhow::Context;

use crate::config::AppConfig;
use crate::engine::{Engine, Viewport};
use crate::surface::FrameBuffer;

/// Messages from the export thread to the UI.
#[derive(Debug, Clone)]
pub enum ExportMessage {
    /// (current_frame, total_frames)
    Progress(usize, usize),
    Completed(PathBuf),
    Error(String),
}

/// Upper bound on host ticks per rendered frame before giving up.
const MAX_TICKS_PER_FRAME: usize = 1_000;

/// Steps `engine` until `frames` ticks have been accepted, handing each
/// presented frame to `on_frame`.
pub fn render_frames(
    engine: &mut Engine,
    frames: usize,
    frame_time_ms: f64,
    mut on_frame: impl FnMut(usize, &FrameBuffer) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let mut now_ms = 0.0;
    let mut rendered = 0;
    let mut idle = 0;

    while rendered < frames {
        let ticket = engine
            .pending_ticket()
            .context("engine stopped before the export finished")?;
        let before = engine.stats().frames;
        now_ms += frame_time_ms;
        engine.tick(ticket, now_ms);

        if engine.stats().frames == before {
            idle += 1;
            if idle > MAX_TICKS_PER_FRAME {
                anyhow::bail!(
                    "no frame accepted after {idle} ticks of {frame_time_ms} ms; is the frame interval longer than the export clock allows?"
                );
            }
            continue;
        }
        idle = 0;

        let frame = engine
            .frame()
            .context("engine has no surface to export")?;
        on_frame(rendered, frame)?;
        rendered += 1;
    }
    Ok(())
}

pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{index:05}.png"))
}

/// Renders `config.export.frames` frames of the configured preset into `out_dir`.
pub fn export_png_sequence(
    config: &AppConfig,
    out_dir: &Path,
    mut progress: impl FnMut(usize, usize),
) -> anyhow::Result<Vec<PathBuf>> {
    let export = &config.export;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating export directory {}", out_dir.display()))?;

    let viewport = Viewport::new(export.width, export.height);
    let mut engine = match config.seed {
        Some(seed) => Engine::mount_seeded(&viewport, config.preset, seed),
        None => Engine::mount(&viewport, config.preset),
    };

    log::info!(
        "exporting {} frames of {} at {}x{} to {}",
        export.frames,
        config.preset.name(),
        export.width,
        export.height,
        out_dir.display()
    );

    let mut written = Vec::with_capacity(export.frames);
    render_frames(&mut engine, export.frames, export.frame_time_ms, |index, frame| {
        let path = frame_path(out_dir, index);
        frame
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        log::debug!("wrote {}", path.display());
        written.push(path);
        progress(index + 1, export.frames);
        Ok(())
    })?;
    engine.unmount();

    log::info!("export finished: {} frames", written.len());
    Ok(written)
}

/// Run headless export in the current thread.
///
/// `main.rs` spawns this in a background thread from the settings window.
pub fn run_headless_export(config: AppConfig, out_dir: PathBuf, progress_tx: Sender<ExportMessage>) {
    let result = export_png_sequence(&config, &out_dir, |current, total| {
        let _ = progress_tx.send(ExportMessage::Progress(current, total));
    });

    let message = match result {
        Ok(_) => ExportMessage::Completed(out_dir),
        Err(e) => {
            log::error!("export failed: {e:#}");
            ExportMessage::Error(format!("{e:#}"))
        }
    };
    let _ = progress_tx.send(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::Preset;
    use std::sync::mpsc;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("glowfield-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn small_config(preset: Preset, frames: usize) -> AppConfig {
        let mut config = AppConfig {
            preset,
            seed: Some(9),
            ..AppConfig::default()
        };
        config.export.width = 24;
        config.export.height = 16;
        config.export.frames = frames;
        config
    }

    #[test]
    fn gated_preset_needs_extra_ticks_per_frame() {
        let mut engine = Engine::mount_seeded(&Viewport::new(16, 16), Preset::GlowDotAccent, 1);
        let mut seen = Vec::new();
        render_frames(&mut engine, 3, 1000.0 / 60.0, |i, frame| {
            seen.push((i, frame.dimensions()));
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, vec![(0, (16, 16)), (1, (16, 16)), (2, (16, 16))]);
        let stats = engine.stats();
        assert_eq!(stats.frames, 3);
        assert!(stats.skipped >= 3, "skipped {}", stats.skipped);
    }

    #[test]
    fn stalled_clock_is_reported() {
        let mut config = Preset::GlowDotAccent.config();
        config.count = 1;
        let mut engine = Engine::mount_config(&Viewport::new(8, 8), config, 1);
        let err = render_frames(&mut engine, 1, 0.0, |_, _| Ok(())).unwrap_err();
        assert!(err.to_string().contains("no frame accepted"), "{err}");
    }

    #[test]
    fn stopped_engine_cannot_export() {
        let mut engine = Engine::mount_seeded(&Viewport::new(8, 8), Preset::FlowLine, 1);
        engine.unmount();
        assert!(render_frames(&mut engine, 1, 16.0, |_, _| Ok(())).is_err());
    }

    #[test]
    fn writes_numbered_png_sequence() {
        let dir = temp_dir("sequence");
        let config = small_config(Preset::FlowLine, 3);
        let mut progress = Vec::new();
        let written = export_png_sequence(&config, &dir, |c, t| progress.push((c, t))).unwrap();

        assert_eq!(written.len(), 3);
        assert_eq!(written[2], dir.join("frame_00002.png"));
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        let decoded = image::open(&written[0]).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 16));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn headless_export_reports_over_channel() {
        let dir = temp_dir("channel");
        let (tx, rx) = mpsc::channel();
        run_headless_export(small_config(Preset::GlowDotNeutral, 2), dir.clone(), tx);

        let messages: Vec<ExportMessage> = rx.try_iter().collect();
        assert!(matches!(messages[0], ExportMessage::Progress(1, 2)));
        assert!(matches!(messages.last(), Some(ExportMessage::Completed(p)) if *p == dir));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
