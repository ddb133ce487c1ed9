//! Glowfield - Main Application
//! Full-window particle background hosted in an egui window, or exported headlessly

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};

use anyhow::Context;
use eframe::egui;

use glowfield::offscreen_render::{self, ExportMessage};
use glowfield::{AppConfig, Engine, Preset, Viewport};

/// Command line options
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    preset: Option<Preset>,
    export: Option<PathBuf>,
    frames: Option<usize>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut parsed = Args::default();
        while let Some(flag) = args.next() {
            let mut value = || {
                args.next()
                    .with_context(|| format!("{flag} expects a value"))
            };
            match flag.as_str() {
                "--config" => parsed.config = Some(PathBuf::from(value()?)),
                "--preset" => {
                    let name = value()?;
                    let preset = Preset::from_name(&name).with_context(|| {
                        let known: Vec<_> = Preset::all().iter().map(|p| p.name()).collect();
                        format!("unknown preset {name:?}, expected one of {known:?}")
                    })?;
                    parsed.preset = Some(preset);
                }
                "--export" => parsed.export = Some(PathBuf::from(value()?)),
                "--frames" => {
                    let raw = value()?;
                    let frames = raw
                        .parse()
                        .with_context(|| format!("--frames expects a count, got {raw:?}"))?;
                    parsed.frames = Some(frames);
                }
                other => anyhow::bail!(
                    "unrecognised argument {other:?}\nusage: glowfield [--config <path>] [--preset <name>] [--export <dir> --frames <n>]"
                ),
            }
        }
        Ok(parsed)
    }

    /// Loads the config file, falling back to defaults, then applies overrides.
    fn app_config(&self) -> AppConfig {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path).unwrap_or_else(|e| {
                log::warn!("{e:#}; using default settings");
                AppConfig::default()
            }),
            None => AppConfig::default(),
        };
        if let Some(preset) = self.preset {
            config.preset = preset;
        }
        if let Some(frames) = self.frames {
            config.export.frames = frames;
        }
        config
    }
}

/// Main application state
struct GlowfieldApp {
    config: AppConfig,
    config_path: Option<PathBuf>,
    engine: Engine,
    texture: Option<egui::TextureHandle>,
    viewport: Option<Viewport>,

    // UI state
    show_settings: bool,
    status: Option<String>,

    // Tick rate over the last second
    rate_window_start: f64,
    rate_window_frames: u64,
    tick_rate: f64,

    // Export state
    export_dir: String,
    export_progress: f32,
    export_progress_rx: Option<Receiver<ExportMessage>>,
}

impl GlowfieldApp {
    fn new(cc: &eframe::CreationContext<'_>, config: AppConfig, config_path: Option<PathBuf>) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        // Nothing to draw into until the first layout pass reports a size.
        let engine = mount(&None, &config);

        Self {
            config,
            config_path,
            engine,
            texture: None,
            viewport: None,
            show_settings: true,
            status: None,
            rate_window_start: 0.0,
            rate_window_frames: 0,
            tick_rate: 0.0,
            export_dir: "glowfield-export".to_string(),
            export_progress: 0.0,
            export_progress_rx: None,
        }
    }

    fn switch_preset(&mut self, preset: Preset) {
        if preset == self.config.preset {
            return;
        }
        self.config.preset = preset;
        self.engine.unmount();
        self.engine = mount(&self.viewport, &self.config);
        self.rate_window_frames = self.engine.stats().frames;
    }

    fn poll_export(&mut self) {
        let mut should_clear_rx = false;
        if let Some(ref rx) = self.export_progress_rx {
            while let Ok(msg) = rx.try_recv() {
                match msg {
                    ExportMessage::Progress(current, total) => {
                        self.export_progress = current as f32 / total.max(1) as f32;
                    }
                    ExportMessage::Completed(dir) => {
                        self.status = Some(format!("Exported to {}", dir.display()));
                        should_clear_rx = true;
                    }
                    ExportMessage::Error(e) => {
                        self.status = Some(format!("Export failed: {e}"));
                        should_clear_rx = true;
                    }
                }
            }
        }
        if should_clear_rx {
            self.export_progress_rx = None;
            self.export_progress = 0.0;
        }
    }

    fn update_tick_rate(&mut self, now_s: f64) {
        let elapsed = now_s - self.rate_window_start;
        if elapsed >= 1.0 {
            let frames = self.engine.stats().frames;
            self.tick_rate = frames.saturating_sub(self.rate_window_frames) as f64 / elapsed;
            self.rate_window_frames = frames;
            self.rate_window_start = now_s;
        }
    }
}

fn mount(viewport: &Option<Viewport>, config: &AppConfig) -> Engine {
    match config.seed {
        Some(seed) => Engine::mount_seeded(viewport, config.preset, seed),
        None => Engine::mount(viewport, config.preset),
    }
}

impl eframe::App for GlowfieldApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_export();

        let now_s = ctx.input(|i| i.time);
        self.update_tick_rate(now_s);

        if self.show_settings {
            self.render_settings_window(ctx);
        }
        self.render_background(ctx, now_s * 1000.0);

        // Request continuous repaint for animation
        ctx.request_repaint();
    }
}

impl GlowfieldApp {
    fn render_background(&mut self, ctx: &egui::Context, now_ms: f64) {
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let (rect, response) =
                    ui.allocate_exact_size(ui.available_size(), egui::Sense::click());
                if response.double_clicked() {
                    self.show_settings = !self.show_settings;
                }

                let ppp = ctx.pixels_per_point();
                let viewport = Viewport::new(
                    (rect.width() * ppp).round() as u32,
                    (rect.height() * ppp).round() as u32,
                );
                if self.viewport != Some(viewport) {
                    self.viewport = Some(viewport);
                    self.engine.resize(viewport);
                }

                if let Some(ticket) = self.engine.pending_ticket() {
                    self.engine.tick(ticket, now_ms);
                }

                let Some(frame) = self.engine.frame() else {
                    return;
                };
                let (w, h) = frame.dimensions();
                if w == 0 || h == 0 {
                    return;
                }
                let image =
                    egui::ColorImage::from_rgba_unmultiplied([w as usize, h as usize], frame.as_raw());
                match self.texture.as_mut() {
                    Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.texture =
                            Some(ctx.load_texture("glowfield", image, egui::TextureOptions::LINEAR));
                    }
                }

                if let Some(texture) = &self.texture {
                    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                    ui.painter_at(rect)
                        .image(texture.id(), rect, uv, egui::Color32::WHITE);
                }
            });
    }

    fn render_settings_window(&mut self, ctx: &egui::Context) {
        let mut open = self.show_settings;
        egui::Window::new("Settings")
            .open(&mut open)
            .resizable(false)
            .default_pos([16.0, 16.0])
            .show(ctx, |ui| {
                // Preset selector
                let mut selected = self.config.preset;
                egui::ComboBox::from_label("Preset")
                    .selected_text(selected.name())
                    .show_ui(ui, |ui| {
                        for preset in Preset::all() {
                            ui.selectable_value(&mut selected, preset, preset.name())
                                .on_hover_text(preset.description());
                        }
                    });
                self.switch_preset(selected);
                ui.label(self.config.preset.description());

                ui.separator();

                let stats = self.engine.stats();
                egui::Grid::new("stats_grid").num_columns(2).show(ui, |ui| {
                    ui.label("Particles");
                    ui.label(stats.particles.to_string());
                    ui.end_row();
                    ui.label("Tick rate");
                    ui.label(format!("{:.0} /s", self.tick_rate));
                    ui.end_row();
                    ui.label("Frames");
                    ui.label(stats.frames.to_string());
                    ui.end_row();
                    ui.label("Skipped");
                    ui.label(stats.skipped.to_string());
                    ui.end_row();
                    ui.label("Respawns");
                    ui.label(stats.respawns.to_string());
                    ui.end_row();
                    if let Some(v) = self.viewport {
                        ui.label("Surface");
                        ui.label(format!("{}x{}", v.width, v.height));
                        ui.end_row();
                    }
                });

                ui.separator();
                self.render_export_settings(ui);

                if let Some(path) = self.config_path.clone() {
                    if ui.button("Save settings").clicked() {
                        self.status = Some(match self.config.save(&path) {
                            Ok(()) => format!("Saved {}", path.display()),
                            Err(e) => format!("{e:#}"),
                        });
                    }
                }

                if let Some(status) = &self.status {
                    ui.separator();
                    ui.label(status);
                }
                ui.small("Double-click the background to toggle this window.");
            });
        self.show_settings = open;
    }

    fn render_export_settings(&mut self, ui: &mut egui::Ui) {
        ui.heading("Export");
        ui.horizontal(|ui| {
            ui.label("Folder:");
            ui.text_edit_singleline(&mut self.export_dir);
        });
        ui.horizontal(|ui| {
            ui.add(egui::DragValue::new(&mut self.config.export.width).clamp_range(16..=7680).prefix("w "));
            ui.add(egui::DragValue::new(&mut self.config.export.height).clamp_range(16..=4320).prefix("h "));
            ui.add(egui::DragValue::new(&mut self.config.export.frames).clamp_range(1..=100_000).suffix(" frames"));
        });

        if self.export_progress_rx.is_some() {
            ui.add(egui::ProgressBar::new(self.export_progress).show_percentage());
        } else if ui.button("Export PNG sequence").clicked() {
            let (tx, rx) = mpsc::channel();
            let config = self.config.clone();
            let dir = PathBuf::from(&self.export_dir);
            std::thread::spawn(move || offscreen_render::run_headless_export(config, dir, tx));
            self.export_progress_rx = Some(rx);
            self.status = None;
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse(std::env::args().skip(1))?;
    let config = args.app_config();

    if let Some(dir) = &args.export {
        offscreen_render::export_png_sequence(&config, dir, |current, total| {
            if current % 10 == 0 || current == total {
                log::info!("rendered {current}/{total}");
            }
        })?;
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_title("Glowfield")
            .with_min_inner_size([320.0, 240.0]),
        ..Default::default()
    };

    let config_path = args.config.clone();
    eframe::run_native(
        "Glowfield",
        options,
        Box::new(move |cc| Box::new(GlowfieldApp::new(cc, config, config_path))),
    )
    .map_err(|e| anyhow::anyhow!("failed to start window: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_export_invocation() {
        let args = parse(&["--preset", "flow-line", "--export", "out", "--frames", "12"]).unwrap();
        assert_eq!(args.preset, Some(Preset::FlowLine));
        assert_eq!(args.export, Some(PathBuf::from("out")));
        let config = args.app_config();
        assert_eq!(config.export.frames, 12);
        assert_eq!(config.preset, Preset::FlowLine);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse(&["--frames"]).is_err());
        assert!(parse(&["--frames", "lots"]).is_err());
        assert!(parse(&["--preset", "plasma"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let args = parse(&["--config", "/definitely/not/here.json"]).unwrap();
        assert_eq!(args.app_config(), AppConfig::default());
    }
}
