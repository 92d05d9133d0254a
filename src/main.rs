//! Glow Tree RS - Main Application
//! Animated 3D particle tree with live controls and capture export

mod animate;
mod camera;
mod config;
mod export;
mod offscreen;
mod render;
mod scene;

use camera::OrbitCamera;
use config::AppConfig;
use eframe::egui;
use offscreen::RecordMessage;
use render::SceneRenderer;
use scene::Scene;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Instant;

/// Grace period before the screenshot path silently falls back to the
/// CPU renderer when the backend never delivers a surface capture.
const SCREENSHOT_FALLBACK_SECS: f32 = 1.5;

struct RecordingState {
    stop: Arc<AtomicBool>,
    rx: Receiver<RecordMessage>,
    frames_done: usize,
}

/// Main application state
struct GlowTreeApp {
    config: AppConfig,
    scene: Scene,
    camera: OrbitCamera,
    renderer: SceneRenderer,
    rng: rand::rngs::ThreadRng,

    started: Instant,
    last_t: f32,
    canvas_size: (u32, u32),

    ffmpeg_available: bool,
    screenshot_pending: Option<Instant>,
    recording: Option<RecordingState>,
    status: Option<String>,
}

impl GlowTreeApp {
    fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_rgba_unmultiplied(20, 8, 20, 245);
        visuals.panel_fill = egui::Color32::from_rgba_unmultiplied(26, 10, 26, 240);
        cc.egui_ctx.set_visuals(visuals);

        let mut rng = rand::thread_rng();
        let scene = Scene::generate(&mut rng);

        Self {
            config: AppConfig::default(),
            scene,
            camera: OrbitCamera::new(1280.0, 800.0),
            renderer: SceneRenderer::new(),
            rng,
            started: Instant::now(),
            last_t: 0.0,
            canvas_size: (1280, 800),
            ffmpeg_available: export::check_ffmpeg_available(),
            screenshot_pending: None,
            recording: None,
            status: None,
        }
    }

    fn elapsed(&self) -> f32 {
        self.started.elapsed().as_secs_f32()
    }

    fn request_screenshot(&mut self, ctx: &egui::Context) {
        self.screenshot_pending = Some(Instant::now());
        ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot);
    }

    /// Handle a delivered surface capture, or fall back to the CPU
    /// renderer once the grace period runs out. Both paths end in the
    /// same fixed PNG filename.
    fn poll_screenshot(&mut self, ctx: &egui::Context) {
        let Some(requested_at) = self.screenshot_pending else {
            return;
        };

        let captured: Option<Arc<egui::ColorImage>> = ctx.input(|i| {
            i.events.iter().find_map(|e| match e {
                egui::Event::Screenshot { image, .. } => Some(image.clone()),
                _ => None,
            })
        });

        let path = self.config.export.screenshot_path.clone();
        if let Some(image) = captured {
            self.screenshot_pending = None;
            let rgba: Vec<u8> = image.pixels.iter().flat_map(|c| c.to_array()).collect();
            match export::save_png(
                Path::new(&path),
                image.size[0] as u32,
                image.size[1] as u32,
                &rgba,
            ) {
                Ok(()) => self.status = Some(format!("Saved {path}")),
                Err(_) => self.save_fallback_screenshot(&path),
            }
        } else if requested_at.elapsed().as_secs_f32() > SCREENSHOT_FALLBACK_SECS {
            self.screenshot_pending = None;
            self.save_fallback_screenshot(&path);
        }
    }

    fn save_fallback_screenshot(&mut self, path: &str) {
        let (w, h) = self.canvas_size;
        let rgba = offscreen::render_still(&self.scene, &self.camera, &self.config.scene, w, h);
        match export::save_png(Path::new(path), w, h, &rgba) {
            Ok(()) => self.status = Some(format!("Saved {path}")),
            Err(e) => self.status = Some(format!("Screenshot failed: {e}")),
        }
    }

    fn toggle_recording(&mut self) {
        if let Some(rec) = &self.recording {
            rec.stop.store(true, Ordering::Relaxed);
            return;
        }

        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));

        let scene = self.scene.clone();
        let camera = self.camera.clone();
        let params = self.config.scene;
        let config = self.config.clone();
        let start_t = self.elapsed();
        // Even dimensions keep yuv420p encoders happy.
        let (w, h) = (self.canvas_size.0 & !1, self.canvas_size.1 & !1);

        let stop_for_thread = stop.clone();
        std::thread::spawn(move || {
            offscreen::run_recording(
                scene,
                camera,
                params,
                config,
                start_t,
                w.max(2),
                h.max(2),
                stop_for_thread,
                tx,
            );
        });

        self.recording = Some(RecordingState {
            stop,
            rx,
            frames_done: 0,
        });
        self.status = None;
    }

    fn poll_recording(&mut self) {
        let Some(rec) = &mut self.recording else {
            return;
        };

        let mut finished = None;
        while let Ok(msg) = rec.rx.try_recv() {
            match msg {
                RecordMessage::Progress(frames) => rec.frames_done = frames,
                RecordMessage::Completed(path) => {
                    finished = Some(format!("Saved {}", path.display()));
                }
                RecordMessage::Error(e) => {
                    finished = Some(format!("Recording failed: {e}"));
                }
            }
        }

        if let Some(msg) = finished {
            self.status = Some(msg);
            self.recording = None;
        }
    }

    fn render_controls(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("controls")
            .min_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Glow Tree RS");
                ui.separator();

                let params = &mut self.config.scene;
                ui.label("Tint");
                ui.color_edit_button_srgb(&mut params.tint);

                ui.add_space(8.0);
                ui.label("Point Size");
                ui.add(egui::Slider::new(&mut params.size_mult, 0.2..=3.0));

                ui.label("Sparkle Intensity");
                ui.add(egui::Slider::new(&mut params.sparkle_intensity, 0.0..=3.0));

                ui.label("Rotation Speed");
                ui.add(egui::Slider::new(&mut params.rotation_speed, 0.0..=1.0));

                ui.checkbox(&mut params.snow_visible, "Snow");

                ui.add_space(8.0);
                ui.separator();

                if ui.button("📷 Screenshot").clicked() {
                    self.request_screenshot(ctx);
                }

                if self.ffmpeg_available {
                    let label = if self.recording.is_some() {
                        "⏹ Stop & Save"
                    } else {
                        "⏺ Record"
                    };
                    if ui.button(label).clicked() {
                        self.toggle_recording();
                    }

                    if let Some(rec) = &self.recording {
                        let fps = self.config.export.fps.max(1);
                        ui.label(format!(
                            "Recording {:.1}s",
                            rec.frames_done as f32 / fps as f32
                        ));
                        ui.spinner();
                    }
                } else {
                    ui.add_enabled(false, egui::Button::new("⏺ Record"));
                    ui.label("FFmpeg not found in PATH");
                }

                if let Some(status) = &self.status {
                    ui.add_space(8.0);
                    ui.label(status.clone());
                }

                ui.with_layout(egui::Layout::bottom_up(egui::Align::LEFT), |ui| {
                    ui.label("drag: orbit · scroll: zoom");
                });
            });
    }

    fn render_canvas(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let (rect, response) =
                    ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());

                // Viewport resize feeds straight into the camera aspect.
                self.camera.set_viewport(rect.width(), rect.height());
                self.canvas_size = (rect.width().max(2.0) as u32, rect.height().max(2.0) as u32);

                if response.dragged() {
                    let delta = response.drag_delta();
                    self.camera.orbit(delta.x, delta.y);
                }
                if response.hovered() {
                    let scroll = ui.input(|i| i.raw_scroll_delta.y);
                    if scroll != 0.0 {
                        self.camera.zoom(scroll);
                    }
                }

                let painter = ui.painter_at(rect);
                let bg = offscreen::BACKGROUND;
                painter.rect_filled(rect, 0.0, egui::Color32::from_rgb(bg[0], bg[1], bg[2]));

                self.renderer
                    .render(&painter, rect, &self.scene, &self.camera, &self.config.scene);
            });
    }
}

impl eframe::App for GlowTreeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Parameter mutations from the panel land before this step, so the
        // frame sees a consistent parameter set.
        let t = self.elapsed();
        let dt = t - self.last_t;
        self.last_t = t;

        self.poll_recording();
        self.poll_screenshot(ctx);

        let params = self.config.scene;
        animate::step(&mut self.scene, t, dt, &params, &mut self.rng);

        self.render_controls(ctx);
        self.render_canvas(ctx);

        // Continuous animation, resynchronized with the display refresh.
        ctx.request_repaint();
    }
}

/// Full-width diagnostic for fatal startup failures: no window or no
/// usable graphics surface means there is nothing to render into, so the
/// process reports and aborts instead of retrying.
fn startup_diagnostic(detail: &str) -> String {
    format!(
        "================================================================\n\
         Glow Tree RS could not start.\n\
         \n\
         Creating the window or graphics surface failed:\n\
             {detail}\n\
         \n\
         Run on a machine with a display and working GPU drivers\n\
         (hardware acceleration enabled), then try again.\n\
         ================================================================"
    )
}

fn main() {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title("Glow Tree RS")
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };

    let result = eframe::run_native(
        "Glow Tree RS",
        options,
        Box::new(|cc| Ok(Box::new(GlowTreeApp::new(cc)))),
    );

    if let Err(err) = result {
        eprintln!("{}", startup_diagnostic(&err.to_string()));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_diagnostic_names_the_cause() {
        let msg = startup_diagnostic("NoGlutinConfigs");
        assert!(msg.contains("could not start"));
        assert!(msg.contains("NoGlutinConfigs"));
    }
}
