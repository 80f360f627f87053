//! mandeltouch — a touch-driven Mandelbrot explorer.
//! - one-finger drag pans, two-finger pinch zooms anchored at the fingers
//! - egui/eframe shell with CPU rendering (optional wgpu backend)
//! - the view persists across restarts and exports to JSON/TOML files
//! - headless PNG snapshots via the CLI

mod gesture;
mod input;
mod math;
mod render;
mod viewport;

use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use eframe::{egui, App};
use egui::{ColorImage, TextureHandle};

use crate::gesture::GestureRouter;
use crate::input::{GestureConfig, TouchTracker};
use crate::math::Vec2;
use crate::viewport::ViewportState;

// ------------------------- CLI -------------------------

#[derive(Parser)]
#[command(name = "mandeltouch")]
#[command(about = "Touch-driven Mandelbrot explorer")]
struct Args {
    /// Optional view file to load (.json / .toml)
    #[arg(short, long)]
    view: Option<PathBuf>,

    /// Ignore pointer jitter below this distance, in points
    #[arg(long, default_value_t = 0.0)]
    touch_slop: f32,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Render a single frame to a PNG without opening a window
    Snapshot {
        out: PathBuf,
        #[arg(long, default_value_t = 1080)]
        width: u32,
        #[arg(long, default_value_t = 1920)]
        height: u32,
        #[arg(long, default_value_t = 1.0)]
        zoom: f32,
        #[arg(long, default_value_t = 0.0)]
        offset_x: f32,
        #[arg(long, default_value_t = 0.0)]
        offset_y: f32,
        /// Start from a saved view file instead of the flags above
        #[arg(long)]
        view: Option<PathBuf>,
    },
}

// ------------------------- App State -------------------------

const VIEW_STORAGE_KEY: &str = "mandeltouch_view";

struct ViewerApp {
    state: ViewportState,
    router: GestureRouter,
    tracker: TouchTracker,
    tex: Option<TextureHandle>,
    #[cfg(feature = "gpu")]
    gpu: Option<render::gpu::GpuRenderer>,
}

impl ViewerApp {
    fn new(cc: &eframe::CreationContext<'_>, view: Option<ViewportState>, config: GestureConfig) -> Self {
        let state = view
            .or_else(|| cc.storage.and_then(|s| eframe::get_value(s, VIEW_STORAGE_KEY)))
            .map(ViewportState::sanitized)
            .unwrap_or_default();

        #[cfg(feature = "gpu")]
        let gpu = match render::gpu::GpuRenderer::new() {
            Ok(renderer) => Some(renderer),
            Err(err) => {
                log::warn!("GPU init failed: {err}; using the CPU renderer");
                None
            }
        };

        Self {
            state,
            router: GestureRouter::new(config),
            tracker: TouchTracker::default(),
            tex: None,
            #[cfg(feature = "gpu")]
            gpu,
        }
    }

    fn render_frame(&mut self) -> Vec<u8> {
        #[cfg(feature = "gpu")]
        if let Some(gpu) = self.gpu.as_mut() {
            match gpu.render(&self.state) {
                Ok(pixels) => return pixels,
                Err(err) => {
                    log::warn!("GPU render failed, falling back to CPU: {err}");
                    self.gpu = None;
                }
            }
        }
        render::render_cpu(&self.state)
    }
}

impl App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                ui.heading("mandeltouch");
                ui.separator();
                ui.label(format!(
                    "zoom {:.2}  offset ({:.1}, {:.1})",
                    self.state.zoom, self.state.offset.x, self.state.offset.y
                ));
                ui.separator();
                if ui.button("Save View").clicked() {
                    save_view_dialog(&self.state);
                }
                if ui.button("Load View").clicked() {
                    if let Some(view) = open_view_dialog() {
                        self.state = view.sanitized();
                    }
                }
                if ui.button("Reset").clicked() {
                    let (w, h) = (self.state.width, self.state.height);
                    self.state = ViewportState::default();
                    self.state.set_surface_size(w, h);
                }
            });
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let rect = ui.available_rect_before_wrap();
                self.state
                    .set_surface_size(rect.width() as u32, rect.height() as u32);

                // Events are dispatched in arrival order, then one frame is
                // drawn from the settled state.
                let events = ctx.input(|i| i.events.clone());
                for event in self.tracker.feed(&events, rect) {
                    self.router.handle(&mut self.state, &event);
                }

                let pixels = self.render_frame();
                let image = ColorImage::from_rgba_unmultiplied(
                    [self.state.width as usize, self.state.height as usize],
                    &pixels,
                );
                let tex = self.tex.get_or_insert_with(|| {
                    ui.ctx()
                        .load_texture("fractal", image.clone(), egui::TextureOptions::LINEAR)
                });
                tex.set(image, egui::TextureOptions::LINEAR);
                ui.image((tex.id(), rect.size()));
            });
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, VIEW_STORAGE_KEY, &self.state);
    }
}

// ------------------------- Entry -------------------------

fn main() -> eframe::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Some(Cmd::Snapshot {
        out,
        width,
        height,
        zoom,
        offset_x,
        offset_y,
        view,
    }) = args.cmd
    {
        if let Err(err) = run_snapshot(&out, width, height, zoom, offset_x, offset_y, view.as_deref())
        {
            log::error!("snapshot failed: {err}");
            std::process::exit(1);
        }
        return Ok(());
    }

    let view = args.view.as_deref().and_then(|path| match load_view(path) {
        Ok(view) => Some(view),
        Err(err) => {
            log::warn!("could not load view {}: {err}", path.display());
            None
        }
    });
    let config = GestureConfig {
        touch_slop: args.touch_slop,
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 800.0])
            .with_min_inner_size([240.0, 320.0]),
        ..Default::default()
    };
    eframe::run_native(
        "mandeltouch",
        options,
        Box::new(move |cc| Box::new(ViewerApp::new(cc, view, config))),
    )
}

// ------------------------- Snapshot (headless) -------------------------

#[derive(thiserror::Error, Debug)]
enum SnapshotError {
    #[error("Image: {0}")]
    Image(#[from] image::ImageError),
    #[error("View file: {0}")]
    View(#[from] ViewFileError),
    #[error("Frame buffer size mismatch")]
    Buffer,
}

fn run_snapshot(
    out: &Path,
    width: u32,
    height: u32,
    zoom: f32,
    offset_x: f32,
    offset_y: f32,
    view: Option<&Path>,
) -> Result<(), SnapshotError> {
    let mut state = match view {
        Some(path) => load_view(path)?,
        None => ViewportState {
            offset: Vec2::new(offset_x, offset_y),
            zoom,
            width,
            height,
        }
        .sanitized(),
    };
    state.set_surface_size(width, height);

    let pixels = render::render_cpu(&state);
    let img =
        image::ImageBuffer::<image::Rgba<u8>, _>::from_raw(state.width, state.height, pixels)
            .ok_or(SnapshotError::Buffer)?;
    img.save(out)?;
    log::info!("wrote {}x{} snapshot to {}", state.width, state.height, out.display());
    Ok(())
}

// ------------------------- View IO -------------------------

#[derive(thiserror::Error, Debug)]
enum ViewFileError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

fn save_view_dialog(state: &ViewportState) {
    if let Some(path) = rfd::FileDialog::new()
        .add_filter("View", &["json", "toml"])
        .set_file_name("view.json")
        .save_file()
    {
        if let Err(err) = write_view(&path, state) {
            log::warn!("could not save view {}: {err}", path.display());
        }
    }
}

fn open_view_dialog() -> Option<ViewportState> {
    let file = rfd::FileDialog::new()
        .add_filter("View", &["json", "toml"])
        .pick_file()?;
    match load_view(&file) {
        Ok(view) => Some(view),
        Err(err) => {
            log::warn!("could not load view {}: {err}", file.display());
            None
        }
    }
}

fn write_view(path: &Path, state: &ViewportState) -> Result<(), ViewFileError> {
    let data = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::to_string_pretty(state)?,
        _ => serde_json::to_string_pretty(state)?,
    };
    fs::write(path, data)?;
    Ok(())
}

fn load_view(path: &Path) -> Result<ViewportState, ViewFileError> {
    let data = fs::read_to_string(path)?;
    let state: ViewportState = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&data)?,
        Some("json") => serde_json::from_str(&data)?,
        _ => serde_json::from_str(&data).or_else(|_| toml::from_str(&data))?,
    };
    Ok(state.sanitized())
}
