// src/app.rs
use std::path::PathBuf;

use eframe::egui;
use tracing::{debug, info};

use crate::tracker::DanceTracker;
use crate::ui::{create_visuals, Theme, VideoWidget};
use crate::video::VideoSource;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppMode {
    Webcam,
    VideoFile,
}

pub struct DanceTrackerApp {
    tracker: DanceTracker,
    source: VideoSource,
    mode: AppMode,
    output_path: PathBuf,

    // Progress
    frames_read: u64,
    total_frames: Option<u64>,
    progress_interval: u64,
    finished: bool,
    exit_saved: bool,
    last_save: Option<PathBuf>,

    video_widget: VideoWidget,
    theme: Theme,
}

impl DanceTrackerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        tracker: DanceTracker,
        source: VideoSource,
        mode: AppMode,
        output_path: PathBuf,
        progress_interval: u64,
    ) -> Self {
        cc.egui_ctx.set_visuals(create_visuals());
        let total_frames = source.info().frame_count;

        Self {
            tracker,
            source,
            mode,
            output_path,
            frames_read: 0,
            total_frames,
            progress_interval,
            finished: false,
            exit_saved: false,
            last_save: None,
            video_widget: VideoWidget::new(),
            theme: Theme::default(),
        }
    }

    /// Reads, processes and uploads one frame. End of stream finishes the session.
    fn step(&mut self, ctx: &egui::Context) {
        let mut frame = match self.source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("End of stream");
                self.finished = true;
                return;
            }
            Err(e) => {
                debug!("Frame read failed, stopping: {:#}", e);
                self.finished = true;
                return;
            }
        };
        self.frames_read += 1;

        self.tracker.process_frame(&mut frame);
        self.video_widget.update_frame(ctx, &frame);

        if self.mode == AppMode::VideoFile
            && self.progress_interval > 0
            && self.frames_read % self.progress_interval == 0
        {
            info!("Processed {}/{} frames", self.frames_read, self.total_label());
        }
    }

    fn save_now(&mut self) {
        if let Some(path) = self.tracker.save_trajectory_data(&self.output_path) {
            self.last_save = Some(path);
        }
    }

    /// Final save when the window goes away; runs at most once.
    fn finish(&mut self) {
        if self.exit_saved {
            return;
        }
        self.exit_saved = true;

        // webcam sessions stay quiet when nothing was captured
        let should_save = match self.mode {
            AppMode::Webcam => self.tracker.save_data() && self.tracker.has_data(),
            AppMode::VideoFile => self.tracker.save_data(),
        };
        if should_save {
            self.save_now();
        }
    }

    fn total_label(&self) -> String {
        self.total_frames
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string())
    }

    fn render_header(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                let instructions = match self.mode {
                    AppMode::Webcam => "Dance Tracking - Press 'q' to quit, 's' to save",
                    AppMode::VideoFile => "Dance Tracking - Press 'q' to quit",
                };
                ui.label(egui::RichText::new(instructions).color(self.theme.text_primary));

                ui.separator();
                ui.label(
                    egui::RichText::new(format!("Frames: {}", self.tracker.frame_count()))
                        .color(self.theme.success),
                );
                ui.label(format!("{:.1}s", self.tracker.recorder().elapsed()));

                if self.mode == AppMode::VideoFile {
                    ui.separator();
                    ui.label(format!("Read {}/{}", self.frames_read, self.total_label()));
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let metrics = self.tracker.metrics();
                    let detection_color = if metrics.detection_rate > 0.5 {
                        self.theme.success
                    } else {
                        self.theme.warning
                    };
                    ui.label(
                        egui::RichText::new(format!("{:.0}% detected", metrics.detection_rate * 100.0))
                            .color(detection_color),
                    );
                    ui.label(
                        egui::RichText::new(format!(
                            "{:.1} fps ({:.0} ms)",
                            metrics.avg_fps,
                            metrics.avg_processing_time * 1000.0
                        ))
                        .color(self.theme.text_secondary),
                    );
                });
            });

            if let Some(path) = &self.last_save {
                ui.label(
                    egui::RichText::new(format!("Saved to {}", path.display()))
                        .color(self.theme.primary),
                );
            }
            ui.add_space(6.0);
        });
    }
}

impl eframe::App for DanceTrackerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let (quit, save) = ctx.input(|i| (i.key_pressed(egui::Key::Q), i.key_pressed(egui::Key::S)));

        if save && self.mode == AppMode::Webcam {
            self.save_now();
        }
        if quit {
            self.finished = true;
        }

        if !self.finished {
            self.step(ctx);
        }

        self.render_header(ctx);
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(self.theme.surface))
            .show(ctx, |ui| self.video_widget.show(ui));

        if self.finished {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        } else {
            ctx.request_repaint();
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.finish();
    }
}
