// src/cli.rs
use std::path::PathBuf;

use clap::Parser;

use crate::config::{ModelComplexity, PoseConfig, TrackerConfig};
use crate::trajectory::{video_output_file_name, WEBCAM_OUTPUT_FILE};

#[derive(Parser, Debug, Clone)]
#[command(name = "dance_tracker", version, about = "Track body pose from a webcam or video and log joint trajectories")]
pub struct Args {
    /// Camera device index (default 0)
    #[arg(long, conflicts_with = "video")]
    pub camera: Option<u32>,

    /// Video file to process instead of a camera
    #[arg(long)]
    pub video: Option<PathBuf>,

    /// Path to a BlazePose landmark ONNX model
    #[arg(long)]
    pub model: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ModelComplexity::Heavy)]
    pub model_complexity: ModelComplexity,

    /// Directory the trajectory files are written to
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Do not record or save trajectories
    #[arg(long)]
    pub no_save: bool,

    /// Process the video without opening a window
    #[arg(long, requires = "video")]
    pub no_display: bool,

    /// Also write a flat CSV next to every JSON save
    #[arg(long)]
    pub csv: bool,

    /// Run detection on every frame instead of tracking
    #[arg(long)]
    pub static_image_mode: bool,

    #[arg(long)]
    pub no_smoothing: bool,

    #[arg(long, default_value_t = 0.7, value_parser = parse_confidence)]
    pub min_detection_confidence: f32,

    #[arg(long, default_value_t = 0.5, value_parser = parse_confidence)]
    pub min_tracking_confidence: f32,

    /// Print the available cameras and exit
    #[arg(long)]
    pub list_cameras: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Camera(u32),
    Video(PathBuf),
}

fn parse_confidence(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("{} is not a number", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} is outside [0, 1]", value))
    }
}

impl Args {
    pub fn input(&self) -> InputSource {
        match &self.video {
            Some(path) => InputSource::Video(path.clone()),
            None => InputSource::Camera(self.camera.unwrap_or(0)),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        let file_name = match &self.video {
            Some(path) => video_output_file_name(path),
            None => WEBCAM_OUTPUT_FILE.to_string(),
        };
        self.output_dir.join(file_name)
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            pose: PoseConfig {
                model_path: self.model.clone(),
                model_complexity: self.model_complexity,
                static_image_mode: self.static_image_mode,
                smooth_landmarks: !self.no_smoothing,
                min_detection_confidence: self.min_detection_confidence,
                min_tracking_confidence: self.min_tracking_confidence,
            },
            save_data: !self.no_save,
            export_csv: self.csv,
            ..TrackerConfig::default()
        }
    }
}
