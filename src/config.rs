// src/config.rs
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ModelComplexity {
    Lite,
    Full,
    #[default]
    Heavy,
}

impl ModelComplexity {
    pub fn model_file_name(self) -> &'static str {
        match self {
            ModelComplexity::Lite => "pose_landmark_lite.onnx",
            ModelComplexity::Full => "pose_landmark_full.onnx",
            ModelComplexity::Heavy => "pose_landmark_heavy.onnx",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoseConfig {
    /// Explicit model path; searched for by file name when unset.
    pub model_path: Option<PathBuf>,
    pub model_complexity: ModelComplexity,
    /// Treat every frame independently instead of tracking a region of interest.
    pub static_image_mode: bool,
    pub smooth_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_complexity: ModelComplexity::Heavy,
            static_image_mode: false,
            smooth_landmarks: true,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub pose: PoseConfig,
    pub save_data: bool,
    pub export_csv: bool,
    pub visibility_threshold: f32,
    pub progress_interval: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            pose: PoseConfig::default(),
            save_data: true,
            export_csv: false,
            visibility_threshold: 0.5,
            progress_interval: 30,
        }
    }
}
