// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("pose model not found, searched: {}", format_paths(.0))]
    ModelNotFound(Vec<PathBuf>),

    #[error("unexpected pose model output: {0}")]
    ModelOutput(String),

    #[error("video file does not exist: {0}")]
    VideoNotFound(PathBuf),

    #[error("invalid video metadata: {0}")]
    InvalidVideo(String),

    #[error("{0} is not installed or not in PATH")]
    FfmpegMissing(&'static str),

    #[error("camera error: {0}")]
    Camera(String),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_not_found_lists_every_path() {
        let err = TrackerError::ModelNotFound(vec![
            PathBuf::from("models/pose_landmark_heavy.onnx"),
            PathBuf::from("/data/models/pose_landmark_heavy.onnx"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("models/pose_landmark_heavy.onnx, /data/models/pose_landmark_heavy.onnx"));
    }
}
