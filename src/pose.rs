// src/pose.rs - BlazePose landmark model running on ONNX Runtime
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use image::RgbImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use crate::config::PoseConfig;
use crate::error::TrackerError;
use crate::landmark::{Landmark, Pose, NUM_LANDMARKS};
use crate::smoothing::LandmarkSmoother;

/// Side length of the square model input for every BlazePose variant.
pub const INPUT_SIZE: u32 = 256;

/// Values per landmark in the raw model output: x, y, z, visibility, presence.
const LANDMARK_STRIDE: usize = 5;

/// Expansion applied to the previous pose's bounding box when tracking.
const ROI_SCALE: f32 = 1.25;

pub trait PoseEstimator {
    /// Returns the pose found in `frame`, or `None` when nobody is detected.
    fn estimate(&mut self, frame: &RgbImage) -> Result<Option<Pose>>;

    /// Drops any state carried between frames.
    fn reset(&mut self) {}
}

/// Square region of the frame fed to the model, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub cx: f32,
    pub cy: f32,
    pub size: f32,
}

impl Roi {
    /// Square centred on the frame that covers all of it; the short side is letterboxed.
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            cx: width as f32 / 2.0,
            cy: height as f32 / 2.0,
            size: width.max(height) as f32,
        }
    }

    /// Square around the bounding box of normalized `landmarks`.
    pub fn from_landmarks(landmarks: &[Landmark], width: u32, height: u32) -> Option<Self> {
        let (w, h) = (width as f32, height as f32);
        let mut min = (f32::MAX, f32::MAX);
        let mut max = (f32::MIN, f32::MIN);
        for lm in landmarks.iter().take(NUM_LANDMARKS) {
            let (x, y) = (lm.x * w, lm.y * h);
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }

        let size = (max.0 - min.0).max(max.1 - min.1) * ROI_SCALE;
        if !size.is_finite() || size < 1.0 {
            return None;
        }

        Some(Self {
            cx: (min.0 + max.0) / 2.0,
            cy: (min.1 + max.1) / 2.0,
            size,
        })
    }

    fn left(&self) -> f32 {
        self.cx - self.size / 2.0
    }

    fn top(&self) -> f32 {
        self.cy - self.size / 2.0
    }

    /// Maps a point in model-input pixels back to frame-normalized coordinates.
    pub fn to_frame(&self, x: f32, y: f32, z: f32, width: u32, height: u32) -> (f32, f32, f32) {
        let scale = self.size / INPUT_SIZE as f32;
        (
            (self.left() + x * scale) / width as f32,
            (self.top() + y * scale) / height as f32,
            z * scale / width as f32,
        )
    }
}

/// Samples `roi` out of `frame` into an NHWC tensor scaled to [0, 1].
/// Nearest-neighbour sampling; pixels outside the frame stay black.
pub fn prepare_input(frame: &RgbImage, roi: &Roi, input_size: u32) -> Array4<f32> {
    let n = input_size as usize;
    let mut input = Array4::<f32>::zeros((1, n, n, 3));
    let (width, height) = frame.dimensions();
    let scale = roi.size / input_size as f32;

    for v in 0..n {
        let sy = (roi.top() + (v as f32 + 0.5) * scale).floor();
        if sy < 0.0 || sy >= height as f32 {
            continue;
        }
        for u in 0..n {
            let sx = (roi.left() + (u as f32 + 0.5) * scale).floor();
            if sx < 0.0 || sx >= width as f32 {
                continue;
            }
            let pixel = frame.get_pixel(sx as u32, sy as u32);
            for c in 0..3 {
                input[[0, v, u, c]] = pixel[c] as f32 / 255.0;
            }
        }
    }

    input
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Turns the flat landmark tensor into frame-normalized landmarks.
pub fn decode_landmarks(
    raw: &[f32],
    score: f32,
    roi: &Roi,
    width: u32,
    height: u32,
) -> Result<Pose, TrackerError> {
    if raw.len() < NUM_LANDMARKS * LANDMARK_STRIDE {
        return Err(TrackerError::ModelOutput(format!(
            "expected at least {} landmark values, got {}",
            NUM_LANDMARKS * LANDMARK_STRIDE,
            raw.len()
        )));
    }

    let landmarks = raw
        .chunks_exact(LANDMARK_STRIDE)
        .take(NUM_LANDMARKS)
        .map(|v| {
            let (x, y, z) = roi.to_frame(v[0], v[1], v[2], width, height);
            Landmark {
                x,
                y,
                z,
                visibility: sigmoid(v[3]),
                presence: sigmoid(v[4]),
            }
        })
        .collect();

    Ok(Pose { landmarks, score })
}

fn model_search_paths(config: &PoseConfig) -> Vec<PathBuf> {
    if let Some(path) = &config.model_path {
        return vec![path.clone()];
    }

    let file_name = config.model_complexity.model_file_name();
    let mut paths = vec![Path::new("models").join(file_name)];
    if let Some(dirs) = ProjectDirs::from("com", "dancetracker", "DanceTracker") {
        paths.push(dirs.data_dir().join("models").join(file_name));
    }
    paths
}

pub fn resolve_model_path(config: &PoseConfig) -> Result<PathBuf, TrackerError> {
    let candidates = model_search_paths(config);
    match candidates.iter().find(|p| p.is_file()) {
        Some(path) => Ok(path.clone()),
        None => Err(TrackerError::ModelNotFound(candidates)),
    }
}

pub struct BlazePoseEstimator {
    session: Session,
    static_image_mode: bool,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    roi: Option<Roi>,
    smoother: Option<LandmarkSmoother>,
}

impl BlazePoseEstimator {
    pub fn new(config: &PoseConfig, fps: f64) -> Result<Self> {
        let model_path = resolve_model_path(config)?;
        info!("Loading pose model from {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&model_path)
            .with_context(|| format!("Failed to load pose model {}", model_path.display()))?;

        let smoother = (config.smooth_landmarks && !config.static_image_mode)
            .then(|| LandmarkSmoother::new(fps));

        Ok(Self {
            session,
            static_image_mode: config.static_image_mode,
            min_detection_confidence: config.min_detection_confidence,
            min_tracking_confidence: config.min_tracking_confidence,
            roi: None,
            smoother,
        })
    }

    fn infer(&mut self, frame: &RgbImage, roi: &Roi) -> Result<Pose> {
        let input = prepare_input(frame, roi, INPUT_SIZE);
        let input_tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .context("Pose inference failed")?;

        if outputs.len() < 2 {
            return Err(TrackerError::ModelOutput(format!(
                "expected landmark and pose-flag outputs, got {} output(s)",
                outputs.len()
            ))
            .into());
        }

        let first: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let second: Vec<f32> = outputs[1].try_extract_array::<f32>()?.iter().copied().collect();
        let (raw, flag) = if first.len() >= second.len() {
            (first, second)
        } else {
            (second, first)
        };

        let score = flag
            .first()
            .copied()
            .ok_or_else(|| TrackerError::ModelOutput("empty pose-flag output".into()))?;
        let (width, height) = frame.dimensions();
        Ok(decode_landmarks(&raw, score, roi, width, height)?)
    }

    fn accept(&mut self, mut pose: Pose, width: u32, height: u32) -> Pose {
        if !self.static_image_mode {
            self.roi = Roi::from_landmarks(&pose.landmarks, width, height);
        }
        if let Some(smoother) = self.smoother.as_mut() {
            smoother.smooth(&mut pose.landmarks);
        }
        pose
    }
}

impl PoseEstimator for BlazePoseEstimator {
    fn estimate(&mut self, frame: &RgbImage) -> Result<Option<Pose>> {
        let (width, height) = frame.dimensions();

        if let Some(roi) = self.roi.take() {
            let pose = self.infer(frame, &roi)?;
            if pose.score >= self.min_tracking_confidence {
                return Ok(Some(self.accept(pose, width, height)));
            }
            debug!("Tracking lost (score {:.2}), re-detecting on full frame", pose.score);
        }

        let pose = self.infer(frame, &Roi::full_frame(width, height))?;
        if pose.score >= self.min_detection_confidence {
            return Ok(Some(self.accept(pose, width, height)));
        }

        if let Some(smoother) = self.smoother.as_mut() {
            smoother.reset();
        }
        Ok(None)
    }

    fn reset(&mut self) {
        self.roi = None;
        if let Some(smoother) = self.smoother.as_mut() {
            smoother.reset();
        }
    }
}
