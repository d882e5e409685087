// src/tracker.rs - Per-frame pose processing and the headless video loop
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::landmark::{Pose, KEY_POINTS};
use crate::overlay::{draw_landmarks, OverlayStyle};
use crate::pose::PoseEstimator;
use crate::trajectory::TrajectoryRecorder;
use crate::video::VideoSource;

const METRICS_WINDOW: usize = 30;

#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub avg_fps: f32,
    pub avg_processing_time: f32,
    pub detection_rate: f32,
    frame_times: VecDeque<f32>,
    detections: VecDeque<bool>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(METRICS_WINDOW),
            detections: VecDeque::with_capacity(METRICS_WINDOW),
            ..Default::default()
        }
    }

    fn push(&mut self, elapsed: f32, detected: bool) {
        self.frame_times.push_front(elapsed);
        self.detections.push_front(detected);
        if self.frame_times.len() > METRICS_WINDOW {
            self.frame_times.pop_back();
            self.detections.pop_back();
        }

        self.avg_processing_time =
            self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.avg_fps = if self.avg_processing_time > 0.0 {
            1.0 / self.avg_processing_time
        } else {
            0.0
        };
        self.detection_rate = self.detections.iter().filter(|d| **d).count() as f32
            / self.detections.len() as f32;
    }
}

pub struct DanceTracker {
    estimator: Box<dyn PoseEstimator>,
    recorder: TrajectoryRecorder,
    style: OverlayStyle,
    save_data: bool,
    export_csv: bool,
    metrics: PerformanceMetrics,
}

impl DanceTracker {
    pub fn new(estimator: Box<dyn PoseEstimator>, config: &TrackerConfig) -> Self {
        Self {
            estimator,
            recorder: TrajectoryRecorder::new(&KEY_POINTS, config.visibility_threshold),
            style: OverlayStyle::default(),
            save_data: config.save_data,
            export_csv: config.export_csv,
            metrics: PerformanceMetrics::new(),
        }
    }

    pub fn save_data(&self) -> bool {
        self.save_data
    }

    /// Number of frames with a recorded pose.
    pub fn frame_count(&self) -> u64 {
        self.recorder.frame_count()
    }

    pub fn has_data(&self) -> bool {
        !self.recorder.is_empty()
    }

    pub fn recorder(&self) -> &TrajectoryRecorder {
        &self.recorder
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    /// Runs pose estimation on `frame`, draws the skeleton onto it and logs the
    /// trajectory entry. Estimator failures count as "no pose".
    pub fn process_frame(&mut self, frame: &mut RgbImage) -> Option<Pose> {
        let start = Instant::now();

        let pose = match self.estimator.estimate(frame) {
            Ok(pose) => pose,
            Err(e) => {
                warn!("Pose estimation failed: {:#}", e);
                self.estimator.reset();
                None
            }
        };

        if let Some(pose) = &pose {
            draw_landmarks(frame, pose, &self.style);
            if self.save_data {
                let (width, height) = frame.dimensions();
                self.recorder.record(pose, width, height);
            }
        }

        self.metrics.push(start.elapsed().as_secs_f32(), pose.is_some());
        pose
    }

    /// Saves the JSON log (and the CSV export when enabled). Write failures are
    /// logged rather than returned so an interactive session keeps running.
    pub fn save_trajectory_data(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let path = path.as_ref();
        let saved = match self.recorder.save_json(path) {
            Ok(saved) => saved,
            Err(e) => {
                error!("Failed to save trajectory data: {:#}", e);
                return None;
            }
        };

        if saved.is_some() && self.export_csv {
            if let Err(e) = self.recorder.export_csv(path.with_extension("csv")) {
                error!("Failed to export trajectory CSV: {:#}", e);
            }
        }
        saved
    }
}

/// Processes every frame of `source` without a window, then saves to `output`.
pub fn run_headless(
    tracker: &mut DanceTracker,
    source: &mut VideoSource,
    output: &Path,
    progress_interval: u64,
) -> Result<Option<PathBuf>> {
    let total = source
        .info()
        .frame_count
        .map(|n| n.to_string())
        .unwrap_or_else(|| "?".to_string());

    let mut frames_read: u64 = 0;
    loop {
        let mut frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                debug!("Frame read failed, stopping: {:#}", e);
                break;
            }
        };
        frames_read += 1;

        tracker.process_frame(&mut frame);

        if progress_interval > 0 && frames_read % progress_interval == 0 {
            info!("Processed {}/{} frames", frames_read, total);
        }
    }

    info!(
        "Finished after {} frames ({} with a pose)",
        frames_read,
        tracker.frame_count()
    );

    if tracker.save_data() {
        Ok(tracker.save_trajectory_data(output))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{BodyPart, Landmark, NUM_LANDMARKS};
    use crate::trajectory::TrajectoryDocument;
    use anyhow::anyhow;

    /// Replays a fixed sequence of estimator results.
    struct ScriptedEstimator {
        script: VecDeque<Result<Option<Pose>>>,
    }

    impl ScriptedEstimator {
        fn new(script: Vec<Result<Option<Pose>>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl PoseEstimator for ScriptedEstimator {
        fn estimate(&mut self, _frame: &RgbImage) -> Result<Option<Pose>> {
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    fn standing_pose() -> Pose {
        let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.0, 0.2); NUM_LANDMARKS];
        landmarks[BodyPart::LeftShoulder.index()] = Landmark::new(0.4, 0.3, -0.1, 0.95);
        landmarks[BodyPart::RightShoulder.index()] = Landmark::new(0.6, 0.3, -0.1, 0.95);
        landmarks[BodyPart::Nose.index()] = Landmark::new(0.5, 0.2, -0.2, 0.5);
        Pose { landmarks, score: 0.9 }
    }

    #[test]
    fn detection_is_drawn_and_recorded() {
        let estimator = ScriptedEstimator::new(vec![Ok(Some(standing_pose()))]);
        let mut tracker = DanceTracker::new(Box::new(estimator), &TrackerConfig::default());
        let mut frame = RgbImage::new(100, 100);

        assert!(tracker.process_frame(&mut frame).is_some());
        assert_eq!(tracker.frame_count(), 1);
        assert!(frame.pixels().any(|p| p.0 != [0, 0, 0]));

        let record = &tracker.recorder().document().trajectories[&0];
        assert_eq!(record.points.len(), 2);
        assert_eq!(record.points.get("left_shoulder").unwrap().x, 40);
        // exactly at the threshold is not visible enough
        assert!(record.points.get("nose").is_none());
    }

    #[test]
    fn frames_without_pose_do_not_advance_index() {
        let estimator = ScriptedEstimator::new(vec![
            Ok(Some(standing_pose())),
            Ok(None),
            Err(anyhow!("bad tensor")),
            Ok(Some(standing_pose())),
        ]);
        let mut tracker = DanceTracker::new(Box::new(estimator), &TrackerConfig::default());

        for _ in 0..4 {
            tracker.process_frame(&mut RgbImage::new(50, 50));
        }

        assert_eq!(tracker.frame_count(), 2);
        let keys: Vec<u64> = tracker.recorder().document().trajectories.keys().copied().collect();
        assert_eq!(keys, vec![0, 1]);
        assert!((tracker.metrics().detection_rate - 0.5).abs() < 1e-6);
    }

    #[test]
    fn save_disabled_keeps_log_empty() {
        let config = TrackerConfig {
            save_data: false,
            ..TrackerConfig::default()
        };
        let estimator = ScriptedEstimator::new(vec![Ok(Some(standing_pose()))]);
        let mut tracker = DanceTracker::new(Box::new(estimator), &config);

        tracker.process_frame(&mut RgbImage::new(20, 20));
        assert!(!tracker.has_data());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dance_trajectories.json");
        assert!(tracker.save_trajectory_data(&path).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn save_writes_json_and_optional_csv() {
        let config = TrackerConfig {
            export_csv: true,
            ..TrackerConfig::default()
        };
        let estimator = ScriptedEstimator::new((0..3).map(|_| Ok(Some(standing_pose()))).collect());
        let mut tracker = DanceTracker::new(Box::new(estimator), &config);
        for _ in 0..3 {
            tracker.process_frame(&mut RgbImage::new(64, 48));
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip_trajectories.json");
        assert_eq!(tracker.save_trajectory_data(&path), Some(path.clone()));

        let doc = TrajectoryDocument::load(&path).unwrap();
        assert_eq!(doc.metadata.total_frames, 3);
        assert_eq!(doc.trajectories.len(), 3);
        assert!(dir.path().join("clip_trajectories.csv").exists());
    }

    #[test]
    fn failed_save_is_logged_and_session_continues() {
        let config = TrackerConfig {
            export_csv: true,
            ..TrackerConfig::default()
        };
        let estimator = ScriptedEstimator::new((0..2).map(|_| Ok(Some(standing_pose()))).collect());
        let mut tracker = DanceTracker::new(Box::new(estimator), &config);
        tracker.process_frame(&mut RgbImage::new(40, 40));

        // parent of the target is a regular file, so the write cannot succeed
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();
        let bad_path = blocker.join("dance_trajectories.json");
        assert!(tracker.save_trajectory_data(&bad_path).is_none());
        assert!(!bad_path.exists());

        assert!(tracker.process_frame(&mut RgbImage::new(40, 40)).is_some());
        assert_eq!(tracker.frame_count(), 2);

        let good_path = dir.path().join("dance_trajectories.json");
        assert_eq!(tracker.save_trajectory_data(&good_path), Some(good_path.clone()));
        let doc = TrajectoryDocument::load(&good_path).unwrap();
        assert_eq!(doc.metadata.total_frames, 2);
        assert!(dir.path().join("dance_trajectories.csv").exists());
    }
}
