// src/trajectory.rs
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use csv::Writer;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use crate::landmark::{BodyPart, Pose};

pub const WEBCAM_OUTPUT_FILE: &str = "dance_trajectories.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub x: i32,
    pub y: i32,
    pub z: f32,
    pub visibility: f32,
}

/// Named points kept in tracking order; written as a JSON object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointMap(Vec<(String, PointRecord)>);

impl PointMap {
    pub fn insert(&mut self, name: &str, point: PointRecord) {
        self.0.push((name.to_string(), point));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PointRecord)> {
        self.0.iter().map(|(name, point)| (name.as_str(), point))
    }
}

#[cfg(test)]
impl PointMap {
    pub fn get(&self, name: &str) -> Option<&PointRecord> {
        self.iter().find(|(n, _)| *n == name).map(|(_, point)| point)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.iter().map(|(name, _)| name).collect()
    }
}

impl Serialize for PointMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

struct PointMapVisitor;

impl<'de> Visitor<'de> for PointMapVisitor {
    type Value = PointMap;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of point names to points")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<PointMap, A::Error> {
        let mut points = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(entry) = access.next_entry::<String, PointRecord>()? {
            points.push(entry);
        }
        Ok(PointMap(points))
    }
}

impl<'de> Deserialize<'de> for PointMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PointMapVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub timestamp: f64,
    pub points: PointMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub total_frames: u64,
    pub duration: f64,
    pub tracked_points: Vec<String>,
}

/// On-disk layout of a saved session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryDocument {
    pub metadata: Metadata,
    pub trajectories: BTreeMap<u64, FrameRecord>,
}

#[cfg(test)]
impl TrajectoryDocument {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    frame: u64,
    timestamp: f64,
    point: &'a str,
    x: i32,
    y: i32,
    z: f32,
    visibility: f32,
}

/// `<name>_trajectories.json`, where `<name>` is the file name up to its first dot.
pub fn video_output_file_name(video_path: &Path) -> String {
    let file_name = video_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.split('.').next().unwrap_or_default();
    format!("{}_trajectories.json", stem)
}

pub struct TrajectoryRecorder {
    key_points: Vec<BodyPart>,
    visibility_threshold: f32,
    trajectories: BTreeMap<u64, FrameRecord>,
    frame_count: u64,
    start: Instant,
}

impl TrajectoryRecorder {
    pub fn new(key_points: &[BodyPart], visibility_threshold: f32) -> Self {
        Self {
            key_points: key_points.to_vec(),
            visibility_threshold,
            trajectories: BTreeMap::new(),
            frame_count: 0,
            start: Instant::now(),
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Appends the visible key points of `pose` in pixel space, stamped with the session clock.
    pub fn record(&mut self, pose: &Pose, width: u32, height: u32) -> &FrameRecord {
        let timestamp = self.elapsed();
        self.record_at(pose, width, height, timestamp)
    }

    pub fn record_at(&mut self, pose: &Pose, width: u32, height: u32, timestamp: f64) -> &FrameRecord {
        let mut points = PointMap::default();
        for part in &self.key_points {
            let Some(lm) = pose.get(*part) else {
                continue;
            };
            // NaN scores must not pass
            if lm.visibility.is_nan() || lm.visibility <= self.visibility_threshold {
                continue;
            }
            points.insert(
                part.name(),
                PointRecord {
                    x: (lm.x as f64 * width as f64) as i32,
                    y: (lm.y as f64 * height as f64) as i32,
                    z: lm.z,
                    visibility: lm.visibility,
                },
            );
        }

        let frame = self.frame_count;
        self.frame_count += 1;
        self.trajectories
            .entry(frame)
            .or_insert(FrameRecord {
                frame,
                timestamp,
                points,
            })
    }

    pub fn document(&self) -> TrajectoryDocument {
        TrajectoryDocument {
            metadata: Metadata {
                total_frames: self.frame_count,
                duration: self.elapsed(),
                tracked_points: self.key_points.iter().map(|p| p.name().to_string()).collect(),
            },
            trajectories: self.trajectories.clone(),
        }
    }

    /// Writes the session as pretty JSON. Returns `None` without touching the
    /// filesystem when nothing has been recorded.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        let path = path.as_ref();
        if self.is_empty() {
            info!("No trajectory data to save");
            return Ok(None);
        }

        let document = self.document();
        let mut writer = BufWriter::new(create_file(path)?);
        serde_json::to_writer_pretty(&mut writer, &document)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        writer.flush()?;

        info!("Trajectory data saved to {}", path.display());
        info!(
            "Captured {} frames over {:.2} seconds",
            document.metadata.total_frames, document.metadata.duration
        );
        Ok(Some(path.to_path_buf()))
    }

    /// One row per recorded point, for spreadsheet-style analysis.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        let path = path.as_ref();
        if self.is_empty() {
            return Ok(None);
        }

        let mut writer = Writer::from_writer(create_file(path)?);
        for record in self.trajectories.values() {
            for (name, point) in record.points.iter() {
                writer.serialize(CsvRow {
                    frame: record.frame,
                    timestamp: record.timestamp,
                    point: name,
                    x: point.x,
                    y: point.y,
                    z: point.z,
                    visibility: point.visibility,
                })?;
            }
        }
        writer.flush()?;

        info!("Trajectory CSV saved to {}", path.display());
        Ok(Some(path.to_path_buf()))
    }
}

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{Landmark, KEY_POINTS, NUM_LANDMARKS};

    fn pose_with(points: &[(BodyPart, Landmark)]) -> Pose {
        let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.0, 0.0); NUM_LANDMARKS];
        for (part, lm) in points {
            landmarks[part.index()] = *lm;
        }
        Pose { landmarks, score: 1.0 }
    }

    #[test]
    fn low_visibility_points_are_dropped() {
        let mut recorder = TrajectoryRecorder::new(&KEY_POINTS, 0.5);
        let pose = pose_with(&[
            (BodyPart::LeftWrist, Landmark::new(0.1, 0.2, 0.0, 0.9)),
            (BodyPart::RightWrist, Landmark::new(0.3, 0.4, 0.0, 0.5)),
            (BodyPart::Nose, Landmark::new(0.5, 0.1, 0.0, 0.51)),
        ]);

        let record = recorder.record(&pose, 640, 480);
        assert_eq!(record.points.names(), vec!["left_wrist", "nose"]);
    }

    #[test]
    fn nan_visibility_is_dropped() {
        let mut recorder = TrajectoryRecorder::new(&KEY_POINTS, 0.5);
        let pose = pose_with(&[
            (BodyPart::LeftWrist, Landmark::new(0.5, 0.5, 0.0, f32::NAN)),
            (BodyPart::RightWrist, Landmark::new(0.5, 0.5, 0.0, 0.9)),
        ]);

        let record = recorder.record(&pose, 640, 480);
        assert!(record.points.get("left_wrist").is_none());
        assert_eq!(record.points.names(), vec!["right_wrist"]);
    }

    #[test]
    fn points_keep_tracking_order() {
        let mut recorder = TrajectoryRecorder::new(&KEY_POINTS, 0.5);
        let pose = pose_with(&[
            (BodyPart::Nose, Landmark::new(0.5, 0.1, 0.0, 0.9)),
            (BodyPart::RightAnkle, Landmark::new(0.6, 0.9, 0.0, 0.9)),
            (BodyPart::LeftWrist, Landmark::new(0.3, 0.5, 0.0, 0.9)),
            (BodyPart::LeftHeel, Landmark::new(0.4, 0.95, 0.0, 0.9)),
        ]);

        let record = recorder.record(&pose, 100, 100).clone();
        assert_eq!(
            record.points.names(),
            vec!["left_wrist", "right_ankle", "nose", "left_heel"]
        );

        let json = serde_json::to_string(&record).unwrap();
        let wrist = json.find("left_wrist").unwrap();
        let ankle = json.find("right_ankle").unwrap();
        let nose = json.find("\"nose\"").unwrap();
        assert!(wrist < ankle && ankle < nose);

        let back: FrameRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn pixel_coordinates_are_truncated() {
        let mut recorder = TrajectoryRecorder::new(&KEY_POINTS, 0.5);
        let pose = pose_with(&[(BodyPart::LeftKnee, Landmark::new(0.4999, 0.7501, -0.25, 0.8))]);

        let record = recorder.record_at(&pose, 641, 479, 1.5);
        let knee = record.points.get("left_knee").unwrap();
        assert_eq!(knee.x, (0.4999f32 as f64 * 641.0) as i32);
        assert_eq!(knee.x, 320);
        assert_eq!(knee.y, 359);
        assert_eq!(knee.z, -0.25);
        assert_eq!(record.timestamp, 1.5);
    }

    #[test]
    fn negative_coordinates_truncate_toward_zero() {
        let mut recorder = TrajectoryRecorder::new(&KEY_POINTS, 0.5);
        let pose = pose_with(&[(BodyPart::LeftWrist, Landmark::new(-0.0031, -0.001, 0.0, 0.9))]);

        let record = recorder.record_at(&pose, 640, 480, 0.0);
        let wrist = record.points.get("left_wrist").unwrap();
        assert_eq!(wrist.x, -1);
        assert_eq!(wrist.y, 0);
    }

    #[test]
    fn untracked_parts_are_ignored() {
        let mut recorder = TrajectoryRecorder::new(&[BodyPart::Nose], 0.5);
        let pose = pose_with(&[
            (BodyPart::Nose, Landmark::new(0.5, 0.5, 0.0, 0.9)),
            (BodyPart::LeftEar, Landmark::new(0.6, 0.5, 0.0, 0.9)),
        ]);
        assert_eq!(recorder.record(&pose, 100, 100).points.len(), 1);
    }

    #[test]
    fn empty_session_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join(WEBCAM_OUTPUT_FILE);
        let recorder = TrajectoryRecorder::new(&KEY_POINTS, 0.5);

        assert!(recorder.save_json(&path).unwrap().is_none());
        assert!(recorder.export_csv(path.with_extension("csv")).unwrap().is_none());
        assert!(!path.exists());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn saved_metadata_counts_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(WEBCAM_OUTPUT_FILE);
        let mut recorder = TrajectoryRecorder::new(&KEY_POINTS, 0.5);
        let pose = pose_with(&[(BodyPart::LeftHip, Landmark::new(0.5, 0.6, 0.1, 0.95))]);
        for _ in 0..3 {
            recorder.record(&pose, 200, 100);
        }

        let saved = recorder.save_json(&path).unwrap();
        assert_eq!(saved.as_deref(), Some(path.as_path()));

        let doc = TrajectoryDocument::load(&path).unwrap();
        assert_eq!(doc.metadata.total_frames, 3);
        assert_eq!(doc.metadata.total_frames as usize, doc.trajectories.len());
        assert_eq!(doc.metadata.tracked_points.len(), KEY_POINTS.len());
        assert_eq!(doc.metadata.tracked_points[0], "left_wrist");
        assert!(doc.metadata.duration >= doc.trajectories[&2].timestamp);
        assert_eq!(doc.trajectories[&1].frame, 1);
        assert_eq!(doc.trajectories[&1].points.get("left_hip").unwrap().x, 100);

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["trajectories"]["0"]["points"]["left_hip"]["visibility"].is_number());
    }

    #[test]
    fn csv_has_one_row_per_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.csv");
        let mut recorder = TrajectoryRecorder::new(&KEY_POINTS, 0.5);
        let pose = pose_with(&[
            (BodyPart::LeftAnkle, Landmark::new(0.2, 0.9, 0.0, 0.9)),
            (BodyPart::RightAnkle, Landmark::new(0.8, 0.9, 0.0, 0.9)),
        ]);
        recorder.record(&pose, 100, 100);
        recorder.record(&pose, 100, 100);

        recorder.export_csv(&path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("frame,timestamp,point,x,y,z,visibility"));
        assert_eq!(lines.count(), 4);
    }

    #[test]
    fn video_output_name_stops_at_first_dot() {
        assert_eq!(
            video_output_file_name(Path::new("content/cunningham.mp4")),
            "cunningham_trajectories.json"
        );
        assert_eq!(
            video_output_file_name(Path::new("/tmp/clip.v2.mov")),
            "clip_trajectories.json"
        );
    }
}
