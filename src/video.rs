// src/video.rs - Frame sources: live camera or decoded video file
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use anyhow::{Context, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use tracing::{debug, info, warn};

use crate::error::TrackerError;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Unknown for cameras and for containers that do not store it.
    pub frame_count: Option<u64>,
}

pub enum VideoSource {
    Camera(CameraSource),
    File(VideoFileReader),
}

pub struct CameraSource {
    camera: Camera,
}

pub struct VideoFileReader {
    info: VideoInfo,
    decoder: Child,
    stdout: ChildStdout,
}

/// Parses `ffprobe -show_entries stream=width,height,r_frame_rate,nb_frames -of csv=p=0`.
pub fn parse_probe_output(output: &str) -> Result<VideoInfo, TrackerError> {
    let parts: Vec<&str> = output.trim().split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return Err(TrackerError::InvalidVideo(format!(
            "unexpected ffprobe output: {:?}",
            output.trim()
        )));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|_| TrackerError::InvalidVideo(format!("invalid width {:?}", parts[0])))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|_| TrackerError::InvalidVideo(format!("invalid height {:?}", parts[1])))?;
    if width == 0 || height == 0 {
        return Err(TrackerError::InvalidVideo(format!("empty frame size {}x{}", width, height)));
    }

    let fps = parse_frame_rate(parts[2]).unwrap_or(30.0);
    let frame_count = parts.get(3).and_then(|s| s.parse::<u64>().ok()).filter(|n| *n > 0);

    Ok(VideoInfo {
        width,
        height,
        fps,
        frame_count,
    })
}

fn parse_frame_rate(s: &str) -> Option<f64> {
    let fps = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

fn ensure_tool(name: &'static str) -> Result<(), TrackerError> {
    match Command::new(name).arg("-version").output() {
        Ok(_) => Ok(()),
        Err(_) => Err(TrackerError::FfmpegMissing(name)),
    }
}

impl VideoFileReader {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(TrackerError::VideoNotFound(path).into());
        }
        ensure_tool("ffprobe")?;
        ensure_tool("ffmpeg")?;

        let output = Command::new("ffprobe")
            .args([
                "-v", "error",
                "-select_streams", "v:0",
                "-show_entries", "stream=width,height,r_frame_rate,nb_frames",
                "-of", "csv=p=0",
            ])
            .arg(&path)
            .output()
            .context("Failed to run ffprobe")?;
        let info = parse_probe_output(&String::from_utf8_lossy(&output.stdout))?;

        // Raw RGB frames on stdout, one width*height*3 block per frame
        let mut decoder = Command::new("ffmpeg")
            .args(["-v", "error", "-noautorotate", "-i"])
            .arg(&path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to start ffmpeg decoder")?;
        let stdout = decoder
            .stdout
            .take()
            .context("ffmpeg decoder has no stdout")?;

        Ok(Self {
            info,
            decoder,
            stdout,
        })
    }

    /// Next decoded frame, or `None` once the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let len = self.info.width as usize * self.info.height as usize * 3;
        let mut buffer = vec![0u8; len];
        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e).context("Failed to read decoded frame"),
        }

        let frame = RgbImage::from_raw(self.info.width, self.info.height, buffer)
            .context("Decoded frame has the wrong size")?;
        Ok(Some(frame))
    }
}

impl Drop for VideoFileReader {
    fn drop(&mut self) {
        let _ = self.decoder.kill();
        let _ = self.decoder.wait();
    }
}

impl CameraSource {
    pub fn open(index: u32) -> Result<Self> {
        debug!("Opening camera index {}", index);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| TrackerError::Camera(format!("failed to open camera {}: {}", index, e)))?;
        camera
            .open_stream()
            .map_err(|e| TrackerError::Camera(format!("failed to open camera stream: {}", e)))?;

        info!(
            "Camera {} opened at {}x{} @ {} fps",
            index,
            camera.resolution().width(),
            camera.resolution().height(),
            camera.frame_rate()
        );
        Ok(Self { camera })
    }

    pub fn next_frame(&mut self) -> Result<RgbImage> {
        let frame = self
            .camera
            .frame()
            .map_err(|e| TrackerError::Camera(format!("failed to capture frame: {}", e)))?;
        let decoded = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| TrackerError::Camera(format!("failed to decode frame: {}", e)))?;
        Ok(decoded)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to stop camera stream: {}", e);
        }
    }
}

impl VideoSource {
    pub fn new_camera(index: u32) -> Result<Self> {
        Ok(VideoSource::Camera(CameraSource::open(index)?))
    }

    pub fn new_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(VideoSource::File(VideoFileReader::new(path)?))
    }

    /// Blocks until the next frame is available. `Ok(None)` marks the end of a file.
    pub fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        match self {
            VideoSource::Camera(camera) => camera.next_frame().map(Some),
            VideoSource::File(reader) => reader.next_frame(),
        }
    }

    pub fn info(&self) -> VideoInfo {
        match self {
            VideoSource::Camera(source) => {
                let resolution = source.camera.resolution();
                VideoInfo {
                    width: resolution.width(),
                    height: resolution.height(),
                    fps: source.camera.frame_rate() as f64,
                    frame_count: None,
                }
            }
            VideoSource::File(reader) => reader.info.clone(),
        }
    }
}

/// Human-readable names of the cameras the platform backend can see.
pub fn list_cameras() -> Result<Vec<String>> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| TrackerError::Camera(format!("failed to query cameras: {}", e)))?;
    Ok(cameras
        .iter()
        .map(|camera| format!("[{}] {}", camera.index(), camera.human_name()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_output_with_rational_frame_rate() {
        let info = parse_probe_output("1920,1080,30000/1001,1800\n").unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!((info.fps - 29.97).abs() < 0.01);
        assert_eq!(info.frame_count, Some(1800));
    }

    #[test]
    fn probe_output_with_unknown_frame_count() {
        let info = parse_probe_output("640,480,25/1,N/A").unwrap();
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, None);

        let info = parse_probe_output("640,480,0/0").unwrap();
        assert_eq!(info.fps, 30.0);
    }

    #[test]
    fn probe_output_rejects_garbage() {
        assert!(matches!(parse_probe_output(""), Err(TrackerError::InvalidVideo(_))));
        assert!(matches!(
            parse_probe_output("wide,480,25/1,10"),
            Err(TrackerError::InvalidVideo(_))
        ));
        assert!(matches!(
            parse_probe_output("0,480,25/1,10"),
            Err(TrackerError::InvalidVideo(_))
        ));
    }

    #[test]
    fn missing_video_file_is_reported() {
        let err = VideoFileReader::new("/nonexistent/dance.mp4").err().unwrap();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::VideoNotFound(_))
        ));
    }
}
