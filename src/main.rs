// src/main.rs
mod app;
mod cli;
mod config;
mod error;
mod landmark;
mod overlay;
mod pose;
mod smoothing;
mod tracker;
mod trajectory;
mod ui;
mod video;

use anyhow::{anyhow, Result};
use clap::Parser;
use eframe::egui;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::{AppMode, DanceTrackerApp};
use crate::cli::{Args, InputSource};
use crate::pose::BlazePoseEstimator;
use crate::tracker::{run_headless, DanceTracker};
use crate::video::VideoSource;

fn log_video_info(source: &VideoSource) {
    let info = source.info();
    match info.frame_count {
        Some(total) => info!("FPS: {:.2}, Total frames: {}", info.fps, total),
        None => info!("FPS: {:.2}, Total frames: unknown", info.fps),
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    if args.list_cameras {
        let cameras = video::list_cameras()?;
        println!("Found {} camera(s):", cameras.len());
        for camera in cameras {
            println!("  {}", camera);
        }
        return Ok(());
    }

    let config = args.tracker_config();
    let output_path = args.output_path();

    let (mut source, mode) = match args.input() {
        InputSource::Camera(index) => (VideoSource::new_camera(index)?, AppMode::Webcam),
        InputSource::Video(path) => {
            info!("Processing video: {}", path.display());
            (VideoSource::new_file(&path)?, AppMode::VideoFile)
        }
    };

    let estimator = BlazePoseEstimator::new(&config.pose, source.info().fps)?;
    let mut tracker = DanceTracker::new(Box::new(estimator), &config);

    if args.no_display {
        log_video_info(&source);
        run_headless(&mut tracker, &mut source, &output_path, config.progress_interval)?;
        return Ok(());
    }

    match mode {
        AppMode::Webcam => info!("Starting dance tracking... Press 'q' to quit, 's' to save data"),
        AppMode::VideoFile => log_video_info(&source),
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 480.0]),
        centered: true,
        ..Default::default()
    };

    let progress_interval = config.progress_interval;
    eframe::run_native(
        "Dance Pose Tracking",
        options,
        Box::new(move |cc| {
            Box::new(DanceTrackerApp::new(
                cc,
                tracker,
                source,
                mode,
                output_path,
                progress_interval,
            ))
        }),
    )
    .map_err(|e| anyhow!("Error running application: {}", e))
}
