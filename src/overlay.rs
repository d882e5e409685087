// src/overlay.rs - Skeleton overlay drawn directly onto the frame
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::landmark::{Landmark, Pose, POSE_CONNECTIONS};

/// Landmarks below this visibility or presence are left undrawn.
const DRAW_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct DrawingSpec {
    pub color: Rgb<u8>,
    pub thickness: i32,
    pub circle_radius: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub landmark: DrawingSpec,
    pub connection: DrawingSpec,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            landmark: DrawingSpec {
                color: Rgb([0, 255, 0]),
                thickness: 2,
                circle_radius: 2,
            },
            connection: DrawingSpec {
                color: Rgb([255, 0, 0]),
                thickness: 2,
                circle_radius: 2,
            },
        }
    }
}

fn to_pixel(lm: &Landmark, width: u32, height: u32) -> Option<(i32, i32)> {
    if lm.visibility < DRAW_THRESHOLD || lm.presence < DRAW_THRESHOLD {
        return None;
    }
    if !(0.0..=1.0).contains(&lm.x) || !(0.0..=1.0).contains(&lm.y) {
        return None;
    }
    let x = ((lm.x * width as f32).floor() as i32).min(width as i32 - 1);
    let y = ((lm.y * height as f32).floor() as i32).min(height as i32 - 1);
    Some((x, y))
}

fn draw_thick_line(frame: &mut RgbImage, from: (i32, i32), to: (i32, i32), spec: &DrawingSpec) {
    let half = spec.thickness / 2;
    let steep = (to.1 - from.1).abs() > (to.0 - from.0).abs();
    for offset in -half..=(spec.thickness - 1 - half) {
        let (dx, dy) = if steep { (offset, 0) } else { (0, offset) };
        draw_line_segment_mut(
            frame,
            ((from.0 + dx) as f32, (from.1 + dy) as f32),
            ((to.0 + dx) as f32, (to.1 + dy) as f32),
            spec.color,
        );
    }
}

/// Draws the pose skeleton onto `frame`. Returns how many landmarks were drawn.
pub fn draw_landmarks(frame: &mut RgbImage, pose: &Pose, style: &OverlayStyle) -> usize {
    let (width, height) = frame.dimensions();
    if width == 0 || height == 0 {
        return 0;
    }

    let points: Vec<Option<(i32, i32)>> = pose
        .landmarks
        .iter()
        .map(|lm| to_pixel(lm, width, height))
        .collect();

    for (a, b) in POSE_CONNECTIONS {
        if let (Some(Some(from)), Some(Some(to))) = (points.get(a), points.get(b)) {
            draw_thick_line(frame, *from, *to, &style.connection);
        }
    }

    let border = (style.landmark.circle_radius + 1).max((style.landmark.circle_radius as f32 * 1.2) as i32);
    let mut drawn = 0;
    for point in points.iter().flatten() {
        draw_filled_circle_mut(frame, *point, border, Rgb([255, 255, 255]));
        draw_filled_circle_mut(frame, *point, style.landmark.circle_radius, style.landmark.color);
        drawn += 1;
    }
    drawn
}
