// src/landmark.rs - BlazePose landmark topology and per-frame pose data

pub const NUM_LANDMARKS: usize = 33;

/// A single model output point. `x`/`y` are normalized to the frame
/// width/height, `z` is relative depth on roughly the same scale as `x`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
    pub presence: f32,
}

#[cfg(test)]
impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility,
            presence: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub landmarks: Vec<Landmark>,
    pub score: f32,
}

impl Pose {
    pub fn get(&self, part: BodyPart) -> Option<&Landmark> {
        self.landmarks.get(part.index())
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyPart {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            BodyPart::Nose => "nose",
            BodyPart::LeftEyeInner => "left_eye_inner",
            BodyPart::LeftEye => "left_eye",
            BodyPart::LeftEyeOuter => "left_eye_outer",
            BodyPart::RightEyeInner => "right_eye_inner",
            BodyPart::RightEye => "right_eye",
            BodyPart::RightEyeOuter => "right_eye_outer",
            BodyPart::LeftEar => "left_ear",
            BodyPart::RightEar => "right_ear",
            BodyPart::MouthLeft => "mouth_left",
            BodyPart::MouthRight => "mouth_right",
            BodyPart::LeftShoulder => "left_shoulder",
            BodyPart::RightShoulder => "right_shoulder",
            BodyPart::LeftElbow => "left_elbow",
            BodyPart::RightElbow => "right_elbow",
            BodyPart::LeftWrist => "left_wrist",
            BodyPart::RightWrist => "right_wrist",
            BodyPart::LeftPinky => "left_pinky",
            BodyPart::RightPinky => "right_pinky",
            BodyPart::LeftIndex => "left_index",
            BodyPart::RightIndex => "right_index",
            BodyPart::LeftThumb => "left_thumb",
            BodyPart::RightThumb => "right_thumb",
            BodyPart::LeftHip => "left_hip",
            BodyPart::RightHip => "right_hip",
            BodyPart::LeftKnee => "left_knee",
            BodyPart::RightKnee => "right_knee",
            BodyPart::LeftAnkle => "left_ankle",
            BodyPart::RightAnkle => "right_ankle",
            BodyPart::LeftHeel => "left_heel",
            BodyPart::RightHeel => "right_heel",
            BodyPart::LeftFootIndex => "left_foot_index",
            BodyPart::RightFootIndex => "right_foot_index",
        }
    }
}

/// Body parts written to the trajectory log, in output order.
pub const KEY_POINTS: [BodyPart; 15] = [
    BodyPart::LeftWrist,
    BodyPart::RightWrist,
    BodyPart::LeftElbow,
    BodyPart::RightElbow,
    BodyPart::LeftShoulder,
    BodyPart::RightShoulder,
    BodyPart::LeftHip,
    BodyPart::RightHip,
    BodyPart::LeftKnee,
    BodyPart::RightKnee,
    BodyPart::LeftAnkle,
    BodyPart::RightAnkle,
    BodyPart::Nose,
    BodyPart::LeftHeel,
    BodyPart::RightHeel,
];

/// Skeleton edges between landmark indices.
pub const POSE_CONNECTIONS: [(usize, usize); 35] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    (0, 4),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    (11, 12),
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    (17, 19),
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    (18, 20),
    (11, 23),
    (12, 24),
    (23, 24),
    (23, 25),
    (24, 26),
    (25, 27),
    (26, 28),
    (27, 29),
    (28, 30),
    (29, 31),
    (30, 32),
    (27, 31),
    (28, 32),
];
