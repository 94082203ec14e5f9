use crate::config::MonitorConfig;
use crate::landmarks::{LandmarkId, LandmarkSet};

/// Landmarks whose mean visibility stands in for overall frame confidence.
const CONFIDENCE_LANDMARKS: [LandmarkId; 6] = [
    LandmarkId::LeftShoulder,
    LandmarkId::RightShoulder,
    LandmarkId::LeftEar,
    LandmarkId::RightEar,
    LandmarkId::LeftHip,
    LandmarkId::RightHip,
];

/// Scalar posture features for one frame. Angles are degrees. A feature is
/// `None` when a landmark it needs was not detected; `None` and 0° mean
/// different things and consumers must not conflate them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSample {
    pub shoulder_angle: Option<f64>,
    pub neck_angle: Option<f64>,
    pub lean_angle: Option<f64>,
    pub chin_angle: Option<f64>,
    pub viewing_distance: Option<f64>,
    /// Mean visibility of the shoulder/ear/hip landmarks; a missing landmark
    /// counts as zero visibility.
    pub confidence: f64,
}

/// Angle in degrees at vertex `b` between rays `b→a` and `b→c`.
///
/// The cosine is clamped to [-1, 1] before the inverse so floating-point
/// drift cannot push it out of acos' domain. Coincident points would divide
/// by zero; they yield 0° instead.
pub fn angle_between(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let ba = (a.0 - b.0, a.1 - b.1);
    let bc = (c.0 - b.0, c.1 - b.1);
    let norm = (ba.0.hypot(ba.1)) * (bc.0.hypot(bc.1));
    if norm == 0.0 {
        return 0.0;
    }
    let cosine = ((ba.0 * bc.0 + ba.1 * bc.1) / norm).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}

/// Unitless proxy for how far the face sits from the camera, from the pixel
/// distance between the eyes. The constants are uncalibrated tunables.
pub fn estimate_viewing_distance(
    left_eye: (f64, f64),
    right_eye: (f64, f64),
    config: &MonitorConfig,
) -> Option<f64> {
    let pixel_distance = (left_eye.0 - right_eye.0).hypot(left_eye.1 - right_eye.1);
    if pixel_distance == 0.0 {
        return None;
    }
    Some(config.known_face_width * config.focal_length / pixel_distance)
}

/// Derive one frame's features from its landmark set.
pub fn extract_features(landmarks: &LandmarkSet, config: &MonitorConfig) -> FeatureSample {
    let left_shoulder = landmarks.position(LandmarkId::LeftShoulder);
    let right_shoulder = landmarks.position(LandmarkId::RightShoulder);
    let left_ear = landmarks.position(LandmarkId::LeftEar);
    let left_hip = landmarks.position(LandmarkId::LeftHip);
    let right_hip = landmarks.position(LandmarkId::RightHip);
    let mouth = landmarks.position(LandmarkId::Mouth);

    // Shoulder roll: angle between the shoulder line and the vertical
    // dropped from the right shoulder.
    let shoulder_angle = match (left_shoulder, right_shoulder) {
        (Some(ls), Some(rs)) => Some(angle_between(ls, rs, (rs.0, 0.0))),
        _ => None,
    };

    // Forward head: ear-to-shoulder line against the vertical at the
    // left shoulder.
    let neck_angle = match (left_ear, left_shoulder) {
        (Some(ear), Some(ls)) => Some(angle_between(ear, ls, (ls.0, 0.0))),
        _ => None,
    };

    // Torso lean: spine (hip midpoint to shoulder midpoint) against the
    // vertical at the hip midpoint. Upright reads as 90°.
    let lean_angle = match (left_shoulder, right_shoulder, left_hip, right_hip) {
        (Some(ls), Some(rs), Some(lh), Some(rh)) => {
            let mid_shoulder = ((ls.0 + rs.0) / 2.0, (ls.1 + rs.1) / 2.0);
            let mid_hip = ((lh.0 + rh.0) / 2.0, (lh.1 + rh.1) / 2.0);
            Some(angle_between((mid_hip.0, 0.0), mid_hip, mid_shoulder))
        }
        _ => None,
    };

    let chin_angle = match (mouth, left_ear, left_shoulder) {
        (Some(m), Some(ear), Some(ls)) => Some(angle_between(m, ear, ls)),
        _ => None,
    };

    let viewing_distance = match (
        landmarks.position(LandmarkId::LeftEye),
        landmarks.position(LandmarkId::RightEye),
    ) {
        (Some(le), Some(re)) => estimate_viewing_distance(le, re, config),
        _ => None,
    };

    let confidence = CONFIDENCE_LANDMARKS
        .iter()
        .map(|&id| landmarks.visibility(id))
        .sum::<f64>()
        / CONFIDENCE_LANDMARKS.len() as f64;

    FeatureSample {
        shoulder_angle,
        neck_angle,
        lean_angle,
        chin_angle,
        viewing_distance,
        confidence,
    }
}
