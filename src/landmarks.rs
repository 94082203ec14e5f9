use std::collections::HashMap;

use anyhow::Result;

/// Anatomical points the engine knows how to reason about.
///
/// Providers are free to report a subset; every consumer treats a missing
/// point explicitly rather than assuming a full skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkId {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    Mouth,
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
}

/// A detected point in pixel coordinates with the provider's per-point
/// visibility score in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub visibility: f64,
}

/// One frame's worth of detected landmarks. Built fresh each frame and
/// dropped once the frame has been processed; never persisted.
#[derive(Debug, Clone, Default)]
pub struct LandmarkSet {
    points: HashMap<LandmarkId, Landmark>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: LandmarkId, landmark: Landmark) {
        self.points.insert(id, landmark);
    }

    pub fn get(&self, id: LandmarkId) -> Option<&Landmark> {
        self.points.get(&id)
    }

    /// Pixel position of a point, if detected this frame.
    pub fn position(&self, id: LandmarkId) -> Option<(f64, f64)> {
        self.points.get(&id).map(|lm| (lm.x, lm.y))
    }

    /// Visibility of a point; a point the provider did not report counts
    /// as fully invisible.
    pub fn visibility(&self, id: LandmarkId) -> f64 {
        self.points.get(&id).map(|lm| lm.visibility).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A raw captured frame. The engine never inspects the pixel payload; it is
/// carried through to the landmark provider untouched.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Source of captured frames at the device's native rate.
///
/// Returning `Ok(None)` means the source is exhausted (device unplugged,
/// stream ended); that is the one condition that terminates a session.
/// Implementations release the capture device in their `Drop`.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// The pose/face model boundary. `Ok(None)` is a normal per-frame outcome
/// (nobody in view), not an error.
pub trait LandmarkProvider {
    fn detect(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>>;
}
