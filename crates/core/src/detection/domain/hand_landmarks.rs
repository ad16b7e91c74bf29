//! 21-point hand landmark data contract (MediaPipe hand topology).
//!
//! Landmark order is fixed by the model contract and never reordered:
//! 0 = wrist, 1-4 = thumb, 5-8 = index, 9-12 = middle, 13-16 = ring,
//! 17-20 = pinky, each finger running base to tip.

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_FINGER_MCP: usize = 5;
pub const INDEX_FINGER_PIP: usize = 6;
pub const INDEX_FINGER_DIP: usize = 7;
pub const INDEX_FINGER_TIP: usize = 8;
pub const MIDDLE_FINGER_MCP: usize = 9;
pub const MIDDLE_FINGER_PIP: usize = 10;
pub const MIDDLE_FINGER_DIP: usize = 11;
pub const MIDDLE_FINGER_TIP: usize = 12;
pub const RING_FINGER_MCP: usize = 13;
pub const RING_FINGER_PIP: usize = 14;
pub const RING_FINGER_DIP: usize = 15;
pub const RING_FINGER_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

pub const LANDMARK_COUNT: usize = 21;

/// Skeleton connections drawn between landmarks (start, end).
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    // palm
    (WRIST, THUMB_CMC),
    (WRIST, INDEX_FINGER_MCP),
    (INDEX_FINGER_MCP, MIDDLE_FINGER_MCP),
    (MIDDLE_FINGER_MCP, RING_FINGER_MCP),
    (RING_FINGER_MCP, PINKY_MCP),
    (WRIST, PINKY_MCP),
    // thumb
    (THUMB_CMC, THUMB_MCP),
    (THUMB_MCP, THUMB_IP),
    (THUMB_IP, THUMB_TIP),
    // index
    (INDEX_FINGER_MCP, INDEX_FINGER_PIP),
    (INDEX_FINGER_PIP, INDEX_FINGER_DIP),
    (INDEX_FINGER_DIP, INDEX_FINGER_TIP),
    // middle
    (MIDDLE_FINGER_MCP, MIDDLE_FINGER_PIP),
    (MIDDLE_FINGER_PIP, MIDDLE_FINGER_DIP),
    (MIDDLE_FINGER_DIP, MIDDLE_FINGER_TIP),
    // ring
    (RING_FINGER_MCP, RING_FINGER_PIP),
    (RING_FINGER_PIP, RING_FINGER_DIP),
    (RING_FINGER_DIP, RING_FINGER_TIP),
    // pinky
    (PINKY_MCP, PINKY_PIP),
    (PINKY_PIP, PINKY_DIP),
    (PINKY_DIP, PINKY_TIP),
];

/// One tracked point on a hand, in normalized image coordinates.
///
/// `x` and `y` are in [0, 1] relative to frame width/height; `z` is
/// relative depth with the wrist as origin (unused by counting/drawing
/// but carried through from the model).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Which anatomical hand an observation belongs to.
///
/// Labels follow the mirrored (selfie-view) convention: the frame is
/// flipped before detection, so a hand on the viewer's left labeled
/// "Left" is the subject's anatomical left hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Wire label used in the response payload.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }
}

/// One detected hand: a handedness label plus its 21 ordered landmarks.
///
/// The fixed-size array is the validated shape contract at the detector
/// boundary; downstream stages never re-check landmark counts.
#[derive(Clone, Debug, PartialEq)]
pub struct HandObservation {
    handedness: Handedness,
    landmarks: [Landmark; LANDMARK_COUNT],
}

impl HandObservation {
    pub fn new(handedness: Handedness, landmarks: [Landmark; LANDMARK_COUNT]) -> Self {
        Self {
            handedness,
            landmarks,
        }
    }

    /// Builds an observation from a model-output slice, rejecting any
    /// result that is not exactly 21 points.
    pub fn from_points(
        handedness: Handedness,
        points: &[Landmark],
    ) -> Result<Self, &'static str> {
        let landmarks: [Landmark; LANDMARK_COUNT] = points
            .try_into()
            .map_err(|_| "hand observation requires exactly 21 landmarks")?;
        Ok(Self {
            handedness,
            landmarks,
        })
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARK_COUNT] {
        &self.landmarks
    }
}
