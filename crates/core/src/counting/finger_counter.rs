//! Extended-finger counting from hand landmarks.
//!
//! A finger counts as extended when its tip sits above its PIP joint in
//! image coordinates (smaller y). The thumb extends sideways, so it is
//! judged on x against the IP joint, with the direction depending on
//! which hand it is: in the mirrored view a right thumb extends toward
//! smaller x, a left thumb toward larger x.
//!
//! Both tests compare raw image axes, so a hand held sideways or upside
//! down can count differently than a person would read it. Counts are
//! per frame, with no smoothing across requests.

use crate::detection::domain::hand_landmarks::{
    HandObservation, Handedness, INDEX_FINGER_PIP, INDEX_FINGER_TIP, MIDDLE_FINGER_PIP,
    MIDDLE_FINGER_TIP, PINKY_PIP, PINKY_TIP, RING_FINGER_PIP, RING_FINGER_TIP, THUMB_IP,
    THUMB_TIP,
};

/// Fingertip landmarks, thumb first.
const TIP_IDS: [usize; 5] = [
    THUMB_TIP,
    INDEX_FINGER_TIP,
    MIDDLE_FINGER_TIP,
    RING_FINGER_TIP,
    PINKY_TIP,
];

/// Joint each tip is compared against: the thumb IP, then each PIP.
const REF_IDS: [usize; 5] = [
    THUMB_IP,
    INDEX_FINGER_PIP,
    MIDDLE_FINGER_PIP,
    RING_FINGER_PIP,
    PINKY_PIP,
];

/// Count extended fingers on one hand, returned as the digit string used
/// in the response payload ("0" through "5").
pub fn count_fingers(observation: &HandObservation) -> String {
    let landmarks = observation.landmarks();
    let mut count = 0u8;

    let thumb_tip = landmarks[TIP_IDS[0]];
    let thumb_ref = landmarks[REF_IDS[0]];
    let thumb_extended = match observation.handedness() {
        Handedness::Right => thumb_tip.x < thumb_ref.x,
        Handedness::Left => thumb_tip.x > thumb_ref.x,
    };
    if thumb_extended {
        count += 1;
    }

    for finger in 1..TIP_IDS.len() {
        if landmarks[TIP_IDS[finger]].y < landmarks[REF_IDS[finger]].y {
            count += 1;
        }
    }

    count.to_string()
}
