use crate::annotation::domain::skeleton_renderer::SkeletonRenderer;
use crate::detection::domain::hand_landmarks::{HandObservation, HAND_CONNECTIONS};
use crate::shared::frame::Frame;

/// Landmark dot color (RGB blue).
const POINT_COLOR: [u8; 3] = [0, 0, 255];

/// Skeleton segment color (RGB green).
const LINE_COLOR: [u8; 3] = [0, 255, 0];

/// Frame-width divisor for the landmark dot radius.
const RADIUS_DIVISOR: u32 = 160;

/// Frame-width divisor for segment thickness.
const THICKNESS_DIVISOR: u32 = 200;

/// CPU overlay renderer.
///
/// Draws green skeleton segments between connected landmarks, then blue
/// landmark dots on top so joints stay visible. Dot radius and segment
/// thickness scale with frame width, with a floor of one pixel, so the
/// overlay stays legible at any resolution. Landmarks outside the frame
/// are clipped pixel by pixel.
pub struct CpuSkeletonRenderer;

impl SkeletonRenderer for CpuSkeletonRenderer {
    fn draw(
        &self,
        frame: &mut Frame,
        hands: &[HandObservation],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let fw = frame.width() as usize;
        let fh = frame.height() as usize;
        let channels = frame.channels() as usize;
        let radius = (frame.width() / RADIUS_DIVISOR).max(1) as i32;
        let thickness = (frame.width() / THICKNESS_DIVISOR).max(1) as i32;
        let data = frame.data_mut();

        for hand in hands {
            let landmarks = hand.landmarks();

            for &(a, b) in &HAND_CONNECTIONS {
                let (x0, y0) = to_pixel(landmarks[a].x, landmarks[a].y, fw, fh);
                let (x1, y1) = to_pixel(landmarks[b].x, landmarks[b].y, fw, fh);
                draw_segment(data, fw, fh, channels, x0, y0, x1, y1, thickness, LINE_COLOR);
            }

            for lm in landmarks {
                let (x, y) = to_pixel(lm.x, lm.y, fw, fh);
                draw_disc(data, fw, fh, channels, x, y, radius, POINT_COLOR);
            }
        }

        Ok(())
    }
}

fn to_pixel(nx: f32, ny: f32, fw: usize, fh: usize) -> (i32, i32) {
    ((nx * fw as f32).round() as i32, (ny * fh as f32).round() as i32)
}

/// Stamp a line by stepping discs of half the thickness along it.
#[allow(clippy::too_many_arguments)]
fn draw_segment(
    data: &mut [u8],
    fw: usize,
    fh: usize,
    channels: usize,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    thickness: i32,
    color: [u8; 3],
) {
    let stamp_radius = thickness / 2;
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).max(1);
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = x0 as f32 + (x1 - x0) as f32 * t;
        let y = y0 as f32 + (y1 - y0) as f32 * t;
        draw_disc(
            data,
            fw,
            fh,
            channels,
            x.round() as i32,
            y.round() as i32,
            stamp_radius,
            color,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_disc(
    data: &mut [u8],
    fw: usize,
    fh: usize,
    channels: usize,
    cx: i32,
    cy: i32,
    radius: i32,
    color: [u8; 3],
) {
    let r2 = radius * radius;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            put_pixel(data, fw, fh, channels, cx + dx, cy + dy, color);
        }
    }
}

fn put_pixel(
    data: &mut [u8],
    fw: usize,
    fh: usize,
    channels: usize,
    x: i32,
    y: i32,
    color: [u8; 3],
) {
    if x < 0 || y < 0 || x >= fw as i32 || y >= fh as i32 {
        return;
    }
    let offset = (y as usize * fw + x as usize) * channels;
    data[offset..offset + 3].copy_from_slice(&color);
}
