use ndarray::ArrayView3;

/// A decoded image frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the domain layer
/// treats pixel data as opaque. A frame lives for one request: decoded,
/// mirrored, drawn on, encoded, dropped.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Flips the frame horizontally in place (selfie-view convention).
    ///
    /// Must run before detection: the finger-counting thumb rule assumes
    /// mirrored coordinates.
    pub fn mirror_horizontal(&mut self) {
        let w = self.width as usize;
        let c = self.channels as usize;
        let row_len = w * c;
        for row in self.data.chunks_exact_mut(row_len) {
            for x in 0..w / 2 {
                let left = x * c;
                let right = (w - 1 - x) * c;
                for ch in 0..c {
                    row.swap(left + ch, right + ch);
                }
            }
        }
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
