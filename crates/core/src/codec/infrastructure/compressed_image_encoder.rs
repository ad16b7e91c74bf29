use crate::codec::domain::codec_error::CodecError;
use crate::codec::domain::image_encoder::{EncodedImage, ImageEncoder};
use crate::shared::frame::Frame;

/// Response image compression format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg { quality: u8 },
    Png,
}

/// Encoder producing the compressed response image.
pub struct CompressedImageEncoder {
    format: OutputFormat,
}

impl CompressedImageEncoder {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl ImageEncoder for CompressedImageEncoder {
    fn encode(&self, frame: &Frame) -> Result<EncodedImage, CodecError> {
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| {
                CodecError::EncodeFailed("frame buffer does not match dimensions".to_string())
            })?;

        match self.format {
            OutputFormat::Jpeg { quality } => {
                let mut bytes = Vec::new();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
                encoder
                    .encode_image(&img)
                    .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
                Ok(EncodedImage {
                    bytes,
                    mime: "image/jpeg",
                })
            }
            OutputFormat::Png => {
                let mut bytes = Vec::new();
                img.write_with_encoder(image::codecs::png::PngEncoder::new(&mut bytes))
                    .map_err(|e| CodecError::EncodeFailed(e.to_string()))?;
                Ok(EncodedImage {
                    bytes,
                    mime: "image/png",
                })
            }
        }
    }
}
