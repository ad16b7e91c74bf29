use crate::codec::domain::codec_error::CodecError;
use crate::codec::domain::image_decoder::ImageDecoder;
use crate::shared::constants::MAX_IMAGE_BYTES;
use crate::shared::frame::Frame;

/// Decoder that sniffs the container format from magic bytes before
/// handing the payload to the matching `image` crate decoder.
///
/// Sniffing first gives a clear "unrecognized format" error for garbage
/// uploads instead of whatever the first decoder that happens to run
/// reports, and stops content-type lies from steering decoding.
pub struct MagicByteDecoder;

impl ImageDecoder for MagicByteDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Frame, CodecError> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(CodecError::TooLarge(bytes.len(), MAX_IMAGE_BYTES));
        }
        if bytes.is_empty() {
            return Err(CodecError::EmptyData);
        }

        let format = detect_format(bytes)?;
        let img = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| CodecError::DecodeFailed(e.to_string()))?;

        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Frame::new(rgb.into_raw(), width, height, 3))
    }
}

/// Detect the image container from magic bytes.
fn detect_format(bytes: &[u8]) -> Result<image::ImageFormat, CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(image::ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(image::ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => {
            Ok(image::ImageFormat::WebP)
        }

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(image::ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(image::ImageFormat::Bmp),

        _ => Err(CodecError::UnsupportedFormat),
    }
}
