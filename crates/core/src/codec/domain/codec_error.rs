use thiserror::Error;

/// Errors from image decoding and encoding.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("empty image data")]
    EmptyData,
    #[error("image of {0} bytes exceeds the {1} byte limit")]
    TooLarge(usize, usize),
    #[error("unrecognized image format")]
    UnsupportedFormat,
    #[error("failed to decode image: {0}")]
    DecodeFailed(String),
    #[error("failed to encode image: {0}")]
    EncodeFailed(String),
}
