pub mod codec_error;
pub mod image_decoder;
pub mod image_encoder;
