pub mod compressed_image_encoder;
pub mod magic_byte_decoder;
