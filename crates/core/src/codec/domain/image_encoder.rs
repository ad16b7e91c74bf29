use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::codec::domain::codec_error::CodecError;
use crate::shared::frame::Frame;

/// A compressed image plus the MIME type it was compressed as.
#[derive(Clone, Debug)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl EncodedImage {
    /// Render as a `data:` URI suitable for an `<img src>` attribute.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// Domain interface for compressing an RGB frame for the response.
pub trait ImageEncoder: Send {
    fn encode(&self, frame: &Frame) -> Result<EncodedImage, CodecError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_prefix_carries_mime() {
        let encoded = EncodedImage {
            bytes: vec![1, 2, 3],
            mime: "image/jpeg",
        };
        assert!(encoded.to_data_uri().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_data_uri_payload_decodes_to_original_bytes() {
        let encoded = EncodedImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
            mime: "image/jpeg",
        };
        let uri = encoded.to_data_uri();
        let payload = uri.split_once("base64,").unwrap().1;
        assert_eq!(STANDARD.decode(payload).unwrap(), encoded.bytes);
    }
}
