pub mod annotation;
pub mod codec;
pub mod counting;
pub mod detection;
pub mod pipeline;
pub mod shared;
