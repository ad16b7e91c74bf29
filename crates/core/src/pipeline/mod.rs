pub mod pipeline_logger;
pub mod recognize_use_case;
