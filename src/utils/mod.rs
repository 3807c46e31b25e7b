pub mod encoding;
pub mod log_sampling;

pub use encoding::{decode_log_content, DecodedText, TextEncoding};
pub use log_sampling::{
    detect_log_format, extract_log_section, sample_large_log, LogFormat,
    DEFAULT_SAMPLE_HEAD_LINES, DEFAULT_SAMPLE_TAIL_LINES,
};
