pub mod constants;
pub mod stream_info;
