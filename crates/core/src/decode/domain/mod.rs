pub mod frame_decoder;
pub mod segment;
pub mod timestamp;
