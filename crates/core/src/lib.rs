//! Random-access PCM reading over compressed audio that is only natively
//! decodable in sequential order.
//!
//! A [`source::pcm_source::PcmSource`] answers "N samples at offset X"
//! requests out of a bounded cache of decoded segments, decoding forward or
//! restarting from the stream origin as needed. The decoder itself sits
//! behind the [`decode::domain::frame_decoder::FrameDecoder`] trait; the
//! ffmpeg-backed implementation lives in `decode::infrastructure`.

pub mod decode;
pub mod shared;
pub mod source;
