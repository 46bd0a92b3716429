use std::path::Path;

use thiserror::Error;

use crate::decode::domain::segment::Segment;
use crate::shared::stream_info::StreamInfo;

/// Fatal decoder failures. End-of-stream is not an error; `decode_next`
/// reports it as `Ok(None)`. Per-packet decode problems are handled inside
/// the implementation (logged and skipped) and only surface here once the
/// stall threshold treats the stream as dead.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("no audio stream found in container")]
    UnsupportedContainer,
    #[error("no decoder available for codec {codec}")]
    CodecUnavailable { codec: String },
    #[error("unsupported channel layout: {channels} channels (at most 2)")]
    ChannelLayoutUnsupported { channels: u16 },
    #[error("decoder backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DecodeError {
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}

/// Domain interface for sequential audio frame decoding.
///
/// The decoder produces segments in strictly increasing, contiguous order.
/// The only supported seek is back to the stream origin; any interior
/// position is reached by decoding forward from wherever the session
/// currently stands. Implementations stamp each segment with a cumulative
/// sample cursor that resets only on [`FrameDecoder::seek_to_origin`].
pub trait FrameDecoder: Send {
    /// Opens an audio file and reports its stream parameters.
    fn open(&mut self, path: &Path) -> Result<StreamInfo, DecodeError>;

    /// Decodes the next chunk of the audio stream.
    ///
    /// Returns `Ok(None)` once the stream is exhausted, including when the
    /// stall heuristic gives up after a run of non-audio packets.
    fn decode_next(&mut self) -> Result<Option<Segment>, DecodeError>;

    /// Repositions the session at the very start of the audio stream and
    /// resets the cumulative sample cursor.
    fn seek_to_origin(&mut self) -> Result<(), DecodeError>;

    /// Releases the codec/container handles.
    fn close(&mut self);
}
