use std::path::Path;

use thiserror::Error;

use crate::decode::domain::frame_decoder::{DecodeError, FrameDecoder};
use crate::shared::constants::{
    CACHE_HEADROOM, FORWARD_SEEK_REFILL_SEGMENTS, INTERIOR_REFILL_SEGMENTS, MAX_CACHE_SEGMENTS,
    SAMPLE_BYTES,
};
use crate::shared::stream_info::StreamInfo;
use crate::source::segment_cache::{Lookup, SegmentCache};

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("read at {requested} precedes cache window start {window_start}; seek first")]
    PrecedingCacheWindow { requested: u64, window_start: u64 },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Cache sizing knobs. The defaults bound decoded audio to roughly a
/// thousand segments regardless of file length.
#[derive(Clone, Copy, Debug)]
pub struct SourceConfig {
    pub max_segments: usize,
    pub headroom: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_segments: MAX_CACHE_SEGMENTS,
            headroom: CACHE_HEADROOM,
        }
    }
}

/// Result of one `read` call. The buffer always holds the requested number
/// of bytes; any region past `samples_filled` is silence, and `truncated`
/// says so explicitly. Callers must not assume full satisfaction at
/// end-of-stream.
#[derive(Debug)]
pub struct ReadOutcome {
    pub pcm: Vec<u8>,
    pub samples_filled: usize,
    pub truncated: bool,
}

/// Random-access PCM reads over a sequential frame decoder.
///
/// The decoder only produces data in increasing order and only seeks back to
/// the stream origin, so arbitrary offsets are served from a bounded segment
/// cache: reads inside the cached window copy straight out of it, reads past
/// the window decode forward, and backward jumps restart decoding from the
/// origin. One consumer thread drives a session; `open`, `seek` and `read`
/// are not reentrant against each other.
pub struct PcmSource {
    decoder: Box<dyn FrameDecoder>,
    cache: SegmentCache,
    info: StreamInfo,
    config: SourceConfig,
    cursor: u64,
    cursor_overridden: bool,
    scan_hint: usize,
    end_of_stream: bool,
}

impl PcmSource {
    pub fn open(decoder: Box<dyn FrameDecoder>, path: &Path) -> Result<Self, ReadError> {
        Self::open_with_config(decoder, path, SourceConfig::default())
    }

    pub fn open_with_config(
        mut decoder: Box<dyn FrameDecoder>,
        path: &Path,
        config: SourceConfig,
    ) -> Result<Self, ReadError> {
        let info = decoder.open(path)?;
        Ok(Self {
            decoder,
            cache: SegmentCache::new(config.max_segments, config.headroom),
            info,
            config,
            cursor: 0,
            cursor_overridden: false,
            scan_hint: 0,
            end_of_stream: false,
        })
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    /// Logical read position in sample units.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Reads `sample_count` samples starting at `target_offset`.
    ///
    /// The target must not precede the cached window; callers jumping
    /// backward seek first. Shortfalls against the end of the stream come
    /// back zero-filled with the truncation flag set.
    pub fn read(&mut self, target_offset: u64, sample_count: usize) -> Result<ReadOutcome, ReadError> {
        let out_len = sample_count * SAMPLE_BYTES;
        let mut pcm = vec![0u8; out_len];
        let mut copied = 0usize;

        while copied < out_len {
            let offset = target_offset + (copied / SAMPLE_BYTES) as u64;
            let Some(pos) = self.resolve(offset)? else {
                break;
            };
            let segment = self.cache.segment(pos);
            let intra = (offset - segment.start_offset()) as usize * SAMPLE_BYTES;
            let take = (segment.pcm().len() - intra).min(out_len - copied);
            pcm[copied..copied + take].copy_from_slice(&segment.pcm()[intra..intra + take]);
            copied += take;
            self.scan_hint = pos;
        }

        // The first read after an explicit seek must not advance the cursor
        // on top of the seek itself.
        if self.cursor_overridden {
            self.cursor_overridden = false;
        } else {
            self.cursor = target_offset + sample_count as u64;
        }

        let samples_filled = copied / SAMPLE_BYTES;
        Ok(ReadOutcome {
            pcm,
            samples_filled,
            truncated: samples_filled < sample_count,
        })
    }

    /// Moves the read position.
    ///
    /// Jumping to 0 or below the cached window is a hard reset: the cache is
    /// cleared and decoding restarts from the stream origin, fast-forwarding
    /// by sequential decode for nonzero targets. Seeking past the window
    /// decodes forward without clearing; seeking inside the window touches
    /// no decoder state at all.
    pub fn seek(&mut self, target_offset: u64) -> Result<u64, ReadError> {
        if target_offset == 0 || target_offset < self.cache.window_start() {
            self.decoder.seek_to_origin()?;
            self.cache.clear();
            self.scan_hint = 0;
            self.end_of_stream = false;
            if target_offset == 0 {
                self.refill(self.origin_batch(), None)?;
            } else {
                self.refill(self.config.max_segments / 2, Some(target_offset))?;
            }
        }
        if self.cache.window_end() <= target_offset {
            self.refill(FORWARD_SEEK_REFILL_SEGMENTS, Some(target_offset))?;
        }
        self.cursor = target_offset;
        self.cursor_overridden = true;
        Ok(target_offset)
    }

    pub fn close(&mut self) {
        self.decoder.close();
        self.cache.clear();
    }

    /// Locates the segment containing `offset`, decoding further segments as
    /// needed. `Ok(None)` means the stream ended before the offset.
    fn resolve(&mut self, offset: u64) -> Result<Option<usize>, ReadError> {
        loop {
            if !self.cache.is_empty() && offset < self.cache.window_start() {
                return Err(ReadError::PrecedingCacheWindow {
                    requested: offset,
                    window_start: self.cache.window_start(),
                });
            }
            let tail_margin = if self.end_of_stream { 0 } else { self.config.headroom };
            match self.cache.lookup(self.scan_hint, offset, tail_margin) {
                Lookup::Found(pos) => return Ok(Some(pos)),
                Lookup::NeedsRefill => {
                    if self.end_of_stream {
                        return Ok(None);
                    }
                    let batch = if self.cache.is_empty() {
                        self.origin_batch()
                    } else {
                        self.interior_batch()
                    };
                    self.refill(batch, Some(offset))?;
                }
            }
        }
    }

    /// Decodes up to `batch` segments into the cache. With a target, decoded
    /// segments only count against the batch once the window has grown past
    /// the target, so the batch becomes decode-ahead beyond it.
    fn refill(&mut self, batch: usize, target: Option<u64>) -> Result<usize, ReadError> {
        let mut appended = 0usize;
        let mut remaining = batch;
        while remaining > 0 && !self.end_of_stream {
            match self.decoder.decode_next()? {
                Some(segment) => {
                    self.cache.append(segment);
                    appended += 1;
                    if target.map_or(true, |t| t < self.cache.window_end()) {
                        remaining -= 1;
                    }
                }
                None => {
                    self.end_of_stream = true;
                    log::debug!("decoder reported end of stream during refill");
                }
            }
        }
        Ok(appended)
    }

    fn origin_batch(&self) -> usize {
        self.config.max_segments - self.config.headroom
    }

    /// Interior refills stay well below cache capacity so the decode-ahead
    /// past the target can never evict the segment being read.
    fn interior_batch(&self) -> usize {
        let capacity = self.config.max_segments - self.config.headroom;
        INTERIOR_REFILL_SEGMENTS
            .min(capacity.saturating_sub(self.config.headroom + 1))
            .max(1)
    }
}
