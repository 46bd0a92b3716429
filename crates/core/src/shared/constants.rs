/// Bytes per 16-bit PCM sample. Offsets and counts throughout the crate are
/// in these sample units, with channels interleaved and counted individually.
pub const SAMPLE_BYTES: usize = 2;

/// Byte width of one interleaved 16-bit stereo sample frame.
pub const FRAME_BYTES: usize = 4;

/// Samples per interleaved stereo frame.
pub const FRAME_SAMPLES: usize = 2;

/// Upper bound on cached segments per session.
pub const MAX_CACHE_SEGMENTS: usize = 1000;

/// Eviction slack: the head segment is evicted before an append would push
/// the cache past `MAX_CACHE_SEGMENTS - CACHE_HEADROOM`. Doubles as the
/// near-tail margin that forces a refill during lookups.
pub const CACHE_HEADROOM: usize = 10;

/// Consecutive non-audio (or undecodable) packets before the stream is
/// treated as exhausted. A heuristic, not a precise end-of-stream detector.
pub const DEFAULT_STALL_THRESHOLD: u32 = 5;

/// Segments decoded per refill when patching an interior gap mid-read.
pub const INTERIOR_REFILL_SEGMENTS: usize = 50;

/// Segments decoded when a seek lands past the current cache window.
pub const FORWARD_SEEK_REFILL_SEGMENTS: usize = 100;

/// Timestamp tolerance window for the backward seek to the stream origin.
pub const SEEK_ORIGIN_TOLERANCE: i64 = 32_767 * 2;
