pub mod pcm_source;
pub mod segment_cache;
