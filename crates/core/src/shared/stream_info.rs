use std::path::PathBuf;

/// Stream parameters reported when a session is opened.
///
/// `duration_samples` is the stream length in 16-bit sample units (two bytes
/// per sample, channels interleaved); 0 when the container does not report a
/// duration.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_samples: u64,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction() {
        let info = StreamInfo {
            sample_rate: 44100,
            channels: 2,
            duration_samples: 44100 * 2 * 60,
            codec: "mp3".to_string(),
            source_path: Some(PathBuf::from("/tmp/test.mp3")),
        };
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.duration_samples, 5_292_000);
        assert_eq!(info.codec, "mp3");
        assert_eq!(info.source_path, Some(PathBuf::from("/tmp/test.mp3")));
    }

    #[test]
    fn test_unknown_duration_is_zero() {
        let info = StreamInfo {
            sample_rate: 48000,
            channels: 1,
            duration_samples: 0,
            codec: "pcm_s16le".to_string(),
            source_path: None,
        };
        assert_eq!(info.duration_samples, 0);
    }
}
