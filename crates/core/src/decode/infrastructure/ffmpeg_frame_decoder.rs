use std::path::Path;
use std::sync::Mutex;

use crate::decode::domain::frame_decoder::{DecodeError, FrameDecoder};
use crate::decode::domain::segment::Segment;
use crate::decode::domain::timestamp::sample_offset_from_timestamp;
use crate::shared::constants::{DEFAULT_STALL_THRESHOLD, SAMPLE_BYTES, SEEK_ORIGIN_TOLERANCE};
use crate::shared::stream_info::StreamInfo;

/// Serializes open/close-class calls into the decoding library across all
/// sessions in the process. Steady-state decoding on an already-open session
/// is not covered and relies on the one-consumer-thread-per-session rule.
static SETUP_LOCK: Mutex<()> = Mutex::new(());

/// Sequential audio decoding via ffmpeg-next (libavformat + libavcodec +
/// libswresample).
///
/// Every decoded frame is resampled to packed 16-bit PCM at the source
/// sample rate and channel layout, then stamped with a cumulative sample
/// cursor. The container's backward-seek primitive is used only to return to
/// the stream origin.
pub struct FfmpegFrameDecoder {
    input: Option<ffmpeg_next::format::context::Input>,
    decoder: Option<ffmpeg_next::decoder::Audio>,
    resampler: Option<ffmpeg_next::software::resampling::Context>,
    audio_stream_index: usize,
    decode_cursor: u64,
    stall_threshold: u32,
    draining: bool,
}

// Safety: FfmpegFrameDecoder is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameDecoder {}

impl FfmpegFrameDecoder {
    pub fn new() -> Self {
        Self::with_stall_threshold(DEFAULT_STALL_THRESHOLD)
    }

    /// `stall_threshold` is the run of non-audio (or undecodable) packets
    /// after which the stream is treated as exhausted. Streams with long
    /// non-audio interludes may want a larger value.
    pub fn with_stall_threshold(stall_threshold: u32) -> Self {
        Self {
            input: None,
            decoder: None,
            resampler: None,
            audio_stream_index: 0,
            decode_cursor: 0,
            stall_threshold: stall_threshold.max(1),
            draining: false,
        }
    }
}

impl Default for FfmpegFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for FfmpegFrameDecoder {
    fn open(&mut self, path: &Path) -> Result<StreamInfo, DecodeError> {
        let _guard = SETUP_LOCK.lock().unwrap();

        ffmpeg_next::init().map_err(DecodeError::backend)?;
        let ictx = ffmpeg_next::format::input(path).map_err(DecodeError::backend)?;

        let (audio_stream_index, decoder, duration_samples) = {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Audio)
                .ok_or(DecodeError::UnsupportedContainer)?;
            let codec_id = stream.parameters().id();
            let decoder =
                ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                    .map_err(DecodeError::backend)?
                    .decoder()
                    .audio()
                    .map_err(|_| DecodeError::CodecUnavailable {
                        codec: format!("{codec_id:?}"),
                    })?;
            let duration = duration_samples(&stream, ictx.duration(), decoder.rate());
            (stream.index(), decoder, duration)
        };

        let channels = decoder.channels() as u16;
        if channels > 2 {
            return Err(DecodeError::ChannelLayoutUnsupported { channels });
        }

        let layout = if decoder.channel_layout().is_empty() {
            ffmpeg_next::ChannelLayout::default(i32::from(channels))
        } else {
            decoder.channel_layout()
        };
        let resampler = ffmpeg_next::software::resampling::Context::get(
            decoder.format(),
            layout,
            decoder.rate(),
            ffmpeg_next::format::Sample::I16(ffmpeg_next::format::sample::Type::Packed),
            layout,
            decoder.rate(),
        )
        .map_err(DecodeError::backend)?;

        let info = StreamInfo {
            sample_rate: decoder.rate(),
            channels,
            duration_samples,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.audio_stream_index = audio_stream_index;
        self.decode_cursor = 0;
        self.draining = false;
        self.resampler = Some(resampler);
        self.decoder = Some(decoder);
        self.input = Some(ictx);

        Ok(info)
    }

    fn decode_next(&mut self) -> Result<Option<Segment>, DecodeError> {
        let (Some(input), Some(decoder), Some(resampler)) = (
            self.input.as_mut(),
            self.decoder.as_mut(),
            self.resampler.as_mut(),
        ) else {
            return Err(DecodeError::backend("decode_next called before open"));
        };

        let mut skipped: u32 = 0;
        loop {
            if !self.draining {
                match input.packets().next() {
                    Some((stream, packet)) => {
                        if stream.index() != self.audio_stream_index {
                            skipped += 1;
                            if skipped >= self.stall_threshold {
                                log::warn!(
                                    "{skipped} consecutive non-audio packets, treating stream as exhausted"
                                );
                                return Ok(None);
                            }
                            continue;
                        }
                        if let Err(e) = decoder.send_packet(&packet) {
                            log::warn!("dropping undecodable packet: {e}");
                            skipped += 1;
                            if skipped >= self.stall_threshold {
                                return Ok(None);
                            }
                            continue;
                        }
                        skipped = 0;
                    }
                    None => {
                        // Container exhausted; drain the codec's buffered frames.
                        self.draining = true;
                        let _ = decoder.send_eof();
                    }
                }
            }

            let pcm = receive_pcm(decoder, resampler);
            if !pcm.is_empty() {
                let segment = Segment::new(self.decode_cursor, pcm);
                self.decode_cursor = segment.end_offset();
                return Ok(Some(segment));
            }
            if self.draining {
                return Ok(None);
            }
        }
    }

    fn seek_to_origin(&mut self) -> Result<(), DecodeError> {
        let (Some(input), Some(decoder)) = (self.input.as_mut(), self.decoder.as_mut()) else {
            return Err(DecodeError::backend("seek_to_origin called before open"));
        };
        input
            .seek(0, ..SEEK_ORIGIN_TOLERANCE)
            .map_err(DecodeError::backend)?;
        decoder.flush();
        self.decode_cursor = 0;
        self.draining = false;
        Ok(())
    }

    fn close(&mut self) {
        let _guard = SETUP_LOCK.lock().unwrap();
        self.resampler = None;
        self.decoder = None;
        self.input = None;
    }
}

/// Pulls every frame currently available from the decoder and converts it to
/// packed 16-bit PCM. Frames that fail to resample are dropped whole so a
/// partial conversion never reaches the cache.
fn receive_pcm(
    decoder: &mut ffmpeg_next::decoder::Audio,
    resampler: &mut ffmpeg_next::software::resampling::Context,
) -> Vec<u8> {
    let mut pcm = Vec::new();
    let mut decoded = ffmpeg_next::util::frame::Audio::empty();
    while decoder.receive_frame(&mut decoded).is_ok() {
        let mut converted = ffmpeg_next::util::frame::Audio::empty();
        match resampler.run(&decoded, &mut converted) {
            Ok(_) => append_packed_s16(&converted, &mut pcm),
            Err(e) => log::warn!("resample failed, frame dropped: {e}"),
        }
    }
    pcm
}

/// Copies the payload of a packed 16-bit frame, stripping any alignment
/// padding past `samples * channels` values.
fn append_packed_s16(frame: &ffmpeg_next::util::frame::Audio, out: &mut Vec<u8>) {
    let bytes = frame.samples() * frame.channels() as usize * SAMPLE_BYTES;
    if bytes == 0 {
        return;
    }
    out.extend_from_slice(&frame.data(0)[..bytes]);
}

/// Stream length in sample units, preferring the stream's own duration over
/// the container-level one.
fn duration_samples(
    stream: &ffmpeg_next::format::stream::Stream,
    container_duration: i64,
    sample_rate: u32,
) -> u64 {
    let stream_duration = stream.duration();
    let den = stream.time_base().denominator();
    if stream_duration != ffmpeg_next::ffi::AV_NOPTS_VALUE && stream_duration > 0 && den > 0 {
        return sample_offset_from_timestamp(stream_duration as f64, den as u32, sample_rate)
            as u64;
    }
    if container_duration != ffmpeg_next::ffi::AV_NOPTS_VALUE && container_duration > 0 {
        return (container_duration as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)
            * f64::from(sample_rate)) as u64
            * 2;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::pcm_source::PcmSource;
    use std::io::Write;
    use std::path::PathBuf;

    /// Writes a 16-bit stereo WAV where sample `i` (counting each channel
    /// value individually) holds `i & 0x7fff`, so decoded output can be
    /// compared byte for byte.
    fn create_test_audio(path: &Path, total_frames: usize, sample_rate: u32) {
        ffmpeg_next::init().unwrap();

        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::PCM_S16LE).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .audio()
            .unwrap();
        encoder_ctx.set_rate(sample_rate as i32);
        encoder_ctx.set_channel_layout(ffmpeg_next::ChannelLayout::STEREO);
        encoder_ctx.set_format(ffmpeg_next::format::Sample::I16(
            ffmpeg_next::format::sample::Type::Packed,
        ));
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, sample_rate as i32));

        let mut encoder = encoder_ctx.open_as(codec).unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();

        let ost_time_base = octx.stream(0).unwrap().time_base();
        let enc_time_base = ffmpeg_next::Rational(1, sample_rate as i32);

        let chunk_frames = 1024usize;
        let mut written = 0usize;
        while written < total_frames {
            let frames = chunk_frames.min(total_frames - written);
            let mut frame = ffmpeg_next::util::frame::Audio::new(
                ffmpeg_next::format::Sample::I16(ffmpeg_next::format::sample::Type::Packed),
                frames,
                ffmpeg_next::ChannelLayout::STEREO,
            );
            frame.set_rate(sample_rate);
            frame.set_pts(Some(written as i64));

            let data = frame.data_mut(0);
            for i in 0..frames * 2 {
                let value = (((written * 2 + i) as u64) & 0x7fff) as i16;
                let bytes = value.to_le_bytes();
                data[i * 2] = bytes[0];
                data[i * 2 + 1] = bytes[1];
            }

            encoder.send_frame(&frame).unwrap();
            write_packets(&mut encoder, &mut octx, enc_time_base, ost_time_base);
            written += frames;
        }

        encoder.send_eof().unwrap();
        write_packets(&mut encoder, &mut octx, enc_time_base, ost_time_base);
        octx.write_trailer().unwrap();
    }

    fn write_packets(
        encoder: &mut ffmpeg_next::codec::encoder::audio::Encoder,
        octx: &mut ffmpeg_next::format::context::Output,
        enc_time_base: ffmpeg_next::Rational,
        ost_time_base: ffmpeg_next::Rational,
    ) {
        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(enc_time_base, ost_time_base);
            encoded.write_interleaved(octx).unwrap();
        }
    }

    fn expected_bytes(start_sample: u64, samples: usize) -> Vec<u8> {
        (0..samples)
            .flat_map(|i| (((start_sample + i as u64) & 0x7fff) as i16).to_le_bytes())
            .collect()
    }

    fn test_audio_path(dir: &Path) -> PathBuf {
        dir.join("test.wav")
    }

    #[test]
    fn test_open_reports_stream_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_audio_path(dir.path());
        create_test_audio(&path, 22050, 44100);

        let mut decoder = FfmpegFrameDecoder::new();
        let info = decoder.open(&path).unwrap();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.source_path, Some(path));
        // 22050 stereo frames are 44100 sample units; container headers may
        // round, so allow a little slack.
        assert!(
            (info.duration_samples as i64 - 44100).abs() <= 4096,
            "duration_samples {}",
            info.duration_samples
        );
        decoder.close();
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let mut decoder = FfmpegFrameDecoder::new();
        let path = if cfg!(windows) {
            Path::new("Z:\\nonexistent\\file.mp3")
        } else {
            Path::new("/nonexistent/file.mp3")
        };
        assert!(decoder.open(path).is_err());
    }

    #[test]
    fn test_open_file_without_audio_stream_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"this is not an audio file").unwrap();
        drop(f);

        let mut decoder = FfmpegFrameDecoder::new();
        assert!(decoder.open(&path).is_err());
    }

    #[test]
    fn test_decode_before_open_fails() {
        let mut decoder = FfmpegFrameDecoder::new();
        assert!(decoder.decode_next().is_err());
        assert!(decoder.seek_to_origin().is_err());
    }

    #[test]
    fn test_decode_is_contiguous_and_complete() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_audio_path(dir.path());
        create_test_audio(&path, 22050, 44100);

        let mut decoder = FfmpegFrameDecoder::new();
        decoder.open(&path).unwrap();

        let mut expected_start = 0u64;
        let mut pcm = Vec::new();
        while let Some(segment) = decoder.decode_next().unwrap() {
            assert_eq!(segment.start_offset(), expected_start);
            expected_start = segment.end_offset();
            pcm.extend_from_slice(segment.pcm());
        }
        // 22050 stereo frames decode losslessly to 44100 samples.
        assert_eq!(pcm.len(), 44100 * SAMPLE_BYTES);
        assert_eq!(pcm, expected_bytes(0, 44100));
    }

    #[test]
    fn test_seek_to_origin_restarts_the_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_audio_path(dir.path());
        create_test_audio(&path, 22050, 44100);

        let mut decoder = FfmpegFrameDecoder::new();
        decoder.open(&path).unwrap();

        let first = decoder.decode_next().unwrap().unwrap();
        assert_eq!(first.start_offset(), 0);
        decoder.decode_next().unwrap().unwrap();

        decoder.seek_to_origin().unwrap();
        let again = decoder.decode_next().unwrap().unwrap();
        assert_eq!(again.start_offset(), 0);

        let n = first.pcm().len().min(again.pcm().len());
        assert_eq!(&first.pcm()[..n], &again.pcm()[..n]);
    }

    #[test]
    fn test_end_of_stream_is_sticky() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_audio_path(dir.path());
        create_test_audio(&path, 1024, 44100);

        let mut decoder = FfmpegFrameDecoder::new();
        decoder.open(&path).unwrap();
        while decoder.decode_next().unwrap().is_some() {}
        assert!(decoder.decode_next().unwrap().is_none());
    }

    // ─── End-to-end through PcmSource ───

    #[test]
    fn test_half_second_stereo_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_audio_path(dir.path());
        // 0.6 s of 44.1 kHz stereo: 26460 frames, 52920 sample units.
        create_test_audio(&path, 26460, 44100);

        let mut source = PcmSource::open(Box::new(FfmpegFrameDecoder::new()), &path).unwrap();
        assert_eq!(source.info().sample_rate, 44100);
        assert_eq!(source.info().channels, 2);

        source.seek(0).unwrap();
        let outcome = source.read(0, 44100).unwrap();
        assert_eq!(outcome.pcm.len(), 44100 * SAMPLE_BYTES);
        assert_eq!(outcome.samples_filled, 44100);
        assert!(!outcome.truncated);
        assert_eq!(outcome.pcm, expected_bytes(0, 44100));

        // Asking past the end truncates with zero fill.
        let outcome = source.read(0, 60_000).unwrap();
        assert_eq!(outcome.samples_filled, 52920);
        assert!(outcome.truncated);
        assert_eq!(
            &outcome.pcm[..52920 * SAMPLE_BYTES],
            &expected_bytes(0, 52920)[..]
        );
        assert!(outcome.pcm[52920 * SAMPLE_BYTES..].iter().all(|&b| b == 0));
        source.close();
    }

    #[test]
    fn test_interior_read_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_audio_path(dir.path());
        create_test_audio(&path, 26460, 44100);

        let mut source = PcmSource::open(Box::new(FfmpegFrameDecoder::new()), &path).unwrap();
        let offset = 12_344u64;
        let outcome = source.read(offset, 2000).unwrap();
        assert_eq!(outcome.pcm, expected_bytes(offset, 2000));
        source.close();
    }
}
