pub mod ffmpeg_frame_decoder;
