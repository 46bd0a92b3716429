use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use pcmseek_core::decode::infrastructure::ffmpeg_frame_decoder::FfmpegFrameDecoder;
use pcmseek_core::shared::constants::{DEFAULT_STALL_THRESHOLD, FRAME_SAMPLES, SAMPLE_BYTES};
use pcmseek_core::source::pcm_source::PcmSource;

/// Random-access PCM extraction from compressed audio.
#[derive(Parser)]
#[command(name = "pcmseek")]
struct Cli {
    /// Input audio file.
    input: PathBuf,

    /// Output file for raw 16-bit PCM (omit to only print stream info).
    output: Option<PathBuf>,

    /// Sample offset to seek to before reading.
    #[arg(long, default_value = "0")]
    offset: u64,

    /// Number of samples to read (default: through the end of the stream).
    #[arg(long)]
    samples: Option<usize>,

    /// Packets of other streams tolerated before assuming end of stream.
    #[arg(long, default_value_t = DEFAULT_STALL_THRESHOLD)]
    stall_threshold: u32,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let decoder = FfmpegFrameDecoder::with_stall_threshold(cli.stall_threshold);
    let mut source = PcmSource::open(Box::new(decoder), &cli.input)?;
    let info = source.info().clone();

    let seconds =
        info.duration_samples as f64 / (f64::from(info.sample_rate) * FRAME_SAMPLES as f64);
    println!("codec:        {}", info.codec);
    println!("sample rate:  {} Hz", info.sample_rate);
    println!("channels:     {}", info.channels);
    println!("duration:     {} samples (~{seconds:.1} s)", info.duration_samples);

    let Some(output) = cli.output else {
        return Ok(());
    };

    source.seek(cli.offset)?;
    let total = match cli.samples {
        Some(n) => n,
        None => info.duration_samples.saturating_sub(cli.offset) as usize,
    };

    let mut out = File::create(&output)?;
    let mut offset = cli.offset;
    let mut remaining = total;
    let mut written = 0usize;
    while remaining > 0 {
        let chunk = remaining.min(65536);
        let outcome = source.read(offset, chunk)?;
        out.write_all(&outcome.pcm[..outcome.samples_filled * SAMPLE_BYTES])?;
        written += outcome.samples_filled;
        offset += chunk as u64;
        remaining -= chunk;
        if outcome.truncated {
            log::info!("stream ended {remaining} samples short of the request");
            break;
        }
    }

    println!("wrote {written} samples to {}", output.display());
    source.close();
    Ok(())
}
