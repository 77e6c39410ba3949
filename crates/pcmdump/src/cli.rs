use std::path::PathBuf;

use clap::Parser;
use pcm_pipeline::PipelineConfig;

use crate::config::{BpmPrecision, DumpConfig, DumpMode};

#[derive(Parser, Debug)]
#[command(
    name = "pcmdump",
    version,
    about = "Decode an audio file to raw f32le mono PCM on stdout",
    after_help = "Example: pcmdump song.flac | ffplay -f f32le -ar 44100 -ac 1 -"
)]
pub struct Args {
    /// Path to audio file
    pub path: PathBuf,

    /// How output is pulled from the pipeline (all modes write the same bytes)
    #[arg(long, value_enum, default_value_t = DumpMode::Buffers)]
    pub mode: DumpMode,

    /// Print the estimated tempo instead of samples (`--bpm=rough|normal|fine`)
    #[arg(
        long,
        value_enum,
        value_name = "PRECISION",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "normal"
    )]
    pub bpm: Option<BpmPrecision>,

    /// Resampler input chunk size in frames (higher => fewer, larger writes)
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,
}

impl Args {
    pub fn into_config(self) -> DumpConfig {
        DumpConfig {
            path: self.path,
            mode: self.mode,
            bpm: self.bpm,
            pipeline: PipelineConfig {
                chunk_frames: self.chunk_frames,
                ..PipelineConfig::default()
            },
        }
    }
}
