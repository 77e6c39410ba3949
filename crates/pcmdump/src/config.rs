use std::path::PathBuf;

pub use pcm_pipeline::PipelineConfig;

/// Which read API the dump loop drives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DumpMode {
    /// Whole sample buffers per write.
    #[default]
    Buffers,
    /// One `f32` at a time.
    Samples,
    /// One byte of the `f32le` stream at a time.
    Bytes,
}

/// Search resolution for the tempo estimate; finer is slower.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum BpmPrecision {
    Rough,
    #[default]
    Normal,
    Fine,
}

#[derive(Clone, Debug)]
pub struct DumpConfig {
    pub path: PathBuf,
    pub mode: DumpMode,
    /// Print an estimated tempo instead of dumping samples.
    pub bpm: Option<BpmPrecision>,
    pub pipeline: PipelineConfig,
}
