/// Output sample rate every pipeline converts to unless configured otherwise.
pub const DEFAULT_TARGET_RATE: u32 = 44_100;

/// Tuning parameters fixed at pipeline construction.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Output sample rate in Hz (mono, `f32`).
    pub target_rate: u32,
    /// Resampler input chunk size in frames; also the steady-state output block granularity.
    pub chunk_frames: usize,
}

impl Default for PipelineConfig {
    /// Defaults match the classic `f32le`/mono/44.1 kHz dump format.
    fn default() -> Self {
        Self {
            target_rate: DEFAULT_TARGET_RATE,
            chunk_frames: 1024,
        }
    }
}
