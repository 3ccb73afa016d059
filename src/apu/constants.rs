// APU constants

/// Number of tone channels
pub(super) const CHANNEL_COUNT: usize = 4;

/// Bytes of register space per channel
pub(super) const CHANNEL_STRIDE: u16 = 8;

/// Output sample rate in Hz
pub(super) const SAMPLE_RATE: u32 = 44_100;

/// PPU dots per second (76,500 dots/frame x 60 frames)
pub(super) const DOTS_PER_SECOND: u32 = 4_590_000;

/// Upper bound on queued output samples before old ones are dropped
pub(super) const SAMPLE_QUEUE_CAP: usize = 16_384;

/// Entries in the quarter-wave sine table
pub(super) const SINE_QUARTER_LEN: usize = 64;

/// LFSR seed for the noise generator (must be nonzero)
pub(super) const NOISE_SEED: u16 = 1;

/// Dots per Timer A tick in the FM extension
pub(super) const FM_TIMER_DOTS_PER_TICK: u32 = 16;
