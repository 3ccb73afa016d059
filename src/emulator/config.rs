// Configuration management
//
// Handles emulator configuration, settings persistence, and speed
// control.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Default configuration file path
const CONFIG_FILE: &str = "emulator_config.toml";

/// Default CPU cycle budget per frame
///
/// Tuned so CPU progress stays in rough proportion to the 76,500 PPU
/// dots a frame burns; a busy-poll loop must stay alive across the
/// whole frame (about 19,000 instructions at the 4-dot interleave) or
/// it would never observe VBlank.
pub const DEFAULT_CPU_CYCLES_PER_FRAME: u64 = 60_000;

/// Speed control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeedMode {
    /// Sleep toward 60 frames per wall-clock second
    FrameLimited,
    /// Run frames as fast as the host allows
    FreeRunning,
}

/// Emulator configuration
///
/// Stores all user-configurable settings for the emulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Video settings
    pub video: VideoConfig,

    /// Timing settings
    pub timing: TimingConfig,

    /// Screenshot settings
    pub screenshot: ScreenshotConfig,
}

/// Video configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Output scale factor (1-8)
    pub scale: u32,
}

/// Timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// CPU cycle budget per frame
    pub cpu_cycles_per_frame: u64,

    /// Target FPS for the frame-limited mode
    pub fps: u32,
}

/// Screenshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    /// Screenshot directory
    pub screenshot_directory: PathBuf,

    /// Include timestamp in filename
    pub include_timestamp: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            video: VideoConfig { scale: 2 },
            timing: TimingConfig {
                cpu_cycles_per_frame: DEFAULT_CPU_CYCLES_PER_FRAME,
                fps: 60,
            },
            screenshot: ScreenshotConfig {
                screenshot_directory: PathBuf::from("screenshots"),
                include_timestamp: true,
            },
        }
    }
}

impl EmulatorConfig {
    /// Load configuration from the default path, falling back to the
    /// built-in defaults on any failure
    pub fn load_or_default() -> Self {
        Self::load(CONFIG_FILE).unwrap_or_default()
    }

    /// Load configuration from a TOML file
    pub fn load(path: &str) -> Result<Self, io::Error> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &str) -> Result<(), io::Error> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)
    }
}
