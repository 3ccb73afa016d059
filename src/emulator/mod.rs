// Emulator module - main emulator coordinator
//
// Owns the CPU and the Bus (which in turn owns every device) and drives
// them in lockstep: each frame walks all 76,500 PPU dots, stepping the
// CPU once every fourth dot while the frame's cycle budget lasts and
// advancing the APU's sample clock every dot. Everything is single
// threaded; the only blocking is the optional frame-pacing sleep.

mod config;
mod screenshot;

pub use config::{EmulatorConfig, SpeedMode, DEFAULT_CPU_CYCLES_PER_FRAME};
pub use screenshot::{save_screenshot, screenshot_path, ScreenshotError};

use crate::bus::Bus;
use crate::cpu::{Cpu, CpuError};
use crate::ppu::PpuEvent;
use crate::rom::{Rom, RomError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// PPU dots between CPU instruction steps
const CPU_STEP_INTERVAL_DOTS: u32 = 4;

/// Main emulator structure
///
/// Coordinates all components and exposes the per-frame stepping API.
pub struct Emulator {
    /// CPU
    cpu: Cpu,

    /// Bus (owns WRAM, ROM, PPU, APU, input)
    bus: Bus,

    /// Configuration
    config: EmulatorConfig,

    /// Speed mode
    speed_mode: SpeedMode,

    /// Currently loaded ROM path
    rom_path: Option<PathBuf>,

    /// Frame timing for the frame-limited mode
    last_frame_time: Option<Instant>,
}

impl Emulator {
    /// Create a new emulator with no ROM loaded
    pub fn new() -> Self {
        Emulator {
            cpu: Cpu::new(),
            bus: Bus::new(),
            config: EmulatorConfig::load_or_default(),
            speed_mode: SpeedMode::FrameLimited,
            rom_path: None,
            last_frame_time: None,
        }
    }

    /// Create an emulator with an explicit configuration (tests, tools)
    pub fn with_config(config: EmulatorConfig) -> Self {
        Emulator {
            cpu: Cpu::new(),
            bus: Bus::new(),
            config,
            speed_mode: SpeedMode::FreeRunning,
            rom_path: None,
            last_frame_time: None,
        }
    }

    /// Load a ROM file and reset the machine to its entry point
    pub fn load_rom<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RomError> {
        let rom = Rom::from_file(path.as_ref())?;
        self.rom_path = Some(path.as_ref().to_path_buf());
        self.load_rom_image(rom);
        Ok(())
    }

    /// Load an in-memory ROM image and reset the machine
    pub fn load_rom_image(&mut self, rom: Rom) {
        let (bank, offset) = rom.entry();
        self.bus.load_rom(rom);
        self.cpu.reset(bank, offset);
    }

    /// Set the speed mode (frame-limited or free-running)
    pub fn set_speed_mode(&mut self, mode: SpeedMode) {
        self.speed_mode = mode;
    }

    /// Path of the loaded ROM, if any
    pub fn rom_path(&self) -> Option<&Path> {
        self.rom_path.as_deref()
    }

    /// Latch the host's button bitmask into the input controller
    pub fn set_buttons(&mut self, buttons: u16) {
        self.bus.input_mut().set_buttons(buttons);
    }

    /// Run one complete frame
    ///
    /// Advances the PPU dot by dot; every fourth dot the CPU executes one
    /// instruction while the frame's cycle budget is not exhausted and
    /// the CPU is not halted. The APU's sample clock advances each dot
    /// and receives its per-frame duration tick on the VBlank
    /// transition. Returns when the PPU wraps at scanline 224 dot 339.
    ///
    /// A CPU decode failure aborts the frame and propagates; MMIO state
    /// mutated before the failure is left in place.
    pub fn run_frame(&mut self) -> Result<(), CpuError> {
        let budget = self.config.timing.cpu_cycles_per_frame;
        let mut cycles_used: u64 = 0;
        let mut dot_index: u32 = 0;

        loop {
            if dot_index % CPU_STEP_INTERVAL_DOTS == 0
                && cycles_used < budget
                && !self.cpu.halted
            {
                cycles_used += self.cpu.step(&mut self.bus)? as u64;
            }

            let event = self.bus.ppu_mut().step_dot();
            self.bus.apu_mut().step_dot();
            dot_index += 1;

            match event {
                PpuEvent::VBlankStart => self.bus.apu_mut().end_frame(),
                PpuEvent::FrameEnd => break,
                PpuEvent::None => {}
            }
        }

        if self.speed_mode == SpeedMode::FrameLimited {
            self.pace_frame();
        }
        Ok(())
    }

    /// Sleep toward the configured frames-per-second target
    fn pace_frame(&mut self) {
        let frame_duration = Duration::from_secs(1) / self.config.timing.fps.max(1);
        let now = Instant::now();
        if let Some(last) = self.last_frame_time {
            let elapsed = now.duration_since(last);
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
        self.last_frame_time = Some(Instant::now());
    }

    /// Save the current framebuffer as a PNG using the configured scale
    pub fn save_screenshot<P: AsRef<Path>>(&self, path: P) -> Result<(), ScreenshotError> {
        let (width, height) = self.bus.ppu().dimensions();
        save_screenshot(
            self.bus.ppu().framebuffer(),
            width,
            height,
            self.config.video.scale as usize,
            path,
        )
    }

    // ========================================
    // Inspection
    // ========================================

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// The PPU's framebuffer (320x200, row-major 0x00RRGGBB)
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.ppu().framebuffer()
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}
