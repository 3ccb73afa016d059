// Nitro-Core-DX library
// Core library for the fantasy console emulator and the CoreLX compiler

// Public modules
pub mod apu;
pub mod bus;
pub mod compiler;
pub mod cpu;
pub mod emulator;
pub mod input;
pub mod ppu;
pub mod ram;
pub mod rom;

// Re-export main types for convenience
pub use apu::{Apu, FmExtension};
pub use bus::Bus;
pub use compiler::{
    compile_file, compile_source, BuildManifest, CompileOptions, CompileResult, Diagnostic,
    Severity, Stage,
};
pub use cpu::{Cpu, CpuError, Flags};
pub use emulator::{Emulator, EmulatorConfig, SpeedMode};
pub use input::InputController;
pub use ppu::{Ppu, PpuEvent};
pub use ram::Wram;
pub use rom::{Rom, RomError, RomHeader};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_components() {
        // Every core component can be instantiated standalone
        let _cpu = Cpu::new();
        let _ppu = Ppu::new();
        let _apu = Apu::new();
        let _bus = Bus::new();
        let _input = InputController::new();
        let _wram = Wram::new();
        let _rom = Rom::empty();
    }
}
