// Common test utilities for compile-and-run integration tests
//
// These helpers drive the real pipeline end to end: CoreLX source in,
// RMCF bytes out, loaded into the emulator and run for a number of
// frames.

#![allow(dead_code)]

use nitro_core_dx::compiler::{compile_source, CompileOptions, CompileResult};
use nitro_core_dx::emulator::{Emulator, EmulatorConfig, SpeedMode};
use nitro_core_dx::rom::Rom;

/// Compile without writing any artifact files
pub fn compile(source: &str) -> CompileResult {
    let options = CompileOptions {
        emit_rom_bytes: false,
        ..CompileOptions::default()
    };
    compile_source(source, "test.clx", &options)
}

/// Compile with explicit options (still no artifact files by default)
pub fn compile_with(source: &str, options: &CompileOptions) -> CompileResult {
    compile_source(source, "test.clx", options)
}

/// Compile, asserting success, and return the ROM image
pub fn compile_rom(source: &str) -> Rom {
    let result = compile(source);
    assert!(
        result.success,
        "compile failed: {:?}",
        result
            .diagnostics
            .iter()
            .map(|d| d.one_line())
            .collect::<Vec<_>>()
    );
    Rom::from_bytes(result.rom_bytes.expect("rom bytes")).expect("valid RMCF image")
}

/// Build a free-running emulator with the ROM loaded
pub fn boot(rom: Rom) -> Emulator {
    let mut emulator = Emulator::with_config(EmulatorConfig::default());
    emulator.set_speed_mode(SpeedMode::FreeRunning);
    emulator.load_rom_image(rom);
    emulator
}

/// Compile source and run it for `frames` full frames
pub fn compile_and_run(source: &str, frames: u32) -> Emulator {
    let mut emulator = boot(compile_rom(source));
    for _ in 0..frames {
        emulator.run_frame().expect("frame should not fault");
    }
    emulator
}
