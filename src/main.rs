// Nitro-Core-DX emulator - main entry point
//
// Headless driver: loads an RMCF ROM and runs it frame by frame. With
// `-frames N` it runs exactly N frames free-running and writes a PNG of
// the final framebuffer; without it, it runs frame-limited until the CPU
// halts. The windowed presentation layer lives outside this binary.
//
// Usage: nitro-core-dx -rom <path> [-scale <n>] [-frames <N>]

use nitro_core_dx::emulator::{screenshot_path, Emulator, SpeedMode};
use std::path::Path;
use std::process::ExitCode;

struct Args {
    rom: String,
    scale: Option<u32>,
    frames: Option<u64>,
}

fn parse_args() -> Result<Args, String> {
    let mut rom = None;
    let mut scale = None;
    let mut frames = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-rom" => {
                rom = Some(iter.next().ok_or("-rom requires a path")?);
            }
            "-scale" => {
                let value = iter.next().ok_or("-scale requires a number")?;
                scale = Some(value.parse::<u32>().map_err(|_| "invalid -scale value")?);
            }
            "-frames" => {
                let value = iter.next().ok_or("-frames requires a number")?;
                frames = Some(value.parse::<u64>().map_err(|_| "invalid -frames value")?);
            }
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }

    let rom = rom.ok_or("usage: nitro-core-dx -rom <path> [-scale <n>] [-frames <N>]")?;
    Ok(Args { rom, scale, frames })
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    println!("Nitro-Core-DX v0.1.0");
    println!("====================");

    let mut emulator = Emulator::new();
    if let Err(e) = emulator.load_rom(&args.rom) {
        eprintln!("failed to load '{}': {}", args.rom, e);
        return ExitCode::FAILURE;
    }
    println!("loaded ROM '{}'", args.rom);

    let headless_frames = args.frames;
    if headless_frames.is_some() {
        emulator.set_speed_mode(SpeedMode::FreeRunning);
    }

    let mut frames_run: u64 = 0;
    loop {
        if let Err(e) = emulator.run_frame() {
            eprintln!("CPU fault: {}", e);
            return ExitCode::FAILURE;
        }
        frames_run += 1;

        match headless_frames {
            Some(limit) if frames_run >= limit => break,
            None if emulator.cpu().halted => break,
            _ => {}
        }
    }
    println!("ran {} frames", frames_run);

    // Dump the final framebuffer
    let stem = Path::new(&args.rom)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    let config = emulator.config();
    let path = screenshot_path(
        &config.screenshot.screenshot_directory,
        &stem,
        config.screenshot.include_timestamp,
    );

    let (width, height) = emulator.bus().ppu().dimensions();
    let scale = args.scale.unwrap_or(config.video.scale) as usize;
    let result = nitro_core_dx::emulator::save_screenshot(
        emulator.framebuffer(),
        width,
        height,
        scale,
        &path,
    );
    match result {
        Ok(()) => println!("screenshot written to {}", path.display()),
        Err(e) => eprintln!("screenshot failed: {}", e),
    }

    ExitCode::SUCCESS
}
