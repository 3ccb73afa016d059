// End-to-end compiler scenarios
//
// Each test drives literal CoreLX source through the full pipeline and,
// where the expectation is about machine state, runs the produced ROM
// on the emulator and inspects VRAM/CGRAM/OAM through the bus.

mod common;

use common::*;
use nitro_core_dx::compiler::{CompileOptions, Severity, Stage};

// ========================================
// Diagnostics Scenarios
// ========================================

#[test]
fn test_missing_entry_point() {
    let result = compile("function Nope()\n    apu.enable()\n");

    assert!(!result.success);
    assert_eq!(result.diagnostics.len(), 1, "exactly one diagnostic");
    let diagnostic = &result.diagnostics[0];
    assert_eq!(diagnostic.code, "E_MISSING_ENTRYPOINT");
    assert_eq!(diagnostic.stage, Stage::Semantic);
    assert_eq!(diagnostic.severity, Severity::Error);
}

#[test]
fn test_duplicate_asset_reports_prior_position() {
    let source = "\
asset Tiles: tiles8 hex
    60
asset Tiles: tiles8 hex
    61
function Start()
    return
";
    let result = compile(source);

    assert!(!result.success);
    let diagnostic = result
        .diagnostics
        .iter()
        .find(|d| d.code == "E_ASSET_DUPLICATE")
        .expect("duplicate asset diagnostic");
    assert_eq!(diagnostic.related.len(), 1);
    assert_eq!(diagnostic.related[0].pos.line, 1, "prior declaration attached");
    assert_eq!(diagnostic.range.start.line, 3);
}

#[test]
fn test_rom_budget_overflow() {
    let options = CompileOptions {
        emit_rom_bytes: false,
        max_rom_bytes: Some(16),
        ..CompileOptions::default()
    };
    let result = compile_with("function Start()\n    x := 1\n", &options);

    assert!(!result.success);
    let diagnostic = result
        .diagnostics
        .iter()
        .find(|d| d.code == "E_OVERFLOW_ROM")
        .expect("overflow diagnostic");
    assert_eq!(diagnostic.stage, Stage::Pack);
}

// ========================================
// Palette Scenario
// ========================================

#[test]
fn test_palette_write_lands_in_cgram() {
    let source = "\
function Start()
    gfx.set_palette(1, 1, 0x7C00)
    while true
        wait_vblank()
";
    let emulator = compile_and_run(source, 2);

    // Palette 1 color 1 -> CGRAM bytes 34/35, no index doubling
    let cgram = emulator.bus().ppu().cgram();
    assert_eq!(cgram[34], 0x00);
    assert_eq!(cgram[35], 0x7C);
}

#[test]
fn test_palette_write_runtime_arguments() {
    let source = "\
function Start()
    p := 2
    c := 3
    gfx.set_palette(p, c, 0x03E0)
    while true
        wait_vblank()
";
    let emulator = compile_and_run(source, 2);

    let index = (2 * 16 + 3) * 2;
    let cgram = emulator.bus().ppu().cgram();
    assert_eq!(cgram[index], 0xE0);
    assert_eq!(cgram[index + 1], 0x03);
}

// ========================================
// Tile Loading Scenarios
// ========================================

#[test]
fn test_tileset_payload_reaches_vram() {
    let payload: Vec<String> = (0..4).map(|_| "60 ".repeat(16).trim_end().to_string()).collect();
    let source = format!(
        "asset Big: tileset hex\n    {}\nfunction Start()\n    gfx.load_tiles(ASSET_Big, 0)\n    while true\n        wait_vblank()\n",
        payload.join("\n    ")
    );
    let emulator = compile_and_run(&source, 2);

    let vram = emulator.bus().ppu().vram();
    assert!(
        vram[0..64].iter().all(|&b| b == 0x60),
        "all 64 payload bytes streamed to VRAM"
    );
    assert_eq!(vram[64], 0, "nothing past the payload");
}

#[test]
fn test_load_tiles_at_nonzero_base() {
    let source = "\
asset Tiles: tiles8 hex
    AA BB CC DD
function Start()
    gfx.load_tiles(ASSET_Tiles, 2)
    while true
        wait_vblank()
";
    let emulator = compile_and_run(source, 2);

    // 8x8 tiles address VRAM at base*32
    let vram = emulator.bus().ppu().vram();
    assert_eq!(&vram[64..68], &[0xAA, 0xBB, 0xCC, 0xDD]);
    assert_eq!(vram[0], 0);
}

#[test]
fn test_runtime_asset_dispatch() {
    let a_line = "11 ".repeat(64).trim_end().to_string();
    let b_line = "22 ".repeat(64).trim_end().to_string();
    let source = format!(
        "asset A: tileset hex\n    {}\nasset B: tileset hex\n    {}\nfunction Start()\n    id := ASSET_B\n    base := gfx.load_tiles(id, 0)\n    while true\n        wait_vblank()\n",
        a_line, b_line
    );
    let emulator = compile_and_run(&source, 2);

    let vram = emulator.bus().ppu().vram();
    assert!(
        vram[0..32].iter().all(|&b| b == 0x22),
        "the dispatched asset's bytes reach VRAM"
    );
    // The dispatch returned the VRAM base as the call's value
    assert_eq!(emulator.bus().wram().read16(0x1FFC), 0, "base 0 * 32");
}

#[test]
fn test_sprite_asset_uses_16x16_addressing() {
    let source = "\
asset Hero: sprite hex
    10 20 30 40
function Start()
    gfx.load_tiles(ASSET_Hero, 1)
    while true
        wait_vblank()
";
    let emulator = compile_and_run(source, 2);

    // 16x16 kinds address VRAM at base*128
    let vram = emulator.bus().ppu().vram();
    assert_eq!(&vram[128..132], &[0x10, 0x20, 0x30, 0x40]);
}

// ========================================
// Machine Interaction Scenarios
// ========================================

#[test]
fn test_oam_write_requires_vblank() {
    // Without waiting for VBlank the write is dropped
    let dropped = compile_and_run(
        "function Start()\n    oam.write_sprite_data(0, 10, 20, 3, 0, 1)\n",
        1,
    );
    assert!(
        dropped.bus().ppu().oam()[0..6].iter().all(|&b| b == 0),
        "visible-scanline OAM writes are ignored"
    );

    // The identical write after wait_vblank lands
    let landed = compile_and_run(
        "function Start()\n    wait_vblank()\n    oam.write_sprite_data(0, 10, 20, 3, 0, 1)\n",
        1,
    );
    assert_eq!(
        &landed.bus().ppu().oam()[0..6],
        &[10, 0, 20, 3, 0, 1],
        "VBlank OAM writes are honored"
    );
}

#[test]
fn test_vblank_counter_tracks_frames() {
    let source = "\
function Start()
    c := 0
    while true
        wait_vblank()
        c = c + 1
";
    let emulator = compile_and_run(source, 3);
    assert_eq!(
        emulator.bus().wram().read16(0x1FFE),
        3,
        "one wait_vblank completion per frame"
    );
}

#[test]
fn test_apu_play_one_shot_completion() {
    let source = "\
function Start()
    apu.play(0, 440, 200, 2)
";
    let mut emulator = compile_and_run(source, 3);

    let apu = emulator.bus_mut().apu_mut();
    assert_eq!(
        apu.read_port(0x9021),
        0x01,
        "channel 0 completed after its 2-frame duration"
    );
    assert_eq!(apu.read_port(0x9021), 0, "completion bits clear on read");
    assert_eq!(
        apu.read_port(0x9003) & 0x01,
        0,
        "channel enable cleared by the one-shot expiry"
    );
}

#[test]
fn test_input_read_builtin() {
    let source = "\
function Start()
    b := input.read()
";
    let mut emulator = boot(compile_rom(source));
    emulator.set_buttons(0x0101); // A + START
    emulator.run_frame().expect("frame");

    assert_eq!(emulator.bus().wram().read16(0x1FFE), 0x0101);
}

#[test]
fn test_ppu_scroll_and_enable() {
    let source = "\
function Start()
    ppu.enable_bg0()
    ppu.set_scroll(300, 100)
";
    let mut emulator = boot(compile_rom(source));
    emulator.run_frame().expect("frame");

    let ppu = emulator.bus().ppu();
    assert!(ppu.bg0_enabled());
    assert_eq!(ppu.scroll(), (300, 100));
}

#[test]
fn test_sprite_set_position_updates_oam() {
    let source = "\
function Start()
    wait_vblank()
    oam.write_sprite_data(5, 10, 20, 3, 0, 1)
    wait_vblank()
    sprite.set_position(5, 200, 90)
";
    let emulator = compile_and_run(source, 3);

    let base = 5 * 6;
    let oam = emulator.bus().ppu().oam();
    assert_eq!(oam[base], 200, "X low rewritten");
    assert_eq!(oam[base + 2], 90, "Y rewritten");
    assert_eq!(oam[base + 3], 3, "tile untouched");
    assert_eq!(oam[base + 5], 1, "ctrl untouched");
}
