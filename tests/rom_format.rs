// ROM format and manifest properties

mod common;

use common::*;
use nitro_core_dx::compiler::CompileOptions;
use nitro_core_dx::rom::{RomHeader, ROM_HEADER_SIZE};

const PROGRAM_WITH_ASSETS: &str = "\
asset Tiles: tiles8 hex
    60 61 62 63
asset Pal: palette hex
    00 7C
asset Save: gamedata text
    checkpoint one
function Start()
    x := 1
";

#[test]
fn test_rom_header_round_trip() {
    let result = compile(PROGRAM_WITH_ASSETS);
    assert!(result.success);
    let bytes = result.rom_bytes.expect("rom bytes");
    let manifest = result.manifest.expect("manifest");

    let header = RomHeader::parse(&bytes).expect("header parses");
    assert_eq!(header.version, 1);
    assert_eq!(header.entry_bank, 1);
    assert_eq!(header.entry_offset, 0x8000);
    assert_eq!(header.size as usize, bytes.len(), "size field is the file size");
    assert_eq!(manifest.rom_size as usize, bytes.len());
    assert!(manifest.rom_size <= manifest.planned_size);
}

#[test]
fn test_magic_bytes_exact() {
    let bytes = compile(PROGRAM_WITH_ASSETS).rom_bytes.unwrap();
    assert_eq!(&bytes[0..4], &[0x52, 0x4D, 0x43, 0x46], "ASCII RMCF");
    assert!(bytes[16..32].iter().all(|&b| b == 0), "reserved bytes zero");
}

#[test]
fn test_code_follows_header_as_le_words() {
    let result = compile("function Start()\n    x := 0x1234\n");
    let bytes = result.rom_bytes.unwrap();
    // First instruction is MOV R0, #imm; its immediate word follows
    // little-endian
    assert_eq!(bytes[ROM_HEADER_SIZE + 2], 0x34);
    assert_eq!(bytes[ROM_HEADER_SIZE + 3], 0x12);
}

#[test]
fn test_sections_follow_declared_order() {
    let result = compile(PROGRAM_WITH_ASSETS);
    let manifest = result.manifest.unwrap();
    let bytes = result.rom_bytes.unwrap();

    let names: Vec<&str> = manifest.sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        ["gfx_tiles", "tilemaps", "palettes", "audio_seq", "audio_patch", "gamedata"]
    );

    let gfx = &manifest.sections[0];
    assert_eq!(
        gfx.offset,
        manifest.code_offset + manifest.code_size,
        "first section starts right after the code"
    );
    assert_eq!(&bytes[gfx.offset as usize..gfx.offset as usize + 4], &[0x60, 0x61, 0x62, 0x63]);

    let palettes = &manifest.sections[2];
    assert_eq!(&bytes[palettes.offset as usize..palettes.offset as usize + 2], &[0x00, 0x7C]);

    let gamedata = &manifest.sections[5];
    let text = &bytes[gamedata.offset as usize..(gamedata.offset + gamedata.used) as usize];
    assert_eq!(text, b"checkpoint one");
}

#[test]
fn test_manifest_tracks_asset_positions() {
    let result = compile(PROGRAM_WITH_ASSETS);
    let manifest = result.manifest.unwrap();

    assert_eq!(manifest.assets.len(), 3);
    let tiles = &manifest.assets[0];
    assert_eq!(tiles.name, "Tiles");
    assert_eq!(tiles.kind, "tiles8");
    assert_eq!(tiles.section, "gfx_tiles");
    assert_eq!(tiles.size, 4);
    assert_eq!(tiles.line, 1, "source position carried through");
}

#[test]
fn test_section_budget_reserves_layout_space() {
    let options = CompileOptions {
        emit_rom_bytes: false,
        section_budgets: [("gfx_tiles".to_string(), 256u32)].into_iter().collect(),
        ..CompileOptions::default()
    };
    let result = compile_with(PROGRAM_WITH_ASSETS, &options);
    assert!(result.success);
    let manifest = result.manifest.unwrap();

    let gfx = &manifest.sections[0];
    assert_eq!(gfx.size, 256);
    assert_eq!(gfx.used, 4);
    assert_eq!(
        manifest.sections[1].offset,
        gfx.offset + 256,
        "later sections start past the reserved space"
    );
}

#[test]
fn test_packed_rom_boots_on_the_emulator() {
    let emulator = compile_and_run(PROGRAM_WITH_ASSETS, 1);
    assert_eq!(emulator.bus().wram().read16(0x1FFE), 1);
    assert!(emulator.cpu().halted, "entry function falls through to HLT");
}

#[test]
fn test_entry_point_override() {
    let options = CompileOptions {
        emit_rom_bytes: false,
        entry_bank: 2,
        entry_offset: 0x9000,
        ..CompileOptions::default()
    };
    let result = compile_with("function Start()\n    x := 1\n", &options);
    let header = RomHeader::parse(&result.rom_bytes.unwrap()).unwrap();
    assert_eq!(header.entry_bank, 2);
    assert_eq!(header.entry_offset, 0x9000);
}
