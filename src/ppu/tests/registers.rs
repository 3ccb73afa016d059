//! PPU register and port behavior tests

use super::*;

// ========================================
// VRAM Port Tests
// ========================================

#[test]
fn test_vram_write_auto_increment() {
    let mut ppu = Ppu::new();
    ppu.write_port(ports::VRAM_ADDR_LO, 0x10);
    ppu.write_port(ports::VRAM_ADDR_HI, 0x00);

    ppu.write_port(ports::VRAM_DATA, 0xAA);
    ppu.write_port(ports::VRAM_DATA, 0xBB);
    ppu.write_port(ports::VRAM_DATA, 0xCC);

    assert_eq!(ppu.vram()[0x0010], 0xAA);
    assert_eq!(ppu.vram()[0x0011], 0xBB);
    assert_eq!(ppu.vram()[0x0012], 0xCC);
}

#[test]
fn test_vram_read_auto_increment() {
    let mut ppu = Ppu::new();
    ppu.poke_vram(0x0200, 0x11);
    ppu.poke_vram(0x0201, 0x22);

    ppu.write_port(ports::VRAM_ADDR_LO, 0x00);
    ppu.write_port(ports::VRAM_ADDR_HI, 0x02);

    assert_eq!(ppu.read_port(ports::VRAM_DATA), 0x11);
    assert_eq!(ppu.read_port(ports::VRAM_DATA), 0x22);
}

#[test]
fn test_vram_address_latch_little_endian() {
    let mut ppu = Ppu::new();
    ppu.write_port(ports::VRAM_ADDR_LO, 0x34);
    ppu.write_port(ports::VRAM_ADDR_HI, 0x12);
    ppu.write_port(ports::VRAM_DATA, 0x99);
    assert_eq!(ppu.vram()[0x1234], 0x99);
}

#[test]
fn test_vram_address_wraps() {
    let mut ppu = Ppu::new();
    ppu.write_port(ports::VRAM_ADDR_LO, 0xFF);
    ppu.write_port(ports::VRAM_ADDR_HI, 0xFF);
    ppu.write_port(ports::VRAM_DATA, 0x01);
    ppu.write_port(ports::VRAM_DATA, 0x02);
    assert_eq!(ppu.vram()[0xFFFF], 0x01);
    assert_eq!(ppu.vram()[0x0000], 0x02, "address wraps to 0");
}

// ========================================
// CGRAM Port Tests
// ========================================

#[test]
fn test_cgram_write_commits_on_high_byte() {
    let mut ppu = Ppu::new();
    // Palette 1 color 1 -> index 17, bytes 34/35. No doubling of the
    // index beyond the x2 byte addressing.
    ppu.write_port(ports::CGRAM_ADDR, 17);
    ppu.write_port(ports::CGRAM_DATA, 0x00);
    assert_eq!(ppu.cgram()[34], 0x00, "low byte not committed yet");
    ppu.write_port(ports::CGRAM_DATA, 0x7C);

    assert_eq!(ppu.cgram()[34], 0x00);
    assert_eq!(ppu.cgram()[35], 0x7C);
}

#[test]
fn test_cgram_index_advances_after_commit() {
    let mut ppu = Ppu::new();
    ppu.write_port(ports::CGRAM_ADDR, 4);
    ppu.write_port(ports::CGRAM_DATA, 0x1F);
    ppu.write_port(ports::CGRAM_DATA, 0x00);
    // Next pair lands on index 5
    ppu.write_port(ports::CGRAM_DATA, 0xE0);
    ppu.write_port(ports::CGRAM_DATA, 0x03);

    assert_eq!(ppu.cgram()[8], 0x1F);
    assert_eq!(ppu.cgram()[9], 0x00);
    assert_eq!(ppu.cgram()[10], 0xE0);
    assert_eq!(ppu.cgram()[11], 0x03);
}

#[test]
fn test_cgram_addr_write_resets_phase() {
    let mut ppu = Ppu::new();
    ppu.write_port(ports::CGRAM_ADDR, 0);
    ppu.write_port(ports::CGRAM_DATA, 0xAA); // latched low, not committed
    ppu.write_port(ports::CGRAM_ADDR, 2); // resets the latch
    ppu.write_port(ports::CGRAM_DATA, 0x11);
    ppu.write_port(ports::CGRAM_DATA, 0x22);

    assert_eq!(ppu.cgram()[0], 0x00, "interrupted write never lands");
    assert_eq!(ppu.cgram()[4], 0x11);
    assert_eq!(ppu.cgram()[5], 0x22);
}

#[test]
fn test_cgram_read_low_then_high() {
    let mut ppu = Ppu::new();
    ppu.poke_cgram(3, 0x7C1F);
    ppu.poke_cgram(4, 0x03E0);

    ppu.write_port(ports::CGRAM_ADDR, 3);
    assert_eq!(ppu.read_port(ports::CGRAM_DATA), 0x1F, "low byte first");
    assert_eq!(ppu.read_port(ports::CGRAM_DATA), 0x7C, "high byte second");
    // Index advanced to 4
    assert_eq!(ppu.read_port(ports::CGRAM_DATA), 0xE0);
    assert_eq!(ppu.read_port(ports::CGRAM_DATA), 0x03);
}

#[test]
fn test_cgram_full_palette_addressing() {
    let mut ppu = Ppu::new();
    for p in 0..16u16 {
        for c in 0..16u16 {
            let index = (p * 16 + c) as u8;
            ppu.write_port(ports::CGRAM_ADDR, index);
            ppu.write_port(ports::CGRAM_DATA, index);
            ppu.write_port(ports::CGRAM_DATA, 0x40 | (index >> 4));
        }
    }
    // Spot-check the law: entry (p*16+c) lives at bytes 2*(p*16+c)
    let index = 7 * 16 + 9;
    assert_eq!(ppu.cgram()[index * 2], index as u8);
    assert_eq!(ppu.cgram()[index * 2 + 1], 0x40 | (index as u8 >> 4));
}

// ========================================
// OAM Port Tests
// ========================================

#[test]
fn test_oam_write_during_vblank() {
    let mut ppu = Ppu::new();
    ppu.scanline = 200; // inside VBlank

    ppu.write_port(ports::OAM_ADDR, 2);
    for byte in [0x10, 0x00, 0x20, 0x05, 0x01, 0x03] {
        ppu.write_port(ports::OAM_DATA, byte);
    }

    let base = 2 * SPRITE_BYTES;
    assert_eq!(&ppu.oam()[base..base + 6], &[0x10, 0x00, 0x20, 0x05, 0x01, 0x03]);
}

#[test]
fn test_oam_write_outside_vblank_ignored() {
    let mut ppu = Ppu::new();
    assert!(!ppu.in_vblank());

    ppu.write_port(ports::OAM_ADDR, 0);
    ppu.write_port(ports::OAM_DATA, 0xFF);

    assert_eq!(ppu.oam()[0], 0, "visible-scanline write must be dropped");

    // An identical write during VBlank lands
    ppu.scanline = 210;
    ppu.write_port(ports::OAM_DATA, 0xFF);
    assert_eq!(ppu.oam()[0], 0xFF);
}

#[test]
fn test_oam_dropped_write_does_not_advance() {
    let mut ppu = Ppu::new();
    ppu.write_port(ports::OAM_ADDR, 0);
    ppu.write_port(ports::OAM_DATA, 0x11); // dropped, index stays 0

    ppu.scanline = 200;
    ppu.write_port(ports::OAM_DATA, 0x22);
    assert_eq!(ppu.oam()[0], 0x22, "first honored write lands at byte 0");
}

#[test]
fn test_oam_byte_index_wraps_to_next_sprite() {
    let mut ppu = Ppu::new();
    ppu.scanline = 200;

    ppu.write_port(ports::OAM_ADDR, 0);
    for byte in 0..7u8 {
        ppu.write_port(ports::OAM_DATA, 0xA0 | byte);
    }

    assert_eq!(ppu.oam()[5], 0xA5, "sixth byte finishes sprite 0");
    assert_eq!(ppu.oam()[6], 0xA6, "seventh byte starts sprite 1");
}

#[test]
fn test_oam_addr_resets_byte_index() {
    let mut ppu = Ppu::new();
    ppu.scanline = 200;

    ppu.write_port(ports::OAM_ADDR, 1);
    ppu.write_port(ports::OAM_DATA, 0x55);
    ppu.write_port(ports::OAM_DATA, 0x66);
    // Re-select sprite 1: the byte index rewinds to 0
    ppu.write_port(ports::OAM_ADDR, 1);
    ppu.write_port(ports::OAM_DATA, 0x77);

    assert_eq!(ppu.oam()[SPRITE_BYTES], 0x77);
    assert_eq!(ppu.oam()[SPRITE_BYTES + 1], 0x66);
}

// ========================================
// Status and Scroll Tests
// ========================================

#[test]
fn test_vblank_flag_read_idempotent() {
    let mut ppu = Ppu::new();
    step_to_vblank(&mut ppu);

    assert_eq!(ppu.read_port(ports::VBLANK_FLAG), 1);
    assert_eq!(
        ppu.read_port(ports::VBLANK_FLAG),
        1,
        "reads within one VBlank period see the same value"
    );
}

#[test]
fn test_frame_counter_ports() {
    let mut ppu = Ppu::new();
    assert_eq!(ppu.read_port(ports::FRAME_LO), 0);
    assert_eq!(ppu.read_port(ports::FRAME_HI), 0);

    for _ in 0..3 {
        step_frame(&mut ppu);
    }

    assert_eq!(ppu.read_port(ports::FRAME_LO), 3);
    assert_eq!(ppu.read_port(ports::FRAME_HI), 0);
}

#[test]
fn test_bg0_control() {
    let mut ppu = Ppu::new();
    assert_eq!(ppu.read_port(ports::BG0_CONTROL), 0);
    ppu.write_port(ports::BG0_CONTROL, 0x01);
    assert_eq!(ppu.read_port(ports::BG0_CONTROL), 1);
    assert!(ppu.bg0_enabled);
}

#[test]
fn test_scroll_registers() {
    let mut ppu = Ppu::new();
    ppu.write_port(ports::BG0_SCROLL_X_LO, 0x34);
    ppu.write_port(ports::BG0_SCROLL_X_HI, 0x01);
    ppu.write_port(ports::BG0_SCROLL_Y_LO, 0x10);
    ppu.write_port(ports::BG0_SCROLL_Y_HI, 0x00);

    assert_eq!(ppu.scroll_x, 0x0134);
    assert_eq!(ppu.scroll_y, 0x0010);
}

#[test]
fn test_unmapped_ppu_port_reads_zero() {
    let mut ppu = Ppu::new();
    assert_eq!(ppu.read_port(0x8020), 0);
    assert_eq!(ppu.read_port(0x8FFF), 0);
}
