// PPU constants

/// Visible screen width in pixels
pub(super) const SCREEN_WIDTH: usize = 320;

/// Visible screen height in pixels
pub(super) const SCREEN_HEIGHT: usize = 200;

/// Dots per scanline (visible 0-319, HBlank 320-339)
pub(super) const DOTS_PER_SCANLINE: u16 = 340;

/// Scanlines per frame (visible 0-199, VBlank 200-224)
pub(super) const SCANLINES_PER_FRAME: u16 = 225;

/// First VBlank scanline
pub(super) const VBLANK_SCANLINE: u16 = 200;

/// First HBlank dot within a scanline
pub(super) const HBLANK_DOT: u16 = 320;

/// Total PPU dots per frame
/// 340 dots/scanline x 225 scanlines = 76,500 dots
#[allow(dead_code)]
pub(super) const DOTS_PER_FRAME: u32 =
    (DOTS_PER_SCANLINE as u32) * (SCANLINES_PER_FRAME as u32);

/// Size of VRAM in bytes (64KB)
pub(super) const VRAM_SIZE: usize = 0x1_0000;

/// Size of CGRAM in bytes (16 palettes x 16 colors x 2 bytes RGB555)
pub(super) const CGRAM_SIZE: usize = 512;

/// Number of sprite entries in OAM
pub(super) const SPRITE_COUNT: usize = 128;

/// Bytes per OAM sprite entry
pub(super) const SPRITE_BYTES: usize = 6;

/// Size of OAM in bytes (128 sprites x 6 bytes)
pub(super) const OAM_SIZE: usize = SPRITE_COUNT * SPRITE_BYTES;

/// Tile size in pixels (8x8)
pub(super) const TILE_SIZE: usize = 8;

/// Bytes per 4bpp 8x8 tile (two pixels per byte)
pub(super) const TILE_BYTES: usize = 32;

/// BG0 tilemap base address in VRAM
///
/// The tilemap is a fixed convention shared with the compiler: 64x32
/// cells of {tile, attr} at the top of VRAM.
pub(super) const TILEMAP_BASE: usize = 0xF000;

/// Tilemap width in cells
pub(super) const TILEMAP_WIDTH: usize = 64;

/// Tilemap height in cells
pub(super) const TILEMAP_HEIGHT: usize = 32;
