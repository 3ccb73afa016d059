// Asset normalizer - payload decoding and section assignment
//
// For each declared asset: resolve its reserved ROM section from its
// kind, decode its payload (`hex`, `b64`, or `text`), and produce an
// AssetIR carrying the bytes, section, and a 1-based declaration-order
// tag used by `ASSET_<name>` constants. Asset errors skip that asset but
// the normalizer continues with the rest.

use crate::compiler::ast::AssetDecl;
use crate::compiler::diagnostics::{codes, Diagnostic, SourcePos, SourceRange, Stage};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;

/// The six reserved ROM sections, in their fixed layout order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    GfxTiles,
    Tilemaps,
    Palettes,
    AudioSeq,
    AudioPatch,
    Gamedata,
}

impl Section {
    /// All sections in layout order
    pub const ALL: [Section; 6] = [
        Section::GfxTiles,
        Section::Tilemaps,
        Section::Palettes,
        Section::AudioSeq,
        Section::AudioPatch,
        Section::Gamedata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::GfxTiles => "gfx_tiles",
            Section::Tilemaps => "tilemaps",
            Section::Palettes => "palettes",
            Section::AudioSeq => "audio_seq",
            Section::AudioPatch => "audio_patch",
            Section::Gamedata => "gamedata",
        }
    }

    pub fn from_str(name: &str) -> Option<Section> {
        Section::ALL.iter().copied().find(|s| s.as_str() == name)
    }
}

/// Section assignment by asset kind
pub fn section_for_kind(kind: &str) -> Option<Section> {
    match kind {
        "tiles8" | "tiles16" | "sprite" | "tileset" => Some(Section::GfxTiles),
        "tilemap" => Some(Section::Tilemaps),
        "palette" => Some(Section::Palettes),
        "music" | "ambience" => Some(Section::AudioSeq),
        "sfx" => Some(Section::AudioPatch),
        "gamedata" | "blob" => Some(Section::Gamedata),
        _ => None,
    }
}

/// Whether a kind loads through `gfx.load_tiles` (a graphics kind)
pub fn is_gfx_kind(kind: &str) -> bool {
    matches!(kind, "tiles8" | "tiles16" | "sprite" | "tileset")
}

/// Whether a kind uses 16x16 tile addressing (128 bytes per tile block)
pub fn is_16x16_kind(kind: &str) -> bool {
    matches!(kind, "tiles16" | "sprite")
}

/// A normalized asset ready for code generation and packing
#[derive(Debug, Clone)]
pub struct AssetIR {
    pub name: String,
    pub kind: String,
    pub section: Section,
    pub encoding: String,
    pub data: Vec<u8>,
    pub pos: SourcePos,
    /// 1-based declaration-order tag, the value of `ASSET_<name>`
    pub tag: u16,
}

/// Normalize all assets, accumulating diagnostics
///
/// Failed assets are skipped; the rest still normalize.
pub fn normalize_assets(
    assets: &[AssetDecl],
    file: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<AssetIR> {
    let mut normalized = Vec::new();
    for (index, asset) in assets.iter().enumerate() {
        let tag = index as u16 + 1;

        let section = match section_for_kind(&asset.kind) {
            Some(section) => section,
            None => {
                diagnostics.push(Diagnostic::error(
                    Stage::Asset,
                    "AssetFormatError",
                    codes::E_ASSET_UNKNOWN_KIND,
                    format!("unknown asset kind '{}'", asset.kind),
                    file,
                    SourceRange::at(asset.pos),
                ));
                continue;
            }
        };

        let encoding = asset.encoding.as_deref().unwrap_or("hex");
        let data = match encoding {
            "hex" => decode_hex_payload(&asset.payload, &asset.name, asset.pos, file, diagnostics),
            "b64" => decode_b64_payload(&asset.payload, &asset.name, asset.pos, file, diagnostics),
            "text" => Some(asset.payload.join("\n").into_bytes()),
            other => {
                diagnostics.push(Diagnostic::error(
                    Stage::Asset,
                    "AssetFormatError",
                    codes::E_ASSET_UNKNOWN_KIND,
                    format!("unknown asset encoding '{}'", other),
                    file,
                    SourceRange::at(asset.pos),
                ));
                None
            }
        };

        if let Some(data) = data {
            normalized.push(AssetIR {
                name: asset.name.clone(),
                kind: asset.kind.clone(),
                section,
                encoding: encoding.to_string(),
                data,
                pos: asset.pos,
                tag,
            });
        }
    }
    normalized
}

fn decode_hex_payload(
    payload: &[String],
    asset_name: &str,
    pos: SourcePos,
    file: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<u8>> {
    let joined = payload.join(" ");
    match hex_decode(&joined) {
        Ok(bytes) => Some(bytes),
        Err(message) => {
            diagnostics.push(Diagnostic::error(
                Stage::Asset,
                "AssetParseError",
                codes::E_ASSET_HEX_PARSE,
                format!("asset '{}': {}", asset_name, message),
                file,
                SourceRange::at(pos),
            ));
            None
        }
    }
}

fn decode_b64_payload(
    payload: &[String],
    asset_name: &str,
    pos: SourcePos,
    file: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<u8>> {
    let joined: String = payload.join("");
    match b64_decode(&joined) {
        Ok(bytes) => Some(bytes),
        Err(message) => {
            diagnostics.push(Diagnostic::error(
                Stage::Asset,
                "AssetParseError",
                codes::E_ASSET_B64_PARSE,
                format!("asset '{}': {}", asset_name, message),
                file,
                SourceRange::at(pos),
            ));
            None
        }
    }
}

// ========================================
// Codec Helpers
// ========================================

/// Decode whitespace-separated hex byte tokens
///
/// Tokens may carry an `0x` prefix; each must hold an even number of hex
/// digits.
pub fn hex_decode(text: &str) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    for token in text.split_whitespace() {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(format!("odd-length hex token '{}'", token));
        }
        for pair in 0..digits.len() / 2 {
            let slice = &digits[pair * 2..pair * 2 + 2];
            let byte = u8::from_str_radix(slice, 16)
                .map_err(|_| format!("invalid hex token '{}'", token))?;
            bytes.push(byte);
        }
    }
    Ok(bytes)
}

/// Encode bytes as space-separated hex pairs
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode standard or raw (unpadded) base64, tolerating whitespace
pub fn b64_decode(text: &str) -> Result<Vec<u8>, String> {
    let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(&stripped)
        .or_else(|_| STANDARD_NO_PAD.decode(&stripped))
        .map_err(|e| format!("invalid base64: {}", e))
}

/// Encode bytes as padded standard base64
pub fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
