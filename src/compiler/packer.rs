// Packer - final ROM assembly and build manifest
//
// Receives the emitted code, the normalized assets, and the compile
// options, and produces the final byte image: 32-byte header, code as
// little-endian words, then the six reserved sections at strictly
// increasing offsets in their fixed order. The build manifest mirrors
// the layout.
//
// Size accounting: a section's reserved size is its configured budget
// when one is set (otherwise its used size), the planned ROM size is
// the greatest `offset + reserved size`, and the emitted size is the
// actual byte length - trailing reserved space is not written out, so
// emitted never exceeds planned.

use crate::compiler::assets::{AssetIR, Section};
use crate::compiler::diagnostics::{codes, Diagnostic, SourceRange, Stage};
use crate::compiler::CompileOptions;
use crate::rom::{RomHeader, ROM_FORMAT_VERSION, ROM_HEADER_SIZE};
use serde::Serialize;

/// Layout of one reserved section in the packed ROM
#[derive(Debug, Clone, Serialize)]
pub struct SectionLayout {
    pub name: String,
    pub offset: u32,
    /// Reserved size (budget when configured, else used)
    pub size: u32,
    /// Bytes actually occupied by asset payloads
    pub used: u32,
    /// True when the section holds no assets
    pub reserved: bool,
}

/// One packed asset in the manifest
#[derive(Debug, Clone, Serialize)]
pub struct ManifestAsset {
    pub name: String,
    pub kind: String,
    pub section: String,
    /// Absolute offset within the ROM image
    pub offset: u32,
    pub size: u32,
    pub line: u32,
    pub column: u32,
}

/// Machine-readable description of the packed ROM
#[derive(Debug, Clone, Serialize)]
pub struct BuildManifest {
    pub rom_size: u32,
    pub planned_size: u32,
    pub entry_bank: u16,
    pub entry_offset: u16,
    pub code_offset: u32,
    pub code_size: u32,
    pub sections: Vec<SectionLayout>,
    pub assets: Vec<ManifestAsset>,
}

/// Pack code and assets into the final ROM image
///
/// Budget violations surface as pack-stage diagnostics; the image is
/// still produced so callers can inspect it, but the pipeline treats
/// the errors as fatal.
pub fn pack(
    code: &[u16],
    assets: &[AssetIR],
    options: &CompileOptions,
    file: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> (Vec<u8>, BuildManifest) {
    let code_offset = ROM_HEADER_SIZE as u32;
    let code_size = (code.len() * 2) as u32;

    // Lay the sections out at strictly increasing offsets
    let mut cursor = code_offset + code_size;
    let mut sections = Vec::with_capacity(Section::ALL.len());
    let mut manifest_assets = Vec::new();

    for section in Section::ALL {
        let used: u32 = assets
            .iter()
            .filter(|a| a.section == section)
            .map(|a| a.data.len() as u32)
            .sum();

        let budget = options.section_budgets.get(section.as_str()).copied();
        if let Some(budget) = budget {
            if used > budget {
                diagnostics.push(Diagnostic::error(
                    Stage::Pack,
                    "OverflowError",
                    codes::E_OVERFLOW_SECTION,
                    format!(
                        "section '{}' uses {} bytes, exceeding its {} byte budget",
                        section.as_str(),
                        used,
                        budget
                    ),
                    file,
                    SourceRange::default(),
                ));
            }
        }
        let size = budget.map_or(used, |b| b.max(used));

        let mut asset_cursor = cursor;
        for asset in assets.iter().filter(|a| a.section == section) {
            manifest_assets.push(ManifestAsset {
                name: asset.name.clone(),
                kind: asset.kind.clone(),
                section: section.as_str().to_string(),
                offset: asset_cursor,
                size: asset.data.len() as u32,
                line: asset.pos.line,
                column: asset.pos.column,
            });
            asset_cursor += asset.data.len() as u32;
        }

        sections.push(SectionLayout {
            name: section.as_str().to_string(),
            offset: cursor,
            size,
            used,
            reserved: used == 0,
        });
        cursor += size;
    }

    let planned_size = cursor;

    // Emit the bytes: header placeholder, code, then each section's
    // payloads at its offset (zero-filling gaps left by budgets)
    let mut bytes = vec![0u8; ROM_HEADER_SIZE];
    for word in code {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    for (section, layout) in Section::ALL.iter().zip(&sections) {
        if layout.used == 0 {
            continue;
        }
        bytes.resize(layout.offset as usize, 0);
        for asset in assets.iter().filter(|a| a.section == *section) {
            bytes.extend_from_slice(&asset.data);
        }
    }

    let emitted_size = bytes.len() as u32;
    debug_assert!(emitted_size <= planned_size);

    if let Some(max) = options.max_rom_bytes {
        if planned_size > max {
            diagnostics.push(Diagnostic::error(
                Stage::Pack,
                "OverflowError",
                codes::E_OVERFLOW_ROM,
                format!(
                    "planned ROM size {} bytes exceeds the {} byte limit",
                    planned_size, max
                ),
                file,
                SourceRange::default(),
            ));
        }
    }

    // Finalize the header now that the emitted size is known
    let header = RomHeader {
        version: ROM_FORMAT_VERSION,
        size: emitted_size,
        entry_bank: options.entry_bank,
        entry_offset: options.entry_offset,
        mapper_flags: 0,
    };
    bytes[..ROM_HEADER_SIZE].copy_from_slice(&header.encode());

    let manifest = BuildManifest {
        rom_size: emitted_size,
        planned_size,
        entry_bank: options.entry_bank,
        entry_offset: options.entry_offset,
        code_offset,
        code_size,
        sections,
        assets: manifest_assets,
    };
    (bytes, manifest)
}
