// Compiler module - the CoreLX pipeline
//
// Lexer -> Parser -> SemanticAnalyzer -> AssetNormalizer ->
// CodeGenerator -> Packer, all appending to one diagnostic list. After
// each stage, an error-severity diagnostic stops the pipeline, but the
// accumulated diagnostics (and their JSON sidecars, when requested) are
// always produced. Panics from unexpected states are caught at stage
// boundaries and surface as internal-compiler-error diagnostics.

pub mod assets;
pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod lexer;
pub mod packer;
pub mod parser;
pub mod semantic;

pub use diagnostics::{Diagnostic, Severity, SourcePos, SourceRange, Stage};
pub use packer::{BuildManifest, ManifestAsset, SectionLayout};

use diagnostics::{codes, has_errors, severity_counts};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Recognized compile settings
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Write the ROM image here when emission is on
    pub output_path: Option<PathBuf>,
    pub manifest_output_path: Option<PathBuf>,
    pub diagnostics_output_path: Option<PathBuf>,
    pub bundle_output_path: Option<PathBuf>,

    /// Entry point recorded in the ROM header
    pub entry_bank: u16,
    pub entry_offset: u16,

    /// Planned-size ceiling for the whole image
    pub max_rom_bytes: Option<u32>,

    /// Per-section byte caps, keyed by section name
    pub section_budgets: HashMap<String, u32>,

    pub emit_rom_bytes: bool,
    pub emit_manifest_json: bool,
    pub emit_diagnostics_json: bool,
    pub emit_bundle_json: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            output_path: None,
            manifest_output_path: None,
            diagnostics_output_path: None,
            bundle_output_path: None,
            entry_bank: 1,
            entry_offset: 0x8000,
            max_rom_bytes: None,
            section_budgets: HashMap::new(),
            emit_rom_bytes: true,
            emit_manifest_json: false,
            emit_diagnostics_json: false,
            emit_bundle_json: false,
        }
    }
}

/// Outcome of a compilation
pub struct CompileResult {
    /// True when no error-severity diagnostic was produced
    pub success: bool,
    pub rom_bytes: Option<Vec<u8>>,
    pub manifest: Option<BuildManifest>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileResult {
    fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        CompileResult {
            success: false,
            rom_bytes: None,
            manifest: None,
            diagnostics,
        }
    }
}

/// Bundle JSON payload (`schema_version` 1)
#[derive(Serialize)]
struct Bundle<'a> {
    schema_version: u32,
    success: bool,
    summary: BundleSummary,
    diagnostics: &'a [Diagnostic],
    #[serde(skip_serializing_if = "Option::is_none")]
    manifest: Option<&'a BuildManifest>,
}

#[derive(Serialize)]
struct BundleSummary {
    error_count: usize,
    warning_count: usize,
    info_count: usize,
}

/// Compile a source file from disk
pub fn compile_file<P: AsRef<Path>>(path: P, options: &CompileOptions) -> CompileResult {
    let path = path.as_ref();
    let file = path.to_string_lossy().into_owned();
    match fs::read_to_string(path) {
        Ok(source) => compile_source(&source, &file, options),
        Err(e) => {
            let diagnostics = vec![Diagnostic::error(
                Stage::Io,
                "IO",
                codes::E_IO,
                format!("cannot read '{}': {}", file, e),
                &file,
                SourceRange::default(),
            )];
            let result = CompileResult::failed(diagnostics);
            write_artifacts(&result, options);
            result
        }
    }
}

/// Compile source text through the full pipeline
pub fn compile_source(source: &str, file: &str, options: &CompileOptions) -> CompileResult {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let result = run_pipeline(source, file, options, &mut diagnostics);

    let result = match result {
        Some((rom_bytes, manifest)) if !has_errors(&diagnostics) => CompileResult {
            success: true,
            rom_bytes: Some(rom_bytes),
            manifest: Some(manifest),
            diagnostics,
        },
        Some((_, manifest)) => CompileResult {
            success: false,
            rom_bytes: None,
            manifest: Some(manifest),
            diagnostics,
        },
        None => CompileResult::failed(diagnostics),
    };

    write_artifacts(&result, options);
    result
}

/// Run the staged pipeline; None means it stopped before packing
fn run_pipeline(
    source: &str,
    file: &str,
    options: &CompileOptions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<(Vec<u8>, BuildManifest)> {
    // Lexer
    let tokens = guard_stage(file, diagnostics, Stage::Lexer, |diagnostics| {
        lexer::lex(source, file, diagnostics)
    })?;
    if has_errors(diagnostics) {
        return None;
    }

    // Parser
    let program = guard_stage(file, diagnostics, Stage::Parser, |diagnostics| {
        parser::parse(&tokens, file, diagnostics)
    })?;
    let program = program?;
    if has_errors(diagnostics) {
        return None;
    }

    // Semantic analysis (recovers to the end of its stage)
    guard_stage(file, diagnostics, Stage::Semantic, |diagnostics| {
        semantic::analyze(&program, file, diagnostics)
    })?;
    if has_errors(diagnostics) {
        return None;
    }

    // Asset normalization (recovers to the end of its stage)
    let assets = guard_stage(file, diagnostics, Stage::Asset, |diagnostics| {
        assets::normalize_assets(&program.assets, file, diagnostics)
    })?;
    if has_errors(diagnostics) {
        return None;
    }

    // Code generation
    let code = guard_stage(file, diagnostics, Stage::Codegen, |diagnostics| {
        codegen::generate(&program, &assets, file, diagnostics)
    })?;
    let code = code?;
    if has_errors(diagnostics) {
        return None;
    }

    // Packing
    guard_stage(file, diagnostics, Stage::Pack, |diagnostics| {
        packer::pack(&code, &assets, options, file, diagnostics)
    })
}

/// Run one stage, converting panics into internal-compiler-error
/// diagnostics at the boundary
fn guard_stage<T>(
    file: &str,
    diagnostics: &mut Vec<Diagnostic>,
    stage: Stage,
    body: impl FnOnce(&mut Vec<Diagnostic>) -> T,
) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(|| body(&mut *diagnostics))) {
        Ok(value) => Some(value),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            diagnostics.push(Diagnostic::error(
                stage,
                "InternalCompilerError",
                codes::E_INTERNAL,
                format!("internal compiler error: {}", detail),
                file,
                SourceRange::default(),
            ));
            None
        }
    }
}

/// Write the requested artifacts for a finished compilation
fn write_artifacts(result: &CompileResult, options: &CompileOptions) {
    if options.emit_rom_bytes {
        if let (Some(path), Some(bytes)) = (&options.output_path, &result.rom_bytes) {
            if let Err(e) = fs::write(path, bytes) {
                eprintln!("failed to write ROM '{}': {}", path.display(), e);
            }
        }
    }

    if options.emit_manifest_json {
        if let (Some(path), Some(manifest)) = (&options.manifest_output_path, &result.manifest) {
            write_json(path, manifest);
        }
    }

    // Diagnostics are written even on failure so IDE consumers always
    // see the structured list
    if options.emit_diagnostics_json {
        if let Some(path) = &options.diagnostics_output_path {
            write_json(path, &result.diagnostics);
        }
    }

    if options.emit_bundle_json {
        if let Some(path) = &options.bundle_output_path {
            let (error_count, warning_count, info_count) = severity_counts(&result.diagnostics);
            let bundle = Bundle {
                schema_version: 1,
                success: result.success,
                summary: BundleSummary {
                    error_count,
                    warning_count,
                    info_count,
                },
                diagnostics: &result.diagnostics,
                manifest: if result.success {
                    result.manifest.as_ref()
                } else {
                    None
                },
            };
            write_json(path, &bundle);
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            if let Err(e) = fs::write(path, text) {
                eprintln!("failed to write '{}': {}", path.display(), e);
            }
        }
        Err(e) => eprintln!("failed to serialize '{}': {}", path.display(), e),
    }
}
