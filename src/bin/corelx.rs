// CoreLX compiler - command-line driver
//
// Usage: corelx <source> <output-rom> [--manifest] [--diagnostics] [--bundle]
//
// Compiles one CoreLX source file to an RMCF ROM image. The optional
// flags write sibling `*.manifest.json`, `*.diagnostics.json`, and
// `*.bundle.json` files next to the output. Exit code 0 when no
// error-severity diagnostic was produced, 1 otherwise.

use nitro_core_dx::compiler::{compile_file, CompileOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn sibling(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    output.with_file_name(format!("{}.{}", stem, suffix))
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut positional = Vec::new();
    let mut want_manifest = false;
    let mut want_diagnostics = false;
    let mut want_bundle = false;

    for arg in &args {
        match arg.as_str() {
            "--manifest" => want_manifest = true,
            "--diagnostics" => want_diagnostics = true,
            "--bundle" => want_bundle = true,
            other if other.starts_with("--") => {
                eprintln!("unknown flag '{}'", other);
                return ExitCode::FAILURE;
            }
            other => positional.push(other.to_string()),
        }
    }

    if positional.len() != 2 {
        eprintln!("usage: corelx <source> <output-rom> [--manifest] [--diagnostics] [--bundle]");
        return ExitCode::FAILURE;
    }
    let source = PathBuf::from(&positional[0]);
    let output = PathBuf::from(&positional[1]);

    let mut options = CompileOptions {
        output_path: Some(output.clone()),
        ..CompileOptions::default()
    };
    if want_manifest {
        options.emit_manifest_json = true;
        options.manifest_output_path = Some(sibling(&output, "manifest.json"));
    }
    if want_diagnostics {
        options.emit_diagnostics_json = true;
        options.diagnostics_output_path = Some(sibling(&output, "diagnostics.json"));
    }
    if want_bundle {
        options.emit_bundle_json = true;
        options.bundle_output_path = Some(sibling(&output, "bundle.json"));
    }

    let result = compile_file(&source, &options);

    if result.success {
        println!(
            "{} -> {} ({} bytes)",
            source.display(),
            output.display(),
            result.rom_bytes.map(|b| b.len()).unwrap_or(0)
        );
        ExitCode::SUCCESS
    } else {
        if let Some(first) = result.diagnostics.first() {
            eprintln!("{}", first.one_line());
        }
        ExitCode::FAILURE
    }
}
