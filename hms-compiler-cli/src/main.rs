// Homescript CLI Tool
//
// Command-line interface for the Homescript analyzer: parses and
// analyzes a file, resolving sibling `.hms` imports from disk, and
// prints the collected diagnostics as text or JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use hms_compiler_core::ast::ImportKind;
use hms_compiler_core::semantic::{BuiltinImportResult, HostError, HostProvider};
use hms_compiler_core::{Diagnostic, Level, Span};

#[derive(Parser)]
#[command(name = "hmsc")]
#[command(about = "Homescript semantic analyzer", long_about = None)]
#[command(version)]
struct Cli {
    /// Input Homescript file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Emit diagnostics as JSON instead of text
    #[arg(long)]
    json: bool,
}

/// Resolves `import ... from m;` to `m.hms` next to the entry file.
/// Knows no builtin modules.
struct FileHost {
    base_dir: PathBuf,
}

impl HostProvider for FileHost {
    fn resolve_code_module(&mut self, name: &str) -> Result<Option<String>, HostError> {
        let path = self.base_dir.join(format!("{name}.hms"));
        if !path.exists() {
            return Ok(None);
        }
        let source = fs::read_to_string(&path)?;
        Ok(Some(source))
    }

    fn get_builtin_import(
        &mut self,
        _module: &str,
        _name: &str,
        _span: &Span,
        _kind: ImportKind,
    ) -> BuiltinImportResult {
        BuiltinImportResult::ModuleNotFound
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli.input, cli.json) {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(input: &Path, json: bool) -> Result<bool> {
    let source = fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;

    let filename = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let module_name = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.clone());
    let base_dir = input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let result =
        hms_compiler_core::compile(&source, &filename, &module_name, FileHost { base_dir });

    let mut all: Vec<&Diagnostic> = Vec::new();
    all.extend(result.parse_diagnostics.iter());
    if let Some(output) = &result.output {
        all.extend(&output.syntax_errors);
        all.extend(&output.diagnostics);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
    } else {
        for diag in &all {
            print_diagnostic(diag);
        }
        let errors = all.iter().filter(|d| d.level == Level::Error).count();
        let warnings = all.iter().filter(|d| d.level == Level::Warning).count();
        if errors > 0 || warnings > 0 {
            println!("{errors} error(s), {warnings} warning(s)");
        }
    }

    Ok(!result.has_errors())
}

fn print_diagnostic(diag: &Diagnostic) {
    println!("{}: {}", diag.level, diag.message);
    if !diag.span.is_synthetic() {
        println!(
            "  --> {}:{}:{}",
            diag.span.filename, diag.span.start.line, diag.span.start.column
        );
    }
    for note in &diag.notes {
        println!("  note: {note}");
    }
}
