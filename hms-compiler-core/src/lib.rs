// Homescript Core Compiler Library
//
// This crate contains the front half of the Homescript compiler:
// - Hand-written lexer and recursive descent parser
// - Abstract Syntax Tree (AST)
// - Diagnostic system with structured error reporting
// - Semantic analyzer: name resolution, type checking, module imports,
//   singleton/template validation, trigger binding, unused-code checks
//
// The analyzer reaches its embedder through the `HostProvider` trait;
// bytecode generation and execution live elsewhere.

pub mod ast;
pub mod diagnostic;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod source;

pub use diagnostic::{Diagnostic, Diagnostics, Level};
pub use parser::ParseResult;
pub use semantic::{analyze, Analyzer, AnalyzerOutput, HostError, HostProvider, NullHost};
pub use source::{Position, Span};

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a Homescript source file and return the AST with diagnostics.
pub fn parse_file(source: &str, filename: &str) -> ParseResult {
    parser::parse(source, filename)
}

/// Result of [`compile`]: parse diagnostics of the entry module plus the
/// analyzer's output (absent only when parsing failed unrecoverably).
pub struct CompileResult {
    pub parse_diagnostics: Diagnostics,
    pub output: Option<AnalyzerOutput>,
}

impl CompileResult {
    pub fn has_errors(&self) -> bool {
        self.parse_diagnostics.has_errors()
            || self.output.as_ref().is_some_and(|o| o.has_errors())
    }
}

/// Parse and analyze an entry module in one step.
///
/// Analysis runs even when the entry module has recoverable parse errors,
/// so one invocation reports as much as possible.
pub fn compile<H: HostProvider>(
    source: &str,
    filename: &str,
    module_name: &str,
    host: H,
) -> CompileResult {
    let parsed = parse_file(source, filename);
    let output = parsed
        .program
        .as_ref()
        .map(|program| semantic::analyze(module_name, program, host));
    CompileResult {
        parse_diagnostics: parsed.diagnostics,
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_clean_module() {
        let source = r#"
singleton @heater: { target: float };

fn main() {
    let goal = 21.5;
    set_target(goal);
}

fn set_target(value: float) {
    let _previous = @heater.target;
    let _changed = value;
}
"#;
        let result = compile(source, "main.hms", "main", NullHost);
        assert!(!result.has_errors(), "unexpected errors");
    }

    #[test]
    fn test_compile_reports_both_channels() {
        // A parse error and a semantic defect in the same run.
        let source = "fn main() { let = 1; break; }";
        let result = compile(source, "main.hms", "main", NullHost);
        assert!(result.parse_diagnostics.has_errors());
        assert!(result.has_errors());
    }

    #[test]
    fn test_compile_missing_main() {
        let result = compile("fn helper() {}", "main.hms", "main", NullHost);
        let output = result.output.unwrap();
        assert!(output
            .diagnostics
            .iter()
            .any(|d| d.message == "Missing 'main' function"));
    }
}
