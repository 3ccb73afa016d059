// Diagnostics - structured compiler messages
//
// Every stage appends to one shared diagnostic list owned by the compile
// result; the pipeline short-circuits between stages when an
// error-severity entry is present, but accumulated diagnostics are
// always reported, even on success.

use serde::Serialize;
use std::fmt;

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Pipeline stage that produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Io,
    Lexer,
    Parser,
    Semantic,
    Asset,
    Codegen,
    Pack,
}

/// Stable diagnostic codes
pub mod codes {
    pub const E_IO: &str = "E_IO";
    pub const E_LEX: &str = "E_LEX";
    pub const E_SYNTAX: &str = "E_SYNTAX";
    pub const E_DUPLICATE: &str = "E_DUPLICATE";
    pub const E_UNDEFINED: &str = "E_UNDEFINED";
    pub const E_TYPE: &str = "E_TYPE";
    pub const E_MISSING_ENTRYPOINT: &str = "E_MISSING_ENTRYPOINT";
    pub const E_ENTRYPOINT_PARAMS: &str = "E_ENTRYPOINT_PARAMS";
    pub const E_ASSET_DUPLICATE: &str = "E_ASSET_DUPLICATE";
    pub const E_ASSET_HEX_PARSE: &str = "E_ASSET_HEX_PARSE";
    pub const E_ASSET_B64_PARSE: &str = "E_ASSET_B64_PARSE";
    pub const E_ASSET_UNKNOWN_KIND: &str = "E_ASSET_UNKNOWN_KIND";
    pub const E_CODEGEN_UNSUPPORTED: &str = "E_CODEGEN_UNSUPPORTED";
    pub const E_OVERFLOW_ROM: &str = "E_OVERFLOW_ROM";
    pub const E_OVERFLOW_SECTION: &str = "E_OVERFLOW_SECTION";
    pub const E_PACK_LAYOUT: &str = "E_PACK_LAYOUT";
    pub const E_INTERNAL: &str = "E_INTERNAL";
    pub const W_UNUSED_ASSET: &str = "W_UNUSED_ASSET";
}

/// A position in source text (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32) -> Self {
        SourcePos { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open source range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourceRange {
    pub start: SourcePos,
    pub end: SourcePos,
}

impl SourceRange {
    pub fn at(pos: SourcePos) -> Self {
        SourceRange {
            start: pos,
            end: pos,
        }
    }
}

/// A related source location attached to a diagnostic
///
/// Used for "previous declaration was here" style notes.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedLocation {
    pub message: String,
    pub file: String,
    pub pos: SourcePos,
}

/// A structured compiler message
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub category: String,
    pub code: String,
    pub message: String,
    pub file: String,
    pub range: SourceRange,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedLocation>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        stage: Stage,
        category: &str,
        code: &str,
        message: impl Into<String>,
        file: &str,
        range: SourceRange,
    ) -> Self {
        Diagnostic {
            severity,
            stage,
            category: category.to_string(),
            code: code.to_string(),
            message: message.into(),
            file: file.to_string(),
            range,
            notes: Vec::new(),
            related: Vec::new(),
        }
    }

    /// Shorthand for an error-severity diagnostic
    pub fn error(
        stage: Stage,
        category: &str,
        code: &str,
        message: impl Into<String>,
        file: &str,
        range: SourceRange,
    ) -> Self {
        Diagnostic::new(Severity::Error, stage, category, code, message, file, range)
    }

    /// Shorthand for a warning-severity diagnostic
    pub fn warning(
        stage: Stage,
        category: &str,
        code: &str,
        message: impl Into<String>,
        file: &str,
        range: SourceRange,
    ) -> Self {
        Diagnostic::new(
            Severity::Warning,
            stage,
            category,
            code,
            message,
            file,
            range,
        )
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_related(mut self, message: impl Into<String>, file: &str, pos: SourcePos) -> Self {
        self.related.push(RelatedLocation {
            message: message.into(),
            file: file.to_string(),
            pos,
        });
        self
    }

    /// Single-line form: `file:line:col: message`
    pub fn one_line(&self) -> String {
        format!(
            "{}:{}:{}: {}",
            self.file, self.range.start.line, self.range.start.column, self.message
        )
    }
}

/// Whether any diagnostic in the list is error severity
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| d.severity == Severity::Error)
}

/// Count diagnostics at each severity as (errors, warnings, infos)
pub fn severity_counts(diagnostics: &[Diagnostic]) -> (usize, usize, usize) {
    let mut counts = (0, 0, 0);
    for d in diagnostics {
        match d.severity {
            Severity::Error => counts.0 += 1,
            Severity::Warning => counts.1 += 1,
            Severity::Info => counts.2 += 1,
        }
    }
    counts
}
