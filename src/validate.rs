//! Validation utilities for instruction listings
//!
//! Batch validation of `.pim` listings with detailed error reporting.
//! Two levels:
//! - Parse validation (always runs): every instruction line is a well-formed
//!   6-digit word
//! - Stream validation: PROG/END block structure, core pointers, binary
//!   notes and, when the expected shape is known, per-core instruction counts
//!
//! # Example
//!
//! ```ignore
//! use pimgen::validate::{validate_directory, ValidationResult};
//!
//! let results = validate_directory("out/")?;
//! for result in &results {
//!     match result {
//!         ValidationResult::Ok { path, entries, diagnostics } => {
//!             println!("{}: {} instructions, {} diagnostics",
//!                 path.display(), entries.len(), diagnostics.len());
//!         }
//!         ValidationResult::Err { path, error } => {
//!             eprintln!("{}: {}", path.display(), error);
//!         }
//!     }
//! }
//! ```

use crate::codegen::expected_instruction_count;
use crate::config::CompilerConfig;
use crate::dims::Dimensions;
use crate::error::PimError;
use crate::isa::{Opcode, CORE_MASK};
use crate::layout::plan;
use crate::listing::{parse_listing, ListingEntry};
use crate::partition::partition;
use std::fmt;
use std::path::{Path, PathBuf};

/// File extension of instruction listings
pub const LISTING_EXTENSION: &str = "pim";

// ============================================================================
// Diagnostics
// ============================================================================

/// Severity of a validation diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// The stream is not a valid program
    Error,
    /// Valid, but probably not what was intended
    Warning,
    Info,
}

/// A single validation diagnostic
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Listing line where the issue was found (if applicable)
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    fn error(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            line,
            message: message.into(),
        }
    }

    fn warning(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            line,
            message: message.into(),
        }
    }

    fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            line: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagnosticLevel::Error => "ERROR",
            DiagnosticLevel::Warning => "WARN",
            DiagnosticLevel::Info => "INFO",
        };
        match self.line {
            Some(line) => write!(f, "[{}] line {}: {}", level, line, self.message),
            None => write!(f, "[{}] {}", level, self.message),
        }
    }
}

/// Shape the listing is expected to implement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedShape {
    pub dims: Dimensions,
    pub config: CompilerConfig,
}

/// Stream validation settings
#[derive(Debug, Clone, Default)]
pub struct ValidationConfig {
    /// When set, per-core blocks are checked against the partition and the
    /// closed-form instruction count
    pub expected: Option<ExpectedShape>,
}

impl ValidationConfig {
    pub fn with_expected(dims: Dimensions, config: CompilerConfig) -> Self {
        Self {
            expected: Some(ExpectedShape { dims, config }),
        }
    }
}

/// True if no diagnostic is an error
pub fn is_valid(diagnostics: &[Diagnostic]) -> bool {
    !diagnostics.iter().any(|d| d.level == DiagnosticLevel::Error)
}

// ============================================================================
// Stream validation
// ============================================================================

/// One PROG..END block found in the stream
#[derive(Debug, Clone, PartialEq, Eq)]
struct CoreBlock {
    core: u8,
    start_line: usize,
    instructions: usize,
}

/// Check the structure of a parsed instruction stream
pub fn validate_listing(entries: &[ListingEntry], config: &ValidationConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut blocks: Vec<CoreBlock> = Vec::new();
    let mut open: Option<CoreBlock> = None;

    for entry in entries {
        let instr = &entry.instruction;
        let line = Some(entry.line);

        if !entry.note_matches() {
            diagnostics.push(Diagnostic::error(
                line,
                format!("Binary note does not match word {}", instr.to_hex()),
            ));
        }

        match instr.opcode {
            Opcode::Prog => {
                if let Some(unclosed) = open.take() {
                    diagnostics.push(Diagnostic::error(
                        line,
                        format!(
                            "PROG for core {} inside the block of core {} (opened at line {})",
                            instr.core, unclosed.core, unclosed.start_line
                        ),
                    ));
                    blocks.push(unclosed);
                }
                open = Some(CoreBlock {
                    core: instr.core,
                    start_line: entry.line,
                    instructions: 1,
                });
            }
            Opcode::Exe | Opcode::End | Opcode::NoOp => {
                if instr.opcode == Opcode::NoOp {
                    diagnostics.push(Diagnostic::warning(line, "NOOP in generated stream"));
                }
                let Some(block) = open.as_mut() else {
                    if instr.opcode != Opcode::NoOp {
                        diagnostics.push(Diagnostic::error(
                            line,
                            format!("{} outside a PROG/END block", instr.opcode),
                        ));
                    }
                    continue;
                };
                block.instructions += 1;
                if instr.opcode != Opcode::NoOp && instr.core != block.core {
                    diagnostics.push(Diagnostic::error(
                        line,
                        format!(
                            "{} targets core {} inside the block of core {}",
                            instr.opcode, instr.core, block.core
                        ),
                    ));
                }
                if instr.opcode == Opcode::End {
                    blocks.extend(open.take());
                }
            }
        }
    }

    if let Some(unclosed) = open {
        diagnostics.push(Diagnostic::error(
            Some(unclosed.start_line),
            format!("Block for core {} has no END", unclosed.core),
        ));
        blocks.push(unclosed);
    }

    for pair in blocks.windows(2) {
        if pair[1].core <= pair[0].core {
            diagnostics.push(Diagnostic::warning(
                Some(pair[1].start_line),
                format!(
                    "Core {} follows core {}; cores are not ascending",
                    pair[1].core, pair[0].core
                ),
            ));
        }
    }

    if let Some(expected) = &config.expected {
        check_expected_counts(&blocks, expected, &mut diagnostics);
    }

    diagnostics.push(Diagnostic::info(format!(
        "{} instructions in {} core blocks",
        entries.len(),
        blocks.len()
    )));
    diagnostics
}

fn check_expected_counts(
    blocks: &[CoreBlock],
    expected: &ExpectedShape,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let dims = &expected.dims;
    let work = partition(dims.m, expected.config.cores);
    let map = plan(dims, expected.config.row_capacity);

    if work.len() != blocks.len() {
        diagnostics.push(Diagnostic::error(
            None,
            format!("Expected {} core blocks for {}, found {}", work.len(), dims, blocks.len()),
        ));
    }

    for (block, assignment) in blocks.iter().zip(&work.assignments) {
        let want_core = (assignment.core_id as u32 & CORE_MASK) as u8;
        if block.core != want_core {
            diagnostics.push(Diagnostic::error(
                Some(block.start_line),
                format!("Expected core {}, found core {}", want_core, block.core),
            ));
        }
        let want = expected_instruction_count(
            assignment.row_count(),
            dims.n,
            dims.k,
            map.rows_per_matrix_row_a,
        );
        match want {
            None => diagnostics.push(Diagnostic::error(
                Some(block.start_line),
                format!("Instruction count for core {} overflows for {}", block.core, dims),
            )),
            Some(want) if block.instructions != want => diagnostics.push(Diagnostic::error(
                Some(block.start_line),
                format!(
                    "Core {} has {} instructions, expected {} for rows {} to {}",
                    block.core, block.instructions, want, assignment.start_row, assignment.end_row
                ),
            )),
            Some(_) => {}
        }
    }
}

// ============================================================================
// File validation
// ============================================================================

/// Result of validating a single listing file
#[derive(Debug)]
pub enum ValidationResult {
    /// File parsed; see diagnostics for stream problems
    Ok {
        path: PathBuf,
        entries: Vec<ListingEntry>,
        diagnostics: Vec<Diagnostic>,
    },
    /// File could not be read or parsed
    Err {
        path: PathBuf,
        error: ValidationError,
    },
}

impl ValidationResult {
    /// Returns true if the file parsed and no diagnostic is an error
    pub fn is_ok(&self) -> bool {
        match self {
            Self::Ok { diagnostics, .. } => is_valid(diagnostics),
            Self::Err { .. } => false,
        }
    }

    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Ok { path, .. } => path,
            Self::Err { path, .. } => path,
        }
    }

    /// Get diagnostics (empty for Err variant)
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Ok { diagnostics, .. } => diagnostics,
            Self::Err { .. } => &[],
        }
    }
}

/// Validation error with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub line: Option<usize>,
    pub message: String,
    /// Offending source line (if available)
    pub snippet: Option<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: {}", line, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(snippet) = &self.snippet {
            write!(f, "\n  | {}", snippet)?;
        }
        Ok(())
    }
}

impl From<std::io::Error> for ValidationError {
    fn from(e: std::io::Error) -> Self {
        Self {
            line: None,
            message: e.to_string(),
            snippet: None,
        }
    }
}

/// Validate a single listing file (structure checks only)
pub fn validate_file<P: AsRef<Path>>(path: P) -> ValidationResult {
    validate_file_with_config(path, &ValidationConfig::default())
}

/// Validate a single listing file
pub fn validate_file_with_config<P: AsRef<Path>>(
    path: P,
    config: &ValidationConfig,
) -> ValidationResult {
    let path = path.as_ref().to_path_buf();

    let source = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            return ValidationResult::Err {
                path,
                error: e.into(),
            }
        }
    };

    match parse_listing(&source) {
        Ok(entries) => {
            let diagnostics = validate_listing(&entries, config);
            ValidationResult::Ok {
                path,
                entries,
                diagnostics,
            }
        }
        Err(PimError::Listing { line, message }) => {
            let snippet = source
                .lines()
                .nth(line.saturating_sub(1))
                .map(|s| s.trim().to_string());
            ValidationResult::Err {
                path,
                error: ValidationError {
                    line: Some(line),
                    message,
                    snippet,
                },
            }
        }
        Err(e) => ValidationResult::Err {
            path,
            error: ValidationError {
                line: None,
                message: e.to_string(),
                snippet: None,
            },
        },
    }
}

/// Validate all .pim files in a directory (recursive)
pub fn validate_directory<P: AsRef<Path>>(dir: P) -> std::io::Result<Vec<ValidationResult>> {
    validate_directory_with_config(dir, &ValidationConfig::default())
}

pub fn validate_directory_with_config<P: AsRef<Path>>(
    dir: P,
    config: &ValidationConfig,
) -> std::io::Result<Vec<ValidationResult>> {
    let mut results = Vec::new();
    validate_directory_recursive(dir.as_ref(), config, &mut results)?;

    // Sort by path for consistent output
    results.sort_by(|a, b| a.path().cmp(b.path()));

    Ok(results)
}

fn validate_directory_recursive(
    dir: &Path,
    config: &ValidationConfig,
    results: &mut Vec<ValidationResult>,
) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            validate_directory_recursive(&path, config, results)?;
        } else if path.extension().is_some_and(|e| e == LISTING_EXTENSION) {
            results.push(validate_file_with_config(&path, config));
        }
    }

    Ok(())
}

/// Summary of validation results
#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Parse failures
    pub errors: Vec<(PathBuf, ValidationError)>,
    /// Stream diagnostics with their file
    pub findings: Vec<(PathBuf, Diagnostic)>,
    pub diag_errors: usize,
    pub diag_warnings: usize,
    pub diag_info: usize,
}

impl ValidationSummary {
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            match result {
                ValidationResult::Ok { path, diagnostics, .. } => {
                    if is_valid(diagnostics) {
                        summary.passed += 1;
                    } else {
                        summary.failed += 1;
                    }
                    for d in diagnostics {
                        match d.level {
                            DiagnosticLevel::Error => summary.diag_errors += 1,
                            DiagnosticLevel::Warning => summary.diag_warnings += 1,
                            DiagnosticLevel::Info => {
                                summary.diag_info += 1;
                                continue;
                            }
                        }
                        summary.findings.push((path.clone(), d.clone()));
                    }
                }
                ValidationResult::Err { path, error } => {
                    summary.failed += 1;
                    summary.errors.push((path.clone(), error.clone()));
                }
            }
        }

        summary
    }

    /// True if every file passed
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Print summary to stderr
    pub fn print_report(&self) {
        if !self.errors.is_empty() {
            eprintln!("\n{} PARSE ERRORS:", self.errors.len());
            for (path, error) in &self.errors {
                eprintln!("\n  {}", path.display());
                if let Some(line) = error.line {
                    eprintln!("    line {}: {}", line, error.message);
                } else {
                    eprintln!("    {}", error.message);
                }
                if let Some(snippet) = &error.snippet {
                    eprintln!("    | {}", snippet);
                }
            }
            eprintln!();
        }

        if !self.findings.is_empty() {
            eprintln!("\n{} STREAM FINDINGS:", self.findings.len());
            for (path, diagnostic) in &self.findings {
                eprintln!("  {}: {}", path.display(), diagnostic);
            }
            eprintln!();
        }

        eprintln!(
            "Validated {} files: {} passed, {} failed",
            self.total, self.passed, self.failed
        );

        if self.diag_errors + self.diag_warnings > 0 {
            eprintln!(
                "Diagnostics: {} errors, {} warnings, {} info",
                self.diag_errors, self.diag_warnings, self.diag_info
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::compile;
    use crate::isa::Instruction;
    use crate::layout::RowCapacity;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn entries(words: &[Instruction]) -> Vec<ListingEntry> {
        words
            .iter()
            .enumerate()
            .map(|(i, &instruction)| ListingEntry {
                line: i + 1,
                instruction,
                binary_note: None,
            })
            .collect()
    }

    fn errors(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
        diagnostics.iter().filter(|d| d.level == DiagnosticLevel::Error).collect()
    }

    fn warnings(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
        diagnostics.iter().filter(|d| d.level == DiagnosticLevel::Warning).collect()
    }

    #[test]
    fn test_generated_listing_is_valid() {
        let dims = Dimensions::new(7, 3, 4).unwrap();
        let config = CompilerConfig::default()
            .with_cores(3)
            .with_row_capacity(RowCapacity::new(5).unwrap());
        let program = compile(&dims, &config).unwrap();
        let parsed = parse_listing(&program.render_listing()).unwrap();

        let diagnostics = validate_listing(&parsed, &ValidationConfig::with_expected(dims, config));
        assert!(is_valid(&diagnostics), "{:?}", diagnostics);
        assert!(warnings(&diagnostics).is_empty());
    }

    #[test]
    fn test_instruction_outside_block() {
        let stream = entries(&[Instruction::exe(0, false, false, 0)]);
        let diagnostics = validate_listing(&stream, &ValidationConfig::default());
        assert_eq!(errors(&diagnostics).len(), 1);
        assert!(errors(&diagnostics)[0].message.contains("outside"));
    }

    #[test]
    fn test_nested_prog_and_missing_end() {
        let stream = entries(&[
            Instruction::prog(0, true, false, 1),
            Instruction::prog(1, true, false, 1),
            Instruction::exe(1, false, false, 0),
        ]);
        let diagnostics = validate_listing(&stream, &ValidationConfig::default());
        let errs = errors(&diagnostics);
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().any(|d| d.message.contains("inside the block")));
        assert!(errs.iter().any(|d| d.message.contains("has no END")));
    }

    #[test]
    fn test_core_pointer_mismatch() {
        let stream = entries(&[
            Instruction::prog(2, true, false, 1),
            Instruction::exe(3, false, false, 0),
            Instruction::end(2, false, false, 0),
        ]);
        let diagnostics = validate_listing(&stream, &ValidationConfig::default());
        let errs = errors(&diagnostics);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].line, Some(2));
    }

    #[test]
    fn test_noop_and_order_warnings() {
        let stream = entries(&[
            Instruction::prog(1, true, false, 1),
            Instruction::no_op(),
            Instruction::end(1, false, false, 0),
            Instruction::prog(0, true, false, 1),
            Instruction::end(0, false, false, 0),
        ]);
        let diagnostics = validate_listing(&stream, &ValidationConfig::default());
        assert!(is_valid(&diagnostics));
        assert_eq!(warnings(&diagnostics).len(), 2);
    }

    #[test]
    fn test_count_mismatch_against_expected() {
        let dims = Dimensions::new(2, 1, 1).unwrap();
        let config = CompilerConfig::default().with_cores(1);
        let mut words: Vec<Instruction> =
            compile(&dims, &config).unwrap().instructions().collect();
        // Drop the final store offset
        words.remove(words.len() - 2);

        let diagnostics =
            validate_listing(&entries(&words), &ValidationConfig::with_expected(dims, config));
        let errs = errors(&diagnostics);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("expected"));
    }

    #[test]
    fn test_expected_count_overflow_is_reported() {
        let dims = Dimensions::new(1_000_000_000, 1_000_000_000, 30).unwrap();
        let config = CompilerConfig::default().with_cores(1);
        let stream = entries(&[
            Instruction::prog(0, true, false, 1),
            Instruction::end(0, false, false, 0),
        ]);

        let diagnostics =
            validate_listing(&stream, &ValidationConfig::with_expected(dims, config));
        let errs = errors(&diagnostics);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("overflows"));
    }

    #[test]
    fn test_validate_valid_file() {
        let dims = Dimensions::new(3, 2, 2).unwrap();
        let program = compile(&dims, &CompilerConfig::default()).unwrap();
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", program.render_listing()).unwrap();

        let result = validate_file(file.path());
        assert!(result.is_ok());
        if let ValidationResult::Ok { entries, .. } = &result {
            assert_eq!(entries.len(), program.instruction_count());
        }
    }

    #[test]
    fn test_validate_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "# header\n020401\nzz0000\n060000\n").unwrap();

        let result = validate_file(file.path());
        assert!(result.is_err());
        if let ValidationResult::Err { error, .. } = result {
            assert_eq!(error.line, Some(3));
            assert_eq!(error.snippet.as_deref(), Some("zz0000"));
        }
    }

    #[test]
    fn test_bad_binary_note() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "020401 # Binary: 0\n060000\n").unwrap();

        let result = validate_file(file.path());
        assert!(result.is_err());
        assert_eq!(errors(result.diagnostics()).len(), 1);
    }

    #[test]
    fn test_directory_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        let dims = Dimensions::new(2, 2, 2).unwrap();
        let program = compile(&dims, &CompilerConfig::default()).unwrap();
        std::fs::write(dir.path().join("b.pim"), program.render_listing()).unwrap();
        std::fs::write(nested.join("a.pim"), "040000\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a listing").unwrap();

        let results = validate_directory(dir.path()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].path() < results[1].path());

        let summary = ValidationSummary::from_results(&results);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.diag_errors, 1);
        assert!(!summary.all_passed());
    }
}
