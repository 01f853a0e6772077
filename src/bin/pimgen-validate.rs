//! pimgen-validate - Check .pim instruction listings before loading
//!
//! # Usage
//!
//! ```bash
//! # Structure checks for every .pim file in a directory
//! pimgen-validate out/
//!
//! # Also check per-core counts against the shape the listing was built for
//! pimgen-validate -M 16 -N 16 -K 32 -c 8 out/matmul.pim
//!
//! # Expected shape from a dimension contract, verbose
//! pimgen-validate -v --dims matmul.json out/matmul.pim
//! ```
//!
//! # Exit Codes
//!
//! - 0: All files validated successfully (no errors)
//! - 1: One or more files failed validation (parse errors or error-level diagnostics)
//! - 2: Invalid arguments or IO error

use pimgen::validate::{
    validate_directory_with_config, validate_file_with_config, DiagnosticLevel,
    ValidationConfig, ValidationResult, ValidationSummary,
};
use pimgen::{load_contract, CompilerConfig, DimensionContract, Dimensions, RowCapacity};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Default)]
struct ShapeArgs {
    contract: Option<PathBuf>,
    m: Option<usize>,
    n: Option<usize>,
    k: Option<usize>,
    cores: Option<usize>,
    row_capacity: Option<u32>,
}

impl ShapeArgs {
    fn given(&self) -> bool {
        self.contract.is_some() || self.m.is_some() || self.n.is_some() || self.k.is_some()
    }

    /// Build the expected-shape config, if any shape was given
    fn to_config(&self) -> Result<ValidationConfig, String> {
        if !self.given() {
            return Ok(ValidationConfig::default());
        }

        let contract = match &self.contract {
            Some(path) => {
                Some(load_contract(path).map_err(|e| format!("{}: {}", path.display(), e))?)
            }
            None => None,
        };
        let pick = |flag: Option<usize>, from: fn(&DimensionContract) -> usize, name: &str| {
            flag.or(contract.as_ref().map(from))
                .ok_or_else(|| format!("{} not given (use --dims or -{})", name, name))
        };
        let m = pick(self.m, |c| c.m, "M")?;
        let n = pick(self.n, |c| c.n, "N")?;
        let k = pick(self.k, |c| c.k, "K")?;
        let dims = Dimensions::new(m, n, k).map_err(|e| e.to_string())?;

        let mut config = CompilerConfig::default();
        if let Some(cores) = self.cores {
            config.cores = cores;
        }
        if let Some(elements) = self.row_capacity {
            config.row_capacity = RowCapacity::new(elements).map_err(|e| e.to_string())?;
        }
        Ok(ValidationConfig::with_expected(dims, config))
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut verbose = false;
    let mut shape = ShapeArgs::default();
    let mut paths = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let parsed = match arg.as_str() {
            "-v" | "--verbose" => {
                verbose = true;
                Ok(())
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "-d" | "--dims" => next_value(&mut iter, arg).map(|v| shape.contract = Some(v)),
            "-M" => next_value(&mut iter, arg).map(|v| shape.m = Some(v)),
            "-N" => next_value(&mut iter, arg).map(|v| shape.n = Some(v)),
            "-K" => next_value(&mut iter, arg).map(|v| shape.k = Some(v)),
            "-c" | "--cores" => next_value(&mut iter, arg).map(|v| shape.cores = Some(v)),
            "-r" | "--row-capacity" => {
                next_value(&mut iter, arg).map(|v| shape.row_capacity = Some(v))
            }
            _ if arg.starts_with('-') => Err(format!("Unknown option: {}", arg)),
            _ => {
                paths.push(arg.clone());
                Ok(())
            }
        };
        if let Err(message) = parsed {
            eprintln!("Error: {}\n", message);
            print_help();
            return ExitCode::from(2);
        }
    }

    if paths.is_empty() {
        eprintln!("Error: No path specified\n");
        print_help();
        return ExitCode::from(2);
    }

    let config = match shape.to_config() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::from(2);
        }
    };

    let mut all_results = Vec::new();

    for path_str in &paths {
        let path = Path::new(path_str);

        if !path.exists() {
            eprintln!("Error: Path does not exist: {}", path.display());
            return ExitCode::from(2);
        }

        if path.is_file() {
            let result = validate_file_with_config(path, &config);
            print_result(&result, verbose);
            all_results.push(result);
        } else if path.is_dir() {
            match validate_directory_with_config(path, &config) {
                Ok(results) => {
                    for result in &results {
                        print_result(result, verbose);
                    }
                    all_results.extend(results);
                }
                Err(e) => {
                    eprintln!("Error reading directory {}: {}", path.display(), e);
                    return ExitCode::from(2);
                }
            }
        }
    }

    let summary = ValidationSummary::from_results(&all_results);
    eprintln!();
    summary.print_report();

    if summary.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn next_value<'a, T: std::str::FromStr>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<T, String> {
    let raw = iter.next().ok_or_else(|| format!("{} needs a value", flag))?;
    raw.parse().map_err(|_| format!("Invalid value for {}: {}", flag, raw))
}

fn print_result(result: &ValidationResult, verbose: bool) {
    match result {
        ValidationResult::Ok { path, entries, diagnostics } => {
            let marker = if result.is_ok() { "+" } else { "!" };

            if verbose {
                println!("{} {} ({} instrs)", marker, path.display(), entries.len());
            } else {
                println!("{} {}", marker, path.display());
            }

            for d in diagnostics {
                if d.level == DiagnosticLevel::Info && !verbose {
                    continue;
                }
                eprintln!("    {}", d);
            }
        }
        ValidationResult::Err { path, error } => {
            eprintln!("x {}", path.display());
            if let Some(line) = error.line {
                eprintln!("  line {}: {}", line, error.message);
            } else {
                eprintln!("  {}", error.message);
            }
            if let Some(snippet) = &error.snippet {
                eprintln!("  | {}", snippet);
            }
        }
    }
}

fn print_help() {
    eprintln!("pimgen-validate - Validate .pim instruction listings");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    pimgen-validate [OPTIONS] <PATH>...");
    eprintln!();
    eprintln!("ARGS:");
    eprintln!("    <PATH>    File or directory to validate (recursive for directories)");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -v, --verbose              Show instruction counts and info diagnostics");
    eprintln!("    -d, --dims <FILE>          Expected shape from a dimension contract");
    eprintln!("    -M, -N, -K <VALUE>         Expected shape (overrides the contract)");
    eprintln!("    -c, --cores <N>            Cores the listing was built for (default: 4)");
    eprintln!("    -r, --row-capacity <N>     Elements per memory row (default: 512)");
    eprintln!("    -h, --help                 Print this help message");
    eprintln!();
    eprintln!("EXIT CODES:");
    eprintln!("    0    All files validated successfully");
    eprintln!("    1    One or more files failed validation");
    eprintln!("    2    Invalid arguments or IO error");
}
