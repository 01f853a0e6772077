//! pimgen - compile a matrix multiplication into PIM instruction listings
//!
//! # Usage
//!
//! ```bash
//! # Dimensions from a contract file
//! pimgen --dims matmul.json -o out.pim
//!
//! # Dimensions on the command line, 8 cores, 64-element memory rows
//! pimgen -M 16 -N 16 -K 32 -c 8 -r 64
//!
//! # Contract plus overrides, with three-address code and a packed image
//! pimgen --dims matmul.json -K 64 --tac --image out.pimb
//! ```
//!
//! # Exit Codes
//!
//! - 0: Compiled and written
//! - 1: Compile or write failed
//! - 2: Invalid arguments

use pimgen::{
    compile, generate_three_address_code, image, load_contract, CompilerConfig, Dimensions,
    RowCapacity,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

/// Parsed command line
struct Options {
    contract: Option<PathBuf>,
    config: Option<PathBuf>,
    output: PathBuf,
    image: Option<PathBuf>,
    m: Option<usize>,
    n: Option<usize>,
    k: Option<usize>,
    cores: Option<usize>,
    row_capacity: Option<u32>,
    tac: bool,
    annotate: bool,
    parallel: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            contract: None,
            config: None,
            output: PathBuf::from("output.pim"),
            image: None,
            m: None,
            n: None,
            k: None,
            cores: None,
            row_capacity: None,
            tac: false,
            annotate: true,
            parallel: true,
        }
    }
}

enum Parsed {
    Run(Options),
    Help,
}

fn main() -> ExitCode {
    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Parsed::Run(options)) => options,
        Ok(Parsed::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("Error: {}\n", message);
            print_help();
            return ExitCode::from(2);
        }
    };

    let start = Instant::now();

    let mut config = match &options.config {
        Some(path) => match CompilerConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}: {}", path.display(), e);
                return ExitCode::from(2);
            }
        },
        None => CompilerConfig::default(),
    };
    if let Some(cores) = options.cores {
        config.cores = cores;
    }
    if let Some(elements) = options.row_capacity {
        match RowCapacity::new(elements) {
            Ok(capacity) => config.row_capacity = capacity,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(2);
            }
        }
    }
    config.annotate &= options.annotate;
    config.parallel &= options.parallel;

    let (dims, name) = match resolve_dimensions(&options) {
        Ok(resolved) => resolved,
        Err(message) => {
            eprintln!("Error: {}", message);
            return ExitCode::from(2);
        }
    };

    println!("=== PIM Matrix Multiplication Compiler ===");
    println!("Matrix dimensions: {}", dims);
    println!("Output file: {}", options.output.display());
    println!("Row capacity: {}", config.row_capacity);
    println!("Multiply-accumulates: {}", dims.mac_count());

    let program = match compile(&dims, &config) {
        Ok(program) => match name {
            Some(name) => program.with_name(name),
            None => program,
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(warning) = program.partition.clamp_warning() {
        eprintln!("Warning: {}", warning);
    }
    println!("Number of cores: {}", program.partition.effective_cores);

    println!();
    for work in &program.partition.assignments {
        println!("  {}", work);
    }
    for region in program.memory_map.regions() {
        println!(
            "  Matrix {}: rows {:?} ({} elements)",
            region.matrix,
            region.row_range(),
            region.elements
        );
    }

    let listing = program.render_listing();
    if let Err(e) = std::fs::write(&options.output, listing) {
        eprintln!("Error: Could not write {}: {}", options.output.display(), e);
        return ExitCode::FAILURE;
    }
    println!("\nListing written to {}", options.output.display());

    if options.tac {
        let mut path = options.output.clone().into_os_string();
        path.push(".tac");
        let path = PathBuf::from(path);
        if let Err(e) = generate_three_address_code(&dims).save_to_file(&path) {
            eprintln!("Error: Could not write {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
        println!("Three-address code written to {}", path.display());
    }

    if let Some(path) = &options.image {
        if let Err(e) = image::save_to_file(&program, path) {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
        println!("Binary image written to {}", path.display());
    }

    println!("\nCompilation complete!");
    print!("{}", program.stats());
    println!("Time taken: {} ms", start.elapsed().as_millis());

    ExitCode::SUCCESS
}

/// Contract values first, then command-line overrides
fn resolve_dimensions(options: &Options) -> Result<(Dimensions, Option<String>), String> {
    let (mut m, mut n, mut k, mut name) = (None, None, None, None);

    if let Some(path) = &options.contract {
        let contract = load_contract(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        m = Some(contract.m);
        n = Some(contract.n);
        k = Some(contract.k);
        name = contract.name;
    }

    let m = options.m.or(m).ok_or("M not given (use --dims or -M)")?;
    let n = options.n.or(n).ok_or("N not given (use --dims or -N)")?;
    let k = options.k.or(k).ok_or("K not given (use --dims or -K)")?;

    let dims = Dimensions::new(m, n, k).map_err(|e| e.to_string())?;
    Ok((dims, name))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Parsed, String> {
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Parsed::Help),
            "-d" | "--dims" => options.contract = Some(value(&mut args, &arg)?),
            "--config" => options.config = Some(value(&mut args, &arg)?),
            "-o" | "--output" => options.output = value(&mut args, &arg)?,
            "--image" => options.image = Some(value(&mut args, &arg)?),
            "-M" => options.m = Some(value(&mut args, &arg)?),
            "-N" => options.n = Some(value(&mut args, &arg)?),
            "-K" => options.k = Some(value(&mut args, &arg)?),
            "-c" | "--cores" => options.cores = Some(value(&mut args, &arg)?),
            "-r" | "--row-capacity" => options.row_capacity = Some(value(&mut args, &arg)?),
            "--tac" => options.tac = true,
            "--no-comments" => options.annotate = false,
            "--serial" => options.parallel = false,
            _ if arg.starts_with('-') => return Err(format!("Unknown option: {}", arg)),
            // A bare path is taken as the dimension contract
            _ if options.contract.is_none() => options.contract = Some(PathBuf::from(arg)),
            _ => return Err(format!("Unexpected argument: {}", arg)),
        }
    }

    Ok(Parsed::Run(options))
}

fn value<T: FromStr>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T, String> {
    let raw = args.next().ok_or_else(|| format!("{} needs a value", flag))?;
    raw.parse()
        .map_err(|_| format!("Invalid value for {}: {}", flag, raw))
}

fn print_help() {
    eprintln!("pimgen - PIM matrix multiplication compiler");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    pimgen [OPTIONS] [CONTRACT]");
    eprintln!();
    eprintln!("ARGS:");
    eprintln!("    <CONTRACT>    Dimension contract (JSON), same as --dims");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -d, --dims <FILE>          Dimension contract (JSON)");
    eprintln!("    -M <ROWS>                  Rows in A (overrides the contract)");
    eprintln!("    -N <COLS>                  Columns in B (overrides the contract)");
    eprintln!("    -K <INNER>                 Columns in A / rows in B (overrides the contract)");
    eprintln!("    -c, --cores <N>            Number of cores (default: 4)");
    eprintln!("    -r, --row-capacity <N>     Elements per memory row (default: 512)");
    eprintln!("    --config <FILE>            Compiler configuration (JSON)");
    eprintln!("    -o, --output <FILE>        Listing output (default: output.pim)");
    eprintln!("    --tac                      Also write <output>.tac three-address code");
    eprintln!("    --image <FILE>             Also write a packed binary image");
    eprintln!("    --no-comments              Omit annotation lines");
    eprintln!("    --serial                   Generate core programs on one thread");
    eprintln!("    -h, --help                 Print this help message");
    eprintln!();
    eprintln!("EXIT CODES:");
    eprintln!("    0    Compiled successfully");
    eprintln!("    1    Compile or write failed");
    eprintln!("    2    Invalid arguments");
}
