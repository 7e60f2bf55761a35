//! jfold - JVM Bytecode Optimizer CLI
use jfold::bytecode::PoolEntry;
use jfold::{optimize_class, ClassModel, MethodOutcome, OptimizationStats, OptimizerConfig};
use std::env;
use std::io::{self, Read};
use std::path::Path;
use std::process;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("jfold v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    jfold [OPTIONS] <INPUT>");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help           Print this help message");
    eprintln!("    -V, --version        Print version information");
    eprintln!("    -o, --output <FILE>  Write the optimized listing to FILE (default: stdout)");
    eprintln!("    -c, --config <FILE>  Read optimizer settings from a TOML file");
    eprintln!("    --dump               Print listings and numeric constants before and after");
    eprintln!("    --stats              Print optimization statistics");
    eprintln!("    -q, --quiet          Only log warnings and errors");
    eprintln!("    -v, -vv              Log debug (-v) or trace (-vv) output");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    <INPUT>              Input class listing (use '-' for stdin)");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    jfold Sample.jasm -o Sample.opt.jasm");
    eprintln!("    jfold --stats -c jfold.toml Sample.jasm");
    eprintln!("    cat Sample.jasm | jfold -");
}

fn print_version() {
    println!("jfold {}", VERSION);
}

struct Options {
    input: Option<String>,
    output: Option<String>,
    config: Option<String>,
    dump: bool,
    stats: bool,
    level: Level,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();

    let mut input = None;
    let mut output = None;
    let mut config = None;
    let mut dump = false;
    let mut stats = false;
    let mut level = Level::INFO;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-V" | "--version" => {
                print_version();
                process::exit(0);
            }
            "-o" | "--output" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing output file after -o".to_string());
                }
                output = Some(args[i].clone());
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing config file after -c".to_string());
                }
                config = Some(args[i].clone());
            }
            "--dump" => {
                dump = true;
            }
            "--stats" => {
                stats = true;
            }
            "-q" | "--quiet" => {
                level = Level::WARN;
            }
            "-v" => {
                level = Level::DEBUG;
            }
            "-vv" => {
                level = Level::TRACE;
            }
            arg if arg.starts_with('-') && arg != "-" => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => {
                if input.is_some() {
                    return Err("Multiple input files specified".to_string());
                }
                input = Some(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(Options {
        input,
        output,
        config,
        dump,
        stats,
        level,
    })
}

fn read_class(input: &str) -> Result<ClassModel, String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        ClassModel::from_listing(&buffer).map_err(|e| format!("<stdin>: {}", e))
    } else {
        let path = Path::new(input);
        if !path.exists() {
            return Err(format!("Input file not found: {}", input));
        }
        ClassModel::load(path).map_err(|e| format!("{}: {}", input, e))
    }
}

fn dump(label: &str, class: &ClassModel) {
    eprintln!("==== {} ====", label);
    eprint!("{}", class.to_listing());
    eprintln!("---- numeric constants ----");
    for (index, entry) in class.constant_pool.iter() {
        if matches!(
            entry,
            PoolEntry::Integer(_) | PoolEntry::Long(_) | PoolEntry::Float(_) | PoolEntry::Double(_)
        ) {
            eprintln!("  #{} = {}", index, entry);
        }
    }
}

fn print_stats(stats: &OptimizationStats) {
    eprintln!("Methods optimized:        {}", stats.methods_optimized);
    eprintln!("Methods skipped:          {}", stats.methods_skipped);
    eprintln!("Methods aborted:          {}", stats.methods_aborted);
    eprintln!("Arithmetic folded:        {}", stats.arithmetic_folded);
    eprintln!("Conversions folded:       {}", stats.conversions_folded);
    eprintln!("Comparisons folded:       {}", stats.comparisons_folded);
    eprintln!("Branches resolved:        {}", stats.branches_resolved);
    eprintln!("Else blocks removed:      {}", stats.else_blocks_removed);
    eprintln!("Dead stores removed:      {}", stats.dead_stores_removed);
    eprintln!("Instructions removed:     {}", stats.instructions_removed);
    eprintln!("Loads guarded in loops:   {}", stats.guarded_loads);
    eprintln!("Divisions by zero kept:   {}", stats.division_by_zero_skipped);
    eprintln!("Lost branch targets:      {}", stats.lost_targets);
}

fn run(options: &Options) -> Result<(), String> {
    let input = options
        .input
        .as_deref()
        .ok_or_else(|| "Missing input file".to_string())?;

    let config = match &options.config {
        Some(path) => OptimizerConfig::load(Path::new(path)).map_err(|e| e.to_string())?,
        None => OptimizerConfig::default(),
    };

    let mut class = read_class(input)?;
    if options.dump {
        dump("before", &class);
    }

    let (reports, stats) = optimize_class(&mut class, config);
    for report in &reports {
        for lost in report.lost_targets() {
            warn!(
                method = %report.method,
                referrer = %lost.referrer,
                lost = %lost.target,
                "Branch target removed"
            );
        }
        if let MethodOutcome::Aborted(err) = &report.outcome {
            info!(method = %report.method, error = %err, "Method left unchanged");
        }
    }

    if options.dump {
        dump("after", &class);
    }
    if options.stats {
        print_stats(&stats);
    }

    match options.output.as_deref() {
        Some(path) => class
            .save(path)
            .map_err(|e| format!("Failed to write '{}': {}", path, e)),
        None => {
            class.validate().map_err(|e| e.to_string())?;
            print!("{}", class.to_listing());
            Ok(())
        }
    }
}

fn main() {
    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(options.level)
        .with_target(true)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: logging unavailable: {}", e);
    }

    if let Err(e) = run(&options) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
