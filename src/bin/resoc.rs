//! Command line driver for the Reso compiler.
//!
//! Exit codes: 0 on success, 1 when the sources had errors, 2 for usage
//! errors (including a rejected option), 3 for internal or I/O failures.

use std::{path::PathBuf, process::exit};

use clap::Parser;
use colored::Colorize;
use reso_lang::{compile, CompileOptions};
use reso_lang::diagnostics::{ErrorRecord, Severity};

#[derive(Parser, Debug)]
#[command(author, version, about = "Compiler for the Reso programming language")]
struct Cli {
    /// Source files to compile as one job
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Write a native object file to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optimize at the given level (0-3)
    #[arg(short = 'O', value_name = "LEVEL")]
    optimize: Option<u8>,

    /// Emit debug information
    #[arg(short = 'g', long = "debug-info")]
    debug_info: bool,

    /// Chatty progress output
    #[arg(short, long)]
    verbose: bool,

    /// Print the generated LLVM IR on success
    #[arg(long)]
    print_ir: bool,
}

fn main() {
    let cli = Cli::parse();

    simple_logger::SimpleLogger::new()
        .with_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init()
        .ok();

    let mut options = CompileOptions::new();
    options.debug_info_enabled = cli.debug_info;
    options.verbose_output = cli.verbose;
    options.print_ir = cli.print_ir;
    if let Some(level) = cli.optimize {
        options.optimization_enabled = true;
        options = match options.with_optimization_level(level) {
            Ok(options) => options,
            Err(error) => {
                eprintln!("{}: {error}", "usage error".red().bold());
                exit(2);
            }
        };
    }

    match compile(&cli.files, cli.output.as_deref(), &options) {
        Ok(result) => {
            for record in &result.errors {
                print_record(record);
            }

            if !result.success {
                exit(1);
            }
            if options.print_ir {
                if let Some(ir) = &result.ir {
                    println!("{ir}");
                }
            }
            if let Some(path) = &result.output_path {
                log::info!("wrote '{}'", path.display());
            }
        }
        Err(error) => {
            eprintln!("{}: {error}", "error".red().bold());
            exit(3);
        }
    }
}

fn print_record(record: &ErrorRecord) {
    let severity = match record.severity {
        Severity::Warning => "warning".yellow().bold(),
        Severity::Error => "error".red().bold(),
        Severity::Internal => "internal error".red().bold(),
    };
    eprintln!(
        "{}:{}:{}: {severity}: {}",
        record.file, record.line, record.column, record.message
    );
}
