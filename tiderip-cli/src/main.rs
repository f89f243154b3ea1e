//! Tiderip CLI - Command line interface
//!
//! Runs a script file, or starts a REPL when no file is given.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;

mod config;
mod logging;
mod platform;

use crate::config::{parse_level, LogConfig};
use crate::logging::{LogFormat, TracingSink};
use crate::platform::{print_error_with_source, run_repl};
use tiderip_api::{
    dump_bytecode, init_config, read_source, run_file, tokens, RunConfig, VmConfig,
};
use tiderip_log::Logger;

#[derive(Parser)]
#[command(
    name = "tiderip",
    about = "Tiderip scripting language",
    disable_version_flag = true
)]
struct Cli {
    /// Script to run; starts the REPL when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Print version information
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Print the token stream instead of running
    #[arg(long)]
    tokens: bool,

    /// Print a JSON dump of the compiled module before running
    #[arg(long)]
    dump_bytecode: bool,

    /// Default log level: silent, error, warn, info, debug, trace
    #[arg(long, value_name = "LEVEL", value_parser = parse_level, default_value = "warn")]
    log_level: tracing::Level,

    /// Log level for the lexer
    #[arg(long, value_name = "LEVEL", value_parser = parse_level)]
    lexer_log: Option<tracing::Level>,

    /// Log level for the compiler
    #[arg(long, value_name = "LEVEL", value_parser = parse_level)]
    compiler_log: Option<tracing::Level>,

    /// Log level for the virtual machine
    #[arg(long, value_name = "LEVEL", value_parser = parse_level)]
    vm_log: Option<tracing::Level>,

    /// Log output format
    #[arg(long, value_enum, default_value = "compact")]
    log_format: LogFormat,

    /// VM configuration file (JSON); missing keys use defaults
    #[arg(long, value_name = "PATH")]
    vm_config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("tiderip {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let log_config = LogConfig {
        global: cli.log_level,
        lexer: cli.lexer_log,
        compiler: cli.compiler_log,
        vm: cli.vm_log,
    };
    logging::init(&log_config, cli.log_format);
    let logger = Logger::new(log_config.most_verbose()).with_sink(TracingSink);

    let vm = match &cli.vm_config {
        Some(path) => load_vm_config(path),
        None => VmConfig::default(),
    };

    let run_config = RunConfig {
        vm,
        dump_tokens: cli.tokens,
        dump_bytecode: cli.dump_bytecode,
        logger,
        ..RunConfig::default()
    };
    tracing::debug!(target: "tiderip::cli", "run config: {:?}", run_config);

    // Initialize API config (global singleton for convenience)
    if init_config(run_config.clone()).is_err() {
        tracing::warn!(target: "tiderip::cli", "global config already initialized");
    }

    match &cli.file {
        Some(path) => run_script(path, &run_config),
        None => {
            if let Err(e) = run_repl(&run_config) {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }
}

fn load_vm_config(path: &Path) -> VmConfig {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|text| VmConfig::from_json(&text).map_err(|e| e.to_string()));
    match parsed {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("Error: cannot load VM config '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn run_script(path: &Path, config: &RunConfig) {
    if config.dump_tokens {
        let source = read_or_exit(path);
        match tokens(&source) {
            Ok(lines) => lines.iter().for_each(|line| println!("{}", line)),
            Err(e) => {
                print_error_with_source(&e, Some(&source));
                process::exit(1);
            }
        }
        return;
    }

    if config.dump_bytecode {
        let source = read_or_exit(path);
        match dump_bytecode(&source, config) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                print_error_with_source(&e, Some(&source));
                process::exit(1);
            }
        }
    }

    // 转储已经打印过，执行时不再重复生成
    let config = RunConfig {
        dump_bytecode: false,
        ..config.clone()
    };
    if let Err(e) = run_file(path, &config) {
        let source = read_source(path).ok();
        print_error_with_source(&e, source.as_deref());
        process::exit(1);
    }
}

fn read_or_exit(path: &Path) -> String {
    match read_source(path) {
        Ok(source) => source,
        Err(e) => {
            print_error_with_source(&e, None);
            process::exit(1);
        }
    }
}
