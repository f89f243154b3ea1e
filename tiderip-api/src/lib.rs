//! Tiderip API - Execution orchestration layer
//!
//! Provides unified execution interface, including:
//! - Execution flow orchestration (source, file, REPL session)
//! - Configuration abstraction (RunConfig)
//! - Unified error handling (TideripError)
//! - File system module loading
//!
//! For CLI convenience, this crate provides a global singleton API.
//! For library use, prefer the explicit `run_source(source, &config)` API.

use std::path::Path;

use tiderip_core::core::ObjFn;
use tiderip_core::{dump_function, tokenize, InterpretResult, SharedBuffer, Vm};
use tiderip_log::{debug, info};

// Re-export config
pub mod config;
pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};

// Re-export error and types
pub mod error;
pub mod loader;
pub mod types;
pub use error::{ErrorReport, LexerError, TideripError};
pub use loader::FileModuleLoader;
pub use types::ExecuteOutput;

// Re-export core types
pub use tiderip_config::{CompilerLimits, Phase, VmConfig};
pub use tiderip_core::{CompileError, RuntimeError, Token, Value};

/// Module name used for `run_source`
pub const MAIN_MODULE: &str = "main";
/// Module name used by the REPL session
pub const REPL_MODULE: &str = "cli";

/// Execute source text as module `main`
///
/// Imports are resolved against `config.root_dir`.
pub fn run_source(source: &str, config: &RunConfig) -> Result<ExecuteOutput, TideripError> {
    run_module(MAIN_MODULE, source, config)
}

/// Read and execute a script file
///
/// The module is named after the path and imports resolve next to the file.
pub fn run_file(path: impl AsRef<Path>, config: &RunConfig) -> Result<ExecuteOutput, TideripError> {
    let path = path.as_ref();
    let source = read_source(path)?;
    let root_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.root_dir.clone());
    let config = RunConfig {
        root_dir,
        ..config.clone()
    };
    run_module(&path.display().to_string(), &source, &config)
}

/// Read a script file, mapping failures to `TideripError::Io`
pub fn read_source(path: &Path) -> Result<String, TideripError> {
    std::fs::read_to_string(path).map_err(|source| TideripError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Token dump, one `NL: KIND [lexeme]` line per token
pub fn tokens(source: &str) -> Result<Vec<String>, TideripError> {
    let tokens = tokenize(source)?;
    Ok(tokens.iter().map(Token::dump).collect())
}

/// Compile `source` as module `main` and return its JSON bytecode dump
pub fn dump_bytecode(source: &str, config: &RunConfig) -> Result<String, TideripError> {
    let mut vm = new_vm(config);
    let func = vm.compile_module(MAIN_MODULE, source)?;
    bytecode_json(&vm, &func)
}

fn run_module(name: &str, source: &str, config: &RunConfig) -> Result<ExecuteOutput, TideripError> {
    info!(config.logger, "Starting execution of module '{}'", name);

    let mut vm = new_vm(config);
    let buffer = SharedBuffer::new();
    if config.capture_output {
        vm.set_output(buffer.clone());
    }

    // Compile
    let func = vm.compile_module(name, source)?;

    // Optional: dump bytecode
    let bytecode = if config.dump_bytecode {
        Some(bytecode_json(&vm, &func)?)
    } else {
        None
    };

    // Execute
    finish(vm.run_function(func))?;

    info!(config.logger, "Execution completed");
    Ok(ExecuteOutput {
        stdout: buffer.contents(),
        bytecode,
    })
}

fn new_vm(config: &RunConfig) -> Vm {
    let mut vm = Vm::with_config_and_logger(config.vm.clone(), config.logger.clone());
    vm.set_module_loader(FileModuleLoader::new(
        config.root_dir.clone(),
        config.vm.source_extension.clone(),
    ));
    vm
}

fn bytecode_json(vm: &Vm, func: &ObjFn) -> Result<String, TideripError> {
    let dump = dump_function(func, &|symbol| vm.method_name(symbol));
    debug!(
        vm.logger(),
        "bytecode dump: {} instructions, {} nested functions",
        dump.code.len(),
        dump.functions.len()
    );
    Ok(dump.to_json()?)
}

fn finish(result: InterpretResult) -> Result<(), TideripError> {
    match result {
        InterpretResult::Success => Ok(()),
        InterpretResult::CompileError(err) => Err(TideripError::Compile(err)),
        InterpretResult::RuntimeError(err) => Err(TideripError::Runtime(err)),
    }
}

// ==================== REPL session ====================

/// A persistent virtual machine fed one snippet at a time
///
/// Every snippet is compiled into the same module, so variables defined by
/// earlier lines stay visible to later ones.
pub struct Session {
    vm: Vm,
    buffer: Option<SharedBuffer>,
}

impl Session {
    pub fn new(config: &RunConfig) -> Self {
        let mut vm = new_vm(config);
        let buffer = if config.capture_output {
            let buffer = SharedBuffer::new();
            vm.set_output(buffer.clone());
            Some(buffer)
        } else {
            None
        };
        Self { vm, buffer }
    }

    /// Execute one snippet as module `cli`
    pub fn execute(&mut self, source: &str) -> Result<(), TideripError> {
        finish(self.vm.execute_module(REPL_MODULE, source))
    }

    /// Take captured output (empty unless `capture_output` is set)
    pub fn take_output(&self) -> String {
        match &self.buffer {
            Some(buffer) => {
                let out = buffer.contents();
                buffer.clear();
                out
            }
            None => String::new(),
        }
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }
}
