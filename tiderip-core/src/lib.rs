//! Tiderip Core - lexer, single-pass compiler, object model and VM
//!
//! Only operates on in-memory data: sources come in as strings, script output
//! goes to a writer supplied by the embedder, imported modules are resolved
//! through a `ModuleLoader`.
//!
//! Configuration and the logger are passed explicitly, not via global state.

pub mod compiler;
pub mod core;
pub mod kit;
pub mod runtime;

// Re-export common types
pub use crate::compiler::CompileError;
pub use crate::core::{RuntimeError, Value};
pub use crate::kit::lexer::{tokenize, LexerError, Token, TokenKind};
pub use crate::runtime::disasm::{disassemble, dump_function, FunctionDump};
pub use crate::runtime::{
    InterpretResult, MemoryModuleLoader, ModuleLoader, NoModuleLoader, SharedBuffer, Vm,
};

// Re-export config types from tiderip-config
pub use tiderip_config::{CompilerLimits, Phase, VmConfig};
