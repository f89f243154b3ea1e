//! Tiderip Config - Pure configuration data structures
//!
//! This crate contains only data structures, no logic or global state.
//! It serves as the shared configuration vocabulary across all Tiderip crates.

use serde::{Deserialize, Serialize};

/// Fixed limits enforced by the single-pass compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerLimits {
    /// Maximum local variables alive in one compile unit (slot 0 included)
    pub max_local_var_num: usize,
    /// Maximum upvalues captured by one function
    pub max_upvalue_num: usize,
    /// Maximum identifier length in bytes
    pub max_id_len: usize,
    /// Maximum arguments of a call or parameters of a method
    pub max_arg_num: usize,
    /// Maximum instance fields of a class, inherited ones included
    pub max_field_num: usize,
    /// Maximum constants in one function
    pub max_constants: usize,
}

/// Configuration for the virtual machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Initial value-stack capacity of a new coroutine
    pub initial_stack_size: usize,
    /// Maximum value-stack slots of one coroutine
    pub max_stack_size: usize,
    /// Maximum call frames of one coroutine
    pub max_frames: usize,
    /// Extension appended to module names when resolving source files
    pub source_extension: String,
    /// Compiler limits
    pub limits: CompilerLimits,
}

/// Execution phase enum for phase-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lexer,
    Compiler,
    Vm,
}

impl Phase {
    /// All phases, in pipeline order
    pub const ALL: [Phase; 3] = [Phase::Lexer, Phase::Compiler, Phase::Vm];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lexer => "lexer",
            Phase::Compiler => "compiler",
            Phase::Vm => "vm",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("tiderip::{}", self.as_str())
    }

    /// Classify a module path (as recorded by the logger) into a phase
    pub fn from_module_path(path: &str) -> Option<Phase> {
        if path.contains("::lexer") {
            Some(Phase::Lexer)
        } else if path.contains("::compiler") {
            Some(Phase::Compiler)
        } else if path.contains("::vm") || path.contains("::stdlib") {
            Some(Phase::Vm)
        } else {
            None
        }
    }
}

impl Default for CompilerLimits {
    fn default() -> Self {
        Self {
            max_local_var_num: 128,
            max_upvalue_num: 128,
            max_id_len: 128,
            max_arg_num: 16,
            max_field_num: 128,
            max_constants: 65535,
        }
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            initial_stack_size: 256,
            max_stack_size: 1 << 16,
            max_frames: 1024,
            source_extension: ".vt".to_string(),
            limits: CompilerLimits::default(),
        }
    }
}

impl CompilerLimits {
    /// Slot, upvalue and field operands are one byte wide
    pub const BYTE_OPERAND_LIMIT: usize = u8::MAX as usize;
    /// Calls have one opcode per argument count, up to 16
    pub const ARG_LIMIT: usize = 16;
    /// Constant operands are two bytes wide
    pub const CONSTANT_LIMIT: usize = u16::MAX as usize;

    /// Reject limits the bytecode encoding can't represent
    pub fn validate(&self) -> Result<(), String> {
        let checks = [
            ("max_local_var_num", self.max_local_var_num, Self::BYTE_OPERAND_LIMIT),
            ("max_upvalue_num", self.max_upvalue_num, Self::BYTE_OPERAND_LIMIT),
            ("max_field_num", self.max_field_num, Self::BYTE_OPERAND_LIMIT),
            ("max_arg_num", self.max_arg_num, Self::ARG_LIMIT),
            ("max_constants", self.max_constants, Self::CONSTANT_LIMIT),
        ];
        for (name, value, max) in checks {
            if value > max {
                return Err(format!("limits.{} is {} but can't exceed {}", name, value, max));
            }
        }
        Ok(())
    }

    /// Copy with every limit lowered to what the bytecode can encode
    pub fn clamped(&self) -> Self {
        Self {
            max_local_var_num: self.max_local_var_num.min(Self::BYTE_OPERAND_LIMIT),
            max_upvalue_num: self.max_upvalue_num.min(Self::BYTE_OPERAND_LIMIT),
            max_field_num: self.max_field_num.min(Self::BYTE_OPERAND_LIMIT),
            max_arg_num: self.max_arg_num.min(Self::ARG_LIMIT),
            max_constants: self.max_constants.min(Self::CONSTANT_LIMIT),
            ..self.clone()
        }
    }
}

impl VmConfig {
    /// Parse a configuration from JSON, missing keys fall back to defaults
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let config: Self = serde_json::from_str(text)?;
        config
            .limits
            .validate()
            .map_err(<serde_json::Error as serde::de::Error>::custom)?;
        Ok(config)
    }
}
