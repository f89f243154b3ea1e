//! Runtime 模块 - 虚拟机执行与核心库
//!
//! 本模块包含：
//! - 虚拟机执行（vm/）
//! - 核心库与引导（stdlib/）
//! - 模块源码加载（loader）
//! - 字节码反汇编（disasm）

pub mod disasm;
pub mod loader;
pub mod stdlib;
pub mod vm;

pub use crate::core::{InterpretResult, Vm};
pub use loader::{MemoryModuleLoader, ModuleLoader, NoModuleLoader};
pub use vm::SharedBuffer;
