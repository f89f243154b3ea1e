//! Core 模块 - Tiderip 运行时核心类型定义
//!
//! 本模块只放类型定义：
//! - Core 层：值、对象、指令集（本模块）
//! - Runtime 层：虚拟机与核心库（runtime/ 目录）
//! - API 层：对外接口（tiderip-api）

// ==================== 基础类型 ====================

pub mod value;
pub use value::{format_num, Obj, Value};

pub mod symbol;
pub use symbol::SymbolTable;

// ==================== 字节码 ====================

pub mod opcode;
pub use opcode::OpCode;

// ==================== 对象类型 ====================

pub mod object;
pub use object::{
    ObjClosure, ObjFn, ObjInstance, ObjList, ObjModule, ObjRange, ObjString, ObjUpvalue,
    UpvalueState,
};

pub mod class;
pub use class::{Method, ObjClass, PrimResult, Primitive};

pub mod map;
pub use map::{MapKey, ObjMap};

pub mod thread;
pub use thread::{CallFrame, ObjThread, ThreadState, ThreadStatus};

// ==================== 错误类型 ====================

pub mod error;
pub use error::{RuntimeError, TraceFrame};

// ==================== 虚拟机 ====================

pub mod vm;
pub use vm::{CoreClasses, InterpretResult, Vm};
