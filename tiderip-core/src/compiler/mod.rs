//! 单遍编译器
//!
//! 边读 token 边生成字节码，不构建语法树：
//! - 表达式用 TDOP（每种 token 的 nud/led + 绑定力）
//! - 每个模块、函数、方法各有一个编译单元，外层单元放在 `enclosing` 栈里
//! - 跳转先写占位操作数，目标确定后回填

mod class;
pub mod error;
mod expr;
pub mod signature;
mod stmt;
mod unit;
mod var;

pub use error::{CompileError, SyntaxErrorKind};
pub use signature::{Signature, SignatureKind};

use crate::core::{Obj, ObjFn, ObjModule, OpCode, Value};
use crate::kit::lexer::{Lexer, Token, TokenKind};
use crate::runtime::Vm;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tiderip_config::CompilerLimits;
use tiderip_log::{debug, trace, Logger};
use unit::{ClassBookKeep, CompileUnit, UnitKind};

/// 编译器上下文
pub struct Compiler<'a> {
    vm: &'a mut Vm,
    module: Rc<ObjModule>,
    lexer: Lexer<'a>,
    /// 当前 token（向前看一个）
    cur: Token,
    /// 刚消费的 token
    pre: Token,
    /// 正在编译的单元
    unit: CompileUnit,
    /// 外层单元，下标 0 是模块单元
    enclosing: Vec<CompileUnit>,
    class_bk: Option<ClassBookKeep>,
    /// 以行号占位声明、尚未定义的模块变量
    forward_decls: Vec<usize>,
    limits: CompilerLimits,
    logger: Arc<Logger>,
}

/// 把一段源码编译进模块，返回模块的顶层函数
///
/// 编译失败时回滚本次新增的模块变量，模块保持编译前的状态。
pub fn compile_module(
    vm: &mut Vm,
    module: Rc<ObjModule>,
    source: &str,
) -> Result<Rc<ObjFn>, CompileError> {
    let var_count = module.var_count();
    let logger = vm.logger();
    debug!(logger, "compiling module '{}'", module.name);

    let result = Compiler::new(vm, module.clone(), source).compile();
    if result.is_err() {
        module.truncate_vars(var_count);
    }
    result
}

impl<'a> Compiler<'a> {
    fn new(vm: &'a mut Vm, module: Rc<ObjModule>, source: &'a str) -> Self {
        let limits = vm.config().limits.clamped();
        let logger = vm.logger();
        let unit = CompileUnit::new(UnitKind::Module, module.name.clone());
        Compiler {
            vm,
            module,
            lexer: Lexer::with_logger(source, logger.clone()),
            cur: Token::placeholder(),
            pre: Token::placeholder(),
            unit,
            enclosing: Vec::new(),
            class_bk: None,
            forward_decls: Vec::new(),
            limits,
            logger,
        }
    }

    fn compile(mut self) -> Result<Rc<ObjFn>, CompileError> {
        self.advance()?;
        while !self.match_token(TokenKind::Eof)? {
            stmt::compile_program(&mut self)?;
        }
        self.emit(OpCode::PushNull);
        self.emit(OpCode::Return);
        var::check_forward_decls(&self)?;
        self.end_unit()
    }

    // ==================== token ====================

    fn advance(&mut self) -> Result<(), CompileError> {
        let next = self.lexer.next_token()?;
        self.pre = std::mem::replace(&mut self.cur, next);
        Ok(())
    }

    fn match_token(&mut self, kind: TokenKind) -> Result<bool, CompileError> {
        if self.cur.kind == kind {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<(), CompileError> {
        if self.cur.kind == kind {
            self.advance()
        } else {
            Err(self.unexpected(expected))
        }
    }

    /// 消费一个标识符并返回它的文本
    fn consume_id(&mut self, expected: &str) -> Result<String, CompileError> {
        self.consume(TokenKind::Id, expected)?;
        Ok(self.pre.lexeme.clone())
    }

    // ==================== 错误 ====================

    /// 错误定位在刚消费的 token 上
    fn error(&self, kind: SyntaxErrorKind) -> CompileError {
        CompileError::Syntax {
            module: self.module.name.clone(),
            line: self.pre.line,
            kind,
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let found = if self.cur.kind == TokenKind::Eof {
            "end of file".to_string()
        } else {
            self.cur.lexeme.clone()
        };
        CompileError::Syntax {
            module: self.module.name.clone(),
            line: self.cur.line,
            kind: SyntaxErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found,
            },
        }
    }

    fn check_id_len(&self, name: &str) -> Result<(), CompileError> {
        if name.len() > self.limits.max_id_len {
            return Err(self.error(SyntaxErrorKind::IdentifierTooLong {
                name: name.to_string(),
                max: self.limits.max_id_len,
            }));
        }
        Ok(())
    }

    // ==================== 作用域判断 ====================

    /// 模块单元的顶层（不在任何块中）
    fn at_module_scope(&self) -> bool {
        self.enclosing.is_empty() && self.unit.scope_depth == -1
    }

    /// 当前单元或某个外层单元是方法
    fn in_method(&self) -> bool {
        self.unit.kind == UnitKind::Method
            || self.enclosing.iter().any(|u| u.kind == UnitKind::Method)
    }

    /// 按层级取单元，`enclosing.len()` 对应当前单元
    fn unit_at(&mut self, level: usize) -> &mut CompileUnit {
        if level >= self.enclosing.len() {
            &mut self.unit
        } else {
            &mut self.enclosing[level]
        }
    }

    // ==================== 指令生成 ====================

    /// 写一个原始字节，不计栈效果
    fn write_byte(&mut self, byte: u8) -> usize {
        self.unit.code.push(byte);
        self.unit.lines.push(self.pre.line);
        self.unit.code.len() - 1
    }

    fn write_u16(&mut self, operand: usize) {
        self.write_byte((operand >> 8) as u8);
        self.write_byte(operand as u8);
    }

    fn emit(&mut self, op: OpCode) -> usize {
        self.unit.adjust_stack(op.stack_effect());
        self.write_byte(op as u8)
    }

    /// 返回操作数所在位置
    fn emit_u8(&mut self, op: OpCode, operand: usize) -> usize {
        self.emit(op);
        self.write_byte(operand as u8)
    }

    fn emit_u16(&mut self, op: OpCode, operand: usize) {
        self.emit(op);
        self.write_u16(operand);
    }

    fn add_constant(&mut self, value: Value) -> Result<usize, CompileError> {
        if self.unit.constants.len() >= self.limits.max_constants {
            return Err(self.error(SyntaxErrorKind::TooManyConstants(
                self.limits.max_constants,
            )));
        }
        self.unit.constants.push(value);
        Ok(self.unit.constants.len() - 1)
    }

    fn emit_constant(&mut self, value: Value) -> Result<(), CompileError> {
        let index = self.add_constant(value)?;
        self.emit_u16(OpCode::LoadConstant, index);
        Ok(())
    }

    /// 写占位跳转，返回操作数位置
    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit(op);
        let at = self.write_byte(0xff);
        self.write_byte(0xff);
        at
    }

    /// 把 `at` 处的占位回填为跳到当前位置的偏移
    fn patch_jump(&mut self, at: usize) -> Result<(), CompileError> {
        let offset = self.unit.code.len() - (at + 2);
        if offset > u16::MAX as usize {
            return Err(self.error(SyntaxErrorKind::JumpTooLarge));
        }
        self.unit.code[at] = (offset >> 8) as u8;
        self.unit.code[at + 1] = offset as u8;
        Ok(())
    }

    /// 向后跳到 `start`
    fn emit_loop(&mut self, start: usize) -> Result<(), CompileError> {
        self.emit(OpCode::Loop);
        let offset = self.unit.code.len() + 2 - start;
        if offset > u16::MAX as usize {
            return Err(self.error(SyntaxErrorKind::JumpTooLarge));
        }
        self.write_u16(offset);
        Ok(())
    }

    /// 按签名生成 CALLn / SUPERn
    ///
    /// SUPERn 额外带一个常量下标，绑定方法时由虚拟机写入父类。
    fn emit_call(&mut self, sig: &Signature, is_super: bool) -> Result<(), CompileError> {
        let max = self.limits.max_arg_num;
        let op = if is_super {
            OpCode::super_call(sig.arg_num)
        } else {
            OpCode::call(sig.arg_num)
        };
        let op = match op {
            Some(op) if sig.arg_num <= max => op,
            _ => return Err(self.error(SyntaxErrorKind::TooManyArgs(max))),
        };
        let symbol = self.vm.method_names.ensure(&sig.key());
        self.emit_u16(op, symbol);
        if is_super {
            let slot = self.add_constant(Value::Null)?;
            self.write_u16(slot);
        }
        Ok(())
    }

    /// 构造器返回 this，其余返回 null
    fn emit_implicit_return(&mut self) {
        if self.unit.is_constructor {
            self.emit_u8(OpCode::LoadLocalVar, 0);
        } else {
            self.emit(OpCode::PushNull);
        }
        self.emit(OpCode::Return);
    }

    // ==================== 编译单元 ====================

    fn push_unit(&mut self, kind: UnitKind, name: impl Into<String>) {
        let parent = std::mem::replace(&mut self.unit, CompileUnit::new(kind, name));
        self.enclosing.push(parent);
    }

    /// 结束当前单元
    ///
    /// 有外层单元时，在外层生成 CREATE_CLOSURE 及每个 upvalue 的捕获描述。
    fn end_unit(&mut self) -> Result<Rc<ObjFn>, CompileError> {
        self.emit(OpCode::End);
        let has_parent = !self.enclosing.is_empty();
        let unit = match self.enclosing.pop() {
            Some(parent) => std::mem::replace(&mut self.unit, parent),
            None => std::mem::take(&mut self.unit),
        };

        trace!(
            self.logger,
            "unit '{}': {} bytes, {} constants, {} upvalues, {} slots",
            unit.name,
            unit.code.len(),
            unit.constants.len(),
            unit.upvalues.len(),
            unit.max_stack_slots
        );

        let upvalues = unit.upvalues;
        let func = Rc::new(ObjFn {
            name: unit.name,
            code: unit.code,
            lines: unit.lines,
            constants: RefCell::new(unit.constants),
            arg_num: unit.arg_num,
            upvalue_num: upvalues.len(),
            max_stack_slots: unit.max_stack_slots,
            module: Rc::downgrade(&self.module),
        });

        if has_parent {
            let index = self.add_constant(Value::Obj(Obj::Fn(func.clone())))?;
            self.emit_u16(OpCode::CreateClosure, index);
            for upvalue in &upvalues {
                self.write_byte(upvalue.is_enclosing_local as u8);
                self.write_byte(upvalue.index as u8);
            }
        }
        Ok(func)
    }
}
