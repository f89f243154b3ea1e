//! 变量解析和管理

use super::unit::{CompileUnit, LocalVar, UpvalueDesc};
use super::{CompileError, Compiler, SyntaxErrorKind};
use crate::core::{OpCode, Value};

/// 变量解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    Local(usize),
    Upvalue(usize),
    Module(usize),
}

/// 进入新作用域
pub fn enter_scope(compiler: &mut Compiler) {
    compiler.unit.scope_depth += 1;
}

/// 退出作用域：逆序弹出（或关闭）本层局部变量
pub fn leave_scope(compiler: &mut Compiler) {
    compiler.unit.scope_depth -= 1;
    let depth = compiler.unit.scope_depth;
    while let Some(local) = compiler.unit.locals.last() {
        if local.depth <= depth {
            break;
        }
        let op = if local.is_upvalue {
            OpCode::CloseUpvalue
        } else {
            OpCode::Pop
        };
        compiler.unit.locals.pop();
        compiler.emit(op);
    }
}

/// break/continue 前丢弃比 `depth` 深的局部变量
///
/// 之后的代码仍属于同一作用域，所以局部变量表和栈计数都不动。
pub fn discard_locals(compiler: &mut Compiler, depth: i32) {
    let ops: Vec<OpCode> = compiler
        .unit
        .locals
        .iter()
        .rev()
        .take_while(|local| local.depth > depth)
        .map(|local| {
            if local.is_upvalue {
                OpCode::CloseUpvalue
            } else {
                OpCode::Pop
            }
        })
        .collect();
    for op in ops {
        compiler.write_byte(op as u8);
    }
}

/// 声明局部变量，值已经在栈顶
pub fn declare_local(compiler: &mut Compiler, name: &str) -> Result<usize, CompileError> {
    compiler.check_id_len(name)?;
    let depth = compiler.unit.scope_depth;
    let duplicated = compiler
        .unit
        .locals
        .iter()
        .rev()
        .take_while(|local| local.depth >= depth)
        .any(|local| local.name == name);
    if duplicated {
        return Err(compiler.error(SyntaxErrorKind::LocalRedefinition(name.to_string())));
    }
    if compiler.unit.locals.len() >= compiler.limits.max_local_var_num {
        return Err(compiler.error(SyntaxErrorKind::TooManyLocals(
            compiler.limits.max_local_var_num,
        )));
    }
    compiler.unit.locals.push(LocalVar {
        name: name.to_string(),
        depth,
        is_upvalue: false,
    });
    Ok(compiler.unit.locals.len() - 1)
}

/// 声明形参，调用方在栈上放好实参
pub fn declare_param(compiler: &mut Compiler, name: &str) -> Result<usize, CompileError> {
    let slot = declare_local(compiler, name)?;
    compiler.unit.arg_num += 1;
    compiler.unit.adjust_stack(1);
    Ok(slot)
}

fn find_local(unit: &CompileUnit, name: &str) -> Option<usize> {
    unit.locals.iter().rposition(|local| local.name == name)
}

/// 记录 upvalue，同一个捕获位置只记一次
fn add_upvalue(
    compiler: &mut Compiler,
    level: usize,
    is_enclosing_local: bool,
    index: usize,
) -> Result<usize, CompileError> {
    let desc = UpvalueDesc {
        is_enclosing_local,
        index,
    };
    let max = compiler.limits.max_upvalue_num;
    let unit = compiler.unit_at(level);
    if let Some(existing) = unit.upvalues.iter().position(|u| *u == desc) {
        return Ok(existing);
    }
    if unit.upvalues.len() >= max {
        return Err(compiler.error(SyntaxErrorKind::TooManyUpvalues(max)));
    }
    unit.upvalues.push(desc);
    Ok(unit.upvalues.len() - 1)
}

/// 在 `level` 层单元里按名字找 upvalue，沿外层逐级捕获
fn resolve_upvalue(
    compiler: &mut Compiler,
    level: usize,
    name: &str,
) -> Result<Option<usize>, CompileError> {
    if level == 0 {
        return Ok(None);
    }
    let parent = level - 1;
    if let Some(slot) = find_local(compiler.unit_at(parent), name) {
        compiler.unit_at(parent).locals[slot].is_upvalue = true;
        return add_upvalue(compiler, level, true, slot).map(Some);
    }
    match resolve_upvalue(compiler, parent, name)? {
        Some(index) => add_upvalue(compiler, level, false, index).map(Some),
        None => Ok(None),
    }
}

/// 先找当前单元的局部变量，再找外层单元
pub fn resolve_local_or_upvalue(
    compiler: &mut Compiler,
    name: &str,
) -> Result<Option<Variable>, CompileError> {
    if let Some(slot) = find_local(&compiler.unit, name) {
        return Ok(Some(Variable::Local(slot)));
    }
    let level = compiler.enclosing.len();
    Ok(resolve_upvalue(compiler, level, name)?.map(Variable::Upvalue))
}

/// 定义模块变量；先前以行号占位声明的同名变量在这里落定
pub fn define_module_var(compiler: &mut Compiler, name: &str) -> Result<usize, CompileError> {
    compiler.check_id_len(name)?;
    match compiler.module.find_var(name) {
        None => Ok(compiler.module.add_var(name, Value::Null)),
        Some(index) => match compiler.forward_decls.iter().position(|&i| i == index) {
            Some(pos) => {
                compiler.forward_decls.remove(pos);
                compiler.module.set_var(index, Value::Null);
                Ok(index)
            }
            None => Err(compiler.error(SyntaxErrorKind::ModuleVarRedefinition(
                name.to_string(),
            ))),
        },
    }
}

/// 引用模块变量：依次找同名变量、`fun` 定义的函数，都没有就用当前行号占位声明
pub fn reference_module_var(compiler: &mut Compiler, name: &str) -> Result<usize, CompileError> {
    if let Some(index) = compiler.module.find_var(name) {
        return Ok(index);
    }
    if let Some(index) = compiler.module.find_var(&format!("Fn {}", name)) {
        return Ok(index);
    }
    forward_declare(compiler, name)
}

pub fn forward_declare(compiler: &mut Compiler, name: &str) -> Result<usize, CompileError> {
    compiler.check_id_len(name)?;
    let line = compiler.pre.line;
    let index = compiler.module.add_var(name, Value::Num(line as f64));
    compiler.forward_decls.push(index);
    Ok(index)
}

/// 编译结束时仍是占位的模块变量即未定义
pub fn check_forward_decls(compiler: &Compiler) -> Result<(), CompileError> {
    let Some(&index) = compiler.forward_decls.first() else {
        return Ok(());
    };
    let name = compiler.module.var_name(index).unwrap_or_default();
    let line = compiler
        .module
        .var(index)
        .and_then(|v| v.as_num())
        .unwrap_or(0.0) as u32;
    let kind = match name.strip_prefix("Fn ") {
        Some(function) => SyntaxErrorKind::UndefinedFunction(function.to_string()),
        None => SyntaxErrorKind::UndefinedVariable(name),
    };
    Err(CompileError::Syntax {
        module: compiler.module.name.clone(),
        line,
        kind,
    })
}

pub fn emit_load(compiler: &mut Compiler, var: Variable) {
    match var {
        Variable::Local(slot) => {
            compiler.emit_u8(OpCode::LoadLocalVar, slot);
        }
        Variable::Upvalue(index) => {
            compiler.emit_u8(OpCode::LoadUpvalue, index);
        }
        Variable::Module(index) => compiler.emit_u16(OpCode::LoadModuleVar, index),
    }
}

pub fn emit_store(compiler: &mut Compiler, var: Variable) {
    match var {
        Variable::Local(slot) => {
            compiler.emit_u8(OpCode::StoreLocalVar, slot);
        }
        Variable::Upvalue(index) => {
            compiler.emit_u8(OpCode::StoreUpvalue, index);
        }
        Variable::Module(index) => compiler.emit_u16(OpCode::StoreModuleVar, index),
    }
}

/// 后面跟 `=` 且允许赋值时编译右值并存储，否则加载
pub fn emit_load_or_store(
    compiler: &mut Compiler,
    var: Variable,
    can_assign: bool,
) -> Result<(), CompileError> {
    if can_assign && compiler.match_token(crate::kit::lexer::TokenKind::Assign)? {
        super::expr::expression(compiler, super::expr::BindPower::Lowest)?;
        emit_store(compiler, var);
    } else {
        emit_load(compiler, var);
    }
    Ok(())
}

/// 加载 this（方法的槽 0，嵌套函数里经由 upvalue）
pub fn load_this(compiler: &mut Compiler) -> Result<(), CompileError> {
    match resolve_local_or_upvalue(compiler, "this")? {
        Some(var) => {
            emit_load(compiler, var);
            Ok(())
        }
        None => Err(compiler.error(SyntaxErrorKind::ThisOutsideMethod)),
    }
}

/// 按名字加载模块变量（核心类等）
pub fn load_module_var(compiler: &mut Compiler, name: &str) -> Result<(), CompileError> {
    let index = reference_module_var(compiler, name)?;
    emit_load(compiler, Variable::Module(index));
    Ok(())
}
