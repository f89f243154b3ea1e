//! 语句编译

use super::expr::{self, BindPower};
use super::signature::Signature;
use super::unit::{Loop, UnitKind};
use super::var::{self, Variable};
use super::{class, CompileError, Compiler, SyntaxErrorKind};
use crate::core::{OpCode, Value};
use crate::kit::lexer::TokenKind;
use tiderip_log::trace;

/// 编译一条声明或语句
pub fn compile_program(compiler: &mut Compiler) -> Result<(), CompileError> {
    if compiler.match_token(TokenKind::Class)? {
        class::class_definition(compiler)
    } else if compiler.match_token(TokenKind::Fun)? {
        fun_definition(compiler)
    } else if compiler.match_token(TokenKind::Var)? {
        var_definition(compiler)
    } else if compiler.match_token(TokenKind::Import)? {
        import_statement(compiler)
    } else {
        statement(compiler)
    }
}

fn statement(compiler: &mut Compiler) -> Result<(), CompileError> {
    if compiler.match_token(TokenKind::If)? {
        if_statement(compiler)
    } else if compiler.match_token(TokenKind::While)? {
        while_statement(compiler)
    } else if compiler.match_token(TokenKind::For)? {
        for_statement(compiler)
    } else if compiler.match_token(TokenKind::Break)? {
        break_statement(compiler)
    } else if compiler.match_token(TokenKind::Continue)? {
        continue_statement(compiler)
    } else if compiler.match_token(TokenKind::Return)? {
        return_statement(compiler)
    } else if compiler.match_token(TokenKind::LeftBrace)? {
        var::enter_scope(compiler);
        block(compiler)?;
        var::leave_scope(compiler);
        Ok(())
    } else {
        expr::expression(compiler, BindPower::Lowest)?;
        compiler.emit(OpCode::Pop);
        Ok(())
    }
}

/// 块内容直到右花括号，调用方已消费左花括号
pub fn block(compiler: &mut Compiler) -> Result<(), CompileError> {
    loop {
        if compiler.match_token(TokenKind::RightBrace)? {
            return Ok(());
        }
        if compiler.cur.kind == TokenKind::Eof {
            return Err(compiler.unexpected("'}' at end of block"));
        }
        compile_program(compiler)?;
    }
}

/// 模块作用域定义模块变量，其余定义局部变量
fn var_definition(compiler: &mut Compiler) -> Result<(), CompileError> {
    let name = compiler.consume_id("variable name")?;
    if compiler.match_token(TokenKind::Assign)? {
        expr::expression(compiler, BindPower::Lowest)?;
    } else {
        compiler.emit(OpCode::PushNull);
    }

    if compiler.at_module_scope() {
        let index = var::define_module_var(compiler, &name)?;
        var::emit_store(compiler, Variable::Module(index));
        compiler.emit(OpCode::Pop);
    } else {
        var::declare_local(compiler, &name)?;
    }
    Ok(())
}

/// `fun name(params) { body }`，函数存放在模块变量 `"Fn name"` 中
fn fun_definition(compiler: &mut Compiler) -> Result<(), CompileError> {
    if !compiler.at_module_scope() {
        return Err(compiler.error(SyntaxErrorKind::FunNotAtModuleScope));
    }
    let name = compiler.consume_id("function name")?;
    // 先定义再编译函数体，函数体内可以递归调用自己
    let index = var::define_module_var(compiler, &format!("Fn {}", name))?;

    compiler.push_unit(UnitKind::Function, name.clone());
    compiler.consume(TokenKind::LeftParen, "'(' after function name")?;
    if !compiler.match_token(TokenKind::RightParen)? {
        expr::param_list(compiler)?;
        compiler.consume(TokenKind::RightParen, "')' after parameters")?;
    }
    compiler.consume(TokenKind::LeftBrace, "'{' before function body")?;
    expr::function_body(compiler, false)?;
    compiler.end_unit()?;

    var::emit_store(compiler, Variable::Module(index));
    compiler.emit(OpCode::Pop);
    trace!(compiler.logger, "fun '{}' defined at module var {}", name, index);
    Ok(())
}

fn if_statement(compiler: &mut Compiler) -> Result<(), CompileError> {
    compiler.consume(TokenKind::LeftParen, "'(' after 'if'")?;
    expr::expression(compiler, BindPower::Lowest)?;
    compiler.consume(TokenKind::RightParen, "')' after condition")?;

    let false_jump = compiler.emit_jump(OpCode::JumpIfFalse);
    statement(compiler)?;

    if compiler.match_token(TokenKind::Else)? {
        let end_jump = compiler.emit_jump(OpCode::Jump);
        compiler.patch_jump(false_jump)?;
        statement(compiler)?;
        compiler.patch_jump(end_jump)
    } else {
        compiler.patch_jump(false_jump)
    }
}

fn enter_loop(compiler: &mut Compiler) {
    let cond_start = compiler.unit.code.len();
    let scope_depth = compiler.unit.scope_depth;
    compiler.unit.loops.push(Loop {
        cond_start,
        body_start: cond_start,
        scope_depth,
        exit_index: 0,
    });
}

/// 循环体编译完成：回填退出跳转，把循环体里作为 break 占位的 END 改成 JUMP
fn leave_loop(compiler: &mut Compiler) -> Result<(), CompileError> {
    compiler.emit_loop(current_loop(compiler)?.cond_start)?;
    let Some(lp) = compiler.unit.loops.pop() else {
        return Err(compiler.error(SyntaxErrorKind::BreakOutsideLoop));
    };
    compiler.patch_jump(lp.exit_index)?;

    let end = compiler.unit.code.len();
    let mut ip = lp.body_start;
    while ip < end {
        let byte = compiler.unit.code[ip];
        if byte == OpCode::End as u8 {
            compiler.unit.code[ip] = OpCode::Jump as u8;
            compiler.patch_jump(ip + 1)?;
            ip += 3;
            continue;
        }
        let Some(op) = OpCode::from_u8(byte) else {
            ip += 1;
            continue;
        };
        ip += 1 + op.operand_bytes(&compiler.unit.code, ip + 1, &compiler.unit.constants);
    }
    Ok(())
}

fn current_loop(compiler: &Compiler) -> Result<Loop, CompileError> {
    compiler
        .unit
        .loops
        .last()
        .cloned()
        .ok_or_else(|| compiler.error(SyntaxErrorKind::BreakOutsideLoop))
}

fn set_loop_body(compiler: &mut Compiler, exit_index: usize) {
    let body_start = compiler.unit.code.len();
    if let Some(lp) = compiler.unit.loops.last_mut() {
        lp.exit_index = exit_index;
        lp.body_start = body_start;
    }
}

fn while_statement(compiler: &mut Compiler) -> Result<(), CompileError> {
    enter_loop(compiler);
    compiler.consume(TokenKind::LeftParen, "'(' after 'while'")?;
    expr::expression(compiler, BindPower::Lowest)?;
    compiler.consume(TokenKind::RightParen, "')' after condition")?;

    let exit = compiler.emit_jump(OpCode::JumpIfFalse);
    set_loop_body(compiler, exit);
    statement(compiler)?;
    leave_loop(compiler)
}

/// `for x (seq) body` 展开为迭代协议：
///
/// ```text
/// {
///   var seq_ = seq
///   var iter_ = null
///   while (iter_ = seq_.iterate(iter_)) {
///     var x = seq_.iteratorValue(iter_)
///     body
///   }
/// }
/// ```
fn for_statement(compiler: &mut Compiler) -> Result<(), CompileError> {
    var::enter_scope(compiler);

    let name = compiler.consume_id("loop variable name")?;
    compiler.consume(TokenKind::LeftParen, "'(' after loop variable")?;
    expr::expression(compiler, BindPower::Lowest)?;
    compiler.consume(TokenKind::RightParen, "')' after loop sequence")?;

    // 名字里带空格，脚本无法引用
    let seq = var::declare_local(compiler, "seq ")?;
    compiler.emit(OpCode::PushNull);
    let iter = var::declare_local(compiler, "iter ")?;

    enter_loop(compiler);
    var::emit_load(compiler, Variable::Local(seq));
    var::emit_load(compiler, Variable::Local(iter));
    compiler.emit_call(&Signature::method("iterate", 1), false)?;
    var::emit_store(compiler, Variable::Local(iter));
    let exit = compiler.emit_jump(OpCode::JumpIfFalse);
    set_loop_body(compiler, exit);

    var::emit_load(compiler, Variable::Local(seq));
    var::emit_load(compiler, Variable::Local(iter));
    compiler.emit_call(&Signature::method("iteratorValue", 1), false)?;

    var::enter_scope(compiler);
    var::declare_local(compiler, &name)?;
    statement(compiler)?;
    var::leave_scope(compiler);

    leave_loop(compiler)?;
    var::leave_scope(compiler);
    Ok(())
}

/// 丢弃循环内的局部变量后写 END 占位，循环结束时改为跳出
fn break_statement(compiler: &mut Compiler) -> Result<(), CompileError> {
    let Some(lp) = compiler.unit.loops.last().cloned() else {
        return Err(compiler.error(SyntaxErrorKind::BreakOutsideLoop));
    };
    var::discard_locals(compiler, lp.scope_depth);
    compiler.write_byte(OpCode::End as u8);
    compiler.write_u16(0xffff);
    Ok(())
}

fn continue_statement(compiler: &mut Compiler) -> Result<(), CompileError> {
    let Some(lp) = compiler.unit.loops.last().cloned() else {
        return Err(compiler.error(SyntaxErrorKind::ContinueOutsideLoop));
    };
    var::discard_locals(compiler, lp.scope_depth);
    compiler.emit_loop(lp.cond_start)
}

fn return_statement(compiler: &mut Compiler) -> Result<(), CompileError> {
    if matches!(compiler.cur.kind, TokenKind::RightBrace | TokenKind::Eof) {
        compiler.emit_implicit_return();
        return Ok(());
    }
    if compiler.unit.is_constructor {
        return Err(compiler.error(SyntaxErrorKind::BadConstructor(
            "constructor can't return a value".to_string(),
        )));
    }
    expr::expression(compiler, BindPower::Lowest)?;
    compiler.emit(OpCode::Return);
    Ok(())
}

/// `import name [for a, b]`
///
/// 编译为 `System.importModule(name)`，再逐个 `System.getModuleVariable(name, var)`。
fn import_statement(compiler: &mut Compiler) -> Result<(), CompileError> {
    let module_name = if compiler.match_token(TokenKind::String)? {
        match &compiler.pre.literal {
            crate::kit::lexer::Literal::Str(s) => s.clone(),
            _ => compiler.pre.lexeme.clone(),
        }
    } else {
        compiler.consume_id("module name after 'import'")?
    };

    var::load_module_var(compiler, "System")?;
    compiler.emit_constant(Value::string(module_name.clone()))?;
    compiler.emit_call(&Signature::method("importModule", 1), false)?;
    compiler.emit(OpCode::Pop);

    if !compiler.match_token(TokenKind::For)? {
        return Ok(());
    }
    loop {
        let name = compiler.consume_id("variable name after 'for'")?;
        var::load_module_var(compiler, "System")?;
        compiler.emit_constant(Value::string(module_name.clone()))?;
        compiler.emit_constant(Value::string(name.clone()))?;
        compiler.emit_call(&Signature::method("getModuleVariable", 2), false)?;

        if compiler.at_module_scope() {
            let index = var::define_module_var(compiler, &name)?;
            var::emit_store(compiler, Variable::Module(index));
            compiler.emit(OpCode::Pop);
        } else {
            var::declare_local(compiler, &name)?;
        }
        if !compiler.match_token(TokenKind::Comma)? {
            return Ok(());
        }
    }
}
