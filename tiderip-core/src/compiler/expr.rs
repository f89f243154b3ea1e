//! 表达式编译（TDOP）
//!
//! 每种 token 有左绑定力（`left_bp`），前缀处理（`nud`）与中缀处理（`led`）。
//! 所有运算符都编译成方法调用，例如 `a + b` 即 `a.+(b)`。

use super::signature::{Signature, SignatureKind};
use super::unit::UnitKind;
use super::var::{self, Variable};
use super::{stmt, CompileError, Compiler, SyntaxErrorKind};
use crate::core::{OpCode, Value};
use crate::kit::lexer::{Literal, TokenKind};

/// 绑定力，从低到高
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BindPower {
    None,
    Lowest,
    Assign,
    Condition,
    LogicOr,
    LogicAnd,
    Equal,
    Is,
    Cmp,
    BitOr,
    BitAnd,
    BitShift,
    Range,
    Term,
    Factor,
    Unary,
    Call,
    Highest,
}

/// 作为中缀运算符时的左绑定力
pub fn left_bp(kind: TokenKind) -> BindPower {
    match kind {
        TokenKind::Question => BindPower::Condition,
        TokenKind::LogicOr => BindPower::LogicOr,
        TokenKind::LogicAnd => BindPower::LogicAnd,
        TokenKind::Equal | TokenKind::NotEqual => BindPower::Equal,
        TokenKind::Is => BindPower::Is,
        TokenKind::Less | TokenKind::LessEqual | TokenKind::Greater | TokenKind::GreaterEqual => {
            BindPower::Cmp
        }
        TokenKind::BitOr => BindPower::BitOr,
        TokenKind::BitAnd => BindPower::BitAnd,
        TokenKind::BitShiftLeft | TokenKind::BitShiftRight => BindPower::BitShift,
        TokenKind::DotDot => BindPower::Range,
        TokenKind::Add | TokenKind::Sub => BindPower::Term,
        TokenKind::Mul | TokenKind::Div | TokenKind::Mod => BindPower::Factor,
        TokenKind::Dot | TokenKind::LeftBracket => BindPower::Call,
        _ => BindPower::None,
    }
}

/// 语句首 token 不是这些时按表达式处理
pub fn starts_expression(kind: TokenKind) -> bool {
    !matches!(
        kind,
        TokenKind::Var
            | TokenKind::Fun
            | TokenKind::If
            | TokenKind::While
            | TokenKind::For
            | TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Return
            | TokenKind::Class
            | TokenKind::Import
            | TokenKind::Static
            | TokenKind::LeftBrace
            | TokenKind::RightBrace
            | TokenKind::Eof
    )
}

/// 以 `rbp` 为右绑定力编译一个表达式
///
/// 只有 `rbp` 低于赋值时才允许赋值，因此 `a + b = c` 会报错。
pub fn expression(compiler: &mut Compiler, rbp: BindPower) -> Result<(), CompileError> {
    let can_assign = rbp < BindPower::Assign;
    compiler.advance()?;
    nud(compiler, can_assign)?;
    while rbp < left_bp(compiler.cur.kind) {
        compiler.advance()?;
        led(compiler, can_assign)?;
    }
    if can_assign && compiler.cur.kind == TokenKind::Assign {
        return Err(compiler.error(SyntaxErrorKind::InvalidAssignmentTarget));
    }
    Ok(())
}

fn nud(compiler: &mut Compiler, can_assign: bool) -> Result<(), CompileError> {
    match compiler.pre.kind {
        TokenKind::Num | TokenKind::String => literal(compiler),
        TokenKind::Interpolation => string_interpolation(compiler),
        TokenKind::True => {
            compiler.emit(OpCode::PushTrue);
            Ok(())
        }
        TokenKind::False => {
            compiler.emit(OpCode::PushFalse);
            Ok(())
        }
        TokenKind::Null => {
            compiler.emit(OpCode::PushNull);
            Ok(())
        }
        TokenKind::Id => identifier(compiler, can_assign),
        TokenKind::This => var::load_this(compiler),
        TokenKind::Super => super_call(compiler, can_assign),
        TokenKind::LeftParen => {
            expression(compiler, BindPower::Lowest)?;
            compiler.consume(TokenKind::RightParen, "')' after expression")
        }
        TokenKind::LeftBracket => list_literal(compiler),
        TokenKind::LeftBrace => map_literal(compiler),
        TokenKind::Sub | TokenKind::LogicNot | TokenKind::BitNot => unary_operator(compiler),
        _ => Err(compiler.error(SyntaxErrorKind::ExpectedExpression(
            compiler.pre.lexeme.clone(),
        ))),
    }
}

fn led(compiler: &mut Compiler, can_assign: bool) -> Result<(), CompileError> {
    match compiler.pre.kind {
        TokenKind::Dot => {
            let name = compiler.consume_id("method name after '.'")?;
            method_call(compiler, name, can_assign, false)
        }
        TokenKind::LeftBracket => subscript(compiler, can_assign),
        TokenKind::Question => condition(compiler),
        TokenKind::LogicAnd => logic(compiler, OpCode::And, BindPower::LogicAnd),
        TokenKind::LogicOr => logic(compiler, OpCode::Or, BindPower::LogicOr),
        _ => infix_operator(compiler),
    }
}

fn literal(compiler: &mut Compiler) -> Result<(), CompileError> {
    let value = match &compiler.pre.literal {
        Literal::Num(n) => Value::Num(*n),
        Literal::Str(s) => Value::string(s.clone()),
        Literal::None => Value::Null,
    };
    compiler.emit_constant(value)
}

fn literal_text(compiler: &Compiler) -> String {
    match &compiler.pre.literal {
        Literal::Str(s) => s.clone(),
        _ => String::new(),
    }
}

/// `"a %(b) c"` 编译为 `List.new().addCore_("a ").addCore_(b).addCore_(" c").join()`
fn string_interpolation(compiler: &mut Compiler) -> Result<(), CompileError> {
    let add = Signature::method("addCore_", 1);
    var::load_module_var(compiler, "List")?;
    compiler.emit_call(&Signature::method("new", 0), false)?;

    loop {
        let text = literal_text(compiler);
        if !text.is_empty() {
            compiler.emit_constant(Value::string(text))?;
            compiler.emit_call(&add, false)?;
        }
        expression(compiler, BindPower::Lowest)?;
        compiler.emit_call(&add, false)?;

        if compiler.match_token(TokenKind::Interpolation)? {
            continue;
        }
        compiler.consume(TokenKind::String, "end of interpolated string")?;
        let tail = literal_text(compiler);
        if !tail.is_empty() {
            compiler.emit_constant(Value::string(tail))?;
            compiler.emit_call(&add, false)?;
        }
        break;
    }
    compiler.emit_call(&Signature::method("join", 0), false)
}

fn list_literal(compiler: &mut Compiler) -> Result<(), CompileError> {
    let add = Signature::method("addCore_", 1);
    var::load_module_var(compiler, "List")?;
    compiler.emit_call(&Signature::method("new", 0), false)?;
    loop {
        if compiler.cur.kind == TokenKind::RightBracket {
            break;
        }
        expression(compiler, BindPower::Lowest)?;
        compiler.emit_call(&add, false)?;
        if !compiler.match_token(TokenKind::Comma)? {
            break;
        }
    }
    compiler.consume(TokenKind::RightBracket, "']' after list elements")
}

fn map_literal(compiler: &mut Compiler) -> Result<(), CompileError> {
    let add = Signature::method("addCore_", 2);
    var::load_module_var(compiler, "Map")?;
    compiler.emit_call(&Signature::method("new", 0), false)?;
    loop {
        if compiler.cur.kind == TokenKind::RightBrace {
            break;
        }
        expression(compiler, BindPower::Unary)?;
        compiler.consume(TokenKind::Colon, "':' after map key")?;
        expression(compiler, BindPower::Lowest)?;
        compiler.emit_call(&add, false)?;
        if !compiler.match_token(TokenKind::Comma)? {
            break;
        }
    }
    compiler.consume(TokenKind::RightBrace, "'}' after map entries")
}

/// `-x`、`!x`、`~x` 编译为无参 getter 调用
fn unary_operator(compiler: &mut Compiler) -> Result<(), CompileError> {
    let name = compiler.pre.lexeme.clone();
    expression(compiler, BindPower::Unary)?;
    compiler.emit_call(&Signature::getter(name), false)
}

/// 二元运算符是单参数方法，左结合
fn infix_operator(compiler: &mut Compiler) -> Result<(), CompileError> {
    let kind = compiler.pre.kind;
    let name = compiler.pre.lexeme.clone();
    let bp = left_bp(kind);
    if bp == BindPower::None {
        return Err(compiler.error(SyntaxErrorKind::ExpectedExpression(name)));
    }
    expression(compiler, bp)?;
    compiler.emit_call(&Signature::method(name, 1), false)
}

/// `&&` / `||`：左值决定是否短路，AND/OR 在不短路时弹出左值
fn logic(compiler: &mut Compiler, op: OpCode, bp: BindPower) -> Result<(), CompileError> {
    let jump = compiler.emit_jump(op);
    expression(compiler, bp)?;
    compiler.patch_jump(jump)
}

/// `cond ? a : b`
fn condition(compiler: &mut Compiler) -> Result<(), CompileError> {
    let false_jump = compiler.emit_jump(OpCode::JumpIfFalse);
    expression(compiler, BindPower::Lowest)?;
    compiler.consume(TokenKind::Colon, "':' after true branch")?;
    let end_jump = compiler.emit_jump(OpCode::Jump);
    compiler.patch_jump(false_jump)?;
    expression(compiler, BindPower::Lowest)?;
    compiler.patch_jump(end_jump)?;
    // 两个分支运行时只会压入一个值
    compiler.unit.adjust_stack(-1);
    Ok(())
}

/// 实参列表，调用方已消费左括号
fn arg_list(compiler: &mut Compiler, sig: &mut Signature) -> Result<(), CompileError> {
    loop {
        if sig.arg_num >= compiler.limits.max_arg_num {
            return Err(compiler.error(SyntaxErrorKind::TooManyArgs(
                compiler.limits.max_arg_num,
            )));
        }
        expression(compiler, BindPower::Lowest)?;
        sig.arg_num += 1;
        if !compiler.match_token(TokenKind::Comma)? {
            return Ok(());
        }
    }
}

/// 形参列表，声明为当前单元的局部变量
pub fn param_list(compiler: &mut Compiler) -> Result<usize, CompileError> {
    let mut count = 0;
    loop {
        if count >= compiler.limits.max_arg_num {
            return Err(compiler.error(SyntaxErrorKind::TooManyArgs(
                compiler.limits.max_arg_num,
            )));
        }
        let name = compiler.consume_id("parameter name")?;
        var::declare_param(compiler, &name)?;
        count += 1;
        if !compiler.match_token(TokenKind::Comma)? {
            return Ok(count);
        }
    }
}

/// 接收者已在栈上：编译 getter / setter / 方法调用及可选的块参数
pub fn method_call(
    compiler: &mut Compiler,
    name: String,
    can_assign: bool,
    is_super: bool,
) -> Result<(), CompileError> {
    let mut sig = Signature::getter(name);

    if can_assign && compiler.match_token(TokenKind::Assign)? {
        sig.kind = SignatureKind::Setter;
        sig.arg_num = 1;
        expression(compiler, BindPower::Lowest)?;
        return compiler.emit_call(&sig, is_super);
    }

    if compiler.match_token(TokenKind::LeftParen)? {
        sig.kind = SignatureKind::Method;
        if !compiler.match_token(TokenKind::RightParen)? {
            arg_list(compiler, &mut sig)?;
            compiler.consume(TokenKind::RightParen, "')' after arguments")?;
        }
    }

    if compiler.match_token(TokenKind::LeftBrace)? {
        sig.kind = SignatureKind::Method;
        if sig.arg_num >= compiler.limits.max_arg_num {
            return Err(compiler.error(SyntaxErrorKind::TooManyArgs(
                compiler.limits.max_arg_num,
            )));
        }
        let name = format!("{} block argument", compiler.unit.name);
        block_argument(compiler, name)?;
        sig.arg_num += 1;
    }

    compiler.emit_call(&sig, is_super)
}

/// `{ |a, b| ... }`，调用方已消费左花括号
fn block_argument(compiler: &mut Compiler, name: String) -> Result<(), CompileError> {
    compiler.push_unit(UnitKind::Function, name);
    if compiler.match_token(TokenKind::BitOr)? {
        param_list(compiler)?;
        compiler.consume(TokenKind::BitOr, "'|' after block parameters")?;
    } else {
        // `||` 表示显式的空参数列表
        compiler.match_token(TokenKind::LogicOr)?;
    }
    function_body(compiler, true)?;
    compiler.end_unit().map(|_| ())
}

/// 函数体，调用方已消费左花括号
///
/// 块参数的函数体只有一个表达式时返回该表达式的值。
pub fn function_body(compiler: &mut Compiler, is_block: bool) -> Result<(), CompileError> {
    if is_block && starts_expression(compiler.cur.kind) {
        expression(compiler, BindPower::Lowest)?;
        if compiler.match_token(TokenKind::RightBrace)? {
            compiler.emit(OpCode::Return);
            compiler.emit_implicit_return();
            return Ok(());
        }
        compiler.emit(OpCode::Pop);
    }
    stmt::block(compiler)?;
    compiler.emit_implicit_return();
    Ok(())
}

/// 下标访问与下标赋值
fn subscript(compiler: &mut Compiler, can_assign: bool) -> Result<(), CompileError> {
    let mut sig = Signature::new(SignatureKind::Subscript, "", 0);
    arg_list(compiler, &mut sig)?;
    compiler.consume(TokenKind::RightBracket, "']' after subscript")?;
    if can_assign && compiler.match_token(TokenKind::Assign)? {
        sig.kind = SignatureKind::SubscriptSetter;
        expression(compiler, BindPower::Lowest)?;
        sig.arg_num += 1;
    }
    compiler.emit_call(&sig, false)
}

/// 加载模块变量中的函数后编译 `(args)`，即 `f.call(args)`
fn fn_call(compiler: &mut Compiler, index: usize) -> Result<(), CompileError> {
    var::emit_load(compiler, Variable::Module(index));
    compiler.consume(TokenKind::LeftParen, "'(' after function name")?;
    let mut sig = Signature::method("call", 0);
    if !compiler.match_token(TokenKind::RightParen)? {
        arg_list(compiler, &mut sig)?;
        compiler.consume(TokenKind::RightParen, "')' after arguments")?;
    }
    compiler.emit_call(&sig, false)
}

/// 标识符解析顺序：
/// 模块函数调用 -> 局部变量与 upvalue -> 实例字段 -> 静态字段 -> 隐式 this 方法调用 -> 模块变量
fn identifier(compiler: &mut Compiler, can_assign: bool) -> Result<(), CompileError> {
    let name = compiler.pre.lexeme.clone();
    let fn_var = format!("Fn {}", name);
    let call_follows = compiler.cur.kind == TokenKind::LeftParen;

    if compiler.enclosing.is_empty() && call_follows {
        return match compiler.module.find_var(&fn_var) {
            Some(index) => fn_call(compiler, index),
            None => Err(compiler.error(SyntaxErrorKind::UndefinedFunction(name))),
        };
    }

    if let Some(var) = var::resolve_local_or_upvalue(compiler, &name)? {
        return var::emit_load_or_store(compiler, var, can_assign);
    }

    if call_follows {
        if let Some(index) = compiler.module.find_var(&fn_var) {
            return fn_call(compiler, index);
        }
        if !compiler.in_method() {
            // 可能是后面才定义的函数
            let index = var::forward_declare(compiler, &fn_var)?;
            return fn_call(compiler, index);
        }
    }

    if compiler.class_bk.is_some() {
        if compiler.in_method() {
            return class_member(compiler, name, can_assign);
        }
        // 类体中（静态字段的初始化表达式）
        let static_name = static_field_name(compiler, &name);
        if let Some(var) = var::resolve_local_or_upvalue(compiler, &static_name)? {
            return var::emit_load_or_store(compiler, var, can_assign);
        }
    }

    let index = var::reference_module_var(compiler, &name)?;
    var::emit_load_or_store(compiler, Variable::Module(index), can_assign)
}

fn static_field_name(compiler: &Compiler, name: &str) -> String {
    compiler
        .class_bk
        .as_ref()
        .map(|bk| bk.static_field_name(name))
        .unwrap_or_default()
}

/// 方法内的标识符：字段、静态字段、隐式 this 调用，最后退回模块变量
fn class_member(compiler: &mut Compiler, name: String, can_assign: bool) -> Result<(), CompileError> {
    let (field, in_static) = match &compiler.class_bk {
        Some(bk) => (
            bk.fields.find(&name),
            bk.in_static,
        ),
        None => (None, false),
    };
    if let Some(index) = field {
        return field_access(compiler, &name, index, can_assign);
    }

    let static_name = static_field_name(compiler, &name);
    if let Some(var) = var::resolve_local_or_upvalue(compiler, &static_name)? {
        return var::emit_load_or_store(compiler, var, can_assign);
    }

    if name.starts_with('_') {
        if in_static {
            return Err(compiler.error(SyntaxErrorKind::FieldInStaticMethod(name)));
        }
        let index = declare_field(compiler, &name)?;
        return field_access(compiler, &name, index, can_assign);
    }

    if name.starts_with(|c: char| c.is_ascii_lowercase()) {
        var::load_this(compiler)?;
        return method_call(compiler, name, can_assign, false);
    }

    let index = var::reference_module_var(compiler, &name)?;
    var::emit_load_or_store(compiler, Variable::Module(index), can_assign)
}

/// 在当前类中声明实例字段，返回它在本类字段中的下标
pub fn declare_field(compiler: &mut Compiler, name: &str) -> Result<usize, CompileError> {
    compiler.check_id_len(name)?;
    let max = compiler.limits.max_field_num;
    let Some(bk) = compiler.class_bk.as_mut() else {
        return Err(compiler.error(SyntaxErrorKind::ThisOutsideMethod));
    };
    if bk.fields.find(name).is_some() {
        return Err(compiler.error(SyntaxErrorKind::FieldRedefinition(name.to_string())));
    }
    if bk.fields.len() >= max {
        return Err(compiler.error(SyntaxErrorKind::TooManyFields(max)));
    }
    Ok(bk.fields.add(name))
}

/// 方法体内直接用 *_THIS_FIELD，嵌套函数里先加载 this 再用 *_FIELD
fn field_access(
    compiler: &mut Compiler,
    name: &str,
    index: usize,
    can_assign: bool,
) -> Result<(), CompileError> {
    if compiler.class_bk.as_ref().is_some_and(|bk| bk.in_static) {
        return Err(compiler.error(SyntaxErrorKind::FieldInStaticMethod(name.to_string())));
    }
    let direct = compiler.unit.kind == UnitKind::Method;

    if can_assign && compiler.match_token(TokenKind::Assign)? {
        expression(compiler, BindPower::Lowest)?;
        if direct {
            compiler.emit_u8(OpCode::StoreThisField, index);
        } else {
            var::load_this(compiler)?;
            compiler.emit_u8(OpCode::StoreField, index);
        }
    } else if direct {
        compiler.emit_u8(OpCode::LoadThisField, index);
    } else {
        var::load_this(compiler)?;
        compiler.emit_u8(OpCode::LoadField, index);
    }
    Ok(())
}

/// `super.name(...)` 或 `super(...)`（沿用当前方法名）
fn super_call(compiler: &mut Compiler, can_assign: bool) -> Result<(), CompileError> {
    let enclosing_sig = if compiler.in_method() {
        compiler.class_bk.as_ref().and_then(|bk| bk.signature.clone())
    } else {
        None
    };
    let Some(enclosing_sig) = enclosing_sig else {
        return Err(compiler.error(SyntaxErrorKind::SuperOutsideMethod));
    };

    var::load_this(compiler)?;
    if compiler.match_token(TokenKind::Dot)? {
        let name = compiler.consume_id("method name after 'super.'")?;
        method_call(compiler, name, can_assign, true)
    } else {
        method_call(compiler, enclosing_sig.name, can_assign, true)
    }
}
