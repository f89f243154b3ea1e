//! 类定义编译
//!
//! 类体中的静态字段是类体作用域里的局部变量，方法通过 upvalue 访问它们。
//! 本类的实例字段数在类体结束后才知道，CREATE_CLASS 的操作数先占位再回填；
//! 父类的字段数到运行时创建类时才加上。

use super::expr::{self, BindPower};
use super::signature::{Signature, SignatureKind};
use super::unit::{ClassBookKeep, UnitKind};
use super::var::{self, Variable};
use super::{CompileError, Compiler, SyntaxErrorKind};
use crate::core::{OpCode, Value};
use crate::kit::lexer::TokenKind;
use tiderip_log::trace;

/// `class Name [< Super] { members }`，调用方已消费 `class`
pub fn class_definition(compiler: &mut Compiler) -> Result<(), CompileError> {
    if !compiler.at_module_scope() {
        return Err(compiler.error(SyntaxErrorKind::ClassNotAtModuleScope));
    }
    let name = compiler.consume_id("class name")?;
    let class_var = var::define_module_var(compiler, &name)?;
    compiler.emit_constant(Value::string(name.clone()))?;

    if compiler.match_token(TokenKind::Less)? {
        expr::expression(compiler, BindPower::Call)?;
    } else {
        var::load_module_var(compiler, "object")?;
    }

    let field_num_at = compiler.emit_u8(OpCode::CreateClass, 255);
    var::emit_store(compiler, Variable::Module(class_var));
    compiler.emit(OpCode::Pop);

    compiler.class_bk = Some(ClassBookKeep {
        name: name.clone(),
        class_var,
        ..Default::default()
    });

    compiler.consume(TokenKind::LeftBrace, "'{' after class name")?;
    var::enter_scope(compiler);
    loop {
        if compiler.match_token(TokenKind::RightBrace)? {
            break;
        }
        if compiler.cur.kind == TokenKind::Eof {
            return Err(compiler.unexpected("'}' at end of class body"));
        }
        class_member(compiler)?;
    }

    let field_num = compiler
        .class_bk
        .take()
        .map(|bk| bk.fields.len())
        .unwrap_or_default();
    let operand = u8::try_from(field_num)
        .map_err(|_| compiler.error(SyntaxErrorKind::TooManyFields(u8::MAX as usize)))?;
    compiler.unit.code[field_num_at] = operand;
    var::leave_scope(compiler);

    trace!(compiler.logger, "class '{}' compiled with {} own fields", name, field_num);
    Ok(())
}

fn class_member(compiler: &mut Compiler) -> Result<(), CompileError> {
    let is_static = compiler.match_token(TokenKind::Static)?;
    if compiler.match_token(TokenKind::Var)? {
        return field_definition(compiler, is_static);
    }
    method_definition(compiler, is_static)
}

fn field_definition(compiler: &mut Compiler, is_static: bool) -> Result<(), CompileError> {
    let name = compiler.consume_id("field name")?;
    if !is_static {
        if compiler.cur.kind == TokenKind::Assign {
            return Err(compiler.error(SyntaxErrorKind::InstanceFieldInitializer(name)));
        }
        expr::declare_field(compiler, &name)?;
        return Ok(());
    }

    let local = compiler
        .class_bk
        .as_ref()
        .map(|bk| bk.static_field_name(&name))
        .unwrap_or_default();
    if compiler.unit.locals.iter().any(|l| l.name == local) {
        return Err(compiler.error(SyntaxErrorKind::FieldRedefinition(name)));
    }
    if compiler.match_token(TokenKind::Assign)? {
        expr::expression(compiler, BindPower::Lowest)?;
    } else {
        compiler.emit(OpCode::PushNull);
    }
    var::declare_local(compiler, &local)?;
    Ok(())
}

fn method_definition(compiler: &mut Compiler, is_static: bool) -> Result<(), CompileError> {
    let (class_name, class_var) = match compiler.class_bk.as_mut() {
        Some(bk) => {
            bk.in_static = is_static;
            (bk.name.clone(), bk.class_var)
        }
        None => return Err(compiler.error(SyntaxErrorKind::ClassNotAtModuleScope)),
    };

    compiler.push_unit(UnitKind::Method, String::new());
    let sig = signature(compiler, is_static)?;
    let key = sig.key();
    let symbol = compiler.vm.method_names.ensure(&key);

    let duplicated = match compiler.class_bk.as_mut() {
        Some(bk) => {
            let fresh = if is_static {
                bk.static_methods.insert(symbol)
            } else if sig.kind == SignatureKind::Construct {
                // 构造器同时占用实例方法与静态方法（分配函数）
                bk.instance_methods.insert(symbol) & bk.static_methods.insert(symbol)
            } else {
                bk.instance_methods.insert(symbol)
            };
            bk.signature = Some(sig.clone());
            !fresh
        }
        None => false,
    };
    if duplicated {
        return Err(compiler.error(SyntaxErrorKind::MethodRedefinition(key)));
    }

    compiler.unit.name = format!("{}.{}", class_name, key);
    compiler.unit.is_constructor = sig.kind == SignatureKind::Construct;
    compiler.consume(TokenKind::LeftBrace, "'{' before method body")?;
    expr::function_body(compiler, false)?;
    compiler.end_unit()?;

    bind_method(compiler, class_var, symbol, is_static);
    if sig.kind == SignatureKind::Construct {
        constructor_allocator(compiler, &sig, &class_name, class_var, symbol)?;
    }

    if let Some(bk) = compiler.class_bk.as_mut() {
        bk.signature = None;
        bk.in_static = false;
    }
    Ok(())
}

/// 栈上已有闭包，再加载类并绑定
fn bind_method(compiler: &mut Compiler, class_var: usize, symbol: usize, is_static: bool) {
    var::emit_load(compiler, Variable::Module(class_var));
    let op = if is_static {
        OpCode::StaticMethod
    } else {
        OpCode::InstanceMethod
    };
    compiler.emit_u16(op, symbol);
}

/// 构造器对应的静态方法：创建实例后以同样的参数调用构造器
fn constructor_allocator(
    compiler: &mut Compiler,
    sig: &Signature,
    class_name: &str,
    class_var: usize,
    symbol: usize,
) -> Result<(), CompileError> {
    compiler.push_unit(
        UnitKind::Function,
        format!("{} metaclass.{}", class_name, sig.key()),
    );
    compiler.unit.arg_num = sig.arg_num;
    compiler.unit.adjust_stack(sig.arg_num as i32);
    compiler.emit(OpCode::Construct);
    compiler.emit_call(sig, false)?;
    compiler.emit(OpCode::Return);
    compiler.end_unit()?;
    bind_method(compiler, class_var, symbol, true);
    Ok(())
}

fn is_binary_operator(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Add
            | TokenKind::Mul
            | TokenKind::Div
            | TokenKind::Mod
            | TokenKind::Equal
            | TokenKind::NotEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::BitAnd
            | TokenKind::BitOr
            | TokenKind::BitShiftLeft
            | TokenKind::BitShiftRight
            | TokenKind::DotDot
    )
}

/// `(name)`，单个形参
fn single_param(compiler: &mut Compiler) -> Result<(), CompileError> {
    compiler.consume(TokenKind::LeftParen, "'(' before parameter")?;
    let name = compiler.consume_id("parameter name")?;
    var::declare_param(compiler, &name)?;
    compiler.consume(TokenKind::RightParen, "')' after parameter")
}

/// 解析方法签名，形参声明为当前方法单元的局部变量
fn signature(compiler: &mut Compiler, is_static: bool) -> Result<Signature, CompileError> {
    let kind = compiler.cur.kind;
    let lexeme = compiler.cur.lexeme.clone();
    match kind {
        TokenKind::Id => {
            compiler.advance()?;
            compiler.check_id_len(&lexeme)?;
            named_signature(compiler, lexeme, is_static)
        }
        TokenKind::LeftBracket => {
            compiler.advance()?;
            let mut sig = Signature::new(SignatureKind::Subscript, "", 0);
            sig.arg_num = expr::param_list(compiler)?;
            compiler.consume(TokenKind::RightBracket, "']' after subscript parameters")?;
            if compiler.match_token(TokenKind::Assign)? {
                single_param(compiler)?;
                sig.kind = SignatureKind::SubscriptSetter;
                sig.arg_num += 1;
            }
            Ok(sig)
        }
        TokenKind::Sub => {
            compiler.advance()?;
            if compiler.cur.kind == TokenKind::LeftParen {
                single_param(compiler)?;
                Ok(Signature::method(lexeme, 1))
            } else {
                Ok(Signature::getter(lexeme))
            }
        }
        TokenKind::LogicNot | TokenKind::BitNot => {
            compiler.advance()?;
            Ok(Signature::getter(lexeme))
        }
        k if is_binary_operator(k) => {
            compiler.advance()?;
            single_param(compiler)?;
            Ok(Signature::method(lexeme, 1))
        }
        _ => Err(compiler.unexpected("method definition")),
    }
}

fn named_signature(
    compiler: &mut Compiler,
    name: String,
    is_static: bool,
) -> Result<Signature, CompileError> {
    let is_constructor = name == "new" && !is_static;

    if compiler.match_token(TokenKind::Assign)? {
        if is_constructor {
            return Err(compiler.error(SyntaxErrorKind::BadConstructor(
                "constructor can't be a setter".to_string(),
            )));
        }
        single_param(compiler)?;
        return Ok(Signature::new(SignatureKind::Setter, name, 1));
    }

    if compiler.match_token(TokenKind::LeftParen)? {
        let arg_num = if compiler.match_token(TokenKind::RightParen)? {
            0
        } else {
            let n = expr::param_list(compiler)?;
            compiler.consume(TokenKind::RightParen, "')' after parameters")?;
            n
        };
        let kind = if is_constructor {
            SignatureKind::Construct
        } else {
            SignatureKind::Method
        };
        return Ok(Signature::new(kind, name, arg_num));
    }

    if is_constructor {
        return Err(compiler.error(SyntaxErrorKind::BadConstructor(
            "constructor 'new' needs a parameter list".to_string(),
        )));
    }
    Ok(Signature::getter(name))
}
