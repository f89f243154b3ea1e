//! 字节码反汇编
//!
//! 文本形式用于调试日志，`FunctionDump` 用于 `--dump-bytecode` 的 JSON 输出。

use crate::core::opcode::{read_u16, OpCode};
use crate::core::{ObjFn, Value};
use serde::Serialize;
use std::fmt::Write;

/// 一条指令
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructionDump {
    pub offset: usize,
    pub line: u32,
    pub op: String,
    pub operands: Vec<u16>,
    /// 操作数引用的常量或符号，便于阅读
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// 函数及其嵌套函数
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDump {
    pub name: String,
    pub module: String,
    pub arg_num: usize,
    pub upvalue_num: usize,
    pub max_stack_slots: usize,
    pub constants: Vec<String>,
    pub code: Vec<InstructionDump>,
    pub functions: Vec<FunctionDump>,
}

impl FunctionDump {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// 把函数拆成指令列表，`method_name` 把方法符号翻译成签名
pub fn dump_function(func: &ObjFn, method_name: &dyn Fn(usize) -> String) -> FunctionDump {
    let constants = func.constants.borrow().clone();
    let mut code = Vec::new();
    let mut offset = 0;

    while offset < func.code.len() {
        let Some(op) = OpCode::from_u8(func.code[offset]) else {
            code.push(InstructionDump {
                offset,
                line: func.line_at(offset),
                op: format!("BAD({})", func.code[offset]),
                operands: Vec::new(),
                note: None,
            });
            offset += 1;
            continue;
        };
        let width = op.operand_bytes(&func.code, offset + 1, &constants);
        let operands = decode_operands(op, &func.code[offset + 1..], width);
        let note = describe(op, &operands, offset + 1 + width, &constants, method_name);
        code.push(InstructionDump {
            offset,
            line: func.line_at(offset),
            op: op.name(),
            operands,
            note,
        });
        offset += 1 + width;
    }

    let functions = constants
        .iter()
        .filter_map(Value::as_fn)
        .map(|f| dump_function(f, method_name))
        .collect();

    FunctionDump {
        name: func.name.clone(),
        module: func.module_name(),
        arg_num: func.arg_num,
        upvalue_num: func.upvalue_num,
        max_stack_slots: func.max_stack_slots,
        constants: constants.iter().map(constant_text).collect(),
        code,
        functions,
    }
}

fn decode_operands(op: OpCode, bytes: &[u8], width: usize) -> Vec<u16> {
    let bytes = &bytes[..width.min(bytes.len())];
    match op {
        OpCode::CreateClosure => {
            // 函数常量，之后每个 upvalue 两个单字节：是否外层局部变量、索引
            let mut operands = vec![read_u16(bytes, 0)];
            operands.extend(bytes.iter().skip(2).map(|b| *b as u16));
            operands
        }
        _ if width == 1 => vec![bytes.first().copied().unwrap_or(0) as u16],
        _ => bytes.chunks(2).map(|pair| read_u16(pair, 0)).collect(),
    }
}

fn describe(
    op: OpCode,
    operands: &[u16],
    next_ip: usize,
    constants: &[Value],
    method_name: &dyn Fn(usize) -> String,
) -> Option<String> {
    let first = *operands.first()? as usize;
    if op.call_arg_num().is_some() {
        return Some(method_name(first));
    }
    match op {
        OpCode::LoadConstant | OpCode::CreateClosure => constants.get(first).map(constant_text),
        OpCode::Jump | OpCode::JumpIfFalse | OpCode::And | OpCode::Or => {
            Some(format!("-> {}", next_ip + first))
        }
        OpCode::Loop => Some(format!("-> {}", next_ip.saturating_sub(first))),
        OpCode::InstanceMethod | OpCode::StaticMethod => Some(method_name(first)),
        _ => None,
    }
}

fn constant_text(value: &Value) -> String {
    match value {
        Value::Obj(_) if value.as_str().is_some() => format!("{:?}", value.to_string()),
        _ => value.to_string(),
    }
}

/// 文本反汇编，嵌套函数依次跟在后面
pub fn disassemble(func: &ObjFn, method_name: &dyn Fn(usize) -> String) -> String {
    let mut out = String::new();
    write_dump(&mut out, &dump_function(func, method_name));
    out
}

fn write_dump(out: &mut String, dump: &FunctionDump) {
    let _ = writeln!(out, "== {} ({}) ==", dump.name, dump.module);
    let mut last_line = None;
    for ins in &dump.code {
        let line = if last_line == Some(ins.line) {
            "   |".to_string()
        } else {
            format!("{:4}", ins.line)
        };
        last_line = Some(ins.line);
        let operands = ins
            .operands
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let _ = write!(out, "{:04} {} {:<18} {}", ins.offset, line, ins.op, operands);
        if let Some(note) = &ins.note {
            let _ = write!(out, " ; {}", note);
        }
        out.push('\n');
    }
    for nested in &dump.functions {
        out.push('\n');
        write_dump(out, nested);
    }
}
