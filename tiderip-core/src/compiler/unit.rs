//! 编译单元与编译期簿记结构

use super::signature::Signature;
use crate::core::{SymbolTable, Value};
use std::collections::HashSet;

/// 局部变量
#[derive(Debug, Clone)]
pub struct LocalVar {
    pub name: String,
    /// 声明时的作用域深度，槽 0 为 -1
    pub depth: i32,
    /// 被内层函数捕获，离开作用域时要关闭而不是弹出
    pub is_upvalue: bool,
}

/// upvalue 描述，运行时创建闭包时按它捕获
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
    /// true: 捕获直接外层的局部变量；false: 继承外层的 upvalue
    pub is_enclosing_local: bool,
    pub index: usize,
}

/// 正在编译的循环
#[derive(Debug, Clone)]
pub struct Loop {
    /// 条件表达式起点，continue 与 LOOP 跳回这里
    pub cond_start: usize,
    pub body_start: usize,
    /// break 时丢弃比它更深的局部变量
    pub scope_depth: i32,
    /// 退出跳转的操作数位置
    pub exit_index: usize,
}

/// 单元种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitKind {
    #[default]
    Module,
    Function,
    Method,
}

/// 一个模块、函数或方法的编译状态
#[derive(Debug, Default)]
pub struct CompileUnit {
    pub kind: UnitKind,
    pub name: String,
    pub code: Vec<u8>,
    pub lines: Vec<u32>,
    pub constants: Vec<Value>,
    pub arg_num: usize,
    pub locals: Vec<LocalVar>,
    pub upvalues: Vec<UpvalueDesc>,
    /// -1 表示模块作用域
    pub scope_depth: i32,
    pub stack_slot_num: i32,
    pub max_stack_slots: usize,
    pub loops: Vec<Loop>,
    pub is_constructor: bool,
}

impl CompileUnit {
    /// 槽 0 的名字：方法里是 this，其余为空串（不可引用）
    pub fn new(kind: UnitKind, name: impl Into<String>) -> Self {
        let slot0 = if kind == UnitKind::Method { "this" } else { "" };
        CompileUnit {
            kind,
            name: name.into(),
            locals: vec![LocalVar {
                name: slot0.to_string(),
                depth: -1,
                is_upvalue: false,
            }],
            scope_depth: if kind == UnitKind::Module { -1 } else { 0 },
            stack_slot_num: 1,
            max_stack_slots: 1,
            ..Default::default()
        }
    }

    pub fn adjust_stack(&mut self, effect: i32) {
        self.stack_slot_num += effect;
        if self.stack_slot_num > self.max_stack_slots as i32 {
            self.max_stack_slots = self.stack_slot_num as usize;
        }
    }
}

/// 正在编译的类
#[derive(Debug, Default)]
pub struct ClassBookKeep {
    pub name: String,
    /// 本类声明的实例字段（不含继承），下标从 0 开始，绑定方法时再加上父类的字段数
    pub fields: SymbolTable,
    /// 模块变量中类的下标
    pub class_var: usize,
    pub in_static: bool,
    pub instance_methods: HashSet<usize>,
    pub static_methods: HashSet<usize>,
    /// 当前方法的签名，无参 super 调用要用
    pub signature: Option<Signature>,
}

impl ClassBookKeep {
    /// 静态字段作为类体作用域里的局部变量存放
    pub fn static_field_name(&self, field: &str) -> String {
        format!("Cls{} {}", self.name, field)
    }
}
