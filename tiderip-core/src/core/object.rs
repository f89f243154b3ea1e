//! 堆对象定义
//!
//! 对象的生命周期交给 `Rc` 管理；指向模块与协程的回指一律用 `Weak`。

use super::class::ObjClass;
use super::symbol::SymbolTable;
use super::thread::ObjThread;
use super::value::Value;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// FNV-1a 哈希
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for byte in bytes {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// 不可变字符串，创建时计算哈希
#[derive(Debug)]
pub struct ObjString {
    value: String,
    hash: u32,
}

impl ObjString {
    pub fn new(text: impl Into<String>) -> Self {
        let value = text.into();
        let hash = fnv1a(value.as_bytes());
        ObjString { value, hash }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn hash_code(&self) -> u32 {
        self.hash
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ObjList {
    pub elements: RefCell<Vec<Value>>,
}

impl ObjList {
    pub fn new(elements: Vec<Value>) -> Self {
        ObjList {
            elements: RefCell::new(elements),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.elements.borrow().get(index).cloned()
    }

    pub fn push(&self, value: Value) {
        self.elements.borrow_mut().push(value);
    }
}

/// 闭区间 `from..to`，可以递减
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjRange {
    pub from: f64,
    pub to: f64,
}

/// 模块：变量名符号表 + 平行的变量值数组
#[derive(Debug)]
pub struct ObjModule {
    pub name: String,
    pub(crate) var_names: RefCell<SymbolTable>,
    pub(crate) vars: RefCell<Vec<Value>>,
}

impl ObjModule {
    pub fn new(name: impl Into<String>) -> Self {
        ObjModule {
            name: name.into(),
            var_names: RefCell::new(SymbolTable::new()),
            vars: RefCell::new(Vec::new()),
        }
    }

    pub fn find_var(&self, name: &str) -> Option<usize> {
        self.var_names.borrow().find(name)
    }

    pub fn var(&self, index: usize) -> Option<Value> {
        self.vars.borrow().get(index).cloned()
    }

    /// 按名字读取变量
    pub fn var_by_name(&self, name: &str) -> Option<Value> {
        self.find_var(name).and_then(|index| self.var(index))
    }

    pub fn var_count(&self) -> usize {
        self.vars.borrow().len()
    }

    pub fn var_name(&self, index: usize) -> Option<String> {
        self.var_names.borrow().get(index).map(str::to_string)
    }

    /// 追加新变量，返回索引
    pub(crate) fn add_var(&self, name: &str, value: Value) -> usize {
        let index = self.var_names.borrow_mut().add(name);
        self.vars.borrow_mut().push(value);
        index
    }

    pub(crate) fn set_var(&self, index: usize, value: Value) {
        if let Some(slot) = self.vars.borrow_mut().get_mut(index) {
            *slot = value;
        }
    }

    /// 丢弃 `count` 之后的变量（编译失败时回滚）
    pub(crate) fn truncate_vars(&self, count: usize) {
        self.var_names.borrow_mut().truncate(count);
        self.vars.borrow_mut().truncate(count);
    }
}

/// 编译产物：指令流、常量池与元信息
///
/// 指令流编译后不再修改；常量池在方法绑定到类时会写入 super 所需的父类。
#[derive(Debug)]
pub struct ObjFn {
    pub name: String,
    pub code: Vec<u8>,
    /// 与 code 逐字节对应的行号
    pub lines: Vec<u32>,
    pub constants: RefCell<Vec<Value>>,
    pub arg_num: usize,
    pub upvalue_num: usize,
    pub max_stack_slots: usize,
    pub module: Weak<ObjModule>,
}

impl ObjFn {
    /// 指令偏移对应的行号
    pub fn line_at(&self, ip: usize) -> u32 {
        self.lines
            .get(ip)
            .or_else(|| self.lines.last())
            .copied()
            .unwrap_or(0)
    }

    pub fn module_name(&self) -> String {
        self.module
            .upgrade()
            .map(|m| m.name.clone())
            .unwrap_or_default()
    }

    pub fn constant(&self, index: usize) -> Option<Value> {
        self.constants.borrow().get(index).cloned()
    }
}

#[derive(Debug)]
pub struct ObjClosure {
    pub func: Rc<ObjFn>,
    pub upvalues: Vec<Rc<ObjUpvalue>>,
}

impl ObjClosure {
    pub fn new(func: Rc<ObjFn>, upvalues: Vec<Rc<ObjUpvalue>>) -> Self {
        ObjClosure { func, upvalues }
    }
}

/// upvalue 状态：打开时指向某个协程栈槽，关闭后持有自己的值
#[derive(Debug)]
pub enum UpvalueState {
    Open { thread: Weak<ObjThread>, slot: usize },
    Closed(Value),
}

#[derive(Debug)]
pub struct ObjUpvalue {
    pub state: RefCell<UpvalueState>,
}

impl ObjUpvalue {
    pub fn open(thread: &Rc<ObjThread>, slot: usize) -> Self {
        ObjUpvalue {
            state: RefCell::new(UpvalueState::Open {
                thread: Rc::downgrade(thread),
                slot,
            }),
        }
    }

    /// 打开状态下的栈槽
    pub fn open_slot(&self) -> Option<usize> {
        match &*self.state.borrow() {
            UpvalueState::Open { slot, .. } => Some(*slot),
            UpvalueState::Closed(_) => None,
        }
    }

    pub fn close(&self, value: Value) {
        *self.state.borrow_mut() = UpvalueState::Closed(value);
    }
}

#[derive(Debug)]
pub struct ObjInstance {
    pub class: Rc<ObjClass>,
    pub fields: RefCell<Vec<Value>>,
}

impl ObjInstance {
    pub fn new(class: Rc<ObjClass>) -> Self {
        let fields = vec![Value::Null; class.field_num];
        ObjInstance {
            class,
            fields: RefCell::new(fields),
        }
    }

    pub fn field(&self, index: usize) -> Option<Value> {
        self.fields.borrow().get(index).cloned()
    }

    /// 下标越界时返回 false
    pub fn set_field(&self, index: usize, value: Value) -> bool {
        let mut fields = self.fields.borrow_mut();
        match fields.get_mut(index) {
            Some(field) => {
                *field = value;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a() {
        assert_eq!(fnv1a(b""), 2166136261);
        assert_eq!(fnv1a(b"a"), 0xe40c292c);
        assert_eq!(ObjString::new("a").hash_code(), 0xe40c292c);
    }

    #[test]
    fn test_instance_fields() {
        let class = ObjClass::new("P", None, 2);
        let instance = ObjInstance::new(class);
        assert!(instance.set_field(1, Value::Num(4.0)));
        assert!(!instance.set_field(2, Value::Num(5.0)));
        assert_eq!(instance.field(0), Some(Value::Null));
        assert_eq!(instance.field(1), Some(Value::Num(4.0)));
        assert_eq!(instance.field(2), None);
    }

    #[test]
    fn test_module_vars_truncate() {
        let module = ObjModule::new("main");
        module.add_var("a", Value::Num(1.0));
        module.add_var("b", Value::Num(2.0));
        module.truncate_vars(1);
        assert_eq!(module.var_count(), 1);
        assert_eq!(module.find_var("b"), None);
        assert_eq!(module.var_by_name("a"), Some(Value::Num(1.0)));
    }

    #[test]
    fn test_fn_line_at() {
        let func = ObjFn {
            name: "f".to_string(),
            code: vec![0, 0, 0],
            lines: vec![1, 1, 2],
            constants: RefCell::new(Vec::new()),
            arg_num: 0,
            upvalue_num: 0,
            max_stack_slots: 1,
            module: Weak::new(),
        };
        assert_eq!(func.line_at(2), 2);
        assert_eq!(func.line_at(99), 2);
        assert_eq!(func.module_name(), "");
    }
}
