//! 类与方法表
//!
//! 方法表按全局方法名符号索引；子类在创建时复制父类的方法表。
//! 元类（meta）为 None 的类只有根类 `class` 自己。

use super::object::ObjClosure;
use super::thread::ObjThread;
use super::value::Value;
use super::vm::Vm;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// 原生方法：`args[0]` 是接收者，也是返回值槽
pub type Primitive = fn(&mut Vm, &mut [Value]) -> PrimResult;

/// 原生方法的三种结果
#[derive(Debug)]
pub enum PrimResult {
    /// 成功，结果在 `args[0]`
    Continue,
    /// 切换到另一个协程；None 表示挂起整个虚拟机
    Switch(Option<Rc<ObjThread>>),
    /// 运行时错误，值写入当前协程的错误槽
    Error(Value),
}

#[derive(Clone, Default)]
pub enum Method {
    #[default]
    None,
    Primitive(Primitive),
    Script(Rc<ObjClosure>),
    /// `Fn.call(...)`：直接调用接收者闭包
    FnCall,
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::None => f.write_str("None"),
            Method::Primitive(_) => f.write_str("Primitive"),
            Method::Script(closure) => write!(f, "Script({})", closure.func.name),
            Method::FnCall => f.write_str("FnCall"),
        }
    }
}

pub struct ObjClass {
    pub name: String,
    pub superclass: Option<Rc<ObjClass>>,
    /// 实例字段总数（含继承）
    pub field_num: usize,
    methods: RefCell<Vec<Method>>,
    meta: RefCell<Option<Rc<ObjClass>>>,
}

impl ObjClass {
    /// 创建类并继承父类的方法表
    pub fn new(name: impl Into<String>, superclass: Option<Rc<ObjClass>>, field_num: usize) -> Rc<Self> {
        let methods = superclass
            .as_ref()
            .map(|s| s.methods.borrow().clone())
            .unwrap_or_default();
        Rc::new(ObjClass {
            name: name.into(),
            superclass,
            field_num,
            methods: RefCell::new(methods),
            meta: RefCell::new(None),
        })
    }

    pub fn method(&self, symbol: usize) -> Method {
        self.methods
            .borrow()
            .get(symbol)
            .cloned()
            .unwrap_or(Method::None)
    }

    pub fn set_method(&self, symbol: usize, method: Method) {
        let mut methods = self.methods.borrow_mut();
        if symbol >= methods.len() {
            methods.resize(symbol + 1, Method::None);
        }
        methods[symbol] = method;
    }

    /// 复制另一个类的整张方法表（只用于引导阶段）
    pub(crate) fn copy_methods_from(&self, other: &ObjClass) {
        let copied = other.methods.borrow().clone();
        *self.methods.borrow_mut() = copied;
    }

    pub fn meta(&self) -> Option<Rc<ObjClass>> {
        self.meta.borrow().clone()
    }

    pub fn set_meta(&self, meta: Rc<ObjClass>) {
        *self.meta.borrow_mut() = Some(meta);
    }

    /// 沿父类链判断是否为 `other` 或其子类
    pub fn is_subclass_of(&self, other: &ObjClass) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let mut current = self.superclass.clone();
        while let Some(class) = current {
            if std::ptr::eq(class.as_ref(), other) {
                return true;
            }
            current = class.superclass.clone();
        }
        false
    }
}

impl fmt::Debug for ObjClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjClass")
            .field("name", &self.name)
            .field(
                "superclass",
                &self.superclass.as_ref().map(|s| s.name.clone()),
            )
            .field("field_num", &self.field_num)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
        args[0] = Value::Num(42.0);
        PrimResult::Continue
    }

    #[test]
    fn test_subclass_copies_methods() {
        let base = ObjClass::new("Base", None, 0);
        base.set_method(3, Method::Primitive(answer));
        let derived = ObjClass::new("Derived", Some(base.clone()), 2);

        assert!(matches!(derived.method(3), Method::Primitive(_)));
        assert!(matches!(derived.method(0), Method::None));
        assert!(derived.is_subclass_of(&base));
        assert!(!base.is_subclass_of(&derived));

        // 之后加到父类的方法不会被继承
        base.set_method(5, Method::FnCall);
        assert!(matches!(derived.method(5), Method::None));
    }

    #[test]
    fn test_meta() {
        let class = ObjClass::new("Point", None, 0);
        assert!(class.meta().is_none());
        let meta = ObjClass::new("Point metaclass", None, 0);
        class.set_meta(meta.clone());
        assert!(Rc::ptr_eq(&class.meta().unwrap(), &meta));
    }
}
