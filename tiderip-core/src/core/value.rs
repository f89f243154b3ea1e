//! 值类型
//!
//! 数字与 null/true/false 不装箱，其余都是指向堆对象的 `Rc`。

use super::class::ObjClass;
use super::map::ObjMap;
use super::object::{
    ObjClosure, ObjFn, ObjInstance, ObjList, ObjModule, ObjRange, ObjString,
};
use super::thread::ObjThread;
use std::fmt;
use std::rc::Rc;

/// 运行时值
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// 编译期与运行期的"空位"，脚本里不可见
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Obj(Obj),
}

/// 堆对象引用
#[derive(Clone)]
pub enum Obj {
    String(Rc<ObjString>),
    List(Rc<ObjList>),
    Map(Rc<ObjMap>),
    Range(Rc<ObjRange>),
    Module(Rc<ObjModule>),
    Fn(Rc<ObjFn>),
    Closure(Rc<ObjClosure>),
    Instance(Rc<ObjInstance>),
    Class(Rc<ObjClass>),
    Thread(Rc<ObjThread>),
}

impl Value {
    pub fn string(text: impl Into<String>) -> Value {
        Value::Obj(Obj::String(Rc::new(ObjString::new(text))))
    }

    pub fn list(elements: Vec<Value>) -> Value {
        Value::Obj(Obj::List(Rc::new(ObjList::new(elements))))
    }

    pub fn range(from: f64, to: f64) -> Value {
        Value::Obj(Obj::Range(Rc::new(ObjRange { from, to })))
    }

    pub fn class(class: Rc<ObjClass>) -> Value {
        Value::Obj(Obj::Class(class))
    }

    pub fn closure(closure: Rc<ObjClosure>) -> Value {
        Value::Obj(Obj::Closure(closure))
    }

    pub fn thread(thread: Rc<ObjThread>) -> Value {
        Value::Obj(Obj::Thread(thread))
    }

    /// 只有 false 与 null 为假
    pub fn is_falsy(&self) -> bool {
        matches!(self, Value::Null | Value::Bool(false))
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&Rc<ObjString>> {
        match self {
            Value::Obj(Obj::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_string().map(|s| s.as_str())
    }

    pub fn as_list(&self) -> Option<&Rc<ObjList>> {
        match self {
            Value::Obj(Obj::List(l)) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Rc<ObjMap>> {
        match self {
            Value::Obj(Obj::Map(m)) => Some(m),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&Rc<ObjRange>> {
        match self {
            Value::Obj(Obj::Range(r)) => Some(r),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Rc<ObjClass>> {
        match self {
            Value::Obj(Obj::Class(c)) => Some(c),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<&Rc<ObjClosure>> {
        match self {
            Value::Obj(Obj::Closure(c)) => Some(c),
            _ => None,
        }
    }

    pub fn as_fn(&self) -> Option<&Rc<ObjFn>> {
        match self {
            Value::Obj(Obj::Fn(f)) => Some(f),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Rc<ObjInstance>> {
        match self {
            Value::Obj(Obj::Instance(i)) => Some(i),
            _ => None,
        }
    }

    pub fn as_thread(&self) -> Option<&Rc<ObjThread>> {
        match self {
            Value::Obj(Obj::Thread(t)) => Some(t),
            _ => None,
        }
    }

    /// 类型名，用于错误消息
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Num(_) => "num",
            Value::Obj(obj) => match obj {
                Obj::String(_) => "string",
                Obj::List(_) => "list",
                Obj::Map(_) => "map",
                Obj::Range(_) => "range",
                Obj::Module(_) => "module",
                Obj::Fn(_) | Obj::Closure(_) => "fn",
                Obj::Instance(_) => "instance",
                Obj::Class(_) => "class",
                Obj::Thread(_) => "thread",
            },
        }
    }
}

/// 数字按值，字符串按内容，区间按 (from, to)，其余对象按身份
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => match (a, b) {
                (Obj::String(a), Obj::String(b)) => {
                    a.hash_code() == b.hash_code() && a.as_str() == b.as_str()
                }
                (Obj::Range(a), Obj::Range(b)) => a.from == b.from && a.to == b.to,
                (Obj::List(a), Obj::List(b)) => Rc::ptr_eq(a, b),
                (Obj::Map(a), Obj::Map(b)) => Rc::ptr_eq(a, b),
                (Obj::Module(a), Obj::Module(b)) => Rc::ptr_eq(a, b),
                (Obj::Fn(a), Obj::Fn(b)) => Rc::ptr_eq(a, b),
                (Obj::Closure(a), Obj::Closure(b)) => Rc::ptr_eq(a, b),
                (Obj::Instance(a), Obj::Instance(b)) => Rc::ptr_eq(a, b),
                (Obj::Class(a), Obj::Class(b)) => Rc::ptr_eq(a, b),
                (Obj::Thread(a), Obj::Thread(b)) => Rc::ptr_eq(a, b),
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Obj::String(s) => write!(f, "{:?}", s.as_str()),
            other => write!(f, "{}", Value::Obj(other.clone())),
        }
    }
}

/// 浅层显示：容器不展开元素
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Num(n) => f.write_str(&format_num(*n)),
            Value::Obj(obj) => match obj {
                Obj::String(s) => f.write_str(s.as_str()),
                Obj::List(l) => write!(f, "<list of {}>", l.len()),
                Obj::Map(m) => write!(f, "<map of {}>", m.len()),
                Obj::Range(r) => write!(f, "{}..{}", format_num(r.from), format_num(r.to)),
                Obj::Module(m) => write!(f, "<module {}>", m.name),
                Obj::Fn(func) => write!(f, "<fn {}>", func.name),
                Obj::Closure(c) => write!(f, "<fn {}>", c.func.name),
                Obj::Instance(i) => write!(f, "instance of {}", i.class.name),
                Obj::Class(c) => f.write_str(&c.name),
                Obj::Thread(_) => f.write_str("<thread>"),
            },
        }
    }
}

/// 按 C 的 `%.14g` 格式化数字
pub fn format_num(n: f64) -> String {
    if n.is_nan() {
        return "nan".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "infinity" } else { "-infinity" }.to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // 先按 14 位有效数字取指数，舍入后的指数决定用定点还是科学计数
    let sci = format!("{:.13e}", n);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if !(-4..14).contains(&exp) {
        format!(
            "{}e{}{:02}",
            trim_fraction_zeros(mantissa),
            if exp < 0 { '-' } else { '+' },
            exp.abs()
        )
    } else {
        let decimals = (13 - exp).max(0) as usize;
        trim_fraction_zeros(&format!("{:.*}", decimals, n))
    }
}

fn trim_fraction_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(Value::Null.is_falsy());
        assert!(Value::Bool(false).is_falsy());
        assert!(Value::Num(0.0).is_truthy());
        assert!(Value::string("").is_truthy());
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::Num(1.0), Value::Num(1.0));
        assert_eq!(Value::string("abc"), Value::string("abc"));
        assert_ne!(Value::string("abc"), Value::string("abd"));
        assert_eq!(Value::range(1.0, 3.0), Value::range(1.0, 3.0));
        // 列表按身份比较
        assert_ne!(Value::list(vec![]), Value::list(vec![]));
        let list = Value::list(vec![Value::Num(1.0)]);
        assert_eq!(list.clone(), list);
        assert_ne!(Value::Null, Value::Bool(false));
    }

    #[test]
    fn test_format_num() {
        assert_eq!(format_num(7.0), "7");
        assert_eq!(format_num(-2.5), "-2.5");
        assert_eq!(format_num(0.1 + 0.2), "0.3");
        assert_eq!(format_num(1.0 / 3.0), "0.33333333333333");
        assert_eq!(format_num(1e14), "1e+14");
        assert_eq!(format_num(123456789.0), "123456789");
        assert_eq!(format_num(0.0001), "0.0001");
        assert_eq!(format_num(0.00001), "1e-05");
        assert_eq!(format_num(f64::NAN), "nan");
        assert_eq!(format_num(f64::INFINITY), "infinity");
        assert_eq!(format_num(f64::NEG_INFINITY), "-infinity");
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::range(1.0, 5.0).to_string(), "1..5");
        assert_eq!(Value::string("hi").to_string(), "hi");
    }
}
