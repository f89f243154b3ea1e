//! 核心库
//!
//! 引导顺序：
//! 1. 手工创建 object、class、objectMeta 并绑定它们的原生方法
//! 2. 在核心模块里编译运行 `core.vt`，由脚本定义其余核心类
//! 3. 把原生方法绑定到脚本创建的类上
//!
//! 原生方法的约定：`args[0]` 是接收者，返回值写回 `args[0]`。

use crate::compiler;
use crate::core::{InterpretResult, ObjClass, ObjModule, ObjString, PrimResult, Primitive, Value, Vm};
use std::rc::Rc;
use tiderip_log::debug;

/// 校验失败时把消息作为运行时错误返回
macro_rules! try_prim {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(msg) => return $crate::core::PrimResult::Error($crate::core::Value::string(msg)),
        }
    };
}

mod func;
mod list;
mod map;
mod num;
mod object;
mod range;
mod string;
mod system;
mod thread;

pub use string::find_string;

const CORE_SCRIPT: &str = include_str!("core.vt");

/// 引导核心库
pub fn bootstrap(vm: &mut Vm) -> Result<(), String> {
    let object = vm.core.object.clone();
    let class = vm.core.class.clone();

    object::bind_object(vm, &object);
    // class 创建时 object 的方法表还是空的
    class.copy_methods_from(&object);
    object::bind_class(vm, &class);
    let object_meta = ObjClass::new("objectMeta", Some(class.clone()), 0);
    object.set_meta(object_meta.clone());
    object::bind_object_meta(vm, &object_meta);

    let core = vm.core_module.clone();
    core.add_var("object", Value::class(object));
    core.add_var("class", Value::class(class));
    core.add_var("objectMeta", Value::class(object_meta));

    let func = compiler::compile_module(vm, core.clone(), CORE_SCRIPT)
        .map_err(|err| format!("core script: {}", err))?;
    match vm.run_function(func) {
        InterpretResult::Success => {}
        InterpretResult::CompileError(err) => return Err(err.to_string()),
        InterpretResult::RuntimeError(err) => return Err(err.report()),
    }

    vm.core.null = core_class(&core, "Null")?;
    vm.core.bool = core_class(&core, "Bool")?;
    vm.core.num = core_class(&core, "Num")?;
    vm.core.string = core_class(&core, "String")?;
    vm.core.list = core_class(&core, "List")?;
    vm.core.map = core_class(&core, "Map")?;
    vm.core.range = core_class(&core, "Range")?;
    vm.core.func = core_class(&core, "Fn")?;
    vm.core.thread = core_class(&core, "Thread")?;
    let system = core_class(&core, "System")?;

    let classes = vm.core.clone();
    object::bind_null(vm, &classes.null);
    object::bind_bool(vm, &classes.bool);
    num::register(vm, &classes.num);
    string::register(vm, &classes.string);
    list::register(vm, &classes.list);
    map::register(vm, &classes.map);
    range::register(vm, &classes.range);
    func::register(vm, &classes.func);
    thread::register(vm, &classes.thread);
    system::register(vm, &system);

    debug!(vm.logger, "core module has {} variables", core.var_count());
    Ok(())
}

fn core_class(module: &ObjModule, name: &str) -> Result<Rc<ObjClass>, String> {
    module
        .var_by_name(name)
        .and_then(|v| v.as_class().cloned())
        .ok_or_else(|| format!("core class '{}' is missing", name))
}

/// 绑定实例方法
pub(crate) fn bind(vm: &mut Vm, class: &ObjClass, signature: &str, primitive: Primitive) {
    let symbol = vm.method_names.ensure(signature);
    class.set_method(symbol, crate::core::Method::Primitive(primitive));
}

/// 绑定静态方法（元类上的实例方法）
pub(crate) fn bind_static(vm: &mut Vm, class: &ObjClass, signature: &str, primitive: Primitive) {
    if let Some(meta) = class.meta() {
        bind(vm, &meta, signature, primitive);
    }
}

/// 写回结果
pub(crate) fn ret(args: &mut [Value], value: Value) -> PrimResult {
    args[0] = value;
    PrimResult::Continue
}

pub(crate) fn error(message: impl Into<String>) -> PrimResult {
    PrimResult::Error(Value::string(message.into()))
}

pub(crate) fn validate_num(value: &Value, name: &str) -> Result<f64, String> {
    value
        .as_num()
        .ok_or_else(|| format!("{} must be a number", name))
}

pub(crate) fn validate_int(value: &Value, name: &str) -> Result<f64, String> {
    let n = validate_num(value, name)?;
    if n.trunc() != n || !n.is_finite() {
        return Err(format!("{} must be an integer", name));
    }
    Ok(n)
}

pub(crate) fn validate_string(value: &Value, name: &str) -> Result<Rc<ObjString>, String> {
    value
        .as_string()
        .cloned()
        .ok_or_else(|| format!("{} must be a string", name))
}

/// 下标校验：负数从末尾算起，结果落在 `[0, count)`
pub(crate) fn validate_index(value: &Value, count: usize, name: &str) -> Result<usize, String> {
    let n = validate_int(value, name)?;
    let index = if n < 0.0 { n + count as f64 } else { n };
    if index < 0.0 || index >= count as f64 {
        return Err(format!("{} out of bounds", name));
    }
    Ok(index as usize)
}

/// 区间下标换算成 (起点, 元素个数, 方向)，两端都包含
pub(crate) fn range_slice(value: &Value, count: usize) -> Result<Option<(usize, usize, bool)>, String> {
    let Some(range) = value.as_range() else {
        return Ok(None);
    };
    let from = validate_index(&Value::Num(range.from), count, "range start")?;
    let to = validate_index(&Value::Num(range.to), count, "range end")?;
    Ok(Some(if from <= to {
        (from, to - from + 1, true)
    } else {
        (from, from - to + 1, false)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_index() {
        assert_eq!(validate_index(&Value::Num(0.0), 3, "index"), Ok(0));
        assert_eq!(validate_index(&Value::Num(-1.0), 3, "index"), Ok(2));
        assert!(validate_index(&Value::Num(3.0), 3, "index").is_err());
        assert!(validate_index(&Value::Num(-4.0), 3, "index").is_err());
        assert!(validate_index(&Value::Num(1.5), 3, "index").is_err());
        assert!(validate_index(&Value::Null, 3, "index").is_err());
    }

    #[test]
    fn test_range_slice() {
        assert_eq!(range_slice(&Value::range(1.0, 3.0), 5), Ok(Some((1, 3, true))));
        assert_eq!(range_slice(&Value::range(-1.0, 0.0), 5), Ok(Some((4, 5, false))));
        assert_eq!(range_slice(&Value::Num(1.0), 5), Ok(None));
        assert!(range_slice(&Value::range(0.0, 9.0), 5).is_err());
    }

    #[test]
    fn test_core_classes_bound() {
        let vm = Vm::new();
        assert!(vm.boot_error.is_none(), "{:?}", vm.boot_error);
        assert_eq!(vm.core.list.name, "List");
        assert!(vm.core.list.superclass.as_ref().unwrap().name == "Sequence");
        assert_eq!(vm.core.thread.name, "Thread");
        assert!(vm.core.is_builtin(&vm.core.num));
        assert!(!vm.core.is_builtin(&vm.core.object));
    }
}
