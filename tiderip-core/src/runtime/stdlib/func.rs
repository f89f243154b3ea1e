//! Fn 的原生方法
//!
//! `call(...)` 不是普通原生方法：执行循环直接为接收者闭包压入调用帧。

use super::{bind, bind_static, error, ret};
use crate::core::{Method, ObjClass, PrimResult, Value, Vm};

pub fn register(vm: &mut Vm, func: &ObjClass) {
    bind_static(vm, func, "new(_)", fn_new);
    bind(vm, func, "toString", fn_to_string);

    let max = vm.config.limits.max_arg_num;
    for arg_num in 0..=max {
        let params = vec!["_"; arg_num].join(",");
        let symbol = vm.method_names.ensure(&format!("call({})", params));
        func.set_method(symbol, Method::FnCall);
    }
}

/// `Fn.new { ... }` 原样返回块参数
fn fn_new(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    if args[1].as_closure().is_none() {
        return error("argument must be a function");
    }
    let closure = args[1].clone();
    ret(args, closure)
}

fn fn_to_string(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let text = args[0].to_string();
    ret(args, Value::string(text))
}
