//! object、class、objectMeta 以及 Null、Bool 的原生方法

use super::{bind, error, ret};
use crate::core::{ObjClass, PrimResult, Value, Vm};

pub fn bind_object(vm: &mut Vm, object: &ObjClass) {
    bind(vm, object, "!", object_not);
    bind(vm, object, "==(_)", object_equal);
    bind(vm, object, "!=(_)", object_not_equal);
    bind(vm, object, "is(_)", object_is);
    bind(vm, object, "toString", object_to_string);
    bind(vm, object, "type", object_type);
}

pub fn bind_class(vm: &mut Vm, class: &ObjClass) {
    bind(vm, class, "name", class_name);
    bind(vm, class, "supertype", class_supertype);
    bind(vm, class, "toString", class_name);
}

pub fn bind_object_meta(vm: &mut Vm, meta: &ObjClass) {
    bind(vm, meta, "same(_,_)", object_meta_same);
}

pub fn bind_null(vm: &mut Vm, null: &ObjClass) {
    bind(vm, null, "!", null_not);
    bind(vm, null, "toString", null_to_string);
}

pub fn bind_bool(vm: &mut Vm, bool_class: &ObjClass) {
    bind(vm, bool_class, "!", bool_not);
    bind(vm, bool_class, "toString", bool_to_string);
}

fn object_not(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    ret(args, Value::Bool(false))
}

fn object_equal(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let equal = args[0] == args[1];
    ret(args, Value::Bool(equal))
}

fn object_not_equal(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let equal = args[0] == args[1];
    ret(args, Value::Bool(!equal))
}

/// `x is C`：x 的类是否为 C 或其子类
fn object_is(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let Some(target) = args[1].as_class().cloned() else {
        return error("right operand of 'is' must be a class");
    };
    let class = vm.class_of(&args[0]);
    ret(args, Value::Bool(class.is_subclass_of(&target)))
}

fn object_to_string(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let class = vm.class_of(&args[0]);
    ret(args, Value::string(format!("instance of {}", class.name)))
}

fn object_type(vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let class = vm.class_of(&args[0]);
    ret(args, Value::class(class))
}

fn object_meta_same(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let same = args[1] == args[2];
    ret(args, Value::Bool(same))
}

fn class_name(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    match args[0].as_class() {
        Some(class) => {
            let name = class.name.clone();
            ret(args, Value::string(name))
        }
        None => error("receiver must be a class"),
    }
}

fn class_supertype(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let superclass = args[0].as_class().and_then(|c| c.superclass.clone());
    ret(args, superclass.map(Value::class).unwrap_or(Value::Null))
}

fn null_not(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    ret(args, Value::Bool(true))
}

fn null_to_string(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    ret(args, Value::string("null"))
}

fn bool_not(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let value = matches!(args[0], Value::Bool(false));
    ret(args, Value::Bool(value))
}

fn bool_to_string(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let text = if matches!(args[0], Value::Bool(true)) {
        "true"
    } else {
        "false"
    };
    ret(args, Value::string(text))
}

#[cfg(test)]
mod tests {
    use crate::runtime::{SharedBuffer, Vm};

    fn output(source: &str) -> String {
        let mut vm = Vm::new();
        let out = SharedBuffer::new();
        vm.set_output(out.clone());
        let result = vm.execute_module("main", source);
        assert!(result.is_success(), "{:?}", result);
        out.contents()
    }

    #[test]
    fn test_is_and_type() {
        let out = output(
            "class A {}\n\
             class B < A {\n\
               new() {}\n\
             }\n\
             var b = B.new()\n\
             System.print(b is A)\n\
             System.print(b is Num)\n\
             System.print(b.type)\n\
             System.print(B.supertype)\n\
             System.print(1 is Num)\n",
        );
        assert_eq!(out, "true\nfalse\nB\nA\ntrue\n");
    }

    #[test]
    fn test_default_to_string_and_equality() {
        let out = output(
            "class P {\n\
               new() {}\n\
             }\n\
             var p = P.new()\n\
             System.print(p)\n\
             System.print(p == p)\n\
             System.print(p != P.new())\n\
             System.print(object.same(1, 1))\n\
             System.print(!null)\n\
             System.print(!true)\n",
        );
        assert_eq!(out, "instance of P\ntrue\ntrue\ntrue\ntrue\nfalse\n");
    }
}
