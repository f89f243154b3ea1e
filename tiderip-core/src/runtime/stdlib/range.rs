//! Range 的原生方法

use super::{bind, ret, validate_num};
use crate::core::{format_num, ObjClass, ObjRange, PrimResult, Value, Vm};

pub fn register(vm: &mut Vm, range: &ObjClass) {
    bind(vm, range, "from", range_from);
    bind(vm, range, "to", range_to);
    bind(vm, range, "min", range_min);
    bind(vm, range, "max", range_max);
    bind(vm, range, "iterate(_)", range_iterate);
    bind(vm, range, "iteratorValue(_)", range_iterator_value);
    bind(vm, range, "toString", range_to_string);
}

fn receiver(args: &[Value]) -> ObjRange {
    args[0]
        .as_range()
        .map(|r| **r)
        .unwrap_or(ObjRange { from: 0.0, to: 0.0 })
}

fn range_from(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let range = receiver(args);
    ret(args, Value::Num(range.from))
}

fn range_to(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let range = receiver(args);
    ret(args, Value::Num(range.to))
}

fn range_min(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let range = receiver(args);
    ret(args, Value::Num(range.from.min(range.to)))
}

fn range_max(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let range = receiver(args);
    ret(args, Value::Num(range.from.max(range.to)))
}

/// 两端都包含，`from > to` 时递减
fn range_iterate(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let range = receiver(args);
    if args[1].is_null() {
        return ret(args, Value::Num(range.from));
    }
    let iter = try_prim!(validate_num(&args[1], "iterator"));
    let next = if range.from <= range.to {
        if iter + 1.0 > range.to {
            Value::Bool(false)
        } else {
            Value::Num(iter + 1.0)
        }
    } else if iter - 1.0 < range.to {
        Value::Bool(false)
    } else {
        Value::Num(iter - 1.0)
    };
    ret(args, next)
}

/// 迭代器就是当前值
fn range_iterator_value(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let value = args[1].clone();
    ret(args, value)
}

fn range_to_string(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let range = receiver(args);
    let text = format!("{}..{}", format_num(range.from), format_num(range.to));
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
    fn test_range_iteration() {
        assert_eq!(output("for i (1..4) System.write(i)"), "1234");
        assert_eq!(output("for i (3..1) System.write(i)"), "321");
        assert_eq!(output("for i (2..2) System.write(i)"), "2");
    }

    #[test]
    fn test_range_properties() {
        assert_eq!(output("System.print(5..1)"), "5..1\n");
        assert_eq!(output("var r = 5..1\nSystem.print(r.min + r.max)"), "6\n");
        assert_eq!(output("System.print((1..3).toList)"), "[1, 2, 3]\n");
    }
}
