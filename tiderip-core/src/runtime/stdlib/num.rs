//! Num 的原生方法
//!
//! 位运算先把操作数转成 u32。

use super::{bind, bind_static, ret, validate_num, validate_string};
use crate::core::{format_num, ObjClass, PrimResult, Value, Vm};

pub fn register(vm: &mut Vm, num: &ObjClass) {
    bind_static(vm, num, "fromString(_)", num_from_string);
    bind_static(vm, num, "pi", num_pi);

    bind(vm, num, "+(_)", num_add);
    bind(vm, num, "-(_)", num_sub);
    bind(vm, num, "*(_)", num_mul);
    bind(vm, num, "/(_)", num_div);
    bind(vm, num, "%(_)", num_mod);
    bind(vm, num, ">(_)", num_gt);
    bind(vm, num, ">=(_)", num_ge);
    bind(vm, num, "<(_)", num_lt);
    bind(vm, num, "<=(_)", num_le);
    bind(vm, num, "&(_)", num_bit_and);
    bind(vm, num, "|(_)", num_bit_or);
    bind(vm, num, "<<(_)", num_shl);
    bind(vm, num, ">>(_)", num_shr);
    bind(vm, num, "..(_)", num_range);
    bind(vm, num, "atan(_)", num_atan2);

    bind(vm, num, "-", num_neg);
    bind(vm, num, "~", num_bit_not);
    bind(vm, num, "abs", num_abs);
    bind(vm, num, "acos", num_acos);
    bind(vm, num, "asin", num_asin);
    bind(vm, num, "atan", num_atan);
    bind(vm, num, "ceil", num_ceil);
    bind(vm, num, "cos", num_cos);
    bind(vm, num, "floor", num_floor);
    bind(vm, num, "sin", num_sin);
    bind(vm, num, "sqrt", num_sqrt);
    bind(vm, num, "tan", num_tan);
    bind(vm, num, "fraction", num_fraction);
    bind(vm, num, "truncate", num_truncate);
    bind(vm, num, "isInteger", num_is_integer);
    bind(vm, num, "isNan", num_is_nan);
    bind(vm, num, "isInfinity", num_is_infinity);
    bind(vm, num, "toString", num_to_string);
}

/// 接收者一定是数字
fn receiver(args: &[Value]) -> f64 {
    args[0].as_num().unwrap_or(0.0)
}

fn to_u32(n: f64) -> u32 {
    n as i64 as u32
}

macro_rules! infix {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        fn $name(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
            let $a = receiver(args);
            let $b = try_prim!(validate_num(&args[1], "right operand"));
            ret(args, $body)
        }
    };
}

macro_rules! getter {
    ($name:ident, |$a:ident| $body:expr) => {
        fn $name(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
            let $a = receiver(args);
            ret(args, $body)
        }
    };
}

infix!(num_add, |a, b| Value::Num(a + b));
infix!(num_sub, |a, b| Value::Num(a - b));
infix!(num_mul, |a, b| Value::Num(a * b));
infix!(num_div, |a, b| Value::Num(a / b));
infix!(num_mod, |a, b| Value::Num(a % b));
infix!(num_gt, |a, b| Value::Bool(a > b));
infix!(num_ge, |a, b| Value::Bool(a >= b));
infix!(num_lt, |a, b| Value::Bool(a < b));
infix!(num_le, |a, b| Value::Bool(a <= b));
infix!(num_bit_and, |a, b| Value::Num((to_u32(a) & to_u32(b)) as f64));
infix!(num_bit_or, |a, b| Value::Num((to_u32(a) | to_u32(b)) as f64));
infix!(num_shl, |a, b| Value::Num(to_u32(a).wrapping_shl(to_u32(b)) as f64));
infix!(num_shr, |a, b| Value::Num(to_u32(a).wrapping_shr(to_u32(b)) as f64));
infix!(num_range, |a, b| Value::range(a, b));
infix!(num_atan2, |a, b| Value::Num(a.atan2(b)));

getter!(num_neg, |a| Value::Num(-a));
getter!(num_bit_not, |a| Value::Num(!to_u32(a) as f64));
getter!(num_abs, |a| Value::Num(a.abs()));
getter!(num_acos, |a| Value::Num(a.acos()));
getter!(num_asin, |a| Value::Num(a.asin()));
getter!(num_atan, |a| Value::Num(a.atan()));
getter!(num_ceil, |a| Value::Num(a.ceil()));
getter!(num_cos, |a| Value::Num(a.cos()));
getter!(num_floor, |a| Value::Num(a.floor()));
getter!(num_sin, |a| Value::Num(a.sin()));
getter!(num_sqrt, |a| Value::Num(a.sqrt()));
getter!(num_tan, |a| Value::Num(a.tan()));
getter!(num_fraction, |a| Value::Num(a.fract()));
getter!(num_truncate, |a| Value::Num(a.trunc()));
getter!(num_is_integer, |a| Value::Bool(a.is_finite() && a.trunc() == a));
getter!(num_is_nan, |a| Value::Bool(a.is_nan()));
getter!(num_is_infinity, |a| Value::Bool(a.is_infinite()));
getter!(num_to_string, |a| Value::string(format_num(a)));

fn num_pi(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    ret(args, Value::Num(std::f64::consts::PI))
}

/// 解析失败返回 null；除指数标记外不接受字母
fn num_from_string(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let text = try_prim!(validate_string(&args[1], "argument"));
    let text = text.as_str().trim();
    if text.chars().any(|c| c.is_alphabetic() && c != 'e' && c != 'E') {
        return ret(args, Value::Null);
    }
    let value = text.parse::<f64>().map(Value::Num).unwrap_or(Value::Null);
    ret(args, value)
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
    fn test_arithmetic_and_precedence() {
        assert_eq!(output("System.print(1 + 2 * 3 - 4 / 2)"), "5\n");
        assert_eq!(output("System.print(7 % 3)"), "1\n");
        assert_eq!(output("System.print(-(2 + 3))"), "-5\n");
        assert_eq!(output("System.print(1 / 3)"), "0.33333333333333\n");
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(output("System.print(6 & 3)"), "2\n");
        assert_eq!(output("System.print(6 | 3)"), "7\n");
        assert_eq!(output("System.print(1 << 4)"), "16\n");
        assert_eq!(output("System.print(~0)"), "4294967295\n");
    }

    #[test]
    fn test_math_getters() {
        assert_eq!(output("System.print(2.5.floor)"), "2\n");
        assert_eq!(output("System.print(16.sqrt)"), "4\n");
        assert_eq!(output("System.print(3.isInteger)"), "true\n");
        assert_eq!(output("System.print(-3.7.truncate)"), "-3\n");
    }

    #[test]
    fn test_from_string() {
        assert_eq!(output("System.print(Num.fromString(\" 12.5 \"))"), "12.5\n");
        assert_eq!(output("System.print(Num.fromString(\"1e3\"))"), "1000\n");
        assert_eq!(output("System.print(Num.fromString(\"abc\"))"), "null\n");
        assert_eq!(output("System.print(Num.fromString(\"inf\"))"), "null\n");
    }

    #[test]
    fn test_non_number_operand_is_error() {
        let mut vm = Vm::new();
        vm.set_output(SharedBuffer::new());
        let result = vm.execute_module("main", "1 + \"a\"");
        assert!(!result.is_success());
    }
}
