//! 端到端语言测试：从源码到脚本输出

mod common;
use common::{compile_error, output_of, runtime_error};
use tiderip_core::compiler::SyntaxErrorKind;
use tiderip_core::CompileError;

#[test]
fn test_point_example() {
    let code = r#"
        class Point {
          var x
          var y
          new(a, b) {
            x = a
            y = b
          }
          sum() { return x + y }
        }
        var p = Point.new(3, 4)
        System.print(p.sum())
    "#;
    assert_eq!(output_of(code), "7\n");
}

#[test]
fn test_arithmetic_and_precedence() {
    assert_eq!(output_of("System.print(1 + 2 * 3)"), "7\n");
    assert_eq!(output_of("System.print((1 + 2) * 3)"), "9\n");
    assert_eq!(output_of("System.print(7 % 3)"), "1\n");
    assert_eq!(output_of("System.print(1 / 4)"), "0.25\n");
    assert_eq!(output_of("System.print(-2 - -3)"), "1\n");
    assert_eq!(output_of("System.print(6 & 3 | 8)"), "10\n");
    assert_eq!(output_of("System.print(1 << 4 >> 2)"), "4\n");
}

#[test]
fn test_logic_short_circuit() {
    let code = r#"
        var hits = 0
        fun hit() {
          hits = hits + 1
          return true
        }
        var a = false && hit()
        var b = true || hit()
        var c = true && hit()
        System.print(hits)
        System.print(a)
        System.print(b)
        System.print(null || "fallback")
    "#;
    assert_eq!(output_of(code), "1\nfalse\ntrue\nfallback\n");
}

#[test]
fn test_ternary_and_comparison() {
    assert_eq!(output_of("System.print(1 < 2 ? \"yes\" : \"no\")"), "yes\n");
    assert_eq!(output_of("System.print(3 <= 2 ? \"yes\" : \"no\")"), "no\n");
    assert_eq!(output_of("System.print(null == null)"), "true\n");
    assert_eq!(output_of("System.print(1 != \"1\")"), "true\n");
}

#[test]
fn test_truthiness() {
    // 只有 false 和 null 为假
    let code = r#"
        if (0) System.write("zero ")
        if ("") System.write("empty ")
        if (null) System.write("null ")
        if (false) System.write("false ")
        System.print("")
    "#;
    assert_eq!(output_of(code), "zero empty \n");
}

#[test]
fn test_string_interpolation() {
    let code = r#"
        var name = "tide"
        var n = 3
        System.print("%(name) has %(n * 2) legs")
        System.print("nested %([1, 2].count) ok")
    "#;
    assert_eq!(output_of(code), "tide has 6 legs\nnested 2 ok\n");
}

#[test]
fn test_while_and_for_loops() {
    let code = r#"
        var i = 0
        var total = 0
        while (i < 5) {
          i = i + 1
          if (i == 2) continue
          if (i == 4) break
          total = total + i
        }
        System.print(total)
        for x ([10, 20, 30]) System.write(x / 10)
        System.print("")
    "#;
    assert_eq!(output_of(code), "4\n123\n");
}

#[test]
fn test_closures_capture_variables() {
    let code = r#"
        fun counter() {
          var count = 0
          return Fn.new {
            count = count + 1
            return count
          }
        }
        var a = counter()
        var b = counter()
        a.call()
        a.call()
        System.print(a.call())
        System.print(b.call())
    "#;
    assert_eq!(output_of(code), "3\n1\n");
}

#[test]
fn test_inheritance_and_super() {
    let code = r#"
        class Animal {
          var name
          new(n) { name = n }
          speak() { return "..." }
          describe() { return name + " says " + speak() }
        }
        class Dog < Animal {
          var tricks
          new(n) {
            super(n)
            tricks = 0
          }
          speak() { return "woof" }
          describe() { return super.describe() + "!" }
        }
        var d = Dog.new("rex")
        System.print(d.describe())
        System.print(d is Animal)
        System.print(d is Dog)
        System.print(Dog.supertype.name)
    "#;
    assert_eq!(output_of(code), "rex says woof!\ntrue\ntrue\nAnimal\n");
}

#[test]
fn test_subclass_of_aliased_class_keeps_own_fields() {
    let code = r#"
        class A {
          new() { _a = 1 }
          a { return _a }
        }
        var K = A
        class B < K {
          new() {
            super()
            _b = 2
          }
          b { return _b }
        }
        var o = B.new()
        System.print(o.a)
        System.print(o.b)
    "#;
    assert_eq!(output_of(code), "1\n2\n");
}

#[test]
fn test_field_layout_across_three_levels() {
    // 嵌套函数里的字段访问也要跳过父类的字段
    let code = r#"
        class A {
          new() { _x = "a" }
          x { return _x }
        }
        class B < A {
          new() {
            super()
            _y = "b"
          }
          y { return _y }
          yLater { return Fn.new { return _y } }
        }
        class C < B {
          new() {
            super()
            _z = "c"
          }
          z { return _z }
          setZ(v) { _z = v }
          zLater { return Fn.new { return _z } }
        }
        var c = C.new()
        System.print(c.x + c.y + c.z)
        c.setZ("!")
        System.print(c.yLater.call() + c.zLater.call())
        System.print(c.x)
        System.print(B.new().y)
    "#;
    assert_eq!(output_of(code), "abc\nb!\na\nb\n");
}

#[test]
fn test_getters_setters_and_operators() {
    let code = r#"
        class Vec {
          new(a, b) {
            _x = a
            _y = b
          }
          x { return _x }
          y { return _y }
          x=(v) { _x = v }
          +(other) { return Vec.new(x + other.x, y + other.y) }
          -(other) { return Vec.new(x - other.x, y - other.y) }
          - { return Vec.new(-x, -y) }
          [i] { return i == 0 ? x : y }
          toString { return "(%(x), %(y))" }
        }
        var v = Vec.new(1, 2) + Vec.new(3, 4)
        System.print(v)
        System.print(-v)
        System.print(v - Vec.new(1, 1))
        v.x = 10
        System.print(v[0] + v[1])
    "#;
    assert_eq!(output_of(code), "(4, 6)\n(-4, -6)\n(3, 5)\n16\n");
}

#[test]
fn test_static_members() {
    let code = r#"
        class Counter {
          static var created = 0
          new() { created = created + 1 }
          static created { return created }
          static reset() { created = 0 }
        }
        Counter.new()
        Counter.new()
        System.print(Counter.created)
        Counter.reset()
        System.print(Counter.created)
    "#;
    assert_eq!(output_of(code), "2\n0\n");
}

#[test]
fn test_class_fields_default_to_null() {
    let code = r#"
        class Box {
          var item
          new() {}
          item { return item }
        }
        System.print(Box.new().item)
    "#;
    assert_eq!(output_of(code), "null\n");
}

#[test]
fn test_fun_forward_reference() {
    let code = r#"
        fun first() { return second() + 1 }
        fun second() { return 41 }
        System.print(first())
    "#;
    assert_eq!(output_of(code), "42\n");
}

#[test]
fn test_list_map_and_range_literals() {
    let code = r#"
        var list = [1, 2, 3]
        var map = {"one": 1, "two": 2}
        System.print(list.count + map.count)
        System.print(map["two"])
        System.print((1..5).where { |n| n % 2 == 1 }.toList)
        System.print(list.map { |n| n * n }.join(","))
    "#;
    assert_eq!(output_of(code), "5\n2\n[1, 3, 5]\n1,4,9\n");
}

#[test]
fn test_string_methods() {
    let code = r#"
        var s = "hello world"
        System.print(s.contains("lo w"))
        System.print(s.indexOf("world"))
        System.print(s.startsWith("he"))
        System.print(s[0..4])
        System.print(s.count)
        System.print("a" + "b")
    "#;
    assert_eq!(output_of(code), "true\n6\ntrue\nhello\n11\nab\n");
}

#[test]
fn test_number_formatting() {
    assert_eq!(output_of("System.print(10)"), "10\n");
    assert_eq!(output_of("System.print(1.5)"), "1.5\n");
    assert_eq!(output_of("System.print(0.1 + 0.2)"), "0.3\n");
    assert_eq!(output_of("System.print(100000000000000000000)"), "1e+20\n");
    assert_eq!(output_of("System.print(Num.fromString(\"12\") + 1)"), "13\n");
}

#[test]
fn test_runtime_error_reports_line() {
    let err = runtime_error("var a = 1\nvar b = null\nb.foo()\n");
    assert_eq!(err.line, 3);
    assert_eq!(err.message, "Null does not implement 'foo()'");
    assert!(err.report().contains("foo()"));
}

#[test]
fn test_runtime_error_type_checks() {
    let err = runtime_error("System.print(1 + \"a\")");
    assert_eq!(err.message, "right operand must be a number");
}

#[test]
fn test_compile_error_reports_line() {
    match compile_error("var a = 1\nvar b = \nvar c = 2") {
        CompileError::Syntax { line, module, .. } => {
            assert_eq!(module, "main");
            assert_eq!(line, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_undefined_variable_reported_at_use() {
    match compile_error("var a = 1\nfun f() {\n  return missing\n}\n") {
        CompileError::Syntax { line, kind, .. } => {
            assert_eq!(kind, SyntaxErrorKind::UndefinedVariable("missing".to_string()));
            assert_eq!(line, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_deep_loop_keeps_stack_balanced() {
    // 每轮留下多余的栈槽会让大循环后的计算出错或越界
    let code = r#"
        var sum = 0
        for i (1..20000) {
          var t = i * 2
          sum = sum + (t > 10 ? 1 : 0)
          var c = [i, t].count
        }
        System.print(sum)
    "#;
    assert_eq!(output_of(code), "19995\n");
}
