//! 协程与模块导入测试

mod common;
use common::{output_of, run_with_modules, runtime_error, ExecError};

#[test]
fn test_generator_protocol() {
    let code = r#"
        var fib = Thread.new {
          var a = 0
          var b = 1
          while (true) {
            Thread.yield(a)
            var t = a + b
            a = b
            b = t
          }
        }
        var out = []
        for i (1..8) out.add(fib.call())
        System.print(out)
        System.print(fib.isDone)
    "#;
    assert_eq!(output_of(code), "[0, 1, 1, 2, 3, 5, 8, 13]\nfalse\n");
}

#[test]
fn test_values_flow_both_ways() {
    let code = r#"
        var echo = Thread.new { |first|
          var got = first
          while (got != "stop") {
            got = Thread.yield(got + "!")
          }
          return "done"
        }
        System.print(echo.call("a"))
        System.print(echo.call("b"))
        System.print(echo.call("stop"))
        System.print(echo.isDone)
    "#;
    assert_eq!(output_of(code), "a!\nb!\ndone\ntrue\n");
}

#[test]
fn test_nested_threads_return_to_their_callers() {
    let code = r#"
        var inner = Thread.new {
          Thread.yield("inner 1")
          return "inner 2"
        }
        var outer = Thread.new {
          System.print(inner.call())
          Thread.yield("outer 1")
          System.print(inner.call())
          return "outer 2"
        }
        System.print(outer.call())
        System.print(outer.call())
    "#;
    assert_eq!(output_of(code), "inner 1\nouter 1\ninner 2\nouter 2\n");
}

#[test]
fn test_closures_shared_between_threads() {
    let code = r#"
        var count = 0
        fun make() {
          var local = 10
          var t = Thread.new {
            local = local + 1
            Thread.yield(local)
            local = local + 1
          }
          t.call()
          t.call()
          return local
        }
        System.print(make())
    "#;
    assert_eq!(output_of(code), "12\n");
}

#[test]
fn test_capture_outlives_its_thread() {
    let code = r#"
        var get = null
        var set = null
        var t = Thread.new {
          var x = 5
          get = Fn.new { return x }
          set = Fn.new { |v| x = v }
          Thread.yield()
        }
        t.call()
        t = null
        System.print(get.call())
        set.call(7)
        System.print(get.call())

        var f = null
        var failed = Thread.new {
          var y = 3
          f = Fn.new { return y }
          Thread.abort("stop")
        }
        failed.call()
        failed = null
        System.print(f.call())
    "#;
    assert_eq!(output_of(code), "5\n7\n3\n");
}

#[test]
fn test_thread_current_and_reentry() {
    // 协程里的错误只中止该协程，调用者拿到 null 并继续
    let code = r#"
        var t = null
        t = Thread.new {
          System.print(Thread.current == t)
          t.call()
          System.print("unreachable")
        }
        System.print(t.call())
        System.print(t.error)
    "#;
    assert_eq!(output_of(code), "true\nnull\nthread has been called\n");
}

#[test]
fn test_aborted_thread_reports_error() {
    let code = r#"
        var t = Thread.new { 1 + null }
        t.call()
        System.print(t.isDone)
        System.print(t.error)
        t.call()
    "#;
    let err = runtime_error(code);
    assert_eq!(err.message, "can't switch to an aborted thread");
}

#[test]
fn test_error_in_top_level_thread_stops_run() {
    let code = "System.write(1)\nThread.abort(\"fatal\")\nSystem.write(2)\n";
    match run_with_modules(code, &[]) {
        Err(ExecError::Runtime(err)) => {
            assert_eq!(err.message, "fatal");
            assert_eq!(err.line, 2);
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn test_import_binds_variables() {
    let modules = [
        (
            "geometry",
            "class Circle {\n  new(r) { _r = r }\n  area { return _r * _r * 3 }\n}\nvar unit = Circle.new(1)\n",
        ),
        ("util", "import geometry for Circle\nvar twice = Circle.new(2)\n"),
    ];
    let code = r#"
        import geometry for Circle, unit
        import util for twice
        System.print(unit.area)
        System.print(twice.area)
        System.print(Circle.new(3).area)
    "#;
    let out = run_with_modules(code, &modules).expect("runs");
    assert_eq!(out, "3\n12\n27\n");
}

#[test]
fn test_subclass_of_imported_class() {
    let modules = [(
        "base",
        "class Base {\n  new(a, b) {\n    _a = a\n    _b = b\n  }\n  sum { return _a + _b }\n}\n",
    )];
    let code = r#"
        import base for Base
        class Derived < Base {
          new(a, b, c) {
            super(a, b)
            _c = c
          }
          c { return _c }
          all { return sum + _c }
        }
        var d = Derived.new(1, 2, 4)
        System.print(d.sum)
        System.print(d.c)
        System.print(d.all)
    "#;
    let out = run_with_modules(code, &modules).expect("runs");
    assert_eq!(out, "3\n4\n7\n");
}

#[test]
fn test_imported_module_runs_once() {
    let modules = [("counter", "System.print(\"init\")\nvar n = 1\n")];
    let code = r#"
        import counter
        import counter for n
        System.print(n)
    "#;
    let out = run_with_modules(code, &modules).expect("runs");
    assert_eq!(out, "init\n1\n");
}

#[test]
fn test_import_inside_function() {
    let modules = [("names", "var first = \"ada\"\n")];
    let code = r#"
        fun greet() {
          import names for first
          return "hi " + first
        }
        System.print(greet())
    "#;
    let out = run_with_modules(code, &modules).expect("runs");
    assert_eq!(out, "hi ada\n");
}
