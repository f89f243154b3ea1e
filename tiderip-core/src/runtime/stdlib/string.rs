//! String 的原生方法
//!
//! 字符串按 UTF-8 字节寻址：下标、`indexOf` 的结果与迭代器都是字节偏移。

use super::{
    bind, bind_static, error, range_slice, ret, validate_index, validate_int, validate_string,
};
use crate::core::{ObjClass, PrimResult, Value, Vm};

pub fn register(vm: &mut Vm, string: &ObjClass) {
    bind_static(vm, string, "fromCodePoint(_)", string_from_code_point);

    bind(vm, string, "+(_)", string_plus);
    bind(vm, string, "[_]", string_subscript);
    bind(vm, string, "byteAt_(_)", string_byte_at);
    bind(vm, string, "byteCount_", string_byte_count);
    bind(vm, string, "codePointAt_(_)", string_code_point_at);
    bind(vm, string, "contains(_)", string_contains);
    bind(vm, string, "count", string_count);
    bind(vm, string, "endsWith(_)", string_ends_with);
    bind(vm, string, "indexOf(_)", string_index_of);
    bind(vm, string, "iterate(_)", string_iterate);
    bind(vm, string, "iterateByte_(_)", string_iterate_byte);
    bind(vm, string, "iteratorValue(_)", string_iterator_value);
    bind(vm, string, "startsWith(_)", string_starts_with);
    bind(vm, string, "toString", string_to_string);
}

/// Boyer-Moore-Horspool 子串查找，返回首次出现的字节偏移
///
/// 空模式串匹配在 0。
pub fn find_string(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }

    let last = needle.len() - 1;
    let mut shift = [needle.len(); 256];
    for (i, &byte) in needle[..last].iter().enumerate() {
        shift[byte as usize] = last - i;
    }

    let mut start = 0;
    while start + needle.len() <= haystack.len() {
        let tail = haystack[start + last];
        if tail == needle[last] && haystack[start..start + last] == needle[..last] {
            return Some(start);
        }
        start += shift[tail as usize];
    }
    None
}

fn receiver(args: &[Value]) -> &str {
    args[0].as_str().unwrap_or_default()
}

/// 从字节偏移处取一个码点
fn char_at(text: &str, index: usize) -> Result<String, String> {
    if !text.is_char_boundary(index) {
        return Err(format!("index {} is not at a character boundary", index));
    }
    Ok(text[index..].chars().next().map(String::from).unwrap_or_default())
}

fn string_from_code_point(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let code = try_prim!(validate_int(&args[1], "code point"));
    if code < 0.0 {
        return error("code point can't be negative");
    }
    match char::from_u32(code as u32) {
        Some(c) if code <= u32::MAX as f64 => ret(args, Value::string(c.to_string())),
        _ => error("code point out of range"),
    }
}

fn string_plus(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let right = try_prim!(validate_string(&args[1], "right operand"));
    let joined = format!("{}{}", receiver(args), right.as_str());
    ret(args, Value::string(joined))
}

fn string_subscript(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let text = receiver(args).to_string();
    if let Some((start, count, ascending)) = try_prim!(range_slice(&args[1], text.len())) {
        let (low, high) = if ascending {
            (start, start + count)
        } else {
            (start + 1 - count, start + 1)
        };
        let Some(slice) = text.get(low..high) else {
            return error("range is not at character boundaries");
        };
        let result: String = if ascending {
            slice.to_string()
        } else {
            slice.chars().rev().collect()
        };
        return ret(args, Value::string(result));
    }
    let index = try_prim!(validate_index(&args[1], text.len(), "index"));
    let c = try_prim!(char_at(&text, index));
    ret(args, Value::string(c))
}

fn string_byte_at(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let bytes = receiver(args).as_bytes();
    let index = try_prim!(validate_index(&args[1], bytes.len(), "index"));
    let byte = bytes[index];
    ret(args, Value::Num(byte as f64))
}

fn string_byte_count(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let len = receiver(args).len();
    ret(args, Value::Num(len as f64))
}

/// 落在多字节字符中间时返回 -1
fn string_code_point_at(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let text = receiver(args);
    let index = try_prim!(validate_index(&args[1], text.len(), "index"));
    let code = if text.is_char_boundary(index) {
        text[index..].chars().next().map(|c| c as u32 as f64).unwrap_or(-1.0)
    } else {
        -1.0
    };
    ret(args, Value::Num(code))
}

fn string_contains(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let needle = try_prim!(validate_string(&args[1], "argument"));
    let found = find_string(receiver(args).as_bytes(), needle.as_str().as_bytes()).is_some();
    ret(args, Value::Bool(found))
}

fn string_count(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let count = receiver(args).chars().count();
    ret(args, Value::Num(count as f64))
}

fn string_ends_with(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let suffix = try_prim!(validate_string(&args[1], "argument"));
    let result = receiver(args).ends_with(suffix.as_str());
    ret(args, Value::Bool(result))
}

fn string_starts_with(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let prefix = try_prim!(validate_string(&args[1], "argument"));
    let result = receiver(args).starts_with(prefix.as_str());
    ret(args, Value::Bool(result))
}

fn string_index_of(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let needle = try_prim!(validate_string(&args[1], "argument"));
    let index = find_string(receiver(args).as_bytes(), needle.as_str().as_bytes())
        .map(|i| i as f64)
        .unwrap_or(-1.0);
    ret(args, Value::Num(index))
}

/// 迭代器是下一个码点的字节偏移
fn string_iterate(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let text = receiver(args);
    if args[1].is_null() {
        let first = if text.is_empty() {
            Value::Bool(false)
        } else {
            Value::Num(0.0)
        };
        return ret(args, first);
    }
    let iter = try_prim!(validate_int(&args[1], "iterator"));
    if iter < 0.0 || iter as usize >= text.len() {
        return ret(args, Value::Bool(false));
    }
    let index = iter as usize;
    let width = if text.is_char_boundary(index) {
        text[index..].chars().next().map(char::len_utf8).unwrap_or(1)
    } else {
        1
    };
    let next = index + width;
    let value = if next >= text.len() {
        Value::Bool(false)
    } else {
        Value::Num(next as f64)
    };
    ret(args, value)
}

fn string_iterate_byte(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let len = receiver(args).len();
    if args[1].is_null() {
        let first = if len == 0 {
            Value::Bool(false)
        } else {
            Value::Num(0.0)
        };
        return ret(args, first);
    }
    let iter = try_prim!(validate_int(&args[1], "iterator"));
    let value = if iter < 0.0 || iter + 1.0 >= len as f64 {
        Value::Bool(false)
    } else {
        Value::Num(iter + 1.0)
    };
    ret(args, value)
}

fn string_iterator_value(_vm: &mut Vm, args: &mut [Value]) -> PrimResult {
    let text = receiver(args).to_string();
    let index = try_prim!(validate_index(&args[1], text.len(), "iterator"));
    let c = try_prim!(char_at(&text, index));
    ret(args, Value::string(c))
}

fn string_to_string(_vm: &mut Vm, _args: &mut [Value]) -> PrimResult {
    PrimResult::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SharedBuffer;

    fn output(source: &str) -> String {
        let mut vm = Vm::new();
        let out = SharedBuffer::new();
        vm.set_output(out.clone());
        let result = vm.execute_module("main", source);
        assert!(result.is_success(), "{:?}", result);
        out.contents()
    }

    #[test]
    fn test_find_string() {
        assert_eq!(find_string(b"hello world", b"world"), Some(6));
        assert_eq!(find_string(b"hello", b"lo"), Some(3));
        assert_eq!(find_string(b"hello", b""), Some(0));
        assert_eq!(find_string(b"hello", b"xyz"), None);
        assert_eq!(find_string(b"ab", b"abc"), None);
        assert_eq!(find_string(b"aaab", b"aab"), Some(1));
        assert_eq!(find_string(b"abcabd", b"abd"), Some(3));
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(output("System.print(\"hello\".indexOf(\"ll\"))"), "2\n");
        assert_eq!(output("System.print(\"hello\".contains(\"xyz\"))"), "false\n");
        assert_eq!(output("System.print(\"hello\"[1])"), "e\n");
        assert_eq!(output("System.print(\"hello\"[-1])"), "o\n");
        assert_eq!(output("System.print(\"hello\"[1..3])"), "ell\n");
        assert_eq!(output("System.print(\"abc\"[2..0])"), "cba\n");
        assert_eq!(output("System.print(\"ab\" + \"cd\")"), "abcd\n");
        assert_eq!(output("System.print(\"hello\".startsWith(\"he\"))"), "true\n");
    }

    #[test]
    fn test_multibyte_iteration() {
        assert_eq!(output("System.print(\"中文\".count)"), "2\n");
        assert_eq!(output("System.print(\"中文\".byteCount_)"), "6\n");
        assert_eq!(output("for c (\"a中b\") System.write(c + \"|\")"), "a|中|b|");
        assert_eq!(output("System.print(String.fromCodePoint(20013))"), "中\n");
    }

    #[test]
    fn test_sequence_methods_on_string() {
        assert_eq!(output("System.print(\"abc\".toList)"), "[a, b, c]\n");
        assert_eq!(output("System.print(\"abc\".map { |c| c + c }.join(\"-\"))"), "aa-bb-cc\n");
    }
}
