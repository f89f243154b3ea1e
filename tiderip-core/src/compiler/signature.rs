//! 方法签名
//!
//! 签名的文本形式是全局方法符号表的键：
//!
//! | 种类 | 示例 |
//! |------|------|
//! | getter | `count` |
//! | setter | `count=(_)` |
//! | 方法 / 构造器 | `add(_)`、`new(_,_)`、`clear()` |
//! | 下标 | `[_]`、`[_,_]` |
//! | 下标 setter | `[_]=(_)` |

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Construct,
    Method,
    Getter,
    Setter,
    Subscript,
    SubscriptSetter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub kind: SignatureKind,
    pub name: String,
    pub arg_num: usize,
}

fn placeholders(n: usize) -> String {
    vec!["_"; n].join(",")
}

impl Signature {
    pub fn new(kind: SignatureKind, name: impl Into<String>, arg_num: usize) -> Self {
        Signature {
            kind,
            name: name.into(),
            arg_num,
        }
    }

    pub fn getter(name: impl Into<String>) -> Self {
        Self::new(SignatureKind::Getter, name, 0)
    }

    pub fn method(name: impl Into<String>, arg_num: usize) -> Self {
        Self::new(SignatureKind::Method, name, arg_num)
    }

    pub fn key(&self) -> String {
        match self.kind {
            SignatureKind::Getter => self.name.clone(),
            SignatureKind::Setter => format!("{}=(_)", self.name),
            SignatureKind::Method | SignatureKind::Construct => {
                format!("{}({})", self.name, placeholders(self.arg_num))
            }
            SignatureKind::Subscript => format!("[{}]", placeholders(self.arg_num)),
            SignatureKind::SubscriptSetter => {
                format!("[{}]=(_)", placeholders(self.arg_num.saturating_sub(1)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(Signature::getter("count").key(), "count");
        assert_eq!(Signature::method("clear", 0).key(), "clear()");
        assert_eq!(Signature::method("+", 1).key(), "+(_)");
        assert_eq!(
            Signature::new(SignatureKind::Construct, "new", 2).key(),
            "new(_,_)"
        );
        assert_eq!(Signature::new(SignatureKind::Setter, "x", 1).key(), "x=(_)");
        assert_eq!(Signature::new(SignatureKind::Subscript, "", 2).key(), "[_,_]");
        assert_eq!(
            Signature::new(SignatureKind::SubscriptSetter, "", 2).key(),
            "[_]=(_)"
        );
    }
}
