//! 指令集
//!
//! 每条指令 1 字节操作码 + 0/1/2 字节大端操作数。
//! `CREATE_CLOSURE` 额外为每个 upvalue 追加 2 字节 {是否外层局部变量, 索引}，
//! `SUPERn` 在方法符号之后再跟 2 字节父类常量索引。

use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    LoadConstant = 0,
    PushNull,
    PushFalse,
    PushTrue,
    LoadLocalVar,
    StoreLocalVar,
    LoadUpvalue,
    StoreUpvalue,
    LoadModuleVar,
    StoreModuleVar,
    LoadThisField,
    StoreThisField,
    LoadField,
    StoreField,
    Pop,
    Call0,
    Call1,
    Call2,
    Call3,
    Call4,
    Call5,
    Call6,
    Call7,
    Call8,
    Call9,
    Call10,
    Call11,
    Call12,
    Call13,
    Call14,
    Call15,
    Call16,
    Super0,
    Super1,
    Super2,
    Super3,
    Super4,
    Super5,
    Super6,
    Super7,
    Super8,
    Super9,
    Super10,
    Super11,
    Super12,
    Super13,
    Super14,
    Super15,
    Super16,
    Jump,
    Loop,
    JumpIfFalse,
    And,
    Or,
    CloseUpvalue,
    Return,
    CreateClosure,
    Construct,
    CreateClass,
    InstanceMethod,
    StaticMethod,
    /// 函数结尾标记；编译循环时兼作 break 的占位跳转
    End,
}

const ALL: [OpCode; 62] = [
    OpCode::LoadConstant,
    OpCode::PushNull,
    OpCode::PushFalse,
    OpCode::PushTrue,
    OpCode::LoadLocalVar,
    OpCode::StoreLocalVar,
    OpCode::LoadUpvalue,
    OpCode::StoreUpvalue,
    OpCode::LoadModuleVar,
    OpCode::StoreModuleVar,
    OpCode::LoadThisField,
    OpCode::StoreThisField,
    OpCode::LoadField,
    OpCode::StoreField,
    OpCode::Pop,
    OpCode::Call0,
    OpCode::Call1,
    OpCode::Call2,
    OpCode::Call3,
    OpCode::Call4,
    OpCode::Call5,
    OpCode::Call6,
    OpCode::Call7,
    OpCode::Call8,
    OpCode::Call9,
    OpCode::Call10,
    OpCode::Call11,
    OpCode::Call12,
    OpCode::Call13,
    OpCode::Call14,
    OpCode::Call15,
    OpCode::Call16,
    OpCode::Super0,
    OpCode::Super1,
    OpCode::Super2,
    OpCode::Super3,
    OpCode::Super4,
    OpCode::Super5,
    OpCode::Super6,
    OpCode::Super7,
    OpCode::Super8,
    OpCode::Super9,
    OpCode::Super10,
    OpCode::Super11,
    OpCode::Super12,
    OpCode::Super13,
    OpCode::Super14,
    OpCode::Super15,
    OpCode::Super16,
    OpCode::Jump,
    OpCode::Loop,
    OpCode::JumpIfFalse,
    OpCode::And,
    OpCode::Or,
    OpCode::CloseUpvalue,
    OpCode::Return,
    OpCode::CreateClosure,
    OpCode::Construct,
    OpCode::CreateClass,
    OpCode::InstanceMethod,
    OpCode::StaticMethod,
    OpCode::End,
];

impl OpCode {
    pub fn from_u8(byte: u8) -> Option<OpCode> {
        ALL.get(byte as usize).copied()
    }

    /// `CALLn`：参数个数为 n 的调用
    pub fn call(arg_num: usize) -> Option<OpCode> {
        if arg_num > 16 {
            return None;
        }
        Self::from_u8(OpCode::Call0 as u8 + arg_num as u8)
    }

    pub fn super_call(arg_num: usize) -> Option<OpCode> {
        if arg_num > 16 {
            return None;
        }
        Self::from_u8(OpCode::Super0 as u8 + arg_num as u8)
    }

    /// CALLn / SUPERn 的参数个数（不含接收者）
    pub fn call_arg_num(self) -> Option<usize> {
        let byte = self as u8;
        if (OpCode::Call0 as u8..=OpCode::Call16 as u8).contains(&byte) {
            Some((byte - OpCode::Call0 as u8) as usize)
        } else if (OpCode::Super0 as u8..=OpCode::Super16 as u8).contains(&byte) {
            Some((byte - OpCode::Super0 as u8) as usize)
        } else {
            None
        }
    }

    pub fn is_super(self) -> bool {
        (OpCode::Super0 as u8..=OpCode::Super16 as u8).contains(&(self as u8))
    }

    /// 静态栈效果，编译器据此计算最大栈深度
    pub fn stack_effect(self) -> i32 {
        if let Some(n) = self.call_arg_num() {
            return -(n as i32);
        }
        match self {
            OpCode::LoadConstant
            | OpCode::PushNull
            | OpCode::PushFalse
            | OpCode::PushTrue
            | OpCode::LoadLocalVar
            | OpCode::LoadUpvalue
            | OpCode::LoadModuleVar
            | OpCode::LoadThisField
            | OpCode::CreateClosure => 1,
            OpCode::StoreLocalVar
            | OpCode::StoreUpvalue
            | OpCode::StoreModuleVar
            | OpCode::StoreThisField
            | OpCode::LoadField
            | OpCode::Jump
            | OpCode::Loop
            | OpCode::Return
            | OpCode::Construct
            | OpCode::End => 0,
            OpCode::StoreField
            | OpCode::Pop
            | OpCode::JumpIfFalse
            | OpCode::And
            | OpCode::Or
            | OpCode::CloseUpvalue
            | OpCode::CreateClass => -1,
            OpCode::InstanceMethod | OpCode::StaticMethod => -2,
            _ => 0,
        }
    }

    /// 操作数字节数；`operand_start` 指向第一个操作数字节
    pub fn operand_bytes(self, code: &[u8], operand_start: usize, constants: &[Value]) -> usize {
        if self.is_super() {
            return 4;
        }
        if self.call_arg_num().is_some() {
            return 2;
        }
        match self {
            OpCode::PushNull
            | OpCode::PushFalse
            | OpCode::PushTrue
            | OpCode::Pop
            | OpCode::CloseUpvalue
            | OpCode::Return
            | OpCode::Construct
            | OpCode::End => 0,
            OpCode::LoadLocalVar
            | OpCode::StoreLocalVar
            | OpCode::LoadUpvalue
            | OpCode::StoreUpvalue
            | OpCode::LoadThisField
            | OpCode::StoreThisField
            | OpCode::LoadField
            | OpCode::StoreField
            | OpCode::CreateClass => 1,
            OpCode::CreateClosure => {
                let index = read_u16(code, operand_start) as usize;
                let upvalue_num = constants
                    .get(index)
                    .and_then(Value::as_fn)
                    .map(|f| f.upvalue_num)
                    .unwrap_or(0);
                2 + upvalue_num * 2
            }
            _ => 2,
        }
    }

    pub fn name(self) -> String {
        if let Some(n) = self.call_arg_num() {
            return if self.is_super() {
                format!("SUPER{}", n)
            } else {
                format!("CALL{}", n)
            };
        }
        let name = match self {
            OpCode::LoadConstant => "LOAD_CONSTANT",
            OpCode::PushNull => "PUSH_NULL",
            OpCode::PushFalse => "PUSH_FALSE",
            OpCode::PushTrue => "PUSH_TRUE",
            OpCode::LoadLocalVar => "LOAD_LOCAL_VAR",
            OpCode::StoreLocalVar => "STORE_LOCAL_VAR",
            OpCode::LoadUpvalue => "LOAD_UPVALUE",
            OpCode::StoreUpvalue => "STORE_UPVALUE",
            OpCode::LoadModuleVar => "LOAD_MODULE_VAR",
            OpCode::StoreModuleVar => "STORE_MODULE_VAR",
            OpCode::LoadThisField => "LOAD_THIS_FIELD",
            OpCode::StoreThisField => "STORE_THIS_FIELD",
            OpCode::LoadField => "LOAD_FIELD",
            OpCode::StoreField => "STORE_FIELD",
            OpCode::Pop => "POP",
            OpCode::Jump => "JUMP",
            OpCode::Loop => "LOOP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::CloseUpvalue => "CLOSE_UPVALUE",
            OpCode::Return => "RETURN",
            OpCode::CreateClosure => "CREATE_CLOSURE",
            OpCode::Construct => "CONSTRUCT",
            OpCode::CreateClass => "CREATE_CLASS",
            OpCode::InstanceMethod => "INSTANCE_METHOD",
            OpCode::StaticMethod => "STATIC_METHOD",
            OpCode::End => "END",
            _ => "UNKNOWN",
        };
        name.to_string()
    }
}

/// 读取大端 u16
pub fn read_u16(code: &[u8], at: usize) -> u16 {
    let hi = code.get(at).copied().unwrap_or(0) as u16;
    let lo = code.get(at + 1).copied().unwrap_or(0) as u16;
    (hi << 8) | lo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_byte() {
        for byte in 0..=OpCode::End as u8 {
            let op = OpCode::from_u8(byte).unwrap();
            assert_eq!(op as u8, byte);
        }
        assert_eq!(OpCode::from_u8(OpCode::End as u8 + 1), None);
    }

    #[test]
    fn test_call_family() {
        assert_eq!(OpCode::call(2), Some(OpCode::Call2));
        assert_eq!(OpCode::super_call(16), Some(OpCode::Super16));
        assert_eq!(OpCode::call(17), None);
        assert_eq!(OpCode::Call3.stack_effect(), -3);
        assert_eq!(OpCode::Super1.stack_effect(), -1);
        assert_eq!(OpCode::Call5.name(), "CALL5");
        assert!(OpCode::Super0.is_super());
    }

    #[test]
    fn test_stack_effects() {
        assert_eq!(OpCode::LoadConstant.stack_effect(), 1);
        assert_eq!(OpCode::StoreField.stack_effect(), -1);
        assert_eq!(OpCode::InstanceMethod.stack_effect(), -2);
        assert_eq!(OpCode::CreateClass.stack_effect(), -1);
        assert_eq!(OpCode::LoadField.stack_effect(), 0);
    }

    #[test]
    fn test_operand_bytes() {
        assert_eq!(OpCode::Pop.operand_bytes(&[], 0, &[]), 0);
        assert_eq!(OpCode::LoadLocalVar.operand_bytes(&[], 0, &[]), 1);
        assert_eq!(OpCode::Jump.operand_bytes(&[], 0, &[]), 2);
        assert_eq!(OpCode::Super2.operand_bytes(&[], 0, &[]), 4);
    }

    #[test]
    fn test_read_u16_big_endian() {
        assert_eq!(read_u16(&[0x12, 0x34], 0), 0x1234);
    }
}
