//! スカラー値ノードと Null ノード

use crate::node::VariableSerializable;
use vmdap_protocol::Variable;
use vmdap_target::{TypeInfo, Value, VirtualMachine};

/// 表示用の型名（スカラーは小文字、オブジェクト・構造体は型名そのまま）
pub(crate) fn display_type_name(type_info: &TypeInfo) -> String {
    match type_info {
        TypeInfo::Object(name) | TypeInfo::Struct(name) => name.clone(),
        other => other.name().to_lowercase(),
    }
}

/// 子を持たない値のための Variable を作る
pub(crate) fn leaf_variable(name: &str, value: String, type_: Option<String>) -> Variable {
    Variable {
        name: name.to_string(),
        value,
        type_,
        variables_reference: 0,
        named_variables: None,
        indexed_variables: None,
    }
}

/// スカラー値（bool / int / float / string）
#[derive(Debug, Clone)]
pub struct ValueNode {
    pub name: String,
    pub value: Value,
}

impl ValueNode {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// 型名と表示値
    fn describe(&self) -> (&'static str, String) {
        match &self.value {
            Value::Bool(b) => ("bool", b.to_string()),
            Value::Int(i) => ("int", i.to_string()),
            Value::Float(f) => ("float", format!("{:.6}", f)),
            Value::String(s) => ("string", format!("\"{}\"", s)),
            _ => ("none", "None".to_string()),
        }
    }
}

impl VariableSerializable for ValueNode {
    fn serialize_variable(&self, _vm: &dyn VirtualMachine, _handle: u32) -> Variable {
        let (type_name, value) = self.describe();
        leaf_variable(&self.name, value, Some(type_name.to_string()))
    }
}

/// 値を持たない変数
#[derive(Debug, Clone)]
pub struct NullNode {
    pub name: String,
}

impl NullNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl VariableSerializable for NullNode {
    fn serialize_variable(&self, _vm: &dyn VirtualMachine, _handle: u32) -> Variable {
        leaf_variable(&self.name, "None".to_string(), None)
    }
}
