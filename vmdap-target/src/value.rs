//! スクリプト値と型

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 変数・配列要素の宣言型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum TypeInfo {
    None,
    Bool,
    Int,
    Float,
    String,
    /// どの型でも入る `Var`
    Var,
    Object(String),
    Struct(String),
}

impl TypeInfo {
    /// 表示用の型名
    pub fn name(&self) -> &str {
        match self {
            TypeInfo::None => "None",
            TypeInfo::Bool => "Bool",
            TypeInfo::Int => "Int",
            TypeInfo::Float => "Float",
            TypeInfo::String => "String",
            TypeInfo::Var => "Var",
            TypeInfo::Object(name) | TypeInfo::Struct(name) => name,
        }
    }
}

/// 名前付きの変数宣言
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_info: TypeInfo,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, type_info: TypeInfo) -> Self {
        Self {
            name: name.into(),
            type_info,
        }
    }
}

/// スクリプトのオブジェクト型（クラス）
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub name: String,
    pub parent: Option<Arc<ObjectType>>,
    /// この型自身が宣言するインスタンス変数（親の分は含まない）
    pub variables: Vec<VariableDecl>,
}

impl ObjectType {
    pub fn new(name: impl Into<String>, parent: Option<Arc<ObjectType>>) -> Self {
        Self {
            name: name.into(),
            parent,
            variables: Vec::new(),
        }
    }

    /// 変数宣言を追加する
    pub fn with_variable(mut self, name: impl Into<String>, type_info: TypeInfo) -> Self {
        self.variables.push(VariableDecl::new(name, type_info));
        self
    }

    /// 祖先を含む全変数の数
    pub fn total_variable_count(&self) -> usize {
        self.variable_offset() + self.variables.len()
    }

    /// オブジェクトの値配列の中で、この型の変数が始まる位置
    ///
    /// 値配列は祖先の変数から順に並ぶ。
    pub fn variable_offset(&self) -> usize {
        self.parent
            .as_ref()
            .map(|p| p.total_variable_count())
            .unwrap_or(0)
    }
}

/// 生きているスクリプトオブジェクト
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptObject {
    /// エンジン側のハンドル
    pub handle: u64,
    pub class: Arc<ObjectType>,
    /// 祖先から順に並んだインスタンス変数の値
    pub values: Vec<Value>,
}

impl ScriptObject {
    /// 全変数を None で初期化したオブジェクトを作成する
    pub fn new(handle: u64, class: Arc<ObjectType>) -> Self {
        let values = vec![Value::None; class.total_variable_count()];
        Self {
            handle,
            class,
            values,
        }
    }

    /// `class` が宣言する `index` 番目の変数の値を取得する
    pub fn value_of(&self, class: &ObjectType, index: usize) -> Option<&Value> {
        self.values.get(class.variable_offset() + index)
    }
}

/// スクリプト配列
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptArray {
    pub element: TypeInfo,
    pub values: Vec<Value>,
}

/// 構造体型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub name: String,
    pub members: Vec<VariableDecl>,
}

/// 構造体インスタンス
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStruct {
    pub ty: Arc<StructType>,
    pub values: Vec<Value>,
}

/// エンジン固有のネイティブ型の射影
///
/// オブジェクトにバインドされたネイティブフォーム（例: Actor, Quest）の
/// 反映情報をメンバーの一覧として表す。
#[derive(Debug, Clone, PartialEq)]
pub struct FormView {
    pub type_name: String,
    pub members: Vec<(String, Value)>,
}

/// VM 上の値
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i32),
    Float(f32),
    String(String),
    Object {
        class: Arc<ObjectType>,
        object: Option<Arc<ScriptObject>>,
    },
    Array {
        element: TypeInfo,
        array: Option<Arc<ScriptArray>>,
    },
    Struct {
        ty: Arc<StructType>,
        value: Option<Arc<ScriptStruct>>,
    },
    /// `Var` 型の変数に格納された値
    Var(Box<Value>),
}

impl Value {
    /// オブジェクト値を作成する
    pub fn object(object: Arc<ScriptObject>) -> Self {
        Value::Object {
            class: object.class.clone(),
            object: Some(object),
        }
    }

    /// 配列値を作成する
    pub fn array(element: TypeInfo, values: Vec<Value>) -> Self {
        Value::Array {
            element: element.clone(),
            array: Some(Arc::new(ScriptArray { element, values })),
        }
    }

    /// 値が null 参照かどうか
    pub fn is_null(&self) -> bool {
        match self {
            Value::None => true,
            Value::Object { object, .. } => object.is_none(),
            Value::Array { array, .. } => array.is_none(),
            Value::Struct { value, .. } => value.is_none(),
            Value::Var(inner) => inner.is_null(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_offset_follows_ancestors() {
        let form = Arc::new(ObjectType::new("Form", None).with_variable("id", TypeInfo::Int));
        let quest = Arc::new(
            ObjectType::new("Quest", Some(form.clone()))
                .with_variable("stage", TypeInfo::Int)
                .with_variable("title", TypeInfo::String),
        );
        let my = ObjectType::new("MyQuest", Some(quest.clone())).with_variable("count", TypeInfo::Int);

        assert_eq!(form.variable_offset(), 0);
        assert_eq!(quest.variable_offset(), 1);
        assert_eq!(my.variable_offset(), 3);
        assert_eq!(my.total_variable_count(), 4);
    }

    #[test]
    fn test_value_of_reads_class_slice() {
        let base = Arc::new(ObjectType::new("Base", None).with_variable("a", TypeInfo::Int));
        let child = Arc::new(ObjectType::new("Child", Some(base.clone())).with_variable("b", TypeInfo::Int));

        let mut obj = ScriptObject::new(0x1234, child.clone());
        obj.values[0] = Value::Int(1);
        obj.values[1] = Value::Int(2);

        assert_eq!(obj.value_of(&base, 0), Some(&Value::Int(1)));
        assert_eq!(obj.value_of(&child, 0), Some(&Value::Int(2)));
        assert_eq!(obj.value_of(&child, 1), None);
    }

    #[test]
    fn test_null_values() {
        let class = Arc::new(ObjectType::new("Actor", None));
        assert!(Value::None.is_null());
        assert!(Value::Object { class, object: None }.is_null());
        assert!(Value::Var(Box::new(Value::None)).is_null());
        assert!(!Value::Int(0).is_null());
    }
}
