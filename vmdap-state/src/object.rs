//! オブジェクトノード

use crate::meta::MetaNode;
use crate::node::{name_eq, StateNode, StructuredState, VariableSerializable};
use crate::runtime::create_node_for_variable;
use std::sync::Arc;
use vmdap_bytecode::demangle_name;
use vmdap_protocol::Variable;
use vmdap_target::{ObjectType, ScriptObject, VirtualMachine};

/// 親クラス部分を指す疑似子の名前
pub const PARENT: &str = "parent";

/// `parent` と衝突したインスタンス変数の表示名
pub const SHADOWED_PARENT: &str = "parent (var)";

/// スクリプトオブジェクト
///
/// 子は、ネイティブフォームの射影、`parent`（親クラスがあれば）、
/// そしてこのクラスが宣言するインスタンス変数の順に並ぶ。
/// `parent` は同じオブジェクトを親クラスとして見たサブビューで、
/// 独自の値表示を持たない。
#[derive(Debug, Clone)]
pub struct ObjectNode {
    pub name: String,
    pub class: Arc<ObjectType>,
    pub object: Option<Arc<ScriptObject>>,
    pub subview: bool,
}

impl ObjectNode {
    /// オブジェクトのノードを作る
    ///
    /// 実体があれば宣言型ではなく実行時の型を使う。
    pub fn new(name: impl Into<String>, class: Arc<ObjectType>, object: Option<Arc<ScriptObject>>) -> Self {
        let class = object.as_ref().map(|o| o.class.clone()).unwrap_or(class);
        Self {
            name: name.into(),
            class,
            object,
            subview: false,
        }
    }

    /// 同じオブジェクトを親クラスとして見たサブビュー
    pub fn parent_view(&self) -> Option<Self> {
        let parent = self.class.parent.clone()?;
        Some(Self {
            name: PARENT.to_string(),
            class: parent,
            object: self.object.clone(),
            subview: true,
        })
    }

    /// インスタンス変数の子としての名前
    ///
    /// 親クラスがある場合、`parent` と同名の変数は別名で出す。
    fn variable_name(&self, declared: &str) -> String {
        let name = demangle_name(declared);
        if self.class.parent.is_some() && name_eq(&name, PARENT) {
            SHADOWED_PARENT.to_string()
        } else {
            name
        }
    }

    /// 表示値
    fn display_value(&self) -> String {
        match &self.object {
            None => "None".to_string(),
            Some(_) if self.subview => self.class.name.clone(),
            Some(object) => format!("{} ({:08x})", self.class.name, object.handle as u32),
        }
    }
}

impl StructuredState for ObjectNode {
    fn child_names(&self, vm: &dyn VirtualMachine) -> Vec<String> {
        let Some(object) = &self.object else {
            return Vec::new();
        };

        let mut names = Vec::new();
        if !self.subview {
            names.extend(vm.form_views(object).into_iter().map(|view| view.type_name));
        }
        if self.class.parent.is_some() {
            names.push(PARENT.to_string());
        }
        names.extend(self.class.variables.iter().map(|v| self.variable_name(&v.name)));
        names
    }

    fn child_node(&self, vm: &dyn VirtualMachine, name: &str) -> Option<StateNode> {
        let object = self.object.as_ref()?;

        if !self.subview {
            if let Some(view) = vm
                .form_views(object)
                .into_iter()
                .find(|view| name_eq(&view.type_name, name))
            {
                return Some(StateNode::Meta(MetaNode::new(view.type_name.clone(), view)));
            }
        }

        if name_eq(name, PARENT) {
            if let Some(parent) = self.parent_view() {
                return Some(StateNode::Object(parent));
            }
        }

        self.class.variables.iter().enumerate().find_map(|(index, decl)| {
            let child = self.variable_name(&decl.name);
            if !name_eq(&child, name) {
                return None;
            }
            let value = object.value_of(&self.class, index)?;
            Some(create_node_for_variable(&child, value))
        })
    }
}

impl VariableSerializable for ObjectNode {
    fn serialize_variable(&self, vm: &dyn VirtualMachine, handle: u32) -> Variable {
        let has_value = self.object.is_some();
        Variable {
            name: self.name.clone(),
            value: self.display_value(),
            type_: Some(self.class.name.clone()),
            variables_reference: if has_value { handle as i64 } else { 0 },
            named_variables: has_value.then(|| self.child_names(vm).len() as i64),
            indexed_variables: None,
        }
    }
}
