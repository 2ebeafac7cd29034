//! 配列ノード

use crate::node::{StateNode, StructuredState, VariableSerializable};
use crate::runtime::create_node_for_variable;
use crate::value::display_type_name;
use std::sync::Arc;
use vmdap_protocol::Variable;
use vmdap_target::{ScriptArray, TypeInfo, VirtualMachine};

/// スクリプト配列
///
/// 子は要素のインデックス `0..len`。
#[derive(Debug, Clone)]
pub struct ArrayNode {
    pub name: String,
    pub element: TypeInfo,
    pub array: Option<Arc<ScriptArray>>,
}

impl ArrayNode {
    pub fn new(name: impl Into<String>, element: TypeInfo, array: Option<Arc<ScriptArray>>) -> Self {
        let element = array.as_ref().map(|a| a.element.clone()).unwrap_or(element);
        Self {
            name: name.into(),
            element,
            array,
        }
    }

    pub fn len(&self) -> usize {
        self.array.as_ref().map(|a| a.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StructuredState for ArrayNode {
    fn child_names(&self, _vm: &dyn VirtualMachine) -> Vec<String> {
        (0..self.len()).map(|i| i.to_string()).collect()
    }

    fn child_node(&self, _vm: &dyn VirtualMachine, name: &str) -> Option<StateNode> {
        let array = self.array.as_ref()?;
        let index: usize = name.parse().ok()?;
        let value = array.values.get(index)?;
        Some(create_node_for_variable(&index.to_string(), value))
    }
}

impl VariableSerializable for ArrayNode {
    fn serialize_variable(&self, _vm: &dyn VirtualMachine, handle: u32) -> Variable {
        let element = display_type_name(&self.element);
        let value = match &self.array {
            Some(array) => format!("{}[{}]", element, array.values.len()),
            None => "None".to_string(),
        };
        Variable {
            name: self.name.clone(),
            value,
            type_: Some(format!("{}[]", element)),
            variables_reference: if self.array.is_some() { handle as i64 } else { 0 },
            named_variables: None,
            indexed_variables: Some(self.len() as i64),
        }
    }
}
