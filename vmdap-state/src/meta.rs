//! ネイティブフォーム射影ノード

use crate::node::{name_eq, StateNode, StructuredState, VariableSerializable};
use crate::runtime::create_node_for_variable;
use vmdap_protocol::Variable;
use vmdap_target::{FormView, VirtualMachine};

/// オブジェクトにバインドされたネイティブ型の反映情報
#[derive(Debug, Clone)]
pub struct MetaNode {
    pub name: String,
    pub view: FormView,
}

impl MetaNode {
    pub fn new(name: impl Into<String>, view: FormView) -> Self {
        Self {
            name: name.into(),
            view,
        }
    }
}

impl StructuredState for MetaNode {
    fn child_names(&self, _vm: &dyn VirtualMachine) -> Vec<String> {
        self.view.members.iter().map(|(name, _)| name.clone()).collect()
    }

    fn child_node(&self, _vm: &dyn VirtualMachine, name: &str) -> Option<StateNode> {
        self.view
            .members
            .iter()
            .find(|(member, _)| name_eq(member, name))
            .map(|(member, value)| create_node_for_variable(member, value))
    }
}

impl VariableSerializable for MetaNode {
    fn serialize_variable(&self, _vm: &dyn VirtualMachine, handle: u32) -> Variable {
        Variable {
            name: self.name.clone(),
            value: self.view.type_name.clone(),
            type_: Some(self.view.type_name.clone()),
            variables_reference: handle as i64,
            named_variables: Some(self.view.members.len() as i64),
            indexed_variables: None,
        }
    }
}
