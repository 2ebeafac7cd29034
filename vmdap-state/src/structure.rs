//! 構造体ノード

use crate::node::{name_eq, StateNode, StructuredState, VariableSerializable};
use crate::runtime::create_node_for_variable;
use std::sync::Arc;
use vmdap_protocol::Variable;
use vmdap_target::{ScriptStruct, StructType, VirtualMachine};

/// 構造体インスタンス
#[derive(Debug, Clone)]
pub struct StructNode {
    pub name: String,
    pub ty: Arc<StructType>,
    pub value: Option<Arc<ScriptStruct>>,
}

impl StructNode {
    pub fn new(name: impl Into<String>, ty: Arc<StructType>, value: Option<Arc<ScriptStruct>>) -> Self {
        let ty = value.as_ref().map(|v| v.ty.clone()).unwrap_or(ty);
        Self {
            name: name.into(),
            ty,
            value,
        }
    }
}

impl StructuredState for StructNode {
    fn child_names(&self, _vm: &dyn VirtualMachine) -> Vec<String> {
        if self.value.is_none() {
            return Vec::new();
        }
        self.ty.members.iter().map(|m| m.name.clone()).collect()
    }

    fn child_node(&self, _vm: &dyn VirtualMachine, name: &str) -> Option<StateNode> {
        let value = self.value.as_ref()?;
        let index = self.ty.members.iter().position(|m| name_eq(&m.name, name))?;
        let member = value.values.get(index)?;
        Some(create_node_for_variable(&self.ty.members[index].name, member))
    }
}

impl VariableSerializable for StructNode {
    fn serialize_variable(&self, _vm: &dyn VirtualMachine, handle: u32) -> Variable {
        let has_value = self.value.is_some();
        Variable {
            name: self.name.clone(),
            value: if has_value { self.ty.name.clone() } else { "None".to_string() },
            type_: Some(self.ty.name.clone()),
            variables_reference: if has_value { handle as i64 } else { 0 },
            named_variables: Some(if has_value { self.ty.members.len() as i64 } else { 0 }),
            indexed_variables: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmdap_target::{SimVm, TypeInfo, Value, VariableDecl};

    fn point_type() -> Arc<StructType> {
        Arc::new(StructType {
            name: "Point".to_string(),
            members: vec![
                VariableDecl::new("X", TypeInfo::Float),
                VariableDecl::new("Y", TypeInfo::Float),
            ],
        })
    }

    #[test]
    fn test_struct_members() {
        let vm = SimVm::new();
        let ty = point_type();
        let value = Arc::new(ScriptStruct {
            ty: ty.clone(),
            values: vec![Value::Float(1.0), Value::Float(2.5)],
        });
        let node = StructNode::new("pos", ty, Some(value));

        assert_eq!(node.child_names(&vm), vec!["X", "Y"]);
        let y = node.child_node(&vm, "y").unwrap();
        let var = y.as_variable().unwrap().serialize_variable(&vm, 0);
        assert_eq!((var.name.as_str(), var.value.as_str()), ("Y", "2.500000"));

        let var = node.serialize_variable(&vm, 4);
        assert_eq!(var.value, "Point");
        assert_eq!(var.named_variables, Some(2));
    }

    #[test]
    fn test_null_struct() {
        let vm = SimVm::new();
        let node = StructNode::new("pos", point_type(), None);
        assert!(node.child_names(&vm).is_empty());
        assert_eq!(node.serialize_variable(&vm, 4).value, "None");
        assert_eq!(node.serialize_variable(&vm, 4).variables_reference, 0);
    }
}
