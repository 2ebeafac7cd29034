//! ローカルスコープノード

use crate::node::{name_eq, ScopeSerializable, StateNode, StructuredState};
use crate::runtime::create_node_for_variable;
use vmdap_protocol::Scope;
use vmdap_target::{Frame, VirtualMachine};

/// 名前の付いたローカル変数スロットか
///
/// 空の名前と `:` で始まるコンパイラ生成の一時変数は除外する。
fn is_visible_slot(name: &str) -> bool {
    !name.is_empty() && !name.starts_with(':')
}

/// フレームのローカルスコープ
///
/// 子は `self`（静的関数でなければ）と、名前の付いた引数・ローカル変数。
#[derive(Debug, Clone)]
pub struct LocalScopeNode {
    pub frame: Frame,
}

impl LocalScopeNode {
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }
}

impl StructuredState for LocalScopeNode {
    fn child_names(&self, _vm: &dyn VirtualMachine) -> Vec<String> {
        let function = &self.frame.function;
        let mut names = Vec::new();
        if !function.is_static {
            names.push("self".to_string());
        }
        names.extend(
            function
                .slots
                .iter()
                .filter(|slot| is_visible_slot(&slot.name))
                .map(|slot| slot.name.clone()),
        );
        names
    }

    fn child_node(&self, _vm: &dyn VirtualMachine, name: &str) -> Option<StateNode> {
        let function = &self.frame.function;
        if !function.is_static && name_eq(name, "self") {
            return Some(create_node_for_variable("self", &self.frame.self_value));
        }

        let index = function
            .slots
            .iter()
            .position(|slot| is_visible_slot(&slot.name) && name_eq(&slot.name, name))?;
        let value = self.frame.locals.get(index)?;
        Some(create_node_for_variable(&function.slots[index].name, value))
    }
}

impl ScopeSerializable for LocalScopeNode {
    fn serialize_scope(&self, vm: &dyn VirtualMachine, handle: u32) -> Scope {
        Scope {
            name: crate::frame::LOCAL_SCOPE.to_string(),
            variables_reference: handle as i64,
            named_variables: Some(self.child_names(vm).len() as i64),
            indexed_variables: Some(0),
            expensive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vmdap_target::{FrameId, Function, SimVm, TypeInfo, Value, VariableDecl};

    fn frame(is_static: bool) -> Frame {
        let mut func = Function::new("Add");
        func.is_static = is_static;
        func.slots = vec![
            VariableDecl::new("a", TypeInfo::Int),
            VariableDecl::new("::temp0", TypeInfo::Int),
            VariableDecl::new("", TypeInfo::Int),
            VariableDecl::new("Total", TypeInfo::Float),
        ];
        let mut frame = Frame::new(FrameId(1), Arc::new(func), "Calc");
        frame.locals = vec![Value::Int(2), Value::Int(9), Value::None, Value::Float(1.5)];
        frame
    }

    #[test]
    fn test_children_skip_temporaries() {
        let vm = SimVm::new();
        let scope = LocalScopeNode::new(frame(false));
        assert_eq!(scope.child_names(&vm), vec!["self", "a", "Total"]);

        let scope = LocalScopeNode::new(frame(true));
        assert_eq!(scope.child_names(&vm), vec!["a", "Total"]);
        assert!(scope.child_node(&vm, "self").is_none());
    }

    #[test]
    fn test_child_lookup_ignores_case() {
        let vm = SimVm::new();
        let scope = LocalScopeNode::new(frame(false));

        let total = scope.child_node(&vm, "total").unwrap();
        let var = total.as_variable().unwrap().serialize_variable(&vm, 0);
        assert_eq!(var.name, "Total");
        assert_eq!(var.value, "1.500000");

        // self は None なので Null ノード
        let this = scope.child_node(&vm, "SELF").unwrap();
        assert_eq!(this.kind(), "null");

        assert!(scope.child_node(&vm, "::temp0").is_none());
        assert!(scope.child_node(&vm, "missing").is_none());
    }

    #[test]
    fn test_scope_serialization() {
        let vm = SimVm::new();
        let scope = LocalScopeNode::new(frame(false)).serialize_scope(&vm, 15);
        assert_eq!(scope.name, "Local");
        assert_eq!(scope.variables_reference, 15);
        assert_eq!(scope.named_variables, Some(3));
    }
}
