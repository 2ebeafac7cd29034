//! 状態ノード
//!
//! ノードの種類は閉じた集合なので enum で表し、能力ごとのトレイトを
//! `as_structured` / `as_variable` / `as_scope` で取り出す。

use crate::array::ArrayNode;
use crate::frame::FrameNode;
use crate::meta::MetaNode;
use crate::object::ObjectNode;
use crate::scope::LocalScopeNode;
use crate::stack::StackNode;
use crate::structure::StructNode;
use crate::value::{NullNode, ValueNode};
use vmdap_protocol::{Scope, Variable};
use vmdap_target::VirtualMachine;

/// 子を持つノード
pub trait StructuredState {
    /// 子の名前一覧（表示順）
    fn child_names(&self, vm: &dyn VirtualMachine) -> Vec<String>;

    /// 名前から子ノードを作る（大文字小文字を区別しない）
    fn child_node(&self, vm: &dyn VirtualMachine, name: &str) -> Option<StateNode>;
}

/// DAP の Variable として表示できるノード
pub trait VariableSerializable {
    /// `handle` はこのノードに割り当てられたハンドル
    fn serialize_variable(&self, vm: &dyn VirtualMachine, handle: u32) -> Variable;
}

/// DAP の Scope として表示できるノード
pub trait ScopeSerializable {
    fn serialize_scope(&self, vm: &dyn VirtualMachine, handle: u32) -> Scope;
}

/// 状態ツリーのノード
#[derive(Debug, Clone)]
pub enum StateNode {
    Stack(StackNode),
    Frame(FrameNode),
    Scope(LocalScopeNode),
    Object(ObjectNode),
    Array(ArrayNode),
    Struct(StructNode),
    Value(ValueNode),
    Meta(MetaNode),
    Null(NullNode),
}

impl StateNode {
    /// 子を持つ能力
    pub fn as_structured(&self) -> Option<&dyn StructuredState> {
        match self {
            StateNode::Stack(node) => Some(node),
            StateNode::Frame(node) => Some(node),
            StateNode::Scope(node) => Some(node),
            StateNode::Object(node) => Some(node),
            StateNode::Array(node) => Some(node),
            StateNode::Struct(node) => Some(node),
            StateNode::Meta(node) => Some(node),
            StateNode::Value(_) | StateNode::Null(_) => None,
        }
    }

    /// Variable として表示する能力
    pub fn as_variable(&self) -> Option<&dyn VariableSerializable> {
        match self {
            StateNode::Object(node) => Some(node),
            StateNode::Array(node) => Some(node),
            StateNode::Struct(node) => Some(node),
            StateNode::Value(node) => Some(node),
            StateNode::Meta(node) => Some(node),
            StateNode::Null(node) => Some(node),
            StateNode::Stack(_) | StateNode::Frame(_) | StateNode::Scope(_) => None,
        }
    }

    /// Scope として表示する能力
    pub fn as_scope(&self) -> Option<&dyn ScopeSerializable> {
        match self {
            StateNode::Scope(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_stack(&self) -> Option<&StackNode> {
        match self {
            StateNode::Stack(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_frame(&self) -> Option<&FrameNode> {
        match self {
            StateNode::Frame(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            StateNode::Object(node) => Some(node),
            _ => None,
        }
    }

    /// ノードの種類名（ログ用）
    pub fn kind(&self) -> &'static str {
        match self {
            StateNode::Stack(_) => "stack",
            StateNode::Frame(_) => "frame",
            StateNode::Scope(_) => "scope",
            StateNode::Object(_) => "object",
            StateNode::Array(_) => "array",
            StateNode::Struct(_) => "struct",
            StateNode::Value(_) => "value",
            StateNode::Meta(_) => "meta",
            StateNode::Null(_) => "null",
        }
    }
}

/// ハンドルとパスが確定したノード
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    pub handle: u32,
    pub path: String,
    pub node: StateNode,
}

impl ResolvedNode {
    /// Variable として表示する（表示できない種類なら `None`）
    pub fn to_variable(&self, vm: &dyn VirtualMachine) -> Option<Variable> {
        self.node
            .as_variable()
            .map(|node| node.serialize_variable(vm, self.handle))
    }

    /// Scope として表示する（表示できない種類なら `None`）
    pub fn to_scope(&self, vm: &dyn VirtualMachine) -> Option<Scope> {
        self.node
            .as_scope()
            .map(|node| node.serialize_scope(vm, self.handle))
    }
}

/// 名前の比較（大文字小文字を区別しない）
pub(crate) fn name_eq(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
