//! パスとハンドルによる状態の解決

use crate::array::ArrayNode;
use crate::error::StateError;
use crate::ids::HandleAllocator;
use crate::node::{ResolvedNode, StateNode};
use crate::object::ObjectNode;
use crate::path_table::PathTable;
use crate::stack::StackNode;
use crate::structure::StructNode;
use crate::value::{NullNode, ValueNode};
use crate::Result;
use std::sync::Arc;
use vmdap_target::{StackId, Value, VirtualMachine};

/// VM の値からノードを作る
///
/// VM の値がツリーに入るのは必ずここを通る。
pub fn create_node_for_variable(name: &str, value: &Value) -> StateNode {
    match value {
        Value::Object { class, object } => {
            StateNode::Object(ObjectNode::new(name, class.clone(), object.clone()))
        }
        Value::Array { element, array } => {
            StateNode::Array(ArrayNode::new(name, element.clone(), array.clone()))
        }
        Value::Struct { ty, value } => {
            StateNode::Struct(StructNode::new(name, ty.clone(), value.clone()))
        }
        Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => {
            StateNode::Value(ValueNode::new(name, value.clone()))
        }
        Value::Var(inner) => create_node_for_variable(name, inner),
        Value::None => StateNode::Null(NullNode::new(name)),
    }
}

/// 実行時状態の解決器
///
/// パスは `スタックID.フレーム深さ.スコープ.変数...` の形をとる（例: `1042.0.local.self`）。
/// 解決のたびに VM からノードを作り直し、ハンドルとパスの対応だけを保持する。
/// 呼び出し側は VM の実行中スタックのロックを保持していなければならない。
pub struct RuntimeState {
    paths: PathTable,
}

impl RuntimeState {
    pub fn new(ids: Arc<HandleAllocator>) -> Self {
        Self {
            paths: PathTable::new(ids),
        }
    }

    /// ハンドルとパスの対応表
    pub fn paths(&self) -> &PathTable {
        &self.paths
    }

    /// パスからノードを解決する
    ///
    /// 途中で辿った構造化ノードについては、降りる先だけでなく全ての子にハンドルを登録する。
    /// これにより、兄弟ノードのハンドルが後から直接使えるようになる。
    /// スタックだけのパスはスタックIDそのものをハンドルとする。
    pub fn resolve_by_path(&self, vm: &dyn VirtualMachine, path: &str) -> Result<ResolvedNode> {
        let path = path.to_lowercase();
        let mut elements = path.split('.');

        let stack_element = elements
            .next()
            .filter(|e| !e.is_empty())
            .ok_or(StateError::EmptyPath)?;
        let stack_id: u32 = stack_element
            .parse()
            .map_err(|_| StateError::InvalidStackId(stack_element.to_string()))?;
        let stack = vm
            .stack(StackId(stack_id))
            .ok_or(StateError::StackNotFound(stack_id))?;

        let mut current = StateNode::Stack(StackNode::new(stack));
        let mut current_path = stack_element.to_string();
        let mut depth = 1;

        for name in elements {
            let next = {
                let structured = current
                    .as_structured()
                    .ok_or_else(|| StateError::NotStructured(current_path.clone()))?;

                for child in structured.child_names(vm) {
                    self.paths
                        .add_or_get(&format!("{}.{}", current_path, child.to_lowercase()));
                }

                structured
                    .child_node(vm, name)
                    .ok_or_else(|| StateError::ChildNotFound {
                        path: current_path.clone(),
                        name: name.to_string(),
                    })?
            };

            current = next;
            current_path.push('.');
            current_path.push_str(name);
            depth += 1;
        }

        let handle = if depth == 1 {
            stack_id
        } else {
            self.paths.add_or_get(&path)
        };
        tracing::debug!("resolved {} -> {} ({})", path, handle, current.kind());

        Ok(ResolvedNode {
            handle,
            path,
            node: current,
        })
    }

    /// ハンドルからノードを解決する
    pub fn resolve_by_handle(&self, vm: &dyn VirtualMachine, handle: u32) -> Result<ResolvedNode> {
        let path = self
            .paths
            .path_for(handle)
            .ok_or(StateError::UnknownHandle(handle))?;
        self.resolve_by_path(vm, &path)
    }

    /// パスが指すノードの子をすべて解決する
    ///
    /// 個々の子の解決に失敗したものは結果から除く。
    pub fn resolve_children_by_path(
        &self,
        vm: &dyn VirtualMachine,
        path: &str,
    ) -> Result<Vec<ResolvedNode>> {
        let parent = self.resolve_by_path(vm, path)?;
        let structured = parent
            .node
            .as_structured()
            .ok_or_else(|| StateError::NotStructured(parent.path.clone()))?;

        let children = structured
            .child_names(vm)
            .into_iter()
            .filter_map(|name| {
                let child_path = format!("{}.{}", parent.path, name);
                match self.resolve_by_path(vm, &child_path) {
                    Ok(node) => Some(node),
                    Err(err) => {
                        tracing::debug!("skipping child {}: {}", child_path, err);
                        None
                    }
                }
            })
            .collect();
        Ok(children)
    }

    /// ハンドルが指すノードの子をすべて解決する
    pub fn resolve_children_by_handle(
        &self,
        vm: &dyn VirtualMachine,
        handle: u32,
    ) -> Result<Vec<ResolvedNode>> {
        let path = self
            .paths
            .path_for(handle)
            .ok_or(StateError::UnknownHandle(handle))?;
        self.resolve_children_by_path(vm, &path)
    }
}
