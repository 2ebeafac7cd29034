//! フレームノード

use crate::node::{name_eq, StateNode, StructuredState};
use crate::scope::LocalScopeNode;
use vmdap_bytecode::BytecodeCache;
use vmdap_protocol::{Source, StackFrame};
use vmdap_target::{Frame, StackId, VirtualMachine};

/// ローカルスコープの名前
pub const LOCAL_SCOPE: &str = "Local";

/// スタックフレーム
///
/// ネイティブ関数でなければ、唯一の子として `Local` スコープを持つ。
#[derive(Debug, Clone)]
pub struct FrameNode {
    pub stack_id: StackId,
    pub level: usize,
    pub frame: Frame,
}

impl FrameNode {
    pub fn new(stack_id: StackId, level: usize, frame: Frame) -> Self {
        Self {
            stack_id,
            level,
            frame,
        }
    }

    /// 表示名（ステートがあれば `関数 (ステート)`）
    pub fn display_name(&self) -> String {
        let function = &self.frame.function;
        if function.state.is_empty() {
            function.name.clone()
        } else {
            format!("{} ({})", function.name, function.state)
        }
    }

    /// スタックフレームとして表示する
    ///
    /// ソースと行番号は所属スクリプトのバイナリが手に入る場合だけ埋める。
    pub fn serialize_stack_frame(&self, handle: u32, cache: &BytecodeCache) -> StackFrame {
        let mut source = None;
        let mut line = 0;

        if let Some(data) = cache.get_source_data(&self.frame.owning_type) {
            if let Some(binary) = cache.get_script(&data.name) {
                let function = &self.frame.function;
                line = binary
                    .find_function(&function.state, &function.name)
                    .and_then(|index| binary.line_for(index, self.frame.ip))
                    .unwrap_or(0);
            }
            source = Some(Source {
                name: Some(data.name),
                path: Some(data.path),
                source_reference: Some(data.reference),
            });
        }

        StackFrame {
            id: handle as i64,
            name: self.display_name(),
            source,
            line: line as i64,
            column: 0,
        }
    }
}

impl StructuredState for FrameNode {
    fn child_names(&self, _vm: &dyn VirtualMachine) -> Vec<String> {
        if self.frame.function.is_native {
            Vec::new()
        } else {
            vec![LOCAL_SCOPE.to_string()]
        }
    }

    fn child_node(&self, _vm: &dyn VirtualMachine, name: &str) -> Option<StateNode> {
        if self.frame.function.is_native || !name_eq(name, LOCAL_SCOPE) {
            return None;
        }
        Some(StateNode::Scope(LocalScopeNode::new(self.frame.clone())))
    }
}
