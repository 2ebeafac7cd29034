//! スタックノード

use crate::frame::FrameNode;
use crate::node::{StateNode, StructuredState};
use vmdap_protocol::Thread;
use vmdap_target::{Stack, VirtualMachine};

/// コールスタック（DAP のスレッド）
///
/// 子はフレームの深さ `0..depth`。0 がトップフレーム。
#[derive(Debug, Clone)]
pub struct StackNode {
    pub stack: Stack,
}

impl StackNode {
    pub fn new(stack: Stack) -> Self {
        Self { stack }
    }

    /// スレッドとして表示する
    ///
    /// 名前はトップフレームの所属型とスタックID。フレームがなければIDだけ。
    pub fn serialize_thread(&self) -> Thread {
        let id = self.stack.id.0;
        let name = match self.stack.top() {
            Some(frame) => format!("{} ({})", frame.owning_type, id),
            None => format!("({})", id),
        };
        Thread {
            id: id as i64,
            name,
        }
    }
}

impl StructuredState for StackNode {
    fn child_names(&self, _vm: &dyn VirtualMachine) -> Vec<String> {
        (0..self.stack.frames.len()).map(|i| i.to_string()).collect()
    }

    fn child_node(&self, _vm: &dyn VirtualMachine, name: &str) -> Option<StateNode> {
        let level: usize = name.parse().ok()?;
        let frame = self.stack.frames.get(level)?;
        Some(StateNode::Frame(FrameNode::new(self.stack.id, level, frame.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vmdap_target::{Frame, FrameId, Function, SimVm, StackId};

    #[test]
    fn test_thread_name_uses_top_frame() {
        let mut stack = Stack::new(StackId(12));
        assert_eq!(StackNode::new(stack.clone()).serialize_thread().name, "(12)");

        let func = Arc::new(Function::new("OnInit"));
        stack.frames.push(Frame::new(FrameId(2), func.clone(), "MyQuest"));
        stack.frames.push(Frame::new(FrameId(1), func, "Main"));

        let thread = StackNode::new(stack).serialize_thread();
        assert_eq!(thread.id, 12);
        assert_eq!(thread.name, "MyQuest (12)");
    }

    #[test]
    fn test_frame_children() {
        let vm = SimVm::new();
        let mut stack = Stack::new(StackId(1));
        let func = Arc::new(Function::new("OnInit"));
        stack.frames.push(Frame::new(FrameId(5), func.clone(), "A"));
        stack.frames.push(Frame::new(FrameId(4), func, "B"));
        let node = StackNode::new(stack);

        assert_eq!(node.child_names(&vm), vec!["0", "1"]);
        let frame = node.child_node(&vm, "1").unwrap();
        assert_eq!(frame.as_frame().unwrap().frame.owning_type, "B");

        // 範囲外と数値でない名前は失敗
        assert!(node.child_node(&vm, "2").is_none());
        assert!(node.child_node(&vm, "-1").is_none());
        assert!(node.child_node(&vm, "top").is_none());
    }
}
