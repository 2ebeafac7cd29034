//! コールスタックとフレーム

use crate::value::{Value, VariableDecl};
use std::sync::Arc;

/// スタックID（DAP のスレッドIDとしても使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackId(pub u32);

/// フレームの同一性
///
/// 同じ関数の再帰呼び出しでも活性化ごとに異なる値を持つ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u64);

/// スクリプト関数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    /// 所属するステート名（空文字は既定ステート）
    pub state: String,
    pub is_native: bool,
    pub is_static: bool,
    /// 引数とローカル変数のスロット
    pub slots: Vec<VariableDecl>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: String::new(),
            is_native: false,
            is_static: false,
            slots: Vec::new(),
        }
    }
}

/// 関数の活性化 1 つ分
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: FrameId,
    pub function: Arc<Function>,
    /// 関数を定義しているスクリプト（オブジェクト型）名
    pub owning_type: String,
    /// 現在の命令インデックス
    pub ip: u32,
    pub self_value: Value,
    /// `function.slots` と同じ並びの値
    pub locals: Vec<Value>,
}

impl Frame {
    /// スロットを None で埋めたフレームを作成する
    pub fn new(id: FrameId, function: Arc<Function>, owning_type: impl Into<String>) -> Self {
        let locals = vec![Value::None; function.slots.len()];
        Self {
            id,
            function,
            owning_type: owning_type.into(),
            ip: 0,
            self_value: Value::None,
            locals,
        }
    }
}

/// コールスタック
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    pub id: StackId,
    /// 先頭がトップフレーム
    pub frames: Vec<Frame>,
}

impl Stack {
    pub fn new(id: StackId) -> Self {
        Self {
            id,
            frames: Vec::new(),
        }
    }

    /// トップフレームを取得する
    pub fn top(&self) -> Option<&Frame> {
        self.frames.first()
    }

    /// フレームの位置を探す（0 がトップ）
    pub fn frame_index(&self, id: FrameId) -> Option<usize> {
        self.frames.iter().position(|f| f.id == id)
    }
}

/// 命令実行通知の単位
///
/// VM が命令を実行するたびに、実行中のスタックのスナップショットとして渡される。
#[derive(Debug, Clone)]
pub struct Tasklet {
    pub stack: Stack,
}

impl Tasklet {
    /// トップフレームを取得する
    pub fn top_frame(&self) -> Option<&Frame> {
        self.stack.top()
    }
}
