//! 状態ツリーのエラー

use thiserror::Error;

/// パスやハンドルの解決に失敗した理由
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("empty path")]
    EmptyPath,

    #[error("invalid stack id: {0:?}")]
    InvalidStackId(String),

    #[error("stack {0} not found")]
    StackNotFound(u32),

    #[error("no child {name:?} under {path:?}")]
    ChildNotFound { path: String, name: String },

    #[error("{0:?} has no children")]
    NotStructured(String),

    #[error("unknown handle {0}")]
    UnknownHandle(u32),
}
