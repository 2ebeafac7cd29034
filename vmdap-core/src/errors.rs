//! デバッガのエラー
//!
//! いずれもプロセスにとって致命的ではなく、クライアントにはエラー応答として返す。

use thiserror::Error;
use vmdap_state::StateError;

/// デバッガ操作のエラー
#[derive(Debug, Error)]
pub enum DebugError {
    /// バイナリそのものが見つからない
    #[error("Could not find PEX data for script {0}. Make sure the script is loaded by the game.")]
    NoPexData(String),

    /// バイナリはあるが行番号テーブルがない
    #[error("No debug info in script {0}. Recompile the script with debug information enabled.")]
    NoDebugInfo(String),

    #[error("Script not found: {0}")]
    ScriptNotFound(String),

    #[error("Failed to decompile {script}: {message}")]
    Decompile { script: String, message: String },

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Stack {0} not found")]
    StackNotFound(u32),

    #[error("Execution is not paused")]
    NotPaused,

    #[error("Execution is already paused")]
    AlreadyPaused,

    #[error("Invalid arguments for {command}: {message}")]
    InvalidArguments { command: String, message: String },

    #[error("{0} is not supported")]
    Unsupported(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}
