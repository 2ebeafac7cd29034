//! vmdap デバッガのコア機能
//!
//! このクレートは、スクリプト VM を DAP で操作するための中核ロジックを提供します。
//! 実行制御（停止・再開・ステップ）、ブレークポイント管理、状態ツリーへの問い合わせを
//! `Debugger` にまとめ、`DebugSession` が DAP リクエストをそれらの呼び出しに変換します。

pub mod breakpoint;
pub mod command;
pub mod config;
pub mod debugger;
pub mod errors;
pub mod execution;
pub mod session;

pub use breakpoint::{script_name_of, Breakpoint, BreakpointId, BreakpointManager};
pub use command::Command;
pub use config::DebuggerConfig;
pub use debugger::Debugger;
pub use errors::DebugError;
pub use execution::{DebuggerState, ExecutionController, StepKind};
pub use session::DebugSession;

// 他のクレートから使用するために再エクスポート
pub use vmdap_bytecode::{BytecodeCache, ScriptReference};
pub use vmdap_protocol::{DebugEvent, EventSink};
pub use vmdap_target::{StackId, VirtualMachine};

/// デバッガの結果型
pub type Result<T> = std::result::Result<T, DebugError>;
