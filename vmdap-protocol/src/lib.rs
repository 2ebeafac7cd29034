//! vmdap プロトコル定義
//!
//! このクレートは、Debug Adapter Protocol (DAP) のデータモデルとメッセージの
//! エンコード・デコードを提供します。
//! コア側は `EventSink` を通してのみイベントを送出し、トランスポートには依存しません。

pub mod codec;
pub mod events;
pub mod messages;
pub mod types;

pub use codec::{read_json_message, read_raw_message, write_json_message, write_raw_message};
pub use events::{
    BreakpointReason, CollectingSink, DebugEvent, EventSink, LoadedSourceReason, StoppedReason,
    ThreadReason,
};
pub use messages::{Event, Request, Response};
pub use types::*;

/// 受信する DAP メッセージ本体の最大サイズ（バイト）
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// DAP ヘッダ 1 行の最大サイズ（バイト）
pub const MAX_HEADER_LINE_BYTES: usize = 8 * 1024;
