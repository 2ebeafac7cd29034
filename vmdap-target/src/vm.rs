//! VM とデバッガの境界

use crate::stack::{Stack, StackId, Tasklet};
use crate::value::{FormView, ScriptObject};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// ログの重要度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

/// VM が出力したログ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub severity: Severity,
    pub message: String,
    /// 出力元モジュール（ユーザーログの場合）
    pub source: Option<String>,
}

/// 実行時イベントの購読者
///
/// すべてのメソッドは VM のスレッドから同期的に呼ばれる。
pub trait RuntimeObserver: Send + Sync {
    /// 命令を 1 つ実行した
    ///
    /// このメソッドから戻るまで VM スレッドは先へ進まない。
    fn instruction_executed(&self, tasklet: &Tasklet);

    /// スタックが作成された
    fn stack_created(&self, stack: StackId);

    /// スタックが破棄された
    fn stack_cleaned_up(&self, stack: StackId);

    /// VM がログを出力した
    fn log_event(&self, event: &LogEvent);
}

/// デバッグ対象の VM
pub trait VirtualMachine: Send + Sync {
    /// 実行中スタックの集合を守るロック
    ///
    /// スタックやフレームの中身を読み出す間は、このロックを保持しなければならない。
    fn running_stacks_lock(&self) -> &ReentrantMutex<()>;

    /// 実行中スタックのID一覧
    fn stack_ids(&self) -> Vec<StackId>;

    /// スタックの現在の状態を取得する
    fn stack(&self, id: StackId) -> Option<Stack>;

    /// VM にロード済みのスクリプト名一覧
    fn loaded_script_names(&self) -> Vec<String>;

    /// オブジェクトにバインドされたネイティブフォームの射影
    fn form_views(&self, object: &ScriptObject) -> Vec<FormView>;

    /// 実行時イベントの購読者を設定する（`None` で解除）
    fn set_observer(&self, observer: Option<Arc<dyn RuntimeObserver>>);
}

/// ホストアプリケーションのタスクキュー
///
/// VM スレッド上で直接処理してはいけない通知を、後で実行するために積む。
pub trait TaskQueue: Send + Sync {
    fn add_task(&self, task: Box<dyn FnOnce() + Send>);
}
