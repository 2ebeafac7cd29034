//! デバッグイベント
//!
//! コアが送出するイベントは `DebugEvent` として表現され、`EventSink` に渡されます。
//! ワイヤ形式への変換（seq の採番とフレーミング）はトランスポート側の責務です。

use crate::types::{Breakpoint, Source};
use parking_lot::Mutex;
use serde_json::{json, Value};

/// 停止理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoppedReason {
    Breakpoint,
    Step,
    Pause,
}

impl StoppedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoppedReason::Breakpoint => "breakpoint",
            StoppedReason::Step => "step",
            StoppedReason::Pause => "pause",
        }
    }
}

/// スレッドイベントの理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadReason {
    Started,
    Exited,
}

impl ThreadReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadReason::Started => "started",
            ThreadReason::Exited => "exited",
        }
    }
}

/// ブレークポイントイベントの理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointReason {
    Changed,
    New,
    Removed,
}

impl BreakpointReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakpointReason::Changed => "changed",
            BreakpointReason::New => "new",
            BreakpointReason::Removed => "removed",
        }
    }
}

/// loadedSource イベントの理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadedSourceReason {
    New,
    Changed,
    Removed,
}

impl LoadedSourceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadedSourceReason::New => "new",
            LoadedSourceReason::Changed => "changed",
            LoadedSourceReason::Removed => "removed",
        }
    }
}

/// デバッグイベント
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    Initialized,
    Stopped {
        reason: StoppedReason,
        thread_id: i64,
    },
    Continued {
        thread_id: i64,
    },
    Thread {
        reason: ThreadReason,
        thread_id: i64,
    },
    Breakpoint {
        reason: BreakpointReason,
        breakpoint: Breakpoint,
    },
    LoadedSource {
        reason: LoadedSourceReason,
        source: Source,
    },
    Output {
        category: String,
        output: String,
    },
    Terminated,
}

impl DebugEvent {
    /// DAP のイベント名
    pub fn name(&self) -> &'static str {
        match self {
            DebugEvent::Initialized => "initialized",
            DebugEvent::Stopped { .. } => "stopped",
            DebugEvent::Continued { .. } => "continued",
            DebugEvent::Thread { .. } => "thread",
            DebugEvent::Breakpoint { .. } => "breakpoint",
            DebugEvent::LoadedSource { .. } => "loadedSource",
            DebugEvent::Output { .. } => "output",
            DebugEvent::Terminated => "terminated",
        }
    }

    /// DAP のイベントボディ
    pub fn body(&self) -> Option<Value> {
        match self {
            DebugEvent::Initialized | DebugEvent::Terminated => None,
            DebugEvent::Stopped { reason, thread_id } => Some(json!({
                "reason": reason.as_str(),
                "threadId": thread_id,
                "allThreadsStopped": true,
            })),
            DebugEvent::Continued { thread_id } => Some(json!({
                "threadId": thread_id,
                "allThreadsContinued": true,
            })),
            DebugEvent::Thread { reason, thread_id } => Some(json!({
                "reason": reason.as_str(),
                "threadId": thread_id,
            })),
            DebugEvent::Breakpoint { reason, breakpoint } => Some(json!({
                "reason": reason.as_str(),
                "breakpoint": breakpoint,
            })),
            DebugEvent::LoadedSource { reason, source } => Some(json!({
                "reason": reason.as_str(),
                "source": source,
            })),
            DebugEvent::Output { category, output } => Some(json!({
                "category": category,
                "output": output,
            })),
        }
    }
}

/// イベントの送出先
///
/// VM スレッドとプロトコルスレッドの両方から呼ばれる。
pub trait EventSink: Send + Sync {
    fn send_event(&self, event: DebugEvent);
}

/// 送出されたイベントを溜めておくシンク
///
/// テストやリプレイで、どのイベントがどの順で出たかを確認するために使う。
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<DebugEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 溜まったイベントを取り出す
    pub fn take(&self) -> Vec<DebugEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// 溜まったイベントのコピーを取得する
    pub fn events(&self) -> Vec<DebugEvent> {
        self.events.lock().clone()
    }

    /// 指定した名前のイベント数を数える
    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for CollectingSink {
    fn send_event(&self, event: DebugEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_event_body() {
        let event = DebugEvent::Stopped {
            reason: StoppedReason::Step,
            thread_id: 1042,
        };
        assert_eq!(event.name(), "stopped");

        let body = event.body().unwrap();
        assert_eq!(body["reason"], "step");
        assert_eq!(body["threadId"], 1042);
    }

    #[test]
    fn test_collecting_sink_counts_by_name() {
        let sink = CollectingSink::new();
        sink.send_event(DebugEvent::Initialized);
        sink.send_event(DebugEvent::Continued { thread_id: 0 });
        sink.send_event(DebugEvent::Continued { thread_id: 3 });

        assert_eq!(sink.count("continued"), 2);
        assert_eq!(sink.take().len(), 3);
        assert!(sink.events().is_empty());
    }
}
