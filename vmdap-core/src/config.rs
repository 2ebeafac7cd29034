//! デバッガの設定

use std::time::Duration;

/// 停止中の待機ループのポーリング間隔の既定値
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// デバッガの設定
#[derive(Debug, Clone)]
pub struct DebuggerConfig {
    /// 停止中の VM スレッドが状態を確認する間隔
    pub poll_interval: Duration,
    /// VM のログを output イベントとして転送するか
    pub forward_logs: bool,
}

impl DebuggerConfig {
    pub fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            forward_logs: true,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self::new()
    }
}
