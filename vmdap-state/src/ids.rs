//! ハンドルの採番

use std::sync::atomic::{AtomicU32, Ordering};

/// 一意で単調増加するハンドルを払い出す
///
/// 0 は DAP で「子なし」を意味するため払い出さない。
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicU32,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// 次のハンドルを払い出す
    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}
