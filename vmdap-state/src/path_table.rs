//! ハンドルとパスの対応表

use crate::ids::HandleAllocator;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Entries {
    by_handle: HashMap<u32, String>,
    by_path: HashMap<String, u32>,
}

/// ハンドル ⇔ パスの双方向表
///
/// パスは小文字化して保持する。一度払い出したハンドルはセッション中ずっと同じパスを指す。
pub struct PathTable {
    ids: Arc<HandleAllocator>,
    entries: Mutex<Entries>,
}

impl PathTable {
    pub fn new(ids: Arc<HandleAllocator>) -> Self {
        Self {
            ids,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// パスのハンドルを取得する（未登録なら払い出す）
    pub fn add_or_get(&self, path: &str) -> u32 {
        let path = path.to_lowercase();
        let mut entries = self.entries.lock();
        if let Some(&handle) = entries.by_path.get(&path) {
            return handle;
        }

        let handle = self.ids.next();
        entries.by_handle.insert(handle, path.clone());
        entries.by_path.insert(path, handle);
        handle
    }

    /// 登録済みのパスのハンドル
    pub fn handle_for(&self, path: &str) -> Option<u32> {
        self.entries.lock().by_path.get(&path.to_lowercase()).copied()
    }

    /// ハンドルが指すパス
    pub fn path_for(&self, handle: u32) -> Option<String> {
        self.entries.lock().by_handle.get(&handle).cloned()
    }

    /// 登録済みのエントリ数
    pub fn len(&self) -> usize {
        self.entries.lock().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
