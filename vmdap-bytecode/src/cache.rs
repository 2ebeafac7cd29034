//! スクリプトバイナリのキャッシュ

use crate::binary::ScriptBinary;
use crate::decompile::Decompiler;
use crate::loader::ScriptLoader;
use crate::names::{normalize_script_name, script_name_to_source_path, script_reference, ScriptReference};
use crate::Result;
use anyhow::anyhow;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// クライアントに見せるソース情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceData {
    /// 正規化したスクリプト名
    pub name: String,
    /// 表示用パス
    pub path: String,
    pub reference: ScriptReference,
}

/// スクリプトバイナリのキャッシュ
///
/// 参照IDをキーにバイナリを保持し、未ロードならローダーから読み込む。
/// バイナリは `Arc` で共有するため、行番号テーブルの参照はロックの外で行える。
pub struct BytecodeCache {
    loader: Arc<dyn ScriptLoader>,
    decompiler: Arc<dyn Decompiler>,
    scripts: Mutex<HashMap<ScriptReference, Arc<ScriptBinary>>>,
}

impl BytecodeCache {
    pub fn new(loader: Arc<dyn ScriptLoader>, decompiler: Arc<dyn Decompiler>) -> Self {
        Self {
            loader,
            decompiler,
            scripts: Mutex::new(HashMap::new()),
        }
    }

    /// キャッシュ済みかどうか（ロードはしない）
    pub fn has_script(&self, name: &str) -> bool {
        self.has_reference(script_reference(name))
    }

    /// 参照IDがキャッシュ済みかどうか
    pub fn has_reference(&self, reference: ScriptReference) -> bool {
        self.scripts.lock().contains_key(&reference)
    }

    /// バイナリを取得する（未ロードならロードしてキャッシュする）
    ///
    /// リソースが存在しない、または読み込みに失敗した場合は `None`。
    pub fn get_script(&self, name: &str) -> Option<Arc<ScriptBinary>> {
        let normalized = normalize_script_name(name);
        let reference = script_reference(&normalized);

        let mut scripts = self.scripts.lock();
        if let Some(binary) = scripts.get(&reference) {
            return Some(binary.clone());
        }

        match self.loader.load(&normalized) {
            Ok(Some(binary)) => {
                tracing::debug!(
                    "loaded script {} (reference {}, {} functions)",
                    normalized,
                    reference,
                    binary.functions.len()
                );
                let binary = Arc::new(binary);
                scripts.insert(reference, binary.clone());
                Some(binary)
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!("failed to load script {}: {:#}", normalized, err);
                None
            }
        }
    }

    /// キャッシュ済みのバイナリを参照IDから取得する
    pub fn get_cached(&self, reference: ScriptReference) -> Option<Arc<ScriptBinary>> {
        self.scripts.lock().get(&reference).cloned()
    }

    /// 逆コンパイルしたソースを取得する
    pub fn get_decompiled_source(&self, name: &str) -> Result<String> {
        let binary = self
            .get_script(name)
            .ok_or_else(|| anyhow!("no script binary for {}", normalize_script_name(name)))?;
        self.decompile(&binary)
    }

    /// キャッシュ済みのバイナリを参照IDから逆コンパイルする
    pub fn get_decompiled_source_by_reference(&self, reference: ScriptReference) -> Result<String> {
        let binary = self
            .get_cached(reference)
            .ok_or_else(|| anyhow!("no script binary for reference {}", reference))?;
        self.decompile(&binary)
    }

    fn decompile(&self, binary: &ScriptBinary) -> Result<String> {
        let lines = self.decompiler.decompile(binary)?;
        Ok(lines.join("\n"))
    }

    /// ソース情報を取得する
    ///
    /// パスはバイナリに埋め込まれたソースファイル名を使い、空ならスクリプト名から合成する。
    pub fn get_source_data(&self, name: &str) -> Option<SourceData> {
        let normalized = normalize_script_name(name);
        let binary = self.get_script(&normalized)?;

        let path = if binary.source_file_name.is_empty() {
            script_name_to_source_path(&normalized)
        } else {
            binary.source_file_name.clone()
        };

        Some(SourceData {
            reference: script_reference(&normalized),
            name: normalized,
            path,
        })
    }

    /// 1 つのスクリプトをキャッシュから落とす
    ///
    /// 次の `get_script` でローダーから読み直される。
    pub fn reload(&self, name: &str) -> bool {
        self.scripts.lock().remove(&script_reference(name)).is_some()
    }

    /// キャッシュを空にする
    pub fn clear(&self) {
        self.scripts.lock().clear();
    }

    /// キャッシュ済みのスクリプト数
    pub fn len(&self) -> usize {
        self.scripts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.lock().is_empty()
    }
}
